use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use tracing::debug;

use crate::core::error::{CitegraphError, Result};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStage {
    Seeded,
    Expanded,
    Pruned,
    Serialized,
    Answered,
    Verified,
    Repaired,
}

impl QueryStage {
    fn rank(self) -> u8 {
        match self {
            Self::Seeded => 0,
            Self::Expanded => 1,
            Self::Pruned => 2,
            Self::Serialized => 3,
            Self::Answered => 4,
            Self::Verified | Self::Repaired => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Verified | Self::Repaired)
    }
}


/// Enforces the strict per-query pipeline order.
#[derive(Debug, Default)]
pub struct StageTracker {
    current: Option<QueryStage>,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, next: QueryStage) -> Result<()> {
        let expected = self.current.map_or(0, |s| s.rank() + 1);
        if next.rank() != expected {
            return Err(CitegraphError::Internal(format!(
                "illegal stage transition {:?} -> {}",
                self.current, next
            )));
        }
        debug!("Query stage: {}", next);
        self.current = Some(next);
        Ok(())
    }

    pub fn current(&self) -> Option<QueryStage> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_sequence() {
        let mut tracker = StageTracker::new();
        for stage in [
            QueryStage::Seeded,
            QueryStage::Expanded,
            QueryStage::Pruned,
            QueryStage::Serialized,
            QueryStage::Answered,
            QueryStage::Repaired,
        ] {
            tracker.advance(stage).unwrap();
        }
        assert_eq!(tracker.current(), Some(QueryStage::Repaired));
        assert!(QueryStage::Repaired.is_terminal());
    }

    #[test]
    fn test_rejects_skipped_and_repeated_stages() {
        let mut tracker = StageTracker::new();
        assert!(tracker.advance(QueryStage::Expanded).is_err());
        tracker.advance(QueryStage::Seeded).unwrap();
        assert!(tracker.advance(QueryStage::Seeded).is_err());
        assert!(tracker.advance(QueryStage::Pruned).is_err());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(QueryStage::Serialized.to_string(), "SERIALIZED");
        assert_eq!(
            serde_json::to_value(QueryStage::Verified).unwrap(),
            serde_json::json!("VERIFIED")
        );
    }
}
