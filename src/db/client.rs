use std::time::Duration;

use helix_rs::{HelixDB, HelixDBClient, HelixError};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::config::StoreConfig;


const INITIAL_RETRY_DELAY_MS: u64 = 100;

const MAX_RETRY_DELAY_MS: u64 = 5000;


#[derive(Debug, Error)]
pub enum HelixClientError {
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Helix error: {0}")]
    Helix(#[from] HelixError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Retry exhausted after {0} attempts: {1}")]
    RetryExhausted(u32, String),
}


/// Thin wrapper over the HelixDB SDK that owns retry with backoff.
pub struct HelixClient {
    inner: HelixDB,
    base_url: String,
    max_retries: u32,
}

impl HelixClient {
    pub fn new(config: &StoreConfig) -> Self {
        let endpoint = format!("http://{}", config.host);
        let base_url = format!("http://{}:{}", config.host, config.port);

        let inner = <HelixDB as HelixDBClient>::new(
            Some(&endpoint),
            Some(config.port),
            config.api_key.as_deref(),
        );

        info!("HelixClient created for {}", base_url);

        Self {
            inner,
            base_url,
            max_retries: config.max_retries.max(1),
        }
    }

    pub async fn execute_query<T, P>(&self, query_name: &str, params: &P) -> Result<T, HelixClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        let mut last_error = None;
        let mut delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);

        for attempt in 1..=self.max_retries {
            debug!("Executing query: {} (attempt {})", query_name, attempt);

            match self.inner.query::<P, T>(query_name, params).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let err_str = e.to_string();
                    if err_str.contains("not found") {
                        return Err(HelixClientError::Query(err_str));
                    }

                    debug!("Query {} failed (attempt {}): {}", query_name, attempt, err_str);
                    last_error = Some(err_str);

                    if attempt < self.max_retries {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(Duration::from_millis(MAX_RETRY_DELAY_MS));
                    }
                }
            }
        }

        Err(HelixClientError::RetryExhausted(
            self.max_retries,
            last_error.unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = StoreConfig {
            host: "graph.internal".to_string(),
            port: 7070,
            max_retries: 0,
            ..Default::default()
        };
        let client = HelixClient::new(&config);
        assert_eq!(client.base_url(), "http://graph.internal:7070");
        assert_eq!(client.max_retries, 1);
    }
}
