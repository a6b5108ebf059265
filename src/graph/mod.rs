

pub mod memory;
pub mod models;
pub mod store;

pub use memory::{GraphSnapshot, InMemoryGraphStore};
pub use models::{GraphEdge, GraphNode, Neighbor, NodeLabel, DEFAULT_EDGE_CONFIDENCE};
pub use store::{GraphStore, HelixGraphStore, StoreError};
