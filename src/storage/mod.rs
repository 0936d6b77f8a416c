//! Storage boundary for the influence graph
//!
//! The graph core talks to storage only through the `InfluenceStore` trait.
//! `MemoryStore` is the bundled implementation.

mod memory;
mod traits;
mod types;

pub use memory::{MemoryStore, SeedItem, StoreSeed};
pub use traits::{InfluenceStore, StorageError, StorageResult};
pub use types::{
    Direction, ExpandedGraph, ExpandedNode, ExpandedRelationship, ExpansionCounts,
    ExpansionRequest, InfluenceFetch, InfluenceRelation, ProposedInfluence, SavePayload,
    SaveResponse,
};
