//! Storage trait definitions

use super::types::{
    ExpandedGraph, ExpansionCounts, ExpansionRequest, InfluenceFetch, SavePayload, SaveResponse,
};
use crate::conflict::InfluenceResolutions;
use crate::graph::{Item, ItemId};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur talking to storage
#[derive(Debug, Error)]
pub enum StorageError {
    /// Transport-level failure; the request may be retried from scratch
    #[error("network failure: {0}")]
    Network(String),

    #[error("item not found: {0}")]
    NotFound(ItemId),

    /// Storage refused the request (e.g. malformed payload)
    #[error("rejected by storage: {0}")]
    Rejected(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// The backing store and its search index, seen from the graph core.
///
/// Implementations must be thread-safe (Send + Sync). `force_save` and
/// `merge_into` are only called by the save orchestrator once a conflict
/// resolution is complete.
#[async_trait]
pub trait InfluenceStore: Send + Sync {
    // === Reads ===

    /// Everything known to have influenced `item_id`, oldest influencer first.
    ///
    /// Only relations whose scope is listed in `scopes` are returned; an
    /// empty slice returns every relation.
    async fn fetch_influences(
        &self,
        item_id: &ItemId,
        scopes: &[String],
    ) -> StorageResult<InfluenceFetch>;

    /// Neighborhood around an item, nodes listed explicitly
    async fn fetch_expanded(&self, request: &ExpansionRequest) -> StorageResult<ExpandedGraph>;

    /// Incoming/outgoing neighbor counts for an item
    async fn expansion_counts(&self, item_id: &ItemId) -> StorageResult<ExpansionCounts>;

    /// Name search for the topbar
    async fn search(&self, query: &str) -> StorageResult<Vec<Item>>;

    // === Writes ===

    /// Save unless storage finds plausible duplicates
    async fn save(&self, payload: &SavePayload) -> StorageResult<SaveResponse>;

    /// Create a new main item regardless of similar items.
    ///
    /// Influences resolved `Merge` link their chosen existing item instead of
    /// creating a new one.
    async fn force_save(
        &self,
        payload: &SavePayload,
        resolutions: &InfluenceResolutions,
    ) -> StorageResult<SaveResponse>;

    /// Attach the payload's influences to an existing main item
    async fn merge_into(
        &self,
        existing_id: &ItemId,
        payload: &SavePayload,
        resolutions: &InfluenceResolutions,
    ) -> StorageResult<SaveResponse>;
}
