//! SaveOrchestrator: one user save action from first attempt to commit
//!
//! `save` → (`RequiresReview` → resolver choices → `submit_resolution`) →
//! fetch the saved item → merge or replace into the caller's graph.
//! Storage failures before the write leave the resolver and the caller's
//! graph untouched. Once storage has accepted the write the attempt is
//! finished, even if loading the saved item afterwards fails.

use crate::conflict::{
    ConflictError, ConflictResolver, MainItemChoice, PreviewData, ResolverState,
};
use crate::graph::{AccumulatedGraph, DanglingEdgeWarning, ItemId};
use crate::storage::{InfluenceStore, SavePayload, SaveResponse, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from a save attempt
#[derive(Debug, Error)]
pub enum SaveError {
    /// The user still has decisions to make, or made an invalid one
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("storage asked for review again after a resolved submission")]
    ConflictRetryExhausted,

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The write went through but the saved item could not be loaded.
    /// Saving again would duplicate it; use `SaveOrchestrator::reload`.
    #[error("saved {item_id} but could not load it: {source}")]
    Committed {
        item_id: ItemId,
        source: StorageError,
    },

    #[error("no save is awaiting review")]
    NoPendingReview,

    #[error("nothing has been saved yet")]
    NotCommitted,

    #[error("this save attempt has already finished")]
    Finished,
}

impl SaveError {
    /// Text for the person driving the save.
    ///
    /// Decisions still owed by the user and failures worth retrying never
    /// share a message.
    pub fn user_message(&self) -> String {
        match self {
            SaveError::Conflict(ConflictError::IncompleteResolution { .. }) => {
                "This save needs your input: choose how to handle every similar item before saving."
                    .to_string()
            }
            SaveError::Conflict(e) => format!("This save needs your input: {e}."),
            SaveError::ConflictRetryExhausted => {
                "Could not save, please retry the whole operation.".to_string()
            }
            SaveError::Storage(StorageError::Network(_)) => {
                "Could not reach storage, try again.".to_string()
            }
            SaveError::Storage(e) => format!("Could not save: {e}."),
            SaveError::Committed { item_id, .. } => format!(
                "Saved as {item_id}, but the graph could not be refreshed. \
                 Reload the item instead of saving again."
            ),
            SaveError::NoPendingReview | SaveError::Finished => {
                "This save is no longer active; start a new save.".to_string()
            }
            SaveError::NotCommitted => "Nothing has been saved yet.".to_string(),
        }
    }

    /// True when repeating the whole operation may succeed.
    /// Never true once storage has accepted the write.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SaveError::ConflictRetryExhausted | SaveError::Storage(StorageError::Network(_))
        )
    }
}

/// A committed save folded into a graph
#[derive(Debug, Clone)]
pub struct SavedGraph {
    pub item_id: ItemId,
    /// The caller's graph with the saved item's influences applied and the item selected
    pub graph: AccumulatedGraph,
    /// `true` if merged into the existing graph, `false` if it replaced it
    pub accumulated: bool,
    pub warnings: Vec<DanglingEdgeWarning>,
}

/// Result of the first save attempt
#[derive(Debug, Clone)]
pub enum SaveOutcome {
    Saved(SavedGraph),
    /// Choices are now pending in `SaveOrchestrator::resolver_mut()`
    RequiresReview {
        total_conflicts: usize,
        preview: PreviewData,
    },
}

/// Drives a single save attempt.
///
/// Owns a fresh resolver. Dropping the orchestrator abandons the attempt;
/// nothing it would have produced reaches a graph.
pub struct SaveOrchestrator {
    store: Arc<dyn InfluenceStore>,
    resolver: ConflictResolver,
    pending: Option<SavePayload>,
    committed: Option<ItemId>,
}

impl SaveOrchestrator {
    pub fn new(store: Arc<dyn InfluenceStore>) -> Self {
        Self {
            store,
            resolver: ConflictResolver::default(),
            pending: None,
            committed: None,
        }
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut ConflictResolver {
        &mut self.resolver
    }

    /// The payload waiting on conflict resolution, if any
    pub fn pending_payload(&self) -> Option<&SavePayload> {
        self.pending.as_ref()
    }

    /// Id storage assigned to the saved main item, once the write succeeded
    pub fn committed_item(&self) -> Option<&ItemId> {
        self.committed.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.committed.is_some()
            || matches!(
                self.resolver.state(),
                ResolverState::Committed | ResolverState::Cancelled
            )
    }

    /// First save attempt.
    pub async fn save(
        &mut self,
        payload: SavePayload,
        graph: &AccumulatedGraph,
    ) -> Result<SaveOutcome, SaveError> {
        if self.is_finished() || self.pending.is_some() {
            return Err(SaveError::Finished);
        }

        match self.store.save(&payload).await? {
            SaveResponse::Saved { item_id } => {
                self.committed = Some(item_id.clone());
                let saved = self.apply(item_id, graph).await?;
                Ok(SaveOutcome::Saved(saved))
            }
            SaveResponse::RequiresReview { conflicts, preview } => {
                let total_conflicts = conflicts.total_conflicts();
                info!(
                    main_item = %payload.main_item,
                    total_conflicts,
                    "save requires review"
                );
                self.resolver.begin(conflicts)?;
                self.pending = Some(payload);
                Ok(SaveOutcome::RequiresReview {
                    total_conflicts,
                    preview,
                })
            }
        }
    }

    /// Re-issue the pending save with the resolver's decisions.
    ///
    /// An `Existing` main-item choice merges into that item; anything else
    /// force-creates a new main item. Per-influence decisions ride along
    /// either way.
    pub async fn submit_resolution(
        &mut self,
        graph: &AccumulatedGraph,
    ) -> Result<SavedGraph, SaveError> {
        if self.is_finished() {
            return Err(SaveError::Finished);
        }
        let payload = self.pending.as_ref().ok_or(SaveError::NoPendingReview)?;
        let request = self.resolver.submit()?;
        debug!(resolution = ?request.resolution_type, "submitting resolved save");

        let response = match &request.main_item_choice {
            Some(MainItemChoice::Existing(existing_id)) => {
                self.store
                    .merge_into(existing_id, payload, &request.influence_resolutions)
                    .await?
            }
            _ => {
                self.store
                    .force_save(payload, &request.influence_resolutions)
                    .await?
            }
        };

        match response {
            SaveResponse::Saved { item_id } => {
                self.resolver.mark_committed();
                self.pending = None;
                self.committed = Some(item_id.clone());
                self.apply(item_id, graph).await
            }
            SaveResponse::RequiresReview { .. } => {
                warn!("storage requested review for an already resolved save");
                self.resolver.cancel();
                self.pending = None;
                Err(SaveError::ConflictRetryExhausted)
            }
        }
    }

    /// Abandon the attempt. Later calls return `SaveError::Finished`.
    pub fn cancel(&mut self) {
        self.resolver.cancel();
        self.pending = None;
    }

    /// Load the committed item again and fold it into `graph`.
    ///
    /// Recovers from `SaveError::Committed` without another write.
    pub async fn reload(&self, graph: &AccumulatedGraph) -> Result<SavedGraph, SaveError> {
        let item_id = self.committed.clone().ok_or(SaveError::NotCommitted)?;
        self.apply(item_id, graph).await
    }

    async fn apply(
        &self,
        item_id: ItemId,
        graph: &AccumulatedGraph,
    ) -> Result<SavedGraph, SaveError> {
        let fetched = match self.store.fetch_influences(&item_id, &[]).await {
            Ok(fetched) => fetched,
            Err(source) => {
                warn!(%item_id, error = %source, "saved item could not be loaded");
                return Err(SaveError::Committed { item_id, source });
            }
        };
        let batch = fetched.into_batch();
        let accumulated = graph.is_connected(&batch);
        let result = if accumulated {
            graph.merge(&batch)
        } else {
            graph.replace(&batch)
        };
        info!(
            %item_id,
            accumulated,
            nodes_added = result.nodes_added,
            links_added = result.links_added,
            "saved item applied to graph"
        );
        Ok(SavedGraph {
            graph: result.graph.select(&item_id),
            item_id,
            accumulated,
            warnings: result.warnings,
        })
    }
}
