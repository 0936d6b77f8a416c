//! GraphSession: the accumulated graph plus the loads that feed it

use super::save::{SaveError, SaveOrchestrator, SaveOutcome, SavedGraph};
use crate::config::Config;
use crate::graph::{AccumulatedGraph, DanglingEdgeWarning, ItemId};
use crate::storage::{Direction, ExpansionRequest, InfluenceStore, SavePayload, StorageResult};
use std::sync::Arc;
use tracing::{debug, info};

/// What a load did to the graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// `true` if merged into existing content, `false` if the graph was replaced
    pub accumulated: bool,
    pub nodes_added: usize,
    pub links_added: usize,
    pub links_replaced: usize,
    pub warnings: Vec<DanglingEdgeWarning>,
    /// Scopes present on the loaded item's influences, before filtering
    pub available_scopes: Vec<String>,
}

/// Holds one canonical graph and routes every fetch and save into it.
///
/// At most one save attempt is pending. Starting a new save or a topbar
/// search drops the previous attempt.
pub struct GraphSession {
    store: Arc<dyn InfluenceStore>,
    config: Config,
    graph: AccumulatedGraph,
    pending_save: Option<SaveOrchestrator>,
    scopes: Vec<String>,
}

impl GraphSession {
    pub fn new(store: Arc<dyn InfluenceStore>, config: Config) -> Self {
        Self {
            store,
            config,
            graph: AccumulatedGraph::new(),
            pending_save: None,
            scopes: Vec::new(),
        }
    }

    pub fn graph(&self) -> &AccumulatedGraph {
        &self.graph
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scope filter for topbar searches; empty shows every scope
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn set_scopes(&mut self, scopes: Vec<String>) {
        self.scopes = scopes;
    }

    // --- Loads ---

    /// Topbar search by id: always replaces the graph and selects the item.
    ///
    /// Any pending save is dropped first, whether or not the fetch succeeds.
    pub async fn search(&mut self, item_id: &ItemId) -> StorageResult<LoadReport> {
        if self.pending_save.take().is_some() {
            debug!("search dropped the pending save attempt");
        }
        let fetched = self.store.fetch_influences(item_id, &self.scopes).await?;
        let available_scopes = fetched.available_scopes.clone();
        let batch = fetched.into_batch();
        let result = self.graph.replace(&batch);
        self.graph = result.graph.select(item_id);
        info!(%item_id, nodes = self.graph.node_count(), "topbar search loaded");
        Ok(LoadReport {
            accumulated: false,
            nodes_added: result.nodes_added,
            links_added: result.links_added,
            links_replaced: result.links_replaced,
            warnings: result.warnings,
            available_scopes,
        })
    }

    /// Topbar search by name. Prefers an exact (case-insensitive) name hit.
    ///
    /// Returns `None` when nothing matches; the graph is then left as is.
    pub async fn search_by_name(
        &mut self,
        query: &str,
    ) -> StorageResult<Option<(ItemId, LoadReport)>> {
        let hits = self.store.search(query).await?;
        let wanted = query.trim().to_lowercase();
        let Some(hit) = hits
            .iter()
            .find(|item| item.name.to_lowercase() == wanted)
            .or_else(|| hits.first())
        else {
            debug!(query, "topbar search found nothing");
            return Ok(None);
        };
        let item_id = hit.id.clone();
        let report = self.search(&item_id).await?;
        Ok(Some((item_id, report)))
    }

    /// Fetch an item's neighborhood and fold it in.
    ///
    /// Already-expanded ids are skipped (`None`). Connected results merge;
    /// unconnected ones replace the graph.
    pub async fn expand(
        &mut self,
        item_id: &ItemId,
        direction: Direction,
    ) -> StorageResult<Option<LoadReport>> {
        if self.graph.is_expanded(item_id) {
            debug!(%item_id, "already expanded");
            return Ok(None);
        }

        let request =
            ExpansionRequest::new(item_id.clone(), direction, self.config.expansion.max_depth);
        let batch = self.store.fetch_expanded(&request).await?.into_batch();
        let accumulated = self.graph.is_connected(&batch);
        let result = if accumulated {
            self.graph.merge(&batch)
        } else {
            self.graph.replace(&batch)
        };
        self.graph = result.graph.mark_expanded(item_id);
        info!(%item_id, accumulated, nodes_added = result.nodes_added, "expanded");

        Ok(Some(LoadReport {
            accumulated,
            nodes_added: result.nodes_added,
            links_added: result.links_added,
            links_replaced: result.links_replaced,
            warnings: result.warnings,
            available_scopes: Vec::new(),
        }))
    }

    /// Expansion direction from config; both sides when neither flag is set
    pub fn configured_direction(&self) -> Direction {
        match (
            self.config.expansion.include_incoming,
            self.config.expansion.include_outgoing,
        ) {
            (true, false) => Direction::Incoming,
            (false, true) => Direction::Outgoing,
            _ => Direction::Both,
        }
    }

    // --- Saves ---

    /// Start a new save attempt, discarding any previous one.
    pub fn begin_save(&mut self) -> &mut SaveOrchestrator {
        if self.pending_save.is_some() {
            debug!("discarding previous save attempt");
        }
        self.pending_save.insert(SaveOrchestrator::new(Arc::clone(&self.store)))
    }

    pub fn pending_save(&self) -> Option<&SaveOrchestrator> {
        self.pending_save.as_ref()
    }

    pub fn pending_save_mut(&mut self) -> Option<&mut SaveOrchestrator> {
        self.pending_save.as_mut()
    }

    /// First save attempt through a fresh orchestrator.
    ///
    /// On `RequiresReview` the orchestrator stays pending for choices and
    /// `submit_resolution`.
    pub async fn save(&mut self, payload: SavePayload) -> Result<SaveOutcome, SaveError> {
        let orchestrator = self
            .pending_save
            .insert(SaveOrchestrator::new(Arc::clone(&self.store)));
        let outcome = orchestrator.save(payload, &self.graph).await?;
        if let SaveOutcome::Saved(saved) = &outcome {
            self.graph = saved.graph.clone();
            self.pending_save = None;
        }
        Ok(outcome)
    }

    /// Submit the pending attempt's resolution and apply the result.
    ///
    /// After `SaveError::Committed` the attempt stays pending but finished;
    /// call `reload_saved` rather than submitting again.
    pub async fn submit_resolution(&mut self) -> Result<ItemId, SaveError> {
        let orchestrator = self
            .pending_save
            .as_mut()
            .ok_or(SaveError::NoPendingReview)?;
        let saved = orchestrator.submit_resolution(&self.graph).await?;
        self.pending_save = None;
        let item_id = saved.item_id.clone();
        self.apply_saved(saved);
        Ok(item_id)
    }

    /// Load the item a finished save wrote and apply it to the graph.
    pub async fn reload_saved(&mut self) -> Result<ItemId, SaveError> {
        let orchestrator = self
            .pending_save
            .as_ref()
            .ok_or(SaveError::NotCommitted)?;
        let saved = orchestrator.reload(&self.graph).await?;
        self.pending_save = None;
        let item_id = saved.item_id.clone();
        self.apply_saved(saved);
        Ok(item_id)
    }

    /// Drop the pending save attempt, if any
    pub fn cancel_save(&mut self) {
        if let Some(mut orchestrator) = self.pending_save.take() {
            orchestrator.cancel();
        }
    }

    /// Adopt the graph produced by a committed save
    pub fn apply_saved(&mut self, saved: SavedGraph) {
        self.graph = saved.graph;
    }

    // --- Selection ---

    pub fn select(&mut self, item_id: &ItemId) {
        self.graph = self.graph.select(item_id);
    }

    pub fn clear(&mut self) {
        self.pending_save = None;
        self.graph = self.graph.clear();
    }
}
