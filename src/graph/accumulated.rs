//! AccumulatedGraph: the single canonical graph built from many fetches
//!
//! Every operation takes `&self` and returns a new value. Merge rules:
//! - Nodes: first-seen-wins. An id already present is never overwritten, so
//!   layout attached to the existing node survives.
//! - Links: keyed by `(source, target)`; an incoming link replaces the stored
//!   one (last-applied-wins).
//! - A link whose endpoint is neither an existing node nor a node of the same
//!   batch is dropped and reported as a `DanglingEdgeWarning`.

use super::identity::resolve_existing_id;
use super::item::{GraphNode, Item, ItemId, NodeLayout};
use super::link::{GraphLink, LinkKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// One fetch result, normalised for merging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphBatch {
    /// The item the fetch was about (main item or expansion center)
    pub center: Option<ItemId>,
    pub nodes: Vec<Item>,
    pub links: Vec<GraphLink>,
}

impl GraphBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_center(mut self, center: impl Into<ItemId>) -> Self {
        self.center = Some(center.into());
        self
    }

    pub fn with_node(mut self, item: Item) -> Self {
        self.nodes.push(item);
        self
    }

    pub fn with_link(mut self, link: GraphLink) -> Self {
        self.links.push(link);
        self
    }

    /// True if the batch carries no nodes and no links
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }

    /// Every id the batch mentions: center, nodes, and link endpoints
    pub fn mentioned_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.center
            .iter()
            .chain(self.nodes.iter().map(|item| &item.id))
            .chain(
                self.links
                    .iter()
                    .flat_map(|link| [&link.source, &link.target]),
            )
    }
}

/// A link dropped during merge because an endpoint was unknown.
///
/// Non-fatal: the rest of the batch still merges.
#[derive(Debug, Clone, PartialEq)]
pub struct DanglingEdgeWarning {
    pub link: LinkKey,
    /// Endpoints absent from both the graph and the batch
    pub missing: Vec<ItemId>,
}

impl std::fmt::Display for DanglingEdgeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let missing: Vec<&str> = self.missing.iter().map(ItemId::as_str).collect();
        write!(
            f,
            "dropped link {}→{}: missing endpoint {}",
            self.link.source,
            self.link.target,
            missing.join(", ")
        )
    }
}

impl std::error::Error for DanglingEdgeWarning {}

/// The result of a merge or replace.
///
/// Partial success is the normal case: valid items commit even when some
/// links are dropped.
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub graph: AccumulatedGraph,
    pub nodes_added: usize,
    pub links_added: usize,
    /// Links whose key already existed and were overwritten
    pub links_replaced: usize,
    pub warnings: Vec<DanglingEdgeWarning>,
}

impl MergeResult {
    fn unchanged(graph: AccumulatedGraph) -> Self {
        Self {
            graph,
            nodes_added: 0,
            links_added: 0,
            links_replaced: 0,
            warnings: Vec::new(),
        }
    }

    /// True if no link was dropped
    pub fn is_fully_committed(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// A state transition on the accumulated graph.
///
/// Hosts that prefer a reducer-style store can log these and replay them
/// through `AccumulatedGraph::apply`.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphAction {
    Merge(GraphBatch),
    Replace(GraphBatch),
    Clear,
    Select(ItemId),
    ClearSelection,
    MarkExpanded(ItemId),
    SetLayout(ItemId, NodeLayout),
}

/// The canonical, deduplicated graph shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "GraphSnapshot", from = "GraphSnapshot")]
pub struct AccumulatedGraph {
    nodes: HashMap<ItemId, GraphNode>,
    node_order: Vec<ItemId>,
    relationships: HashMap<LinkKey, GraphLink>,
    link_order: Vec<LinkKey>,
    selected_node_id: Option<ItemId>,
    expanded_node_ids: BTreeSet<ItemId>,
}

impl AccumulatedGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    // --- Transitions ---

    /// Merge a batch into a copy of this graph.
    pub fn merge(&self, batch: &GraphBatch) -> MergeResult {
        let mut result = MergeResult::unchanged(self.clone());
        let graph = &mut result.graph;

        for item in &batch.nodes {
            if graph.insert_node(GraphNode::new(item.clone())) {
                result.nodes_added += 1;
            }
        }

        for link in &batch.links {
            let mut missing: Vec<ItemId> = Vec::new();
            for endpoint in [&link.source, &link.target] {
                if !graph.contains(endpoint) && !missing.contains(endpoint) {
                    missing.push(endpoint.clone());
                }
            }

            if !missing.is_empty() {
                let warning = DanglingEdgeWarning {
                    link: link.key(),
                    missing,
                };
                warn!(%warning, "dangling link dropped during merge");
                result.warnings.push(warning);
                continue;
            }

            if graph.upsert_link(link.clone()) {
                result.links_replaced += 1;
            } else {
                result.links_added += 1;
            }
        }

        debug!(
            nodes_added = result.nodes_added,
            links_added = result.links_added,
            links_replaced = result.links_replaced,
            dropped = result.warnings.len(),
            "merged batch"
        );
        result
    }

    /// Discard everything, then merge the batch.
    pub fn replace(&self, batch: &GraphBatch) -> MergeResult {
        debug!(
            discarded_nodes = self.node_count(),
            discarded_links = self.link_count(),
            "replacing graph"
        );
        self.clear().merge(batch)
    }

    /// Empty nodes, links, selection, and expansion tracking.
    pub fn clear(&self) -> Self {
        Self::new()
    }

    /// Select a node. Unknown ids leave the graph unchanged.
    pub fn select(&self, id: &ItemId) -> Self {
        let mut graph = self.clone();
        if graph.contains(id) {
            graph.selected_node_id = Some(id.clone());
        } else {
            debug!(%id, "ignoring selection of unknown node");
        }
        graph
    }

    pub fn clear_selection(&self) -> Self {
        let mut graph = self.clone();
        graph.selected_node_id = None;
        graph
    }

    /// Record that `id`'s neighborhood has been fetched. Idempotent.
    pub fn mark_expanded(&self, id: &ItemId) -> Self {
        let mut graph = self.clone();
        graph.expanded_node_ids.insert(id.clone());
        graph
    }

    /// Attach presentation state to a node. Unknown ids leave the graph unchanged.
    pub fn set_layout(&self, id: &ItemId, layout: NodeLayout) -> Self {
        let mut graph = self.clone();
        if let Some(node) = graph.nodes.get_mut(id) {
            node.layout = Some(layout);
        }
        graph
    }

    /// Apply a logged action.
    pub fn apply(&self, action: &GraphAction) -> MergeResult {
        match action {
            GraphAction::Merge(batch) => self.merge(batch),
            GraphAction::Replace(batch) => self.replace(batch),
            GraphAction::Clear => MergeResult::unchanged(self.clear()),
            GraphAction::Select(id) => MergeResult::unchanged(self.select(id)),
            GraphAction::ClearSelection => MergeResult::unchanged(self.clear_selection()),
            GraphAction::MarkExpanded(id) => MergeResult::unchanged(self.mark_expanded(id)),
            GraphAction::SetLayout(id, layout) => {
                MergeResult::unchanged(self.set_layout(id, *layout))
            }
        }
    }

    // --- Queries ---

    /// True if the batch's center or any of its link endpoints is already a node.
    ///
    /// Callers merge connected fetches and replace the graph for unconnected ones.
    pub fn is_connected(&self, batch: &GraphBatch) -> bool {
        batch
            .center
            .iter()
            .chain(
                batch
                    .links
                    .iter()
                    .flat_map(|link| [&link.source, &link.target]),
            )
            .any(|id| self.contains(id))
    }

    /// Resolve a record to an existing node by id or case-insensitive name.
    pub fn contains_entity(&self, id: Option<&ItemId>, name: &str) -> Option<ItemId> {
        resolve_existing_id(id, name, self)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &ItemId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn link(&self, key: &LinkKey) -> Option<&GraphLink> {
        self.relationships.get(key)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.node_order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Links in insertion order
    pub fn links(&self) -> impl Iterator<Item = &GraphLink> {
        self.link_order
            .iter()
            .filter_map(|key| self.relationships.get(key))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn selected_node_id(&self) -> Option<&ItemId> {
        self.selected_node_id.as_ref()
    }

    pub fn is_expanded(&self, id: &ItemId) -> bool {
        self.expanded_node_ids.contains(id)
    }

    pub fn expanded_node_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.expanded_node_ids.iter()
    }

    /// Returns false if the id was already present
    fn insert_node(&mut self, node: GraphNode) -> bool {
        if self.nodes.contains_key(node.id()) {
            return false;
        }
        let id = node.id().clone();
        self.node_order.push(id.clone());
        self.nodes.insert(id, node);
        true
    }

    /// Returns true if an existing link was replaced
    fn upsert_link(&mut self, link: GraphLink) -> bool {
        let key = link.key();
        let replaced = self.relationships.insert(key.clone(), link).is_some();
        if !replaced {
            self.link_order.push(key);
        }
        replaced
    }
}

/// Flat wire form of an accumulated graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GraphSnapshot {
    nodes: Vec<GraphNode>,
    relationships: Vec<GraphLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selected_node_id: Option<ItemId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    expanded_node_ids: Vec<ItemId>,
}

impl From<AccumulatedGraph> for GraphSnapshot {
    fn from(graph: AccumulatedGraph) -> Self {
        Self {
            nodes: graph.nodes().cloned().collect(),
            relationships: graph.links().cloned().collect(),
            selected_node_id: graph.selected_node_id.clone(),
            expanded_node_ids: graph.expanded_node_ids.iter().cloned().collect(),
        }
    }
}

impl From<GraphSnapshot> for AccumulatedGraph {
    fn from(snapshot: GraphSnapshot) -> Self {
        let mut graph = AccumulatedGraph::new();
        for node in snapshot.nodes {
            graph.insert_node(node);
        }
        let links = GraphBatch {
            center: None,
            nodes: Vec::new(),
            links: snapshot.relationships,
        };
        let mut graph = graph.merge(&links).graph;
        if let Some(id) = snapshot.selected_node_id {
            graph = graph.select(&id);
        }
        graph.expanded_node_ids = snapshot.expanded_node_ids.into_iter().collect();
        graph
    }
}
