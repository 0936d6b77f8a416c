//! Entity identity: does an incoming record denote a node we already hold?
//!
//! Matching is by id, then by case-insensitive exact name. Nothing fuzzier
//! happens here; similarity search belongs to storage.

use super::accumulated::AccumulatedGraph;
use super::item::ItemId;

/// Resolve a candidate record to the id of an existing node.
///
/// Returns `candidate_id` if it is already a node key; otherwise the id of the
/// first node (in insertion order) whose name equals `candidate_name` ignoring
/// case; otherwise `None`.
pub fn resolve_existing_id(
    candidate_id: Option<&ItemId>,
    candidate_name: &str,
    graph: &AccumulatedGraph,
) -> Option<ItemId> {
    if let Some(id) = candidate_id {
        if graph.contains(id) {
            return Some(id.clone());
        }
    }

    let folded = candidate_name.to_lowercase();
    graph
        .nodes()
        .find(|node| node.item.name.to_lowercase() == folded)
        .map(|node| node.item.id.clone())
}
