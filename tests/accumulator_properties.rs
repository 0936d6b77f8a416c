//! Property-based tests for the accumulated graph
//!
//! 1. Re-merging the same batch changes nothing
//! 2. Existing nodes are never overwritten by a newer snapshot
//! 3. Incoming links replace stored links with the same key
//! 4. No link survives a merge without both endpoints
//! 5. Connectivity gates on existing node ids

use influence_graph::{AccumulatedGraph, GraphBatch, GraphLink, Item, ItemId, LinkKey};
use proptest::option;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Ids n0..n7; node strategies only use n0..n5 so some links dangle
fn id_strategy(range: std::ops::Range<u8>) -> impl Strategy<Value = ItemId> {
    range.prop_map(|n| ItemId::from(format!("n{n}")))
}

fn item_strategy() -> impl Strategy<Value = Item> {
    (id_strategy(0..6), "[a-z]{0,6}").prop_map(|(id, desc)| {
        let name = format!("Name {id}");
        Item::new(id, name).with_description(desc)
    })
}

fn link_strategy() -> impl Strategy<Value = GraphLink> {
    (
        id_strategy(0..8),
        id_strategy(0..8),
        0.0f32..=1.0f32,
        "[a-z]{1,8}",
    )
        .prop_map(|(s, t, confidence, explanation)| {
            GraphLink::new(s, t)
                .with_confidence(confidence)
                .with_explanation(explanation)
        })
}

fn batch_strategy() -> impl Strategy<Value = GraphBatch> {
    (
        option::of(id_strategy(0..8)),
        prop::collection::vec(item_strategy(), 0..6),
        prop::collection::vec(link_strategy(), 0..8),
    )
        .prop_map(|(center, nodes, links)| GraphBatch {
            center,
            nodes,
            links,
        })
}

fn graph_strategy() -> impl Strategy<Value = AccumulatedGraph> {
    prop::collection::vec(batch_strategy(), 0..3).prop_map(|batches| {
        batches
            .iter()
            .fold(AccumulatedGraph::new(), |graph, batch| graph.merge(batch).graph)
    })
}

fn assert_no_dangling(graph: &AccumulatedGraph) -> Result<(), TestCaseError> {
    for link in graph.links() {
        prop_assert!(graph.contains(&link.source), "dangling source {}", link.source);
        prop_assert!(graph.contains(&link.target), "dangling target {}", link.target);
    }
    Ok(())
}

// ============================================================================
// Merge invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn merge_is_idempotent(graph in graph_strategy(), batch in batch_strategy()) {
        let once = graph.merge(&batch).graph;
        let twice = once.merge(&batch).graph;
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn merge_never_mutates_its_input(graph in graph_strategy(), batch in batch_strategy()) {
        let before = graph.clone();
        let _ = graph.merge(&batch);
        prop_assert_eq!(graph, before);
    }

    #[test]
    fn existing_node_wins(
        graph in graph_strategy(),
        batch in batch_strategy(),
        description in "[A-Z]{3,6}",
    ) {
        // Push a conflicting snapshot of every existing node into the batch
        let mut batch = batch;
        for node in graph.nodes() {
            batch.nodes.push(node.item.clone().with_description(description.clone()));
        }
        let merged = graph.merge(&batch).graph;
        for node in graph.nodes() {
            prop_assert_eq!(merged.node(node.id()), Some(node));
        }
    }

    #[test]
    fn incoming_link_replaces_stored(
        graph in graph_strategy(),
        batch in batch_strategy(),
        explanation in "[A-Z]{3,6}",
    ) {
        let Some(stored) = graph.links().next().cloned() else {
            return Ok(());
        };
        let fresh = stored.clone().with_explanation(explanation);
        let mut batch = batch;
        batch.links.push(fresh.clone());

        let merged = graph.merge(&batch).graph;
        prop_assert_eq!(merged.link(&LinkKey::new(stored.source, stored.target)), Some(&fresh));
    }

    #[test]
    fn no_dangling_links_after_merge_or_replace(
        graph in graph_strategy(),
        batch in batch_strategy(),
    ) {
        let merged = graph.merge(&batch);
        assert_no_dangling(&merged.graph)?;
        let replaced = graph.replace(&batch);
        assert_no_dangling(&replaced.graph)?;

        let kept = merged.graph.link_count();
        prop_assert!(kept <= graph.link_count() + batch.links.len());
    }

    #[test]
    fn dropped_links_are_reported(batch in batch_strategy()) {
        let result = AccumulatedGraph::new().merge(&batch);
        let node_ids: std::collections::HashSet<&ItemId> =
            batch.nodes.iter().map(|item| &item.id).collect();
        let dangling = batch
            .links
            .iter()
            .filter(|l| !node_ids.contains(&l.source) || !node_ids.contains(&l.target))
            .count();
        prop_assert_eq!(result.warnings.len(), dangling);
    }
}

// ============================================================================
// Connectivity
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn nothing_connects_to_an_empty_graph(batch in batch_strategy()) {
        prop_assert!(!AccumulatedGraph::new().is_connected(&batch));
    }

    #[test]
    fn known_center_is_connected(graph in graph_strategy(), batch in batch_strategy()) {
        let Some(existing) = graph.nodes().next().map(|n| n.id().clone()) else {
            return Ok(());
        };
        let batch = GraphBatch { center: Some(existing), ..batch };
        prop_assert!(graph.is_connected(&batch));
    }

    #[test]
    fn connected_merge_keeps_selection(graph in graph_strategy(), batch in batch_strategy()) {
        let Some(existing) = graph.nodes().next().map(|n| n.id().clone()) else {
            return Ok(());
        };
        let selected = graph.select(&existing);
        let merged = selected.merge(&batch).graph;
        prop_assert_eq!(merged.selected_node_id(), Some(&existing));
    }
}
