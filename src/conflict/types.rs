//! Conflict candidate sets and per-entity resolutions

use crate::graph::{Item, ItemId};
use crate::storage::ProposedInfluence;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An existing stored item that may be the same entity as a proposed one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarItem {
    pub item: Item,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creators: Vec<String>,
    /// Storage's similarity estimate (0 - 100)
    pub similarity_score: u8,
    /// Influences already attached to the existing item
    #[serde(default)]
    pub existing_influences_count: usize,
}

impl SimilarItem {
    pub fn new(item: Item, similarity_score: u8) -> Self {
        Self {
            item,
            creators: Vec::new(),
            similarity_score: similarity_score.min(100),
            existing_influences_count: 0,
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.item.id
    }
}

/// A proposed influence that matched something already stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceConflict {
    pub influence: ProposedInfluence,
    pub similar_items: Vec<SimilarItem>,
}

/// The ambiguous matches storage reported for one save attempt.
///
/// `influence_conflicts` is keyed by the influence's index in the save payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictCandidateSet {
    #[serde(default)]
    pub main_item_conflicts: Vec<SimilarItem>,
    #[serde(default)]
    pub influence_conflicts: BTreeMap<usize, InfluenceConflict>,
}

impl ConflictCandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_main_item_conflict(mut self, similar: SimilarItem) -> Self {
        self.main_item_conflicts.push(similar);
        self
    }

    pub fn with_influence_conflict(
        mut self,
        index: usize,
        influence: ProposedInfluence,
        similar_items: Vec<SimilarItem>,
    ) -> Self {
        self.influence_conflicts.insert(
            index,
            InfluenceConflict {
                influence,
                similar_items,
            },
        );
        self
    }

    /// Total candidate count across the main item and every influence
    pub fn total_conflicts(&self) -> usize {
        self.main_item_conflicts.len()
            + self
                .influence_conflicts
                .values()
                .map(|c| c.similar_items.len())
                .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.main_item_conflicts.is_empty() && self.influence_conflicts.is_empty()
    }

    pub fn has_main_item_conflicts(&self) -> bool {
        !self.main_item_conflicts.is_empty()
    }

    /// Every candidate id, main item first
    pub fn candidate_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.main_item_conflicts.iter().map(SimilarItem::id).chain(
            self.influence_conflicts
                .values()
                .flat_map(|c| c.similar_items.iter().map(SimilarItem::id)),
        )
    }
}

// --- Preview (pass-through for the UI) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPreview {
    pub item: Item,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creators: Vec<String>,
    /// Names of items already recorded as influencing this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub existing_influences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluencePreview {
    pub influence_name: String,
    /// The most similar stored candidate
    pub similar_item: SimilarItem,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_item_preview: Option<ItemPreview>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub influence_previews: BTreeMap<usize, InfluencePreview>,
}

// --- Resolutions ---

/// Decision for the main item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MainItemChoice {
    /// The new main item is this existing item
    Existing(ItemId),
    CreateNew,
}

/// Decision for one conflicting influence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    CreateNew,
    /// Link the existing item instead of creating a new one
    Merge { target_id: ItemId },
}

impl Resolution {
    pub fn merge(target_id: impl Into<ItemId>) -> Self {
        Self::Merge {
            target_id: target_id.into(),
        }
    }

    pub fn is_merge(&self) -> bool {
        matches!(self, Self::Merge { .. })
    }
}

/// Per-influence decisions keyed by influence index
pub type InfluenceResolutions = BTreeMap<usize, Resolution>;

/// The single mode a resolved save is submitted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    CreateNew,
    Merge,
}

/// A fully resolved conflict set, ready for the save orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub resolution_type: ResolutionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_item_choice: Option<MainItemChoice>,
    #[serde(default)]
    pub influence_resolutions: InfluenceResolutions,
}
