//! ConflictResolver: per-entity decisions for one ambiguous save attempt
//!
//! States advance as choices are recorded: `Idle → AwaitingMainItemChoice →
//! AwaitingInfluenceChoices → Resolved → Committed | Cancelled`.
//! A category with no conflicts is skipped. Submission is gated on every
//! conflicting entity having an explicit decision; nothing is defaulted.

use super::types::{
    ConflictCandidateSet, InfluenceResolutions, MainItemChoice, Resolution, ResolutionType,
    SaveRequest,
};
use crate::graph::{resolve_existing_id, AccumulatedGraph, ItemId};
use thiserror::Error;
use tracing::debug;

/// Where a resolver is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    /// No candidate set loaded
    Idle,
    AwaitingMainItemChoice,
    AwaitingInfluenceChoices,
    /// Every conflict has a decision; ready to submit
    Resolved,
    /// The resolved save was accepted by storage
    Committed,
    Cancelled,
}

/// Errors from recording or submitting resolutions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConflictError {
    #[error(
        "conflict resolution incomplete: {}",
        pending_summary(.main_item_pending, .unresolved_influences)
    )]
    IncompleteResolution {
        main_item_pending: bool,
        unresolved_influences: Vec<usize>,
    },

    #[error("{0} is not a candidate for this conflict")]
    UnknownCandidate(ItemId),

    #[error("influence {0} has no conflict to resolve")]
    UnknownInfluence(usize),

    #[error("resolver is not accepting choices (state: {0:?})")]
    NotActive(ResolverState),
}

fn pending_summary(main_item_pending: &bool, unresolved: &[usize]) -> String {
    let mut parts = Vec::new();
    if *main_item_pending {
        parts.push("main item has no choice".to_string());
    }
    if !unresolved.is_empty() {
        let indices: Vec<String> = unresolved.iter().map(|i| i.to_string()).collect();
        parts.push(format!("influences [{}] unresolved", indices.join(", ")));
    }
    parts.join("; ")
}

/// Tracks user decisions over one conflict candidate set.
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    candidates: Option<ConflictCandidateSet>,
    main_item_choice: Option<MainItemChoice>,
    influence_resolutions: InfluenceResolutions,
    finished: Option<ResolverState>,
}

impl ConflictResolver {
    /// Create a resolver already holding a candidate set
    pub fn new(candidates: ConflictCandidateSet) -> Self {
        Self {
            candidates: Some(candidates),
            ..Default::default()
        }
    }

    /// Load a candidate set into an idle resolver
    pub fn begin(&mut self, candidates: ConflictCandidateSet) -> Result<(), ConflictError> {
        let state = self.state();
        if state != ResolverState::Idle {
            return Err(ConflictError::NotActive(state));
        }
        self.candidates = Some(candidates);
        Ok(())
    }

    pub fn state(&self) -> ResolverState {
        if let Some(state) = self.finished {
            return state;
        }
        let Some(candidates) = &self.candidates else {
            return ResolverState::Idle;
        };
        if candidates.has_main_item_conflicts() && self.main_item_choice.is_none() {
            ResolverState::AwaitingMainItemChoice
        } else if !self.unresolved_influences().is_empty() {
            ResolverState::AwaitingInfluenceChoices
        } else {
            ResolverState::Resolved
        }
    }

    pub fn candidates(&self) -> Option<&ConflictCandidateSet> {
        self.candidates.as_ref()
    }

    pub fn main_item_choice(&self) -> Option<&MainItemChoice> {
        self.main_item_choice.as_ref()
    }

    pub fn influence_resolution(&self, index: usize) -> Option<&Resolution> {
        self.influence_resolutions.get(&index)
    }

    /// Record the main-item decision. Last call wins.
    pub fn select_main_item(&mut self, choice: MainItemChoice) -> Result<(), ConflictError> {
        let candidates = self.active_candidates()?;
        if let MainItemChoice::Existing(id) = &choice {
            if !candidates.main_item_conflicts.iter().any(|c| c.id() == id) {
                return Err(ConflictError::UnknownCandidate(id.clone()));
            }
        }
        debug!(?choice, "main item choice recorded");
        self.main_item_choice = Some(choice);
        Ok(())
    }

    /// Record or overwrite the decision for one conflicting influence.
    pub fn resolve_influence(
        &mut self,
        index: usize,
        resolution: Resolution,
    ) -> Result<(), ConflictError> {
        let candidates = self.active_candidates()?;
        let conflict = candidates
            .influence_conflicts
            .get(&index)
            .ok_or(ConflictError::UnknownInfluence(index))?;
        if let Resolution::Merge { target_id } = &resolution {
            if !conflict.similar_items.iter().any(|c| c.id() == target_id) {
                return Err(ConflictError::UnknownCandidate(target_id.clone()));
            }
        }
        debug!(index, ?resolution, "influence resolution recorded");
        self.influence_resolutions.insert(index, resolution);
        Ok(())
    }

    /// Conflicting influence indices still lacking a decision, ascending
    pub fn unresolved_influences(&self) -> Vec<usize> {
        self.candidates
            .as_ref()
            .map(|c| {
                c.influence_conflicts
                    .keys()
                    .filter(|index| !self.influence_resolutions.contains_key(index))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True iff every conflicting entity has a recorded decision.
    pub fn is_complete(&self) -> bool {
        let Some(candidates) = &self.candidates else {
            return false;
        };
        let main_done = !candidates.has_main_item_conflicts() || self.main_item_choice.is_some();
        main_done && self.unresolved_influences().is_empty()
    }

    /// The single mode the save will be submitted in.
    ///
    /// A recorded main-item choice decides. Without main-item conflicts, any
    /// influence merge makes it `Merge`. Before anything is decided this is
    /// `CreateNew`, which `is_complete` still keeps from being submitted.
    pub fn overall_resolution_type(&self) -> ResolutionType {
        let Some(candidates) = &self.candidates else {
            return ResolutionType::CreateNew;
        };

        if candidates.has_main_item_conflicts() {
            return match self.main_item_choice {
                Some(MainItemChoice::Existing(_)) => ResolutionType::Merge,
                _ => ResolutionType::CreateNew,
            };
        }

        if self.influence_resolutions.values().any(Resolution::is_merge) {
            ResolutionType::Merge
        } else {
            ResolutionType::CreateNew
        }
    }

    /// Package the decisions for the save orchestrator.
    pub fn submit(&self) -> Result<SaveRequest, ConflictError> {
        let candidates = self.active_candidates()?;
        if !self.is_complete() {
            return Err(ConflictError::IncompleteResolution {
                main_item_pending: candidates.has_main_item_conflicts()
                    && self.main_item_choice.is_none(),
                unresolved_influences: self.unresolved_influences(),
            });
        }
        Ok(SaveRequest {
            resolution_type: self.overall_resolution_type(),
            main_item_choice: self.main_item_choice.clone(),
            influence_resolutions: self.influence_resolutions.clone(),
        })
    }

    pub fn mark_committed(&mut self) {
        self.finished = Some(ResolverState::Committed);
    }

    pub fn cancel(&mut self) {
        self.finished = Some(ResolverState::Cancelled);
    }

    /// Candidate ids that already appear as nodes in `graph`.
    pub fn candidates_on_canvas(&self, graph: &AccumulatedGraph) -> Vec<ItemId> {
        let Some(candidates) = &self.candidates else {
            return Vec::new();
        };
        let similar = candidates.main_item_conflicts.iter().chain(
            candidates
                .influence_conflicts
                .values()
                .flat_map(|c| c.similar_items.iter()),
        );

        let mut found: Vec<ItemId> = Vec::new();
        for candidate in similar {
            let existing =
                resolve_existing_id(Some(candidate.id()), &candidate.item.name, graph);
            if let Some(id) = existing {
                if !found.contains(&id) {
                    found.push(id);
                }
            }
        }
        found
    }

    fn active_candidates(&self) -> Result<&ConflictCandidateSet, ConflictError> {
        match (&self.candidates, self.finished) {
            (Some(candidates), None) => Ok(candidates),
            _ => Err(ConflictError::NotActive(self.state())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::SimilarItem;
    use crate::graph::{GraphBatch, Item};
    use crate::storage::ProposedInfluence;

    fn similar(id: &str) -> SimilarItem {
        SimilarItem::new(Item::new(id, id.to_uppercase()), 90)
    }

    fn main_only() -> ConflictCandidateSet {
        ConflictCandidateSet::new().with_main_item_conflict(similar("e"))
    }

    fn influences_only() -> ConflictCandidateSet {
        ConflictCandidateSet::new()
            .with_influence_conflict(0, ProposedInfluence::new("F", "song"), vec![similar("f")])
            .with_influence_conflict(2, ProposedInfluence::new("G", "film"), vec![similar("g")])
    }

    #[test]
    fn default_resolver_is_idle() {
        let resolver = ConflictResolver::default();
        assert_eq!(resolver.state(), ResolverState::Idle);
        assert!(!resolver.is_complete());
        assert!(matches!(
            resolver.submit(),
            Err(ConflictError::NotActive(ResolverState::Idle))
        ));
    }

    #[test]
    fn begin_only_from_idle() {
        let mut resolver = ConflictResolver::default();
        resolver.begin(main_only()).unwrap();
        assert_eq!(resolver.state(), ResolverState::AwaitingMainItemChoice);
        assert!(resolver.begin(main_only()).is_err());
    }

    #[test]
    fn states_skip_empty_categories() {
        let mut resolver = ConflictResolver::new(influences_only());
        assert_eq!(resolver.state(), ResolverState::AwaitingInfluenceChoices);
        resolver.resolve_influence(0, Resolution::CreateNew).unwrap();
        resolver.resolve_influence(2, Resolution::CreateNew).unwrap();
        assert_eq!(resolver.state(), ResolverState::Resolved);
    }

    #[test]
    fn last_main_item_choice_wins() {
        let mut resolver = ConflictResolver::new(main_only());
        resolver
            .select_main_item(MainItemChoice::Existing(ItemId::from("e")))
            .unwrap();
        resolver.select_main_item(MainItemChoice::CreateNew).unwrap();
        assert_eq!(resolver.main_item_choice(), Some(&MainItemChoice::CreateNew));
        assert_eq!(resolver.overall_resolution_type(), ResolutionType::CreateNew);
    }

    #[test]
    fn rejects_choices_outside_candidate_set() {
        let mut resolver = ConflictResolver::new(influences_only());
        assert_eq!(
            resolver.select_main_item(MainItemChoice::Existing(ItemId::from("zzz"))),
            Err(ConflictError::UnknownCandidate(ItemId::from("zzz")))
        );
        assert_eq!(
            resolver.resolve_influence(1, Resolution::CreateNew),
            Err(ConflictError::UnknownInfluence(1))
        );
        assert_eq!(
            resolver.resolve_influence(0, Resolution::merge("g")),
            Err(ConflictError::UnknownCandidate(ItemId::from("g")))
        );
    }

    #[test]
    fn incomplete_submit_names_what_is_missing() {
        let mut resolver = ConflictResolver::new(influences_only());
        resolver.resolve_influence(2, Resolution::CreateNew).unwrap();
        let err = resolver.submit().unwrap_err();
        assert_eq!(
            err,
            ConflictError::IncompleteResolution {
                main_item_pending: false,
                unresolved_influences: vec![0],
            }
        );
        assert!(err.to_string().contains("influences [0] unresolved"));
    }

    #[test]
    fn any_influence_merge_without_main_conflicts_is_merge() {
        let mut resolver = ConflictResolver::new(influences_only());
        resolver.resolve_influence(0, Resolution::CreateNew).unwrap();
        resolver.resolve_influence(2, Resolution::merge("g")).unwrap();
        let request = resolver.submit().unwrap();
        assert_eq!(request.resolution_type, ResolutionType::Merge);
        assert_eq!(request.influence_resolutions.len(), 2);
        assert!(request.main_item_choice.is_none());
    }

    #[test]
    fn committed_resolver_refuses_further_choices() {
        let mut resolver = ConflictResolver::new(main_only());
        resolver.select_main_item(MainItemChoice::CreateNew).unwrap();
        resolver.mark_committed();
        assert_eq!(resolver.state(), ResolverState::Committed);
        assert_eq!(
            resolver.select_main_item(MainItemChoice::CreateNew),
            Err(ConflictError::NotActive(ResolverState::Committed))
        );
    }

    #[test]
    fn cancelled_resolver_cannot_submit() {
        let mut resolver = ConflictResolver::new(main_only());
        resolver.select_main_item(MainItemChoice::CreateNew).unwrap();
        resolver.cancel();
        assert!(matches!(
            resolver.submit(),
            Err(ConflictError::NotActive(ResolverState::Cancelled))
        ));
    }

    #[test]
    fn candidates_on_canvas_match_by_id_or_name() {
        let graph = AccumulatedGraph::new()
            .merge(
                &GraphBatch::new()
                    .with_node(Item::new("e", "E"))
                    .with_node(Item::new("other-id", "g")),
            )
            .graph;
        let set = main_only().with_influence_conflict(
            0,
            ProposedInfluence::new("G", "film"),
            vec![similar("g"), similar("f")],
        );
        let resolver = ConflictResolver::new(set);
        assert_eq!(
            resolver.candidates_on_canvas(&graph),
            vec![ItemId::from("e"), ItemId::from("other-id")]
        );
    }
}
