//! In-memory storage backend.
//!
//! A complete `InfluenceStore` held in process memory: name-similarity
//! conflict detection, resolution-aware saves, and neighborhood expansion.
//! Used by tests and the CLI, and as a reference for remote backends.

use super::traits::{InfluenceStore, StorageError, StorageResult};
use super::types::{
    ExpandedGraph, ExpandedNode, ExpandedRelationship, ExpansionCounts, ExpansionRequest,
    InfluenceFetch, InfluenceRelation, ProposedInfluence, SavePayload, SaveResponse,
};
use crate::config::SimilarityConfig;
use crate::conflict::{
    ConflictCandidateSet, InfluencePreview, InfluenceResolutions, ItemPreview, PreviewData,
    Resolution, SimilarItem,
};
use crate::graph::{clamp_confidence, GraphLink, Item, ItemId, LinkKey, VerificationStatus};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

const SEARCH_LIMIT: usize = 10;
const DEFAULT_CATEGORY: &str = "Uncategorized";
const DEFAULT_EXPLANATION: &str = "No explanation provided";

#[derive(Debug, Clone)]
struct StoredItem {
    item: Item,
    creators: Vec<String>,
}

/// An item as it appears in a seed file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedItem {
    #[serde(flatten)]
    pub item: Item,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creators: Vec<String>,
}

/// Initial contents for a `MemoryStore`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSeed {
    #[serde(default)]
    pub items: Vec<SeedItem>,
    #[serde(default)]
    pub relations: Vec<GraphLink>,
}

/// Thread-safe in-memory influence store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: DashMap<ItemId, StoredItem>,
    /// At most one relation per ordered pair
    relations: DashMap<LinkKey, GraphLink>,
    similarity: SimilarityConfig,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_similarity(mut self, similarity: SimilarityConfig) -> Self {
        self.similarity = similarity;
        self
    }

    /// Build a store from seed data. Relations with unknown endpoints are errors.
    pub fn from_seed(seed: StoreSeed, similarity: SimilarityConfig) -> StorageResult<Self> {
        let store = Self::new().with_similarity(similarity);
        for seeded in seed.items {
            store.insert_item(seeded.item, seeded.creators);
        }
        for link in seed.relations {
            store.insert_relation(link)?;
        }
        debug!(
            items = store.item_count(),
            relations = store.relation_count(),
            "seeded memory store"
        );
        Ok(store)
    }

    /// Parse a JSON seed document
    pub fn from_seed_json(json: &str, similarity: SimilarityConfig) -> StorageResult<Self> {
        let seed: StoreSeed = serde_json::from_str(json)?;
        Self::from_seed(seed, similarity)
    }

    /// Insert or replace an item
    pub fn insert_item(&self, item: Item, creators: Vec<String>) {
        self.items
            .insert(item.id.clone(), StoredItem { item, creators });
    }

    /// Insert or replace the relation for its `(source, target)` pair
    pub fn insert_relation(&self, link: GraphLink) -> StorageResult<()> {
        for endpoint in [&link.source, &link.target] {
            if !self.items.contains_key(endpoint) {
                return Err(StorageError::NotFound(endpoint.clone()));
            }
        }
        self.relations.insert(link.key(), link);
        Ok(())
    }

    pub fn get_item(&self, id: &ItemId) -> Option<Item> {
        self.items.get(id).map(|r| r.item.clone())
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn has_relation(&self, source: &ItemId, target: &ItemId) -> bool {
        self.relations
            .contains_key(&LinkKey::new(source.clone(), target.clone()))
    }

    /// Stored items whose name or creators resemble the query, best first.
    ///
    /// Scores: exact name (case-insensitive), stored name contains the query,
    /// query contains the stored name. Containment only counts for fragments
    /// of at least `min_fragment_len` characters. A creator match admits a
    /// candidate regardless of its name score.
    pub fn find_similar(&self, name: &str, creator: Option<&str>) -> Vec<SimilarItem> {
        let cfg = &self.similarity;
        let query = name.trim().to_lowercase();
        let creator = creator
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());

        let mut matches: Vec<SimilarItem> = self
            .items
            .iter()
            .filter_map(|entry| {
                let stored = entry.value();
                let stored_name = stored.item.name.to_lowercase();
                let score = if stored_name == query {
                    cfg.exact_score
                } else if stored_name.contains(&query)
                    && query.chars().count() >= cfg.min_fragment_len
                {
                    cfg.contains_score
                } else if query.contains(&stored_name)
                    && stored_name.chars().count() >= cfg.min_fragment_len
                {
                    cfg.contained_score
                } else {
                    0
                };

                let creator_match = creator.as_ref().is_some_and(|wanted| {
                    stored
                        .creators
                        .iter()
                        .any(|c| c.to_lowercase().contains(wanted.as_str()))
                });

                if score >= cfg.threshold || creator_match {
                    let mut similar = SimilarItem::new(stored.item.clone(), score);
                    similar.creators = stored.creators.clone();
                    similar.existing_influences_count = self.incoming(&stored.item.id).len();
                    Some(similar)
                } else {
                    None
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity_score
                .cmp(&a.similarity_score)
                .then_with(|| a.item.name.cmp(&b.item.name))
        });
        matches.truncate(cfg.max_candidates);
        matches
    }

    /// Conflicts for the main item and every usable influence
    pub fn find_conflicts(&self, payload: &SavePayload) -> ConflictCandidateSet {
        let mut conflicts = ConflictCandidateSet::new();
        conflicts.main_item_conflicts =
            self.find_similar(&payload.main_item, payload.main_item_creator.as_deref());

        for (index, influence) in payload.influences.iter().enumerate() {
            if !influence.has_usable_name() {
                continue;
            }
            let similar = self.find_similar(&influence.name, influence.creator.as_deref());
            if !similar.is_empty() {
                conflicts = conflicts.with_influence_conflict(index, influence.clone(), similar);
            }
        }
        conflicts
    }

    fn preview(&self, conflicts: &ConflictCandidateSet) -> PreviewData {
        let main_item_preview = conflicts.main_item_conflicts.first().map(|best| {
            let existing_influences = self
                .incoming(best.id())
                .iter()
                .filter_map(|link| self.get_item(&link.source))
                .map(|item| item.name)
                .collect();
            ItemPreview {
                item: best.item.clone(),
                creators: best.creators.clone(),
                existing_influences,
            }
        });

        let influence_previews = conflicts
            .influence_conflicts
            .iter()
            .filter_map(|(index, conflict)| {
                conflict.similar_items.first().map(|best| {
                    (
                        *index,
                        InfluencePreview {
                            influence_name: conflict.influence.name.clone(),
                            similar_item: best.clone(),
                        },
                    )
                })
            })
            .collect();

        PreviewData {
            main_item_preview,
            influence_previews,
        }
    }

    fn incoming(&self, id: &ItemId) -> Vec<GraphLink> {
        let mut links: Vec<GraphLink> = self
            .relations
            .iter()
            .filter(|r| &r.value().target == id)
            .map(|r| r.value().clone())
            .collect();
        links.sort_by(|a, b| a.source.cmp(&b.source));
        links
    }

    fn outgoing(&self, id: &ItemId) -> Vec<GraphLink> {
        let mut links: Vec<GraphLink> = self
            .relations
            .iter()
            .filter(|r| &r.value().source == id)
            .map(|r| r.value().clone())
            .collect();
        links.sort_by(|a, b| a.target.cmp(&b.target));
        links
    }

    fn require_item(&self, id: &ItemId) -> StorageResult<Item> {
        self.get_item(id)
            .ok_or_else(|| StorageError::NotFound(id.clone()))
    }

    fn create_item(
        &self,
        name: &str,
        item_type: &str,
        year: Option<i32>,
        description: Option<String>,
        creator: Option<&str>,
    ) -> ItemId {
        let id = generate_id(name, Some(item_type));
        let mut item = Item::new(id.clone(), name.trim())
            .with_type(item_type)
            .with_verification(VerificationStatus::AiGenerated);
        item.year = year;
        item.description = description;
        item.created_at = Some(Utc::now());
        self.insert_item(item, usable_creator(creator).into_iter().collect());
        id
    }

    fn create_influence_item(&self, influence: &ProposedInfluence, target_name: &str) -> ItemId {
        let description = if influence.explanation.trim().is_empty() {
            format!("Influence on {target_name}")
        } else {
            influence.explanation.clone()
        };
        self.create_item(
            &influence.name,
            &influence.item_type,
            influence.year,
            Some(description),
            influence.creator.as_deref(),
        )
    }

    /// Link `source → target` for a proposed influence. Both endpoints must exist.
    fn link_influence(
        &self,
        influence: &ProposedInfluence,
        source: ItemId,
        target: ItemId,
    ) -> StorageResult<()> {
        self.insert_relation(influence_link(influence, source, target))
    }

    /// Create a brand-new main item plus its influences.
    fn create_structured(
        &self,
        payload: &SavePayload,
        resolutions: &InfluenceResolutions,
    ) -> StorageResult<ItemId> {
        validate(payload)?;
        for resolution in resolutions.values() {
            if let Resolution::Merge { target_id } = resolution {
                self.require_item(target_id)?;
            }
        }

        let main_id = self.create_item(
            &payload.main_item,
            &payload.main_item_type,
            payload.main_item_year,
            None,
            payload.main_item_creator.as_deref(),
        );

        let mut created = 0;
        let mut linked = 0;
        for (index, influence) in payload.influences.iter().enumerate() {
            if !influence.has_usable_name() {
                continue;
            }
            let source = match resolutions.get(&index) {
                Some(Resolution::Merge { target_id }) => {
                    linked += 1;
                    target_id.clone()
                }
                _ => {
                    created += 1;
                    self.create_influence_item(influence, &payload.main_item)
                }
            };
            self.link_influence(influence, source, main_id.clone())?;
        }

        info!(%main_id, created, linked, "saved new item");
        Ok(main_id)
    }
}

#[async_trait]
impl InfluenceStore for MemoryStore {
    async fn fetch_influences(
        &self,
        item_id: &ItemId,
        scopes: &[String],
    ) -> StorageResult<InfluenceFetch> {
        let main_item = self.require_item(item_id)?;
        let incoming = self.incoming(item_id);

        let mut available_scopes: Vec<String> =
            incoming.iter().filter_map(|link| link.scope.clone()).collect();
        available_scopes.sort();
        available_scopes.dedup();

        let mut selected = Vec::new();
        for link in incoming {
            if !in_scope(&link, scopes) {
                continue;
            }
            let from_item = self.require_item(&link.source)?;
            selected.push((from_item, link));
        }
        // Oldest influencer first; undated ones trail
        selected.sort_by_key(|(from_item, _)| (from_item.year.is_none(), from_item.year));

        let mut categories: Vec<String> = Vec::new();
        let mut influences = Vec::with_capacity(selected.len());
        for (from_item, link) in selected {
            if !categories.contains(&link.category) {
                categories.push(link.category.clone());
            }
            influences.push(InfluenceRelation {
                from_item,
                to_item: main_item.clone(),
                confidence: link.confidence,
                influence_type: link.influence_type,
                category: link.category,
                explanation: link.explanation,
                source: link.source_ref,
                year_of_influence: None,
                scope: link.scope,
                clusters: link.clusters,
            });
        }
        debug!(%item_id, kept = influences.len(), ?scopes, "influences fetched");

        Ok(InfluenceFetch {
            main_item,
            influences,
            categories,
            available_scopes,
        })
    }

    async fn fetch_expanded(&self, request: &ExpansionRequest) -> StorageResult<ExpandedGraph> {
        let center = self.require_item(&request.item_id)?;

        let mut seen: HashSet<ItemId> = HashSet::from([center.id.clone()]);
        let mut nodes = vec![ExpandedNode {
            item: center,
            is_center: true,
        }];
        let mut relationships: Vec<ExpandedRelationship> = Vec::new();
        let mut seen_links: HashSet<LinkKey> = HashSet::new();
        let mut frontier = vec![request.item_id.clone()];

        for _ in 0..request.max_depth {
            let mut next = Vec::new();
            for id in &frontier {
                let mut hops: Vec<(GraphLink, ItemId)> = Vec::new();
                if request.include_outgoing {
                    hops.extend(self.outgoing(id).into_iter().map(|l| {
                        let other = l.target.clone();
                        (l, other)
                    }));
                }
                if request.include_incoming {
                    hops.extend(self.incoming(id).into_iter().map(|l| {
                        let other = l.source.clone();
                        (l, other)
                    }));
                }

                for (link, other) in hops {
                    if seen.insert(other.clone()) {
                        nodes.push(ExpandedNode {
                            item: self.require_item(&other)?,
                            is_center: false,
                        });
                        next.push(other);
                    }
                    if seen_links.insert(link.key()) {
                        relationships.push(ExpandedRelationship {
                            from_id: link.source,
                            to_id: link.target,
                            confidence: link.confidence,
                            influence_type: link.influence_type,
                            category: link.category,
                            explanation: link.explanation,
                            source: link.source_ref,
                            scope: link.scope,
                            clusters: link.clusters,
                        });
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        Ok(ExpandedGraph {
            nodes,
            relationships,
            center_item_id: request.item_id.clone(),
        })
    }

    async fn expansion_counts(&self, item_id: &ItemId) -> StorageResult<ExpansionCounts> {
        self.require_item(item_id)?;
        Ok(ExpansionCounts {
            incoming_influences: self.incoming(item_id).len(),
            outgoing_influences: self.outgoing(item_id).len(),
        })
    }

    async fn search(&self, query: &str) -> StorageResult<Vec<Item>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let mut found: Vec<Item> = self
            .items
            .iter()
            .filter(|entry| {
                let stored = entry.value();
                stored.item.name.to_lowercase().contains(&query)
                    || stored
                        .creators
                        .iter()
                        .any(|c| c.to_lowercase().contains(&query))
            })
            .map(|entry| entry.value().item.clone())
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        found.truncate(SEARCH_LIMIT);
        Ok(found)
    }

    async fn save(&self, payload: &SavePayload) -> StorageResult<SaveResponse> {
        validate(payload)?;
        let conflicts = self.find_conflicts(payload);
        if !conflicts.is_empty() {
            debug!(
                main_item = %payload.main_item,
                total = conflicts.total_conflicts(),
                "save requires review"
            );
            let preview = self.preview(&conflicts);
            return Ok(SaveResponse::RequiresReview { conflicts, preview });
        }
        let item_id = self.create_structured(payload, &InfluenceResolutions::new())?;
        Ok(SaveResponse::Saved { item_id })
    }

    async fn force_save(
        &self,
        payload: &SavePayload,
        resolutions: &InfluenceResolutions,
    ) -> StorageResult<SaveResponse> {
        let item_id = self.create_structured(payload, resolutions)?;
        Ok(SaveResponse::Saved { item_id })
    }

    async fn merge_into(
        &self,
        existing_id: &ItemId,
        payload: &SavePayload,
        resolutions: &InfluenceResolutions,
    ) -> StorageResult<SaveResponse> {
        let existing = self.require_item(existing_id)?;
        for resolution in resolutions.values() {
            if let Resolution::Merge { target_id } = resolution {
                self.require_item(target_id)?;
            }
        }

        if let Some(creator) = usable_creator(payload.main_item_creator.as_deref()) {
            if let Some(mut stored) = self.items.get_mut(existing_id) {
                if stored.creators.is_empty() {
                    stored.creators.push(creator);
                }
            }
        }

        let mut attached: HashSet<String> = self
            .incoming(existing_id)
            .iter()
            .filter_map(|link| self.get_item(&link.source))
            .map(|item| item.name.to_lowercase())
            .collect();

        let mut created = 0;
        let mut linked = 0;
        for (index, influence) in payload.influences.iter().enumerate() {
            if !influence.has_usable_name() {
                continue;
            }
            match resolutions.get(&index) {
                Some(Resolution::Merge { target_id }) => {
                    self.link_influence(influence, target_id.clone(), existing_id.clone())?;
                    linked += 1;
                }
                _ => {
                    let name = influence.name.trim().to_lowercase();
                    if attached.contains(&name) {
                        debug!(influence = %influence.name, "skipping influence already attached");
                        continue;
                    }
                    let source = self.create_influence_item(influence, &existing.name);
                    self.link_influence(influence, source, existing_id.clone())?;
                    attached.insert(name);
                    created += 1;
                }
            }
        }

        info!(%existing_id, created, linked, "merged into existing item");
        Ok(SaveResponse::Saved {
            item_id: existing_id.clone(),
        })
    }
}

fn validate(payload: &SavePayload) -> StorageResult<()> {
    if payload.main_item.trim().is_empty() {
        return Err(StorageError::Rejected("main item name is empty".to_string()));
    }
    Ok(())
}

fn usable_creator(creator: Option<&str>) -> Option<String> {
    creator
        .map(str::trim)
        .filter(|c| !c.is_empty() && !matches!(c.to_lowercase().as_str(), "none" | "null"))
        .map(str::to_string)
}

fn in_scope(link: &GraphLink, scopes: &[String]) -> bool {
    scopes.is_empty()
        || link
            .scope
            .as_ref()
            .is_some_and(|scope| scopes.contains(scope))
}

fn influence_link(influence: &ProposedInfluence, source: ItemId, target: ItemId) -> GraphLink {
    let category = influence.category.trim();
    let explanation = influence.explanation.trim();
    GraphLink {
        source,
        target,
        confidence: clamp_confidence(influence.confidence),
        influence_type: influence.influence_type.clone(),
        category: if category.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            category.to_string()
        },
        explanation: if explanation.is_empty() {
            DEFAULT_EXPLANATION.to_string()
        } else {
            explanation.to_string()
        },
        source_ref: influence.source.clone(),
        scope: influence.scope.clone(),
        clusters: influence.clusters.clone(),
    }
}

fn slug(text: &str) -> String {
    text.to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect()
}

/// `<name>-<type>-<8 hex>`, e.g. `pauls-boutique-album-1a2b3c4d`
fn generate_id(name: &str, item_type: Option<&str>) -> ItemId {
    let suffix = Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];
    match item_type.map(slug).filter(|t| !t.is_empty()) {
        Some(kind) => ItemId::from(format!("{}-{}-{}", slug(name.trim()), kind, suffix)),
        None => ItemId::from(format!("{}-{}", slug(name.trim()), suffix)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::Direction;
    use super::*;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_item(Item::new("ill", "Licensed to Ill"), vec!["Beastie Boys".to_string()]);
        store.insert_item(Item::new("pb", "Paul's Boutique"), vec!["Beastie Boys".to_string()]);
        store.insert_item(Item::new("fd", "Funky Drummer"), vec!["James Brown".to_string()]);
        store.insert_item(Item::new("sd", "Shake Your Rump"), Vec::new());
        store
            .insert_relation(GraphLink::new("fd", "pb").with_category("Samples"))
            .unwrap();
        store
            .insert_relation(GraphLink::new("pb", "sd").with_category("Samples"))
            .unwrap();
        store
    }

    #[test]
    fn generated_ids_are_slugged() {
        let id = generate_id("Paul's Boutique", Some("Studio Album"));
        assert!(id.as_str().starts_with("pauls-boutique-studio-album-"));
        assert_eq!(id.as_str().len(), "pauls-boutique-studio-album-".len() + 8);
        assert!(generate_id("X", None).as_str().starts_with("x-"));
    }

    #[test]
    fn similarity_scores_follow_match_kind() {
        let s = store();
        let exact = s.find_similar("paul's boutique", None);
        assert_eq!(exact[0].id().as_str(), "pb");
        assert_eq!(exact[0].similarity_score, 100);

        let contains = s.find_similar("Funky", None);
        assert_eq!(contains[0].similarity_score, 80);

        let contained = s.find_similar("Funky Drummer (Remix)", None);
        assert_eq!(contained[0].similarity_score, 70);
    }

    #[test]
    fn short_fragments_do_not_match() {
        let s = store();
        assert!(s.find_similar("Ill", None).iter().all(|c| c.similarity_score == 100));
        assert!(s.find_similar("Pau", None).is_empty());
    }

    #[test]
    fn creator_match_admits_low_scoring_names() {
        let s = store();
        let found = s.find_similar("Hello Nasty", Some("beastie"));
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| c.similarity_score == 0));
    }

    #[test]
    fn similar_items_report_existing_influences() {
        let s = store();
        let found = s.find_similar("Paul's Boutique", None);
        assert_eq!(found[0].existing_influences_count, 1);
    }

    #[test]
    fn candidates_capped_by_config() {
        let s = MemoryStore::new().with_similarity(SimilarityConfig {
            max_candidates: 1,
            ..Default::default()
        });
        s.insert_item(Item::new("a", "Blue Monday"), Vec::new());
        s.insert_item(Item::new("b", "Blue Monday 88"), Vec::new());
        assert_eq!(s.find_similar("Blue Monday", None).len(), 1);
    }

    #[test]
    fn relation_with_unknown_endpoint_rejected() {
        let s = store();
        let err = s.insert_relation(GraphLink::new("pb", "ghost")).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(id) if id.as_str() == "ghost"));
    }

    #[test]
    fn seed_json_roundtrip() {
        let json = r#"{
            "items": [
                {"id": "a", "name": "A", "creators": ["Someone"]},
                {"id": "b", "name": "B"}
            ],
            "relations": [
                {"source": "a", "target": "b", "confidence": 0.8,
                 "influence_type": "direct", "category": "Style", "explanation": "a shaped b"}
            ]
        }"#;
        let s = MemoryStore::from_seed_json(json, SimilarityConfig::default()).unwrap();
        assert_eq!(s.item_count(), 2);
        assert!(s.has_relation(&ItemId::from("a"), &ItemId::from("b")));
    }

    #[tokio::test]
    async fn expanded_graph_respects_direction_and_depth() {
        let s = store();
        let out = s
            .fetch_expanded(&ExpansionRequest::new("fd", Direction::Outgoing, 1))
            .await
            .unwrap();
        assert_eq!(out.nodes.len(), 2);
        assert!(out.nodes[0].is_center);

        let deep = s
            .fetch_expanded(&ExpansionRequest::new("fd", Direction::Outgoing, 2))
            .await
            .unwrap();
        assert_eq!(deep.nodes.len(), 3);
        assert_eq!(deep.relationships.len(), 2);

        let incoming = s
            .fetch_expanded(&ExpansionRequest::new("fd", Direction::Incoming, 2))
            .await
            .unwrap();
        assert_eq!(incoming.nodes.len(), 1);
    }

    #[tokio::test]
    async fn search_matches_name_or_creator() {
        let s = store();
        let names: Vec<String> = s
            .search("beastie")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Licensed to Ill", "Paul's Boutique"]);
        assert!(s.search("  ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_without_conflicts_creates_everything() {
        let s = store();
        let payload = SavePayload::new("Hello Nasty", "album")
            .with_influence(ProposedInfluence::new("Dub Reggae", "genre").with_category("Genres"))
            .with_influence(ProposedInfluence::new("none", "genre"));
        let response = s.save(&payload).await.unwrap();
        let SaveResponse::Saved { item_id } = response else {
            panic!("expected saved");
        };
        let fetched = s.fetch_influences(&item_id, &[]).await.unwrap();
        assert_eq!(fetched.influences.len(), 1);
        assert_eq!(fetched.categories, vec!["Genres".to_string()]);
        assert_eq!(
            fetched.main_item.verification_status,
            Some(VerificationStatus::AiGenerated)
        );
    }

    #[tokio::test]
    async fn influences_filtered_by_scope_and_ordered_by_year() {
        let s = MemoryStore::new();
        s.insert_item(Item::new("main", "Entroducing"), Vec::new());
        s.insert_item(Item::new("new", "Newer Break").with_year(1990), Vec::new());
        s.insert_item(Item::new("old", "Old Break").with_year(1969), Vec::new());
        s.insert_item(Item::new("undated", "Undated Loop"), Vec::new());
        s.insert_item(Item::new("nano", "Hi-hat Pattern").with_year(1975), Vec::new());
        let link = |from: &str, scope: &str, category: &str| {
            GraphLink::new(from, "main")
                .with_scope(scope)
                .with_category(category)
        };
        s.insert_relation(link("undated", "macro", "Texture")).unwrap();
        s.insert_relation(link("new", "macro", "Samples")).unwrap();
        s.insert_relation(link("old", "micro", "Breaks")).unwrap();
        s.insert_relation(link("nano", "nano", "Drums")).unwrap();

        let all = s.fetch_influences(&ItemId::from("main"), &[]).await.unwrap();
        let order: Vec<&str> = all.influences.iter().map(|r| r.from_item.id.as_str()).collect();
        assert_eq!(order, vec!["old", "nano", "new", "undated"]);
        assert_eq!(all.available_scopes, vec!["macro", "micro", "nano"]);

        let scopes = vec!["macro".to_string(), "micro".to_string()];
        let filtered = s.fetch_influences(&ItemId::from("main"), &scopes).await.unwrap();
        let order: Vec<&str> =
            filtered.influences.iter().map(|r| r.from_item.id.as_str()).collect();
        assert_eq!(order, vec!["old", "new", "undated"]);
        assert_eq!(filtered.categories, vec!["Breaks", "Samples", "Texture"]);
        assert_eq!(filtered.available_scopes, all.available_scopes);
        assert!(filtered.influences.iter().all(|r| r.scope.as_deref() != Some("nano")));
    }

    #[tokio::test]
    async fn unscoped_relations_only_appear_unfiltered() {
        let s = store();
        let pb = ItemId::from("pb");
        assert_eq!(s.fetch_influences(&pb, &[]).await.unwrap().influences.len(), 1);
        let macro_only = s.fetch_influences(&pb, &["macro".to_string()]).await.unwrap();
        assert!(macro_only.influences.is_empty());
        assert!(macro_only.categories.is_empty());
        assert!(macro_only.available_scopes.is_empty());
    }

    #[tokio::test]
    async fn saved_influence_keeps_its_scope() {
        let s = store();
        let payload = SavePayload::new("Hello Nasty", "album").with_influence(
            ProposedInfluence::new("Dub Reggae", "genre").with_scope("micro"),
        );
        let SaveResponse::Saved { item_id } = s.save(&payload).await.unwrap() else {
            panic!("expected saved");
        };
        let fetched = s.fetch_influences(&item_id, &[]).await.unwrap();
        assert_eq!(fetched.influences[0].scope.as_deref(), Some("micro"));
        assert_eq!(fetched.available_scopes, vec!["micro".to_string()]);
    }

    #[tokio::test]
    async fn save_with_similar_items_requires_review() {
        let s = store();
        let payload = SavePayload::new("Paul's Boutique", "album")
            .with_influence(ProposedInfluence::new("Funky Drummer", "song"));
        let before = s.item_count();
        let response = s.save(&payload).await.unwrap();
        let SaveResponse::RequiresReview { conflicts, preview } = response else {
            panic!("expected review");
        };
        assert_eq!(conflicts.main_item_conflicts[0].id().as_str(), "pb");
        assert!(conflicts.influence_conflicts.contains_key(&0));
        let main_preview = preview.main_item_preview.unwrap();
        assert_eq!(main_preview.existing_influences, vec!["Funky Drummer".to_string()]);
        assert_eq!(s.item_count(), before);
    }

    #[tokio::test]
    async fn force_save_links_merged_influences() {
        let s = store();
        let payload = SavePayload::new("Paul's Boutique", "album")
            .with_influence(ProposedInfluence::new("Funky Drummer", "song"));
        let resolutions = InfluenceResolutions::from([(0, Resolution::merge("fd"))]);
        let SaveResponse::Saved { item_id } = s.force_save(&payload, &resolutions).await.unwrap()
        else {
            panic!("expected saved");
        };
        assert_ne!(item_id.as_str(), "pb");
        assert!(s.has_relation(&ItemId::from("fd"), &item_id));
        assert_eq!(s.item_count(), 5);
    }

    #[tokio::test]
    async fn merge_into_skips_already_attached_names() {
        let s = store();
        let payload = SavePayload::new("Paul's Boutique", "album")
            .with_influence(ProposedInfluence::new("funky drummer", "song"))
            .with_influence(ProposedInfluence::new("Rhymin & Stealin", "song"));
        let response = s
            .merge_into(&ItemId::from("pb"), &payload, &InfluenceResolutions::new())
            .await
            .unwrap();
        assert_eq!(
            response,
            SaveResponse::Saved {
                item_id: ItemId::from("pb")
            }
        );
        let fetched = s.fetch_influences(&ItemId::from("pb"), &[]).await.unwrap();
        assert_eq!(fetched.influences.len(), 2);
    }

    #[tokio::test]
    async fn merge_into_unknown_item_fails_without_writes() {
        let s = store();
        let before = s.item_count();
        let err = s
            .merge_into(
                &ItemId::from("ghost"),
                &SavePayload::new("X", "song").with_influence(ProposedInfluence::new("Y", "song")),
                &InfluenceResolutions::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert_eq!(s.item_count(), before);
    }

    #[tokio::test]
    async fn empty_main_item_rejected() {
        let s = store();
        let err = s.save(&SavePayload::new("  ", "song")).await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected(_)));
    }
}
