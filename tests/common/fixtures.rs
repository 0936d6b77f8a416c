//! A small sampling-history world for integration tests
//!
//! ```text
//! amen ──▶ compton ──▶ chronic
//!   │
//!   └────▶ endtroducing
//! drummer ──▶ boutique
//! ```

use influence_graph::{
    GraphLink, Item, ItemId, MemoryStore, ProposedInfluence, SavePayload, VerificationStatus,
};

pub fn item(id: &str, name: &str, kind: &str, year: i32) -> Item {
    Item::new(id, name)
        .with_type(kind)
        .with_year(year)
        .with_verification(VerificationStatus::UserVerified)
}

pub fn sample(source: &str, target: &str) -> GraphLink {
    GraphLink::new(source, target)
        .with_confidence(0.9)
        .with_influence_type("audio_sample")
        .with_category("Samples")
        .with_explanation(format!("{source} is sampled on {target}"))
}

pub fn id(raw: &str) -> ItemId {
    ItemId::from(raw)
}

/// The world above, using default similarity scoring
pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    for (item, creator) in [
        (item("amen", "Amen, Brother", "song", 1969), "The Winstons"),
        (item("compton", "Straight Outta Compton", "album", 1988), "N.W.A"),
        (item("chronic", "The Chronic", "album", 1992), "Dr. Dre"),
        (item("endtroducing", "Endtroducing.....", "album", 1996), "DJ Shadow"),
        (item("drummer", "Funky Drummer", "song", 1970), "James Brown"),
        (item("boutique", "Paul's Boutique", "album", 1989), "Beastie Boys"),
    ] {
        store.insert_item(item, vec![creator.to_string()]);
    }
    for (source, target) in [
        ("amen", "compton"),
        ("compton", "chronic"),
        ("amen", "endtroducing"),
        ("drummer", "boutique"),
    ] {
        store
            .insert_relation(sample(source, target))
            .expect("fixture endpoints exist");
    }
    store
}

/// A payload with no similar items in the seeded world
pub fn fresh_payload() -> SavePayload {
    SavePayload::new("Midnight Marauders", "album")
        .with_creator("A Tribe Called Quest")
        .with_year(1993)
        .with_influence(
            ProposedInfluence::new("Electric Relaxation Break", "song")
                .with_category("Samples")
                .with_influence_type("audio_sample")
                .with_confidence(0.8),
        )
}

/// A payload whose main item and first influence both match stored items
pub fn duplicate_payload() -> SavePayload {
    SavePayload::new("Paul's Boutique", "album")
        .with_creator("Beastie Boys")
        .with_influence(
            ProposedInfluence::new("Funky Drummer", "song")
                .with_category("Samples")
                .with_explanation("drum break"),
        )
        .with_influence(
            ProposedInfluence::new("Shake Your Rump Bassline", "technique").with_category("Craft"),
        )
}
