//! Common test utilities: fixture data and a scripted store

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_store;

pub use fixtures::{duplicate_payload, fresh_payload, id, item, sample, seeded_store};
pub use mock_store::{Call, MockStore, Scripted};
