//! Scripted store for orchestrator tests
//!
//! Wraps a `MemoryStore`. Scripted entries override the next write call;
//! `fail_next_fetch` makes the next read fail with a network error. Every
//! call is recorded.

use async_trait::async_trait;
use influence_graph::conflict::InfluenceResolutions;
use influence_graph::storage::{
    ExpandedGraph, ExpansionCounts, ExpansionRequest, InfluenceFetch,
};
use influence_graph::{
    InfluenceStore, Item, ItemId, MemoryStore, SavePayload, SaveResponse, StorageError,
    StorageResult,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// What the next write call should do instead of reaching the inner store
#[derive(Debug, Clone)]
pub enum Scripted {
    NetworkFailure,
    Respond(SaveResponse),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchInfluences(ItemId),
    FetchExpanded(ItemId),
    ExpansionCounts(ItemId),
    Search(String),
    Save(String),
    ForceSave(InfluenceResolutions),
    MergeInto(ItemId, InfluenceResolutions),
}

pub struct MockStore {
    inner: MemoryStore,
    writes: Mutex<VecDeque<Scripted>>,
    fail_fetch: AtomicBool,
    calls: Mutex<Vec<Call>>,
}

impl MockStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            writes: Mutex::new(VecDeque::new()),
            fail_fetch: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn script(&self, entry: Scripted) {
        self.writes.lock().unwrap().push_back(entry);
    }

    pub fn fail_next_fetch(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn write_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Save(_) | Call::ForceSave(_) | Call::MergeInto(..)))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_fetch(&self) -> StorageResult<()> {
        if self.fail_fetch.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Network("connection reset".into()));
        }
        Ok(())
    }

    fn next_write(&self) -> Option<Scripted> {
        self.writes.lock().unwrap().pop_front()
    }
}

fn scripted(entry: Scripted) -> StorageResult<SaveResponse> {
    match entry {
        Scripted::NetworkFailure => Err(StorageError::Network("timed out".into())),
        Scripted::Respond(response) => Ok(response),
    }
}

#[async_trait]
impl InfluenceStore for MockStore {
    async fn fetch_influences(
        &self,
        item_id: &ItemId,
        scopes: &[String],
    ) -> StorageResult<InfluenceFetch> {
        self.record(Call::FetchInfluences(item_id.clone()));
        self.check_fetch()?;
        self.inner.fetch_influences(item_id, scopes).await
    }

    async fn fetch_expanded(&self, request: &ExpansionRequest) -> StorageResult<ExpandedGraph> {
        self.record(Call::FetchExpanded(request.item_id.clone()));
        self.check_fetch()?;
        self.inner.fetch_expanded(request).await
    }

    async fn expansion_counts(&self, item_id: &ItemId) -> StorageResult<ExpansionCounts> {
        self.record(Call::ExpansionCounts(item_id.clone()));
        self.check_fetch()?;
        self.inner.expansion_counts(item_id).await
    }

    async fn search(&self, query: &str) -> StorageResult<Vec<Item>> {
        self.record(Call::Search(query.to_string()));
        self.check_fetch()?;
        self.inner.search(query).await
    }

    async fn save(&self, payload: &SavePayload) -> StorageResult<SaveResponse> {
        self.record(Call::Save(payload.main_item.clone()));
        match self.next_write() {
            Some(entry) => scripted(entry),
            None => self.inner.save(payload).await,
        }
    }

    async fn force_save(
        &self,
        payload: &SavePayload,
        resolutions: &InfluenceResolutions,
    ) -> StorageResult<SaveResponse> {
        self.record(Call::ForceSave(resolutions.clone()));
        match self.next_write() {
            Some(entry) => scripted(entry),
            None => self.inner.force_save(payload, resolutions).await,
        }
    }

    async fn merge_into(
        &self,
        existing_id: &ItemId,
        payload: &SavePayload,
        resolutions: &InfluenceResolutions,
    ) -> StorageResult<SaveResponse> {
        self.record(Call::MergeInto(existing_id.clone(), resolutions.clone()));
        match self.next_write() {
            Some(entry) => scripted(entry),
            None => self.inner.merge_into(existing_id, payload, resolutions).await,
        }
    }
}
