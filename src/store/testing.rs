//! Test double: a memory store that records every call, can fail chosen
//! operations and can replay a scripted live feed.

use super::{
    CollectionRef, DocumentStore, MemoryStore, Patch, Query, Record, SnapshotStream, StoreError,
    StoreResult,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Get(String),
    List(String),
    Create(String),
    Update(String, Patch),
    Delete(String),
    Watch(String),
}

#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    calls: Mutex<Vec<StoreCall>>,
    failing_lists: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
    fail_updates: Mutex<bool>,
    script: Mutex<Option<Vec<StoreResult<Vec<Record>>>>>,
    after_delete: Mutex<Vec<(String, CollectionRef, String, Value)>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn update_calls(&self) -> Vec<(String, Patch)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Update(path, patch) => Some((path, patch)),
                _ => None,
            })
            .collect()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Delete(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Every `list` of this collection path fails.
    pub fn fail_list(&self, path: &str) {
        self.failing_lists.lock().unwrap().insert(path.to_string());
    }

    /// Deletes of this document path fail until `heal_delete` is called.
    pub fn fail_delete(&self, path: &str) {
        self.failing_deletes.lock().unwrap().insert(path.to_string());
    }

    pub fn heal_delete(&self, path: &str) {
        self.failing_deletes.lock().unwrap().remove(path);
    }

    pub fn fail_updates(&self, fail: bool) {
        *self.fail_updates.lock().unwrap() = fail;
    }

    /// Next `watch` replays these results and then ends.
    pub fn script_watch(&self, results: Vec<StoreResult<Vec<Record>>>) {
        *self.script.lock().unwrap() = Some(results);
    }

    /// Once `trigger` is deleted, writes `data` as `collection/id`, like a
    /// concurrent writer that raced the delete.
    pub fn insert_after_delete(&self, trigger: &str, collection: CollectionRef, id: &str, data: Value) {
        self.after_delete
            .lock()
            .unwrap()
            .push((trigger.to_string(), collection, id.to_string(), data));
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn record(id: &str, data: Value) -> Record {
    match data {
        Value::Object(map) => Record::new(id, map),
        other => panic!("expected a JSON object, got {}", other),
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn get(&self, collection: &CollectionRef, id: &str) -> StoreResult<Option<Record>> {
        self.record(StoreCall::Get(format!("{}/{}", collection, id)));
        self.inner.get(collection, id).await
    }

    async fn list(&self, query: &Query) -> StoreResult<Vec<Record>> {
        let path = query.collection.to_string();
        self.record(StoreCall::List(path.clone()));
        if self.failing_lists.lock().unwrap().contains(&path) {
            return Err(StoreError::Backend(format!("injected list failure on {}", path)));
        }
        self.inner.list(query).await
    }

    async fn create(&self, collection: &CollectionRef, patch: Patch) -> StoreResult<String> {
        self.record(StoreCall::Create(collection.to_string()));
        self.inner.create(collection, patch).await
    }

    async fn update(&self, collection: &CollectionRef, id: &str, patch: Patch) -> StoreResult<()> {
        let path = format!("{}/{}", collection, id);
        self.record(StoreCall::Update(path.clone(), patch.clone()));
        if *self.fail_updates.lock().unwrap() {
            return Err(StoreError::Backend(format!("injected update failure on {}", path)));
        }
        self.inner.update(collection, id, patch).await
    }

    async fn delete(&self, collection: &CollectionRef, id: &str) -> StoreResult<()> {
        let path = format!("{}/{}", collection, id);
        self.record(StoreCall::Delete(path.clone()));
        if self.failing_deletes.lock().unwrap().contains(&path) {
            return Err(StoreError::Backend(format!("injected delete failure on {}", path)));
        }
        self.inner.delete(collection, id).await?;

        let triggered: Vec<_> = {
            let mut pending = self.after_delete.lock().unwrap();
            let (hit, rest): (Vec<_>, Vec<_>) = pending.drain(..).partition(|(trigger, ..)| *trigger == path);
            *pending = rest;
            hit
        };
        for (_, target, id, data) in triggered {
            if let Value::Object(map) = data {
                self.inner.insert_with_id(&target, &id, map).await;
            }
        }
        Ok(())
    }

    async fn watch(&self, query: &Query) -> StoreResult<SnapshotStream> {
        self.record(StoreCall::Watch(query.collection.to_string()));
        let scripted = self.script.lock().unwrap().take();
        match scripted {
            Some(results) => Ok(stream::iter(results).boxed()),
            None => self.inner.watch(query).await,
        }
    }

    fn backend(&self) -> &'static str {
        "recording"
    }
}
