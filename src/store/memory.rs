use super::{
    apply_write, sort_records, CollectionRef, DocumentStore, FieldWrite, Patch, Query, Record,
    SnapshotStream, StoreError, StoreResult,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

type Collection = BTreeMap<String, Map<String, Value>>;

/// In-process document store. Used for local development
/// (`STORE_BACKEND=memory`) and as the base of the test doubles.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    collections: RwLock<HashMap<String, Collection>>,
    changes: Mutex<HashMap<String, broadcast::Sender<()>>>,
}

impl Inner {
    fn change_sender(&self, path: &str) -> broadcast::Sender<()> {
        let mut changes = match self.changes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        changes
            .entry(path.to_string())
            .or_insert_with(|| broadcast::channel(CHANGE_CHANNEL_CAPACITY).0)
            .clone()
    }

    fn notify(&self, path: &str) {
        // No receivers is fine.
        let _ = self.change_sender(path).send(());
    }

    async fn snapshot(&self, query: &Query) -> Vec<Record> {
        let collections = self.collections.read().await;
        let mut records: Vec<Record> = collections
            .get(&query.collection.to_string())
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Record::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(order) = &query.order_by {
            sort_records(&mut records, order);
        }
        records
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a document under a caller-chosen id, replacing any previous one.
    pub async fn insert_with_id(&self, collection: &CollectionRef, id: &str, data: Map<String, Value>) {
        let path = collection.to_string();
        {
            let mut collections = self.inner.collections.write().await;
            collections.entry(path.clone()).or_default().insert(id.to_string(), data);
        }
        self.inner.notify(&path);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &CollectionRef, id: &str) -> StoreResult<Option<Record>> {
        let collections = self.inner.collections.read().await;
        Ok(collections
            .get(&collection.to_string())
            .and_then(|docs| docs.get(id))
            .map(|data| Record::new(id, data.clone())))
    }

    async fn list(&self, query: &Query) -> StoreResult<Vec<Record>> {
        Ok(self.inner.snapshot(query).await)
    }

    async fn create(&self, collection: &CollectionRef, patch: Patch) -> StoreResult<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut data = Map::new();
        for (field, write) in patch.writes() {
            match write {
                // A fresh document has nothing to remove from.
                FieldWrite::ArrayRemove(_) => {
                    data.insert(field.clone(), Value::Array(Vec::new()));
                }
                other => apply_write(&mut data, field, other),
            }
        }

        let path = collection.to_string();
        {
            let mut collections = self.inner.collections.write().await;
            collections.entry(path.clone()).or_default().insert(id.clone(), data);
        }
        self.inner.notify(&path);
        Ok(id)
    }

    async fn update(&self, collection: &CollectionRef, id: &str, patch: Patch) -> StoreResult<()> {
        let path = collection.to_string();
        {
            let mut collections = self.inner.collections.write().await;
            let data = collections
                .get_mut(&path)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| StoreError::NotFound(format!("{}/{}", path, id)))?;
            for (field, write) in patch.writes() {
                apply_write(data, field, write);
            }
        }
        self.inner.notify(&path);
        Ok(())
    }

    async fn delete(&self, collection: &CollectionRef, id: &str) -> StoreResult<()> {
        let path = collection.to_string();
        let removed = {
            let mut collections = self.inner.collections.write().await;
            collections
                .get_mut(&path)
                .and_then(|docs| docs.remove(id))
                .is_some()
        };
        if removed {
            self.inner.notify(&path);
        }
        Ok(())
    }

    async fn watch(&self, query: &Query) -> StoreResult<SnapshotStream> {
        // Subscribe before the first read so no change slips between them.
        let rx = self.inner.change_sender(&query.collection.to_string()).subscribe();
        let inner = self.inner.clone();
        let query = query.clone();

        let snapshots = stream::unfold(
            (inner, query, rx, true),
            |(inner, query, mut rx, first)| async move {
                if !first {
                    match rx.recv().await {
                        // Lagged receivers still get a full snapshot.
                        Ok(()) | Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => return None,
                    }
                }
                let snapshot = inner.snapshot(&query).await;
                Some((Ok(snapshot), (inner, query, rx, false)))
            },
        );

        Ok(snapshots.boxed())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
