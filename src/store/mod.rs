// ==================== DOCUMENT STORE ====================
// Backend-as-a-service seam: documents addressed by opaque ids inside
// collection paths, partial field updates with array set operations,
// and live queries that redeliver full ordered snapshots.

pub mod memory;
pub mod mongo;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Stream of complete query results, one item per upstream change.
pub type SnapshotStream = BoxStream<'static, StoreResult<Vec<Record>>>;

/// Path of a collection: either a root collection (`posts`) or a
/// subcollection scoped to a parent document (`posts/{id}/comments`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    parent: Option<(String, String)>,
    name: String,
}

impl CollectionRef {
    pub fn root(name: &str) -> Self {
        Self { parent: None, name: name.to_string() }
    }

    pub fn sub(parent_collection: &str, parent_id: &str, name: &str) -> Self {
        Self {
            parent: Some((parent_collection.to_string(), parent_id.to_string())),
            name: name.to_string(),
        }
    }

    pub fn users() -> Self {
        Self::root("users")
    }

    pub fn posts() -> Self {
        Self::root("posts")
    }

    pub fn comments(post_id: &str) -> Self {
        Self::sub("posts", post_id, "comments")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"{collection}/{id}"` of the owning document, if any.
    pub fn parent_path(&self) -> Option<String> {
        self.parent.as_ref().map(|(c, id)| format!("{}/{}", c, id))
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent_path() {
            Some(parent) => write!(f, "{}/{}", parent, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: CollectionRef,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn new(collection: CollectionRef) -> Self {
        Self { collection, order_by: None }
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy { field: field.to_string(), direction });
        self
    }
}

/// A single field write.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWrite {
    Set(Value),
    ServerTimestamp,
    ArrayUnion(Vec<Value>),
    ArrayRemove(Vec<Value>),
}

/// Ordered set of top-level field writes applied by `create` or `update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    writes: Vec<(String, FieldWrite)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.writes.push((field.to_string(), FieldWrite::Set(value.into())));
        self
    }

    pub fn server_timestamp(mut self, field: &str) -> Self {
        self.writes.push((field.to_string(), FieldWrite::ServerTimestamp));
        self
    }

    pub fn array_union(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.writes.push((field.to_string(), FieldWrite::ArrayUnion(vec![value.into()])));
        self
    }

    pub fn array_remove(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.writes.push((field.to_string(), FieldWrite::ArrayRemove(vec![value.into()])));
        self
    }

    pub fn writes(&self) -> &[(String, FieldWrite)] {
        &self.writes
    }

    pub fn get(&self, field: &str) -> Option<&FieldWrite> {
        self.writes.iter().find(|(f, _)| f == field).map(|(_, w)| w)
    }
}

/// A stored document as returned by reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self { id: id.into(), data }
    }

    /// Decodes into a model; the record id is exposed to the model as `id`.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(data))
            .map_err(|e| StoreError::Encoding(format!("{} ({})", e, self.id)))
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &CollectionRef, id: &str) -> StoreResult<Option<Record>>;

    async fn list(&self, query: &Query) -> StoreResult<Vec<Record>>;

    /// Inserts a document and returns its store-assigned id.
    async fn create(&self, collection: &CollectionRef, patch: Patch) -> StoreResult<String>;

    /// Applies a partial update; fails with `NotFound` when the document is absent.
    async fn update(&self, collection: &CollectionRef, id: &str, patch: Patch) -> StoreResult<()>;

    /// Deleting an absent document succeeds.
    async fn delete(&self, collection: &CollectionRef, id: &str) -> StoreResult<()>;

    /// Live query. The first snapshot is emitted immediately, then one per change.
    async fn watch(&self, query: &Query) -> StoreResult<SnapshotStream>;

    fn backend(&self) -> &'static str;
}

/// Store clock used for `FieldWrite::ServerTimestamp`.
pub fn server_now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Orders JSON values the way the live queries sort: numbers numerically,
/// strings lexically, booleans false < true.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Sorts records by `order`; records lacking the field always go last.
pub fn sort_records(records: &mut [Record], order: &OrderBy) {
    records.sort_by(|a, b| {
        match (a.data.get(&order.field), b.data.get(&order.field)) {
            (Some(x), Some(y)) if !x.is_null() && !y.is_null() => {
                let ord = compare_values(x, y);
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            }
            (Some(x), _) if !x.is_null() => Ordering::Less,
            (_, Some(y)) if !y.is_null() => Ordering::Greater,
            _ => Ordering::Equal,
        }
    });
}

/// Applies a write to a JSON object with array set semantics.
pub fn apply_write(data: &mut Map<String, Value>, field: &str, write: &FieldWrite) {
    match write {
        FieldWrite::Set(value) => {
            data.insert(field.to_string(), value.clone());
        }
        FieldWrite::ServerTimestamp => {
            data.insert(field.to_string(), Value::from(server_now_millis()));
        }
        FieldWrite::ArrayUnion(values) => {
            let entry = data
                .entry(field.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !entry.is_array() {
                *entry = Value::Array(Vec::new());
            }
            if let Value::Array(items) = entry {
                for value in values {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
            }
        }
        FieldWrite::ArrayRemove(values) => match data.get_mut(field) {
            Some(Value::Array(items)) => items.retain(|item| !values.contains(item)),
            _ => {
                data.insert(field.to_string(), Value::Array(Vec::new()));
            }
        },
    }
}
