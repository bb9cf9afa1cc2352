// ==================== MONGODB DOCUMENT STORE ====================
// Subcollections are flattened into one Mongo collection per name, scoped
// by a `_parent` field ("posts/{id}"). Live queries ride on change streams,
// so the server must run as a replica set.

use super::{
    server_now_millis, CollectionRef, Direction, DocumentStore, FieldWrite, Patch, Query, Record,
    SnapshotStream, StoreError, StoreResult,
};
use crate::database::MongoDB;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::change_stream::event::ChangeStreamEvent;
use mongodb::Collection;
use serde_json::{Map, Value};

const PARENT_FIELD: &str = "_parent";

#[derive(Clone)]
pub struct MongoStore {
    db: MongoDB,
}

impl MongoStore {
    pub fn new(db: MongoDB) -> Self {
        Self { db }
    }

    fn collection(&self, collection: &CollectionRef) -> Collection<Document> {
        self.db.collection::<Document>(collection.name())
    }
}

fn scope_filter(collection: &CollectionRef) -> Document {
    match collection.parent_path() {
        Some(parent) => doc! { PARENT_FIELD: parent },
        None => Document::new(),
    }
}

fn id_filter(collection: &CollectionRef, id: &str) -> Option<Document> {
    let oid = ObjectId::parse_str(id).ok()?;
    let mut filter = scope_filter(collection);
    filter.insert("_id", oid);
    Some(filter)
}

fn sort_document(query: &Query) -> Option<Document> {
    query.order_by.as_ref().map(|order| {
        let direction = match order.direction {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        };
        let mut sort = Document::new();
        sort.insert(order.field.clone(), direction);
        sort
    })
}

fn to_bson(value: &Value) -> StoreResult<Bson> {
    mongodb::bson::to_bson(value).map_err(|e| StoreError::Encoding(e.to_string()))
}

fn to_bson_array(values: &[Value]) -> StoreResult<Bson> {
    let items = values.iter().map(to_bson).collect::<StoreResult<Vec<_>>>()?;
    Ok(Bson::Array(items))
}

fn into_record(mut document: Document) -> StoreResult<Record> {
    let id = document
        .get_object_id("_id")
        .map_err(|e| StoreError::Encoding(format!("document without ObjectId: {}", e)))?
        .to_hex();
    document.remove("_id");
    document.remove(PARENT_FIELD);

    let data = match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Ok(Record::new(id, data))
}

async fn run_query(
    collection: &Collection<Document>,
    filter: Document,
    sort: Option<Document>,
) -> StoreResult<Vec<Record>> {
    let cursor = match sort {
        Some(sort) => collection.find(filter).sort(sort).await?,
        None => collection.find(filter).await?,
    };
    let documents: Vec<Document> = cursor.try_collect().await?;
    documents.into_iter().map(into_record).collect()
}

struct WatchState {
    collection: Collection<Document>,
    filter: Document,
    sort: Option<Document>,
    changes: BoxStream<'static, mongodb::error::Result<ChangeStreamEvent<Document>>>,
    first: bool,
    done: bool,
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn get(&self, collection: &CollectionRef, id: &str) -> StoreResult<Option<Record>> {
        let Some(filter) = id_filter(collection, id) else {
            return Ok(None);
        };
        match self.collection(collection).find_one(filter).await? {
            Some(document) => Ok(Some(into_record(document)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, query: &Query) -> StoreResult<Vec<Record>> {
        run_query(
            &self.collection(&query.collection),
            scope_filter(&query.collection),
            sort_document(query),
        )
        .await
    }

    async fn create(&self, collection: &CollectionRef, patch: Patch) -> StoreResult<String> {
        let oid = ObjectId::new();
        let mut document = doc! { "_id": oid };
        if let Some(parent) = collection.parent_path() {
            document.insert(PARENT_FIELD, parent);
        }

        for (field, write) in patch.writes() {
            let value = match write {
                FieldWrite::Set(value) => to_bson(value)?,
                FieldWrite::ServerTimestamp => Bson::Int64(server_now_millis()),
                FieldWrite::ArrayUnion(values) => {
                    let mut unique: Vec<Value> = Vec::new();
                    for value in values {
                        if !unique.contains(value) {
                            unique.push(value.clone());
                        }
                    }
                    to_bson_array(&unique)?
                }
                FieldWrite::ArrayRemove(_) => Bson::Array(Vec::new()),
            };
            document.insert(field.clone(), value);
        }

        self.collection(collection).insert_one(document).await?;
        log::debug!("📝 Created {}/{}", collection, oid.to_hex());
        Ok(oid.to_hex())
    }

    async fn update(&self, collection: &CollectionRef, id: &str, patch: Patch) -> StoreResult<()> {
        let not_found = || StoreError::NotFound(format!("{}/{}", collection, id));
        let filter = id_filter(collection, id).ok_or_else(not_found)?;

        let mut set = Document::new();
        let mut add_to_set = Document::new();
        let mut pull_all = Document::new();
        for (field, write) in patch.writes() {
            match write {
                FieldWrite::Set(value) => set.insert(field.clone(), to_bson(value)?),
                FieldWrite::ServerTimestamp => set.insert(field.clone(), Bson::Int64(server_now_millis())),
                FieldWrite::ArrayUnion(values) => {
                    add_to_set.insert(field.clone(), doc! { "$each": to_bson_array(values)? })
                }
                FieldWrite::ArrayRemove(values) => pull_all.insert(field.clone(), to_bson_array(values)?),
            };
        }

        let mut update = Document::new();
        if !set.is_empty() {
            update.insert("$set", set);
        }
        if !add_to_set.is_empty() {
            update.insert("$addToSet", add_to_set);
        }
        if !pull_all.is_empty() {
            update.insert("$pullAll", pull_all);
        }
        if update.is_empty() {
            return Ok(());
        }

        let result = self.collection(collection).update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(not_found());
        }
        Ok(())
    }

    async fn delete(&self, collection: &CollectionRef, id: &str) -> StoreResult<()> {
        let Some(filter) = id_filter(collection, id) else {
            return Ok(());
        };
        self.collection(collection).delete_one(filter).await?;
        Ok(())
    }

    async fn watch(&self, query: &Query) -> StoreResult<SnapshotStream> {
        let collection = self.collection(&query.collection);
        let changes = collection.watch().await?.boxed();

        let state = WatchState {
            collection,
            filter: scope_filter(&query.collection),
            sort: sort_document(query),
            changes,
            first: true,
            done: false,
        };

        let snapshots = stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }
            if !state.first {
                match state.changes.next().await {
                    Some(Ok(_event)) => {}
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(StoreError::from(e)), state));
                    }
                    None => return None,
                }
            }
            state.first = false;

            let snapshot = run_query(&state.collection, state.filter.clone(), state.sort.clone()).await;
            if snapshot.is_err() {
                state.done = true;
            }
            Some((snapshot, state))
        });

        Ok(snapshots.boxed())
    }

    fn backend(&self) -> &'static str {
        "mongodb"
    }
}
