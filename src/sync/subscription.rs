// ==================== SUBSCRIPTION MANAGER ====================
// Opens live queries on the document store and pumps full ordered
// snapshots, decoded into typed records, to a single consumer.
// Dropping the consumer handle tears the feed down.

use crate::store::{DocumentStore, Query, StoreError};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What a live feed delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent<T> {
    /// The complete current result set, in query order.
    Snapshot(Vec<T>),
    /// Transport failure. The feed ends after it.
    Error(StoreError),
}

/// Consumer side of a live feed.
pub struct LiveFeed<T> {
    rx: mpsc::Receiver<FeedEvent<T>>,
    pump: JoinHandle<()>,
    active: Arc<AtomicUsize>,
    label: String,
}

impl<T: Send + 'static> LiveFeed<T> {
    /// Spawns `pump` with the sending half of a fresh channel.
    pub(crate) fn spawn<F, Fut>(label: String, capacity: usize, active: Arc<AtomicUsize>, pump: F) -> Self
    where
        F: FnOnce(mpsc::Sender<FeedEvent<T>>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let pump = tokio::spawn(pump(tx));
        active.fetch_add(1, Ordering::SeqCst);
        log::debug!("📡 Feed opened: {}", label);
        Self { rx, pump, active, label }
    }
}

impl<T> LiveFeed<T> {
    /// Next delivery; `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<FeedEvent<T>> {
        self.rx.recv().await
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Explicit teardown; dropping the handle does the same.
    pub fn unsubscribe(self) {}
}

impl<T> Drop for LiveFeed<T> {
    fn drop(&mut self) {
        self.pump.abort();
        self.active.fetch_sub(1, Ordering::SeqCst);
        log::debug!("📴 Feed closed: {}", self.label);
    }
}

#[derive(Clone)]
pub struct SubscriptionManager {
    store: Arc<dyn DocumentStore>,
    capacity: usize,
    active: Arc<AtomicUsize>,
}

impl SubscriptionManager {
    pub fn new(store: Arc<dyn DocumentStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of feeds whose consumer handle is still alive.
    pub fn active_feeds(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn active_counter(&self) -> Arc<AtomicUsize> {
        self.active.clone()
    }

    /// Opens a live feed over `query`. Records that fail to decode are
    /// skipped; a transport error is delivered once and ends the feed.
    pub fn subscribe<T>(&self, query: Query) -> LiveFeed<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.subscribe_counted(query, self.active.clone())
    }

    /// Same as `subscribe`, but not counted in `active_feeds`. For feeds
    /// that sit behind another counted handle.
    pub(crate) fn subscribe_uncounted<T>(&self, query: Query) -> LiveFeed<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.subscribe_counted(query, Arc::new(AtomicUsize::new(0)))
    }

    fn subscribe_counted<T>(&self, query: Query, active: Arc<AtomicUsize>) -> LiveFeed<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let store = self.store.clone();
        let label = query.collection.to_string();
        let pump_label = label.clone();

        LiveFeed::spawn(label, self.capacity, active, move |tx| async move {
            let mut snapshots = match store.watch(&query).await {
                Ok(stream) => stream,
                Err(e) => {
                    log::error!("❌ Failed to open feed {}: {}", pump_label, e);
                    let _ = tx.send(FeedEvent::Error(e)).await;
                    return;
                }
            };

            while let Some(result) = snapshots.next().await {
                let event = match result {
                    Ok(records) => {
                        let mut items = Vec::with_capacity(records.len());
                        for record in &records {
                            match record.decode::<T>() {
                                Ok(item) => items.push(item),
                                Err(e) => log::warn!("⚠️  Skipping undecodable document in {}: {}", pump_label, e),
                            }
                        }
                        FeedEvent::Snapshot(items)
                    }
                    Err(e) => {
                        log::error!("❌ Feed {} failed: {}", pump_label, e);
                        let _ = tx.send(FeedEvent::Error(e)).await;
                        return;
                    }
                };

                if tx.send(event).await.is_err() {
                    // Consumer went away
                    return;
                }
            }
            log::debug!("Feed {} ended upstream", pump_label);
        })
    }
}
