// ==================== FORUM FEED ====================
// posts (timestamp desc) -> gateway reconcile -> category filter ->
// has_commented lookups -> PostView list for one viewer.

use super::augment::with_has_commented;
use super::mutation::MutationGateway;
use super::subscription::{FeedEvent, LiveFeed, SubscriptionManager};
use crate::models::{CategoryFilter, Post, PostView, Session};
use crate::store::{CollectionRef, Direction, DocumentStore, Query};
use crate::utils::AppResult;
use std::sync::Arc;

pub fn posts_query() -> Query {
    Query::new(CollectionRef::posts()).order_by("timestamp", Direction::Descending)
}

#[derive(Clone)]
pub struct ForumFeed {
    store: Arc<dyn DocumentStore>,
    subscriptions: SubscriptionManager,
    gateway: Arc<MutationGateway>,
}

impl ForumFeed {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        subscriptions: SubscriptionManager,
        gateway: Arc<MutationGateway>,
    ) -> Self {
        Self { store, subscriptions, gateway }
    }

    /// Turns one authoritative snapshot into what `session` sees.
    pub async fn build_views(
        &self,
        session: &Session,
        filter: &CategoryFilter,
        mut posts: Vec<Post>,
    ) -> Vec<PostView> {
        self.gateway.reconcile(&mut posts);

        let visible: Vec<Post> = posts
            .into_iter()
            .filter(|post| !post.deleting && filter.matches(&post.category))
            .collect();

        with_has_commented(self.store.as_ref(), session, visible, |post| post.id.clone())
            .await
            .into_iter()
            .map(|(post, has_commented)| PostView::new(post, &session.uid, has_commented))
            .collect()
    }

    /// One-shot read of the same view the live feed publishes.
    pub async fn current(&self, session: &Session, filter: &CategoryFilter) -> AppResult<Vec<PostView>> {
        let records = self.store.list(&posts_query()).await?;
        let posts: Vec<Post> = records
            .iter()
            .filter_map(|record| match record.decode::<Post>() {
                Ok(post) => Some(post),
                Err(e) => {
                    log::warn!("⚠️  Skipping undecodable post: {}", e);
                    None
                }
            })
            .collect();
        Ok(self.build_views(session, filter, posts).await)
    }

    /// Live per-viewer feed. Dropping the handle closes the upstream feed too.
    pub fn open(&self, session: Session, filter: CategoryFilter) -> LiveFeed<PostView> {
        // one client, one counted feed: the outer handle
        let mut upstream = self.subscriptions.subscribe_uncounted::<Post>(posts_query());
        let feed = self.clone();
        let label = format!("forum[{}:{:?}]", session.uid, filter);

        LiveFeed::spawn(
            label,
            self.subscriptions.capacity(),
            self.subscriptions.active_counter(),
            move |tx| async move {
                while let Some(event) = upstream.next().await {
                    let event = match event {
                        FeedEvent::Snapshot(posts) => {
                            FeedEvent::Snapshot(feed.build_views(&session, &filter, posts).await)
                        }
                        FeedEvent::Error(e) => FeedEvent::Error(e),
                    };
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            },
        )
    }
}
