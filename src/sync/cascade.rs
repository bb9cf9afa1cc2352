// ==================== CASCADE DELETE COORDINATOR ====================
// mark -> purge children (concurrent, retried) -> delete parent.
// Child deletes are idempotent, so a purge can be rerun from any point;
// a post left marked is picked up again by the purge sweeper.

use crate::models::{DeleteReport, Post};
use crate::store::{CollectionRef, DocumentStore, Patch, Query, StoreError};
use crate::utils::{AppError, AppResult};
use futures::future::join_all;
use std::sync::Arc;

pub struct CascadeDeleteCoordinator {
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
}

impl CascadeDeleteCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Deletes a post and every comment under it.
    pub async fn delete_post(&self, post_id: &str) -> AppResult<DeleteReport> {
        let posts = CollectionRef::posts();

        // Phase 1: hide the post from feeds while it is being purged
        self.store
            .update(&posts, post_id, Patch::new().set("deleting", true))
            .await?;

        self.purge(post_id).await
    }

    /// Phases 2 and 3 for a post that is already marked.
    async fn purge(&self, post_id: &str) -> AppResult<DeleteReport> {
        let comments = CollectionRef::comments(post_id);
        let mut deleted = 0;
        let mut rounds = 0;
        let mut failed_rounds = 0;

        // Ends only on an empty listing, so comments written while the mark
        // was landing are caught by the next round.
        loop {
            let children = self.store.list(&Query::new(comments.clone())).await?;
            if children.is_empty() {
                break;
            }
            rounds += 1;

            let results = join_all(
                children
                    .iter()
                    .map(|child| self.store.delete(&comments, &child.id)),
            )
            .await;

            let failures: Vec<StoreError> = results.into_iter().filter_map(Result::err).collect();
            deleted += children.len() - failures.len();
            if failures.is_empty() {
                continue;
            }

            failed_rounds += 1;
            log::warn!(
                "⚠️  Purge of post {} attempt {}/{}: {} comment deletes failed",
                post_id, failed_rounds, self.max_attempts, failures.len()
            );
            if failed_rounds >= self.max_attempts {
                return Err(AppError::PartialDelete(format!(
                    "post {} still has {} comments after {} attempts: {}",
                    post_id,
                    failures.len(),
                    failed_rounds,
                    failures[0]
                )));
            }
        }

        // Phase 3: every child is gone, drop the parent
        self.store.delete(&CollectionRef::posts(), post_id).await?;
        log::info!("🗑️  Post {} deleted with {} comments", post_id, deleted);

        Ok(DeleteReport {
            success: true,
            post_id: post_id.to_string(),
            comments_deleted: deleted,
            attempts: rounds,
        })
    }

    /// Finishes every cascade delete that was interrupted. Returns how many
    /// posts were fully removed.
    pub async fn resume_pending(&self) -> AppResult<usize> {
        let records = self.store.list(&Query::new(CollectionRef::posts())).await?;
        let marked: Vec<String> = records
            .iter()
            .filter_map(|record| record.decode::<Post>().ok())
            .filter(|post| post.deleting)
            .map(|post| post.id)
            .collect();

        let mut completed = 0;
        for post_id in marked {
            match self.purge(&post_id).await {
                Ok(_) => completed += 1,
                Err(e) => log::error!("❌ Resuming delete of post {} failed: {}", post_id, e),
            }
        }
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{RecordingStore, StoreCall};
    use serde_json::json;

    async fn post_with_comments(store: &RecordingStore, n: usize) -> Vec<String> {
        store
            .inner
            .insert_with_id(&CollectionRef::posts(), "p1", json!({ "uid": "author" }).as_object().unwrap().clone())
            .await;
        let mut ids = Vec::new();
        for i in 0..n {
            let id = store
                .inner
                .create(&CollectionRef::comments("p1"), Patch::new().set("uid", format!("u{}", i)))
                .await
                .unwrap();
            ids.push(id);
        }
        ids
    }

    #[tokio::test]
    async fn test_deletes_children_before_parent() {
        let store = Arc::new(RecordingStore::new());
        post_with_comments(&store, 5).await;
        let coordinator = CascadeDeleteCoordinator::new(store.clone(), 3);

        let report = coordinator.delete_post("p1").await.unwrap();
        assert_eq!(report.comments_deleted, 5);
        assert_eq!(report.attempts, 1);

        let deletes = store.delete_calls();
        assert_eq!(deletes.len(), 6);
        assert!(deletes[..5].iter().all(|path| path.starts_with("posts/p1/comments/")));
        assert_eq!(deletes[5], "posts/p1");

        assert!(store.inner.get(&CollectionRef::posts(), "p1").await.unwrap().is_none());
        assert!(store.inner.list(&Query::new(CollectionRef::comments("p1"))).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comment_landing_mid_purge_is_deleted_too() {
        let store = Arc::new(RecordingStore::new());
        let ids = post_with_comments(&store, 2).await;
        store.insert_after_delete(
            &format!("posts/p1/comments/{}", ids[0]),
            CollectionRef::comments("p1"),
            "late",
            json!({ "uid": "slow-writer" }),
        );
        let coordinator = CascadeDeleteCoordinator::new(store.clone(), 3);

        let report = coordinator.delete_post("p1").await.unwrap();
        assert_eq!(report.comments_deleted, 3);
        assert_eq!(report.attempts, 2);

        let deletes = store.delete_calls();
        assert!(deletes.contains(&"posts/p1/comments/late".to_string()));
        assert_eq!(deletes.last().map(String::as_str), Some("posts/p1"));
        assert!(store.inner.list(&Query::new(CollectionRef::comments("p1"))).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_without_comments_is_one_delete() {
        let store = Arc::new(RecordingStore::new());
        post_with_comments(&store, 0).await;
        let coordinator = CascadeDeleteCoordinator::new(store.clone(), 3);

        coordinator.delete_post("p1").await.unwrap();
        assert_eq!(store.delete_calls(), vec!["posts/p1".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_post_is_not_found_and_deletes_nothing() {
        let store = Arc::new(RecordingStore::new());
        let coordinator = CascadeDeleteCoordinator::new(store.clone(), 3);

        let err = coordinator.delete_post("ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn test_stuck_child_keeps_parent_marked_until_resumed() {
        let store = Arc::new(RecordingStore::new());
        let ids = post_with_comments(&store, 3).await;
        let stuck = format!("posts/p1/comments/{}", ids[1]);
        store.fail_delete(&stuck);
        let coordinator = CascadeDeleteCoordinator::new(store.clone(), 2);

        let err = coordinator.delete_post("p1").await.unwrap_err();
        assert!(matches!(err, AppError::PartialDelete(_)));
        assert!(!store.delete_calls().contains(&"posts/p1".to_string()));

        let post = store.inner.get(&CollectionRef::posts(), "p1").await.unwrap().unwrap();
        assert_eq!(post.data["deleting"], json!(true));

        store.heal_delete(&stuck);
        store.clear_calls();
        assert_eq!(coordinator.resume_pending().await.unwrap(), 1);
        assert_eq!(
            store.calls().last(),
            Some(&StoreCall::Delete("posts/p1".to_string()))
        );
        assert!(store.inner.get(&CollectionRef::posts(), "p1").await.unwrap().is_none());
    }
}
