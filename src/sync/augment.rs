// ==================== DERIVED-STATE AUGMENTER ====================
// Per-item auxiliary lookups run concurrently over a snapshot. A failed
// lookup yields the default for that item only.

use crate::models::Session;
use crate::store::{CollectionRef, DocumentStore, Query, StoreResult};
use futures::future::join_all;
use std::fmt::Display;
use std::future::Future;

/// Derives one value per item with `derive`, waiting for every lookup to
/// settle. Output order matches input order.
pub async fn augment<T, D, E, F, Fut>(items: Vec<T>, derive: F, default: D) -> Vec<(T, D)>
where
    F: Fn(&T) -> Fut,
    Fut: Future<Output = Result<D, E>>,
    E: Display,
    D: Clone,
{
    let lookups = join_all(items.iter().map(|item| derive(item))).await;

    let mut failed = 0;
    let augmented: Vec<(T, D)> = items
        .into_iter()
        .zip(lookups)
        .map(|(item, derived)| match derived {
            Ok(value) => (item, value),
            Err(e) => {
                failed += 1;
                log::warn!("⚠️  Derived-state lookup failed, using default: {}", e);
                (item, default.clone())
            }
        })
        .collect();

    if failed > 0 {
        log::debug!("Augmented {} items, {} fell back to default", augmented.len(), failed);
    }
    augmented
}

/// Whether `viewer` has commented on the post.
pub async fn has_commented(
    store: &dyn DocumentStore,
    post_id: &str,
    viewer: &str,
) -> StoreResult<bool> {
    let comments = store.list(&Query::new(CollectionRef::comments(post_id))).await?;
    Ok(comments.iter().any(|comment| comment.str_field("uid") == Some(viewer)))
}

/// Attaches `has_commented` for the session user to each post id.
pub async fn with_has_commented<T, F>(
    store: &dyn DocumentStore,
    session: &Session,
    items: Vec<T>,
    post_id: F,
) -> Vec<(T, bool)>
where
    F: Fn(&T) -> String,
{
    augment(
        items,
        |item| {
            let id = post_id(item);
            async move { has_commented(store, &id, &session.uid).await }
        },
        false,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::RecordingStore;
    use crate::store::Patch;

    #[tokio::test]
    async fn test_one_failed_lookup_falls_back_to_default() {
        let store = RecordingStore::new();
        let session = Session::new("viewer");
        let post_ids: Vec<String> = (0..10).map(|i| format!("p{}", i)).collect();

        for id in &post_ids {
            store
                .inner
                .create(&CollectionRef::comments(id), Patch::new().set("uid", "viewer"))
                .await
                .unwrap();
        }
        store.fail_list("posts/p4/comments");

        let augmented = with_has_commented(&store, &session, post_ids.clone(), |id| id.clone()).await;

        assert_eq!(augmented.len(), 10);
        for (id, commented) in &augmented {
            assert_eq!(*commented, id != "p4", "post {}", id);
        }
        let order: Vec<_> = augmented.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(order, post_ids);
    }

    #[tokio::test]
    async fn test_has_commented_only_counts_viewer() {
        let store = RecordingStore::new();
        store
            .inner
            .create(&CollectionRef::comments("p1"), Patch::new().set("uid", "someone-else"))
            .await
            .unwrap();

        assert!(!has_commented(&store, "p1", "viewer").await.unwrap());
        assert!(!has_commented(&store, "empty", "viewer").await.unwrap());
    }

    #[tokio::test]
    async fn test_augment_runs_every_lookup() {
        let augmented = augment(
            vec![1, 2, 3],
            |n| {
                let n = *n;
                async move {
                    if n == 2 {
                        Err("boom")
                    } else {
                        Ok(n * 10)
                    }
                }
            },
            0,
        )
        .await;
        assert_eq!(augmented, vec![(1, 10), (2, 0), (3, 30)]);
    }
}
