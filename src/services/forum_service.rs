// ==================== FORUM ====================
// Posts, likes, comments and cascade deletes for the signed-in user.

use crate::{
    models::{
        CategoryFilter, Comment, CreatePostRequest, DeleteReport, LikeOutcome, Post,
        PostView, Session, UserProfile,
    },
    state::AppState,
    store::{CollectionRef, Direction, Patch, Query},
    utils::{resolve_avatar, AppError, AppResult},
};

/// Author name and avatar as they get denormalized into posts and comments.
struct Author {
    display_name: String,
    image: String,
}

/// Prefers the stored profile over the token claims.
async fn author_of(state: &AppState, session: &Session) -> Author {
    let profile = match state.store.get(&CollectionRef::users(), &session.uid).await {
        Ok(Some(record)) => record.decode::<UserProfile>().ok(),
        Ok(None) => None,
        Err(e) => {
            log::warn!("⚠️  Profile lookup for {} failed, using token claims: {}", session.uid, e);
            None
        }
    };

    match profile {
        Some(profile) if !profile.full_name.trim().is_empty() => Author {
            image: resolve_avatar(profile.image.as_deref(), &profile.full_name),
            display_name: profile.full_name,
        },
        _ => Author {
            display_name: session.display_name(),
            image: session.avatar(),
        },
    }
}

fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty.", field)));
    }
    Ok(())
}

async fn load_post(state: &AppState, post_id: &str) -> AppResult<Post> {
    let record = state
        .store
        .get(&CollectionRef::posts(), post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;
    let post: Post = record.decode()?;
    if post.deleting {
        return Err(AppError::NotFound(format!("post {}", post_id)));
    }
    Ok(post)
}

pub async fn create_post(state: &AppState, session: &Session, request: &CreatePostRequest) -> AppResult<String> {
    require_text("Title", &request.title)?;
    require_text("Content", &request.content)?;

    // posting from the "All" view lands in Main
    let category = CategoryFilter::parse(request.category.as_deref()).default_category();
    let author = author_of(state, session).await;

    let patch = Patch::new()
        .set("uid", session.uid.as_str())
        .set("displayName", author.display_name)
        .set("authorImage", author.image)
        .set("title", request.title.trim())
        .set("content", request.content.as_str())
        .set("category", category.to_string())
        .server_timestamp("timestamp")
        .set("likes", serde_json::Value::Array(Vec::new()));

    let id = state.store.create(&CollectionRef::posts(), patch).await?;
    log::info!("📝 Post {} created by {} in {}", id, session.uid, category);
    Ok(id)
}

pub async fn list_posts(state: &AppState, session: &Session, filter: &CategoryFilter) -> AppResult<Vec<PostView>> {
    state.forum.current(session, filter).await
}

pub async fn toggle_like(state: &AppState, session: &Session, post_id: &str) -> AppResult<LikeOutcome> {
    state.gateway.toggle_like(session, post_id).await
}

/// Author-only. Removes the post and all of its comments.
pub async fn delete_post(state: &AppState, session: &Session, post_id: &str) -> AppResult<DeleteReport> {
    let post = load_post(state, post_id).await?;
    if post.uid != session.uid {
        return Err(AppError::Forbidden("only the author can delete this post".into()));
    }

    let report = state.cascade.delete_post(post_id).await?;
    state.gateway.forget(post_id);
    Ok(report)
}

pub async fn add_comment(state: &AppState, session: &Session, post_id: &str, content: &str) -> AppResult<String> {
    require_text("Comment", content)?;
    load_post(state, post_id).await?;
    let author = author_of(state, session).await;

    let patch = Patch::new()
        .set("postId", post_id)
        .set("uid", session.uid.as_str())
        .set("displayName", author.display_name)
        .set("content", content)
        .server_timestamp("timestamp");

    let id = state.store.create(&CollectionRef::comments(post_id), patch).await?;
    log::info!("💬 Comment {} on post {} by {}", id, post_id, session.uid);
    Ok(id)
}

/// Oldest first.
pub async fn list_comments(state: &AppState, post_id: &str) -> AppResult<Vec<Comment>> {
    load_post(state, post_id).await?;
    let query = Query::new(CollectionRef::comments(post_id)).order_by("timestamp", Direction::Ascending);
    let records = state.store.list(&query).await?;

    let mut comments = Vec::with_capacity(records.len());
    for record in &records {
        match record.decode::<Comment>() {
            Ok(comment) => comments.push(comment),
            Err(e) => log::warn!("⚠️  Skipping undecodable comment: {}", e),
        }
    }
    Ok(comments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::state::test_state;
    use crate::store::testing::RecordingStore;
    use crate::store::DocumentStore;
    use serde_json::json;
    use std::sync::Arc;

    fn request(title: &str, category: Option<&str>) -> CreatePostRequest {
        CreatePostRequest {
            title: title.into(),
            content: "body".into(),
            category: category.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_create_post_denormalizes_author() {
        let store = Arc::new(RecordingStore::new());
        store
            .inner
            .insert_with_id(&CollectionRef::users(), "u1", json!({ "fullName": "Ana Souza" }).as_object().unwrap().clone())
            .await;
        let state = test_state(store.clone());
        let session = Session::new("u1");

        let id = create_post(&state, &session, &request("Hello", None)).await.unwrap();
        let post: Post = store.inner.get(&CollectionRef::posts(), &id).await.unwrap().unwrap().decode().unwrap();

        assert_eq!(post.display_name, "Ana Souza");
        assert_eq!(post.author_image, "https://ui-avatars.com/api/?name=Ana%20Souza&background=random");
        assert_eq!(post.category, Category::Main);
        assert!(post.timestamp.is_some());
        assert!(post.likes.is_empty());
    }

    #[tokio::test]
    async fn test_create_post_without_profile_uses_session() {
        let store = Arc::new(RecordingStore::new());
        let state = test_state(store.clone());
        let mut session = Session::new("u2");
        session.email = Some("bo@uni.edu".into());

        let id = create_post(&state, &session, &request("Hi", Some("Anonymous"))).await.unwrap();
        let post: Post = store.inner.get(&CollectionRef::posts(), &id).await.unwrap().unwrap().decode().unwrap();
        assert_eq!(post.display_name, "bo@uni.edu");
        assert_eq!(post.category, Category::Anonymous);
    }

    #[tokio::test]
    async fn test_blank_title_rejected_without_write() {
        let store = Arc::new(RecordingStore::new());
        let state = test_state(store.clone());

        let err = create_post(&state, &Session::new("u1"), &request("  ", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_only_author_deletes() {
        let store = Arc::new(RecordingStore::new());
        let state = test_state(store.clone());
        let id = create_post(&state, &Session::new("author"), &request("Hello", None)).await.unwrap();
        add_comment(&state, &Session::new("reader"), &id, "nice").await.unwrap();

        let err = delete_post(&state, &Session::new("reader"), &id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(store.delete_calls().is_empty());

        let report = delete_post(&state, &Session::new("author"), &id).await.unwrap();
        assert_eq!(report.comments_deleted, 1);
        assert_eq!(store.delete_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_comments_listed_oldest_first() {
        let store = Arc::new(RecordingStore::new());
        let state = test_state(store.clone());
        let id = create_post(&state, &Session::new("author"), &request("Hello", None)).await.unwrap();

        for (n, text) in ["first", "second"].iter().enumerate() {
            store
                .inner
                .insert_with_id(
                    &CollectionRef::comments(&id),
                    &format!("c{}", n),
                    json!({ "postId": id, "uid": "r", "content": text, "timestamp": 100 - n as i64 })
                        .as_object()
                        .unwrap()
                        .clone(),
                )
                .await;
        }

        let comments = list_comments(&state, &id).await.unwrap();
        let texts: Vec<_> = comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_comment_on_missing_post_is_not_found() {
        let state = test_state(Arc::new(RecordingStore::new()));
        let err = add_comment(&state, &Session::new("r"), "ghost", "hi").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_like_shows_in_listing() {
        let store = Arc::new(RecordingStore::new());
        let state = test_state(store.clone());
        let id = create_post(&state, &Session::new("author"), &request("Hello", None)).await.unwrap();
        let viewer = Session::new("viewer");

        toggle_like(&state, &viewer, &id).await.unwrap();
        let views = list_posts(&state, &viewer, &CategoryFilter::All).await.unwrap();
        assert_eq!(views.len(), 1);
        assert!(views[0].has_liked);
        assert_eq!(views[0].like_count, 1);
    }
}
