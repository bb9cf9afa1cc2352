use crate::models::{
    CategoryFilter, CommentListResponse, CreateCommentRequest, CreateCommentResponse,
    CreatePostRequest, CreatePostResponse, DeleteReport, FeedQuery, LikeOutcome, PostListResponse,
    PostView, Session,
};
use crate::services::forum_service;
use crate::state::AppState;
use crate::sync::{FeedEvent, LiveFeed};
use crate::utils::AppError;
use actix_web::{http::header, web, HttpResponse};

/// GET /api/v1/posts - Current forum view
#[utoipa::path(
    get,
    path = "/api/v1/posts",
    tag = "Forum",
    params(FeedQuery),
    responses(
        (status = 200, description = "Posts, newest first", body = PostListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_posts(
    state: web::Data<AppState>,
    session: web::ReqData<Session>,
    query: web::Query<FeedQuery>,
) -> Result<HttpResponse, AppError> {
    let filter = CategoryFilter::parse(query.category.as_deref());
    let posts = forum_service::list_posts(&state, &session, &filter).await?;
    Ok(HttpResponse::Ok().json(PostListResponse {
        success: true,
        total: posts.len(),
        posts,
    }))
}

/// POST /api/v1/posts - Creates a post
#[utoipa::path(
    post,
    path = "/api/v1/posts",
    tag = "Forum",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = CreatePostResponse),
        (status = 400, description = "Blank title or content")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_post(
    state: web::Data<AppState>,
    session: web::ReqData<Session>,
    body: web::Json<CreatePostRequest>,
) -> Result<HttpResponse, AppError> {
    let id = forum_service::create_post(&state, &session, &body).await?;
    Ok(HttpResponse::Created().json(CreatePostResponse { success: true, id }))
}

fn sse_frame(event: FeedEvent<PostView>) -> web::Bytes {
    let payload = match event {
        FeedEvent::Snapshot(posts) => serde_json::json!({
            "type": "snapshot",
            "total": posts.len(),
            "posts": posts,
        }),
        FeedEvent::Error(e) => serde_json::json!({
            "type": "error",
            "error": e.to_string(),
        }),
    };
    web::Bytes::from(format!("data: {}\n\n", payload))
}

/// GET /api/v1/posts/live - Server-Sent Events stream of full forum snapshots.
/// The feed is torn down when the client disconnects.
#[utoipa::path(
    get,
    path = "/api/v1/posts/live",
    tag = "Forum",
    params(FeedQuery),
    responses(
        (status = 200, description = "text/event-stream of snapshots")
    ),
    security(("bearer_auth" = []))
)]
pub async fn live_posts(
    state: web::Data<AppState>,
    session: web::ReqData<Session>,
    query: web::Query<FeedQuery>,
) -> HttpResponse {
    let filter = CategoryFilter::parse(query.category.as_deref());
    let feed: LiveFeed<PostView> = state.forum.open(session.into_inner(), filter);
    log::info!("📡 SSE stream opened: {}", feed.label());

    let body = futures::stream::unfold(feed, |mut feed| async move {
        let event = feed.next().await?;
        Some((Ok::<_, std::convert::Infallible>(sse_frame(event)), feed))
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(body)
}

/// POST /api/v1/posts/{id}/like - Toggles the caller's like
#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/like",
    tag = "Forum",
    params(("id" = String, Path, description = "Post id")),
    responses(
        (status = 200, description = "New like state", body = LikeOutcome),
        (status = 404, description = "Post not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn toggle_like(
    state: web::Data<AppState>,
    session: web::ReqData<Session>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let outcome = forum_service::toggle_like(&state, &session, &path).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// DELETE /api/v1/posts/{id} - Deletes a post and its comments (author only)
#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    tag = "Forum",
    params(("id" = String, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post deleted", body = DeleteReport),
        (status = 403, description = "Caller is not the author"),
        (status = 404, description = "Post not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_post(
    state: web::Data<AppState>,
    session: web::ReqData<Session>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let report = forum_service::delete_post(&state, &session, &path).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// GET /api/v1/posts/{id}/comments - Comments, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}/comments",
    tag = "Forum",
    params(("id" = String, Path, description = "Post id")),
    responses(
        (status = 200, description = "Comments", body = CommentListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_comments(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let comments = forum_service::list_comments(&state, &path).await?;
    Ok(HttpResponse::Ok().json(CommentListResponse {
        success: true,
        total: comments.len(),
        comments,
    }))
}

/// POST /api/v1/posts/{id}/comments - Adds a comment
#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/comments",
    tag = "Forum",
    params(("id" = String, Path, description = "Post id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CreateCommentResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_comment(
    state: web::Data<AppState>,
    session: web::ReqData<Session>,
    path: web::Path<String>,
    body: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, AppError> {
    let id = forum_service::add_comment(&state, &session, &path, &body.content).await?;
    Ok(HttpResponse::Created().json(CreateCommentResponse { success: true, id }))
}
