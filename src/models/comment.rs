use serde::{Deserialize, Serialize};

/// Comment document stored at `posts/{postId}/comments/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub uid: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CommentListResponse {
    pub success: bool,
    pub comments: Vec<Comment>,
    pub total: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreateCommentResponse {
    pub success: bool,
    pub id: String,
}
