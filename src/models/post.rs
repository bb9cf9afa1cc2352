use serde::{Deserialize, Serialize};
use std::fmt;

/// Forum section of a post. Documents written before categories existed
/// have no `category` field and belong to `Main`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    #[default]
    Main,
    Anonymous,
    Other(String),
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Main" | "" => Category::Main,
            "Anonymous" => Category::Anonymous,
            _ => Category::Other(value),
        }
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Main => write!(f, "Main"),
            Category::Anonymous => write!(f, "Anonymous"),
            Category::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Which posts a forum view shows. `All` is the landing view and lists the
/// `Main` section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("All") => CategoryFilter::All,
            Some(other) => CategoryFilter::Only(Category::from(other.to_string())),
        }
    }

    pub fn matches(&self, category: &Category) -> bool {
        match self {
            CategoryFilter::All => *category == Category::Main,
            CategoryFilter::Only(wanted) => wanted == category,
        }
    }

    /// Category a post created from this view lands in.
    pub fn default_category(&self) -> Category {
        match self {
            CategoryFilter::All => Category::Main,
            CategoryFilter::Only(category) => category.clone(),
        }
    }
}

/// Post document stored at `posts/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub uid: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub author_image: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Category,
    /// Store-assigned, epoch millis. Absent while a write is still pending.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub likes: Vec<String>,
    /// Set while a cascade delete is in progress.
    #[serde(default)]
    pub deleting: bool,
}

impl Post {
    pub fn is_liked_by(&self, uid: &str) -> bool {
        self.likes.iter().any(|id| id == uid)
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    /// Defaults to "Main"
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeedQuery {
    /// "All" (default), "Main", "Anonymous" or another section name
    pub category: Option<String>,
}

/// A post as one viewer sees it.
#[derive(Debug, Clone, Serialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub uid: String,
    pub display_name: String,
    pub author_image: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub timestamp: Option<i64>,
    pub likes: Vec<String>,
    pub like_count: usize,
    pub has_liked: bool,
    pub has_commented: bool,
}

impl PostView {
    pub fn new(post: Post, viewer: &str, has_commented: bool) -> Self {
        PostView {
            has_liked: post.is_liked_by(viewer),
            like_count: post.likes.len(),
            id: post.id,
            uid: post.uid,
            display_name: post.display_name,
            author_image: post.author_image,
            title: post.title,
            content: post.content,
            category: post.category.to_string(),
            timestamp: post.timestamp,
            likes: post.likes,
            has_commented,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PostListResponse {
    pub success: bool,
    pub posts: Vec<PostView>,
    pub total: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreatePostResponse {
    pub success: bool,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, utoipa::ToSchema)]
pub struct LikeOutcome {
    pub success: bool,
    pub post_id: String,
    pub liked: bool,
    pub like_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, utoipa::ToSchema)]
pub struct DeleteReport {
    pub success: bool,
    pub post_id: String,
    pub comments_deleted: usize,
    pub attempts: u32,
}
