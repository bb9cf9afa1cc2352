use utoipa::OpenApi;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Forum Sync Service API",
        version = "1.0.0",
        description = "Student forum backed by a document store.\n\n**Authentication:** every `/api/v1` endpoint requires a JWT Bearer token.\n\n**Features:**\n- Live post feed over Server-Sent Events (full snapshots)\n- Likes applied optimistically with rollback\n- Profile editing with age validation\n- Cascade deletion of posts and their comments",
    ),
    paths(
        // Health
        crate::api::health::health_check,

        // Profile
        crate::api::profile::get_profile,
        crate::api::profile::update_profile,
        crate::api::profile::update_avatar,

        // Forum
        crate::api::posts::list_posts,
        crate::api::posts::create_post,
        crate::api::posts::live_posts,
        crate::api::posts::toggle_like,
        crate::api::posts::delete_post,
        crate::api::posts::list_comments,
        crate::api::posts::add_comment,
    ),
    components(
        schemas(
            crate::api::health::HealthResponse,

            crate::models::UserProfile,
            crate::models::ProfileUpdate,
            crate::models::AvatarUpdate,
            crate::models::ProfileResponse,

            crate::models::PostView,
            crate::models::CreatePostRequest,
            crate::models::CreatePostResponse,
            crate::models::PostListResponse,
            crate::models::LikeOutcome,
            crate::models::DeleteReport,
            crate::models::Comment,
            crate::models::CreateCommentRequest,
            crate::models::CreateCommentResponse,
            crate::models::CommentListResponse,
        )
    ),
    tags(
        (name = "Health", description = "Liveness, store backend and number of open live feeds."),
        (name = "Profile", description = "The signed-in user's profile document."),
        (name = "Forum", description = "Posts, likes, comments and the live feed."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Enter your JWT token"))
                        .build()
                ),
            );
        }
    }
}
