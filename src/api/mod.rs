pub mod health;
pub mod posts;
pub mod profile;
pub mod swagger;

use crate::middleware::AuthMiddleware;
use actix_web::web;

/// Registers `/health` and the authenticated `/api/v1` scope.
pub fn configure(cfg: &mut web::ServiceConfig, jwt_secret: &str) {
    cfg.route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api/v1")
                .wrap(AuthMiddleware::new(jwt_secret))
                // ==================== PROFILE ====================
                .route("/profile", web::get().to(profile::get_profile))
                .route("/profile", web::put().to(profile::update_profile))
                .route("/profile/avatar", web::put().to(profile::update_avatar))
                // ==================== FORUM ====================
                .route("/posts", web::get().to(posts::list_posts))
                .route("/posts", web::post().to(posts::create_post))
                .route("/posts/live", web::get().to(posts::live_posts))
                .route("/posts/{id}", web::delete().to(posts::delete_post))
                .route("/posts/{id}/like", web::post().to(posts::toggle_like))
                .route("/posts/{id}/comments", web::get().to(posts::list_comments))
                .route("/posts/{id}/comments", web::post().to(posts::add_comment)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::issue_token;
    use crate::state::test_state;
    use crate::store::{CollectionRef, MemoryStore};
    use actix_web::body::MessageBody;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    const SECRET: &str = "test-secret";

    fn bearer(uid: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", issue_token(uid, SECRET)))
    }

    #[actix_web::test]
    async fn test_health_is_public() {
        let state = test_state(Arc::new(MemoryStore::new()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(|cfg| configure(cfg, SECRET)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "memory");
        assert_eq!(body["active_feeds"], 0);
    }

    #[actix_web::test]
    async fn test_missing_token_is_unauthorized() {
        let state = test_state(Arc::new(MemoryStore::new()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(|cfg| configure(cfg, SECRET)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/posts").to_request();
        let status = match test::try_call_service(&app, req).await {
            Ok(res) => res.status(),
            Err(e) => e.as_response_error().status_code(),
        };
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_invalid_age_is_bad_request() {
        let store = MemoryStore::new();
        store
            .insert_with_id(&CollectionRef::users(), "u1", json!({ "fullName": "Ana" }).as_object().unwrap().clone())
            .await;
        let state = test_state(Arc::new(store));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(|cfg| configure(cfg, SECRET)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/v1/profile")
            .insert_header(bearer("u1"))
            .set_json(json!({ "fullName": "Ana", "age": 7 }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Please enter a valid age between 10 and 120.");
    }

    #[actix_web::test]
    async fn test_live_feed_streams_snapshot_frames() {
        let store = MemoryStore::new();
        store
            .insert_with_id(
                &CollectionRef::posts(),
                "p1",
                json!({ "uid": "author", "title": "Exam dates", "timestamp": 1 }).as_object().unwrap().clone(),
            )
            .await;
        let state = web::Data::new(test_state(Arc::new(store)));
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(|cfg| configure(cfg, SECRET)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/posts/live?category=All")
            .insert_header(bearer("reader"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get("content-type").unwrap(), "text/event-stream");
        assert_eq!(state.subscriptions.active_feeds(), 1);

        let mut body = std::pin::pin!(res.into_body());
        let chunk = match futures::future::poll_fn(|cx| body.as_mut().poll_next(cx)).await {
            Some(Ok(bytes)) => bytes,
            _ => panic!("live feed ended before the first frame"),
        };
        let frame = std::str::from_utf8(&chunk).unwrap();
        let payload = frame
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap();
        let event: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(event["type"], "snapshot");
        assert_eq!(event["total"], 1);
        assert_eq!(event["posts"][0]["id"], "p1");
        assert_eq!(event["posts"][0]["hasLiked"], false);
    }

    #[actix_web::test]
    async fn test_post_like_and_list() {
        let state = test_state(Arc::new(MemoryStore::new()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(|cfg| configure(cfg, SECRET)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/posts")
            .insert_header(bearer("author"))
            .set_json(json!({ "title": "Exam dates", "content": "anyone?" }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(res).await;
        let id = created["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/posts/{}/like", id))
            .insert_header(bearer("reader"))
            .to_request();
        let outcome: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(outcome["liked"], true);

        let req = test::TestRequest::get()
            .uri("/api/v1/posts?category=All")
            .insert_header(bearer("reader"))
            .to_request();
        let list: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(list["total"], 1);
        assert_eq!(list["posts"][0]["hasLiked"], true);
        assert_eq!(list["posts"][0]["likeCount"], 1);
    }
}
