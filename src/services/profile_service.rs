// ==================== PROFILE ====================
// The profile document lives at users/{uid}; only its owner edits it.

use crate::{
    models::{ProfileUpdate, Session, UserProfile},
    state::AppState,
    store::CollectionRef,
    utils::{AppError, AppResult},
};

pub async fn get_profile(state: &AppState, session: &Session) -> AppResult<UserProfile> {
    let record = state
        .store
        .get(&CollectionRef::users(), &session.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("profile {}", session.uid)))?;
    Ok(record.decode()?)
}

/// Saves the editable fields and returns the stored profile.
pub async fn save_profile(state: &AppState, session: &Session, update: &ProfileUpdate) -> AppResult<UserProfile> {
    state.gateway.save_profile(session, update).await?;
    get_profile(state, session).await
}

pub async fn set_avatar(state: &AppState, session: &Session, image: &str) -> AppResult<UserProfile> {
    state.gateway.set_avatar(session, image).await?;
    get_profile(state, session).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_profile_is_not_found() {
        let state = test_state(Arc::new(MemoryStore::new()));
        let err = get_profile(&state, &Session::new("nobody")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_save_returns_stored_profile() {
        let store = MemoryStore::new();
        store
            .insert_with_id(
                &CollectionRef::users(),
                "u1",
                json!({ "email": "ana@uni.edu", "fullName": "Ana" }).as_object().unwrap().clone(),
            )
            .await;
        let state = test_state(Arc::new(store));
        let session = Session::new("u1");

        let update = ProfileUpdate {
            full_name: "Ana Souza".into(),
            faculty: "Engineering".into(),
            age: Some(22),
            ..Default::default()
        };
        let profile = save_profile(&state, &session, &update).await.unwrap();
        assert_eq!(profile.full_name, "Ana Souza");
        assert_eq!(profile.faculty, "Engineering");
        assert_eq!(profile.age, Some(22));
        // untouched by the editable-field update
        assert_eq!(profile.email.as_deref(), Some("ana@uni.edu"));

        let profile = set_avatar(&state, &session, "https://cdn/ana.png").await.unwrap();
        assert_eq!(profile.avatar_url(), "https://cdn/ana.png");
    }
}
