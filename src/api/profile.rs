use crate::models::{AvatarUpdate, ProfileResponse, ProfileUpdate, Session};
use crate::services::profile_service;
use crate::state::AppState;
use crate::utils::AppError;
use actix_web::{web, HttpResponse};

/// GET /api/v1/profile - Profile of the signed-in user
#[utoipa::path(
    get,
    path = "/api/v1/profile",
    tag = "Profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 404, description = "No profile document for this user")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_profile(
    state: web::Data<AppState>,
    session: web::ReqData<Session>,
) -> Result<HttpResponse, AppError> {
    let profile = profile_service::get_profile(&state, &session).await?;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(profile)))
}

/// PUT /api/v1/profile - Saves the editable profile fields
#[utoipa::path(
    put,
    path = "/api/v1/profile",
    tag = "Profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Age out of range")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    state: web::Data<AppState>,
    session: web::ReqData<Session>,
    body: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, AppError> {
    let profile = profile_service::save_profile(&state, &session, &body).await?;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(profile)))
}

/// PUT /api/v1/profile/avatar - Points the profile at an uploaded image
#[utoipa::path(
    put,
    path = "/api/v1/profile/avatar",
    tag = "Profile",
    request_body = AvatarUpdate,
    responses(
        (status = 200, description = "Avatar updated", body = ProfileResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_avatar(
    state: web::Data<AppState>,
    session: web::ReqData<Session>,
    body: web::Json<AvatarUpdate>,
) -> Result<HttpResponse, AppError> {
    let profile = profile_service::set_avatar(&state, &session, &body.image).await?;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(profile)))
}
