use serde::{Deserialize, Serialize};

/// Profile document stored at `users/{uid}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Same as the owner's uid
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub faculty: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl UserProfile {
    pub fn avatar_url(&self) -> String {
        crate::utils::resolve_avatar(self.image.as_deref(), &self.full_name)
    }
}

/// Editable profile fields. Everything else is owned by signup or the avatar flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub faculty: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub bio: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AvatarUpdate {
    pub image: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub success: bool,
    pub profile: UserProfile,
    pub avatar_url: String,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        ProfileResponse {
            success: true,
            avatar_url: profile.avatar_url(),
            profile,
        }
    }
}
