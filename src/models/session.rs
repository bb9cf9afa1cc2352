use serde::{Deserialize, Serialize};

/// Signed-in user for the duration of one request. Built from a verified
/// bearer token and passed explicitly to every operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub uid: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub image: Option<String>,
}

impl Session {
    pub fn new(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            email: None,
            full_name: None,
            image: None,
        }
    }

    /// Full name, else email, else uid.
    pub fn display_name(&self) -> String {
        [self.full_name.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or(self.uid.as_str())
            .to_string()
    }

    pub fn avatar(&self) -> String {
        crate::utils::resolve_avatar(
            self.image.as_deref(),
            self.full_name.as_deref().unwrap_or_default(),
        )
    }
}
