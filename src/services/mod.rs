pub mod forum_service;
pub mod profile_service;
