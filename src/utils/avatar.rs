/// Generated avatar used when a user has not uploaded an image.
pub fn fallback_avatar(name: &str) -> String {
    let name = if name.trim().is_empty() { "User" } else { name };
    format!(
        "https://ui-avatars.com/api/?name={}&background=random",
        urlencoding::encode(name)
    )
}

/// Returns `image` when set, otherwise the generated avatar for `name`.
pub fn resolve_avatar(image: Option<&str>, name: &str) -> String {
    match image {
        Some(image) if !image.trim().is_empty() => image.to_string(),
        _ => fallback_avatar(name),
    }
}
