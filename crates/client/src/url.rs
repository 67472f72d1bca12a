//! Endpoint URL helpers.
//!
//! A collection endpoint like `http://identity:5000/api/users` splits into a
//! base (`http://identity:5000/api`) used for sibling-collection lookups and
//! a resource name (`users`) used for classification and filenames.

/// The URL with its last path segment removed.
pub fn base_of(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => trimmed[..pos].to_string(),
        None => trimmed.to_string(),
    }
}

/// The last path segment of the URL.
pub fn resource_of(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => trimmed[pos + 1..].to_string(),
        None => trimmed.to_string(),
    }
}
