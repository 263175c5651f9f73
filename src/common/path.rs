use crate::common::error::{Error, Result};

/// Normalize a backend prefix: non-empty, no trailing slash
pub fn normalize_prefix(prefix: &str) -> Result<String> {
    let trimmed = prefix.trim();
    if trimmed.is_empty() {
        return Err(Error::Config("Backend prefix cannot be empty".to_string()));
    }

    let mut normalized = trimmed.to_string();
    while normalized.ends_with('/') && !normalized.ends_with("://") {
        normalized.pop();
    }

    Ok(normalized)
}

/// Strip `prefix` from `location` on a path boundary.
///
/// `hdfs://dc1:9000/db/t` matches `hdfs://dc1:9000` but not `hdfs://dc1:900`.
/// Returns the remainder, which is empty or starts with `/`.
pub fn strip_location_prefix<'a>(location: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = location.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Replace `from` with `to` at the start of `location`, on a path boundary
pub fn replace_location_prefix(location: &str, from: &str, to: &str) -> Option<String> {
    strip_location_prefix(location, from).map(|rest| format!("{}{}", to, rest))
}

/// Path of `location` relative to its backend prefix, usable as an object store key
pub fn object_key(location: &str, prefix: &str) -> Option<String> {
    strip_location_prefix(location, prefix).map(|rest| rest.trim_matches('/').to_string())
}
