//! Dot-separated parameter paths.
//!
//! Template keys and backend parameter ids share the same syntax:
//! `"surface.bsdf.reflectance.value"`.

use smallvec::SmallVec;

use super::{Error, Result};

/// Path separator.
pub const SEP: char = '.';

/// Split a path into its segments.
#[inline]
pub fn split(path: &str) -> SmallVec<[&str; 8]> {
    path.split(SEP).collect()
}

/// Join a prefix and a relative path. Either may be empty.
pub fn join(prefix: &str, rel: &str) -> String {
    match (prefix.is_empty(), rel.is_empty()) {
        (true, _) => rel.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}{SEP}{rel}"),
    }
}

/// Parent of a path (`None` for single-segment paths).
pub fn parent(path: &str) -> Option<&str> {
    path.rfind(SEP).map(|i| &path[..i])
}

/// Last segment of a path.
pub fn leaf(path: &str) -> &str {
    path.rfind(SEP).map(|i| &path[i + 1..]).unwrap_or(path)
}

/// Check that a path has no empty segments.
pub fn validate(path: &str) -> Result<()> {
    if path.is_empty() || split(path).iter().any(|s| s.is_empty()) {
        return Err(Error::other(format!("Invalid path: '{path}'")));
    }
    Ok(())
}
