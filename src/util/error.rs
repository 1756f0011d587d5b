//! Error types for kernel dictionary generation and updates.

use thiserror::Error;

/// Main error type for template resolution, updates and rendering.
#[derive(Error, Debug)]
pub enum Error {
    /// The context lacks an axis an evaluator depends on
    #[error("Context mismatch at '{path}': context has no {axis}")]
    ContextMismatch { path: String, axis: String },

    /// A parameter could not be evaluated
    #[error("Unresolved parameter '{path}': {reason}")]
    UnresolvedParameter { path: String, reason: String },

    /// Reference chain loops back onto itself
    #[error("Cyclic template: {}", cycle.join(" -> "))]
    CyclicTemplate { cycle: Vec<String> },

    /// Patch targets a path missing from the backend parameter index
    #[error("Unknown parameter: {path}")]
    UnknownParameter { path: String },

    /// Wrapper shape no longer matches its template
    #[error("Wrapper is stale and must be rebuilt before updates")]
    StaleWrapper,

    /// Wrapper holds no backend object yet
    #[error("Wrapper has not been built")]
    Unbuilt,

    /// Plugin kind (or kind/role pair) has no backend type
    #[error("Unsupported type: '{kind}'{}", role.as_deref().map(|r| format!(" as {r}")).unwrap_or_default())]
    UnsupportedType { kind: String, role: Option<String> },

    /// Initialisation-only parameter used where updates are expected
    #[error("Parameter '{path}' is not updatable")]
    NotUpdatable { path: String },

    /// Path inserted twice into the same template
    #[error("Duplicate path: {0}")]
    DuplicatePath(String),

    /// A path is used both as a leaf and as a prefix of another path
    #[error("Path conflict: {0}")]
    PathConflict(String),

    /// Two render contexts share a result key
    #[error("Duplicate context: {0}")]
    DuplicateContext(String),

    /// Value rejected by the backend
    #[error("Type mismatch at '{path}': expected {expected}, got {actual}")]
    TypeMismatch { path: String, expected: String, actual: String },

    /// Failure reported by the rendering kernel (including cancellation)
    #[error("Kernel error: {0}")]
    Kernel(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialisation error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an unresolved parameter error.
    pub fn unresolved(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvedParameter { path: path.into(), reason: reason.into() }
    }

    /// Create a context mismatch error with no path attached yet.
    ///
    /// Evaluators raise this; template resolution fills in the path.
    pub fn missing_axis(axis: impl Into<String>) -> Self {
        Self::ContextMismatch { path: String::new(), axis: axis.into() }
    }

    /// Create an unsupported type error.
    pub fn unsupported(kind: impl Into<String>, role: Option<&str>) -> Self {
        Self::UnsupportedType { kind: kind.into(), role: role.map(str::to_string) }
    }

    /// Attach a template path to an error raised by an evaluator.
    ///
    /// Context mismatches keep their kind; other evaluation failures become
    /// [`Error::UnresolvedParameter`]. Errors that already name a path pass
    /// through unchanged.
    pub fn at_path(self, path: &str) -> Self {
        match self {
            Self::ContextMismatch { path: p, axis } if p.is_empty() => {
                Self::ContextMismatch { path: path.to_string(), axis }
            }
            e @ (Self::ContextMismatch { .. }
            | Self::UnresolvedParameter { .. }
            | Self::CyclicTemplate { .. }
            | Self::UnsupportedType { .. }) => e,
            other => Self::unresolved(path, other.to_string()),
        }
    }

    /// Whether the error means the wrapper must be rebuilt.
    pub fn requires_rebuild(&self) -> bool {
        matches!(self, Self::UnknownParameter { .. } | Self::StaleWrapper | Self::Unbuilt)
    }
}

/// Result type alias for kdict operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::UnknownParameter { path: "bsdf.reflectance.value".into() };
        assert!(e.to_string().contains("bsdf.reflectance.value"));

        let e = Error::CyclicTemplate { cycle: vec!["a".into(), "b".into(), "a".into()] };
        assert_eq!(e.to_string(), "Cyclic template: a -> b -> a");

        let e = Error::unsupported("teapot", Some("Shape"));
        assert!(e.to_string().contains("teapot"));
        assert!(e.to_string().contains("Shape"));
    }

    #[test]
    fn test_at_path() {
        let e = Error::missing_axis("wavelength").at_path("phase.g");
        match e {
            Error::ContextMismatch { path, axis } => {
                assert_eq!(path, "phase.g");
                assert_eq!(axis, "wavelength");
            }
            other => panic!("unexpected {other:?}"),
        }

        let e = Error::other("negative albedo").at_path("bsdf.reflectance.value");
        assert!(matches!(e, Error::UnresolvedParameter { ref path, .. } if path == "bsdf.reflectance.value"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
