//! Common result and error types for the Kiln compiler.

/// The standard result type for operations that can only fail on a bug.
///
/// User-facing problems (a missing layout, a filter that rejects its input)
/// are reported through the per-crate error enums. `InternalError` is reserved
/// for broken invariants inside Kiln itself.
pub type KilnResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in Kiln, not a problem with the site.
///
/// Examples are an unbalanced dependency-tracker stack or an item rep that
/// refers to an item missing from the site.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("tracker stack empty");
        assert_eq!(format!("{err}"), "internal error: tracker stack empty");
    }

    #[test]
    fn err_path() {
        let r: KilnResult<i32> = Err(InternalError::new("boom"));
        assert_eq!(r.unwrap_err().message, "boom");
    }

    #[test]
    fn from_string() {
        let err: InternalError = "from string".to_string().into();
        assert_eq!(err.message, "from string");
    }
}
