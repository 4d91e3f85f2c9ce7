//! Error types for the localization pipeline

use thiserror::Error;

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, LocateError>;

#[derive(Error, Debug)]
pub enum LocateError {
    /// A search or segmentation produced nothing meeting its criteria
    #[error("nothing found: {reason}")]
    NotFound { reason: String },

    /// A polygon could not be reduced to the expected vertex count, or
    /// produced non-positive rectification dimensions
    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry { reason: String },

    /// Empty or otherwise unusable input image or parameter
    #[error("invalid input: {reason}")]
    InputInvalid { reason: String },

    #[error("invalid configuration: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LocateError {
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
        }
    }

    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateGeometry {
            reason: reason.into(),
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InputInvalid {
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error wrapping its cause
    pub fn config_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Recoverable errors are reported upward; the caller retries or degrades.
    /// Only invalid input and I/O failures are hard errors.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LocateError::NotFound { .. } | LocateError::DegenerateGeometry { .. }
        )
    }
}

/// Reject zero-sized images before any stage touches them
pub(crate) fn ensure_not_empty(dimensions: (u32, u32), what: &str) -> Result<()> {
    let (width, height) = dimensions;
    if width == 0 || height == 0 {
        return Err(LocateError::invalid_input(format!(
            "{what} is empty ({width}x{height})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_kinds() {
        assert!(LocateError::not_found("no label").is_recoverable());
        assert!(LocateError::degenerate("3 vertices").is_recoverable());
        assert!(!LocateError::invalid_input("empty").is_recoverable());
        assert!(!LocateError::config("bad epsilon").is_recoverable());
    }

    #[test]
    fn empty_dimensions_are_rejected() {
        assert!(ensure_not_empty((0, 10), "frame").is_err());
        assert!(ensure_not_empty((10, 0), "frame").is_err());
        assert!(ensure_not_empty((1, 1), "frame").is_ok());
    }

    #[test]
    fn messages_carry_reason() {
        let err = LocateError::invalid_input("frame is empty (0x0)");
        assert_eq!(err.to_string(), "invalid input: frame is empty (0x0)");
    }
}
