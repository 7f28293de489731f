/// Result alias that carries the custom [`BeatscapeError`] type.
pub type Result<T> = std::result::Result<T, BeatscapeError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum BeatscapeError {
    /// A configuration value was rejected before any analysis or rendering ran.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Input data that cannot be processed at all (for example an empty
    /// sample buffer).
    #[error("{0}")]
    InvalidInput(&'static str),
    /// A module or effect produced output that cannot be turned into a valid
    /// frame. Frames are chained through the feedback trail, so the whole
    /// render stops here.
    #[error("render failed: {0}")]
    Render(String),
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Failure reported by the FFT backend.
    #[error("fft failure: {0}")]
    Fft(#[from] realfft::FftError),
}

impl BeatscapeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    pub fn render<T: Into<String>>(msg: T) -> Self {
        Self::Render(msg.into())
    }

    /// Returns `true` when the error was raised by configuration validation.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<&str> for BeatscapeError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BeatscapeError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_tagged() {
        let err = BeatscapeError::config("bars must be positive");
        assert!(err.is_config());
        assert_eq!(
            err.to_string(),
            "invalid configuration: bars must be positive"
        );
        assert!(!BeatscapeError::msg("other").is_config());
    }
}
