/// Result alias that carries the custom [`PlayerError`] type.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Common error type for the core crate.
///
/// Nothing in the player propagates these far enough to end a session. The
/// engine and session catch them at the operation boundary and log them.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON in a manifest or configuration file.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    /// The track list could not be used.
    #[error("manifest rejected: {0}")]
    Manifest(String),
    /// A cover image or audio file failed to load.
    #[error("failed to load asset `{url}`: {reason}")]
    AssetLoad { url: String, reason: String },
    /// Device-level playback error reported by the audio output.
    #[error("audio device error: {0}")]
    AudioDevice(String),
    /// Priming an adjacent track failed.
    #[error("preload of `{url}` failed: {reason}")]
    Preload { url: String, reason: String },
    /// An argument was outside the range a component accepts.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// An awaited asset did not arrive within the configured limit.
    #[error("timed out after {millis} ms waiting for `{url}`")]
    Timeout { url: String, millis: u64 },
}

impl PlayerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn asset(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::AssetLoad {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<&str> for PlayerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PlayerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
