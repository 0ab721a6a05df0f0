use thiserror::Error;

/// Failures at the audio hardware boundary.
///
/// None of these escape the public audio API: the engine logs them and drops
/// to the synthetic signal path so the per-tick pipeline always has data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AudioError {
    /// The capture device refused access
    #[error("microphone permission denied")]
    PermissionDenied,

    /// No input device is available on the default host
    #[error("no input device available")]
    NoInputDevice,

    /// The analysis graph could not be constructed
    #[error("audio initialization failed: {0}")]
    InitializationFailure(String),

    /// The input stream failed after it was built
    #[error("audio stream error: {0}")]
    Stream(String),

    /// The device offers no sample format we can read
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

impl AudioError {
    /// Whether this failure should be shown to the performer rather than just logged.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, AudioError::InitializationFailure(_))
    }
}

/// Errors raised while loading or saving a performance configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
