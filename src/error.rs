//! Error types for pose-coach

use thiserror::Error;

/// Core pose-coach errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    // Detection errors
    #[error("Backend unavailable: {backend}: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("No detection backend available")]
    NoBackend,

    #[error("No landmarks detected")]
    NoLandmarksDetected,

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    // Template errors
    #[error("Invalid template reference: {0}")]
    InvalidTemplateReference(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    // Authoring errors
    #[error("Duplicate label: {0} is already placed")]
    DuplicateLabelAdd(String),

    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    #[error("No pending placement")]
    NoPendingPlacement,

    #[error("Invalid viewport: {width}x{height}")]
    InvalidViewport { width: f32, height: f32 },
}

impl PoseError {
    /// フォールバックや再試行で回復できるか
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PoseError::BackendUnavailable { .. }
                | PoseError::NoLandmarksDetected
                | PoseError::MalformedFrame(_)
        )
    }
}

/// Result type for pose-coach operations
pub type PoseResult<T> = Result<T, PoseError>;
