//! Error types for capture-mask

use thiserror::Error;

/// Why a pixel sample could not produce a usable color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFailure {
    /// The region has zero or near-zero area
    InsufficientArea,
    /// The live display could not be rendered for the region
    RenderUnavailable,
    /// The composited region was too transparent to report
    Translucent,
}

/// Error type for capture-mask operations
///
/// None of these are fatal to the host. Compositors turn them into
/// fail-closed rendering and keep the most recent one for reporting.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Capture exclusion primitive unavailable on {platform}: secure host exposes no excluded child")]
    UnsupportedPlatformPrimitive { platform: &'static str },

    #[error("Sample region too small: {width}x{height}")]
    InsufficientArea { width: f64, height: f64 },

    #[error("Live render unavailable: {0}")]
    RenderUnavailable(String),

    #[error("Sampled region is translucent (alpha {alpha:.2})")]
    Translucent { alpha: f32 },

    #[error("Sample result {generation} superseded by {current}")]
    StaleResult { generation: u64, current: u64 },

    #[error("Async runtime error: {0}")]
    Runtime(String),
}

impl CaptureError {
    /// Classify this error as a sampling failure, if it is one
    pub fn sample_failure(&self) -> Option<SampleFailure> {
        match self {
            CaptureError::InsufficientArea { .. } => Some(SampleFailure::InsufficientArea),
            CaptureError::RenderUnavailable(_) => Some(SampleFailure::RenderUnavailable),
            CaptureError::Translucent { .. } => Some(SampleFailure::Translucent),
            _ => None,
        }
    }

    /// Whether the owning compositor should retry on the next layout or scheme change
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.sample_failure(),
            Some(SampleFailure::InsufficientArea | SampleFailure::RenderUnavailable)
        )
    }
}

/// Result type for capture-mask operations
pub type CaptureResult<T> = Result<T, CaptureError>;
