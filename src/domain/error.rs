//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent invalid values handed to the pipeline.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid resolution '{0}': expected WIDTHxHEIGHT, e.g. 1280x720")]
    InvalidResolution(String),

    #[error("invalid bitrate '{0}': expected e.g. 2500k, 2M or 800000")]
    InvalidBitrate(String),

    #[error("invalid frame rate {0}: must be greater than zero")]
    InvalidFrameRate(u32),

    #[error("unknown input format '{0}': expected mjpeg, yuyv422 or yuv420p")]
    UnknownInputFormat(String),

    #[error("unknown image format '{0}': expected png or jpg")]
    UnknownImageFormat(String),

    #[error("frame buffer has {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
}
