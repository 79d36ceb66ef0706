//! rtmpcam: publish a V4L2 camera to RTMP with ffmpeg, and watch or record the stream.
//!
//! Two binaries share this library:
//! - `rtmp-streamer` builds an ffmpeg command line (hardware encoder first,
//!   `libx264` as fallback) and runs it.
//! - `rtmp-client` runs ffplay, or falls back to a pipe-decoder viewer that can
//!   save frames to disk through a bounded queue and a background writer.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
