//! Domain entities: core data structures

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::DomainError;

/// Encoder used when the preferred (hardware) encoder cannot run.
pub const SOFTWARE_ENCODER: &str = "libx264";

/// Largest width or height accepted from user input (ffmpeg's own limit).
pub const MAX_DIMENSION: u32 = 16384;

/// Frame size in pixels, written as `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size of one tightly packed RGB24 frame at this resolution.
    ///
    /// `None` if the size does not fit in `usize`.
    pub fn rgb24_frame_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(3)
    }
}

impl FromStr for Resolution {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidResolution(s.to_string());
        let (w, h) = s.trim().split_once('x').ok_or_else(invalid)?;
        let width: u32 = w.parse().map_err(|_| invalid())?;
        let height: u32 = h.parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(invalid());
        }
        let res = Self { width, height };
        res.rgb24_frame_len().ok_or_else(invalid)?;
        Ok(res)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Video bitrate in ffmpeg notation (`2500k`, `2M`, `800000`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitrate(String);

fn bitrate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+(\.[0-9]+)?[kKmM]?$").expect("static regex"))
}

impl Bitrate {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Bitrate {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if bitrate_regex().is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(DomainError::InvalidBitrate(s.to_string()))
        }
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// V4L2 input pixel format requested from the camera.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Mjpeg,
    Yuyv422,
    Yuv420p,
}

impl InputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Mjpeg => "mjpeg",
            InputFormat::Yuyv422 => "yuyv422",
            InputFormat::Yuv420p => "yuv420p",
        }
    }
}

impl FromStr for InputFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mjpeg" => Ok(InputFormat::Mjpeg),
            "yuyv422" => Ok(InputFormat::Yuyv422),
            "yuv420p" => Ok(InputFormat::Yuv420p),
            _ => Err(DomainError::UnknownInputFormat(s.to_string())),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image file format for saved frames.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    #[value(alias = "jpeg")]
    #[serde(alias = "jpeg")]
    Jpg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpg),
            _ => Err(DomainError::UnknownImageFormat(s.to_string())),
        }
    }
}

/// Which encoder family a command line targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderProfile {
    /// Preferred encoder, typically hardware accelerated (e.g. `h264_v4l2m2m`)
    Hardware(String),
    /// `libx264` with extra low-latency tuning
    Software,
}

impl EncoderProfile {
    pub fn from_name(name: &str) -> Self {
        if name == SOFTWARE_ENCODER {
            EncoderProfile::Software
        } else {
            EncoderProfile::Hardware(name.to_string())
        }
    }

    pub fn encoder_name(&self) -> &str {
        match self {
            EncoderProfile::Hardware(name) => name,
            EncoderProfile::Software => SOFTWARE_ENCODER,
        }
    }

    pub fn is_software(&self) -> bool {
        matches!(self, EncoderProfile::Software)
    }
}

/// RTMP publish destination: server base URL plus stream key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    pub server: String,
    pub stream_key: String,
}

impl StreamTarget {
    pub fn new(server: impl Into<String>, stream_key: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            stream_key: stream_key.into(),
        }
    }

    /// Full publish URL (`<server>/<key>`, trailing slashes on server removed).
    pub fn url(&self) -> String {
        format!("{}/{}", self.server.trim_end_matches('/'), self.stream_key)
    }
}

/// Everything needed to build an encoder command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderOptions {
    pub device: PathBuf,
    pub resolution: Resolution,
    pub fps: u32,
    pub bitrate: Bitrate,
    pub input_format: InputFormat,
    pub target: StreamTarget,
    pub low_latency: bool,
}

/// One decoded RGB24 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Position in the decoded stream, starting at 0
    pub index: u64,
}

impl VideoFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self, DomainError> {
        let resolution = Resolution::new(width, height);
        let expected = resolution
            .rgb24_frame_len()
            .ok_or_else(|| DomainError::InvalidResolution(resolution.to_string()))?;
        if data.len() != expected {
            return Err(DomainError::FrameSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            index,
        })
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Directory name for a saving session started at `now`.
pub fn session_dir_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// File name for the `index`-th frame written in a session.
pub fn frame_file_name(index: u64, format: ImageFormat) -> String {
    format!("frame_{:06}.{}", index, format.extension())
}

/// Expand `~`, `$VAR` and `${VAR}` in a path-like string.
///
/// Unknown variables leave the input unchanged.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}
