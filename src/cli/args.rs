//! CLI argument definitions using clap
//!
//! Value flags are optional so that unset flags fall through to the config
//! file, `RTMPCAM_*` environment variables, and finally compiled defaults.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, ValueHint};

use crate::config::{ClientSettings, StreamerSettings};
use crate::domain::{ImageFormat, InputFormat};

/// Flags shared by both tools.
#[derive(Args, Debug, Default)]
pub struct CommonArgs {
    /// Print the ffmpeg/ffplay command lines and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Config file (default: ~/.config/rtmpcam/rtmpcam.toml)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub show_config: bool,

    /// Print a commented config template and exit
    #[arg(long, conflicts_with = "show_config")]
    pub config_template: bool,

    /// Generate shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<clap_complete::Shell>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Stream a V4L2 camera to an RTMP server using ffmpeg
#[derive(Parser, Debug)]
#[command(name = "rtmp-streamer")]
#[command(author, version, about, long_about = None)]
pub struct StreamerCli {
    /// Video device path [default: /dev/video0]
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub device: Option<PathBuf>,

    /// Resolution WIDTHxHEIGHT [default: 1280x720]
    #[arg(long)]
    pub resolution: Option<String>,

    /// Frames per second [default: 30]
    #[arg(long)]
    pub fps: Option<u32>,

    /// Video bitrate, e.g. 2500k [default: 2500k]
    #[arg(long)]
    pub bitrate: Option<String>,

    /// RTMP server base URL without stream key [default: rtmp://127.0.0.1/live]
    #[arg(long, value_hint = ValueHint::Url)]
    pub server: Option<String>,

    /// RTMP stream key [default: cam]
    #[arg(long)]
    pub stream_key: Option<String>,

    /// V4L2 input pixel format [default: mjpeg]
    #[arg(long, value_enum)]
    pub input_format: Option<InputFormat>,

    /// ffmpeg video encoder; libx264 is the fallback [default: h264_v4l2m2m]
    #[arg(long)]
    pub encoder: Option<String>,

    /// Path to the ffmpeg binary [default: ffmpeg]
    #[arg(long, value_hint = ValueHint::ExecutablePath)]
    pub ffmpeg_path: Option<String>,

    /// Reduce end-to-end latency (smaller buffers, no B-frames)
    #[arg(long)]
    pub low_latency: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl StreamerCli {
    /// Overlay the given flags onto loaded settings.
    pub fn apply(&self, s: &mut StreamerSettings) {
        if let Some(v) = &self.device {
            s.device = v.clone();
        }
        if let Some(v) = &self.resolution {
            s.resolution = v.clone();
        }
        if let Some(v) = self.fps {
            s.fps = v;
        }
        if let Some(v) = &self.bitrate {
            s.bitrate = v.clone();
        }
        if let Some(v) = &self.server {
            s.server = v.clone();
        }
        if let Some(v) = &self.stream_key {
            s.stream_key = v.clone();
        }
        if let Some(v) = self.input_format {
            s.input_format = v;
        }
        if let Some(v) = &self.encoder {
            s.encoder = v.clone();
        }
        if let Some(v) = &self.ffmpeg_path {
            s.ffmpeg_path = v.clone();
        }
        if self.low_latency {
            s.low_latency = true;
        }
    }
}

/// Play an RTMP stream with ffplay, falling back to a recording pipe viewer
#[derive(Parser, Debug)]
#[command(name = "rtmp-client")]
#[command(author, version, about, long_about = None)]
pub struct ClientCli {
    /// RTMP URL to play [default: rtmp://10.42.0.1/live/cam]
    #[arg(long, value_hint = ValueHint::Url)]
    pub url: Option<String>,

    /// Path to the ffplay binary [default: ffplay]
    #[arg(long, value_hint = ValueHint::ExecutablePath)]
    pub ffplay_path: Option<String>,

    /// Path to the ffmpeg binary used by the fallback viewer [default: ffmpeg]
    #[arg(long, value_hint = ValueHint::ExecutablePath)]
    pub ffmpeg_path: Option<String>,

    /// Skip ffplay and use the fallback viewer
    #[arg(long, alias = "use-fallback")]
    pub fallback_only: bool,

    /// Start the fallback viewer with frame saving enabled
    #[arg(long)]
    pub save: bool,

    /// Directory for saved sessions [default: captures]
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,

    /// Frames buffered for the writer before dropping [default: 64]
    #[arg(long)]
    pub queue_size: Option<usize>,

    /// Fallback viewer decode size WIDTHxHEIGHT [default: 1280x720]
    #[arg(long)]
    pub resolution: Option<String>,

    /// Image format for saved frames [default: png]
    #[arg(long, value_enum)]
    pub image_format: Option<ImageFormat>,

    /// Stop the fallback viewer after N frames
    #[arg(long, value_name = "N")]
    pub max_frames: Option<u64>,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl ClientCli {
    /// Overlay the given flags onto loaded settings.
    pub fn apply(&self, s: &mut ClientSettings) {
        if let Some(v) = &self.url {
            s.url = v.clone();
        }
        if let Some(v) = &self.ffplay_path {
            s.ffplay_path = v.clone();
        }
        if let Some(v) = &self.ffmpeg_path {
            s.ffmpeg_path = v.clone();
        }
        if self.fallback_only {
            s.fallback_only = true;
        }
        if self.save {
            s.save_on_start = true;
        }
        if let Some(v) = &self.output_dir {
            s.output_dir = v.clone();
        }
        if let Some(v) = self.queue_size {
            s.queue_size = v;
        }
        if let Some(v) = &self.resolution {
            s.resolution = v.clone();
        }
        if let Some(v) = self.image_format {
            s.image_format = v;
        }
        if let Some(v) = self.max_frames {
            s.max_frames = Some(v);
        }
    }
}
