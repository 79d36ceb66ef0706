//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Config file: `--config <file>` if given, else `$XDG_CONFIG_HOME/rtmpcam/rtmpcam.toml`
//! 3. Environment variables: `RTMPCAM_*` prefix, `__` between section and key
//!    (e.g. `RTMPCAM_STREAMER__FPS=15`, `RTMPCAM_CLIENT__OUTPUT_DIR=/tmp/caps`)
//! 4. Command line flags (applied by the CLI layer)

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{expand_env_vars, ImageFormat, InputFormat};

/// Settings for `rtmp-streamer`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamerSettings {
    /// V4L2 capture device
    pub device: PathBuf,
    /// Capture size, `WIDTHxHEIGHT`
    pub resolution: String,
    pub fps: u32,
    /// Video bitrate in ffmpeg notation
    pub bitrate: String,
    /// RTMP server base URL (without stream key)
    pub server: String,
    pub stream_key: String,
    pub input_format: InputFormat,
    /// Preferred encoder; `libx264` is used as fallback
    pub encoder: String,
    pub ffmpeg_path: String,
    /// Smaller buffers, direct I/O, live RTMP muxing
    pub low_latency: bool,
}

impl Default for StreamerSettings {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/video0"),
            resolution: "1280x720".into(),
            fps: 30,
            bitrate: "2500k".into(),
            server: "rtmp://127.0.0.1/live".into(),
            stream_key: "cam".into(),
            input_format: InputFormat::Mjpeg,
            encoder: "h264_v4l2m2m".into(),
            ffmpeg_path: "ffmpeg".into(),
            low_latency: false,
        }
    }
}

/// Settings for `rtmp-client`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientSettings {
    /// Stream to play
    pub url: String,
    pub ffplay_path: String,
    /// ffmpeg used as pipe decoder by the fallback viewer
    pub ffmpeg_path: String,
    /// Skip ffplay and go straight to the fallback viewer
    pub fallback_only: bool,
    /// Start the fallback viewer with saving enabled
    pub save_on_start: bool,
    /// Root directory for saved sessions
    pub output_dir: PathBuf,
    /// Frames buffered between viewer and writer before dropping
    pub queue_size: usize,
    /// Decode size for the fallback viewer, `WIDTHxHEIGHT`
    pub resolution: String,
    pub image_format: ImageFormat,
    /// How long to wait for the writer thread to drain on stop
    pub writer_join_timeout_ms: u64,
    /// Seconds between viewer status lines (0 disables)
    pub status_interval_secs: u64,
    /// Stop the fallback viewer after this many frames
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<u64>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: "rtmp://10.42.0.1/live/cam".into(),
            ffplay_path: "ffplay".into(),
            ffmpeg_path: "ffmpeg".into(),
            fallback_only: false,
            save_on_start: false,
            output_dir: PathBuf::from("captures"),
            queue_size: 64,
            resolution: "1280x720".into(),
            image_format: ImageFormat::Png,
            writer_join_timeout_ms: 5000,
            status_interval_secs: 5,
            max_frames: None,
        }
    }
}

/// Unified configuration for both tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub streamer: StreamerSettings,
    pub client: ClientSettings,
}

/// Get the XDG config directory for rtmpcam.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rtmpcam").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("rtmpcam.toml"))
}

impl Settings {
    /// Load settings with layered precedence from the process environment.
    ///
    /// An explicit `config_file` must exist; the global file is optional.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        Self::load_from(config_file, None)
    }

    /// Load settings, reading `RTMPCAM_*` overrides from `env` instead of the
    /// process environment when given.
    pub fn load_from(
        config_file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ApplicationError> {
        // 1. Defaults
        let defaults = Config::try_from(&Settings::default()).map_err(config_err)?;
        let mut builder = Config::builder().add_source(defaults);

        // 2. Config file
        match config_file {
            Some(path) => {
                if !path.is_file() {
                    return Err(ApplicationError::Config {
                        message: format!("config file not found: {}", path.display()),
                    });
                }
                builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            }
            None => {
                if let Some(global_path) = global_config_path() {
                    if global_path.exists() {
                        builder = builder
                            .add_source(File::from(global_path).format(FileFormat::Toml).required(false));
                    }
                }
            }
        }

        // 3. Environment variables
        builder = builder.add_source(
            Environment::with_prefix("RTMPCAM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config = builder.build().map_err(config_err)?;
        let mut settings: Self = config.try_deserialize().map_err(config_err)?;

        // Expand ~ and $VAR in path-like fields
        settings.expand_paths();

        Ok(settings)
    }

    /// Expand shell variables and tilde in path-like fields.
    pub fn expand_paths(&mut self) {
        self.streamer.device = PathBuf::from(expand_env_vars(&self.streamer.device.to_string_lossy()));
        self.streamer.ffmpeg_path = expand_env_vars(&self.streamer.ffmpeg_path);
        self.client.ffplay_path = expand_env_vars(&self.client.ffplay_path);
        self.client.ffmpeg_path = expand_env_vars(&self.client.ffmpeg_path);
        self.client.output_dir =
            PathBuf::from(expand_env_vars(&self.client.output_dir.to_string_lossy()));
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# rtmpcam configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/rtmpcam/rtmpcam.toml  (or the file given with --config)
#   Env:    RTMPCAM_<SECTION>__<KEY>, e.g. RTMPCAM_STREAMER__FPS=15
#   Flags:  command line options of rtmp-streamer / rtmp-client

[streamer]
# device = "/dev/video0"
# resolution = "1280x720"
# fps = 30
# bitrate = "2500k"
# server = "rtmp://127.0.0.1/live"
# stream_key = "cam"
# input_format = "mjpeg"        # mjpeg | yuyv422 | yuv420p
# encoder = "h264_v4l2m2m"      # falls back to libx264 on failure
# ffmpeg_path = "ffmpeg"
# low_latency = false

[client]
# url = "rtmp://10.42.0.1/live/cam"
# ffplay_path = "ffplay"
# ffmpeg_path = "ffmpeg"
# fallback_only = false
# save_on_start = false
# output_dir = "captures"
# queue_size = 64
# resolution = "1280x720"
# image_format = "png"          # png | jpg
# writer_join_timeout_ms = 5000
# status_interval_secs = 5
# max_frames = 300
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
