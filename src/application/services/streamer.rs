//! Camera streamer: runs ffmpeg with the preferred encoder, falling back to libx264
//!
//! The preferred encoder (usually the V4L2 M2M hardware encoder) is tried first.
//! If ffmpeg cannot be started or exits non-zero, the same pipeline is retried once
//! with the software encoder and its low-latency tuning.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::domain::{
    build_encoder_args, render_command, Bitrate, DomainError, EncoderOptions, EncoderProfile,
    Resolution, StreamTarget,
};
use crate::exitcode;
use crate::infrastructure::traits::{CommandRunner, FileSystem};

/// The commands one streaming run may execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPlan {
    pub program: PathBuf,
    pub url: String,
    pub primary: Vec<String>,
    /// Software-encoder retry; `None` when the primary already uses it
    pub fallback: Option<Vec<String>>,
}

impl StreamPlan {
    pub fn primary_line(&self) -> String {
        render_command(&self.program, &self.primary)
    }

    pub fn fallback_line(&self) -> Option<String> {
        self.fallback
            .as_ref()
            .map(|args| render_command(&self.program, args))
    }
}

/// Result of a streaming run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Exit code of the last ffmpeg run
    pub exit_code: i32,
    pub fallback_used: bool,
    pub interrupted: bool,
}

/// Publishes the configured camera to the configured RTMP server.
pub struct StreamerService {
    fs: Arc<dyn FileSystem>,
    cmd: Arc<dyn CommandRunner>,
    settings: Arc<Settings>,
    interrupted: Arc<AtomicBool>,
}

impl StreamerService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        cmd: Arc<dyn CommandRunner>,
        settings: Arc<Settings>,
        interrupted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            fs,
            cmd,
            settings,
            interrupted,
        }
    }

    /// Validate and convert the streamer settings into encoder options.
    pub fn encoder_options(&self) -> ApplicationResult<EncoderOptions> {
        let s = &self.settings.streamer;
        if s.fps == 0 {
            return Err(DomainError::InvalidFrameRate(s.fps).into());
        }
        Ok(EncoderOptions {
            device: s.device.clone(),
            resolution: s.resolution.parse::<Resolution>()?,
            fps: s.fps,
            bitrate: s.bitrate.parse::<Bitrate>()?,
            input_format: s.input_format,
            target: StreamTarget::new(&s.server, &s.stream_key),
            low_latency: s.low_latency,
        })
    }

    /// Build primary and fallback command lines for `program`.
    pub fn plan(&self, program: PathBuf) -> ApplicationResult<StreamPlan> {
        let opts = self.encoder_options()?;
        let profile = EncoderProfile::from_name(&self.settings.streamer.encoder);

        let primary = build_encoder_args(&opts, &profile);
        let fallback = (!profile.is_software())
            .then(|| build_encoder_args(&opts, &EncoderProfile::Software));

        Ok(StreamPlan {
            program,
            url: opts.target.url(),
            primary,
            fallback,
        })
    }

    /// Plan without touching the system: unresolved program names are kept as given.
    pub fn dry_run_plan(&self) -> ApplicationResult<StreamPlan> {
        let configured = &self.settings.streamer.ffmpeg_path;
        let program = self
            .cmd
            .locate(configured)
            .unwrap_or_else(|| PathBuf::from(configured));
        self.plan(program)
    }

    /// Resolve the ffmpeg binary.
    pub fn locate_ffmpeg(&self) -> ApplicationResult<PathBuf> {
        let configured = &self.settings.streamer.ffmpeg_path;
        self.cmd
            .locate(configured)
            .ok_or_else(|| ApplicationError::BinaryNotFound {
                program: "ffmpeg".into(),
                path: PathBuf::from(configured),
                purpose: None,
            })
    }

    /// Fail early if the capture device is missing.
    pub fn check_device(&self) -> ApplicationResult<()> {
        let device = &self.settings.streamer.device;
        if self.fs.exists(device) {
            Ok(())
        } else {
            Err(ApplicationError::DeviceNotFound(device.clone()))
        }
    }

    /// Validate, then stream until ffmpeg exits, retrying once with the software encoder.
    pub fn run(&self) -> ApplicationResult<StreamOutcome> {
        self.run_with(&mut |_| {})
    }

    /// Like [`run`](Self::run); `on_fallback` is called right before the software retry starts.
    #[instrument(skip_all)]
    pub fn run_with(
        &self,
        on_fallback: &mut dyn FnMut(&StreamPlan),
    ) -> ApplicationResult<StreamOutcome> {
        let program = self.locate_ffmpeg()?;
        self.check_device()?;
        let plan = self.plan(program)?;
        info!("publishing to {}", plan.url);
        debug!("primary: {}", plan.primary_line());

        let primary_code = match self.cmd.run(&plan.program, &plan.primary) {
            Ok(exitcode::OK) => {
                return Ok(self.outcome(exitcode::OK, false));
            }
            Ok(code) => {
                if self.is_interrupted() {
                    info!("ffmpeg stopped by interrupt (exit code {})", code);
                    return Ok(self.outcome(code, false));
                }
                warn!("ffmpeg exited with code {}", code);
                Some(code)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(self.not_found(&plan));
            }
            Err(e) => {
                warn!("Primary encoder failed: {}", e);
                if plan.fallback.is_none() {
                    return Err(spawn_failed(&plan, e));
                }
                None
            }
        };

        let Some(fallback) = &plan.fallback else {
            return Ok(self.outcome(primary_code.unwrap_or(exitcode::FAILURE), false));
        };

        info!("falling back to software encoder (libx264)");
        on_fallback(&plan);
        debug!("fallback: {}", render_command(&plan.program, fallback));
        match self.cmd.run(&plan.program, fallback) {
            Ok(code) => Ok(self.outcome(code, true)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(self.not_found(&plan)),
            Err(e) => Err(spawn_failed(&plan, e)),
        }
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn outcome(&self, exit_code: i32, fallback_used: bool) -> StreamOutcome {
        StreamOutcome {
            exit_code,
            fallback_used,
            interrupted: self.is_interrupted(),
        }
    }

    fn not_found(&self, plan: &StreamPlan) -> ApplicationError {
        ApplicationError::BinaryNotFound {
            program: "ffmpeg".into(),
            path: plan.program.clone(),
            purpose: None,
        }
    }
}

fn spawn_failed(plan: &StreamPlan, e: io::Error) -> ApplicationError {
    ApplicationError::OperationFailed {
        context: format!("start {}", plan.program.display()),
        source: Box::new(e),
    }
}
