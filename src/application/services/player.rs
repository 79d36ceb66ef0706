//! Stream client: ffplay first, pipe-decoder viewer as fallback

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::{debug, info, instrument, warn};

use super::viewer::{PipeViewer, ViewerCommand, ViewerEvent, ViewerOptions, ViewerReport};
use crate::application::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::domain::{build_decoder_args, build_player_args, render_command, Resolution};
use crate::exitcode;
use crate::infrastructure::traits::{CommandRunner, FileSystem, FrameWriter};

/// How a playback run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    /// ffplay ran and exited with this code
    Player { exit_code: i32 },
    /// The fallback viewer ran
    Viewer(ViewerReport),
}

impl PlaybackOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            PlaybackOutcome::Player { exit_code } => *exit_code,
            PlaybackOutcome::Viewer(_) => exitcode::OK,
        }
    }
}

pub struct PlayerService {
    fs: Arc<dyn FileSystem>,
    cmd: Arc<dyn CommandRunner>,
    writer: Arc<dyn FrameWriter>,
    settings: Arc<Settings>,
    interrupted: Arc<AtomicBool>,
}

impl PlayerService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        cmd: Arc<dyn CommandRunner>,
        writer: Arc<dyn FrameWriter>,
        settings: Arc<Settings>,
        interrupted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            fs,
            cmd,
            writer,
            settings,
            interrupted,
        }
    }

    pub fn decode_resolution(&self) -> ApplicationResult<Resolution> {
        Ok(self.settings.client.resolution.parse::<Resolution>()?)
    }

    /// ffplay and pipe-decoder command lines, as they would be run.
    pub fn dry_run_lines(&self) -> ApplicationResult<(String, String)> {
        let c = &self.settings.client;
        let ffplay = self
            .cmd
            .locate(&c.ffplay_path)
            .unwrap_or_else(|| PathBuf::from(&c.ffplay_path));
        let ffmpeg = self
            .cmd
            .locate(&c.ffmpeg_path)
            .unwrap_or_else(|| PathBuf::from(&c.ffmpeg_path));
        Ok((
            render_command(&ffplay, &build_player_args(&c.url)),
            render_command(&ffmpeg, &build_decoder_args(&c.url, self.decode_resolution()?)),
        ))
    }

    /// Launch ffplay and wait for it.
    ///
    /// Returns 127 without spawning anything when ffplay cannot be located.
    pub fn play_with_player(&self) -> i32 {
        let c = &self.settings.client;
        let Some(ffplay) = self.cmd.locate(&c.ffplay_path) else {
            debug!("ffplay not found: {}", c.ffplay_path);
            return exitcode::NOT_FOUND;
        };
        let args = build_player_args(&c.url);
        debug!("player: {}", render_command(&ffplay, &args));
        match self.cmd.run(&ffplay, &args) {
            Ok(code) => code,
            Err(e) if e.kind() == io::ErrorKind::NotFound => exitcode::NOT_FOUND,
            Err(e) => {
                warn!("cannot start ffplay: {}", e);
                exitcode::FAILURE
            }
        }
    }

    /// Decode the stream with an ffmpeg pipe and run the fallback viewer on it.
    pub fn play_with_viewer(
        &self,
        controls: &Receiver<ViewerCommand>,
        on_event: &mut dyn FnMut(ViewerEvent),
    ) -> ApplicationResult<ViewerReport> {
        let c = &self.settings.client;
        let resolution = self.decode_resolution()?;
        let not_found = || ApplicationError::BinaryNotFound {
            program: "ffmpeg".into(),
            path: PathBuf::from(&c.ffmpeg_path),
            purpose: Some("the fallback viewer".into()),
        };
        let ffmpeg = self.cmd.locate(&c.ffmpeg_path).ok_or_else(not_found)?;

        let args = build_decoder_args(&c.url, resolution);
        debug!("decoder: {}", render_command(&ffmpeg, &args));
        let mut child = self.cmd.spawn_piped(&ffmpeg, &args).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                not_found()
            } else {
                ApplicationError::OperationFailed {
                    context: format!("start decoder {}", ffmpeg.display()),
                    source: Box::new(e),
                }
            }
        })?;

        let viewer = PipeViewer::new(
            self.fs.clone(),
            self.writer.clone(),
            self.viewer_options(resolution),
            self.interrupted.clone(),
        );
        let result = viewer.run(child.stdout(), controls, on_event);
        child.terminate();
        result
    }

    /// Try ffplay unless disabled, then fall back to the viewer.
    ///
    /// `controls` is only called once the viewer is about to start, so stdin
    /// stays untouched while ffplay runs.
    #[instrument(skip_all)]
    pub fn run<F>(
        &self,
        controls: F,
        on_event: &mut dyn FnMut(ViewerEvent),
    ) -> ApplicationResult<PlaybackOutcome>
    where
        F: FnOnce() -> Receiver<ViewerCommand>,
    {
        if !self.settings.client.fallback_only {
            let code = self.play_with_player();
            if code == exitcode::OK {
                return Ok(PlaybackOutcome::Player { exit_code: code });
            }
            if self.interrupted.load(Ordering::SeqCst) {
                info!("player stopped by interrupt (exit code {})", code);
                return Ok(PlaybackOutcome::Player { exit_code: code });
            }
            info!("ffplay exited with {}; falling back to pipe viewer", code);
        }

        let controls = controls();
        let report = self.play_with_viewer(&controls, on_event)?;
        Ok(PlaybackOutcome::Viewer(report))
    }

    fn viewer_options(&self, resolution: Resolution) -> ViewerOptions {
        let c = &self.settings.client;
        ViewerOptions {
            resolution,
            output_dir: c.output_dir.clone(),
            queue_size: c.queue_size,
            image_format: c.image_format,
            save_on_start: c.save_on_start,
            max_frames: c.max_frames,
            join_timeout: Duration::from_millis(c.writer_join_timeout_ms),
            status_interval: (c.status_interval_secs > 0)
                .then(|| Duration::from_secs(c.status_interval_secs)),
        }
    }
}
