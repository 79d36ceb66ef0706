//! Fallback viewer: consumes raw RGB24 frames from a pipe decoder
//!
//! Used when no external player is available. The decoder child writes fixed-size
//! frames to stdout; this loop reads them, reports progress, and feeds the
//! [`FrameSaver`] while saving is toggled on.

use std::io::{self, BufRead, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use tracing::{debug, info, warn};

use super::frame_saver::{FrameSaver, SaveReport};
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{DomainError, ImageFormat, Resolution, VideoFrame};
use crate::infrastructure::traits::{FileSystem, FrameWriter};

/// Keyboard commands understood by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    ToggleSave,
    Quit,
}

impl ViewerCommand {
    /// Parse one line of user input (`s`/`save`, `q`/`quit`).
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "s" | "save" => Some(ViewerCommand::ToggleSave),
            "q" | "quit" | "exit" => Some(ViewerCommand::Quit),
            _ => None,
        }
    }
}

/// Read viewer commands from stdin on a detached background thread.
///
/// The channel disconnects when stdin reaches EOF.
pub fn stdin_controls() -> Receiver<ViewerCommand> {
    let (tx, rx) = unbounded();
    let spawned = thread::Builder::new()
        .name("viewer-controls".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match ViewerCommand::parse(&line) {
                    Some(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    None => debug!("ignoring input: {:?}", line),
                }
            }
        });
    if let Err(e) = spawned {
        warn!("cannot read keyboard controls: {}", e);
    }
    rx
}

/// Progress notifications for the caller to display.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Status {
        frames: u64,
        fps: f64,
        saving: bool,
    },
    SavingStarted(PathBuf),
    SavingStopped(SaveReport),
    SavingFailed(String),
}

/// Why the viewer loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerEnd {
    Quit,
    Interrupted,
    MaxFrames,
    StreamEnded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerReport {
    pub frames: u64,
    pub ended_by: ViewerEnd,
    pub sessions: Vec<SaveReport>,
}

#[derive(Debug, Clone)]
pub struct ViewerOptions {
    pub resolution: Resolution,
    pub output_dir: PathBuf,
    pub queue_size: usize,
    pub image_format: ImageFormat,
    pub save_on_start: bool,
    pub max_frames: Option<u64>,
    pub join_timeout: Duration,
    /// `None` disables periodic status events
    pub status_interval: Option<Duration>,
}

pub struct PipeViewer {
    fs: Arc<dyn FileSystem>,
    writer: Arc<dyn FrameWriter>,
    opts: ViewerOptions,
    interrupted: Arc<AtomicBool>,
}

impl PipeViewer {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        writer: Arc<dyn FrameWriter>,
        opts: ViewerOptions,
        interrupted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            fs,
            writer,
            opts,
            interrupted,
        }
    }

    /// Run the capture loop until quit, interrupt, frame limit or end of stream.
    ///
    /// Fails with [`ApplicationError::StreamOpen`] if not even the first frame arrives.
    pub fn run(
        &self,
        source: &mut dyn Read,
        controls: &Receiver<ViewerCommand>,
        on_event: &mut dyn FnMut(ViewerEvent),
    ) -> ApplicationResult<ViewerReport> {
        let res = self.opts.resolution;
        let frame_len = res
            .rgb24_frame_len()
            .ok_or_else(|| DomainError::InvalidResolution(res.to_string()))?;
        let mut frame = VideoFrame {
            data: vec![0u8; frame_len],
            width: res.width,
            height: res.height,
            index: 0,
        };
        let mut saver: Option<FrameSaver> = None;
        let mut sessions = Vec::new();
        let mut frames: u64 = 0;

        if self.opts.save_on_start {
            saver = self.start_saving(on_event);
        }

        let started = Instant::now();
        let mut last_status = started;
        let mut frames_at_status: u64 = 0;

        let ended_by = loop {
            if self.interrupted.load(Ordering::SeqCst) {
                break ViewerEnd::Interrupted;
            }
            if self.opts.max_frames.is_some_and(|max| frames >= max) {
                break ViewerEnd::MaxFrames;
            }

            if let Err(e) = source.read_exact(&mut frame.data) {
                // Ctrl-C reaches the decoder too, which then closes the pipe
                if self.interrupted.load(Ordering::SeqCst) {
                    debug!("read ended after interrupt: {}", e);
                    break ViewerEnd::Interrupted;
                }
                if frames == 0 {
                    debug!("first frame read failed: {}", e);
                    if let Some(s) = saver.take() {
                        self.stop_saving(s, &mut sessions, on_event);
                    }
                    return Err(ApplicationError::StreamOpen {
                        reason: e.to_string(),
                    });
                }
                info!("Frame read failed; exiting. ({})", e);
                break ViewerEnd::StreamEnded;
            }
            frame.index = frames;
            frames += 1;

            if let Some(s) = saver.as_mut() {
                s.submit(&frame);
            }

            let mut quit = false;
            while let Ok(cmd) = controls.try_recv() {
                match cmd {
                    ViewerCommand::ToggleSave => match saver.take() {
                        Some(s) => self.stop_saving(s, &mut sessions, on_event),
                        None => saver = self.start_saving(on_event),
                    },
                    ViewerCommand::Quit => quit = true,
                }
            }
            if quit {
                break ViewerEnd::Quit;
            }

            if let Some(interval) = self.opts.status_interval {
                let elapsed = last_status.elapsed();
                if elapsed >= interval {
                    let fps = (frames - frames_at_status) as f64 / elapsed.as_secs_f64();
                    on_event(ViewerEvent::Status {
                        frames,
                        fps,
                        saving: saver.is_some(),
                    });
                    last_status = Instant::now();
                    frames_at_status = frames;
                }
            }
        };

        if let Some(s) = saver.take() {
            self.stop_saving(s, &mut sessions, on_event);
        }

        info!(
            "viewer finished: {} frames in {:.1}s ({:?})",
            frames,
            started.elapsed().as_secs_f64(),
            ended_by
        );
        Ok(ViewerReport {
            frames,
            ended_by,
            sessions,
        })
    }

    fn start_saving(&self, on_event: &mut dyn FnMut(ViewerEvent)) -> Option<FrameSaver> {
        match FrameSaver::start(
            self.fs.as_ref(),
            self.writer.clone(),
            &self.opts.output_dir,
            self.opts.queue_size,
            self.opts.image_format,
        ) {
            Ok(saver) => {
                on_event(ViewerEvent::SavingStarted(saver.session_dir().to_path_buf()));
                Some(saver)
            }
            Err(e) => {
                // keep viewing even if the session directory is unusable
                warn!("cannot start saving: {}", e);
                on_event(ViewerEvent::SavingFailed(e.to_string()));
                None
            }
        }
    }

    fn stop_saving(
        &self,
        saver: FrameSaver,
        sessions: &mut Vec<SaveReport>,
        on_event: &mut dyn FnMut(ViewerEvent),
    ) {
        let report = saver.stop(self.opts.join_timeout);
        on_event(ViewerEvent::SavingStopped(report.clone()));
        sessions.push(report);
    }
}
