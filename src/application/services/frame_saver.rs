//! Frame-saving pipeline
//!
//! The capture loop hands frames to [`FrameSaver::submit`], which copies them into a
//! bounded queue without ever blocking. One background thread drains the queue and
//! writes `frame_<index>.<ext>` files into a timestamped session directory.
//! When the queue is full, frames are dropped instead of stalling capture.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{frame_file_name, session_dir_name, ImageFormat, VideoFrame};
use crate::infrastructure::traits::{FileSystem, FrameWriter};

/// How often an idle writer re-checks the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on `_N` suffixes tried when a session directory name is taken.
const MAX_SESSION_SUFFIX: u32 = 1000;

/// Summary of one saving session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub session_dir: PathBuf,
    /// Files written successfully
    pub written: u64,
    /// Frames discarded because the queue was full
    pub dropped: u64,
    /// Frames dequeued but not written
    pub write_errors: u64,
    /// Whether the writer thread finished within the stop timeout
    pub joined: bool,
}

#[derive(Debug, Default)]
struct WriterCounters {
    written: AtomicU64,
    errors: AtomicU64,
}

/// Bounded queue plus one writer thread for a single saving session.
pub struct FrameSaver {
    session_dir: PathBuf,
    tx: Option<Sender<VideoFrame>>,
    stop: Arc<AtomicBool>,
    counters: Arc<WriterCounters>,
    dropped: u64,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl FrameSaver {
    /// Start a session in a new timestamped directory under `root`.
    pub fn start(
        fs: &dyn FileSystem,
        writer: Arc<dyn FrameWriter>,
        root: &Path,
        capacity: usize,
        format: ImageFormat,
    ) -> ApplicationResult<Self> {
        let session_dir = create_session_dir(fs, root, &Local::now())?;
        Self::start_in(session_dir, writer, capacity, format)
    }

    /// Start a session writing into an existing `session_dir`.
    pub fn start_in(
        session_dir: PathBuf,
        writer: Arc<dyn FrameWriter>,
        capacity: usize,
        format: ImageFormat,
    ) -> ApplicationResult<Self> {
        let (tx, rx) = bounded::<VideoFrame>(capacity.max(1));
        let (done_tx, done_rx) = bounded::<()>(1);
        let stop = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(WriterCounters::default());

        let handle = {
            let dir = session_dir.clone();
            let stop = stop.clone();
            let counters = counters.clone();
            thread::Builder::new()
                .name("frame-writer".into())
                .spawn(move || {
                    writer_loop(&dir, rx, &stop, writer.as_ref(), format, &counters);
                    let _ = done_tx.send(());
                })
                .map_err(|e| ApplicationError::OperationFailed {
                    context: "spawn frame writer thread".into(),
                    source: Box::new(e),
                })?
        };

        info!("saving frames to {}", session_dir.display());
        Ok(Self {
            session_dir,
            tx: Some(tx),
            stop,
            counters,
            dropped: 0,
            done_rx,
            handle: Some(handle),
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Frames dropped so far because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Frames written so far.
    pub fn written(&self) -> u64 {
        self.counters.written.load(Ordering::Relaxed)
    }

    /// Copy `frame` into the queue. Never blocks; returns `false` if it was dropped.
    pub fn submit(&mut self, frame: &VideoFrame) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                debug!("save queue full, dropped frame {}", frame.index);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                false
            }
        }
    }

    /// Stop accepting frames, let the writer drain what is queued, and join it.
    ///
    /// If the writer is still busy after `timeout` it is left to finish on its own.
    pub fn stop(mut self, timeout: Duration) -> SaveReport {
        self.stop.store(true, Ordering::SeqCst);
        drop(self.tx.take());

        let joined = match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        warn!("frame writer thread panicked");
                    }
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "frame writer did not finish within {:?}; detaching",
                    timeout
                );
                self.handle.take();
                false
            }
        };

        let report = SaveReport {
            session_dir: self.session_dir.clone(),
            written: self.counters.written.load(Ordering::SeqCst),
            dropped: self.dropped,
            write_errors: self.counters.errors.load(Ordering::SeqCst),
            joined,
        };
        info!(
            "saving stopped: {} written, {} dropped, {} errors ({})",
            report.written,
            report.dropped,
            report.write_errors,
            report.session_dir.display()
        );
        report
    }
}

impl Drop for FrameSaver {
    fn drop(&mut self) {
        // stop() not called: let the writer drain in the background
        self.stop.store(true, Ordering::SeqCst);
        self.tx.take();
    }
}

fn writer_loop(
    dir: &Path,
    rx: Receiver<VideoFrame>,
    stop: &AtomicBool,
    writer: &dyn FrameWriter,
    format: ImageFormat,
    counters: &WriterCounters,
) {
    let mut index: u64 = 0;
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(frame) => {
                let path = dir.join(frame_file_name(index, format));
                index += 1;
                match writer.write_frame(&path, &frame, format) {
                    Ok(()) => {
                        counters.written.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        counters.errors.fetch_add(1, Ordering::Relaxed);
                        warn!("write {}: {}", path.display(), e);
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::SeqCst) && rx.is_empty() {
                    break;
                }
            }
            // all senders gone and queue empty
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("frame writer exiting after {} frames", index);
}

/// Create `<root>/<YYYYmmdd_HHMMSS>`, adding `_1`, `_2`, ... if the name is taken.
pub fn create_session_dir(
    fs: &dyn FileSystem,
    root: &Path,
    now: &DateTime<Local>,
) -> ApplicationResult<PathBuf> {
    fs.create_dir_all(root)
        .with_path_context("create output directory", root)?;

    let base = session_dir_name(now);
    for attempt in 0..=MAX_SESSION_SUFFIX {
        let name = if attempt == 0 {
            base.clone()
        } else {
            format!("{base}_{attempt}")
        };
        let candidate = root.join(name);
        match fs.create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e)
                    .with_path_context("create session directory", &candidate)
            }
        }
    }

    Err(ApplicationError::OperationFailed {
        context: format!("no free session directory name for {base} in {}", root.display()),
        source: "too many sessions started within one second".into(),
    })
}
