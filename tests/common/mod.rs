//! Test doubles for the I/O boundary traits

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rtmpcam::domain::{ImageFormat, VideoFrame};
use rtmpcam::infrastructure::traits::{CommandRunner, FrameWriter, PipedChild};

/// Scripted result of one `CommandRunner::run` call.
#[derive(Debug, Clone, Copy)]
pub enum Scripted {
    Exit(i32),
    SpawnError(io::ErrorKind),
}

/// Command runner that records invocations and replays scripted results.
#[derive(Default)]
pub struct MockCommandRunner {
    locatable: HashMap<String, PathBuf>,
    results: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
    piped_output: Mutex<Option<Vec<u8>>>,
    piped_error: Option<io::ErrorKind>,
    pub terminated: Arc<AtomicBool>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `program` resolvable to `/usr/bin/<program>`.
    pub fn with_program(mut self, program: &str) -> Self {
        self.locatable
            .insert(program.to_string(), PathBuf::from("/usr/bin").join(program));
        self
    }

    pub fn with_results(self, results: &[Scripted]) -> Self {
        self.results.lock().unwrap().extend(results.iter().copied());
        self
    }

    /// Bytes the piped child will produce on stdout.
    pub fn with_piped_output(self, bytes: Vec<u8>) -> Self {
        *self.piped_output.lock().unwrap() = Some(bytes);
        self
    }

    pub fn with_piped_error(mut self, kind: io::ErrorKind) -> Self {
        self.piped_error = Some(kind);
        self
    }

    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for MockCommandRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        self.locatable.get(program).cloned()
    }

    fn run(&self, program: &Path, args: &[String]) -> io::Result<i32> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        match self.results.lock().unwrap().pop_front() {
            Some(Scripted::Exit(code)) => Ok(code),
            Some(Scripted::SpawnError(kind)) => Err(io::Error::new(kind, "scripted spawn error")),
            None => Ok(0),
        }
    }

    fn spawn_piped(&self, program: &Path, args: &[String]) -> io::Result<Box<dyn PipedChild>> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        if let Some(kind) = self.piped_error {
            return Err(io::Error::new(kind, "scripted spawn error"));
        }
        let bytes = self.piped_output.lock().unwrap().take().unwrap_or_default();
        Ok(Box::new(MockChild {
            stdout: Cursor::new(bytes),
            terminated: self.terminated.clone(),
        }))
    }
}

pub struct MockChild {
    stdout: Cursor<Vec<u8>>,
    terminated: Arc<AtomicBool>,
}

impl PipedChild for MockChild {
    fn stdout(&mut self) -> &mut dyn Read {
        &mut self.stdout
    }

    fn terminate(&mut self) {
        self.terminated.store(true, Ordering::SeqCst);
    }
}

/// Frame writer that records paths instead of encoding images.
#[derive(Default)]
pub struct RecordingWriter {
    written: Mutex<Vec<PathBuf>>,
    /// Frame indices (by stream position) whose write fails
    fail_stream_indices: Vec<u64>,
    /// Held by a test to stall the writer thread
    pub gate: Arc<Mutex<()>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(indices: &[u64]) -> Self {
        Self {
            fail_stream_indices: indices.to_vec(),
            ..Self::default()
        }
    }

    pub fn written(&self) -> Vec<PathBuf> {
        self.written.lock().unwrap().clone()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.written()
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect()
    }
}

impl FrameWriter for RecordingWriter {
    fn write_frame(&self, path: &Path, frame: &VideoFrame, _format: ImageFormat) -> io::Result<()> {
        let _gate = self.gate.lock().unwrap();
        if self.fail_stream_indices.contains(&frame.index) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.written.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// `count` RGB24 frames of `width`x`height`, each filled with its index byte.
pub fn raw_frames(width: u32, height: u32, count: usize) -> Vec<u8> {
    let len = width as usize * height as usize * 3;
    (0..count).flat_map(|i| vec![i as u8; len]).collect()
}

pub fn frame(width: u32, height: u32, index: u64) -> VideoFrame {
    VideoFrame::new(
        vec![index as u8; width as usize * height as usize * 3],
        width,
        height,
        index,
    )
    .unwrap()
}
