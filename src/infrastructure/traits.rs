//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations (filesystem, child processes,
//! image encoding), allowing services to be tested with mock implementations.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

use tracing::{debug, trace};

use crate::domain::{ImageFormat, VideoFrame};
use crate::exitcode;

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Create a single directory; fails if it already exists.
    fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Create directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// A spawned child whose stdout is piped back to us.
pub trait PipedChild: Send {
    /// Child's stdout stream.
    fn stdout(&mut self) -> &mut dyn Read;

    /// Kill the child (if still running) and reap it.
    fn terminate(&mut self);
}

/// External command runner abstraction.
pub trait CommandRunner: Send + Sync {
    /// Resolve a program name or path to an executable file.
    ///
    /// Names without a path separator are searched on `PATH`; anything else
    /// must point at an existing file.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run a command with inherited stdio, wait for it, and return its exit code.
    fn run(&self, program: &Path, args: &[String]) -> io::Result<i32>;

    /// Spawn a command with stdout piped; stdin is closed, stderr inherited.
    fn spawn_piped(&self, program: &Path, args: &[String]) -> io::Result<Box<dyn PipedChild>>;
}

/// Encodes one frame to an image file.
pub trait FrameWriter: Send + Sync {
    fn write_frame(&self, path: &Path, frame: &VideoFrame, format: ImageFormat) -> io::Result<()>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }
}

/// Real command runner implementation.
#[derive(Debug, Default)]
pub struct RealCommandRunner;

impl CommandRunner for RealCommandRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        let candidate = Path::new(program);
        if program.is_empty() {
            return None;
        }
        if candidate.components().count() > 1 {
            return candidate.is_file().then(|| candidate.to_path_buf());
        }

        let found = std::env::var_os("PATH").and_then(|paths| {
            std::env::split_paths(&paths)
                .map(|dir| dir.join(program))
                .find(|p| is_executable(p))
        });
        trace!("locate {}: {:?}", program, found);

        // bare file name in the working directory
        found.or_else(|| candidate.is_file().then(|| candidate.to_path_buf()))
    }

    fn run(&self, program: &Path, args: &[String]) -> io::Result<i32> {
        debug!("run: {} ({} args)", program.display(), args.len());
        let status = Command::new(program).args(args).status()?;
        Ok(exit_code(status))
    }

    fn spawn_piped(&self, program: &Path, args: &[String]) -> io::Result<Box<dyn PipedChild>> {
        debug!("spawn_piped: {} ({} args)", program.display(), args.len());
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "child stdout not captured"))?;
        Ok(Box::new(ChildProcess { child, stdout }))
    }
}

/// Child process with captured stdout.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    stdout: ChildStdout,
}

impl PipedChild for ChildProcess {
    fn stdout(&mut self) -> &mut dyn Read {
        &mut self.stdout
    }

    fn terminate(&mut self) {
        if let Ok(Some(status)) = self.child.try_wait() {
            debug!("child already exited: {}", status);
            return;
        }
        if let Err(e) = self.child.kill() {
            debug!("kill child: {}", e);
        }
        match self.child.wait() {
            Ok(status) => debug!("child reaped: {}", status),
            Err(e) => debug!("wait child: {}", e),
        }
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Real frame writer using the `image` crate encoders.
#[derive(Debug, Default)]
pub struct ImageFrameWriter;

impl FrameWriter for ImageFrameWriter {
    fn write_frame(&self, path: &Path, frame: &VideoFrame, format: ImageFormat) -> io::Result<()> {
        let image_format = match format {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpg => image::ImageFormat::Jpeg,
        };
        image::save_buffer_with_format(
            path,
            &frame.data,
            frame.width,
            frame.height,
            image::ColorType::Rgb8,
            image_format,
        )
        .map_err(io::Error::other)
    }
}

/// Map a child's exit status to a shell-style exit code.
///
/// Signal terminations become `128 + signal` on Unix.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return exitcode::SIGNAL_BASE + signal;
        }
    }
    exitcode::FAILURE
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn given_missing_explicit_path_when_locate_then_none() {
        let runner = RealCommandRunner;
        assert!(runner.locate("/definitely/not/here/ffmpeg").is_none());
        assert!(runner.locate("").is_none());
    }

    #[test]
    fn given_existing_explicit_path_when_locate_then_returns_it() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("ffmpeg");
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();

        let runner = RealCommandRunner;
        assert_eq!(runner.locate(bin.to_str().unwrap()), Some(bin));
    }

    #[test]
    fn given_frame_when_write_png_then_file_decodes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("frame.png");
        let frame = VideoFrame::new(vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 9, 9, 9], 2, 2, 0).unwrap();

        ImageFrameWriter
            .write_frame(&path, &frame, ImageFormat::Png)
            .unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
    }
}
