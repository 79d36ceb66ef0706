//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::application::services::{PlayerService, StreamerService};
use crate::config::Settings;
use crate::infrastructure::traits::{
    CommandRunner, FileSystem, FrameWriter, ImageFrameWriter, RealCommandRunner, RealFileSystem,
};
use crate::infrastructure::{InfraError, InfraResult};

/// Container holding the settings and I/O dependencies shared by all services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Command runner abstraction
    pub cmd: Arc<dyn CommandRunner>,

    /// Image encoder for saved frames
    pub writer: Arc<dyn FrameWriter>,

    /// Set once the user pressed Ctrl-C
    pub interrupted: Arc<AtomicBool>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(
            settings,
            Arc::new(RealFileSystem),
            Arc::new(RealCommandRunner),
            Arc::new(ImageFrameWriter),
        )
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        cmd: Arc<dyn CommandRunner>,
        writer: Arc<dyn FrameWriter>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            fs,
            cmd,
            writer,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn streamer_service(&self) -> StreamerService {
        StreamerService::new(
            self.fs.clone(),
            self.cmd.clone(),
            self.settings.clone(),
            self.interrupted.clone(),
        )
    }

    pub fn player_service(&self) -> PlayerService {
        PlayerService::new(
            self.fs.clone(),
            self.cmd.clone(),
            self.writer.clone(),
            self.settings.clone(),
            self.interrupted.clone(),
        )
    }

    /// Keep this process alive on Ctrl-C so the child (which receives the
    /// terminal's SIGINT itself) can shut down; remember that it happened.
    ///
    /// Can only be installed once per process.
    pub fn install_interrupt_handler(&self, message: &'static str) -> InfraResult<()> {
        let flag = self.interrupted.clone();
        ctrlc::set_handler(move || {
            if !flag.swap(true, Ordering::SeqCst) {
                eprintln!("{message}");
            }
        })
        .map_err(|e| InfraError::Signal {
            message: e.to_string(),
        })?;
        debug!("interrupt handler installed");
        Ok(())
    }
}
