//! Application services

pub mod frame_saver;
pub mod player;
pub mod streamer;
pub mod viewer;

pub use frame_saver::{create_session_dir, FrameSaver, SaveReport};
pub use player::{PlaybackOutcome, PlayerService};
pub use streamer::{StreamOutcome, StreamPlan, StreamerService};
pub use viewer::{
    stdin_controls, PipeViewer, ViewerCommand, ViewerEnd, ViewerEvent, ViewerOptions,
    ViewerReport,
};
