//! Domain layer: entities and command construction
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod command;
pub mod entities;
pub mod error;

pub use command::{build_decoder_args, build_encoder_args, build_player_args, render_command};
pub use entities::*;
pub use error::DomainError;
