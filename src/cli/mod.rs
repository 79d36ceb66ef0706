//! CLI layer: argument parsing, command dispatch, terminal output

pub mod args;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;

pub use args::{ClientCli, CommonArgs, StreamerCli};
pub use error::{CliError, CliResult};
