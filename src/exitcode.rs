//! Standard exit codes (BSD sysexits.h compatible, plus shell conventions)

/// Successful termination
pub const OK: i32 = 0;

/// Generic failure (device missing, stream could not be opened)
pub const FAILURE: i32 = 1;

/// Command line usage error
pub const USAGE: i32 = 64;

/// Internal software error
pub const SOFTWARE: i32 = 70;

/// Input/output error
pub const IOERR: i32 = 74;

/// Configuration error
pub const CONFIG: i32 = 78;

/// Command not found (shell convention)
pub const NOT_FOUND: i32 = 127;

/// Base for "terminated by signal N" (shell convention: 128 + N)
pub const SIGNAL_BASE: i32 = 128;
