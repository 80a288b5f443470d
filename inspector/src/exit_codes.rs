//! Stable exit codes for inspector CLI commands.

/// Command succeeded; any final selection is still connected.
pub const OK: i32 = 0;
/// Invalid trace, config, or other errors.
pub const INVALID: i32 = 1;
/// `inspector replay` ended with a selection that is no longer connected.
pub const DISCONNECTED: i32 = 2;
