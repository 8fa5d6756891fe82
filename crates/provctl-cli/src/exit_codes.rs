//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - topology or contract violations
pub const VALIDATION_ERROR: i32 = 2;

/// Configuration error - catalog, provider name or repository URL
pub const CONFIG_ERROR: i32 = 3;

/// Repository error - fetching components or metadata failed
pub const REPOSITORY_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Some providers were applied, others failed
pub const PARTIAL_APPLY: i32 = 6;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;

/// Temporary failure - re-running may succeed (sysexits.h EX_TEMPFAIL)
pub const TEMP_FAILURE: i32 = 75;
