//! CLI Exit Code Registry
//!
//! Single source of truth for all CLI exit codes. Exit codes are part of the
//! shell contract — close scripts and CI jobs rely on them.
//!
//! | Code | Meaning                                         |
//! |------|-------------------------------------------------|
//! | 0    | Success                                         |
//! | 1    | General error (unspecified)                     |
//! | 2    | CLI usage error (bad args)                      |
//! | 3    | Config invalid (parse or validation failure)    |
//! | 4    | Runtime error (unreadable input, bad CSV, IO)   |
//! | 5    | Open items remain (only with `--fail-on-open`)  |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
#[allow(dead_code)]
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
#[allow(dead_code)]
pub const EXIT_USAGE: u8 = 2;

/// Config file failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Runtime failure: unreadable input file, malformed CSV, write error.
pub const EXIT_RUNTIME: u8 = 4;

/// Unmatched invoices or bank rows remain and `--fail-on-open` was set.
pub const EXIT_OPEN_ITEMS: u8 = 5;
