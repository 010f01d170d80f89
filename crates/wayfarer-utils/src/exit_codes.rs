//! Exit code constants for the wayfarer binary.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 9 | `LOCK_HELD` | Another process holds the generation lock |
//! | 10 | `GENERATION_TIMEOUT` | The generator exceeded its timeout |
//! | 70 | `GENERATOR_FAILURE` | The generator failed or produced bad output |
//! | 75 | `TRANSPORT_FAILURE` | An HTTP call to a wayfarer service failed |

/// Process exit code.
///
/// Use the named constants, or [`as_i32()`](Self::as_i32) to get the numeric
/// value for `std::process::exit()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Lock held - another process is generating against the same data dir
    pub const LOCK_HELD: ExitCode = ExitCode(9);

    /// Generation timeout - the generator exceeded its configured timeout
    pub const GENERATION_TIMEOUT: ExitCode = ExitCode(10);

    /// Generator failure - non-zero exit, malformed output or count mismatch
    pub const GENERATOR_FAILURE: ExitCode = ExitCode(70);

    /// Transport failure - the client could not reach or decode a service
    pub const TRANSPORT_FAILURE: ExitCode = ExitCode(75);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}
