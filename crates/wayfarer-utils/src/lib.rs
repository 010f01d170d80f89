//! Foundation utilities shared by the wayfarer crates.

pub mod atomic_write;
pub mod exit_codes;
pub mod logging;
pub mod paths;

pub use atomic_write::{AtomicWriteResult, write_file_atomic};
pub use exit_codes::ExitCode;
pub use paths::DataPaths;
