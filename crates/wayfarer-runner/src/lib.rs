//! Subprocess execution for command-backed generators
//!
//! All process execution goes through [`CommandSpec`], which only supports
//! argv-style invocation. Arguments are passed as discrete elements and never
//! through a shell.

pub mod command_spec;
pub mod error;
pub mod native;
pub mod process;

pub use command_spec::CommandSpec;
pub use error::RunnerError;
pub use native::NativeRunner;
pub use process::{ProcessOutput, ProcessRunner};
