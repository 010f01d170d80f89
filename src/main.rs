//! wayfarer CLI binary
//!
//! All logic is in the library; main.rs only invokes `cli::run()`.

fn main() {
    // run() prints its own errors; only the exit code is left to map
    if let Err(code) = wayfarer::cli::run() {
        std::process::exit(code.as_i32());
    }
}
