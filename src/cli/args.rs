//! CLI argument definitions (clap derive).

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// wayfarer - trip request log, itinerary generation and retrieval API
#[derive(Parser, Debug)]
#[command(name = "wayfarer")]
#[command(about = "Collect trip requests, generate itineraries and serve them over HTTP")]
#[command(long_about = r#"
wayfarer keeps an append-only log of trip requests, runs an itinerary
generator over the whole log when itineraries are read, and serves both
through a small HTTP API. The client commands drive that API.

EXAMPLES:
  # Run the retrieval API with the built-in generator
  wayfarer serve --port 3000

  # Run the standalone generator service and point the API at it
  wayfarer generator-service --port 5001
  wayfarer serve --generator-mode http --generator-url http://127.0.0.1:5001

  # Plan a trip, then open one of the previews
  wayfarer plan --from NYC --to Paris --start-date 2025-06-01 --end-date 2025-06-10 --people 2
  wayfarer show 0
  wayfarer refine "stay near the Louvre"

  # Use the built-in generator as an NDJSON filter
  wayfarer generate < requests.jsonl

CONFIGURATION:
  Precedence: CLI flags > WAYFARER_* environment > config file > defaults.
  The config file is discovered by searching upward from the working
  directory for .wayfarer/config.toml; --config names one explicitly.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding requests.jsonl and itineraries.jsonl
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Generator mode: reference, command or http
    #[arg(long, global = true)]
    pub generator_mode: Option<String>,

    /// Program run by the command generator
    #[arg(long, global = true)]
    pub generator_command: Option<String>,

    /// Generator timeout in seconds
    #[arg(long, global = true)]
    pub generator_timeout: Option<u64>,

    /// Base URL of the generator service (http mode)
    #[arg(long, global = true)]
    pub generator_url: Option<String>,

    /// Base URL of the retrieval API used by client commands
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Timeout in seconds for each client HTTP call
    #[arg(long, global = true)]
    pub client_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct Listen {
    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind
    #[arg(long)]
    pub port: Option<u16>,
}

/// Trip fields for `plan`. Unset fields are left out of the request.
#[derive(Args, Debug, Clone, Default)]
pub struct TripArgs {
    /// Origin city or airport
    #[arg(long)]
    pub from: Option<String>,

    /// Destination
    #[arg(long)]
    pub to: Option<String>,

    /// First day of the trip (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Last day of the trip (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Party size
    #[arg(long)]
    pub people: Option<String>,

    /// Free-text notes for the generator
    #[arg(long)]
    pub notes: Option<String>,

    /// Read the whole request as a JSON object from a file ('-' for stdin)
    #[arg(long, conflicts_with_all = ["from", "to", "start_date", "end_date", "people", "notes"])]
    pub request: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the retrieval API
    Serve(Listen),

    /// Run the standalone generator service backed by the built-in generator
    GeneratorService(Listen),

    /// Built-in generator as an NDJSON filter (stdin to stdout)
    ///
    /// Each input line is a trip request; each output line is its itinerary.
    /// With --refine, stdin holds one {"itinerary", "message", "key"} document.
    Generate {
        /// Refine one itinerary instead of generating the whole log
        #[arg(long)]
        refine: bool,
    },

    /// Submit a trip and show the three candidate previews
    Plan(TripArgs),

    /// Show the open itinerary, the previews, or the itinerary at KEY
    Show {
        /// Key to open
        key: Option<i64>,

        /// Show the most recently generated itinerary
        #[arg(long, conflicts_with = "key")]
        last: bool,

        /// Return to the preview set
        #[arg(long, conflicts_with_all = ["key", "last"])]
        back: bool,
    },

    /// Regenerate the itinerary at KEY
    Regenerate {
        /// Key to regenerate
        key: i64,
    },

    /// Refine the open itinerary with a free-text instruction
    Refine {
        /// What to change
        message: String,
    },

    /// Show request and itinerary counts from the API
    Status,

    /// Print the effective configuration and where each value came from
    Config,
}

/// Build the clap command; used by tests to check the definition.
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn global_overrides_parse_after_subcommand() {
        let cli = Cli::parse_from([
            "wayfarer",
            "serve",
            "--port",
            "8080",
            "--generator-mode",
            "http",
            "--verbose",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.generator_mode.as_deref(), Some("http"));
        match cli.command {
            Commands::Serve(listen) => assert_eq!(listen.port, Some(8080)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn request_file_conflicts_with_fields() {
        let parsed = Cli::try_parse_from([
            "wayfarer",
            "plan",
            "--to",
            "Paris",
            "--request",
            "trip.json",
        ]);
        assert!(parsed.is_err());
    }
}
