//! Command implementations.

use camino::Utf8PathBuf;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info};
use wayfarer_client::{ApiClient, ItineraryView, SessionStore, State, Workflow};
use wayfarer_config::Config;
use wayfarer_engine::Pipeline;
use wayfarer_generator::{ReferenceGenerator, error_record};
use wayfarer_server::{api, generator_service, serve, shutdown_signal};
use wayfarer_store::model::invalid_line_message;
use wayfarer_store::{Entry, ItineraryRecord, Key, TripRequest, ndjson};

use super::args::TripArgs;
use crate::WayfarerError;

async fn bind(host: &str, port: u16) -> Result<TcpListener, WayfarerError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|source| WayfarerError::Bind { addr, source })
}

pub async fn execute_serve_command(config: &Config) -> Result<(), WayfarerError> {
    let pipeline = Pipeline::from_config(config)?;
    let router = api::router(api::AppState::new(Arc::new(pipeline)));
    let listener = bind(&config.server.host, config.server.port).await?;
    serve(listener, router, "api", shutdown_signal()).await?;
    Ok(())
}

pub async fn execute_generator_service_command(config: &Config) -> Result<(), WayfarerError> {
    let router = generator_service::router(generator_service::ServiceState::new());
    let service = &config.generator_service;
    let listener = bind(&service.host, service.port).await?;
    serve(listener, router, "generator-service", shutdown_signal()).await?;
    Ok(())
}

/// Reads the NDJSON log from stdin and writes one itinerary line per entry.
pub fn execute_generate_command(refine: bool) -> Result<(), WayfarerError> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let output = if refine {
        refine_document(&input)?
    } else {
        generate_lines(&input)?
    };
    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Itinerary lines for an NDJSON request log, one per record line.
///
/// `{error, raw}` placeholders stand for log lines that were already
/// unreadable and stay error records.
pub fn generate_lines(input: &str) -> Result<String, WayfarerError> {
    let generator = ReferenceGenerator::new();
    let records: Vec<ItineraryRecord> = ndjson::parse_records(input)
        .into_iter()
        .map(unwrap_placeholder)
        .map(|entry| match entry {
            Entry::Valid { value, .. } => generator.itinerary(&value),
            Entry::Malformed { key, line, .. } => error_record(key, &invalid_line_message(line)),
        })
        .collect();
    debug!(records = records.len(), "Generated itineraries");
    Ok(ndjson::encode_records(&records).map_err(wayfarer_store::StoreError::from)?)
}

fn unwrap_placeholder(entry: Entry<TripRequest>) -> Entry<TripRequest> {
    let Entry::Valid { key, value } = entry else {
        return entry;
    };
    if value.len() == 2
        && let (Some(Value::String(error)), Some(Value::String(raw))) = (value.get("error"), value.get("raw"))
    {
        return Entry::Malformed {
            key,
            line: key + 1,
            raw: raw.clone(),
            reason: error.clone(),
        };
    }
    Entry::Valid { key, value }
}

#[derive(Debug, Deserialize)]
struct RefineDocument {
    itinerary: ItineraryRecord,
    message: String,
    #[serde(default)]
    key: Option<Key>,
}

/// One refined itinerary line for a `{itinerary, message, key}` document.
pub fn refine_document(input: &str) -> Result<String, WayfarerError> {
    let document: RefineDocument = serde_json::from_str(input.trim())
        .map_err(|e| WayfarerError::Input(format!("refine document: {e}")))?;
    debug!(key = ?document.key, "Refining itinerary");
    let refined = ReferenceGenerator::new().refined(&document.itinerary, &document.message);
    let line = ndjson::encode_line(&refined).map_err(wayfarer_store::StoreError::from)?;
    Ok(format!("{line}\n"))
}

fn client(config: &Config) -> Result<(ApiClient, SessionStore), WayfarerError> {
    let client = ApiClient::new(
        &config.client.base_url,
        Duration::from_secs(config.client.timeout_secs),
    )?;
    Ok((client, SessionStore::new(config.session_path())))
}

/// Trip request from flags or from a JSON file.
pub fn trip_request(args: &TripArgs) -> Result<TripRequest, WayfarerError> {
    if let Some(path) = &args.request {
        let content = if path.as_os_str() == "-" {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(path)?
        };
        return match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(WayfarerError::Input("the trip request must be a JSON object".into())),
            Err(e) => Err(WayfarerError::Input(format!("trip request: {e}"))),
        };
    }

    let mut request = Map::new();
    let fields = [
        ("from", &args.from),
        ("to", &args.to),
        ("start_date", &args.start_date),
        ("end_date", &args.end_date),
        ("people", &args.people),
        ("additionalInfo", &args.notes),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            request.insert(name.to_string(), Value::String(value.clone()));
        }
    }
    if request.is_empty() {
        return Err(WayfarerError::Input(
            "give at least one trip field (--from, --to, ...) or --request".into(),
        ));
    }
    Ok(request)
}

pub async fn execute_plan_command(args: &TripArgs, config: &Config) -> Result<(), WayfarerError> {
    let request = trip_request(args)?;
    let (client, store) = client(config)?;
    let mut workflow = Workflow::start(client, store);

    let response = workflow.submit(&request).await?;
    println!("{} (key {})", response.message, response.key);
    for preview in workflow.previews().await? {
        print!("{preview}");
    }
    println!("\nOpen one with `wayfarer show <KEY>`.");
    Ok(())
}

pub async fn execute_show_command(
    key: Option<i64>,
    last: bool,
    back: bool,
    config: &Config,
) -> Result<(), WayfarerError> {
    let (client, store) = client(config)?;
    if last {
        print_view(None, &client.last().await?)?;
        return Ok(());
    }

    let mut workflow = Workflow::resume(client, store)?;
    if back {
        workflow.back()?;
    }
    match (key, workflow.state().clone()) {
        (Some(key), state) => {
            if matches!(state, State::Detail { .. }) {
                workflow.back()?;
            }
            let view = workflow.select(key).await?;
            print_view(Some(key), &view)?;
        }
        (None, State::Detail { key, .. }) => {
            print_view(Some(key), &workflow.current().await?)?;
        }
        (None, _) => {
            for preview in workflow.previews().await? {
                print!("{preview}");
            }
        }
    }
    Ok(())
}

pub async fn execute_regenerate_command(key: i64, config: &Config) -> Result<(), WayfarerError> {
    let (client, store) = client(config)?;
    let mut workflow = Workflow::resume(client, store)?;
    if matches!(workflow.state(), State::Detail { key: open, .. } if *open != key) {
        workflow.back()?;
    }
    let view = workflow.regenerate(key).await?;
    info!(key, "Itinerary regenerated");
    print_view(Some(key), &view)
}

pub async fn execute_refine_command(message: &str, config: &Config) -> Result<(), WayfarerError> {
    let (client, store) = client(config)?;
    let mut workflow = Workflow::resume(client, store)?;
    let view = workflow.refine(message).await?;
    let key = match workflow.state() {
        State::Detail { key, .. } => Some(*key),
        _ => None,
    };
    print_view(key, &view)
}

pub async fn execute_status_command(config: &Config) -> Result<(), WayfarerError> {
    let (client, _) = client(config)?;
    let status = client.status().await?;
    println!("{}", to_pretty(&status)?);
    Ok(())
}

pub fn execute_config_command(config: &Config) {
    println!("Effective configuration:");
    for (key, (value, source)) in config.effective_config() {
        println!("  {key} = {value}  [{source}]");
    }
    let session: Utf8PathBuf = config.session_path();
    println!("\nSession file: {session}");
}

fn print_view(key: Option<i64>, view: &ItineraryView) -> Result<(), WayfarerError> {
    match view {
        ItineraryView::Record(record) => println!("{}", to_pretty(record)?),
        ItineraryView::NoData { key: found } => match found.or(key) {
            Some(key) => println!("No itinerary at key {key} yet."),
            None => println!("No itineraries yet."),
        },
        ItineraryView::Malformed { error, raw } => {
            println!("{error}");
            println!("  raw: {raw}");
        }
    }
    Ok(())
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String, WayfarerError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| WayfarerError::Store(wayfarer_store::StoreError::from(e)))
}
