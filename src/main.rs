//! gribmanager - inspect GRIB files and sample fields at a point
//!
//! This is the main entry point for the gribmanager command line tool.

use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use gribmanager::codes::json::JsonCodes;
use gribmanager::config::Request;
use gribmanager::{
    diagnostics, init_tracing, log_error, log_handle_stats, log_operation_end,
    log_operation_start, log_timed_operation, open_grib, scoped, CodesApi, Config, GribError,
    GribMessage, GribSource,
};

fn main() -> anyhow::Result<()> {
    // Load configuration
    let (config, request) = Config::load().context("Configuration error")?;

    // Validate configuration
    config.validate().context("Invalid configuration")?;
    config
        .validate_request(&request)
        .context("Invalid request")?;

    init_tracing(&config.log_level);
    info!("Starting gribmanager v{}", env!("CARGO_PKG_VERSION"));

    let codes: Arc<dyn CodesApi> = Arc::new(JsonCodes::new());
    let source = log_timed_operation("open", || {
        open_grib(codes, &request.path, &config.open_options())
    })
    .with_context(|| format!("Failed to open {}", request.path.display()))?;

    let start = Instant::now();
    log_operation_start("inspect", Some(&request.path.display().to_string()));
    let result = scoped(source, |source| run(source, &request));
    log_operation_end("inspect", start, result.is_ok());
    log_handle_stats(&diagnostics::snapshot());

    result.map_err(|e| {
        log_error(&e, "inspect");
        e.into()
    })
}

fn run(source: &mut GribSource, request: &Request) -> gribmanager::Result<()> {
    match source {
        GribSource::File(file) => {
            for message in file {
                report(message?, request)?;
            }
        }
        GribSource::Index(index) => {
            for message in index.lookup(&request.select)? {
                report(message, request)?;
            }
        }
        GribSource::UniqueIndex(index) => report(index.lookup(&request.select)?, request)?,
    }
    Ok(())
}

/// Print one message, closing it once printed
fn report(message: GribMessage, request: &Request) -> gribmanager::Result<()> {
    scoped(message, |message| {
        if request.json {
            println!("{}", serde_json::to_string(&message.get_metadata()?)?);
        } else {
            println!("{}", message.summary()?);
        }

        if let Some((lat, lon)) = request.point {
            match message.value_at(lat, lon) {
                Ok(value) => println!("value at ({}, {}): {}", lat, lon, value),
                Err(e)
                    if matches!(
                        e,
                        GribError::OutOfGrid { .. }
                            | GribError::KeyNotFound { .. }
                            | GribError::Decode { .. }
                    ) =>
                {
                    error!(error = %e, "cannot interpolate message");
                    println!("value at ({}, {}): n/a", lat, lon);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    })
}
