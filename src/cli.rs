//! Command-line interface parsing
//!
//! The client keeps the `key=value` argument surface of classic gpsd
//! helper scripts: every positional argument is a KEY=VALUE pair. Control
//! keys (`token`, `device`, `cache_duration`, `output`) configure the run
//! itself; every other pair is handed to the parameter resolver as a
//! request override.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::orchestrator::Invocation;
use crate::sink::PayloadSink;

/// Validity window applied when `cache_duration` is not given, in hours
const DEFAULT_CACHE_DURATION_HOURS: f64 = 3.0;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// An argument is not of the form KEY=VALUE
    #[error("Invalid argument '{0}'; expected KEY=VALUE")]
    MalformedPair(String),

    /// The cache duration is not a number
    #[error("Invalid value '{0}' for 'cache_duration'; not a number")]
    InvalidCacheDuration(String),

    /// The cache duration is outside the supported window
    #[error("Invalid value '{0}' for 'cache_duration'; not in [0, 24]")]
    CacheDurationOutOfRange(f64),
}

/// AssistNow AGNSS fetch client
///
/// Examples:
///   assistnow token=TOKEN                      # first-run registration
///   assistnow data=eph gnss=gps,glo lat=45 lon=-122.5
///   assistnow cache_duration=6 output=/tmp/agnss.ubx
#[derive(Parser, Debug)]
#[command(name = "assistnow")]
#[command(about = "Fetch AssistNow AGNSS correction data for a local GPS daemon")]
#[command(version)]
pub struct Cli {
    /// KEY=VALUE settings
    ///
    /// Control keys: token (first run), device, cache_duration (hours,
    /// default 3), output (file path, default stdout). Request parameters:
    /// data, gnss, lat, lon, alt, pacc, tacc, latency.
    #[arg(value_name = "KEY=VALUE")]
    pub settings: Vec<String>,
}

/// Builds the invocation from parsed CLI arguments
///
/// Splits control keys off into the invocation itself and collects the
/// remaining pairs as request overrides for the resolver, which owns their
/// validation.
pub fn invocation_from_cli(cli: &Cli) -> Result<Invocation, CliError> {
    let mut invocation = Invocation {
        cache_duration_hours: DEFAULT_CACHE_DURATION_HOURS,
        ..Default::default()
    };
    let mut overrides = BTreeMap::new();

    for setting in &cli.settings {
        let (key, value) = split_pair(setting)?;
        match key.as_str() {
            "token" => invocation.token = Some(value),
            "device" => invocation.device_id = Some(value),
            "cache_duration" => {
                invocation.cache_duration_hours = parse_cache_duration(&value)?;
            }
            "output" => invocation.sink = PayloadSink::File(PathBuf::from(value)),
            _ => {
                overrides.insert(key, value);
            }
        }
    }

    invocation.overrides = overrides;
    Ok(invocation)
}

/// Splits a KEY=VALUE argument at the first '='
fn split_pair(setting: &str) -> Result<(String, String), CliError> {
    match setting.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::MalformedPair(setting.to_string())),
    }
}

fn parse_cache_duration(value: &str) -> Result<f64, CliError> {
    let hours: f64 = value
        .parse()
        .map_err(|_| CliError::InvalidCacheDuration(value.to_string()))?;
    if !(0.0..=24.0).contains(&hours) {
        return Err(CliError::CacheDurationOutOfRange(hours));
    }
    Ok(hours)
}
