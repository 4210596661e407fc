//! Structured telemetry initialisation for hosts without a subscriber.
//!
//! The engine only emits `tracing` events. Hosts that already install a
//! subscriber need nothing from this module.
//!
//! Filter directives are chosen in order: the value passed to
//! [`initialise`], then the [`LOG_FILTER_ENV`] environment variable, then
//! [`DEFAULT_LOG_FILTER`], which keeps dispatch warnings and handler
//! failures only.

use std::env;
use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Default filter: warnings and handler failures only.
pub const DEFAULT_LOG_FILTER: &str = "tl_actions=warn";

/// Environment variable consulted when no filter is passed explicitly.
pub const LOG_FILTER_ENV: &str = "TL_ACTIONS_LOG";

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, fields flattened.
    Json,
    /// Human-readable single line output.
    #[default]
    Compact,
}

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the log filter expression.
    #[error("invalid log filter {directives:?}: {message}")]
    Filter {
        /// Directives that failed to parse.
        directives: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs a global subscriber the first time it is called.
///
/// `filter` overrides [`LOG_FILTER_ENV`] and [`DEFAULT_LOG_FILTER`]. Later
/// calls return a fresh [`TelemetryHandle`] without touching global state,
/// whatever arguments they pass.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for unparsable directives and
/// [`TelemetryError::Subscriber`] when another subscriber is already global.
pub fn initialise(
    filter: Option<&str>,
    format: LogFormat,
) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| {
            let directives = filter_directives(filter, env::var(LOG_FILTER_ENV).ok());
            install_subscriber(&directives, format)
        })
        .map(|()| TelemetryHandle)
}

/// Picks the directives to use; blank values fall through to the next source.
fn filter_directives(explicit: Option<&str>, from_env: Option<String>) -> String {
    explicit
        .map(str::to_owned)
        .filter(|value| !value.trim().is_empty())
        .or_else(|| from_env.filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned())
}

fn parse_filter(directives: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directives).map_err(|error| TelemetryError::Filter {
        directives: directives.to_owned(),
        message: error.to_string(),
    })
}

fn output_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let base = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true);
    match format {
        LogFormat::Json => base.json().flatten_event(true).boxed(),
        LogFormat::Compact => base.compact().boxed(),
    }
}

fn install_subscriber(directives: &str, format: LogFormat) -> Result<(), TelemetryError> {
    let env_filter = parse_filter(directives)?;
    let subscriber = Registry::default().with(output_layer(format).with_filter(env_filter));
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
