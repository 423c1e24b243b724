//! Logging and Prometheus metrics for dispatch services.
//!
//! Every polled collection gets its reconcile series registered at startup, so
//! dashboards show a zeroed line for a collection that has not cycled yet.

use std::fmt;
use std::net::{AddrParseError, SocketAddr};

use dispatch_config::{Environment, ServiceConfig};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const RECONCILE_CYCLES: &str = "dispatch_reconcile_cycles_total";
pub const RECONCILE_ITEMS: &str = "dispatch_reconcile_items";
pub const RECONCILE_NEW_ITEMS: &str = "dispatch_reconcile_new_items";
pub const CONSOLE_ACTIONS: &str = "dispatch_console_actions_total";

/// Outcome label values a reconcile cycle can record.
pub const CYCLE_OUTCOMES: [&str; 4] = ["applied", "not_modified", "superseded", "error"];

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("invalid DISPATCH_METRICS_ADDR '{value}': {source}")]
    MetricsAddr {
        value: String,
        #[source]
        source: AddrParseError,
    },
    #[error("failed to install Prometheus exporter: {0}")]
    Exporter(#[from] BuildError),
}

/// Where the Prometheus exporter ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsEndpoint {
    Disabled,
    Serving(SocketAddr),
    Unavailable(String),
}

impl fmt::Display for MetricsEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Serving(addr) => write!(f, "http://{addr}/metrics"),
            Self::Unavailable(reason) => write!(f, "unavailable ({reason})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Telemetry {
    pub service_name: String,
    pub environment: Environment,
    pub metrics: MetricsEndpoint,
    pub collections: Vec<String>,
}

/// Installs the log subscriber and, when `DISPATCH_METRICS_ADDR` is set, the
/// Prometheus exporter with series for each of `collections`.
pub fn init(config: &ServiceConfig, collections: &[&str]) -> Telemetry {
    init_logging(&config.log_level);

    let metrics = match install_exporter(config) {
        Ok(None) => MetricsEndpoint::Disabled,
        Ok(Some(addr)) => {
            describe_metrics();
            for collection in collections {
                register_collection(collection);
            }
            MetricsEndpoint::Serving(addr)
        }
        Err(err) => {
            tracing::warn!(
                service = %config.service_name,
                error = %err,
                "metrics disabled"
            );
            MetricsEndpoint::Unavailable(err.to_string())
        }
    };

    Telemetry {
        service_name: config.service_name.clone(),
        environment: config.environment,
        metrics,
        collections: collections.iter().map(|name| name.to_string()).collect(),
    }
}

pub fn log_startup(telemetry: &Telemetry) {
    tracing::info!(
        service = %telemetry.service_name,
        environment = %telemetry.environment,
        metrics = %telemetry.metrics,
        collections = ?telemetry.collections,
        "dispatch service starting"
    );
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    // a second init (tests, embedded use) keeps the first subscriber
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn install_exporter(config: &ServiceConfig) -> Result<Option<SocketAddr>, ObservabilityError> {
    let Some(addr) = metrics_addr(config)? else {
        return Ok(None);
    };
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", config.service_name.clone())
        .add_global_label("environment", config.environment.to_string())
        .install()?;
    Ok(Some(addr))
}

fn metrics_addr(config: &ServiceConfig) -> Result<Option<SocketAddr>, ObservabilityError> {
    config
        .metrics_addr
        .as_deref()
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|source| ObservabilityError::MetricsAddr {
                    value: value.to_string(),
                    source,
                })
        })
        .transpose()
}

fn register_collection(collection: &str) {
    for outcome in CYCLE_OUTCOMES {
        metrics::counter!(
            RECONCILE_CYCLES,
            "collection" => collection.to_string(),
            "outcome" => outcome
        )
        .absolute(0);
    }
    metrics::gauge!(RECONCILE_ITEMS, "collection" => collection.to_string()).set(0.0);
    metrics::gauge!(RECONCILE_NEW_ITEMS, "collection" => collection.to_string()).set(0.0);
}

fn describe_metrics() {
    metrics::describe_counter!(RECONCILE_CYCLES, "Reconcile cycles by collection and outcome");
    metrics::describe_gauge!(RECONCILE_ITEMS, "Items in the last applied snapshot");
    metrics::describe_gauge!(
        RECONCILE_NEW_ITEMS,
        "Items that appeared in the last applied cycle"
    );
    metrics::describe_counter!(
        CONSOLE_ACTIONS,
        "Console actions issued to the backend by action and outcome"
    );
}
