use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use std::{env, fmt};

pub const DEFAULT_BACKEND_URL: &str = "https://newdispatchingbackend.onrender.com";
pub const DEFAULT_LOCATIONIQ_URL: &str = "https://us1.locationiq.com";
pub const DEFAULT_MEDIA_URL: &str = "https://firebasestorage.googleapis.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Local,
    Dev,
    Test,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_env(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "local" => Self::Local,
            "dev" | "development" => Self::Dev,
            "test" | "testing" => Self::Test,
            "staging" => Self::Staging,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Local => "local",
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Staging => "staging",
            Self::Prod => "prod",
        };
        write!(f, "{}", value)
    }
}

/// Source of configuration values: the process environment, or a plain map.
pub trait Lookup {
    fn get(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl Lookup for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl Lookup for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    pub environment: Environment,
    pub bind_addr: String,
    pub metrics_addr: Option<String>,
    pub log_level: String,
}

impl ServiceConfig {
    pub fn from_env(default_service_name: &str) -> Self {
        Self::from_lookup(&ProcessEnv, default_service_name)
    }

    pub fn from_lookup(lookup: &impl Lookup, default_service_name: &str) -> Self {
        Self {
            service_name: var(lookup, "DISPATCH_SERVICE_NAME", default_service_name),
            environment: Environment::from_env(&var(lookup, "DISPATCH_ENV", "local")),
            bind_addr: var(lookup, "DISPATCH_BIND_ADDR", "0.0.0.0:8080"),
            metrics_addr: non_empty(lookup, "DISPATCH_METRICS_ADDR"),
            log_level: var(lookup, "DISPATCH_LOG_LEVEL", "info"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub admin_poll_interval_ms: u64,
    pub team_poll_interval_ms: u64,
    pub page_size: usize,
    /// Offset used for the day/month/year resolved-report windows.
    pub utc_offset_minutes: i32,
}

impl BackendConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&ProcessEnv)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Self {
        Self {
            base_url: var(lookup, "DISPATCH_BACKEND_URL", DEFAULT_BACKEND_URL),
            admin_poll_interval_ms: parsed(lookup, "DISPATCH_ADMIN_POLL_MS", 10_000_u64).max(1),
            team_poll_interval_ms: parsed(lookup, "DISPATCH_TEAM_POLL_MS", 10_000_u64).max(1),
            page_size: parsed(lookup, "DISPATCH_PAGE_SIZE", 10_usize).max(1),
            utc_offset_minutes: parsed(lookup, "DISPATCH_UTC_OFFSET_MINUTES", 480_i32)
                .clamp(-14 * 60, 14 * 60),
        }
    }

    pub fn admin_poll_interval(&self) -> Duration {
        Duration::from_millis(self.admin_poll_interval_ms)
    }

    pub fn team_poll_interval(&self) -> Duration {
        Duration::from_millis(self.team_poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeConfig {
    pub base_url: String,
    pub api_key: String,
}

impl GeocodeConfig {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Option<Self> {
        let api_key = non_empty(lookup, "DISPATCH_LOCATIONIQ_KEY")?;
        Some(Self {
            base_url: var(lookup, "DISPATCH_LOCATIONIQ_URL", DEFAULT_LOCATIONIQ_URL),
            api_key,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub base_url: String,
    pub bucket: String,
    pub max_upload_bytes: u64,
}

impl MediaConfig {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Option<Self> {
        let bucket = non_empty(lookup, "DISPATCH_MEDIA_BUCKET")?;
        let max_mb = parsed(lookup, "DISPATCH_MEDIA_MAX_MB", 200_u64).max(1);
        Some(Self {
            base_url: var(lookup, "DISPATCH_MEDIA_URL", DEFAULT_MEDIA_URL),
            bucket,
            max_upload_bytes: max_mb * 1024 * 1024,
        })
    }
}

/// Identity the response-team console acts as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    pub team_id: String,
    pub user_id: String,
    pub resolver_name: String,
}

impl ResponderConfig {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Option<Self> {
        Some(Self {
            team_id: non_empty(lookup, "DISPATCH_TEAM_ID")?,
            user_id: non_empty(lookup, "DISPATCH_USER_ID")?,
            resolver_name: non_empty(lookup, "DISPATCH_RESOLVER_NAME")?,
        })
    }
}

fn var(lookup: &impl Lookup, key: &str, default: &str) -> String {
    lookup.get(key).unwrap_or_else(|| default.to_string())
}

fn non_empty(lookup: &impl Lookup, key: &str) -> Option<String> {
    lookup
        .get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed<T: std::str::FromStr>(lookup: &impl Lookup, key: &str, default: T) -> T {
    lookup
        .get(key)
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}
