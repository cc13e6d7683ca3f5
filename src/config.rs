//! Configuration manager for prefgate.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 8000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_JWKS_TTL_SECS: u64 = 3_600;
const DEFAULT_JWKS_MIN_REFRESH_SECS: u64 = 60;

/// Signal value at or above which an item joins the liked set.
pub const DEFAULT_LIKE_THRESHOLD: i32 = 1;
/// Accepted signal scale.
pub const DEFAULT_MIN_SIGNAL: i32 = -1;
pub const DEFAULT_MAX_SIGNAL: i32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Invalid configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL in configuration: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Listening port. `PORT` environment variable wins.
    pub port: Option<u16>,
    /// Upper bound for a whole request, in milliseconds.
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to bearer token verification and identity provider.
    #[serde(skip_serializing)]
    pub identity: Option<Identity>,
    /// Related to the external recommendation engine.
    #[serde(skip_serializing)]
    pub recommendation: Option<Recommendation>,
    /// Ledger tuning.
    #[serde(default)]
    pub preferences: Preferences,
    /// Related to logs, traces and metrics export.
    #[serde(default)]
    pub telemetry: Telemetry,
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Bearer token verification.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Expected `iss` claim.
    pub issuer: String,
    /// Expected `aud` claim.
    pub audience: String,
    /// Where RS256 signing keys are published.
    pub jwks_url: Option<String>,
    /// Shared HS256 secret, for emulators and local development.
    pub secret: Option<String>,
    pub timeout_ms: Option<u64>,
    /// How long fetched signing keys are trusted.
    pub jwks_ttl_secs: Option<u64>,
    /// Minimum delay between two refreshes triggered by an unknown `kid`.
    pub jwks_min_refresh_secs: Option<u64>,
    /// Administrative API used to delete accounts.
    pub admin: Option<IdentityAdmin>,
}

impl Identity {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS))
    }

    pub fn jwks_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_ttl_secs.unwrap_or(DEFAULT_JWKS_TTL_SECS))
    }

    pub fn jwks_min_refresh(&self) -> Duration {
        Duration::from_secs(
            self.jwks_min_refresh_secs
                .unwrap_or(DEFAULT_JWKS_MIN_REFRESH_SECS),
        )
    }
}

/// Identity provider administration endpoint.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct IdentityAdmin {
    pub endpoint: String,
    pub project_id: String,
    /// Bearer token. `IDENTITY_ADMIN_TOKEN` environment variable wins.
    pub token: Option<String>,
}

/// Recommendation engine configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// API root, e.g. `https://rapi.recombee.com`.
    pub base_url: String,
    pub database_id: String,
    /// Signing token. `RECOMMENDATION_PRIVATE_TOKEN` environment variable wins.
    pub private_token: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl Recommendation {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS))
    }
}

/// Preference ledger tuning.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub like_threshold: i32,
    pub min_signal: i32,
    pub max_signal: i32,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            like_threshold: DEFAULT_LIKE_THRESHOLD,
            min_signal: DEFAULT_MIN_SIGNAL,
            max_signal: DEFAULT_MAX_SIGNAL,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

/// Telemetry exporters.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Telemetry {
    /// OTLP gRPC collector for traces and logs.
    pub otlp_endpoint: Option<String>,
    /// Expose `/metrics`.
    #[serde(default)]
    pub prometheus: bool,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Port to listen on.
    pub fn port(&self) -> u16 {
        std::env::var("PORT")
            .ok()
            .and_then(|port| port.parse().ok())
            .or(self.port)
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(
            self.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        )
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, ConfigError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, ConfigError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let config: Configuration =
                    match serde_yaml::from_reader(file) {
                        Ok(config) => config,
                        Err(err) => {
                            return Ok(Arc::new(self.error(err)));
                        },
                    };

                Ok(Arc::new(self.finalize(config)?))
            },
            Err(err) => Ok(Arc::new(self.error(err))),
        }
    }

    /// Apply version, URL normalization and secrets from environment.
    fn finalize(&self, mut config: Configuration) -> Result<Self, ConfigError> {
        config.version = VERSION.to_owned();

        if let Some(identity) = config.identity.as_mut() {
            identity.jwks_url = identity
                .jwks_url
                .as_deref()
                .map(|u| self.normalize_url(u))
                .transpose()?;

            if let Some(admin) = identity.admin.as_mut() {
                admin.endpoint = self.normalize_url(&admin.endpoint)?;
                if let Ok(token) = std::env::var("IDENTITY_ADMIN_TOKEN") {
                    admin.token = Some(token);
                }
            }
        }

        if let Some(recommendation) = config.recommendation.as_mut() {
            recommendation.base_url =
                self.normalize_url(&recommendation.base_url)?;
            if let Ok(token) = std::env::var("RECOMMENDATION_PRIVATE_TOKEN") {
                recommendation.private_token = Some(token);
            }
        }

        Ok(config)
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found or invalid");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}
