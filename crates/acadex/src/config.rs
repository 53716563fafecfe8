//! Layered application configuration.
//!
//! Sources, later ones overriding earlier ones:
//! - built-in defaults
//! - `config/default.toml`
//! - `config/{ACADEX_ENV}.toml` (`ACADEX_ENV` defaults to `development`)
//! - `config/local.toml`
//! - environment variables prefixed `ACADEX__`, e.g. `ACADEX__SERVER__HTTP_ADDR`

use std::time::Duration;

use acadex_attendance::{RotationConfig, VerifierConfig};
use acadex_feed::FeedConfig;
use acadex_protocol::Role;
use acadex_session::{Identity, StaticAuthenticator};
use acadex_timetable::WatcherConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub attendance: AttendanceConfig,
    pub rotation: RotationSection,
    pub timetable: TimetableSection,
    pub feed: FeedConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP API listen address.
    pub http_addr: String,
    /// Push feed (WebSocket) listen address.
    pub feed_addr: String,
    /// How long a feed client has to send its handshake.
    pub handshake_timeout_secs: u64,
    /// Feed connections silent for this long are closed.
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".into(),
            feed_addr: "0.0.0.0:8081".into(),
            handshake_timeout_secs: 5,
            idle_timeout_secs: 60,
        }
    }
}

impl ServerConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AttendanceConfig {
    pub freshness_window_secs: u64,
    /// Absent disables the range check.
    pub geofence_radius_m: Option<f64>,
    /// Bound on waiting for a device position fix.
    pub location_timeout_secs: u64,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: 15,
            geofence_radius_m: Some(100.0),
            location_timeout_secs: 10,
        }
    }
}

impl AttendanceConfig {
    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            freshness_window: Duration::from_secs(self.freshness_window_secs),
            geofence_radius_m: self.geofence_radius_m,
        }
        .validated()
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RotationSection {
    pub cadence_secs: u64,
    /// Random delay before a session's first rotation.
    pub jitter_ms: u64,
}

impl Default for RotationSection {
    fn default() -> Self {
        Self {
            cadence_secs: 10,
            jitter_ms: 2000,
        }
    }
}

impl RotationSection {
    pub fn rotation_config(&self) -> RotationConfig {
        RotationConfig {
            cadence: Duration::from_secs(self.cadence_secs),
            jitter: Duration::from_millis(self.jitter_ms),
        }
        .validated()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimetableSection {
    pub recheck_secs: u64,
}

impl Default for TimetableSection {
    fn default() -> Self {
        Self { recheck_secs: 60 }
    }
}

impl TimetableSection {
    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            recheck: Duration::from_secs(self.recheck_secs),
        }
        .validated()
    }
}

/// Bearer tokens accepted by the development authenticator.
///
/// ```toml
/// [[auth.tokens]]
/// token = "dev-student-1"
/// user_id = "s-1"
/// role = "student"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenEntry {
    pub token: String,
    pub user_id: String,
    pub role: Role,
}

impl AuthConfig {
    pub fn static_authenticator(&self) -> StaticAuthenticator {
        self.tokens
            .iter()
            .fold(StaticAuthenticator::new(), |auth, entry| {
                auth.with_token(&entry.token, Identity::new(&entry.user_id, entry.role))
            })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive. `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load from the standard file locations and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ACADEX_ENV").unwrap_or_else(|_| "development".to_string());

        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{env}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("ACADEX")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Load a single file plus the environment.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("ACADEX")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
