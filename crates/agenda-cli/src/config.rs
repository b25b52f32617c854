//! Client configuration.
//!
//! All settings live in `~/.config/agenda/config.toml` by default.
//!
//! Credential values (`client_id`, `client_secret`) support secret references:
//! - `pass::path/in/store` resolved via `pass show`
//! - `env::VAR_NAME` resolved from the environment
//! - plain text used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use agenda_auth::{AuthError, OAuthCredentials, RefreshPolicy};
use agenda_calendar::{CALENDAR_API_BASE, CalendarConfig, PRIMARY_CALENDAR};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::secret::{self, SecretError};

/// Errors loading or interpreting the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{0}")]
    MissingCredentials(String),

    #[error("failed to resolve {field}: {source}")]
    Secret {
        field: &'static str,
        #[source]
        source: SecretError,
    },

    #[error("invalid Google credentials: {0}")]
    InvalidCredentials(#[from] AuthError),

    #[error("unknown timezone `{0}`")]
    InvalidTimezone(String),
}

/// Configuration for the agenda client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug logging.
    pub debug: bool,

    /// Google sign-in settings.
    pub google: GoogleSettings,

    /// Calendar settings.
    pub calendar: CalendarSettings,

    /// Session storage and HTTP settings.
    pub session: SessionSettings,
}

/// Google OAuth client settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID (supports `pass::` and `env::` prefixes).
    pub client_id: Option<String>,

    /// OAuth client secret (supports `pass::` and `env::` prefixes).
    pub client_secret: Option<String>,

    /// Google Cloud Console credentials JSON, as an alternative to
    /// `client_id`/`client_secret`.
    pub client_file: Option<PathBuf>,

    /// Where the refresh token is kept.
    pub credentials_path: Option<PathBuf>,
}

/// Which calendars to use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    pub calendar_id: String,

    /// Read-only calendar merged into day views.
    pub holiday_calendar_id: Option<String>,

    pub base_url: String,

    /// IANA timezone for day views and new events; the system timezone when
    /// unset.
    pub timezone: Option<String>,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            calendar_id: PRIMARY_CALENDAR.to_string(),
            holiday_calendar_id: None,
            base_url: CALENDAR_API_BASE.to_string(),
            timezone: None,
        }
    }
}

/// Session storage and HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Where the bearer token and profile are kept.
    pub store_path: Option<PathBuf>,

    /// HTTP timeout in seconds.
    pub timeout: u64,

    /// What concurrent `401`s do.
    pub refresh_policy: RefreshPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            store_path: None,
            timeout: 30,
            refresh_policy: RefreshPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if there is no
    /// file.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agenda")
            .join("config.toml")
    }

    /// Returns the default data directory.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agenda")
    }

    /// Path of the session store (bearer token and profile).
    pub fn session_store_path(&self) -> PathBuf {
        self.session
            .store_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("session.json"))
    }

    /// Path of the Google refresh-token file.
    pub fn google_credentials_path(&self) -> PathBuf {
        self.google
            .credentials_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("google-credentials.json"))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.session.timeout)
    }

    /// Parses the configured timezone. `None` means the system timezone.
    pub fn timezone(&self) -> Result<Option<chrono_tz::Tz>, ConfigError> {
        self.calendar
            .timezone
            .as_deref()
            .map(|name| {
                name.parse::<chrono_tz::Tz>()
                    .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))
            })
            .transpose()
    }

    pub fn calendar_config(&self) -> CalendarConfig {
        let mut config = CalendarConfig::default()
            .with_base_url(&self.calendar.base_url)
            .with_calendar_id(&self.calendar.calendar_id);
        if let Some(ref holiday) = self.calendar.holiday_calendar_id {
            config = config.with_holiday_calendar(holiday);
        }
        config
    }
}

impl GoogleSettings {
    /// Resolves the OAuth client credentials.
    ///
    /// Inline `client_id`/`client_secret` win over `client_file`. Inline
    /// values go through [`secret::resolve`].
    pub fn resolve_credentials(&self) -> Result<OAuthCredentials, ConfigError> {
        let credentials = match (&self.client_id, &self.client_secret, &self.client_file) {
            (Some(raw_id), Some(raw_secret), _) => {
                let client_id = secret::resolve(raw_id).map_err(|source| ConfigError::Secret {
                    field: "client_id",
                    source,
                })?;
                let client_secret =
                    secret::resolve(raw_secret).map_err(|source| ConfigError::Secret {
                        field: "client_secret",
                        source,
                    })?;
                OAuthCredentials::new(client_id, client_secret)
            }
            (Some(_), None, None) => {
                return Err(ConfigError::MissingCredentials(
                    "client_secret is missing from the [google] section".to_string(),
                ));
            }
            (_, _, Some(file)) => OAuthCredentials::from_file(file)?,
            _ => {
                return Err(ConfigError::MissingCredentials(format!(
                    "Google credentials not found. Add to {}:\n  \
                     [google]\n  \
                     client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
                     client_secret = \"YOUR_SECRET\"",
                    ClientConfig::default_path().display()
                )));
            }
        };

        credentials.validate()?;
        Ok(credentials)
    }
}
