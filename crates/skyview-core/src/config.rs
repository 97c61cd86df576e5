use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

const ENV_PREFIX: &str = "SKYVIEW";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote service endpoints
    #[serde(default)]
    pub services: ServiceConfig,

    /// Location resolution settings
    #[serde(default)]
    pub location: LocationConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the Nominatim-compatible geocoding service
    #[serde(default = "default_geocode_url")]
    pub geocode_url: String,

    /// Base URL of the National Weather Service API
    #[serde(default = "default_weather_url")]
    pub weather_url: String,

    /// Endpoint answering IP geolocation lookups
    #[serde(default = "default_geolocation_url")]
    pub geolocation_url: String,

    /// User-Agent sent with every request. The NWS rejects anonymous clients.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_geocode_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_weather_url() -> String {
    "https://api.weather.gov".to_string()
}

fn default_geolocation_url() -> String {
    "http://ip-api.com/json".to_string()
}

fn default_user_agent() -> String {
    format!("SkyView/{} (terminal weather client)", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            geocode_url: default_geocode_url(),
            weather_url: default_weather_url(),
            geolocation_url: default_geolocation_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// How the location is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    /// Follow the geolocation capability
    #[default]
    Automatic,
    /// Resolve free-text searches through the geocoder
    Manual,
}

impl std::str::FromStr for ResolutionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "automatic" | "auto" => Ok(Self::Automatic),
            "manual" => Ok(Self::Manual),
            other => Err(ConfigError::Invalid(format!(
                "unknown resolution mode '{}', expected automatic or manual",
                other
            ))),
        }
    }
}

/// Where the geolocation capability gets its fix from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeolocationKind {
    /// Approximate position from the public IP address
    #[default]
    Ip,
    /// The latitude/longitude pair in `[location]`
    Fixed,
    /// Geolocation turned off by the user
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocationConfig {
    /// Mode the resolver starts in
    #[serde(default)]
    pub mode: ResolutionMode,

    /// Geolocation source used in automatic mode
    #[serde(default)]
    pub geolocation: GeolocationKind,

    /// Fixed latitude, used with `geolocation = "fixed"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    /// Fixed longitude, used with `geolocation = "fixed"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, layering `SKYVIEW_*` environment
    /// variables on top (`SKYVIEW_SERVICES__TIMEOUT_SECS=30`).
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings; logging them
    /// is left to the caller, which may not have a subscriber yet.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()))
                .context("Configuration validation failed");
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.services.geocode_url, "services.geocode_url", &mut result);
        self.validate_url(&self.services.weather_url, "services.weather_url", &mut result);
        self.validate_url(
            &self.services.geolocation_url,
            "services.geolocation_url",
            &mut result,
        );

        if self.services.user_agent.trim().is_empty() {
            result.add_error(
                "services.user_agent",
                "User agent must not be empty; the weather service rejects anonymous requests",
            );
        }

        if self.services.timeout_secs == 0 {
            result.add_error("services.timeout_secs", "Timeout must be greater than 0");
        } else if self.services.timeout_secs > 300 {
            result.add_warning(
                "services.timeout_secs",
                "Timeout is unusually long (>300 seconds)",
            );
        }

        self.validate_fixed_position(&mut result);

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            result.add_error(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            );
        }

        result
    }

    fn validate_fixed_position(&self, result: &mut ValidationResult) {
        let location = &self.location;
        match (location.latitude, location.longitude) {
            (Some(lat), Some(lon)) => {
                if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                    result.add_error(
                        "location.latitude",
                        format!("Latitude must be between -90 and 90, got: {}", lat),
                    );
                }
                if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                    result.add_error(
                        "location.longitude",
                        format!("Longitude must be between -180 and 180, got: {}", lon),
                    );
                }
                if location.geolocation != GeolocationKind::Fixed {
                    result.add_warning(
                        "location",
                        "Fixed coordinates are ignored unless geolocation = \"fixed\"",
                    );
                }
            }
            (None, None) => {
                if location.geolocation == GeolocationKind::Fixed {
                    result.add_error(
                        "location",
                        "geolocation = \"fixed\" requires latitude and longitude",
                    );
                }
            }
            _ => {
                result.add_error(
                    "location",
                    "latitude and longitude must be set together",
                );
            }
        }
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("skyview");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.services.weather_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "services.weather_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.services.geocode_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_empty_user_agent_is_error() {
        let mut config = Config::default();
        config.services.user_agent = "  ".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "services.user_agent"));
    }

    #[test]
    fn test_fixed_geolocation_requires_coordinates() {
        let mut config = Config::default();
        config.location.geolocation = GeolocationKind::Fixed;
        let result = config.validate();
        assert!(!result.is_valid());

        config.location.latitude = Some(39.7456);
        config.location.longitude = Some(-97.0892);
        assert!(config.validate().is_valid());
    }

    #[test]
    fn test_partial_coordinates_rejected() {
        let mut config = Config::default();
        config.location.latitude = Some(39.7456);
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.message.contains("together")));
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let mut config = Config::default();
        config.location.geolocation = GeolocationKind::Fixed;
        config.location.latitude = Some(91.0);
        config.location.longitude = Some(-181.0);
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "location.latitude"));
        assert!(result.errors.iter().any(|e| e.field == "location.longitude"));
    }

    #[test]
    fn test_unused_fixed_coordinates_warn() {
        let mut config = Config::default();
        config.location.latitude = Some(39.7456);
        config.location.longitude = Some(-97.0892);
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "location"));
    }

    #[test]
    fn test_resolution_mode_from_str() {
        assert_eq!("manual".parse::<ResolutionMode>().ok(), Some(ResolutionMode::Manual));
        assert_eq!(" Auto ".parse::<ResolutionMode>().ok(), Some(ResolutionMode::Automatic));
        assert!("sometimes".parse::<ResolutionMode>().is_err());
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.location.mode = ResolutionMode::Manual;
        config.location.geolocation = GeolocationKind::Disabled;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.location.mode, ResolutionMode::Manual);
        assert_eq!(loaded.location.geolocation, GeolocationKind::Disabled);
        assert_eq!(loaded.services.weather_url, "https://api.weather.gov");
    }

    #[test]
    fn test_sparse_file_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[location]\nmode = \"manual\"\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.location.mode, ResolutionMode::Manual);
        assert_eq!(loaded.services.geocode_url, "https://nominatim.openstreetmap.org");
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().save_to(&path).unwrap();

        std::env::set_var("SKYVIEW_SERVICES__TIMEOUT_SECS", "42");
        let loaded = Config::load_from(&path);
        std::env::remove_var("SKYVIEW_SERVICES__TIMEOUT_SECS");

        assert_eq!(loaded.unwrap().services.timeout_secs, 42);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[location\nmode = ").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_saved_file_holds_only_live_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().save_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[services]"));
        assert!(!contents.contains("config_dir"));
    }

    #[test]
    fn test_load_validated_returns_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[location]\nlatitude = 39.7456\nlongitude = -97.0892\n",
        )
        .unwrap();

        let (config, validation) = Config::load_validated(Some(&path)).unwrap();
        assert_eq!(config.location.latitude, Some(39.7456));
        assert!(validation.warnings.iter().any(|w| w.field == "location"));
    }

    #[test]
    fn test_load_validated_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[services]\nweather_url = \"not-a-url\"\n").unwrap();

        let err = Config::load_validated(Some(&path)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Invalid(_))
        ));
    }
}
