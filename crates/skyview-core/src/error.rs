//! Errors left over at the edges of SkyView.
//!
//! The weather components turn their own failures into state values. What
//! is left: config loading, building the HTTP clients and writing output end
//! up in `AppError`, and failed requests are classified as `NetworkError`
//! before they are logged. Anything else arrives wrapped from `anyhow`.

use thiserror::Error;

/// Top-level error shown when the program cannot get going.
///
/// `user_message()` gives the line printed to the terminal; the `Display`
/// form carries the detail and goes to the log.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "Could not write the forecast to the terminal.",
            AppError::Other(_) => "Something went wrong while looking up the weather.",
        }
    }
}

/// Transport-level failures talking to the geocoder, the weather service or
/// the geolocation endpoint.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Unreadable response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Could not reach the weather services. Check your internet connection."
            }
            NetworkError::Timeout => {
                "The weather services took too long to answer. Try again or raise services.timeout_secs."
            }
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "A weather service is having trouble right now. Try again later."
            }
            NetworkError::ServerError { .. } => "A weather service rejected the request.",
            NetworkError::InvalidResponse(_) => "A weather service sent a response SkyView could not read.",
        }
    }
}

/// Problems with `config.toml` or its location.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration directory on this system")]
    NoConfigDir,

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not parse configuration: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NoConfigDir => "No configuration directory found. Pass --config PATH.",
            ConfigError::Invalid(_) => "The configuration has invalid settings.",
            ConfigError::ParseError(_) => "The configuration file is not valid TOML.",
        }
    }
}

/// Classify a `reqwest` failure for diagnostics.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            return NetworkError::Timeout;
        }
        if let Some(status) = self.status() {
            return NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            };
        }
        if self.is_decode() || self.is_body() {
            return NetworkError::InvalidResponse(self.to_string());
        }
        NetworkError::ConnectionFailed(self.to_string())
    }
}
