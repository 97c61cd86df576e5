//! Geolocation capability for a terminal host.
//!
//! A browser asks the device; here the fix comes from the public IP address
//! or from coordinates pinned in the config file.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use skyview_core::{GeolocationKind, LocationConfig, NetworkError, ServiceConfig};
use tracing::instrument;

use crate::http::{build_client, read_json};
use crate::types::{Coordinates, GeolocationSignals, ServiceError};

/// Source of the availability / permission / position signals.
#[async_trait]
pub trait GeolocationSource: Send + Sync {
    /// Signals before any fix has been attempted.
    fn initial(&self) -> GeolocationSignals;

    /// Try to get a fix and report the resulting signals.
    async fn locate(&self) -> GeolocationSignals;
}

/// Signals that never change: pinned coordinates, disabled, or absent.
#[derive(Debug, Clone)]
pub struct StaticGeolocation {
    signals: GeolocationSignals,
}

impl StaticGeolocation {
    pub fn new(signals: GeolocationSignals) -> Self {
        Self { signals }
    }
}

#[async_trait]
impl GeolocationSource for StaticGeolocation {
    fn initial(&self) -> GeolocationSignals {
        self.signals.clone()
    }

    async fn locate(&self) -> GeolocationSignals {
        self.signals.clone()
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    message: Option<String>,
}

/// Approximate position from an ip-api style endpoint.
#[derive(Debug, Clone)]
pub struct IpGeolocation {
    client: Client,
    url: String,
}

impl IpGeolocation {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(config)?,
            url: config.geolocation_url.clone(),
        })
    }

    async fn lookup(&self) -> Result<Coordinates, ServiceError> {
        let response = self.client.get(&self.url).send().await?;
        let body: IpApiResponse = read_json(response).await?;

        if body.status != "success" {
            return Err(ServiceError::Parse(format!(
                "lookup status {}: {}",
                body.status,
                body.message.unwrap_or_default()
            )));
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => {
                Coordinates::new(lat, lon).map_err(|e| ServiceError::Parse(e.to_string()))
            }
            _ => Err(ServiceError::Parse("response lacks lat/lon".to_string())),
        }
    }
}

#[async_trait]
impl GeolocationSource for IpGeolocation {
    fn initial(&self) -> GeolocationSignals {
        GeolocationSignals::pending()
    }

    #[instrument(skip(self), level = "info")]
    async fn locate(&self) -> GeolocationSignals {
        match self.lookup().await {
            Ok(position) => {
                tracing::info!(
                    lat = position.latitude(),
                    lon = position.longitude(),
                    "IP geolocation resolved"
                );
                GeolocationSignals::fixed(position)
            }
            Err(e) => {
                tracing::warn!(
                    error = %NetworkError::from(e),
                    "IP geolocation failed; reporting capability as unavailable"
                );
                GeolocationSignals::unavailable()
            }
        }
    }
}

/// Pick the geolocation source the config asks for.
pub fn source_from_config(
    location: &LocationConfig,
    services: &ServiceConfig,
) -> Result<Arc<dyn GeolocationSource>, ServiceError> {
    let source: Arc<dyn GeolocationSource> = match location.geolocation {
        GeolocationKind::Ip => Arc::new(IpGeolocation::new(services)?),
        GeolocationKind::Disabled => {
            Arc::new(StaticGeolocation::new(GeolocationSignals::disabled()))
        }
        GeolocationKind::Fixed => {
            let signals = match (location.latitude, location.longitude) {
                (Some(lat), Some(lon)) => match Coordinates::new(lat, lon) {
                    Ok(position) => GeolocationSignals::fixed(position),
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring invalid fixed position");
                        GeolocationSignals::unavailable()
                    }
                },
                _ => GeolocationSignals::unavailable(),
            };
            Arc::new(StaticGeolocation::new(signals))
        }
    };
    Ok(source)
}
