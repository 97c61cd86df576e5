//! Forward geocoding: turn free text into coordinates.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use skyview_core::ServiceConfig;
use tracing::instrument;

use crate::http::{build_client, read_json, trim_base};
use crate::types::{Coordinates, CoordinatesError, ServiceError};

const MAX_RESULTS: &str = "5";

/// One search hit. Coordinates arrive as strings on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeocodeMatch {
    #[serde(rename = "lat")]
    pub latitude: String,
    #[serde(rename = "lon")]
    pub longitude: String,
    pub display_name: String,
}

impl GeocodeMatch {
    /// Parse into named coordinates.
    pub fn to_coordinates(&self) -> Result<Coordinates, GeocodeMatchError> {
        let latitude: f64 = self
            .latitude
            .trim()
            .parse()
            .map_err(|_| GeocodeMatchError::Unparsable(self.latitude.clone()))?;
        let longitude: f64 = self
            .longitude
            .trim()
            .parse()
            .map_err(|_| GeocodeMatchError::Unparsable(self.longitude.clone()))?;
        Ok(Coordinates::named(
            latitude,
            longitude,
            self.display_name.clone(),
        )?)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeocodeMatchError {
    #[error("Unparsable coordinate: {0:?}")]
    Unparsable(String),
    #[error(transparent)]
    OutOfRange(#[from] CoordinatesError),
}

/// A search service resolving free text to an ordered list of matches.
/// An empty list means "no match", not an error.
#[async_trait]
pub trait GeocodeService: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<GeocodeMatch>, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: trim_base(&config.geocode_url),
        })
    }
}

#[async_trait]
impl GeocodeService for NominatimGeocoder {
    #[instrument(skip(self), level = "info")]
    async fn search(&self, query: &str) -> Result<Vec<GeocodeMatch>, ServiceError> {
        let url = format!("{}/search", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", MAX_RESULTS)])
            .send()
            .await?;

        let matches: Vec<GeocodeMatch> = read_json(response).await?;
        tracing::debug!("Geocoder returned {} matches", matches.len());
        Ok(matches)
    }
}
