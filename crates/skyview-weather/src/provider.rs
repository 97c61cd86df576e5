//! National Weather Service client.
//!
//! Forecasts take two requests: `/points/{lat},{lon}` names the grid
//! forecast feed for a spot, then the feed itself carries the periods.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use skyview_core::ServiceConfig;
use tracing::instrument;

use crate::http::{build_client, read_json, trim_base};
use crate::types::{Coordinates, Period, ServiceError};

const GEO_JSON: &str = "application/geo+json";

/// Outcome of the feed lookup step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLookup {
    /// URL of the forecast feed for the requested point
    Found(String),
    /// The point lies outside the service's coverage
    OutOfCoverage,
}

/// The two-step weather service contract.
#[async_trait]
pub trait WeatherService: Send + Sync {
    /// Step A: find the forecast feed for a point.
    async fn lookup_feed(&self, coordinates: &Coordinates) -> Result<FeedLookup, ServiceError>;

    /// Step B: fetch the ordered periods from a feed.
    async fn fetch_periods(&self, feed: &str) -> Result<Vec<Period>, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: Option<PointsProperties>,
}

#[derive(Debug, Deserialize)]
struct PointsProperties {
    forecast: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    periods: Vec<Period>,
}

#[derive(Debug, Clone)]
pub struct NwsClient {
    client: Client,
    base_url: String,
}

impl NwsClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: trim_base(&config.weather_url),
        })
    }

    /// The service redirects anything more precise than four decimals.
    fn points_url(&self, coordinates: &Coordinates) -> String {
        format!(
            "{}/points/{:.4},{:.4}",
            self.base_url,
            coordinates.latitude(),
            coordinates.longitude()
        )
    }
}

#[async_trait]
impl WeatherService for NwsClient {
    #[instrument(skip(self, coordinates), fields(lat = coordinates.latitude(), lon = coordinates.longitude()))]
    async fn lookup_feed(&self, coordinates: &Coordinates) -> Result<FeedLookup, ServiceError> {
        let url = self.points_url(coordinates);
        tracing::debug!("Looking up forecast feed: {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, GEO_JSON)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::info!("Point is outside weather service coverage");
            return Ok(FeedLookup::OutOfCoverage);
        }

        let points: PointsResponse = read_json(response).await?;
        match points.properties.and_then(|p| p.forecast) {
            Some(feed) => Ok(FeedLookup::Found(feed)),
            None => {
                tracing::info!("Point response carries no forecast feed");
                Ok(FeedLookup::OutOfCoverage)
            }
        }
    }

    #[instrument(skip(self), level = "info")]
    async fn fetch_periods(&self, feed: &str) -> Result<Vec<Period>, ServiceError> {
        let response = self
            .client
            .get(feed)
            .header(reqwest::header::ACCEPT, GEO_JSON)
            .send()
            .await?;

        let forecast: ForecastResponse = read_json(response).await?;
        tracing::debug!("Feed returned {} periods", forecast.properties.periods.len());
        Ok(forecast.properties.periods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyview_core::NetworkError;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> NwsClient {
        let config = ServiceConfig {
            weather_url: server.uri(),
            ..ServiceConfig::default()
        };
        NwsClient::new(&config).unwrap()
    }

    fn topeka() -> Coordinates {
        Coordinates::new(39.74561, -97.08923).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_feed_found() {
        let mock_server = MockServer::start().await;
        let feed = format!("{}/gridpoints/TOP/32,81/forecast", mock_server.uri());

        Mock::given(method("GET"))
            .and(path("/points/39.7456,-97.0892"))
            .and(header("Accept", GEO_JSON))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {
                    "gridId": "TOP",
                    "gridX": 32,
                    "gridY": 81,
                    "forecast": feed
                }
            })))
            .mount(&mock_server)
            .await;

        let lookup = client(&mock_server).lookup_feed(&topeka()).await.unwrap();
        assert_eq!(lookup, FeedLookup::Found(feed));
    }

    #[tokio::test]
    async fn test_lookup_feed_not_found_is_out_of_coverage() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/51.5074,-0.1278"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "title": "Data Unavailable For Requested Point",
                "status": 404
            })))
            .mount(&mock_server)
            .await;

        let london = Coordinates::new(51.5074, -0.1278).unwrap();
        let lookup = client(&mock_server).lookup_feed(&london).await.unwrap();
        assert_eq!(lookup, FeedLookup::OutOfCoverage);
    }

    #[tokio::test]
    async fn test_lookup_feed_missing_field_is_out_of_coverage() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/39.7456,-97.0892"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": { "gridId": null }
            })))
            .mount(&mock_server)
            .await;

        let lookup = client(&mock_server).lookup_feed(&topeka()).await.unwrap();
        assert_eq!(lookup, FeedLookup::OutOfCoverage);
    }

    #[tokio::test]
    async fn test_lookup_feed_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/39.7456,-97.0892"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let result = client(&mock_server).lookup_feed(&topeka()).await;
        assert!(matches!(result, Err(ServiceError::Status { status: 500, .. })));
        assert!(matches!(
            result.map_err(NetworkError::from),
            Err(NetworkError::ServerError { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_slow_lookup_classifies_as_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/39.7456,-97.0892"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(2500)))
            .mount(&mock_server)
            .await;

        let config = ServiceConfig {
            weather_url: mock_server.uri(),
            timeout_secs: 1,
            ..ServiceConfig::default()
        };
        let err = NwsClient::new(&config)
            .unwrap()
            .lookup_feed(&topeka())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Network(_)));
        let cause = NetworkError::from(err);
        assert!(matches!(cause, NetworkError::Timeout));
        assert!(cause.user_message().contains("services.timeout_secs"));
    }

    #[tokio::test]
    async fn test_fetch_periods() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gridpoints/TOP/32,81/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {
                    "periods": [
                        {
                            "number": 1,
                            "name": "This Afternoon",
                            "temperature": 75,
                            "temperatureUnit": "F",
                            "windSpeed": "10 mph",
                            "windDirection": "SW",
                            "icon": "https://api.weather.gov/icons/land/day/few?size=medium",
                            "shortForecast": "Sunny",
                            "detailedForecast": "Sunny, with a high near 75."
                        },
                        {
                            "number": 2,
                            "name": "Tonight",
                            "temperature": 52,
                            "temperatureUnit": "F",
                            "windSpeed": "5 mph",
                            "windDirection": "S",
                            "icon": "https://api.weather.gov/icons/land/night/few?size=medium",
                            "shortForecast": "Mostly Clear",
                            "detailedForecast": "Mostly clear, with a low around 52."
                        }
                    ]
                }
            })))
            .mount(&mock_server)
            .await;

        let feed = format!("{}/gridpoints/TOP/32,81/forecast", mock_server.uri());
        let periods = client(&mock_server).fetch_periods(&feed).await.unwrap();

        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].name, "This Afternoon");
        assert_eq!(periods[1].temperature, 52);
    }

    #[tokio::test]
    async fn test_fetch_periods_malformed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gridpoints/TOP/32,81/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": { "updated": "2024-05-01T00:00:00+00:00" }
            })))
            .mount(&mock_server)
            .await;

        let feed = format!("{}/gridpoints/TOP/32,81/forecast", mock_server.uri());
        let result = client(&mock_server).fetch_periods(&feed).await;
        assert!(matches!(result, Err(ServiceError::Parse(_))));
    }
}
