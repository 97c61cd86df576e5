use serde::{Deserialize, Serialize};
use skyview_core::{NetworkError, ReqwestErrorExt};

pub use skyview_core::ResolutionMode;

/// Number of periods shown after the current one.
pub const UPCOMING_PERIODS: usize = 6;

/// A validated latitude/longitude pair, optionally named.
///
/// Fields are private so an out-of-range or half-filled value cannot be built;
/// re-resolution replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
    location_name: Option<String>,
}

impl Coordinates {
    /// Coordinates without a display name, as reported by geolocation.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinatesError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinatesError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinatesError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
            location_name: None,
        })
    }

    /// Coordinates carrying the place name a geocoder resolved them from.
    pub fn named(
        latitude: f64,
        longitude: f64,
        name: impl Into<String>,
    ) -> Result<Self, CoordinatesError> {
        let mut coords = Self::new(latitude, longitude)?;
        coords.location_name = Some(name.into());
        Ok(coords)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn location_name(&self) -> Option<&str> {
        self.location_name.as_deref()
    }

    /// Place name if known, otherwise the rounded coordinates.
    pub fn label(&self) -> String {
        match &self.location_name {
            Some(name) => name.clone(),
            None => format!("{:.4}, {:.4}", self.latitude, self.longitude),
        }
    }

    /// True when both point at the same spot, ignoring the name.
    pub fn same_position(&self, other: &Coordinates) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinatesError {
    #[error("Latitude must be between -90 and 90, got: {0}")]
    Latitude(f64),
    #[error("Longitude must be between -180 and 180, got: {0}")]
    Longitude(f64),
}

/// One forecast interval as published by the weather service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub name: String,
    pub temperature: i32,
    pub temperature_unit: String,
    pub short_forecast: String,
    pub detailed_forecast: String,
    pub wind_speed: String,
    pub wind_direction: String,
    #[serde(rename = "icon")]
    pub icon_url: String,
}

impl Period {
    /// e.g. "72°F"
    pub fn format_temperature(&self) -> String {
        format!("{}°{}", self.temperature, self.temperature_unit)
    }

    /// e.g. "10 mph SW"
    pub fn format_wind(&self) -> String {
        format!("{} {}", self.wind_speed, self.wind_direction)
            .trim()
            .to_string()
    }
}

/// Current period plus the fixed upcoming window.
#[derive(Debug, Clone, Copy)]
pub struct ForecastView<'a> {
    periods: &'a [Period],
}

impl<'a> ForecastView<'a> {
    pub fn new(periods: &'a [Period]) -> Self {
        Self { periods }
    }

    pub fn current(&self) -> Option<&'a Period> {
        self.periods.first()
    }

    /// Periods 1 through 6, or fewer if the feed is shorter.
    pub fn upcoming(&self) -> &'a [Period] {
        let end = self.periods.len().min(UPCOMING_PERIODS + 1);
        self.periods.get(1..end).unwrap_or(&[])
    }
}

/// Loader state exposed to the display layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ForecastState {
    /// No coordinates yet
    #[default]
    Idle,
    Loading,
    Error(ForecastError),
    Ready(Vec<Period>),
}

impl ForecastState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// True once a sequence has ended in an error or data.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Ready(_))
    }

    pub fn view(&self) -> Option<ForecastView<'_>> {
        match self {
            Self::Ready(periods) => Some(ForecastView::new(periods)),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            Self::Error(e) => Some(e.user_message()),
            _ => None,
        }
    }
}

/// The three signals a geolocation capability surfaces.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeolocationSignals {
    /// Whether the capability exists at all
    pub available: bool,
    /// Whether the user has granted it
    pub enabled: bool,
    /// Absent until the first fix arrives
    pub position: Option<Coordinates>,
}

impl GeolocationSignals {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn disabled() -> Self {
        Self {
            available: true,
            enabled: false,
            position: None,
        }
    }

    /// Capability granted, waiting for a fix.
    pub fn pending() -> Self {
        Self {
            available: true,
            enabled: true,
            position: None,
        }
    }

    pub fn fixed(position: Coordinates) -> Self {
        Self {
            available: true,
            enabled: true,
            position: Some(position),
        }
    }
}

/// Location resolution errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Geolocation is not supported on this host")]
    GeolocationUnavailable,
    #[error("Geolocation permission denied")]
    GeolocationDenied,
    #[error("Geocoding returned no matches")]
    GeocodeNoMatch,
    #[error("Geocoding request failed")]
    GeocodeRequestFailed,
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::GeolocationUnavailable => "Geolocation not supported",
            Self::GeolocationDenied => "Please enable location",
            Self::GeocodeNoMatch => "Location not found. Please try a different search.",
            Self::GeocodeRequestFailed => "Error finding location. Please try again.",
        }
    }
}

/// Forecast loading errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ForecastError {
    #[error("Location outside weather service coverage")]
    UnsupportedLocation,
    #[error("Weather request failed")]
    RequestFailed,
}

impl ForecastError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnsupportedLocation => {
                "Weather data is not available for this location. The National Weather Service only provides data for US locations."
            }
            Self::RequestFailed => {
                "Unable to fetch weather data. This service only works for US locations."
            }
        }
    }
}

/// Failures of the remote services. Logged, never shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Parse error: {0}")]
    Parse(String),
    /// The task running the request died before answering
    #[error("Request aborted: {0}")]
    Aborted(String),
}

impl From<ServiceError> for NetworkError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Network(e) => e.into_network_error(),
            ServiceError::Status { status, url } => NetworkError::ServerError {
                status,
                message: url,
            },
            ServiceError::Parse(message) => NetworkError::InvalidResponse(message),
            ServiceError::Aborted(message) => NetworkError::ConnectionFailed(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::period;

    #[test]
    fn test_coordinates_accept_bounds() {
        assert!(Coordinates::new(90.0, 180.0).is_ok());
        assert!(Coordinates::new(-90.0, -180.0).is_ok());
        assert!(Coordinates::new(0.0, 0.0).is_ok());
    }

    #[test]
    fn test_coordinates_reject_out_of_range() {
        assert_eq!(
            Coordinates::new(90.5, 0.0),
            Err(CoordinatesError::Latitude(90.5))
        );
        assert_eq!(
            Coordinates::new(0.0, -180.5),
            Err(CoordinatesError::Longitude(-180.5))
        );
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_coordinates_label() {
        let unnamed = Coordinates::new(39.74561, -97.08923).unwrap();
        assert_eq!(unnamed.label(), "39.7456, -97.0892");

        let named = Coordinates::named(39.7456, -97.0892, "Topeka, Kansas").unwrap();
        assert_eq!(named.label(), "Topeka, Kansas");
        assert_eq!(named.location_name(), Some("Topeka, Kansas"));
        assert!(!named.same_position(&unnamed));
    }

    #[test]
    fn test_period_deserializes_weather_service_fields() {
        let json = serde_json::json!({
            "number": 1,
            "name": "Tonight",
            "startTime": "2024-05-01T18:00:00-05:00",
            "isDaytime": false,
            "temperature": 54,
            "temperatureUnit": "F",
            "windSpeed": "5 to 10 mph",
            "windDirection": "S",
            "icon": "https://api.weather.gov/icons/land/night/sct?size=medium",
            "shortForecast": "Partly Cloudy",
            "detailedForecast": "Partly cloudy, with a low around 54."
        });

        let period: Period = serde_json::from_value(json).unwrap();
        assert_eq!(period.name, "Tonight");
        assert_eq!(period.temperature, 54);
        assert_eq!(period.format_temperature(), "54°F");
        assert_eq!(period.format_wind(), "5 to 10 mph S");
        assert!(period.icon_url.contains("night/sct"));
    }

    #[test]
    fn test_view_splits_current_and_upcoming() {
        let periods: Vec<Period> = (0..14).map(|i| period(&format!("P{}", i))).collect();
        let view = ForecastView::new(&periods);

        assert_eq!(view.current().map(|p| p.name.as_str()), Some("P0"));
        let upcoming: Vec<&str> = view.upcoming().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(upcoming, vec!["P1", "P2", "P3", "P4", "P5", "P6"]);
    }

    #[test]
    fn test_view_with_short_feed() {
        let periods: Vec<Period> = (0..3).map(|i| period(&format!("P{}", i))).collect();
        let view = ForecastView::new(&periods);
        assert_eq!(view.upcoming().len(), 2);

        let single = vec![period("Now")];
        assert!(ForecastView::new(&single).upcoming().is_empty());

        let empty: Vec<Period> = Vec::new();
        let view = ForecastView::new(&empty);
        assert!(view.current().is_none());
        assert!(view.upcoming().is_empty());
    }

    #[test]
    fn test_forecast_state_helpers() {
        assert!(!ForecastState::Idle.is_settled());
        assert!(ForecastState::Loading.is_loading());
        assert!(ForecastState::Ready(vec![]).is_settled());

        let err = ForecastState::Error(ForecastError::UnsupportedLocation);
        assert!(err.is_settled());
        assert!(err.error_message().unwrap().contains("not available for this location"));
        assert!(err.view().is_none());
    }

    #[test]
    fn test_error_messages() {
        assert!(ForecastError::RequestFailed
            .user_message()
            .starts_with("Unable to fetch weather data"));
        assert!(LocationError::GeocodeNoMatch
            .user_message()
            .starts_with("Location not found"));
        assert!(LocationError::GeocodeRequestFailed
            .user_message()
            .starts_with("Error finding location"));
    }

    #[test]
    fn test_service_error_classification() {
        let status = ServiceError::Status {
            status: 503,
            url: "https://api.weather.gov/points/1,2".to_string(),
        };
        assert!(matches!(
            NetworkError::from(status),
            NetworkError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            NetworkError::from(ServiceError::Parse("eof".to_string())),
            NetworkError::InvalidResponse(_)
        ));
    }
}
