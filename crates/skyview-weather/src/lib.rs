//! Weather lookup for SkyView
//!
//! Resolves a location (geolocation or a geocoded search) and loads the
//! National Weather Service forecast for it, dropping results of requests
//! that have been superseded.

pub mod types;
pub mod geocode;
mod http;
pub mod loader;
pub mod location;
pub mod provider;
pub mod resolver;
pub mod session;

pub use types::*;
pub use geocode::{GeocodeMatch, GeocodeService, NominatimGeocoder};
pub use loader::{fetch_forecast, ForecastLoader, ForecastTicket};
pub use location::{source_from_config, GeolocationSource, IpGeolocation, StaticGeolocation};
pub use provider::{FeedLookup, NwsClient, WeatherService};
pub use resolver::{GeocodeTicket, LocationResolver, ResolverStatus};
pub use session::{SessionUpdate, WeatherSession};
