//! Weather session: owns the resolver and the loader, runs network work in
//! spawned tasks and applies their results one at a time.
//!
//! Tasks never touch state. They post a message carrying their ticket and
//! the session decides whether the result is still wanted.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;

use crate::geocode::{GeocodeMatch, GeocodeService};
use crate::loader::{fetch_forecast, ForecastLoader, ForecastTicket};
use crate::location::GeolocationSource;
use crate::provider::WeatherService;
use crate::resolver::{GeocodeTicket, LocationResolver, ResolverStatus};
use crate::types::{
    ForecastError, ForecastState, GeolocationSignals, Period, ResolutionMode, ServiceError,
};

/// Messages sent from spawned tasks back to the session
#[derive(Debug)]
enum SessionMessage {
    Geolocation(GeolocationSignals),
    GeocodeDone {
        ticket: GeocodeTicket,
        result: Result<Vec<GeocodeMatch>, ServiceError>,
    },
    ForecastDone {
        ticket: ForecastTicket,
        result: Result<Vec<Period>, ForecastError>,
    },
}

/// What changed after applying one completion.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Location(ResolverStatus),
    Forecast(ForecastState),
    /// The completion belonged to a superseded request
    Discarded,
}

pub struct WeatherSession {
    geocoder: Arc<dyn GeocodeService>,
    weather: Arc<dyn WeatherService>,
    resolver: LocationResolver,
    loader: ForecastLoader,
    tx: mpsc::UnboundedSender<SessionMessage>,
    rx: mpsc::UnboundedReceiver<SessionMessage>,
    /// Spawned tasks whose message has not been handled yet
    in_flight: usize,
}

impl WeatherSession {
    pub fn new(
        geocoder: Arc<dyn GeocodeService>,
        weather: Arc<dyn WeatherService>,
        mode: ResolutionMode,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            geocoder,
            weather,
            resolver: LocationResolver::new(mode),
            loader: ForecastLoader::new(),
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    pub fn loader(&self) -> &ForecastLoader {
        &self.loader
    }

    pub fn forecast(&self) -> &ForecastState {
        self.loader.state()
    }

    pub fn set_mode(&mut self, mode: ResolutionMode) {
        self.resolver.set_mode(mode);
        self.sync_loader();
    }

    pub fn set_query_text(&mut self, text: impl Into<String>) {
        self.resolver.set_query_text(text);
    }

    /// Submit a search. Returns `false` when the resolver ignored it.
    pub fn submit_query(&mut self, text: &str) -> bool {
        let Some(ticket) = self.resolver.submit_query(text) else {
            return false;
        };
        self.spawn_geocode(ticket);
        self.sync_loader();
        true
    }

    pub fn update_geolocation(&mut self, signals: GeolocationSignals) {
        self.resolver.update_geolocation(signals);
        self.sync_loader();
    }

    /// Record the source's initial signals, then ask it for a fix in the
    /// background.
    pub fn start_geolocation(&mut self, source: Arc<dyn GeolocationSource>) {
        self.update_geolocation(source.initial());

        self.in_flight += 1;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let signals = match guarded(async move { source.locate().await }).await {
                Ok(signals) => signals,
                Err(e) => {
                    tracing::error!(error = %e, "Geolocation task died");
                    GeolocationSignals::unavailable()
                }
            };
            let _ = tx.send(SessionMessage::Geolocation(signals));
        });
    }

    /// Whether any spawned task has yet to report back, superseded ones
    /// included.
    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    /// Wait for one completion and apply it. `None` when nothing is pending.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        if !self.is_busy() {
            return None;
        }
        let message = self.rx.recv().await?;
        self.in_flight -= 1;
        Some(self.handle(message))
    }

    /// Apply completions until no task is outstanding.
    pub async fn settle(&mut self) {
        while let Some(update) = self.next_update().await {
            tracing::trace!(?update, "Session update");
        }
    }

    fn handle(&mut self, message: SessionMessage) -> SessionUpdate {
        match message {
            SessionMessage::Geolocation(signals) => {
                self.update_geolocation(signals);
                SessionUpdate::Location(self.resolver.status())
            }
            SessionMessage::GeocodeDone { ticket, result } => {
                if !self.resolver.apply_geocode(&ticket, result) {
                    return SessionUpdate::Discarded;
                }
                self.sync_loader();
                SessionUpdate::Location(self.resolver.status())
            }
            SessionMessage::ForecastDone { ticket, result } => {
                if !self.loader.apply(&ticket, result) {
                    return SessionUpdate::Discarded;
                }
                SessionUpdate::Forecast(self.loader.state().clone())
            }
        }
    }

    fn sync_loader(&mut self) {
        match self.resolver.coordinates().cloned() {
            Some(coordinates) => {
                if let Some(ticket) = self.loader.set_coordinates(coordinates) {
                    self.spawn_forecast(ticket);
                }
            }
            None => self.loader.clear(),
        }
    }

    fn spawn_geocode(&mut self, ticket: GeocodeTicket) {
        self.in_flight += 1;
        tracing::debug!(generation = ticket.generation(), "Spawning geocode request");
        let tx = self.tx.clone();
        let geocoder = Arc::clone(&self.geocoder);
        let query = ticket.query().to_string();
        tokio::spawn(async move {
            let result = match guarded(async move { geocoder.search(&query).await }).await {
                Ok(result) => result,
                Err(e) => Err(ServiceError::Aborted(e.to_string())),
            };
            let _ = tx.send(SessionMessage::GeocodeDone { ticket, result });
        });
    }

    fn spawn_forecast(&mut self, ticket: ForecastTicket) {
        self.in_flight += 1;
        tracing::debug!(generation = ticket.generation(), "Spawning forecast request");
        let tx = self.tx.clone();
        let weather = Arc::clone(&self.weather);
        let coordinates = ticket.coordinates().clone();
        tokio::spawn(async move {
            let work = async move { fetch_forecast(weather.as_ref(), &coordinates).await };
            let result = match guarded(work).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "Forecast task died");
                    Err(ForecastError::RequestFailed)
                }
            };
            let _ = tx.send(SessionMessage::ForecastDone { ticket, result });
        });
    }
}

/// Run a service call in its own task. A panic comes back as a `JoinError`
/// so the reply message is still sent and `in_flight` still drops.
async fn guarded<T, F>(work: F) -> Result<T, JoinError>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    tokio::spawn(work).await
}
