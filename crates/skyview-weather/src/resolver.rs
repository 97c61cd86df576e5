//! Location resolver state machine.
//!
//! Produces one authoritative `Coordinates` value under one of two modes.
//! Automatic mode reads the geolocation signals; manual mode runs geocode
//! searches, of which only the most recently submitted one may land.

use skyview_core::NetworkError;

use crate::geocode::GeocodeMatch;
use crate::types::{Coordinates, GeolocationSignals, LocationError, ResolutionMode, ServiceError};

/// Identifies one submitted search. Results carry it back so superseded
/// searches can be recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeTicket {
    generation: u64,
    query: String,
}

impl GeocodeTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
enum ManualPhase {
    #[default]
    Idle,
    Searching(String),
    Resolved(Coordinates),
    Failed(LocationError),
}

/// What the resolver currently reports.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolverStatus {
    /// Automatic mode, capability present and granted, no fix yet
    Locating,
    /// Manual mode, nothing submitted
    Idle,
    /// Manual mode, search in flight
    Searching { query: String },
    Resolved(Coordinates),
    Failed(LocationError),
}

impl ResolverStatus {
    /// Short line for the display layer.
    pub fn message(&self) -> String {
        match self {
            Self::Locating => "Getting coordinates...".to_string(),
            Self::Idle => "Enter a location to search.".to_string(),
            Self::Searching { query } => format!("Searching for \"{}\"...", query),
            Self::Resolved(coords) => format!("Location: {}", coords.label()),
            Self::Failed(e) => e.user_message().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocationResolver {
    mode: ResolutionMode,
    generation: u64,
    signals: GeolocationSignals,
    query_text: String,
    manual: ManualPhase,
}

impl LocationResolver {
    pub fn new(mode: ResolutionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Pending search text.
    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    /// Switch modes, dropping all manual search state and any search in flight.
    pub fn set_mode(&mut self, mode: ResolutionMode) {
        if mode == self.mode {
            return;
        }
        tracing::info!("Resolution mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        self.generation += 1;
        self.query_text.clear();
        self.manual = ManualPhase::Idle;
    }

    pub fn set_query_text(&mut self, text: impl Into<String>) {
        self.query_text = text.into();
    }

    /// Start a search. `None` outside manual mode or for blank text, in
    /// which case nothing changes.
    pub fn submit_query(&mut self, text: &str) -> Option<GeocodeTicket> {
        if self.mode != ResolutionMode::Manual {
            tracing::debug!("Ignoring search outside manual mode");
            return None;
        }
        let query = text.trim();
        if query.is_empty() {
            return None;
        }

        self.generation += 1;
        self.query_text = text.to_string();
        self.manual = ManualPhase::Searching(query.to_string());
        tracing::info!(generation = self.generation, "Searching for '{}'", query);

        Some(GeocodeTicket {
            generation: self.generation,
            query: query.to_string(),
        })
    }

    /// Apply the outcome of a search. Returns `false` when the ticket was
    /// superseded and the result discarded.
    pub fn apply_geocode(
        &mut self,
        ticket: &GeocodeTicket,
        result: Result<Vec<GeocodeMatch>, ServiceError>,
    ) -> bool {
        if ticket.generation != self.generation || self.mode != ResolutionMode::Manual {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                "Discarding stale geocode result for '{}'",
                ticket.query
            );
            return false;
        }

        self.manual = match result {
            Ok(matches) => match matches.first() {
                None => {
                    tracing::warn!("No geocode match for '{}'", ticket.query);
                    ManualPhase::Failed(LocationError::GeocodeNoMatch)
                }
                Some(first) => match first.to_coordinates() {
                    Ok(coords) => {
                        tracing::info!(
                            lat = coords.latitude(),
                            lon = coords.longitude(),
                            "Resolved '{}' to {}",
                            ticket.query,
                            coords.label()
                        );
                        ManualPhase::Resolved(coords)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Geocode match for '{}' is unusable", ticket.query);
                        ManualPhase::Failed(LocationError::GeocodeRequestFailed)
                    }
                },
            },
            Err(e) => {
                let cause = NetworkError::from(e);
                tracing::error!(
                    error = %cause,
                    hint = cause.user_message(),
                    "Geocode request for '{}' failed",
                    ticket.query
                );
                ManualPhase::Failed(LocationError::GeocodeRequestFailed)
            }
        };
        true
    }

    /// Record the latest geolocation signals. They are kept in manual mode
    /// too, but only read in automatic mode.
    pub fn update_geolocation(&mut self, signals: GeolocationSignals) {
        if self.mode == ResolutionMode::Manual {
            tracing::debug!("Recording geolocation signals while in manual mode");
        }
        self.signals = signals;
    }

    pub fn status(&self) -> ResolverStatus {
        match self.mode {
            ResolutionMode::Automatic => {
                if !self.signals.available {
                    ResolverStatus::Failed(LocationError::GeolocationUnavailable)
                } else if !self.signals.enabled {
                    ResolverStatus::Failed(LocationError::GeolocationDenied)
                } else {
                    match &self.signals.position {
                        Some(position) => ResolverStatus::Resolved(position.clone()),
                        None => ResolverStatus::Locating,
                    }
                }
            }
            ResolutionMode::Manual => match &self.manual {
                ManualPhase::Idle => ResolverStatus::Idle,
                ManualPhase::Searching(query) => ResolverStatus::Searching {
                    query: query.clone(),
                },
                ManualPhase::Resolved(coords) => ResolverStatus::Resolved(coords.clone()),
                ManualPhase::Failed(e) => ResolverStatus::Failed(*e),
            },
        }
    }

    /// The resolved coordinates, if any.
    pub fn coordinates(&self) -> Option<&Coordinates> {
        match self.mode {
            ResolutionMode::Automatic => {
                if self.signals.available && self.signals.enabled {
                    self.signals.position.as_ref()
                } else {
                    None
                }
            }
            ResolutionMode::Manual => match &self.manual {
                ManualPhase::Resolved(coords) => Some(coords),
                _ => None,
            },
        }
    }
}
