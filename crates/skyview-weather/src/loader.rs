//! Forecast loader state machine and the two-step fetch sequence.

use skyview_core::NetworkError;

use crate::provider::{FeedLookup, WeatherService};
use crate::types::{Coordinates, ForecastError, ForecastState, Period};

/// Identifies one forecast sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTicket {
    generation: u64,
    coordinates: Coordinates,
}

impl ForecastTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn coordinates(&self) -> &Coordinates {
        &self.coordinates
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForecastLoader {
    state: ForecastState,
    active: Option<Coordinates>,
    generation: u64,
}

impl ForecastLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ForecastState {
        &self.state
    }

    /// Coordinates of the most recent sequence.
    pub fn active(&self) -> Option<&Coordinates> {
        self.active.as_ref()
    }

    /// Begin a new sequence for `coordinates`, superseding any in flight.
    ///
    /// Returns `None` when the coordinates are unchanged and the loader is
    /// already loading or showing them. After an error the same coordinates
    /// start a fresh attempt.
    pub fn set_coordinates(&mut self, coordinates: Coordinates) -> Option<ForecastTicket> {
        let unchanged = self
            .active
            .as_ref()
            .is_some_and(|active| active.same_position(&coordinates));
        if unchanged && matches!(self.state, ForecastState::Loading | ForecastState::Ready(_)) {
            return None;
        }

        self.generation += 1;
        self.state = ForecastState::Loading;
        self.active = Some(coordinates.clone());
        tracing::info!(
            generation = self.generation,
            "Loading forecast for {}",
            coordinates.label()
        );

        Some(ForecastTicket {
            generation: self.generation,
            coordinates,
        })
    }

    /// Drop back to idle; anything in flight becomes stale.
    pub fn clear(&mut self) {
        if self.active.is_none() && self.state == ForecastState::Idle {
            return;
        }
        tracing::debug!("Clearing forecast");
        self.generation += 1;
        self.active = None;
        self.state = ForecastState::Idle;
    }

    /// Apply the outcome of a sequence. Returns `false` for a stale ticket.
    pub fn apply(
        &mut self,
        ticket: &ForecastTicket,
        result: Result<Vec<Period>, ForecastError>,
    ) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                "Discarding stale forecast for {}",
                ticket.coordinates.label()
            );
            return false;
        }

        self.state = match result {
            Ok(periods) => {
                tracing::info!("Forecast ready with {} periods", periods.len());
                ForecastState::Ready(periods)
            }
            Err(e) => ForecastState::Error(e),
        };
        true
    }
}

/// Run the feed lookup then the period fetch for one point.
///
/// Out-of-coverage stops after the first step. Raw service failures are
/// logged here and collapsed into [`ForecastError::RequestFailed`].
pub async fn fetch_forecast(
    service: &dyn WeatherService,
    coordinates: &Coordinates,
) -> Result<Vec<Period>, ForecastError> {
    let feed = match service.lookup_feed(coordinates).await {
        Ok(FeedLookup::Found(feed)) => feed,
        Ok(FeedLookup::OutOfCoverage) => {
            tracing::warn!("No forecast coverage for {}", coordinates.label());
            return Err(ForecastError::UnsupportedLocation);
        }
        Err(e) => {
            let cause = NetworkError::from(e);
            tracing::error!(error = %cause, hint = cause.user_message(), "Forecast feed lookup failed");
            return Err(ForecastError::RequestFailed);
        }
    };

    service.fetch_periods(&feed).await.map_err(|e| {
        let cause = NetworkError::from(e);
        tracing::error!(error = %cause, hint = cause.user_message(), feed = %feed, "Forecast fetch failed");
        ForecastError::RequestFailed
    })
}
