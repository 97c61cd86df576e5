use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use skyview_core::{AppError, Config, ConfigError};
use skyview_weather::{
    source_from_config, Coordinates, ForecastState, GeolocationSignals, GeolocationSource,
    NominatimGeocoder, NwsClient, Period, ResolutionMode, StaticGeolocation, WeatherSession,
};

/// National Weather Service forecast for your location
#[derive(Parser, Debug)]
#[command(name = "skyview", version, about)]
struct Cli {
    /// Place to search for; implies manual mode
    #[arg(short, long)]
    search: Option<String>,

    /// Latitude of a fixed position
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude of a fixed position
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Resolution mode: automatic or manual
    #[arg(short, long)]
    mode: Option<ResolutionMode>,

    /// Config file to use instead of the default
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            let detail = format!("{:#}", e);
            let app_error = match e.downcast::<AppError>() {
                Ok(app) => app,
                Err(e) => match e.downcast::<ConfigError>() {
                    Ok(config) => AppError::Config(config),
                    Err(other) => AppError::Other(other),
                },
            };
            eprintln!("{}\n  {}", app_error.user_message(), detail);
            ExitCode::FAILURE
        }
    }
}

/// Resolve, fetch and print. `Ok(true)` when a forecast was shown.
async fn run(cli: Cli) -> Result<bool> {
    let (config, validation) = Config::load_validated(cli.config.as_deref())?;
    skyview_core::init(&config.logging.level)?;
    for warning in &validation.warnings {
        tracing::warn!("Config warning: {}", warning);
    }

    let geocoder = NominatimGeocoder::new(&config.services)
        .map_err(|e| AppError::Network(e.into()))
        .context("Failed to build geocoding client")?;
    let weather = NwsClient::new(&config.services)
        .map_err(|e| AppError::Network(e.into()))
        .context("Failed to build weather client")?;

    let mode = if cli.search.is_some() {
        ResolutionMode::Manual
    } else {
        cli.mode.unwrap_or(config.location.mode)
    };
    tracing::info!("SkyView starting in {:?} mode", mode);

    let mut session = WeatherSession::new(Arc::new(geocoder), Arc::new(weather), mode);

    if mode == ResolutionMode::Automatic {
        let source: Arc<dyn GeolocationSource> = match (cli.lat, cli.lon) {
            (Some(lat), Some(lon)) => {
                let position =
                    Coordinates::new(lat, lon).context("Invalid --lat/--lon position")?;
                Arc::new(StaticGeolocation::new(GeolocationSignals::fixed(position)))
            }
            _ => source_from_config(&config.location, &config.services)
                .context("Failed to set up geolocation")?,
        };
        session.start_geolocation(source);
    }

    if let Some(query) = cli.search.as_deref() {
        session.set_query_text(query);
        if !session.submit_query(query) {
            tracing::warn!("Ignoring blank search");
        }
    }

    session.settle().await;

    if let Some(coordinates) = session.loader().active() {
        tracing::info!(
            lat = coordinates.latitude(),
            lon = coordinates.longitude(),
            "Forecast for {}",
            coordinates.label()
        );
    }

    let mut stdout = std::io::stdout().lock();
    let shown = render(&mut stdout, &session)
        .map_err(AppError::Io)
        .context("Failed to write forecast")?;
    Ok(shown)
}

/// Print the location line, then the forecast or its error.
fn render(out: &mut impl Write, session: &WeatherSession) -> std::io::Result<bool> {
    writeln!(out, "{}", session.resolver().status().message())?;

    match session.forecast() {
        ForecastState::Ready(_) => {
            let Some(view) = session.forecast().view() else {
                return Ok(false);
            };
            let Some(current) = view.current() else {
                writeln!(out, "\nNo forecast periods available.")?;
                return Ok(false);
            };

            writeln!(out)?;
            writeln!(out, "{}", current.name)?;
            writeln!(
                out,
                "  {}  {}",
                current.format_temperature(),
                current.short_forecast
            )?;
            writeln!(out, "  Wind: {}", current.format_wind())?;
            writeln!(out, "  {}", current.detailed_forecast)?;

            if !view.upcoming().is_empty() {
                writeln!(out)?;
                for period in view.upcoming() {
                    write_row(out, period)?;
                }
            }
            Ok(true)
        }
        ForecastState::Error(e) => {
            writeln!(out, "\n{}", e.user_message())?;
            Ok(false)
        }
        ForecastState::Loading | ForecastState::Idle => Ok(false),
    }
}

fn write_row(out: &mut impl Write, period: &Period) -> std::io::Result<()> {
    writeln!(
        out,
        "  {:<18} {:>6}  {}",
        period.name,
        period.format_temperature(),
        period.short_forecast
    )
}
