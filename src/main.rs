//!   speedwatch:   airspeed limit watch on a BaseStation feed
//!
//!  Reads dump1090 SBS lines, tracks aircraft near an airport and reports
//!  those flying faster than the indicated-airspeed limit allows.
//!

mod aircraft;
mod atmosphere;
mod config;
mod decoder;
mod detector;
mod errors;
mod geodesy;
mod notify;
mod stats;
mod tracker;
mod weather;

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use reqwest::Client;
use tokio::fs::File;
use tokio::io::BufReader;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::aircraft::AircraftStore;
use crate::config::Config;
use crate::detector::Detector;
use crate::errors::{Result, SpeedwatchError};
use crate::notify::{CommandNotifier, DEFAULT_QUEUE_LEN, LogNotifier, NotifyDispatcher};
use crate::stats::StatsReporter;
use crate::tracker::{Output, Tracker};
use crate::weather::{FixedWeather, MetarCache, WeatherSource};

/// Upper bound on one METAR request
const WEATHER_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a pending read on an idle feed may hold up exit
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    let config = Config::from_args();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if config.verbose { "debug" } else { "info" }));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("speedwatch starting...");
    debug!("Configuration: {:?}", config);

    let result = tokio::runtime::Runtime::new()
        .map_err(SpeedwatchError::from)
        .and_then(|rt| {
            let result = rt.block_on(run(config));
            // stdin and FIFO reads sit on the blocking pool and never return on an idle feed
            rt.shutdown_timeout(SHUTDOWN_GRACE);
            result
        });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<()> {
    // Weather: live METAR with the configured values as fallback, or fixed
    let fallback = config.conditions();
    let mut refresh_handle: Option<JoinHandle<()>> = None;
    let weather: Box<dyn WeatherSource> = match &config.station {
        Some(station) => {
            info!("Using METAR from {} every {} s", station, config.weather_interval().as_secs());
            let cache = MetarCache::new(fallback);
            let handle = weather::spawn_refresh(
                cache.clone(),
                Client::new(),
                config.weather_url.clone(),
                station.clone(),
                config.weather_interval(),
                WEATHER_TIMEOUT,
            );
            refresh_handle = Some(handle);
            Box::new(cache)
        }
        None => {
            info!("Using fixed conditions: {:.1} C at {:.0} m", fallback.temp_c, fallback.elevation_m);
            Box::new(FixedWeather(fallback))
        }
    };

    let mut dispatcher = match config.notify_cmd.as_deref().and_then(CommandNotifier::from_command_line) {
        Some(notifier) => NotifyDispatcher::spawn(notifier, DEFAULT_QUEUE_LEN, config.notify_floor)?,
        None => NotifyDispatcher::spawn(LogNotifier, DEFAULT_QUEUE_LEN, config.notify_floor)?,
    };

    // Ctrl+C lets the current line finish, then drains
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupted, finishing up"),
            Err(e) => {
                error!("Cannot listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    let detector = Detector::new(config.policy());
    let policy = detector.policy();
    info!(
        "Limit {} kt + {} kt up to {} ft, {:.1} mi around {:.4},{:.4}",
        policy.speed_limit_kt, policy.slack_kt, policy.ceiling_ft, policy.radius_miles, policy.ref_lat, policy.ref_lon
    );

    let mut tracker = Tracker::new(
        AircraftStore::new(config.capacity, config.inactivity),
        detector,
        StatsReporter::new(config.stats_interval),
        weather,
    );
    let mut output = Output::new(io::stdout(), config.output_format(), Some(&dispatcher));

    tokio::pin!(shutdown);
    let result = match config.input_path() {
        Some(path) => {
            info!("Reading from file: {}", path);
            // opening a FIFO waits for its writer
            let opened = tokio::select! {
                opened = File::open(path) => Some(opened),
                _ = &mut shutdown => None,
            };
            match opened {
                Some(Ok(file)) => tracker::run(BufReader::new(file), &mut tracker, &mut output, &mut shutdown).await,
                Some(Err(e)) => Err(e.into()),
                None => Ok(0),
            }
        }
        None => {
            info!("Reading from stdin");
            tracker::run(BufReader::new(tokio::io::stdin()), &mut tracker, &mut output, &mut shutdown).await
        }
    };
    let reports = output.reports;
    drop(output);

    // Cleanup
    dispatcher.shutdown();
    if let Some(h) = refresh_handle {
        h.abort();
    }

    let lines = result?;
    info!("{} lines read, {} violators reported", lines, reports);
    Ok(())
}
