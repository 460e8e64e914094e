//! Station weather
//!
//!  Temperature and elevation of a nearby METAR station, refreshed on a timer
//!  and cached. The ingest path only ever reads the cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::WeatherError;

/// ISA sea level
pub const ISA_TEMP_C: f64 = 15.0;
pub const ISA_ELEVATION_M: f64 = 0.0;

pub const DEFAULT_WEATHER_URL: &str = "https://aviationweather.gov";

/// Temperature and elevation reported by a station
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conditions {
    pub temp_c: f64,
    pub elevation_m: f64,
}

impl Default for Conditions {
    fn default() -> Self {
        Self {
            temp_c: ISA_TEMP_C,
            elevation_m: ISA_ELEVATION_M,
        }
    }
}

/// Where the tracker gets its current conditions. Must answer immediately.
pub trait WeatherSource: Send + Sync {
    fn conditions(&self) -> Conditions;
}

/// Constant conditions, for offline use and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedWeather(pub Conditions);

impl WeatherSource for FixedWeather {
    fn conditions(&self) -> Conditions {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Observation {
    conditions: Conditions,
    fetched: Instant,
}

/// Last good METAR observation, shared between the refresh task and the
/// tracker. Falls back to `fallback` until the first fetch succeeds.
#[derive(Debug, Clone)]
pub struct MetarCache {
    latest: Arc<RwLock<Option<Observation>>>,
    fallback: Conditions,
}

impl MetarCache {
    pub fn new(fallback: Conditions) -> Self {
        Self {
            latest: Arc::new(RwLock::new(None)),
            fallback,
        }
    }

    pub fn update(&self, conditions: Conditions) {
        *self.latest.write() = Some(Observation {
            conditions,
            fetched: Instant::now(),
        });
    }

    /// Time since the last successful fetch
    pub fn age(&self) -> Option<Duration> {
        self.latest.read().as_ref().map(|o| o.fetched.elapsed())
    }
}

impl WeatherSource for MetarCache {
    fn conditions(&self) -> Conditions {
        self.latest
            .read()
            .as_ref()
            .map(|o| o.conditions)
            .unwrap_or(self.fallback)
    }
}

#[derive(Debug, Deserialize)]
struct MetarReport {
    temp: Option<f64>,
    elev: Option<f64>,
}

/// Pull temperature and elevation out of an aviationweather.gov JSON answer
pub fn conditions_from_json(body: &str, station: &str) -> Result<Conditions, WeatherError> {
    let reports: Vec<MetarReport> = serde_json::from_str(body)?;
    let report = reports
        .into_iter()
        .next()
        .ok_or_else(|| WeatherError::NoReport(station.to_string()))?;

    Ok(Conditions {
        temp_c: report.temp.ok_or(WeatherError::MissingField("temp"))?,
        elevation_m: report.elev.ok_or(WeatherError::MissingField("elev"))?,
    })
}

pub async fn fetch_metar(client: &Client, base_url: &str, station: &str) -> Result<Conditions, WeatherError> {
    let url = format!("{}/api/data/metar", base_url.trim_end_matches('/'));
    let body = client
        .get(&url)
        .query(&[("ids", station), ("format", "json")])
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    conditions_from_json(&body, station)
}

/// Refresh `cache` every `period`. Each fetch is bounded by `timeout`; on any
/// failure the cached value stays in place.
pub fn spawn_refresh(
    cache: MetarCache,
    client: Client,
    base_url: String,
    station: String,
    period: Duration,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let result = match tokio::time::timeout(timeout, fetch_metar(&client, &base_url, &station)).await {
                Ok(result) => result,
                Err(_) => Err(WeatherError::Timeout(timeout.as_secs())),
            };
            match result {
                Ok(conditions) => {
                    debug!(
                        "Temp at {} is {:.1}, elevation is {:.1}",
                        station, conditions.temp_c, conditions.elevation_m
                    );
                    cache.update(conditions);
                }
                Err(e) => {
                    let age = cache
                        .age()
                        .map(|a| format!("{} s old", a.as_secs()))
                        .unwrap_or_else(|| "defaults".to_string());
                    warn!("{}: {}, keeping cached weather ({})", station, e, age);
                }
            }
        }
    })
}
