//! Configuration and command-line argument parsing

use std::time::Duration;

use clap::Parser;

use crate::aircraft::{DEFAULT_CAPACITY, DEFAULT_INACTIVITY_SECS};
use crate::detector::{Policy, Zone};
use crate::stats::DEFAULT_STATS_INTERVAL_SECS;
use crate::tracker::OutputFormat;
use crate::weather::{Conditions, DEFAULT_WEATHER_URL, ISA_ELEVATION_M, ISA_TEMP_C};

/// Flags aircraft exceeding the indicated-airspeed limit near an airport,
/// from a BaseStation (SBS) feed.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// SBS input file, `-` for stdin
    #[arg(long, value_name = "FILE", default_value = "-")]
    pub ifile: String,

    /// North-west corner of the zone
    #[arg(long, default_value_t = 34.30, allow_negative_numbers = true)]
    pub zone_nw_lat: f64,
    #[arg(long, default_value_t = -118.60, allow_negative_numbers = true)]
    pub zone_nw_lon: f64,

    /// South-east corner of the zone
    #[arg(long, default_value_t = 34.15, allow_negative_numbers = true)]
    pub zone_se_lat: f64,
    #[arg(long, default_value_t = -118.35, allow_negative_numbers = true)]
    pub zone_se_lon: f64,

    /// Reference point distances are measured from
    #[arg(long, default_value_t = 34.2098, allow_negative_numbers = true)]
    pub ref_lat: f64,
    #[arg(long, default_value_t = -118.4898, allow_negative_numbers = true)]
    pub ref_lon: f64,

    /// Statute miles around the reference point that also count as the zone
    #[arg(long, default_value_t = 5.0)]
    pub radius: f64,

    /// Largest believable jump between consecutive fixes, statute miles
    #[arg(long, default_value_t = 5.0)]
    pub squitter_cap: f64,

    /// Indicated airspeed limit, knots
    #[arg(long, default_value_t = 250)]
    pub speed_limit: i32,

    /// Knots tolerated above the limit
    #[arg(long, default_value_t = 10)]
    pub slack: i32,

    /// Highest altitude the limit applies to, feet
    #[arg(long, default_value_t = 10_000)]
    pub ceiling: i32,

    /// Seconds of silence before an aircraft is dropped and reported
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_INACTIVITY_SECS)]
    pub inactivity: i64,

    /// Maximum number of aircraft tracked at once
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Seconds of feed time between summary lines
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_STATS_INTERVAL_SECS)]
    pub stats_interval: i64,

    /// METAR station for temperature and elevation (fixed conditions if unset)
    #[arg(long, value_name = "ICAO")]
    pub station: Option<String>,

    /// Station temperature, used until the first METAR arrives
    #[arg(long, default_value_t = ISA_TEMP_C, allow_negative_numbers = true)]
    pub temp_c: f64,

    /// Station elevation in metres
    #[arg(long, default_value_t = ISA_ELEVATION_M, allow_negative_numbers = true)]
    pub elevation_m: f64,

    #[arg(long, value_name = "URL", default_value = DEFAULT_WEATHER_URL)]
    pub weather_url: String,

    /// Seconds between METAR refreshes
    #[arg(long, value_name = "SECS", default_value_t = 600)]
    pub weather_interval: u64,

    /// Run this command for every reported violator, alert text appended
    #[arg(long, value_name = "COMMAND")]
    pub notify_cmd: Option<String>,

    /// Minimum severity, in percent, worth a notification
    #[arg(long, default_value_t = 0.0)]
    pub notify_floor: f64,

    /// Write JSON lines instead of text
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    pub fn from_args() -> Self {
        Self::parse()
    }

    pub fn policy(&self) -> Policy {
        Policy {
            zone: Zone {
                nw_lat: self.zone_nw_lat,
                nw_lon: self.zone_nw_lon,
                se_lat: self.zone_se_lat,
                se_lon: self.zone_se_lon,
            },
            ref_lat: self.ref_lat,
            ref_lon: self.ref_lon,
            radius_miles: self.radius,
            squitter_cap_miles: self.squitter_cap,
            speed_limit_kt: self.speed_limit,
            slack_kt: self.slack,
            ceiling_ft: self.ceiling,
        }
    }

    /// Fixed conditions, or the fallback until the first METAR
    pub fn conditions(&self) -> Conditions {
        Conditions {
            temp_c: self.temp_c,
            elevation_m: self.elevation_m,
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        if self.json { OutputFormat::Json } else { OutputFormat::Text }
    }

    pub fn weather_interval(&self) -> Duration {
        Duration::from_secs(self.weather_interval.max(1))
    }

    /// `None` means stdin
    pub fn input_path(&self) -> Option<&str> {
        match self.ifile.as_str() {
            "-" => None,
            path => Some(path),
        }
    }
}
