//! Speed violation detection
//!
//!  Applies the bad-squitter filters and the zone/altitude/speed policy to an
//!  aircraft after each update, and keeps the single worst violation seen
//!  while the aircraft stays in the table.

use serde::Serialize;
use tracing::debug;

use crate::aircraft::Aircraft;
use crate::atmosphere::cas_to_tas;
use crate::decoder::Timestamp;
use crate::geodesy::distance_miles_deg;
use crate::weather::Conditions;

/// Speed and position must be less than this far apart to be combined
pub const MAX_FIX_SKEW_SECS: i64 = 3;
/// Altitudes below this are mostly ground clutter and decode noise
pub const MIN_ALTITUDE_FT: i32 = 2000;
/// Ground speeds at or above this are treated as bad squitters
pub const MAX_PLAUSIBLE_SPEED_KT: i32 = 400;

/// Rectangle given by its north-west and south-east corners, in degrees.
/// Edges are inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Zone {
    pub nw_lat: f64,
    pub nw_lon: f64,
    pub se_lat: f64,
    pub se_lon: f64,
}

impl Zone {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat <= self.nw_lat && lat >= self.se_lat && lon >= self.nw_lon && lon <= self.se_lon
    }
}

/// True airspeeds derived from the indicated-speed limit at one altitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Thresholds {
    /// Limit plus slack; reaching it is a violation
    pub threshold: i32,
    /// The bare legal limit
    pub reference: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub zone: Zone,
    pub ref_lat: f64,
    pub ref_lon: f64,
    /// Statute miles around the reference point that count as in the zone
    pub radius_miles: f64,
    /// Largest believable jump between two consecutive fixes, statute miles
    pub squitter_cap_miles: f64,
    /// Legal indicated airspeed, knots
    pub speed_limit_kt: i32,
    pub slack_kt: i32,
    /// Highest altitude the limit applies to, feet
    pub ceiling_ft: i32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            zone: Zone {
                nw_lat: 34.30,
                nw_lon: -118.60,
                se_lat: 34.15,
                se_lon: -118.35,
            },
            // KVNY
            ref_lat: 34.2098,
            ref_lon: -118.4898,
            radius_miles: 5.0,
            squitter_cap_miles: 5.0,
            speed_limit_kt: 250,
            slack_kt: 10,
            ceiling_ft: 10_000,
        }
    }
}

/// Snapshot of the worst infraction recorded for an aircraft
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Percent above the threshold
    pub severity: f64,
    pub speed: i32,
    pub altitude: i32,
    /// Statute miles from the reference point
    pub distance: f64,
    pub lat: f64,
    pub lon: f64,
    pub prev_lat: f64,
    pub prev_lon: f64,
    /// Statute miles between the previous and the current fix
    pub squitter_distance: f64,
    pub thresholds: Thresholds,
    pub timestamp: Timestamp,
}

pub struct Detector {
    policy: Policy,
}

impl Detector {
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn thresholds_at(&self, conditions: Conditions, altitude: i32) -> Thresholds {
        let limit = self.policy.speed_limit_kt;
        Thresholds {
            threshold: cas_to_tas(
                conditions.temp_c,
                conditions.elevation_m,
                limit + self.policy.slack_kt,
                altitude,
            ),
            reference: cas_to_tas(conditions.temp_c, conditions.elevation_m, limit, altitude),
        }
    }

    /// Recompute the aircraft's thresholds for its last known altitude
    pub fn refresh_thresholds(&self, aircraft: &mut Aircraft, conditions: Conditions) {
        if let Some(altitude) = aircraft.altitude {
            aircraft.thresholds = Some(self.thresholds_at(conditions, altitude));
        }
    }

    /// Inside the rectangle or within the radius of the reference point
    pub fn in_zone(&self, lat: f64, lon: f64) -> bool {
        self.policy.zone.contains(lat, lon)
            || self.distance_from_reference(lat, lon) <= self.policy.radius_miles
    }

    fn distance_from_reference(&self, lat: f64, lon: f64) -> f64 {
        distance_miles_deg(self.policy.ref_lat, self.policy.ref_lon, lat, lon)
    }

    /// Check the aircraft against the policy. Returns the new worst violation
    /// when this update recorded one.
    pub fn evaluate<'a>(&self, aircraft: &'a mut Aircraft) -> Option<&'a Violation> {
        let (speed_time, position_time) = (aircraft.speed_time?, aircraft.position_time?);
        if (speed_time - position_time).abs() >= MAX_FIX_SKEW_SECS {
            return None;
        }

        let speed = aircraft.speed?;
        let altitude = aircraft.altitude?;
        let thresholds = aircraft.thresholds?;
        if altitude < MIN_ALTITUDE_FT || speed >= MAX_PLAUSIBLE_SPEED_KT {
            return None;
        }

        let (lat, lon) = (aircraft.lat, aircraft.lon);
        if !self.in_zone(lat, lon) {
            return None;
        }

        let squitter_distance = distance_miles_deg(aircraft.prev_lat, aircraft.prev_lon, lat, lon);
        // NaN from acos fails here
        if !(squitter_distance < self.policy.squitter_cap_miles) {
            return None;
        }

        if altitude > self.policy.ceiling_ft || speed < thresholds.threshold || thresholds.threshold <= 0 {
            return None;
        }

        let severity = (speed - thresholds.threshold) as f64 / thresholds.threshold as f64 * 100.0;
        if let Some(worst) = &aircraft.worst {
            if severity <= worst.severity {
                return None;
            }
        }

        debug!(
            "{} {} new worst: {} kt at {} ft, {:.1}% over {} kt",
            aircraft.hex_addr, aircraft.callsign, speed, altitude, severity, thresholds.threshold
        );

        aircraft.worst = Some(Violation {
            severity,
            speed,
            altitude,
            distance: self.distance_from_reference(lat, lon),
            lat,
            lon,
            prev_lat: aircraft.prev_lat,
            prev_lon: aircraft.prev_lon,
            squitter_distance,
            thresholds,
            timestamp: aircraft.seen,
        });
        aircraft.worst.as_ref()
    }
}
