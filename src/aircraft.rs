//! Aircraft tracking
//!
//!  Bounded table of the aircraft currently in view, keyed by ICAO address and
//!  aged out on the feed clock.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::debug;

use crate::decoder::Timestamp;
use crate::detector::{Thresholds, Violation};
use crate::errors::TrackError;

/// Callsign shown until an identity message supplies one
pub const UNKNOWN_CALLSIGN: &str = "unknown";

/// Far above what a single receiver can see at once
pub const DEFAULT_CAPACITY: usize = 1024;

/// Seconds of silence after which an aircraft is dropped
pub const DEFAULT_INACTIVITY_SECS: i64 = 10;

/// Tracked aircraft data
#[derive(Debug, Clone)]
pub struct Aircraft {
    /// ICAO 24-bit address
    addr: u32,
    /// Hex address string
    pub hex_addr: String,
    /// Flight callsign
    pub callsign: String,
    /// Feed time of the last accepted message
    pub seen: Timestamp,
    /// Feed time of the last velocity message
    pub speed_time: Option<Timestamp>,
    /// Feed time of the last position message
    pub position_time: Option<Timestamp>,
    /// Ground speed in knots
    pub speed: Option<i32>,
    /// Altitude in feet
    pub altitude: Option<i32>,
    pub lat: f64,
    pub lon: f64,
    pub prev_lat: f64,
    pub prev_lon: f64,
    /// 0 = never positioned, 1 = one fix, 2+ = a previous fix exists
    pub position_updates: u32,
    /// True airspeed limits at the last known altitude
    pub thresholds: Option<Thresholds>,
    /// Message count
    pub messages: u64,
    /// Most severe violation recorded so far
    pub worst: Option<Violation>,
}

impl Aircraft {
    pub fn new(addr: u32, now: Timestamp) -> Self {
        Self {
            addr,
            hex_addr: format!("{:06X}", addr),
            callsign: UNKNOWN_CALLSIGN.to_string(),
            seen: now,
            speed_time: None,
            position_time: None,
            speed: None,
            altitude: None,
            lat: 0.0,
            lon: 0.0,
            prev_lat: 0.0,
            prev_lon: 0.0,
            position_updates: 0,
            thresholds: None,
            messages: 0,
            worst: None,
        }
    }

    pub fn addr(&self) -> u32 {
        self.addr
    }

    pub fn is_violator(&self) -> bool {
        self.worst.is_some()
    }

    pub fn set_callsign(&mut self, callsign: &str) {
        if !callsign.is_empty() {
            self.callsign = callsign.to_string();
        }
    }

    /// Store a new fix, keeping the current one as the previous fix. The first
    /// fix is its own predecessor.
    pub fn update_position(&mut self, altitude: i32, lat: f64, lon: f64, now: Timestamp) {
        if self.position_updates == 0 {
            self.prev_lat = lat;
            self.prev_lon = lon;
        } else {
            self.prev_lat = self.lat;
            self.prev_lon = self.lon;
        }
        self.lat = lat;
        self.lon = lon;
        self.altitude = Some(altitude);
        self.position_time = Some(now);
        self.position_updates = self.position_updates.saturating_add(1);
    }

    pub fn update_speed(&mut self, speed: i32, now: Timestamp) {
        self.speed = Some(speed);
        self.speed_time = Some(now);
    }
}

/// Counters accumulated between two stats reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounters {
    /// Accepted messages
    pub messages: u64,
    /// Largest number of aircraft tracked at once
    pub peak_tracks: usize,
    /// Aircraft added to the table
    pub new_tracks: u64,
}

/// Store for tracking multiple aircraft
pub struct AircraftStore {
    aircraft: HashMap<u32, Aircraft>,
    capacity: usize,
    inactivity: i64,
    counters: TableCounters,
    last_population: Option<usize>,
}

impl Default for AircraftStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_INACTIVITY_SECS)
    }
}

impl AircraftStore {
    pub fn new(capacity: usize, inactivity_secs: i64) -> Self {
        Self {
            aircraft: HashMap::with_capacity(capacity),
            capacity,
            inactivity: inactivity_secs,
            counters: TableCounters::default(),
            last_population: None,
        }
    }

    /// Look up an aircraft, adding it if unseen, and mark it seen at `now`.
    ///
    /// A full table is an invariant violation, never a silent drop.
    pub fn find_or_create(&mut self, addr: u32, now: Timestamp) -> Result<&mut Aircraft, TrackError> {
        let population = self.aircraft.len();

        let aircraft = match self.aircraft.entry(addr) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                if population >= self.capacity {
                    return Err(TrackError::TableFull {
                        capacity: self.capacity,
                        addr,
                    });
                }
                self.counters.new_tracks += 1;
                debug!("{:06X} added", addr);
                entry.insert(Aircraft::new(addr, now))
            }
        };

        self.counters.messages += 1;
        aircraft.seen = now;
        aircraft.messages += 1;
        Ok(aircraft)
    }

    /// Remove aircraft silent for longer than the inactivity window. Evicted
    /// violators are handed to `on_evict`, lowest address first.
    pub fn evict_stale<F>(&mut self, now: Timestamp, mut on_evict: F)
    where
        F: FnMut(Aircraft),
    {
        let population = self.aircraft.len();
        self.counters.peak_tracks = self.counters.peak_tracks.max(population);

        let inactivity = self.inactivity;
        let mut stale: Vec<u32> = self
            .aircraft
            .values()
            .filter(|a| now - a.seen > inactivity)
            .map(Aircraft::addr)
            .collect();
        stale.sort_unstable();

        for addr in stale {
            if let Some(aircraft) = self.aircraft.remove(&addr) {
                debug!("{} removed", aircraft.hex_addr);
                if aircraft.is_violator() {
                    on_evict(aircraft);
                }
            }
        }

        let population = self.aircraft.len();
        if self.last_population != Some(population) {
            debug!("{} aircraft on list", population);
            self.last_population = Some(population);
        }
    }

    /// Remove every aircraft, e.g. at end of input
    pub fn drain<F>(&mut self, mut on_evict: F)
    where
        F: FnMut(Aircraft),
    {
        let mut all: Vec<Aircraft> = self.aircraft.drain().map(|(_, a)| a).collect();
        all.sort_unstable_by_key(Aircraft::addr);
        for aircraft in all.into_iter().filter(Aircraft::is_violator) {
            on_evict(aircraft);
        }
        self.last_population = Some(0);
    }

    /// Get aircraft by ICAO address
    #[allow(dead_code)]
    pub fn get(&self, addr: u32) -> Option<&Aircraft> {
        self.aircraft.get(&addr)
    }

    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }

    #[allow(dead_code)]
    pub fn counters(&self) -> TableCounters {
        self.counters
    }

    /// Read and reset the counters
    pub fn take_counters(&mut self) -> TableCounters {
        std::mem::take(&mut self.counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(severity: f64) -> Violation {
        Violation {
            severity,
            speed: 300,
            altitude: 3000,
            distance: 1.0,
            lat: 34.2,
            lon: -118.48,
            prev_lat: 34.2,
            prev_lon: -118.48,
            squitter_distance: 0.0,
            thresholds: Thresholds {
                threshold: 271,
                reference: 261,
            },
            timestamp: 0,
        }
    }

    #[test]
    fn test_aircraft_new() {
        let ac = Aircraft::new(0x4840D6, 100);
        assert_eq!(ac.addr(), 0x4840D6);
        assert_eq!(ac.hex_addr, "4840D6");
        assert_eq!(ac.callsign, UNKNOWN_CALLSIGN);
        assert_eq!(ac.messages, 0);
        assert_eq!(ac.position_updates, 0);
        assert!(ac.speed.is_none());
        assert!(ac.altitude.is_none());
        assert!(!ac.is_violator());
    }

    #[test]
    fn test_callsign_never_cleared() {
        let mut ac = Aircraft::new(1, 0);
        ac.set_callsign("AAL12");
        ac.set_callsign("");
        assert_eq!(ac.callsign, "AAL12");
    }

    #[test]
    fn test_position_history() {
        let mut ac = Aircraft::new(1, 0);
        ac.update_position(3000, 34.0, -118.0, 1);
        assert_eq!(ac.position_updates, 1);
        assert_eq!((ac.prev_lat, ac.prev_lon), (34.0, -118.0));

        ac.update_position(3100, 34.1, -118.1, 2);
        assert_eq!(ac.position_updates, 2);
        assert_eq!((ac.prev_lat, ac.prev_lon), (34.0, -118.0));
        assert_eq!((ac.lat, ac.lon), (34.1, -118.1));
        assert_eq!(ac.altitude, Some(3100));
        assert_eq!(ac.position_time, Some(2));
    }

    #[test]
    fn test_find_or_create_returns_same_aircraft() {
        let mut store = AircraftStore::default();
        for addr in 0..50u32 {
            store.find_or_create(addr, 0).unwrap();
        }
        store.find_or_create(7, 1).unwrap().set_callsign("N123AB");
        store.find_or_create(7, 2).unwrap();

        let ac = store.get(7).unwrap();
        assert_eq!(ac.callsign, "N123AB");
        assert_eq!(ac.messages, 3);
        assert_eq!(ac.seen, 2);
        assert_eq!(store.len(), 50);
        assert_eq!(store.counters().new_tracks, 50);
        assert_eq!(store.counters().messages, 52);
    }

    #[test]
    fn test_evict_after_inactivity() {
        let mut store = AircraftStore::default();
        store.find_or_create(0xA1, 100).unwrap();
        store.find_or_create(0xB2, 105).unwrap();

        // exactly ten seconds is still in view
        store.evict_stale(110, |_| panic!("no violators"));
        assert!(store.get(0xA1).is_some());

        store.evict_stale(111, |_| panic!("no violators"));
        assert!(store.get(0xA1).is_none());
        assert!(store.get(0xB2).is_some());

        store.evict_stale(116, |_| {});
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_reports_only_violators() {
        let mut store = AircraftStore::default();
        store.find_or_create(3, 0).unwrap().worst = Some(violation(5.0));
        store.find_or_create(2, 0).unwrap();
        store.find_or_create(1, 0).unwrap().worst = Some(violation(9.0));

        let mut evicted = Vec::new();
        store.evict_stale(20, |a| evicted.push(a.addr()));
        assert_eq!(evicted, vec![1, 3]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_table_full_is_an_error() {
        let mut store = AircraftStore::new(2, DEFAULT_INACTIVITY_SECS);
        store.find_or_create(1, 0).unwrap();
        store.find_or_create(2, 0).unwrap();
        // existing aircraft are still reachable
        assert!(store.find_or_create(1, 1).is_ok());
        assert_eq!(
            store.find_or_create(3, 1).unwrap_err(),
            TrackError::TableFull { capacity: 2, addr: 3 }
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_peak_and_take_counters() {
        let mut store = AircraftStore::default();
        for addr in 0..5u32 {
            store.find_or_create(addr, 0).unwrap();
        }
        store.evict_stale(20, |_| {});
        store.find_or_create(9, 20).unwrap();
        store.evict_stale(20, |_| {});

        let counters = store.take_counters();
        assert_eq!(counters.peak_tracks, 5);
        assert_eq!(counters.new_tracks, 6);
        assert_eq!(counters.messages, 6);
        assert_eq!(store.counters(), TableCounters::default());
    }

    #[test]
    fn test_drain() {
        let mut store = AircraftStore::default();
        store.find_or_create(2, 0).unwrap().worst = Some(violation(1.0));
        store.find_or_create(1, 0).unwrap();

        let mut evicted = Vec::new();
        store.drain(|a| evicted.push(a.addr()));
        assert_eq!(evicted, vec![2]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_drain_lowest_address_first() {
        let mut store = AircraftStore::default();
        for addr in [0xC0FFEE, 0x00A001, 0x4840D6] {
            store.find_or_create(addr, 0).unwrap().worst = Some(violation(2.0));
        }

        let mut drained = Vec::new();
        store.drain(|a| drained.push(a.addr()));
        assert_eq!(drained, vec![0x00A001, 0x4840D6, 0xC0FFEE]);
        assert_eq!(store.len(), 0);
    }
}
