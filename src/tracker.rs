//! Stream loop
//!
//!  Drives every feed line through the decoder, the aircraft table, violation
//!  detection, eviction and stats, in that order. All timing comes from the
//!  feed, so a recorded file replays identically at any speed.

use std::fmt;
use std::future::Future;
use std::io::Write;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, trace};

use crate::aircraft::{Aircraft, AircraftStore};
use crate::decoder::{Payload, SbsMessage, Timestamp, decode_sbs_line};
use crate::detector::{Detector, Violation};
use crate::errors::{Result, TrackError};
use crate::notify::{Alert, NotifyDispatcher};
use crate::stats::{StatsReporter, StatsSummary};
use crate::weather::WeatherSource;

/// Worst violation of an aircraft that left the table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViolationReport {
    pub hex_addr: String,
    pub callsign: String,
    pub messages: u64,
    #[serde(flatten)]
    pub violation: Violation,
}

impl ViolationReport {
    fn from_aircraft(aircraft: Aircraft) -> Option<Self> {
        Some(Self {
            violation: aircraft.worst?,
            hex_addr: aircraft.hex_addr,
            callsign: aircraft.callsign,
            messages: aircraft.messages,
        })
    }
}

impl fmt::Display for ViolationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = &self.violation;
        write!(
            f,
            "{} {:<8} alt {} ft speed {} kt dist {:.2} mi at {:.5},{:.5} prev {:.5},{:.5} squitter {:.2} mi severity {:.1}% tas {}/{} kt",
            self.hex_addr,
            self.callsign,
            v.altitude,
            v.speed,
            v.distance,
            v.lat,
            v.lon,
            v.prev_lat,
            v.prev_lon,
            v.squitter_distance,
            v.severity,
            v.thresholds.threshold,
            v.thresholds.reference
        )
    }
}

/// What one input line produced
#[derive(Debug, Default)]
pub struct LineOutcome {
    pub reports: Vec<ViolationReport>,
    pub summary: Option<StatsSummary>,
}

pub struct Tracker {
    store: AircraftStore,
    detector: Detector,
    stats: StatsReporter,
    weather: Box<dyn WeatherSource>,
    /// Time of the last accepted message
    clock: Option<Timestamp>,
}

impl Tracker {
    pub fn new(
        store: AircraftStore,
        detector: Detector,
        stats: StatsReporter,
        weather: Box<dyn WeatherSource>,
    ) -> Self {
        Self {
            store,
            detector,
            stats,
            weather,
            clock: None,
        }
    }

    pub fn clock(&self) -> Option<Timestamp> {
        self.clock
    }

    pub fn store(&self) -> &AircraftStore {
        &self.store
    }

    /// Process one feed line. Malformed lines still run the eviction sweep on
    /// the current clock.
    pub fn process_line(&mut self, line: &str) -> std::result::Result<LineOutcome, TrackError> {
        match decode_sbs_line(line) {
            Some(msg) => self.apply(msg)?,
            None => trace!("Ignored: {}", line.trim_end()),
        }

        let mut outcome = LineOutcome::default();
        if let Some(now) = self.clock {
            self.store.evict_stale(now, |aircraft| {
                outcome.reports.extend(ViolationReport::from_aircraft(aircraft));
            });
            outcome.summary = self.stats.tick(now, &mut self.store);
        }
        Ok(outcome)
    }

    fn apply(&mut self, msg: SbsMessage) -> std::result::Result<(), TrackError> {
        trace!("{:?} {}", msg.kind(), msg);
        let now = msg.timestamp;
        self.clock = Some(now);

        let aircraft = self.store.find_or_create(msg.addr, now)?;
        match msg.payload {
            Payload::Identity { callsign } => {
                aircraft.set_callsign(&callsign);
                return Ok(());
            }
            Payload::Position { altitude, lat, lon } => {
                aircraft.update_position(altitude, lat, lon, now);
                self.detector.refresh_thresholds(aircraft, self.weather.conditions());
            }
            Payload::Velocity { speed } => aircraft.update_speed(speed, now),
        }
        self.detector.evaluate(aircraft);
        Ok(())
    }

    /// End of input: report every remaining violator
    pub fn finish(&mut self) -> Vec<ViolationReport> {
        let mut reports = Vec::new();
        self.store.drain(|aircraft| reports.extend(ViolationReport::from_aircraft(aircraft)));
        reports
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OutputLine<'a> {
    Violation(&'a ViolationReport),
    Stats(&'a StatsSummary),
}

/// Writes reports and summaries, and forwards reports to the notifier
pub struct Output<'a, W: Write> {
    out: W,
    format: OutputFormat,
    notifier: Option<&'a NotifyDispatcher>,
    pub reports: u64,
}

impl<'a, W: Write> Output<'a, W> {
    pub fn new(out: W, format: OutputFormat, notifier: Option<&'a NotifyDispatcher>) -> Self {
        Self {
            out,
            format,
            notifier,
            reports: 0,
        }
    }

    pub fn report(&mut self, report: &ViolationReport) -> std::io::Result<()> {
        info!("{} {} evicted, {:.1}% over", report.hex_addr, report.callsign, report.violation.severity);
        self.reports += 1;
        match self.format {
            OutputFormat::Text => writeln!(self.out, "{}", report)?,
            OutputFormat::Json => self.write_json(&OutputLine::Violation(report))?,
        }
        self.out.flush()?;
        if let Some(notifier) = self.notifier {
            notifier.dispatch(Alert::from(report));
        }
        Ok(())
    }

    pub fn summary(&mut self, summary: &StatsSummary) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "STATS {}", summary)?,
            OutputFormat::Json => self.write_json(&OutputLine::Stats(summary))?,
        }
        self.out.flush()
    }

    fn write_json(&mut self, line: &OutputLine<'_>) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, line)?;
        self.out.write_all(b"\n")
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Feed `reader` through `tracker` until end of input or until `shutdown`
/// resolves, then drain. A line already read is always processed; a line
/// still arriving when `shutdown` resolves is dropped. Returns the number of
/// lines processed.
pub async fn run<R, W, S>(
    mut reader: R,
    tracker: &mut Tracker,
    output: &mut Output<'_, W>,
    shutdown: S,
) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut buf = Vec::with_capacity(256);
    let mut lines = 0u64;

    loop {
        buf.clear();
        let n = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested after {} lines", lines);
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => read?,
        };
        if n == 0 {
            debug!("End of input after {} lines, feed clock {:?}", lines, tracker.clock());
            break;
        }
        lines += 1;

        let line = String::from_utf8_lossy(&buf);
        let outcome = tracker.process_line(&line)?;
        for report in &outcome.reports {
            output.report(report)?;
        }
        if let Some(summary) = &outcome.summary {
            output.summary(summary)?;
        }
    }

    debug!("Draining {} aircraft", tracker.store().len());
    for report in tracker.finish() {
        output.report(&report)?;
    }
    Ok(lines)
}
