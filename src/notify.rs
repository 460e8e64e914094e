//! Violation alerts
//!
//!  Alerts leave the ingest path through a bounded channel and are delivered
//!  by a worker thread. A full queue or a failing sink costs an alert, never
//!  ingestion.

use std::fmt;
use std::process::Command;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, TrySendError, bounded};
use tracing::{debug, info, warn};

use crate::detector::Violation;
use crate::errors::NotifyError;
use crate::tracker::ViolationReport;

pub const DEFAULT_QUEUE_LEN: usize = 64;

/// Human-readable alert for one violator
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub hex_addr: String,
    pub callsign: String,
    pub violation: Violation,
}

impl From<&ViolationReport> for Alert {
    fn from(report: &ViolationReport) -> Self {
        Self {
            hex_addr: report.hex_addr.clone(),
            callsign: report.callsign.clone(),
            violation: report.violation.clone(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = &self.violation;
        write!(
            f,
            "{} ({}) flew {} kt at {} ft, {:.1} mi from the airport: {:.0}% over the threshold of {} kt TAS (limit {} kt TAS)",
            self.callsign.trim(),
            self.hex_addr,
            v.speed,
            v.altitude,
            v.distance,
            v.severity,
            v.thresholds.threshold,
            v.thresholds.reference
        )
    }
}

pub trait Notifier: Send {
    fn notify(&mut self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Writes alerts to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, alert: &Alert) -> Result<(), NotifyError> {
        info!("ALERT {}", alert);
        Ok(())
    }
}

/// Runs a program with the alert text as its last argument
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    /// `command` is split on whitespace: program first, then fixed arguments
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Notifier for CommandNotifier {
    fn notify(&mut self, alert: &Alert) -> Result<(), NotifyError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(alert.to_string())
            .status()?;
        if !status.success() {
            return Err(NotifyError::CommandFailed(format!("{} exited with {}", self.program, status)));
        }
        Ok(())
    }
}

/// Hands alerts to a notifier on its own thread
pub struct NotifyDispatcher {
    tx: Option<Sender<Alert>>,
    worker: Option<JoinHandle<()>>,
    floor: f64,
}

impl NotifyDispatcher {
    /// Alerts with a severity below `floor` are dropped.
    pub fn spawn<N>(mut notifier: N, queue_len: usize, floor: f64) -> std::io::Result<Self>
    where
        N: Notifier + 'static,
    {
        let (tx, rx) = bounded::<Alert>(queue_len);
        let worker = thread::Builder::new()
            .name("notify".to_string())
            .spawn(move || {
                while let Ok(alert) = rx.recv() {
                    if let Err(e) = notifier.notify(&alert) {
                        warn!("Alert for {} not sent: {}", alert.hex_addr, e);
                    }
                }
            })?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            floor,
        })
    }

    /// Never blocks. Returns whether the alert was queued.
    pub fn dispatch(&self, alert: Alert) -> bool {
        if alert.violation.severity < self.floor {
            debug!(
                "Alert for {} below floor ({:.1} < {:.1})",
                alert.hex_addr, alert.violation.severity, self.floor
            );
            return false;
        }
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(alert) {
            Ok(()) => true,
            Err(TrySendError::Full(alert)) => {
                warn!("Alert queue full, dropping alert for {}", alert.hex_addr);
                false
            }
            Err(TrySendError::Disconnected(alert)) => {
                warn!("Notifier gone, dropping alert for {}", alert.hex_addr);
                false
            }
        }
    }

    /// Deliver what is queued, then stop the worker
    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Notifier thread panicked");
            }
        }
    }
}

impl Drop for NotifyDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
