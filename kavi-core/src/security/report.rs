//! Spoken security reports
//!
//! [`SecurityReporter`] runs a scan on request, voices the outcome and appends
//! the report to the `security_reports` log. Interactive callers use
//! [`SecurityReporter::spawn_scan`] so the detector pass runs on its own thread.

use super::snapshot::DeviceInventory;
use super::{SecurityReport, ThreatAnalyzer, ThreatLevel};
use crate::db::Database;
use crate::voice::{Emotion, Speaker};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const SCAN_STARTED: &str = "Running security diagnostics...";

/// Threat descriptions read out after the level announcement.
const SPOKEN_THREATS: usize = 3;

pub struct SecurityReporter {
    analyzer: ThreatAnalyzer,
    device: Arc<dyn DeviceInventory>,
    speaker: Arc<dyn Speaker>,
    db: Option<Arc<Database>>,
}

impl SecurityReporter {
    pub fn new(
        analyzer: ThreatAnalyzer,
        device: Arc<dyn DeviceInventory>,
        speaker: Arc<dyn Speaker>,
    ) -> Self {
        Self {
            analyzer,
            device,
            speaker,
            db: None,
        }
    }

    /// Persist every report to the database log.
    pub fn with_report_log(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn analyzer(&self) -> &ThreatAnalyzer {
        &self.analyzer
    }

    /// Scan, log and voice the result. Blocks for the duration of the scan.
    pub fn run_scan(&self) -> SecurityReport {
        self.speaker.speak_queued(SCAN_STARTED, Emotion::Serious);
        self.scan_and_announce()
    }

    /// Queue the "running" line now, then scan, log and voice the result on a
    /// worker thread. Join the handle to get the report.
    pub fn spawn_scan(self: &Arc<Self>) -> io::Result<JoinHandle<SecurityReport>> {
        self.speaker.speak_queued(SCAN_STARTED, Emotion::Serious);
        let reporter = Arc::clone(self);
        thread::Builder::new()
            .name("security-scan".to_string())
            .spawn(move || reporter.scan_and_announce())
    }

    fn scan_and_announce(&self) -> SecurityReport {
        let report = self.analyzer.analyze(self.device.as_ref());

        if let Some(db) = &self.db {
            if let Err(e) = db.insert_security_report(&report) {
                tracing::warn!(error = %e, report_id = %report.id, "Failed to log security report");
            }
        }

        self.announce(&report);
        report
    }

    /// Voice a finished report.
    pub fn announce(&self, report: &SecurityReport) {
        if report.threat_level == ThreatLevel::Safe {
            self.speaker
                .speak_queued("System secure. No threats detected.", Emotion::Happy);
            return;
        }

        let emotion = if report.threat_level == ThreatLevel::Critical {
            Emotion::Concerned
        } else {
            Emotion::Serious
        };
        self.speaker.speak_queued(
            &format!(
                "Security alert! Threat level is {}. I found {} issues.",
                report.threat_level,
                report.threats.len()
            ),
            emotion,
        );

        for threat in report.threats.iter().take(SPOKEN_THREATS) {
            self.speaker.speak_queued(&threat.description, Emotion::Serious);
        }
    }
}
