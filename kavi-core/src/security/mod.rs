//! Heuristic security scanning
//!
//! Independent [`Detector`]s inspect the device and return scored findings.
//! The [`ThreatAnalyzer`] runs every registered detector, sums the scores and
//! buckets the total into a [`ThreatLevel`].
//!
//! ```text
//!  DeviceInventory ──► Detector A ─┐
//!                  ──► Detector B ─┼──► ThreatAnalyzer::analyze() ──► SecurityReport
//!                  ──► Detector C ─┘      (sum, sort, bucket)
//! ```
//!
//! A detector that fails contributes nothing; the scan always completes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kavi_core::security::{create_default_analyzer, DeviceSnapshot};
//!
//! let analyzer = create_default_analyzer(&config.security, &config.assistant.self_package);
//! let report = analyzer.analyze(&DeviceSnapshot::load(path)?);
//! println!("{}", report.summary);
//! ```

pub mod detectors;
pub mod report;
pub mod snapshot;

pub use report::SecurityReporter;
pub use snapshot::{DeviceInventory, DeviceSnapshot, InstalledApp};

use crate::clock::{Clock, SystemClock};
use crate::config::SecurityConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

// ============================================
// Findings
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatType {
    AccessibilityAbuse,
    SpywarePermissionCombo,
    OverlayAttack,
    MicUsage,
    SideloadedApp,
    PersistentService,
    UnsafeSystemSetting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Dangerous,
    Critical,
}

/// One scored finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedThreat {
    pub threat_type: ThreatType,
    pub severity: Severity,
    pub description: String,
    pub package_name: Option<String>,
    pub score: u32,
}

// ============================================
// Threat level
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    /// Step function over the summed score; each tier includes its lower bound.
    pub fn from_score(score: u32) -> Self {
        match score {
            60.. => ThreatLevel::Critical,
            40..=59 => ThreatLevel::High,
            20..=39 => ThreatLevel::Medium,
            1..=19 => ThreatLevel::Low,
            0 => ThreatLevel::Safe,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Safe => "SAFE",
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::High => "HIGH",
            ThreatLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SAFE" => Ok(ThreatLevel::Safe),
            "LOW" => Ok(ThreatLevel::Low),
            "MEDIUM" => Ok(ThreatLevel::Medium),
            "HIGH" => Ok(ThreatLevel::High),
            "CRITICAL" => Ok(ThreatLevel::Critical),
            other => Err(Error::Config(format!("unknown threat level: {}", other))),
        }
    }
}

// ============================================
// Report
// ============================================

/// Result of one scan. Threats are ordered by descending score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityReport {
    pub id: String,
    pub generated_at: DateTime<Utc>,
    pub threat_level: ThreatLevel,
    pub total_score: u32,
    pub threats: Vec<DetectedThreat>,
    pub summary: String,
}

impl SecurityReport {
    pub fn from_threats(mut threats: Vec<DetectedThreat>, generated_at: DateTime<Utc>) -> Self {
        // Stable: equal scores keep detector order
        threats.sort_by(|a, b| b.score.cmp(&a.score));
        let total_score: u32 = threats.iter().map(|t| t.score).sum();
        let threat_level = ThreatLevel::from_score(total_score);
        let summary = match threats.first() {
            None => "Device is secure.".to_string(),
            Some(top) => format!(
                "Threat Level: {}. Found {} issues. Top concern: {}",
                threat_level,
                threats.len(),
                top.description
            ),
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            generated_at,
            threat_level,
            total_score,
            threats,
            summary,
        }
    }
}

// ============================================
// Whitelist
// ============================================

const BUILTIN_WHITELIST: &[&str] = &[
    "com.google.android.marvin.talkback",
    "com.google.android.accessibility.soundamplifier",
    "com.google.audio.hearing.visualization.accessibility.scribe",
    "com.android.switchaccess",
];

const WHITELISTED_PREFIXES: &[&str] = &["com.android.", "com.google.android."];

/// Packages that are never reported for accessibility or permission findings.
#[derive(Debug, Clone)]
pub struct Whitelist {
    self_package: String,
    extra: Vec<String>,
}

impl Whitelist {
    pub fn new(self_package: &str, extra: &[String]) -> Self {
        Self {
            self_package: self_package.to_string(),
            extra: extra.to_vec(),
        }
    }

    pub fn is_self(&self, package: &str) -> bool {
        package == self.self_package
    }

    pub fn contains(&self, package: &str) -> bool {
        self.is_self(package)
            || BUILTIN_WHITELIST.contains(&package)
            || self.extra.iter().any(|p| p == package)
            || WHITELISTED_PREFIXES.iter().any(|prefix| package.starts_with(prefix))
    }
}

// ============================================
// Detectors and analyzer
// ============================================

/// An independent heuristic check.
pub trait Detector: Send + Sync {
    /// Unique name, `security.<check>`.
    fn name(&self) -> &str;

    fn detect(
        &self,
        device: &dyn DeviceInventory,
        whitelist: &Whitelist,
    ) -> Result<Vec<DetectedThreat>>;
}

/// Runs registered detectors and aggregates their findings.
pub struct ThreatAnalyzer {
    detectors: Vec<Box<dyn Detector>>,
    whitelist: Whitelist,
    clock: Arc<dyn Clock>,
}

impl ThreatAnalyzer {
    pub fn new(whitelist: Whitelist) -> Self {
        Self {
            detectors: Vec::new(),
            whitelist,
            clock: Arc::new(SystemClock),
        }
    }

    /// Stamp reports with `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn register(&mut self, detector: Box<dyn Detector>) {
        tracing::info!(detector = detector.name(), "Registered security detector");
        self.detectors.push(detector);
    }

    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub fn has_detector(&self, name: &str) -> bool {
        self.detectors.iter().any(|d| d.name() == name)
    }

    /// Run every detector. Failed detectors are logged and skipped.
    pub fn analyze(&self, device: &dyn DeviceInventory) -> SecurityReport {
        let mut threats = Vec::new();
        for detector in &self.detectors {
            match detector.detect(device, &self.whitelist) {
                Ok(found) => {
                    tracing::debug!(
                        detector = detector.name(),
                        findings = found.len(),
                        "Detector finished"
                    );
                    threats.extend(found);
                }
                Err(e) => {
                    let err = Error::Detector {
                        detector: detector.name().to_string(),
                        message: e.to_string(),
                    };
                    tracing::warn!(error = %err, "Security detector failed, skipping");
                }
            }
        }

        let report = SecurityReport::from_threats(threats, self.clock.now_utc());
        tracing::info!(
            level = %report.threat_level,
            score = report.total_score,
            findings = report.threats.len(),
            "Security scan complete"
        );
        report
    }
}

/// Analyzer with the five standard detectors, plus the two extended ones when
/// `security.extended_checks` is on.
pub fn create_default_analyzer(config: &SecurityConfig, self_package: &str) -> ThreatAnalyzer {
    let mut analyzer = ThreatAnalyzer::new(Whitelist::new(self_package, &config.whitelist));
    analyzer.register(Box::new(detectors::AccessibilityDetector));
    analyzer.register(Box::new(detectors::PermissionComboDetector));
    analyzer.register(Box::new(detectors::OverlayDetector));
    analyzer.register(Box::new(detectors::MicUsageDetector));
    analyzer.register(Box::new(detectors::SideloadDetector));
    if config.extended_checks {
        analyzer.register(Box::new(detectors::SystemSettingsDetector));
        analyzer.register(Box::new(detectors::PersistentServiceDetector));
    }
    analyzer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use snapshot::{
        AccessibilityService, RecordingSession, PERM_RECORD_AUDIO, PERM_SYSTEM_ALERT_WINDOW,
    };

    const SELF: &str = "com.kavi.mobile";

    fn app(package: &str, permissions: &[&str]) -> InstalledApp {
        InstalledApp {
            package_name: package.to_string(),
            app_name: package.to_string(),
            is_system: false,
            installer: Some("com.android.vending".to_string()),
            requested_permissions: permissions.iter().map(|p| p.to_string()).collect(),
            overlay_granted: None,
        }
    }

    fn threat(score: u32) -> DetectedThreat {
        DetectedThreat {
            threat_type: ThreatType::SideloadedApp,
            severity: Severity::Info,
            description: format!("score {}", score),
            package_name: None,
            score,
        }
    }

    struct Failing;

    impl Detector for Failing {
        fn name(&self) -> &str {
            "test.failing"
        }

        fn detect(&self, _: &dyn DeviceInventory, _: &Whitelist) -> Result<Vec<DetectedThreat>> {
            Err(Error::Platform("boom".to_string()))
        }
    }

    struct Fixed(Vec<u32>);

    impl Detector for Fixed {
        fn name(&self) -> &str {
            "test.fixed"
        }

        fn detect(&self, _: &dyn DeviceInventory, _: &Whitelist) -> Result<Vec<DetectedThreat>> {
            Ok(self.0.iter().map(|s| threat(*s)).collect())
        }
    }

    #[test]
    fn test_level_boundaries() {
        let cases = [
            (0, ThreatLevel::Safe),
            (1, ThreatLevel::Low),
            (19, ThreatLevel::Low),
            (20, ThreatLevel::Medium),
            (39, ThreatLevel::Medium),
            (40, ThreatLevel::High),
            (59, ThreatLevel::High),
            (60, ThreatLevel::Critical),
            (500, ThreatLevel::Critical),
        ];
        for (score, level) in cases {
            assert_eq!(ThreatLevel::from_score(score), level, "score {}", score);
        }
    }

    #[test]
    fn test_level_round_trips_through_str() {
        assert_eq!("medium".parse::<ThreatLevel>().unwrap(), ThreatLevel::Medium);
        assert_eq!(ThreatLevel::Critical.to_string(), "CRITICAL");
        assert!("severe".parse::<ThreatLevel>().is_err());
    }

    #[test]
    fn test_report_sorted_and_summed() {
        let report = SecurityReport::from_threats(vec![threat(10), threat(40), threat(15)], Utc::now());
        let scores: Vec<u32> = report.threats.iter().map(|t| t.score).collect();
        assert_eq!(scores, vec![40, 15, 10]);
        assert_eq!(report.total_score, 65);
        assert_eq!(report.threat_level, ThreatLevel::Critical);
        assert_eq!(
            report.summary,
            "Threat Level: CRITICAL. Found 3 issues. Top concern: score 40"
        );
    }

    #[test]
    fn test_empty_report_is_safe() {
        let report = SecurityReport::from_threats(vec![], Utc::now());
        assert_eq!(report.threat_level, ThreatLevel::Safe);
        assert_eq!(report.summary, "Device is secure.");
    }

    #[test]
    fn test_failing_detector_does_not_abort_scan() {
        let mut analyzer = ThreatAnalyzer::new(Whitelist::new(SELF, &[]));
        analyzer.register(Box::new(Fixed(vec![20])));
        analyzer.register(Box::new(Failing));
        analyzer.register(Box::new(Fixed(vec![10])));

        let report = analyzer.analyze(&DeviceSnapshot::empty());
        assert_eq!(report.total_score, 30);
        assert_eq!(report.threat_level, ThreatLevel::Medium);
    }

    #[test]
    fn test_report_stamped_with_injected_clock() {
        let clock = Arc::new(ManualClock::at(2025, 6, 3, 14, 5));
        let analyzer = ThreatAnalyzer::new(Whitelist::new(SELF, &[])).with_clock(clock);

        let report = analyzer.analyze(&DeviceSnapshot::empty());
        assert_eq!(
            report.generated_at,
            Utc.with_ymd_and_hms(2025, 6, 3, 14, 5, 0).unwrap()
        );
    }

    #[test]
    fn test_detector_order_does_not_change_totals() {
        let mut forward = ThreatAnalyzer::new(Whitelist::new(SELF, &[]));
        forward.register(Box::new(Fixed(vec![40])));
        forward.register(Box::new(Fixed(vec![15, 10])));

        let mut backward = ThreatAnalyzer::new(Whitelist::new(SELF, &[]));
        backward.register(Box::new(Fixed(vec![15, 10])));
        backward.register(Box::new(Fixed(vec![40])));

        let device = DeviceSnapshot::empty();
        let a = forward.analyze(&device);
        let b = backward.analyze(&device);
        assert_eq!(a.total_score, b.total_score);
        assert_eq!(a.threat_level, b.threat_level);
        assert_eq!(a.threats, b.threats);
    }

    #[test]
    fn test_whitelist() {
        let whitelist = Whitelist::new(SELF, &["org.example.trusted".to_string()]);
        assert!(whitelist.contains(SELF));
        assert!(whitelist.contains("com.google.android.marvin.talkback"));
        assert!(whitelist.contains("com.google.audio.hearing.visualization.accessibility.scribe"));
        assert!(whitelist.contains("com.android.anything"));
        assert!(whitelist.contains("org.example.trusted"));
        assert!(!whitelist.contains("com.googlex.fake"));
        assert!(!whitelist.contains("com.example.spy"));
    }

    #[test]
    fn test_default_analyzer_detectors() {
        let config = SecurityConfig::default();
        let analyzer = create_default_analyzer(&config, SELF);
        assert_eq!(analyzer.detector_names().len(), 5);
        assert!(!analyzer.has_detector("security.system_settings"));

        let extended = SecurityConfig {
            extended_checks: true,
            ..Default::default()
        };
        let analyzer = create_default_analyzer(&extended, SELF);
        assert_eq!(analyzer.detector_names().len(), 7);
        assert!(analyzer.has_detector("security.persistent_service"));
    }

    #[test]
    fn test_audio_overlay_app_counted_once() {
        let mut device = DeviceSnapshot::empty();
        device.installed_apps = Some(vec![app(
            "com.example.spy",
            &[PERM_RECORD_AUDIO, PERM_SYSTEM_ALERT_WINDOW],
        )]);

        let analyzer = create_default_analyzer(&SecurityConfig::default(), SELF);
        let report = analyzer.analyze(&device);

        assert_eq!(report.threats.len(), 1);
        assert_eq!(report.threats[0].threat_type, ThreatType::SpywarePermissionCombo);
        assert_eq!(report.threats[0].severity, Severity::Dangerous);
        assert_eq!(report.total_score, 30);
        assert_eq!(report.threat_level, ThreatLevel::Medium);
    }

    #[test]
    fn test_full_scan_mixture() {
        let mut device = DeviceSnapshot::empty();
        let mut sideloaded = app("com.example.game", &[]);
        sideloaded.installer = None;
        device.installed_apps = Some(vec![sideloaded, app("com.example.notes", &[])]);
        device.accessibility_services = Some(vec![
            AccessibilityService {
                package_name: "com.example.keylogger".to_string(),
                service_name: Some("KeyService".to_string()),
            },
            AccessibilityService {
                package_name: "com.google.android.marvin.talkback".to_string(),
                service_name: Some("TalkBack".to_string()),
            },
        ]);
        device.active_recordings = Some(vec![RecordingSession {
            client_uid: 10123,
            audio_source: 1,
            package_name: None,
        }]);

        let analyzer = create_default_analyzer(&SecurityConfig::default(), SELF);
        let report = analyzer.analyze(&device);

        let types: Vec<ThreatType> = report.threats.iter().map(|t| t.threat_type).collect();
        assert_eq!(
            types,
            vec![
                ThreatType::AccessibilityAbuse,
                ThreatType::MicUsage,
                ThreatType::SideloadedApp
            ]
        );
        assert_eq!(report.total_score, 65);
        assert_eq!(report.threat_level, ThreatLevel::Critical);
    }
}
