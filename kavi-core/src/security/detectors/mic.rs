use crate::error::Result;
use crate::security::snapshot::DeviceInventory;
use crate::security::{DetectedThreat, Detector, Severity, ThreatType, Whitelist};

const SCORE: u32 = 15;

/// Audio source used by the platform's own hotword capture.
const HOTWORD_AUDIO_SOURCE: i32 = 1999;

/// Flags an active microphone capture. Reports at most one finding.
pub struct MicUsageDetector;

impl Detector for MicUsageDetector {
    fn name(&self) -> &str {
        "security.mic"
    }

    fn detect(
        &self,
        device: &dyn DeviceInventory,
        _whitelist: &Whitelist,
    ) -> Result<Vec<DetectedThreat>> {
        let active = device
            .active_recordings()?
            .into_iter()
            .find(|session| session.audio_source != HOTWORD_AUDIO_SOURCE);

        Ok(active
            .map(|session| {
                let client = session
                    .package_name
                    .unwrap_or_else(|| format!("UID:{}", session.client_uid));
                DetectedThreat {
                    threat_type: ThreatType::MicUsage,
                    severity: Severity::Warning,
                    description: format!("Microphone is currently active by {}.", client),
                    package_name: None,
                    score: SCORE,
                }
            })
            .into_iter()
            .collect())
    }
}
