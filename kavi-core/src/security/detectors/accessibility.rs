use crate::error::Result;
use crate::security::snapshot::DeviceInventory;
use crate::security::{DetectedThreat, Detector, Severity, ThreatType, Whitelist};

const SCORE: u32 = 40;

/// Flags enabled accessibility services outside the whitelist. Such a service
/// can read and drive the whole screen.
pub struct AccessibilityDetector;

impl Detector for AccessibilityDetector {
    fn name(&self) -> &str {
        "security.accessibility"
    }

    fn detect(
        &self,
        device: &dyn DeviceInventory,
        whitelist: &Whitelist,
    ) -> Result<Vec<DetectedThreat>> {
        let threats = device
            .accessibility_services()?
            .into_iter()
            .filter(|service| !whitelist.contains(&service.package_name))
            .map(|service| {
                let service_name = service.service_name.as_deref().unwrap_or("Unknown Service");
                DetectedThreat {
                    threat_type: ThreatType::AccessibilityAbuse,
                    severity: Severity::Critical,
                    description: format!(
                        "Unknown app '{}' has full control of your screen via Accessibility.",
                        service_name
                    ),
                    package_name: Some(service.package_name),
                    score: SCORE,
                }
            })
            .collect();
        Ok(threats)
    }
}
