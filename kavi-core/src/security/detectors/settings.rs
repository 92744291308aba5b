use crate::error::Result;
use crate::security::snapshot::DeviceInventory;
use crate::security::{DetectedThreat, Detector, Severity, ThreatType, Whitelist};

/// Flags system settings that weaken the device: USB debugging and installs
/// from unknown sources.
pub struct SystemSettingsDetector;

impl Detector for SystemSettingsDetector {
    fn name(&self) -> &str {
        "security.system_settings"
    }

    fn detect(
        &self,
        device: &dyn DeviceInventory,
        _whitelist: &Whitelist,
    ) -> Result<Vec<DetectedThreat>> {
        let settings = device.security_settings()?;
        let mut threats = Vec::new();

        if settings.usb_debugging {
            threats.push(DetectedThreat {
                threat_type: ThreatType::UnsafeSystemSetting,
                severity: Severity::Warning,
                description: "USB Debugging is enabled. This exposes your device to external attacks via USB.".to_string(),
                package_name: None,
                score: 15,
            });
        }
        if settings.unknown_sources {
            threats.push(DetectedThreat {
                threat_type: ThreatType::UnsafeSystemSetting,
                severity: Severity::Dangerous,
                description: "Installation from Unknown Sources is enabled. This allows malicious apps to be installed.".to_string(),
                package_name: None,
                score: 20,
            });
        }
        Ok(threats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::detectors::test_support::SELF;
    use crate::security::snapshot::{DeviceSnapshot, SecuritySettings};

    #[test]
    fn test_unsafe_settings() {
        let mut device = DeviceSnapshot::empty();
        let whitelist = Whitelist::new(SELF, &[]);
        assert!(SystemSettingsDetector.detect(&device, &whitelist).unwrap().is_empty());

        device.security_settings = Some(SecuritySettings {
            usb_debugging: true,
            unknown_sources: true,
        });
        let threats = SystemSettingsDetector.detect(&device, &whitelist).unwrap();
        assert_eq!(threats.len(), 2);
        assert_eq!((threats[0].severity, threats[0].score), (Severity::Warning, 15));
        assert_eq!((threats[1].severity, threats[1].score), (Severity::Dangerous, 20));
    }
}
