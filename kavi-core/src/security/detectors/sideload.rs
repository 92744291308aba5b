use crate::error::Result;
use crate::security::snapshot::DeviceInventory;
use crate::security::{DetectedThreat, Detector, Severity, ThreatType, Whitelist};

const SCORE: u32 = 10;

const TRUSTED_INSTALLERS: &[&str] = &[
    "com.android.vending",
    "com.google.android.packageinstaller",
    "com.amazon.venezia",
];

pub fn is_trusted_installer(installer: Option<&str>) -> bool {
    installer.is_some_and(|i| TRUSTED_INSTALLERS.contains(&i))
}

/// Flags non-system apps installed from outside a known store. Every such app
/// counts.
pub struct SideloadDetector;

impl Detector for SideloadDetector {
    fn name(&self) -> &str {
        "security.sideload"
    }

    fn detect(
        &self,
        device: &dyn DeviceInventory,
        whitelist: &Whitelist,
    ) -> Result<Vec<DetectedThreat>> {
        let threats = device
            .installed_apps()?
            .into_iter()
            .filter(|app| !app.is_system && !whitelist.is_self(&app.package_name))
            .filter(|app| !is_trusted_installer(app.installer.as_deref()))
            .map(|app| DetectedThreat {
                threat_type: ThreatType::SideloadedApp,
                severity: Severity::Info,
                description: format!(
                    "App '{}' was installed from an unknown source.",
                    app.label()
                ),
                package_name: Some(app.package_name.clone()),
                score: SCORE,
            })
            .collect();
        Ok(threats)
    }
}
