use crate::error::Result;
use crate::security::snapshot::{
    DeviceInventory, InstalledApp, PERM_CAMERA, PERM_FINE_LOCATION, PERM_RECORD_AUDIO,
    PERM_SYSTEM_ALERT_WINDOW,
};
use crate::security::{DetectedThreat, Detector, Severity, ThreatType, Whitelist};

const SCORE: u32 = 30;

/// Spyware-shaped permission combinations requested by `app`, as descriptions.
/// One app can match both.
pub fn spyware_combos(app: &InstalledApp) -> Vec<&'static str> {
    let mic = app.requests(PERM_RECORD_AUDIO);
    let mut combos = Vec::new();
    if mic && app.requests(PERM_SYSTEM_ALERT_WINDOW) {
        combos.push("High Risk: Can record audio and draw over other apps.");
    }
    if mic && app.requests(PERM_CAMERA) && app.requests(PERM_FINE_LOCATION) {
        combos.push("High Risk: Full surveillance access (Mic, Camera, Location).");
    }
    combos
}

/// Flags non-system apps requesting spyware-shaped permission sets.
pub struct PermissionComboDetector;

impl Detector for PermissionComboDetector {
    fn name(&self) -> &str {
        "security.permission_combo"
    }

    fn detect(
        &self,
        device: &dyn DeviceInventory,
        whitelist: &Whitelist,
    ) -> Result<Vec<DetectedThreat>> {
        let mut threats = Vec::new();
        for app in device.installed_apps()? {
            if app.is_system || whitelist.contains(&app.package_name) {
                continue;
            }
            for description in spyware_combos(&app) {
                threats.push(DetectedThreat {
                    threat_type: ThreatType::SpywarePermissionCombo,
                    severity: Severity::Dangerous,
                    description: description.to_string(),
                    package_name: Some(app.package_name.clone()),
                    score: SCORE,
                });
            }
        }
        Ok(threats)
    }
}
