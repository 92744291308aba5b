use super::permissions::spyware_combos;
use crate::error::Result;
use crate::security::snapshot::DeviceInventory;
use crate::security::{DetectedThreat, Detector, Severity, ThreatType, Whitelist};

const SCORE: u32 = 20;

/// Flags non-system apps allowed to draw over other apps.
///
/// Apps already matching a spyware permission combination are left to
/// [`PermissionComboDetector`](super::PermissionComboDetector) so they are not
/// counted twice.
pub struct OverlayDetector;

impl Detector for OverlayDetector {
    fn name(&self) -> &str {
        "security.overlay"
    }

    fn detect(
        &self,
        device: &dyn DeviceInventory,
        whitelist: &Whitelist,
    ) -> Result<Vec<DetectedThreat>> {
        let threats = device
            .installed_apps()?
            .into_iter()
            .filter(|app| !app.is_system && !whitelist.contains(&app.package_name))
            .filter(|app| app.can_draw_overlays() && spyware_combos(app).is_empty())
            .map(|app| DetectedThreat {
                threat_type: ThreatType::OverlayAttack,
                severity: Severity::Warning,
                description: format!("App '{}' can draw over other apps.", app.package_name),
                package_name: Some(app.package_name),
                score: SCORE,
            })
            .collect();
        Ok(threats)
    }
}
