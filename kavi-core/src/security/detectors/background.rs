use crate::error::Result;
use crate::security::snapshot::DeviceInventory;
use crate::security::{DetectedThreat, Detector, Severity, ThreatType, Whitelist};
use std::collections::HashSet;

const SCORE: u32 = 5;

/// Notes non-system apps keeping a foreground service alive.
pub struct PersistentServiceDetector;

impl Detector for PersistentServiceDetector {
    fn name(&self) -> &str {
        "security.persistent_service"
    }

    fn detect(
        &self,
        device: &dyn DeviceInventory,
        whitelist: &Whitelist,
    ) -> Result<Vec<DetectedThreat>> {
        let system: HashSet<String> = device
            .installed_apps()?
            .into_iter()
            .filter(|app| app.is_system)
            .map(|app| app.package_name)
            .collect();

        let mut seen = HashSet::new();
        let threats = device
            .foreground_services()?
            .into_iter()
            .filter(|package| !whitelist.is_self(package) && !system.contains(package))
            .filter(|package| seen.insert(package.clone()))
            .map(|package| DetectedThreat {
                threat_type: ThreatType::PersistentService,
                severity: Severity::Info,
                description: format!("App '{}' keeps a persistent background service running.", package),
                package_name: Some(package),
                score: SCORE,
            })
            .collect();
        Ok(threats)
    }
}
