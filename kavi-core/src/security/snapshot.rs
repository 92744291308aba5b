//! Device inventory
//!
//! Detectors read the device through [`DeviceInventory`]. The host answers it
//! live; [`DeviceSnapshot`] answers it from a captured JSON document, which is
//! what `kavi-scan` and the tests use. Sections missing from a snapshot fail
//! only the detectors that need them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const PERM_RECORD_AUDIO: &str = "android.permission.RECORD_AUDIO";
pub const PERM_CAMERA: &str = "android.permission.CAMERA";
pub const PERM_FINE_LOCATION: &str = "android.permission.ACCESS_FINE_LOCATION";
pub const PERM_SYSTEM_ALERT_WINDOW: &str = "android.permission.SYSTEM_ALERT_WINDOW";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledApp {
    pub package_name: String,
    /// User-visible label
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub is_system: bool,
    /// Package id of the installer, `None` when unknown
    #[serde(default)]
    pub installer: Option<String>,
    #[serde(default)]
    pub requested_permissions: Vec<String>,
    /// Whether drawing over other apps is currently allowed. Falls back to the
    /// requested permission when not captured.
    #[serde(default)]
    pub overlay_granted: Option<bool>,
}

impl InstalledApp {
    pub fn requests(&self, permission: &str) -> bool {
        self.requested_permissions.iter().any(|p| p == permission)
    }

    pub fn can_draw_overlays(&self) -> bool {
        self.overlay_granted
            .unwrap_or_else(|| self.requests(PERM_SYSTEM_ALERT_WINDOW))
    }

    /// Label for messages, the package name when the label is empty.
    pub fn label(&self) -> &str {
        if self.app_name.is_empty() {
            &self.package_name
        } else {
            &self.app_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibilityService {
    pub package_name: String,
    #[serde(default)]
    pub service_name: Option<String>,
}

/// An active audio capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSession {
    pub client_uid: u32,
    pub audio_source: i32,
    #[serde(default)]
    pub package_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuritySettings {
    #[serde(default)]
    pub usb_debugging: bool,
    #[serde(default)]
    pub unknown_sources: bool,
}

/// Read access to the device state the detectors inspect.
pub trait DeviceInventory: Send + Sync {
    fn installed_apps(&self) -> Result<Vec<InstalledApp>>;

    /// Enabled accessibility services
    fn accessibility_services(&self) -> Result<Vec<AccessibilityService>>;

    fn active_recordings(&self) -> Result<Vec<RecordingSession>>;

    fn security_settings(&self) -> Result<SecuritySettings>;

    /// Packages currently running a foreground service
    fn foreground_services(&self) -> Result<Vec<String>>;
}

/// A captured device state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    #[serde(default)]
    pub installed_apps: Option<Vec<InstalledApp>>,
    #[serde(default)]
    pub accessibility_services: Option<Vec<AccessibilityService>>,
    #[serde(default)]
    pub active_recordings: Option<Vec<RecordingSession>>,
    #[serde(default)]
    pub security_settings: Option<SecuritySettings>,
    #[serde(default)]
    pub foreground_services: Option<Vec<String>>,
}

impl DeviceSnapshot {
    /// A snapshot where every section is present and empty.
    pub fn empty() -> Self {
        Self {
            installed_apps: Some(Vec::new()),
            accessibility_services: Some(Vec::new()),
            active_recordings: Some(Vec::new()),
            security_settings: Some(SecuritySettings::default()),
            foreground_services: Some(Vec::new()),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

fn section<T: Clone>(value: &Option<T>, name: &str) -> Result<T> {
    value
        .clone()
        .ok_or_else(|| Error::Platform(format!("{} not captured in snapshot", name)))
}

impl DeviceInventory for DeviceSnapshot {
    fn installed_apps(&self) -> Result<Vec<InstalledApp>> {
        section(&self.installed_apps, "installed_apps")
    }

    fn accessibility_services(&self) -> Result<Vec<AccessibilityService>> {
        section(&self.accessibility_services, "accessibility_services")
    }

    fn active_recordings(&self) -> Result<Vec<RecordingSession>> {
        section(&self.active_recordings, "active_recordings")
    }

    fn security_settings(&self) -> Result<SecuritySettings> {
        section(&self.security_settings, "security_settings")
    }

    fn foreground_services(&self) -> Result<Vec<String>> {
        section(&self.foreground_services, "foreground_services")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_snapshot() {
        let snapshot = DeviceSnapshot::from_json(
            r#"{
                "installed_apps": [
                    {"package_name": "com.example.a", "requested_permissions": ["android.permission.SYSTEM_ALERT_WINDOW"]}
                ]
            }"#,
        )
        .unwrap();

        let apps = snapshot.installed_apps().unwrap();
        assert_eq!(apps.len(), 1);
        assert!(apps[0].can_draw_overlays());
        assert_eq!(apps[0].label(), "com.example.a");
        assert!(!apps[0].is_system);

        assert!(matches!(
            snapshot.accessibility_services(),
            Err(Error::Platform(_))
        ));
    }

    #[test]
    fn test_overlay_grant_overrides_request() {
        let app = InstalledApp {
            package_name: "com.example.b".to_string(),
            app_name: "B".to_string(),
            is_system: false,
            installer: None,
            requested_permissions: vec![PERM_SYSTEM_ALERT_WINDOW.to_string()],
            overlay_granted: Some(false),
        };
        assert!(!app.can_draw_overlays());
        assert_eq!(app.label(), "B");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, r#"{"security_settings": {"usb_debugging": true}}"#).unwrap();

        let snapshot = DeviceSnapshot::load(&path).unwrap();
        assert!(snapshot.security_settings().unwrap().usb_debugging);
        assert!(DeviceSnapshot::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_empty_snapshot_has_every_section() {
        let snapshot = DeviceSnapshot::empty();
        assert!(snapshot.installed_apps().unwrap().is_empty());
        assert!(snapshot.foreground_services().unwrap().is_empty());
        assert_eq!(snapshot.security_settings().unwrap(), SecuritySettings::default());
    }
}
