//! Built-in security detectors
//!
//! The first five run on every scan. `system_settings` and
//! `persistent_service` are registered only with `security.extended_checks`.

mod accessibility;
mod background;
mod mic;
mod overlay;
mod permissions;
mod settings;
mod sideload;

pub use accessibility::AccessibilityDetector;
pub use background::PersistentServiceDetector;
pub use mic::MicUsageDetector;
pub use overlay::OverlayDetector;
pub use permissions::{spyware_combos, PermissionComboDetector};
pub use settings::SystemSettingsDetector;
pub use sideload::{is_trusted_installer, SideloadDetector};

#[cfg(test)]
pub(crate) mod test_support {
    use super::super::snapshot::InstalledApp;

    pub const SELF: &str = "com.kavi.mobile";

    pub fn app(package: &str, permissions: &[&str]) -> InstalledApp {
        InstalledApp {
            package_name: package.to_string(),
            app_name: package.to_string(),
            is_system: false,
            installer: Some("com.android.vending".to_string()),
            requested_permissions: permissions.iter().map(|p| p.to_string()).collect(),
            overlay_granted: None,
        }
    }
}
