//! A device that only records what it was asked to do.
//!
//! Stands in for the phone in the console binary and in tests. Every effect is
//! appended to a log as a short line such as `launch instagram
//! (com.instagram.android)`; answers to queries come from settable state.

use super::{
    known_package, AppLauncher, Automation, BatteryStatus, DeviceAction, DeviceIntents, Gesture,
    LaunchOutcome, Setting, SettingOutcome, SettingsScreen, SystemSettings, Telephony,
    WeatherProvider, WeatherReport,
};
use crate::error::{Error, Result};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct DeviceState {
    /// Launchable apps besides the well-known ones; `None` launches anything
    installed_apps: Option<Vec<String>>,
    automation_available: bool,
    settings_permitted: bool,
    intents_available: bool,
    battery: BatteryStatus,
    weather: Option<WeatherReport>,
    weather_fails: bool,
    last_notification: Option<String>,
    screen_text: String,
    clickable: Vec<String>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            installed_apps: None,
            automation_available: true,
            settings_permitted: true,
            intents_available: true,
            battery: BatteryStatus {
                level: 80,
                charging: false,
            },
            weather: None,
            weather_fails: false,
            last_notification: None,
            screen_text: String::new(),
            clickable: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SimulatedDevice {
    state: Mutex<DeviceState>,
    effects: Mutex<Vec<String>>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================
    // Effect log
    // ============================================

    fn record(&self, effect: String) {
        tracing::debug!(effect = %effect, "Simulated device effect");
        self.effects.lock().unwrap().push(effect);
    }

    pub fn effects(&self) -> Vec<String> {
        self.effects.lock().unwrap().clone()
    }

    /// Return and clear the effect log.
    pub fn take_effects(&self) -> Vec<String> {
        std::mem::take(&mut *self.effects.lock().unwrap())
    }

    // ============================================
    // State setters
    // ============================================

    /// Restrict launchable apps to the well-known ones plus `apps`.
    pub fn set_installed_apps(&self, apps: &[&str]) {
        self.state.lock().unwrap().installed_apps =
            Some(apps.iter().map(|a| a.to_lowercase()).collect());
    }

    pub fn set_automation_available(&self, available: bool) {
        self.state.lock().unwrap().automation_available = available;
    }

    pub fn set_settings_permitted(&self, permitted: bool) {
        self.state.lock().unwrap().settings_permitted = permitted;
    }

    pub fn set_intents_available(&self, available: bool) {
        self.state.lock().unwrap().intents_available = available;
    }

    pub fn set_battery(&self, level: u32, charging: bool) {
        self.state.lock().unwrap().battery = BatteryStatus { level, charging };
    }

    pub fn set_weather(&self, weather: Option<WeatherReport>) {
        self.state.lock().unwrap().weather = weather;
    }

    pub fn set_weather_fails(&self, fails: bool) {
        self.state.lock().unwrap().weather_fails = fails;
    }

    pub fn set_last_notification(&self, notification: Option<&str>) {
        self.state.lock().unwrap().last_notification = notification.map(str::to_string);
    }

    pub fn set_screen_text(&self, text: &str) {
        self.state.lock().unwrap().screen_text = text.to_string();
    }

    /// Button labels a click can find.
    pub fn set_clickable(&self, labels: &[&str]) {
        self.state.lock().unwrap().clickable = labels.iter().map(|l| l.to_lowercase()).collect();
    }
}

impl AppLauncher for SimulatedDevice {
    fn launch(&self, app_name: &str, package: Option<&str>) -> LaunchOutcome {
        let normalized = app_name.trim().to_lowercase();
        let installed = {
            let state = self.state.lock().unwrap();
            match &state.installed_apps {
                None => true,
                Some(apps) => known_package(&normalized).is_some() || apps.contains(&normalized),
            }
        };
        if !installed {
            self.record(format!("launch {} failed: not installed", normalized));
            return LaunchOutcome::NotFound;
        }
        match package {
            Some(package) => self.record(format!("launch {} ({})", normalized, package)),
            None => self.record(format!("launch {}", normalized)),
        }
        LaunchOutcome::Launched
    }
}

impl Telephony for SimulatedDevice {
    fn call(&self, contact: &str) -> Result<()> {
        self.record(format!("call {}", contact));
        Ok(())
    }

    fn send_message(&self, contact: &str, message: &str) -> Result<()> {
        self.record(format!("message {}: {}", contact, message));
        Ok(())
    }
}

impl SystemSettings for SimulatedDevice {
    fn apply(&self, setting: Setting) -> SettingOutcome {
        if !self.state.lock().unwrap().settings_permitted {
            self.record(format!("setting {:?} denied", setting));
            return SettingOutcome::PermissionDenied;
        }
        let effect = match setting {
            Setting::SilentMode(on) => format!("silent_mode={}", on),
            Setting::VibrateMode(on) => format!("vibrate_mode={}", on),
            Setting::Volume(level) => format!("volume={}", level),
            Setting::Brightness(level) => format!("brightness={}", level),
        };
        self.record(format!("setting {}", effect));
        SettingOutcome::Success
    }

    fn open_screen(&self, screen: SettingsScreen) {
        let name = match screen {
            SettingsScreen::Wifi => "wifi",
            SettingsScreen::Bluetooth => "bluetooth",
            SettingsScreen::AirplaneMode => "airplane_mode",
        };
        self.record(format!("open settings {}", name));
    }

    fn battery(&self) -> BatteryStatus {
        self.state.lock().unwrap().battery
    }
}

impl Automation for SimulatedDevice {
    fn is_available(&self) -> bool {
        self.state.lock().unwrap().automation_available
    }

    fn perform(&self, gesture: &Gesture) -> bool {
        let ok = match gesture {
            Gesture::Click(label) => self
                .state
                .lock()
                .unwrap()
                .clickable
                .contains(&label.to_lowercase()),
            _ => true,
        };
        self.record(format!("gesture {:?}{}", gesture, if ok { "" } else { " failed" }));
        ok
    }

    fn last_notification(&self) -> Option<String> {
        self.state.lock().unwrap().last_notification.clone()
    }

    fn screen_text(&self) -> String {
        self.state.lock().unwrap().screen_text.clone()
    }
}

impl DeviceIntents for SimulatedDevice {
    fn start(&self, action: &DeviceAction) -> Result<()> {
        if !self.state.lock().unwrap().intents_available {
            self.record(format!("intent {:?} failed", action));
            return Err(Error::Platform(action.failure_message().to_string()));
        }
        let effect = match action {
            DeviceAction::Camera => "camera".to_string(),
            DeviceAction::VideoCamera => "video_camera".to_string(),
            DeviceAction::Navigate(to) => format!("navigate {}", to),
            DeviceAction::SetAlarm(time) => format!("alarm {}", time),
            DeviceAction::SetReminder(what) => format!("reminder {}", what),
            DeviceAction::PlayMusic(query) => format!("play_music {}", query),
            DeviceAction::WebSearch(query) => format!("web_search {}", query),
        };
        self.record(format!("intent {}", effect));
        Ok(())
    }
}

impl WeatherProvider for SimulatedDevice {
    fn current(&self) -> Result<Option<WeatherReport>> {
        let state = self.state.lock().unwrap();
        if state.weather_fails {
            return Err(Error::Platform("weather service unreachable".to_string()));
        }
        Ok(state.weather.clone())
    }
}
