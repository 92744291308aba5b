//! Platform collaborators
//!
//! The dispatcher never touches the device itself. Every effect goes through
//! one of these narrow traits, implemented by the host (a phone shell, the
//! console in the `kavi` binary through [`SimulatedDevice`], or tests).

mod simulated;

pub use simulated::SimulatedDevice;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================
// App launching
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    Launched,
    NotFound,
}

pub trait AppLauncher: Send + Sync {
    /// Launch an app by its spoken name. `package` is the well-known package
    /// id when the name is in the alias table.
    fn launch(&self, app_name: &str, package: Option<&str>) -> LaunchOutcome;
}

/// Spoken app names with a well-known package id.
const KNOWN_APPS: &[(&str, &str)] = &[
    ("instagram", "com.instagram.android"),
    ("whatsapp", "com.whatsapp"),
    ("facebook", "com.facebook.katana"),
    ("messenger", "com.facebook.orca"),
    ("twitter", "com.twitter.android"),
    ("youtube", "com.google.android.youtube"),
    ("chrome", "com.android.chrome"),
    ("gmail", "com.google.android.gm"),
    ("maps", "com.google.android.apps.maps"),
    ("camera", "com.android.camera"),
    ("gallery", "com.google.android.apps.photos"),
    ("photos", "com.google.android.apps.photos"),
    ("settings", "com.android.settings"),
    ("calculator", "com.android.calculator2"),
    ("calendar", "com.google.android.calendar"),
    ("contacts", "com.android.contacts"),
    ("phone", "com.android.dialer"),
    ("messages", "com.google.android.apps.messaging"),
    ("play store", "com.android.vending"),
    ("spotify", "com.spotify.music"),
    ("netflix", "com.netflix.mediaclient"),
    ("amazon", "com.amazon.mShop.android.shopping"),
    ("telegram", "org.telegram.messenger"),
    ("snapchat", "com.snapchat.android"),
    ("tiktok", "com.zhiliaoapp.musically"),
    ("linkedin", "com.linkedin.android"),
];

/// Package id for a spoken app name, if it is a well-known app.
pub fn known_package(app_name: &str) -> Option<&'static str> {
    let normalized = app_name.trim().to_lowercase();
    KNOWN_APPS
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, package)| *package)
}

// ============================================
// Telephony
// ============================================

pub trait Telephony: Send + Sync {
    /// Call a contact by name or a raw number.
    fn call(&self, contact: &str) -> Result<()>;

    fn send_message(&self, contact: &str, message: &str) -> Result<()>;
}

// ============================================
// System settings
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    SilentMode(bool),
    VibrateMode(bool),
    /// Percent, 0-100
    Volume(u32),
    /// Percent, 0-100
    Brightness(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingOutcome {
    Success,
    PermissionDenied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsScreen {
    Wifi,
    Bluetooth,
    AirplaneMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryStatus {
    pub level: u32,
    pub charging: bool,
}

pub trait SystemSettings: Send + Sync {
    fn apply(&self, setting: Setting) -> SettingOutcome;

    fn open_screen(&self, screen: SettingsScreen);

    fn battery(&self) -> BatteryStatus;
}

// ============================================
// Screen automation
// ============================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gesture {
    CloseApp,
    RecentApps,
    Back,
    ScrollDown,
    ScrollUp,
    Screenshot,
    Click(String),
}

/// The accessibility surface: gestures and screen queries.
pub trait Automation: Send + Sync {
    /// Whether the automation service is enabled at all.
    fn is_available(&self) -> bool;

    /// Perform a gesture, `false` when it could not be carried out.
    fn perform(&self, gesture: &Gesture) -> bool;

    fn last_notification(&self) -> Option<String>;

    /// Visible text, one node per line.
    fn screen_text(&self) -> String;
}

// ============================================
// Device intents
// ============================================

/// Hand-offs to other apps on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAction {
    Camera,
    VideoCamera,
    Navigate(String),
    SetAlarm(String),
    SetReminder(String),
    PlayMusic(String),
    WebSearch(String),
}

impl DeviceAction {
    /// Message shown when the hand-off fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            DeviceAction::Camera | DeviceAction::VideoCamera => "Could not open camera",
            DeviceAction::Navigate(_) => "Could not open maps",
            DeviceAction::SetAlarm(_) => "Could not set alarm",
            DeviceAction::SetReminder(_) => "Could not set reminder",
            DeviceAction::PlayMusic(_) => "Could not play music",
            DeviceAction::WebSearch(_) => "Could not search",
        }
    }
}

pub trait DeviceIntents: Send + Sync {
    fn start(&self, action: &DeviceAction) -> Result<()>;
}

// ============================================
// Weather
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Degrees Celsius
    pub temperature: f64,
    pub feels_like: f64,
    pub description: String,
    /// Percent
    pub humidity: u32,
    /// Meters per second
    pub wind_speed: f64,
    pub city: String,
}

impl WeatherReport {
    /// Spoken form of the report.
    pub fn spoken(&self) -> String {
        let temp = self.temperature as i64;
        let feels_like = self.feels_like as i64;

        let mut text = format!(
            "The weather in {} is {}. Temperature is {} degrees Celsius",
            self.city, self.description, temp
        );
        if (temp - feels_like).abs() > 3 {
            text.push_str(&format!(", but feels like {} degrees", feels_like));
        }
        text.push_str(&format!(". Humidity is {} percent", self.humidity));
        if self.wind_speed > 5.0 {
            text.push_str(&format!(
                " with wind speed of {} meters per second",
                self.wind_speed as i64
            ));
        }
        text.push('.');
        text
    }
}

pub trait WeatherProvider: Send + Sync {
    /// Current conditions, `Ok(None)` when the provider has nothing.
    fn current(&self) -> Result<Option<WeatherReport>>;
}

// ============================================
// Bundle
// ============================================

/// Every collaborator the dispatcher talks to.
#[derive(Clone)]
pub struct Platform {
    pub apps: Arc<dyn AppLauncher>,
    pub telephony: Arc<dyn Telephony>,
    pub settings: Arc<dyn SystemSettings>,
    pub automation: Arc<dyn Automation>,
    pub intents: Arc<dyn DeviceIntents>,
    pub weather: Arc<dyn WeatherProvider>,
}

impl Platform {
    /// All roles played by one device object.
    pub fn single<D>(device: Arc<D>) -> Self
    where
        D: AppLauncher
            + Telephony
            + SystemSettings
            + Automation
            + DeviceIntents
            + WeatherProvider
            + 'static,
    {
        Self {
            apps: device.clone(),
            telephony: device.clone(),
            settings: device.clone(),
            automation: device.clone(),
            intents: device.clone(),
            weather: device,
        }
    }
}
