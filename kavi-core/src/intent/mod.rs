//! Intent classification
//!
//! [`classify`] maps a raw utterance to a [`CommandResult`] by walking an
//! ordered rule table. The first rule whose predicate matches wins, so the
//! order of [`RULES`] is the priority order. Utterances no rule claims become
//! a low-confidence [`Intent::SearchWeb`] with the utterance as the query.
//!
//! The literal stop phrases are checked near the end of the table, after the
//! device and conversational rules. "cancel the alarm" therefore classifies as
//! [`Intent::SetAlarm`], while a bare "cancel" is [`Intent::Stop`].

pub mod extract;

use crate::types::Parameters;
use extract::{contains_any, strip_keywords};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Closed set of things a user can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    // App control
    OpenApp,
    CloseApp,
    SwitchApp,
    GoBack,
    // Communication
    MakeCall,
    SendMessage,
    // Media
    TakePhoto,
    TakeVideo,
    PlayMusic,
    // Navigation and time
    Navigate,
    SetAlarm,
    SetReminder,
    SearchWeb,
    // System control
    SilentMode,
    VibrateMode,
    VolumeControl,
    BrightnessControl,
    WifiSettings,
    BluetoothSettings,
    AirplaneMode,
    // Information
    Weather,
    Time,
    Date,
    BatteryStatus,
    ReadNotifications,
    ReadScreen,
    // Conversational
    CasualChat,
    Question,
    Greeting,
    Thanks,
    // Screen automation
    ClickButton,
    ScrollDown,
    ScrollUp,
    TakeScreenshot,
    SecurityCheck,
    Stop,
    Unknown,
}

impl Intent {
    /// Every intent, in declaration order.
    pub const ALL: [Intent; 37] = [
        Intent::OpenApp,
        Intent::CloseApp,
        Intent::SwitchApp,
        Intent::GoBack,
        Intent::MakeCall,
        Intent::SendMessage,
        Intent::TakePhoto,
        Intent::TakeVideo,
        Intent::PlayMusic,
        Intent::Navigate,
        Intent::SetAlarm,
        Intent::SetReminder,
        Intent::SearchWeb,
        Intent::SilentMode,
        Intent::VibrateMode,
        Intent::VolumeControl,
        Intent::BrightnessControl,
        Intent::WifiSettings,
        Intent::BluetoothSettings,
        Intent::AirplaneMode,
        Intent::Weather,
        Intent::Time,
        Intent::Date,
        Intent::BatteryStatus,
        Intent::ReadNotifications,
        Intent::ReadScreen,
        Intent::CasualChat,
        Intent::Question,
        Intent::Greeting,
        Intent::Thanks,
        Intent::ClickButton,
        Intent::ScrollDown,
        Intent::ScrollUp,
        Intent::TakeScreenshot,
        Intent::SecurityCheck,
        Intent::Stop,
        Intent::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::OpenApp => "OPEN_APP",
            Intent::CloseApp => "CLOSE_APP",
            Intent::SwitchApp => "SWITCH_APP",
            Intent::GoBack => "GO_BACK",
            Intent::MakeCall => "MAKE_CALL",
            Intent::SendMessage => "SEND_MESSAGE",
            Intent::TakePhoto => "TAKE_PHOTO",
            Intent::TakeVideo => "TAKE_VIDEO",
            Intent::PlayMusic => "PLAY_MUSIC",
            Intent::Navigate => "NAVIGATE",
            Intent::SetAlarm => "SET_ALARM",
            Intent::SetReminder => "SET_REMINDER",
            Intent::SearchWeb => "SEARCH_WEB",
            Intent::SilentMode => "SILENT_MODE",
            Intent::VibrateMode => "VIBRATE_MODE",
            Intent::VolumeControl => "VOLUME_CONTROL",
            Intent::BrightnessControl => "BRIGHTNESS_CONTROL",
            Intent::WifiSettings => "WIFI_SETTINGS",
            Intent::BluetoothSettings => "BLUETOOTH_SETTINGS",
            Intent::AirplaneMode => "AIRPLANE_MODE",
            Intent::Weather => "WEATHER",
            Intent::Time => "TIME",
            Intent::Date => "DATE",
            Intent::BatteryStatus => "BATTERY_STATUS",
            Intent::ReadNotifications => "READ_NOTIFICATIONS",
            Intent::ReadScreen => "READ_SCREEN",
            Intent::CasualChat => "CASUAL_CHAT",
            Intent::Question => "QUESTION",
            Intent::Greeting => "GREETING",
            Intent::Thanks => "THANKS",
            Intent::ClickButton => "CLICK_BUTTON",
            Intent::ScrollDown => "SCROLL_DOWN",
            Intent::ScrollUp => "SCROLL_UP",
            Intent::TakeScreenshot => "TAKE_SCREENSHOT",
            Intent::SecurityCheck => "SECURITY_CHECK",
            Intent::Stop => "STOP",
            Intent::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::ALL
            .iter()
            .find(|intent| intent.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown intent: {}", s))
    }
}

/// Output of classification. Confidence is a fixed per-rule constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub intent: Intent,
    pub parameters: Parameters,
    pub confidence: f32,
}

impl CommandResult {
    pub fn new(intent: Intent, confidence: f32) -> Self {
        Self {
            intent,
            parameters: Parameters::new(),
            confidence,
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

// ============================================
// Rule table
// ============================================

static TIME_QUERY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"time.*is").unwrap());

static GREETING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(hi|hello|hey|good morning|good evening|good afternoon)").unwrap()
});

static QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(what|why|how|when|where|who|can you|could you|would you)").unwrap()
});

static CASUAL_CHAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(how are you|what's up|hey there|sup|wassup)$").unwrap());

static GO_BACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(go back|back|previous)$").unwrap());

/// What a rule sees: the normalized text plus the trimmed original.
struct Utterance<'a> {
    lower: &'a str,
    original: &'a str,
}

/// One classifier rule.
struct Rule {
    intent: Intent,
    confidence: f32,
    matches: fn(&str) -> bool,
    params: fn(&Utterance) -> Parameters,
}

fn none(_: &Utterance) -> Parameters {
    Parameters::new()
}

fn one(key: &str, value: String) -> Parameters {
    let mut params = Parameters::new();
    params.insert(key.to_string(), value);
    params
}

fn toggle(u: &Utterance) -> Parameters {
    let enable = !u.lower.contains("off") && !u.lower.contains("disable");
    one("enable", enable.to_string())
}

const CONTACT_KEYWORDS: &[&str] = &["call", "phone", "dial", "message", "text", "whatsapp", "to"];

/// Rules in priority order.
const RULES: &[Rule] = &[
    Rule {
        intent: Intent::OpenApp,
        confidence: 0.9,
        matches: |s| contains_any(s, &["open", "launch", "start"]),
        params: |u| one("app_name", strip_keywords(u.lower, &["open", "launch", "start"])),
    },
    Rule {
        intent: Intent::MakeCall,
        confidence: 0.9,
        matches: |s| contains_any(s, &["call", "phone", "dial"]),
        params: |u| one("contact_name", strip_keywords(u.lower, CONTACT_KEYWORDS)),
    },
    Rule {
        intent: Intent::SendMessage,
        confidence: 0.85,
        matches: |s| contains_any(s, &["message", "text", "whatsapp"]),
        params: |u| {
            let mut params = one("contact_name", strip_keywords(u.lower, CONTACT_KEYWORDS));
            params.insert(
                "message".to_string(),
                extract::text_after_marker(u.lower, &["saying", "say", "message"]),
            );
            params
        },
    },
    Rule {
        intent: Intent::TakePhoto,
        confidence: 0.95,
        matches: |s| contains_any(s, &["photo", "picture", "camera"]),
        params: none,
    },
    Rule {
        intent: Intent::TakeVideo,
        confidence: 0.95,
        matches: |s| contains_any(s, &["video", "record"]),
        params: none,
    },
    Rule {
        intent: Intent::Navigate,
        confidence: 0.9,
        matches: |s| contains_any(s, &["navigate", "directions", "map"]),
        params: |u| {
            one(
                "location",
                strip_keywords(
                    u.lower,
                    &["navigate to", "directions to", "map to", "navigate", "directions", "map"],
                ),
            )
        },
    },
    Rule {
        intent: Intent::SetAlarm,
        confidence: 0.85,
        matches: |s| contains_any(s, &["alarm", "wake me"]),
        params: |u| one("time", extract::alarm_time(u.lower)),
    },
    Rule {
        intent: Intent::SetReminder,
        confidence: 0.85,
        matches: |s| contains_any(s, &["remind", "reminder"]),
        params: |u| {
            one(
                "reminder",
                strip_keywords(u.lower, &["remind me to", "reminder to", "remind", "reminder"]),
            )
        },
    },
    Rule {
        intent: Intent::PlayMusic,
        confidence: 0.8,
        matches: |s| contains_any(s, &["play", "music", "song"]),
        params: |u| one("query", strip_keywords(u.lower, &["play", "music", "song"])),
    },
    Rule {
        intent: Intent::SilentMode,
        confidence: 0.95,
        matches: |s| contains_any(s, &["silent", "mute phone", "quiet mode"]),
        params: toggle,
    },
    Rule {
        intent: Intent::VibrateMode,
        confidence: 0.95,
        matches: |s| contains_any(s, &["vibrate", "vibration"]),
        params: toggle,
    },
    Rule {
        intent: Intent::VolumeControl,
        confidence: 0.9,
        matches: |s| s.contains("volume"),
        params: |u| one("level", extract::volume_level(u.lower).to_string()),
    },
    Rule {
        intent: Intent::BrightnessControl,
        confidence: 0.9,
        matches: |s| s.contains("brightness"),
        params: |u| one("level", extract::brightness_level(u.lower).to_string()),
    },
    Rule {
        intent: Intent::WifiSettings,
        confidence: 0.95,
        matches: |s| contains_any(s, &["wifi", "wi-fi"]),
        params: none,
    },
    Rule {
        intent: Intent::BluetoothSettings,
        confidence: 0.95,
        matches: |s| s.contains("bluetooth"),
        params: none,
    },
    Rule {
        intent: Intent::AirplaneMode,
        confidence: 0.95,
        matches: |s| contains_any(s, &["airplane", "flight mode"]),
        params: none,
    },
    Rule {
        intent: Intent::Weather,
        confidence: 0.95,
        matches: |s| contains_any(s, &["weather", "temperature", "forecast"]),
        params: none,
    },
    Rule {
        intent: Intent::Time,
        confidence: 0.95,
        matches: |s| contains_any(s, &["what time", "current time"]) || TIME_QUERY.is_match(s),
        params: none,
    },
    Rule {
        intent: Intent::Date,
        confidence: 0.95,
        matches: |s| contains_any(s, &["what date", "today's date", "what day"]),
        params: none,
    },
    Rule {
        intent: Intent::BatteryStatus,
        confidence: 0.95,
        matches: |s| contains_any(s, &["battery", "charge"]),
        params: none,
    },
    Rule {
        intent: Intent::Greeting,
        confidence: 0.95,
        matches: |s| GREETING.is_match(s),
        params: none,
    },
    Rule {
        intent: Intent::Thanks,
        confidence: 0.95,
        matches: |s| s.contains("thank"),
        params: none,
    },
    Rule {
        intent: Intent::Question,
        confidence: 0.7,
        matches: |s| QUESTION.is_match(s),
        params: |u| one("question", u.original.to_string()),
    },
    Rule {
        intent: Intent::CasualChat,
        confidence: 0.8,
        matches: |s| CASUAL_CHAT.is_match(s),
        params: |u| one("message", u.original.to_string()),
    },
    Rule {
        intent: Intent::CloseApp,
        confidence: 0.9,
        matches: |s| s.contains("close") && contains_any(s, &["app", "this"]),
        params: none,
    },
    Rule {
        intent: Intent::SwitchApp,
        confidence: 0.9,
        matches: |s| contains_any(s, &["switch", "recent apps", "app switcher"]),
        params: none,
    },
    Rule {
        intent: Intent::GoBack,
        confidence: 0.9,
        matches: |s| GO_BACK.is_match(s),
        params: none,
    },
    Rule {
        intent: Intent::ReadNotifications,
        confidence: 0.9,
        matches: |s| s.contains("read") && s.contains("notification"),
        params: none,
    },
    Rule {
        intent: Intent::ReadScreen,
        confidence: 0.9,
        matches: |s| s.contains("read") && contains_any(s, &["screen", "what's on"]),
        params: none,
    },
    Rule {
        intent: Intent::ClickButton,
        confidence: 0.8,
        matches: |s| contains_any(s, &["click", "tap", "press"]),
        params: |u| {
            one(
                "button_text",
                strip_keywords(u.lower, &["click on", "tap on", "press on", "click", "tap", "press", "button"]),
            )
        },
    },
    Rule {
        intent: Intent::ScrollDown,
        confidence: 0.9,
        matches: |s| contains_any(s, &["scroll down", "swipe down"]),
        params: none,
    },
    Rule {
        intent: Intent::ScrollUp,
        confidence: 0.9,
        matches: |s| contains_any(s, &["scroll up", "swipe up"]),
        params: none,
    },
    Rule {
        intent: Intent::TakeScreenshot,
        confidence: 0.9,
        matches: |s| contains_any(s, &["screenshot", "screen shot", "capture screen"]),
        params: none,
    },
    Rule {
        intent: Intent::SecurityCheck,
        confidence: 0.9,
        matches: |s| {
            contains_any(s, &["security", "scan", "threat"])
                && contains_any(s, &["check", "scan", "analyze", "report"])
        },
        params: none,
    },
    Rule {
        intent: Intent::Stop,
        confidence: 1.0,
        matches: |s| s == "stop" || s == "shut up" || contains_any(s, &["stop now", "cancel"]),
        params: none,
    },
];

/// Confidence assigned to the web-search fallback.
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Classify an utterance. Never fails; unmatched input becomes a web search.
pub fn classify(command: &str) -> CommandResult {
    let original = command.trim();
    let lower = original.to_lowercase();
    let utterance = Utterance {
        lower: &lower,
        original,
    };

    let result = RULES
        .iter()
        .find(|rule| (rule.matches)(&lower))
        .map(|rule| CommandResult {
            intent: rule.intent,
            parameters: (rule.params)(&utterance),
            confidence: rule.confidence,
        })
        .unwrap_or_else(|| {
            CommandResult::new(Intent::SearchWeb, FALLBACK_CONFIDENCE).with_param("query", original)
        });

    tracing::debug!(
        command = %lower,
        intent = %result.intent,
        confidence = result.confidence,
        "Classified command"
    );

    result
}
