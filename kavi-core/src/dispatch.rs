//! Action dispatch
//!
//! [`ActionDispatcher::execute`] routes a [`CommandResult`] to the platform
//! collaborators. [`handler_for`] is an exhaustive match over [`Intent`], so a
//! new intent does not compile until it has a handler.
//!
//! A handler whose required slot is missing returns early without effect; the
//! skip is logged, never spoken. Speech from handlers is queued behind the
//! personality reply; only [`Intent::Stop`] interrupts.

use crate::canned::Picker;
use crate::clock::Clock;
use crate::intent::extract::DEFAULT_LEVEL;
use crate::intent::{CommandResult, Intent};
use crate::platform::{
    known_package, DeviceAction, Gesture, LaunchOutcome, Platform, Setting, SettingOutcome,
    SettingsScreen,
};
use crate::question;
use crate::security::{SecurityReport, SecurityReporter};
use crate::voice::{Emotion, Speaker};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

const GREETINGS: &[&str] = &[
    "Hello! How can I help you?",
    "Hi there! What can I do for you?",
    "Hey! Ready to assist!",
    "Hello! What do you need?",
];

const THANKS: &[&str] = &[
    "You're welcome!",
    "Happy to help!",
    "Anytime!",
    "My pleasure!",
    "No problem!",
];

const CASUAL_CHAT: &[&str] = &[
    "I'm doing well, thanks for asking!",
    "I'm here and ready to help!",
    "All good! How about you?",
    "I'm great! What can I do for you?",
];

const AUTOMATION_OFF: &str = "Accessibility service not enabled";

/// Lines of screen text read out.
const SCREEN_LINES: usize = 5;

/// Above this many degrees Celsius the weather report gets a heat warning.
const HOT_CELSIUS: f64 = 35.0;
const FREEZING_CELSIUS: f64 = 5.0;

/// `None` means a required slot was missing.
type Handler = fn(&ActionDispatcher, &CommandResult) -> Option<()>;

pub struct ActionDispatcher {
    platform: Platform,
    speaker: Arc<dyn Speaker>,
    clock: Arc<dyn Clock>,
    picker: Picker,
    security: Option<Arc<SecurityReporter>>,
    scan: Mutex<Option<JoinHandle<SecurityReport>>>,
}

impl ActionDispatcher {
    pub fn new(
        platform: Platform,
        speaker: Arc<dyn Speaker>,
        clock: Arc<dyn Clock>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            platform,
            speaker,
            clock,
            picker: Picker::new(seed),
            security: None,
            scan: Mutex::new(None),
        }
    }

    pub fn with_security(mut self, reporter: SecurityReporter) -> Self {
        self.security = Some(Arc::new(reporter));
        self
    }

    /// Block until the security scan started by the last check finishes.
    pub fn wait_for_scan(&self) -> Option<SecurityReport> {
        let handle = self.scan.lock().unwrap().take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                tracing::warn!("Security scan thread panicked");
                None
            }
        }
    }

    /// Carry out a classified command. Returns `false` when a required
    /// parameter was missing and nothing happened.
    pub fn execute(&self, result: &CommandResult) -> bool {
        tracing::debug!(intent = %result.intent, params = ?result.parameters, "Executing intent");
        let handled = handler_for(result.intent)(self, result).is_some();
        if !handled {
            tracing::debug!(intent = %result.intent, "Missing required parameter, skipping");
        }
        handled
    }

    // ============================================
    // Helpers
    // ============================================

    fn say(&self, text: &str, emotion: Emotion) {
        self.speaker.speak_queued(text, emotion);
    }

    fn start(&self, action: DeviceAction) {
        if let Err(e) = self.platform.intents.start(&action) {
            tracing::warn!(error = %e, action = ?action, "Device hand-off failed");
            self.say(action.failure_message(), Emotion::Concerned);
        }
    }

    fn web_search(&self, query: &str) {
        self.start(DeviceAction::WebSearch(query.to_string()));
    }

    /// Run `f` if the automation surface is up, otherwise say so.
    fn with_automation(&self, unavailable: &str, f: impl FnOnce()) {
        if self.platform.automation.is_available() {
            f();
        } else {
            self.say(unavailable, Emotion::Concerned);
        }
    }

    fn gesture(&self, gesture: Gesture, done: &str, failed: &str) {
        self.with_automation(AUTOMATION_OFF, || {
            if self.platform.automation.perform(&gesture) {
                self.say(done, Emotion::Neutral);
            } else {
                self.say(failed, Emotion::Concerned);
            }
        });
    }

    fn apply_setting(&self, setting: Setting, done: &str, denied: &str) {
        match self.platform.settings.apply(setting) {
            SettingOutcome::Success => self.say(done, Emotion::Neutral),
            SettingOutcome::PermissionDenied => self.say(denied, Emotion::Neutral),
        }
    }

    // ============================================
    // Handlers
    // ============================================

    fn open_app(&self, r: &CommandResult) -> Option<()> {
        let app = r.param("app_name")?;
        if self.platform.apps.launch(app, known_package(app)) == LaunchOutcome::NotFound {
            self.say(&format!("{} is not installed", app), Emotion::Concerned);
        }
        Some(())
    }

    fn make_call(&self, r: &CommandResult) -> Option<()> {
        let contact = r.param("contact_name")?;
        if let Err(e) = self.platform.telephony.call(contact) {
            tracing::warn!(error = %e, "Call failed");
            self.say(&format!("Could not call {}", contact), Emotion::Concerned);
        }
        Some(())
    }

    fn send_message(&self, r: &CommandResult) -> Option<()> {
        let contact = r.param("contact_name")?;
        let message = r.param("message").unwrap_or("");
        if let Err(e) = self.platform.telephony.send_message(contact, message) {
            tracing::warn!(error = %e, "Message failed");
            self.say("Could not open messaging app", Emotion::Concerned);
        }
        Some(())
    }

    fn take_photo(&self, _: &CommandResult) -> Option<()> {
        self.start(DeviceAction::Camera);
        Some(())
    }

    fn take_video(&self, _: &CommandResult) -> Option<()> {
        self.start(DeviceAction::VideoCamera);
        Some(())
    }

    fn navigate(&self, r: &CommandResult) -> Option<()> {
        let location = r.param("location")?;
        self.start(DeviceAction::Navigate(location.to_string()));
        Some(())
    }

    fn set_alarm(&self, r: &CommandResult) -> Option<()> {
        let time = r.param("time")?;
        self.start(DeviceAction::SetAlarm(time.to_string()));
        Some(())
    }

    fn set_reminder(&self, r: &CommandResult) -> Option<()> {
        let reminder = r.param("reminder")?;
        self.start(DeviceAction::SetReminder(reminder.to_string()));
        Some(())
    }

    fn play_music(&self, r: &CommandResult) -> Option<()> {
        let query = r.param("query").unwrap_or("");
        self.start(DeviceAction::PlayMusic(query.to_string()));
        Some(())
    }

    fn search_web(&self, r: &CommandResult) -> Option<()> {
        let query = r.param("query")?;
        self.say(&format!("Checking Google for {}.", query), Emotion::Neutral);
        self.web_search(query);
        Some(())
    }

    fn silent_mode(&self, r: &CommandResult) -> Option<()> {
        let enable = enable_flag(r);
        self.apply_setting(
            Setting::SilentMode(enable),
            if enable { "Silent mode enabled" } else { "Silent mode disabled" },
            "I need permission to control Do Not Disturb. Opening settings.",
        );
        Some(())
    }

    fn vibrate_mode(&self, r: &CommandResult) -> Option<()> {
        let enable = enable_flag(r);
        self.apply_setting(
            Setting::VibrateMode(enable),
            if enable { "Vibrate mode enabled" } else { "Vibrate mode disabled" },
            "I need permission to control vibrate mode. Opening settings.",
        );
        Some(())
    }

    fn volume(&self, r: &CommandResult) -> Option<()> {
        let level = level_param(r);
        self.apply_setting(
            Setting::Volume(level),
            &format!("Volume set to {} percent", level),
            "Could not set volume",
        );
        Some(())
    }

    fn brightness(&self, r: &CommandResult) -> Option<()> {
        let level = level_param(r);
        self.apply_setting(
            Setting::Brightness(level),
            &format!("Brightness set to {} percent", level),
            "I need permission to control brightness. Opening settings.",
        );
        Some(())
    }

    fn wifi(&self, _: &CommandResult) -> Option<()> {
        self.platform.settings.open_screen(SettingsScreen::Wifi);
        self.say("Opening WiFi settings", Emotion::Neutral);
        Some(())
    }

    fn bluetooth(&self, _: &CommandResult) -> Option<()> {
        self.platform.settings.open_screen(SettingsScreen::Bluetooth);
        self.say("Opening Bluetooth settings", Emotion::Neutral);
        Some(())
    }

    fn airplane_mode(&self, _: &CommandResult) -> Option<()> {
        self.platform.settings.open_screen(SettingsScreen::AirplaneMode);
        self.say("Opening airplane mode settings", Emotion::Neutral);
        Some(())
    }

    fn weather(&self, _: &CommandResult) -> Option<()> {
        self.say("Let me check the weather for you", Emotion::Neutral);
        match self.platform.weather.current() {
            Ok(Some(report)) => {
                self.say(&report.spoken(), Emotion::Neutral);
                if report.temperature > HOT_CELSIUS {
                    self.say(
                        "Stay indoors if possible, it's really hot out there!",
                        Emotion::Concerned,
                    );
                } else if report.temperature < FREEZING_CELSIUS {
                    self.say("Bundle up! It's freezing!", Emotion::Concerned);
                }
            }
            Ok(None) => {
                self.say(
                    "I couldn't get the weather information. Let me search for it.",
                    Emotion::Neutral,
                );
                self.web_search("weather");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Weather lookup failed");
                self.say(
                    "Sorry, I had trouble getting the weather. Let me search for it.",
                    Emotion::Concerned,
                );
                self.web_search("weather");
            }
        }
        Some(())
    }

    fn time(&self, _: &CommandResult) -> Option<()> {
        let now = self.clock.now();
        self.say(&format!("It's {}", now.format("%-I:%M %p")), Emotion::Neutral);
        Some(())
    }

    fn date(&self, _: &CommandResult) -> Option<()> {
        let now = self.clock.now();
        self.say(
            &format!("Today is {}", now.format("%A, %B %-d, %Y")),
            Emotion::Neutral,
        );
        Some(())
    }

    fn battery(&self, _: &CommandResult) -> Option<()> {
        let status = self.platform.settings.battery();
        let charging = if status.charging { "charging" } else { "not charging" };
        self.say(
            &format!("Battery is at {} percent and {}", status.level, charging),
            Emotion::Neutral,
        );
        Some(())
    }

    fn greeting(&self, _: &CommandResult) -> Option<()> {
        self.say(self.picker.pick(GREETINGS), Emotion::Happy);
        Some(())
    }

    fn thanks(&self, _: &CommandResult) -> Option<()> {
        self.say(self.picker.pick(THANKS), Emotion::Happy);
        Some(())
    }

    fn question(&self, r: &CommandResult) -> Option<()> {
        let asked = r.param("question").unwrap_or("");
        let category = question::categorize(asked);
        self.say(category.suggested_response(), Emotion::Neutral);
        if category.needs_backend() {
            self.web_search(asked);
        }
        Some(())
    }

    fn casual_chat(&self, _: &CommandResult) -> Option<()> {
        self.say(self.picker.pick(CASUAL_CHAT), Emotion::Playful);
        Some(())
    }

    fn close_app(&self, _: &CommandResult) -> Option<()> {
        self.with_automation(
            "Accessibility service not enabled. Please enable it in settings.",
            || {
                if self.platform.automation.perform(&Gesture::CloseApp) {
                    self.say("Closing app", Emotion::Neutral);
                } else {
                    self.say("Could not close app", Emotion::Concerned);
                }
            },
        );
        Some(())
    }

    fn switch_app(&self, _: &CommandResult) -> Option<()> {
        self.gesture(
            Gesture::RecentApps,
            "Opening app switcher",
            "Could not open app switcher",
        );
        Some(())
    }

    fn go_back(&self, _: &CommandResult) -> Option<()> {
        self.gesture(Gesture::Back, "Going back", "Could not go back");
        Some(())
    }

    fn read_notifications(&self, _: &CommandResult) -> Option<()> {
        self.with_automation(AUTOMATION_OFF, || {
            match self.platform.automation.last_notification() {
                Some(text) => self.say(&format!("Last notification: {}", text), Emotion::Neutral),
                None => self.say("No recent notifications", Emotion::Neutral),
            }
        });
        Some(())
    }

    fn read_screen(&self, _: &CommandResult) -> Option<()> {
        self.with_automation(AUTOMATION_OFF, || {
            let text = self.platform.automation.screen_text();
            if text.trim().is_empty() {
                self.say("Could not read screen", Emotion::Concerned);
            } else {
                let summary = text.lines().take(SCREEN_LINES).collect::<Vec<_>>().join(". ");
                self.say(&format!("Screen contains: {}", summary), Emotion::Neutral);
            }
        });
        Some(())
    }

    fn click(&self, r: &CommandResult) -> Option<()> {
        let label = r.param("button_text").unwrap_or("").trim();
        if label.is_empty() {
            self.say("Please specify which button to click", Emotion::Curious);
            return Some(());
        }
        self.gesture(
            Gesture::Click(label.to_string()),
            &format!("Clicked {}", label),
            &format!("Could not find button: {}", label),
        );
        Some(())
    }

    fn scroll_down(&self, _: &CommandResult) -> Option<()> {
        self.gesture(Gesture::ScrollDown, "Scrolling down", "Could not scroll");
        Some(())
    }

    fn scroll_up(&self, _: &CommandResult) -> Option<()> {
        self.gesture(Gesture::ScrollUp, "Scrolling up", "Could not scroll");
        Some(())
    }

    fn screenshot(&self, _: &CommandResult) -> Option<()> {
        self.gesture(
            Gesture::Screenshot,
            "Taking screenshot",
            "Could not take screenshot",
        );
        Some(())
    }

    fn security_check(&self, _: &CommandResult) -> Option<()> {
        let Some(reporter) = &self.security else {
            self.say("Security module not initialized.", Emotion::Concerned);
            return Some(());
        };

        let mut scan = self.scan.lock().unwrap();
        if scan.as_ref().is_some_and(|h| !h.is_finished()) {
            self.say("A security scan is already running.", Emotion::Neutral);
            return Some(());
        }
        match reporter.spawn_scan() {
            Ok(handle) => *scan = Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to start security scan");
                self.say("Could not start the security scan.", Emotion::Concerned);
            }
        }
        Some(())
    }

    fn stop(&self, _: &CommandResult) -> Option<()> {
        self.speaker.stop();
        Some(())
    }

    fn unknown(&self, _: &CommandResult) -> Option<()> {
        self.say(
            "I didn't quite catch that. Want me to search Google?",
            Emotion::Concerned,
        );
        Some(())
    }
}

fn enable_flag(r: &CommandResult) -> bool {
    r.param("enable")
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(true)
}

fn level_param(r: &CommandResult) -> u32 {
    r.param("level")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(DEFAULT_LEVEL)
        .min(100)
}

/// The one handler for each intent.
pub fn handler_for(intent: Intent) -> Handler {
    match intent {
        Intent::OpenApp => ActionDispatcher::open_app,
        Intent::CloseApp => ActionDispatcher::close_app,
        Intent::SwitchApp => ActionDispatcher::switch_app,
        Intent::GoBack => ActionDispatcher::go_back,
        Intent::MakeCall => ActionDispatcher::make_call,
        Intent::SendMessage => ActionDispatcher::send_message,
        Intent::TakePhoto => ActionDispatcher::take_photo,
        Intent::TakeVideo => ActionDispatcher::take_video,
        Intent::PlayMusic => ActionDispatcher::play_music,
        Intent::Navigate => ActionDispatcher::navigate,
        Intent::SetAlarm => ActionDispatcher::set_alarm,
        Intent::SetReminder => ActionDispatcher::set_reminder,
        Intent::SearchWeb => ActionDispatcher::search_web,
        Intent::SilentMode => ActionDispatcher::silent_mode,
        Intent::VibrateMode => ActionDispatcher::vibrate_mode,
        Intent::VolumeControl => ActionDispatcher::volume,
        Intent::BrightnessControl => ActionDispatcher::brightness,
        Intent::WifiSettings => ActionDispatcher::wifi,
        Intent::BluetoothSettings => ActionDispatcher::bluetooth,
        Intent::AirplaneMode => ActionDispatcher::airplane_mode,
        Intent::Weather => ActionDispatcher::weather,
        Intent::Time => ActionDispatcher::time,
        Intent::Date => ActionDispatcher::date,
        Intent::BatteryStatus => ActionDispatcher::battery,
        Intent::ReadNotifications => ActionDispatcher::read_notifications,
        Intent::ReadScreen => ActionDispatcher::read_screen,
        Intent::CasualChat => ActionDispatcher::casual_chat,
        Intent::Question => ActionDispatcher::question,
        Intent::Greeting => ActionDispatcher::greeting,
        Intent::Thanks => ActionDispatcher::thanks,
        Intent::ClickButton => ActionDispatcher::click,
        Intent::ScrollDown => ActionDispatcher::scroll_down,
        Intent::ScrollUp => ActionDispatcher::scroll_up,
        Intent::TakeScreenshot => ActionDispatcher::screenshot,
        Intent::SecurityCheck => ActionDispatcher::security_check,
        Intent::Stop => ActionDispatcher::stop,
        Intent::Unknown => ActionDispatcher::unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SecurityConfig;
    use crate::intent::classify;
    use crate::platform::{SimulatedDevice, WeatherReport};
    use crate::security::{
        create_default_analyzer, DetectedThreat, Detector, DeviceInventory, DeviceSnapshot,
        ThreatAnalyzer, ThreatLevel, Whitelist,
    };
    use crate::voice::testing::{RecordingSpeaker, Spoken};
    use std::sync::mpsc;

    struct Harness {
        device: Arc<SimulatedDevice>,
        speaker: Arc<RecordingSpeaker>,
        dispatcher: ActionDispatcher,
    }

    fn harness() -> Harness {
        let device = Arc::new(SimulatedDevice::new());
        let speaker = Arc::new(RecordingSpeaker::default());
        // Tuesday 2025-06-03 14:05 UTC
        let clock = Arc::new(ManualClock::at(2025, 6, 3, 14, 5));
        let dispatcher =
            ActionDispatcher::new(Platform::single(device.clone()), speaker.clone(), clock, Some(3));
        Harness {
            device,
            speaker,
            dispatcher,
        }
    }

    fn run(h: &Harness, utterance: &str) -> bool {
        h.dispatcher.execute(&classify(utterance))
    }

    fn report(temperature: f64) -> WeatherReport {
        WeatherReport {
            temperature,
            feels_like: temperature,
            description: "clear sky".to_string(),
            humidity: 30,
            wind_speed: 1.0,
            city: "Pune".to_string(),
        }
    }

    #[test]
    fn test_every_intent_has_a_handler() {
        let h = harness();
        for intent in Intent::ALL {
            // Parameterless results exercise every branch without panicking
            h.dispatcher.execute(&CommandResult::new(intent, 1.0));
        }
    }

    #[test]
    fn test_open_app_passes_package_hint() {
        let h = harness();
        assert!(run(&h, "open instagram"));
        assert_eq!(h.device.effects(), vec!["launch instagram (com.instagram.android)"]);
        assert!(h.speaker.calls().is_empty());
    }

    #[test]
    fn test_open_missing_app_is_spoken() {
        let h = harness();
        h.device.set_installed_apps(&[]);
        run(&h, "open banking");
        assert_eq!(h.speaker.texts(), vec!["banking is not installed"]);
    }

    #[test]
    fn test_missing_required_parameter_is_silent() {
        let h = harness();
        for intent in [
            Intent::OpenApp,
            Intent::MakeCall,
            Intent::SendMessage,
            Intent::Navigate,
            Intent::SetAlarm,
            Intent::SetReminder,
            Intent::SearchWeb,
        ] {
            assert!(!h.dispatcher.execute(&CommandResult::new(intent, 0.9)), "{intent}");
        }
        assert!(h.device.effects().is_empty());
        assert!(h.speaker.calls().is_empty());
    }

    #[test]
    fn test_optional_parameters_default() {
        let h = harness();
        assert!(h.dispatcher.execute(&CommandResult::new(Intent::PlayMusic, 0.8)));
        assert!(h.dispatcher.execute(&CommandResult::new(Intent::VolumeControl, 0.9)));
        assert!(h.dispatcher.execute(&CommandResult::new(Intent::SilentMode, 0.9)));
        assert_eq!(
            h.device.effects(),
            vec!["intent play_music ", "setting volume=50", "setting silent_mode=true"]
        );
    }

    #[test]
    fn test_communication() {
        let h = harness();
        run(&h, "call mom");
        h.dispatcher.execute(
            &CommandResult::new(Intent::SendMessage, 0.85)
                .with_param("contact_name", "Alice")
                .with_param("message", "running late"),
        );
        assert_eq!(h.device.effects(), vec!["call mom", "message Alice: running late"]);
    }

    #[test]
    fn test_search_web_speaks_then_searches() {
        let h = harness();
        run(&h, "rust borrow checker");
        assert_eq!(
            h.speaker.texts(),
            vec!["Checking Google for rust borrow checker."]
        );
        assert_eq!(h.device.effects(), vec!["intent web_search rust borrow checker"]);
    }

    #[test]
    fn test_device_intent_failure_is_spoken() {
        let h = harness();
        h.device.set_intents_available(false);
        run(&h, "take a photo");
        assert_eq!(
            h.speaker.calls(),
            vec![Spoken::Queued("Could not open camera".into(), Emotion::Concerned)]
        );
    }

    #[test]
    fn test_settings_outcomes() {
        let h = harness();
        run(&h, "turn off silent mode");
        run(&h, "set volume to 30%");
        run(&h, "turn on wifi");
        h.device.set_settings_permitted(false);
        run(&h, "set brightness to max");
        run(&h, "turn up the volume");

        assert_eq!(
            h.speaker.texts(),
            vec![
                "Silent mode disabled",
                "Volume set to 30 percent",
                "Opening WiFi settings",
                "I need permission to control brightness. Opening settings.",
                "Could not set volume",
            ]
        );
        assert!(h.device.effects().contains(&"open settings wifi".to_string()));
    }

    #[test]
    fn test_time_and_date() {
        let h = harness();
        run(&h, "what time is it");
        run(&h, "what day is it");
        assert_eq!(
            h.speaker.texts(),
            vec!["It's 2:05 PM", "Today is Tuesday, June 3, 2025"]
        );
    }

    #[test]
    fn test_battery() {
        let h = harness();
        h.device.set_battery(42, true);
        run(&h, "battery status");
        assert_eq!(h.speaker.texts(), vec!["Battery is at 42 percent and charging"]);
    }

    #[test]
    fn test_weather_report_and_remarks() {
        let h = harness();
        h.device.set_weather(Some(report(38.0)));
        run(&h, "what is the weather");
        let texts = h.speaker.texts();
        assert_eq!(texts[0], "Let me check the weather for you");
        assert!(texts[1].starts_with("The weather in Pune is clear sky."));
        assert_eq!(texts[2], "Stay indoors if possible, it's really hot out there!");

        let h = harness();
        h.device.set_weather(Some(report(2.0)));
        run(&h, "weather");
        assert_eq!(h.speaker.texts()[2], "Bundle up! It's freezing!");

        let h = harness();
        h.device.set_weather(Some(report(20.0)));
        run(&h, "weather");
        assert_eq!(h.speaker.texts().len(), 2);
    }

    #[test]
    fn test_weather_fallbacks_search() {
        let h = harness();
        run(&h, "weather");
        assert_eq!(
            h.speaker.texts()[1],
            "I couldn't get the weather information. Let me search for it."
        );
        assert_eq!(h.device.effects(), vec!["intent web_search weather"]);

        let h = harness();
        h.device.set_weather_fails(true);
        run(&h, "forecast");
        assert_eq!(
            h.speaker.calls()[1],
            Spoken::Queued(
                "Sorry, I had trouble getting the weather. Let me search for it.".into(),
                Emotion::Concerned
            )
        );
        assert_eq!(h.device.effects(), vec!["intent web_search weather"]);
    }

    #[test]
    fn test_conversational_pools() {
        let h = harness();
        run(&h, "hello");
        run(&h, "thanks");
        run(&h, "wassup");
        let calls = h.speaker.calls();
        match (&calls[0], &calls[1], &calls[2]) {
            (
                Spoken::Queued(greeting, Emotion::Happy),
                Spoken::Queued(thanks, Emotion::Happy),
                Spoken::Queued(chat, Emotion::Playful),
            ) => {
                assert!(GREETINGS.contains(&greeting.as_str()));
                assert!(THANKS.contains(&thanks.as_str()));
                assert!(CASUAL_CHAT.contains(&chat.as_str()));
            }
            other => panic!("unexpected calls: {:?}", other),
        }
    }

    #[test]
    fn test_questions() {
        let h = harness();
        run(&h, "why is the meaning of life so hard");
        assert_eq!(
            h.speaker.texts(),
            vec!["That's a deep question. Let me think about it."]
        );
        assert_eq!(
            h.device.effects(),
            vec!["intent web_search why is the meaning of life so hard"]
        );

        let h = harness();
        run(&h, "when is lunch");
        assert_eq!(h.speaker.texts(), vec!["Let me help you with your daily routine."]);
        assert!(h.device.effects().is_empty());
    }

    #[test]
    fn test_automation_unavailable() {
        let h = harness();
        h.device.set_automation_available(false);
        run(&h, "close this app");
        run(&h, "go back");
        run(&h, "click on submit");
        assert_eq!(
            h.speaker.texts(),
            vec![
                "Accessibility service not enabled. Please enable it in settings.",
                "Accessibility service not enabled",
                "Accessibility service not enabled",
            ]
        );
        assert!(h.device.effects().is_empty());
    }

    #[test]
    fn test_automation_actions() {
        let h = harness();
        h.device.set_clickable(&["submit"]);
        h.device.set_screen_text("Inbox\nMail one\nMail two\nMail three\nMail four\nMail five");
        h.device.set_last_notification(Some("Bob: lunch?"));

        run(&h, "go back");
        run(&h, "click on submit");
        run(&h, "tap cancel");
        run(&h, "read my notifications");
        run(&h, "read the screen");
        run(&h, "scroll down");

        assert_eq!(
            h.speaker.texts(),
            vec![
                "Going back",
                "Clicked submit",
                "Could not find button: cancel",
                "Last notification: Bob: lunch?",
                "Screen contains: Inbox. Mail one. Mail two. Mail three. Mail four",
                "Scrolling down",
            ]
        );
    }

    #[test]
    fn test_click_without_label_asks() {
        let h = harness();
        run(&h, "click");
        assert_eq!(
            h.speaker.calls(),
            vec![Spoken::Queued(
                "Please specify which button to click".into(),
                Emotion::Curious
            )]
        );
    }

    #[test]
    fn test_empty_screen() {
        let h = harness();
        run(&h, "read the screen");
        assert_eq!(h.speaker.texts(), vec!["Could not read screen"]);
    }

    #[test]
    fn test_stop_interrupts() {
        let h = harness();
        run(&h, "stop");
        assert_eq!(h.speaker.calls(), vec![Spoken::Stop]);
    }

    #[test]
    fn test_unknown_branch() {
        let h = harness();
        h.dispatcher.execute(&CommandResult::new(Intent::Unknown, 0.0));
        assert_eq!(
            h.speaker.calls(),
            vec![Spoken::Queued(
                "I didn't quite catch that. Want me to search Google?".into(),
                Emotion::Concerned
            )]
        );
    }

    #[test]
    fn test_security_check() {
        let h = harness();
        run(&h, "run a security check");
        assert_eq!(h.speaker.texts(), vec!["Security module not initialized."]);

        let device = Arc::new(SimulatedDevice::new());
        let speaker = Arc::new(RecordingSpeaker::default());
        let reporter = SecurityReporter::new(
            create_default_analyzer(&SecurityConfig::default(), "com.kavi.mobile"),
            Arc::new(DeviceSnapshot::empty()),
            speaker.clone(),
        );
        let dispatcher = ActionDispatcher::new(
            Platform::single(device),
            speaker.clone(),
            Arc::new(ManualClock::at(2025, 6, 3, 14, 5)),
            None,
        )
        .with_security(reporter);
        dispatcher.execute(&classify("security scan"));
        assert!(dispatcher.wait_for_scan().is_some());
        assert_eq!(
            speaker.texts(),
            vec!["Running security diagnostics...", "System secure. No threats detected."]
        );
    }

    /// Holds the scan until the test releases it.
    struct Gate(Mutex<mpsc::Receiver<()>>);

    impl Detector for Gate {
        fn name(&self) -> &str {
            "test.gate"
        }

        fn detect(
            &self,
            _: &dyn DeviceInventory,
            _: &Whitelist,
        ) -> crate::error::Result<Vec<DetectedThreat>> {
            let _ = self.0.lock().unwrap().recv();
            Ok(vec![])
        }
    }

    #[test]
    fn test_security_check_scans_in_background() {
        let (release, gate) = mpsc::channel();
        let mut analyzer = ThreatAnalyzer::new(Whitelist::new("com.kavi.mobile", &[]));
        analyzer.register(Box::new(Gate(Mutex::new(gate))));

        let speaker = Arc::new(RecordingSpeaker::default());
        let reporter =
            SecurityReporter::new(analyzer, Arc::new(DeviceSnapshot::empty()), speaker.clone());
        let dispatcher = ActionDispatcher::new(
            Platform::single(Arc::new(SimulatedDevice::new())),
            speaker.clone(),
            Arc::new(ManualClock::at(2025, 6, 3, 14, 5)),
            None,
        )
        .with_security(reporter);

        // Returns while the detector is still blocked
        assert!(dispatcher.execute(&classify("security scan")));
        assert_eq!(speaker.texts(), vec!["Running security diagnostics..."]);

        dispatcher.execute(&classify("security scan"));
        assert_eq!(speaker.texts()[1], "A security scan is already running.");

        release.send(()).unwrap();
        let report = dispatcher.wait_for_scan().unwrap();
        assert_eq!(report.threat_level, ThreatLevel::Safe);
        assert_eq!(
            speaker.texts().last().map(String::as_str),
            Some("System secure. No threats detected.")
        );
        assert!(dispatcher.wait_for_scan().is_none());
    }
}
