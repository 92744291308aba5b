//! Proactive trigger engine
//!
//! [`ProactiveEngine::generate`] evaluates four trigger categories in priority
//! order (time, pattern, anomaly, context) and returns the first message any
//! of them produces. After a message the engine is in cooldown; evaluations
//! during cooldown return nothing and touch nothing.
//!
//! [`ProactiveMonitor`] runs the engine on a tokio interval and queues each
//! message behind whatever is already being said.

use crate::canned::Picker;
use crate::clock::{start_of_day, Clock};
use crate::db::Database;
use crate::error::Result;
use crate::types::{CommandRecord, ProactiveInteraction, TriggerType};
use crate::voice::{Emotion, Speaker};
use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike, Utc, Weekday};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const MORNING: &[&str] = &[
    "Good morning! Ready to start the day?",
    "Morning! How did you sleep?",
    "Rise and shine! What's on the agenda today?",
];

const LUNCH: &[&str] = &[
    "It's lunchtime. Have you eaten yet?",
    "Lunch break! Don't skip it.",
    "Time for lunch. What are you having?",
];

const EVENING: &[&str] = &[
    "It's getting late. Time to wind down?",
    "Almost bedtime. Ready to call it a day?",
    "Late evening. How was your day?",
];

const LATE_NIGHT: &[&str] = &[
    "You're still up? You should probably sleep.",
    "Late night again? This is becoming a habit.",
    "It's really late. Don't you have work tomorrow?",
];

/// A pattern must have been seen more often than this to be "expected".
const EXPECTED_FREQUENCY: i64 = 10;
/// Commands looked at for repetition.
const REPETITION_WINDOW: usize = 20;
/// Same intent more often than this within the window is repetition.
const REPETITION_THRESHOLD: usize = 5;
/// Commands looked at before any anomaly is considered.
const ANOMALY_WINDOW: usize = 100;
const VERY_ACTIVE: i64 = 100;
const VERY_QUIET: i64 = 5;
/// Quiet-day check only applies after this hour.
const QUIET_AFTER_HOUR: u32 = 18;

/// An unsolicited message ready to be spoken.
#[derive(Debug, Clone, PartialEq)]
pub struct ProactiveMessage {
    pub text: String,
    pub trigger: TriggerType,
    pub emotion: Emotion,
    /// Row id of the audit entry, when it could be written
    pub interaction_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EngineState {
    Idle,
    Cooldown { since: DateTime<Utc> },
}

pub struct ProactiveEngine {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    picker: Picker,
    state: Mutex<EngineState>,
}

impl ProactiveEngine {
    pub fn new(
        db: Arc<Database>,
        clock: Arc<dyn Clock>,
        cooldown: std::time::Duration,
        seed: Option<u64>,
    ) -> Self {
        Self {
            db,
            clock,
            cooldown: Duration::from_std(cooldown).unwrap_or(Duration::minutes(30)),
            picker: Picker::new(seed),
            state: Mutex::new(EngineState::Idle),
        }
    }

    pub fn in_cooldown(&self) -> bool {
        let now = self.clock.now_utc();
        match *self.state.lock().unwrap() {
            EngineState::Idle => false,
            EngineState::Cooldown { since } => now - since <= self.cooldown,
        }
    }

    /// Evaluate the triggers once.
    pub fn generate(&self) -> Option<ProactiveMessage> {
        if self.in_cooldown() {
            tracing::debug!("Proactive engine in cooldown");
            return None;
        }

        let now = self.clock.now();
        let (text, trigger) = self.evaluate(now)?;
        let emotion = if text.contains('?') {
            Emotion::Curious
        } else {
            Emotion::Neutral
        };

        *self.state.lock().unwrap() = EngineState::Cooldown {
            since: now.with_timezone(&Utc),
        };

        let interaction = ProactiveInteraction {
            id: 0,
            timestamp: now.with_timezone(&Utc),
            message: text.clone(),
            trigger,
            user_response: None,
            was_positive: None,
        };
        let interaction_id = match self.db.insert_proactive_interaction(&interaction) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to log proactive interaction");
                None
            }
        };

        tracing::info!(trigger = trigger.as_str(), message = %text, "Proactive message");
        Some(ProactiveMessage {
            text,
            trigger,
            emotion,
            interaction_id,
        })
    }

    /// Attach the user's reaction to an earlier message.
    pub fn record_response(&self, interaction_id: i64, response: &str, was_positive: bool) {
        if let Err(e) = self
            .db
            .record_proactive_response(interaction_id, response, was_positive)
        {
            tracing::warn!(error = %e, interaction_id, "Failed to record proactive response");
        }
    }

    fn evaluate(&self, now: DateTime<FixedOffset>) -> Option<(String, TriggerType)> {
        if let Some(text) = self.time_trigger(now) {
            return Some((text, TriggerType::TimeBased));
        }
        if let Some(text) = self.guarded("pattern", || self.pattern_trigger(now)) {
            return Some((text, TriggerType::PatternBased));
        }
        if let Some(text) = self.guarded("anomaly", || self.anomaly_trigger(now)) {
            return Some((text, TriggerType::AnomalyBased));
        }
        context_trigger(now).map(|text| (text.to_string(), TriggerType::ContextBased))
    }

    /// Storage failures count as "no trigger".
    fn guarded(&self, category: &str, f: impl FnOnce() -> Result<Option<String>>) -> Option<String> {
        f().unwrap_or_else(|e| {
            tracing::warn!(error = %e, category, "Trigger evaluation failed");
            None
        })
    }

    // ============================================
    // Trigger categories
    // ============================================

    fn time_trigger(&self, now: DateTime<FixedOffset>) -> Option<String> {
        let (hour, minute) = (now.hour(), now.minute());
        let pool = match (hour, minute) {
            (6, m) if m < 30 => MORNING,
            (12, m) if m < 30 => LUNCH,
            (22, m) if m < 30 => EVENING,
            (h, _) if h >= 23 || h < 6 => LATE_NIGHT,
            _ => return None,
        };
        Some(self.picker.pick(pool).to_string())
    }

    fn pattern_trigger(&self, now: DateTime<FixedOffset>) -> Result<Option<String>> {
        // Nothing learned for this hour yet: leave the slot to later categories
        let patterns = self.db.patterns_by_hour(now.hour())?;
        if patterns.is_empty() {
            return Ok(None);
        }

        let midnight = start_of_day(now).with_timezone(&Utc);
        let missing = patterns
            .into_iter()
            .find(|p| p.frequency > EXPECTED_FREQUENCY && p.last_occurrence < midnight);
        if let Some(pattern) = missing {
            return Ok(Some(missing_behavior_message(&pattern.action)));
        }

        let recent = self.db.recent_commands(REPETITION_WINDOW)?;
        Ok(repetition_message(&recent))
    }

    fn anomaly_trigger(&self, now: DateTime<FixedOffset>) -> Result<Option<String>> {
        if self.db.recent_commands(ANOMALY_WINDOW)?.is_empty() {
            return Ok(None);
        }

        let today = self
            .db
            .command_count_since(now.with_timezone(&Utc) - Duration::hours(24))?;
        if today > VERY_ACTIVE {
            return Ok(Some("You've been very active today. Are you okay?".to_string()));
        }
        if today < VERY_QUIET && now.hour() > QUIET_AFTER_HOUR {
            return Ok(Some("You've been quiet today. Everything alright?".to_string()));
        }
        Ok(None)
    }
}

fn missing_behavior_message(action: &str) -> String {
    match action {
        "open_email" => "You usually check email by now. Everything okay?".to_string(),
        "open_workout" => "No workout today? Feeling alright?".to_string(),
        "make_coffee" => "Haven't made coffee yet? That's unusual for you.".to_string(),
        other => format!("You usually {} around this time. Forgot?", other),
    }
}

/// First intent (in order of first appearance) repeated past the threshold.
fn repetition_message(recent: &[CommandRecord]) -> Option<String> {
    let mut groups: Vec<(&str, Vec<&CommandRecord>)> = Vec::new();
    for record in recent {
        match groups.iter_mut().find(|(intent, _)| *intent == record.intent) {
            Some((_, members)) => members.push(record),
            None => groups.push((record.intent.as_str(), vec![record])),
        }
    }

    let (intent, members) = groups
        .into_iter()
        .find(|(_, members)| members.len() > REPETITION_THRESHOLD)?;

    let text = match intent {
        "OPEN_APP" => {
            let app = members
                .iter()
                .find_map(|r| r.parameters.get("app_name"))
                .map(String::as_str)
                .unwrap_or("that app");
            format!(
                "You've opened {} {} times recently. Everything alright?",
                app,
                members.len()
            )
        }
        "SEARCH_WEB" => "That's a lot of searching. Looking for something specific?".to_string(),
        _ => "You're doing that a lot. Is something wrong?".to_string(),
    };
    Some(text)
}

fn context_trigger(now: DateTime<FixedOffset>) -> Option<&'static str> {
    match (now.weekday(), now.hour()) {
        (Weekday::Mon, 9) => Some("Monday morning! How are you feeling about the week?"),
        (Weekday::Fri, 17) => Some("Friday evening! Any plans for the weekend?"),
        (Weekday::Sun, 20) => Some("Sunday night. Ready for the week ahead?"),
        _ => None,
    }
}

// ============================================
// Scheduler
// ============================================

/// Background task ticking a [`ProactiveEngine`].
pub struct ProactiveMonitor {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl ProactiveMonitor {
    /// Spawn the tick loop on the current tokio runtime. The first tick runs
    /// immediately.
    pub fn start(
        engine: Arc<ProactiveEngine>,
        speaker: Arc<dyn Speaker>,
        tick: std::time::Duration,
    ) -> Self {
        let (shutdown, mut stop_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(tick_secs = tick.as_secs(), "Proactive monitor started");

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        if let Some(message) = engine.generate() {
                            speaker.speak_queued(&message.text, message.emotion);
                        }
                    }
                }
            }

            tracing::info!("Proactive monitor stopped");
        });

        Self {
            shutdown: Some(shutdown),
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop ticking and wait for the task to finish.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            tracing::warn!(error = %e, "Proactive monitor task failed");
        }
    }
}

impl Drop for ProactiveMonitor {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.handle.abort();
        }
    }
}
