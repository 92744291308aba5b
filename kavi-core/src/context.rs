//! Short-term conversation memory
//!
//! [`ConversationContext`] keeps the last few turns plus "last mentioned"
//! slots for a person, an app and a location. The memory is only applied while
//! it is fresh: once the configured timeout has elapsed since the last turn,
//! pronoun resolution, follow-up detection and topic suggestions behave as if
//! memory were empty. Going stale never erases anything; only
//! [`ConversationContext::clear`] does.

use crate::clock::Clock;
use crate::config::ContextConfig;
use crate::db::Database;
use crate::types::Parameters;
use chrono::{DateTime, FixedOffset};
use regex::{NoExpand, Regex};
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};

static PERSON_PRONOUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(him|her)\b").unwrap());
static APP_PRONOUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bit\b").unwrap());
static PLACE_PRONOUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bthere\b").unwrap());

const FOLLOW_UP_PREFIXES: &[&str] = &[
    "and",
    "also",
    "what about",
    "how about",
    "tell me more",
    "explain",
    "why",
    "how",
    "when",
    "where",
    "who",
];

/// One exchange between the user and the assistant.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub user_input: String,
    pub intent: String,
    pub entities: Parameters,
    pub response: String,
    pub timestamp: DateTime<FixedOffset>,
}

/// What the conversation is currently about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Communication,
    Apps,
    Navigation,
    Weather,
    Information,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Communication => "communication",
            Topic::Apps => "apps",
            Topic::Navigation => "navigation",
            Topic::Weather => "weather",
            Topic::Information => "information",
        }
    }

    /// Topic implied by an intent tag, if any.
    fn from_intent(intent: &str) -> Option<Topic> {
        if intent.contains("CALL") || intent.contains("MESSAGE") {
            Some(Topic::Communication)
        } else if intent.contains("APP") {
            Some(Topic::Apps)
        } else if intent.contains("NAVIGATE") {
            Some(Topic::Navigation)
        } else if intent.contains("WEATHER") {
            Some(Topic::Weather)
        } else if intent.contains("QUESTION") {
            Some(Topic::Information)
        } else {
            None
        }
    }
}

pub struct ConversationContext {
    clock: Arc<dyn Clock>,
    max_turns: usize,
    timeout: chrono::Duration,
    history: VecDeque<ConversationTurn>,
    topic: Option<Topic>,
    last_person: Option<String>,
    last_app: Option<String>,
    last_location: Option<String>,
    last_interaction: Option<DateTime<FixedOffset>>,
}

impl ConversationContext {
    pub fn new(clock: Arc<dyn Clock>, config: &ContextConfig) -> Self {
        Self {
            clock,
            max_turns: config.max_turns.max(1),
            timeout: chrono::Duration::from_std(config.timeout())
                .unwrap_or_else(|_| chrono::Duration::minutes(5)),
            history: VecDeque::with_capacity(config.max_turns),
            topic: None,
            last_person: None,
            last_app: None,
            last_location: None,
            last_interaction: None,
        }
    }

    /// Record a turn, evicting the oldest one beyond capacity.
    pub fn add_turn(&mut self, input: &str, intent: &str, entities: &Parameters, response: &str) {
        let now = self.clock.now();
        self.push_turn(input, intent, entities, response, now);
    }

    fn push_turn(
        &mut self,
        input: &str,
        intent: &str,
        entities: &Parameters,
        response: &str,
        at: DateTime<FixedOffset>,
    ) {
        self.history.push_back(ConversationTurn {
            user_input: input.to_string(),
            intent: intent.to_string(),
            entities: entities.clone(),
            response: response.to_string(),
            timestamp: at,
        });
        while self.history.len() > self.max_turns {
            self.history.pop_front();
        }

        if let Some(person) = entities.get("contact_name") {
            self.last_person = Some(person.clone());
        }
        if let Some(app) = entities.get("app_name") {
            self.last_app = Some(app.clone());
        }
        if let Some(location) = entities.get("location") {
            self.last_location = Some(location.clone());
        }
        if let Some(topic) = Topic::from_intent(intent) {
            self.topic = Some(topic);
        }

        self.last_interaction = Some(at);
        tracing::debug!(intent, turns = self.history.len(), "Added conversation turn");
    }

    /// Memory is applied strictly before the timeout; at exactly the timeout
    /// it is stale.
    pub fn is_valid(&self) -> bool {
        match self.last_interaction {
            Some(last) => self.clock.now() - last < self.timeout,
            None => false,
        }
    }

    /// Substitute him/her, it and there with the remembered person, app and
    /// location. Each pronoun type is replaced only when its slot is filled.
    pub fn resolve_pronoun(&self, input: &str) -> String {
        if !self.is_valid() {
            return input.to_string();
        }

        let mut resolved = input.to_string();
        let slots = [
            (&*PERSON_PRONOUN, &self.last_person),
            (&*APP_PRONOUN, &self.last_app),
            (&*PLACE_PRONOUN, &self.last_location),
        ];
        for (pattern, slot) in slots {
            if let Some(value) = slot {
                if pattern.is_match(&resolved) {
                    resolved = pattern
                        .replace_all(&resolved, NoExpand(value))
                        .into_owned();
                    tracing::debug!(value = %value, "Resolved pronoun");
                }
            }
        }
        resolved
    }

    pub fn is_follow_up_question(&self, input: &str) -> bool {
        if !self.is_valid() || self.history.is_empty() {
            return false;
        }

        let lower = input.to_lowercase();
        FOLLOW_UP_PREFIXES.iter().any(|p| lower.starts_with(p))
            || (lower.split(' ').count() <= 5 && lower.contains('?'))
    }

    pub fn topic_suggestion(&self) -> Option<String> {
        if !self.is_valid() {
            return None;
        }

        match self.topic? {
            Topic::Communication => self
                .last_person
                .as_ref()
                .map(|p| format!("Would you like to contact {} again?", p)),
            Topic::Apps => self
                .last_app
                .as_ref()
                .map(|a| format!("Want to open {} again?", a)),
            Topic::Navigation => self
                .last_location
                .as_ref()
                .map(|l| format!("Need directions to {}?", l)),
            Topic::Weather => Some("Want an updated weather report?".to_string()),
            Topic::Information => None,
        }
    }

    /// The last three turns as a transcript, empty when memory is stale.
    pub fn follow_up_context(&self) -> String {
        if !self.is_valid() || self.history.is_empty() {
            return String::new();
        }

        let skip = self.history.len().saturating_sub(3);
        let mut out = String::from("Recent conversation:\n");
        for turn in self.history.iter().skip(skip) {
            let _ = writeln!(out, "User: {}", turn.user_input);
            let _ = writeln!(out, "Kavi: {}", turn.response);
        }
        out
    }

    pub fn summary(&self) -> String {
        let none = "none";
        format!(
            "Conversation turns: {}\nCurrent topic: {}\nLast person: {}\nLast app: {}\nLast location: {}\nContext valid: {}",
            self.history.len(),
            self.topic.map(|t| t.as_str()).unwrap_or(none),
            self.last_person.as_deref().unwrap_or(none),
            self.last_app.as_deref().unwrap_or(none),
            self.last_location.as_deref().unwrap_or(none),
            self.is_valid(),
        )
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.topic = None;
        self.last_person = None;
        self.last_app = None;
        self.last_location = None;
        self.last_interaction = None;
        tracing::debug!("Context cleared");
    }

    /// Replay the most recent persisted commands, oldest first, keeping their
    /// original timestamps. Failures are logged and leave memory as it was.
    pub fn load_recent_history(&mut self, db: &Database, limit: usize) -> usize {
        let records = match db.recent_commands(limit) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load recent history");
                return 0;
            }
        };

        let offset = *self.clock.now().offset();
        let count = records.len();
        for record in records.into_iter().rev() {
            let at = record.timestamp.with_timezone(&offset);
            self.push_turn(&record.command, &record.intent, &record.parameters, "", at);
        }

        tracing::info!(count, "Loaded recent commands into conversation context");
        count
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn topic(&self) -> Option<Topic> {
        self.topic
    }
}
