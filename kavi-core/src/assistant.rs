//! The interactive pipeline
//!
//! One [`Assistant::process`] call takes a transcribed utterance through
//! pronoun resolution, classification, the command log, behavior tracking,
//! the personality reply, dispatch and finally the conversation memory.

use crate::clock::{start_of_day, Clock};
use crate::config::Config;
use crate::context::ConversationContext;
use crate::db::Database;
use crate::dispatch::ActionDispatcher;
use crate::intent::{classify, CommandResult, Intent};
use crate::personality::{PersonalityEngine, ResponseContext};
use crate::security::SecurityReport;
use crate::types::CommandRecord;
use crate::voice::{Emotion, Speaker};
use chrono::{Datelike, Timelike, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Same intent more often than this today is flagged repetitive.
const REPETITIVE_FREQUENCY: u32 = 3;
/// Same intent more often than this today is flagged excessive.
const EXCESSIVE_FREQUENCY: u32 = 10;

/// What happened to one utterance.
#[derive(Debug, Clone)]
pub struct Turn {
    /// The utterance after pronoun resolution
    pub command: String,
    pub result: CommandResult,
    /// Personality reply (empty for STOP)
    pub response: String,
    pub emotion: Emotion,
    /// Times this intent was seen since local midnight, this one included
    pub frequency: u32,
    /// False when a required parameter was missing
    pub executed: bool,
}

pub struct Assistant {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    speaker: Arc<dyn Speaker>,
    context: ConversationContext,
    personality: PersonalityEngine,
    dispatcher: ActionDispatcher,
}

impl Assistant {
    /// Build the pipeline and replay the configured number of persisted
    /// commands into the conversation memory.
    pub fn new(
        config: &Config,
        db: Arc<Database>,
        clock: Arc<dyn Clock>,
        speaker: Arc<dyn Speaker>,
        dispatcher: ActionDispatcher,
    ) -> Self {
        let mut context = ConversationContext::new(clock.clone(), &config.context);
        if config.context.history_replay > 0 {
            context.load_recent_history(&db, config.context.history_replay);
        }

        Self {
            personality: PersonalityEngine::new(clock.clone(), config.assistant.rng_seed),
            db,
            clock,
            speaker,
            context,
            dispatcher,
        }
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn personality(&self) -> &PersonalityEngine {
        &self.personality
    }

    /// Concern about a dominant recent intent, if any.
    pub fn insight(&self) -> Option<String> {
        self.personality.analyze_user_behavior(&self.db)
    }

    /// Wait for a security scan started by the last check, if any.
    pub fn wait_for_security_scan(&self) -> Option<SecurityReport> {
        self.dispatcher.wait_for_scan()
    }

    /// Run one utterance through the pipeline. Blank input is ignored.
    pub fn process(&mut self, utterance: &str) -> Option<Turn> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return None;
        }
        let started = Instant::now();

        let command = self.context.resolve_pronoun(utterance);
        let result = classify(&command);
        let intent = result.intent.as_str();
        let now = self.clock.now();

        let mut record = CommandRecord::new(
            &command,
            intent,
            result.parameters.clone(),
            now.with_timezone(&Utc),
        );
        record.execution_time_ms = started.elapsed().as_millis() as i64;
        if let Err(e) = self.db.insert_command(&record) {
            tracing::warn!(error = %e, "Failed to log command");
        }

        let action = canonical_action(&result);
        if let Err(e) = self.db.upsert_behavior_pattern(
            &action,
            now.hour(),
            now.weekday().number_from_monday(),
            now.with_timezone(&Utc),
        ) {
            tracing::warn!(error = %e, action = %action, "Failed to update behavior pattern");
        }

        let midnight = start_of_day(now).with_timezone(&Utc);
        let frequency = match self.db.intent_count_since(intent, midnight) {
            Ok(count) => u32::try_from(count).unwrap_or(u32::MAX),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to count today's commands");
                1
            }
        };

        let (response, emotion) = if result.intent == Intent::Stop {
            (String::new(), Emotion::Neutral)
        } else {
            let situation = ResponseContext {
                frequency,
                is_repetitive: frequency > REPETITIVE_FREQUENCY,
                is_excessive: frequency > EXCESSIVE_FREQUENCY,
            };
            let (text, emotion) = self
                .personality
                .generate_response(&command, intent, &situation);
            self.speaker.speak(&text, emotion);
            (text, emotion)
        };

        let executed = self.dispatcher.execute(&result);
        self.context
            .add_turn(&command, intent, &result.parameters, &response);

        tracing::info!(
            intent,
            frequency,
            executed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Processed utterance"
        );

        Some(Turn {
            command,
            result,
            response,
            emotion,
            frequency,
            executed,
        })
    }
}

/// Name under which an action is tracked as a habit, e.g. `open_instagram`.
pub fn canonical_action(result: &CommandResult) -> String {
    match (result.intent, result.param("app_name")) {
        (Intent::OpenApp, Some(app)) if !app.trim().is_empty() => {
            let app = app.split_whitespace().collect::<Vec<_>>().join("_");
            format!("open_{}", app.to_lowercase())
        }
        (intent, _) => intent.as_str().to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_action() {
        assert_eq!(canonical_action(&classify("open Instagram")), "open_instagram");
        assert_eq!(canonical_action(&classify("launch google maps")), "open_google_maps");
        assert_eq!(canonical_action(&classify("what's the weather")), "weather");
        assert_eq!(canonical_action(&classify("call mom")), "make_call");
        assert_eq!(
            canonical_action(&CommandResult::new(Intent::OpenApp, 0.9)),
            "open_app"
        );
    }
}
