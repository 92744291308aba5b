//! Personality-driven responses
//!
//! Maps a classified command plus its situation (how often it happened today,
//! the hour, whether it looks excessive) to a spoken reply and an [`Emotion`].
//! Style selection is deterministic; only the phrasing within a style's pool is
//! random.

use crate::canned::Picker;
use crate::clock::Clock;
use crate::db::Database;
use crate::voice::Emotion;
use chrono::Timelike;
use std::collections::HashMap;
use std::sync::Arc;

/// How the assistant colors a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStyle {
    Helpful,
    Concerned,
    Playful,
    Encouraging,
    Questioning,
    Protective,
    Neutral,
}

impl ResponseStyle {
    pub fn emotion(&self) -> Emotion {
        match self {
            ResponseStyle::Helpful => Emotion::Neutral,
            ResponseStyle::Concerned => Emotion::Concerned,
            ResponseStyle::Playful => Emotion::Playful,
            ResponseStyle::Encouraging => Emotion::Happy,
            ResponseStyle::Questioning => Emotion::Curious,
            ResponseStyle::Protective => Emotion::Serious,
            ResponseStyle::Neutral => Emotion::Neutral,
        }
    }
}

/// Situational facts about the command being answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseContext {
    /// Times the same intent was seen today, this one included
    pub frequency: u32,
    pub is_excessive: bool,
    pub is_repetitive: bool,
}

const HELPFUL: &[&str] = &[
    "I'll help you with that.",
    "On it!",
    "Sure thing!",
    "Got it, let me handle that.",
    "Consider it done.",
];

const LATE_NIGHT: &[&str] = &[
    "It's pretty late. Shouldn't you be sleeping?",
    "You're still up? Don't you have work tomorrow?",
    "Late night again? This is becoming a pattern.",
    "I'm worried about your sleep schedule.",
];

const INSTAGRAM: &[&str] = &[
    "Instagram again? What are you looking for this time?",
    "More scrolling? Productive day, huh?",
    "Let me guess, just checking quickly?",
];

const ENCOURAGING: &[&str] = &[
    "Great choice! Keep it up!",
    "I'm proud of you for doing this!",
    "That's the spirit!",
    "Good for you!",
    "Love to see this!",
];

const QUESTIONING: &[&str] = &[
    "Why do you keep doing this?",
    "What's the reason behind this?",
    "I'm curious - why now?",
    "Can I ask why you're doing this again?",
];

const PROTECTIVE: &[&str] = &[
    "I don't think that's a good idea.",
    "This might not be healthy for you.",
    "You're overdoing it. Maybe take a break?",
    "I'm concerned about this pattern.",
    "That's too much. You should slow down.",
];

const NEUTRAL: &[&str] = &["Done.", "Okay.", "Sure.", "Alright."];

/// Recent commands inspected by [`PersonalityEngine::analyze_user_behavior`].
const BEHAVIOR_WINDOW: usize = 50;

/// Late night is 23:00 up to (not including) 06:00.
pub fn is_late_night(hour: u32) -> bool {
    hour >= 23 || hour < 6
}

pub struct PersonalityEngine {
    clock: Arc<dyn Clock>,
    picker: Picker,
}

impl PersonalityEngine {
    pub fn new(clock: Arc<dyn Clock>, seed: Option<u64>) -> Self {
        Self {
            clock,
            picker: Picker::new(seed),
        }
    }

    /// Reply text and emotion for a command.
    pub fn generate_response(
        &self,
        command: &str,
        intent: &str,
        context: &ResponseContext,
    ) -> (String, Emotion) {
        let style = self.response_style(intent, context);
        let text = self.phrase(style, command, context);
        tracing::debug!(intent, style = ?style, "Generated personality response");
        (text, style.emotion())
    }

    /// First matching rule wins: repetition, late night, positive habit,
    /// excess, then plain helpfulness.
    pub fn response_style(&self, intent: &str, context: &ResponseContext) -> ResponseStyle {
        if context.frequency > 3 {
            return ResponseStyle::Playful;
        }
        if is_late_night(self.clock.now().hour()) {
            return ResponseStyle::Concerned;
        }
        if intent == "EXERCISE" || intent == "STUDY" {
            return ResponseStyle::Encouraging;
        }
        if context.is_excessive {
            return ResponseStyle::Protective;
        }
        ResponseStyle::Helpful
    }

    /// Phrase a reply in the given style.
    pub fn phrase(&self, style: ResponseStyle, command: &str, context: &ResponseContext) -> String {
        match style {
            ResponseStyle::Helpful => self.picker.pick(HELPFUL).to_string(),
            ResponseStyle::Concerned => {
                if is_late_night(self.clock.now().hour()) {
                    self.picker.pick(LATE_NIGHT).to_string()
                } else if context.is_repetitive {
                    "You've done this a lot today. Everything okay?".to_string()
                } else {
                    "Are you sure about this?".to_string()
                }
            }
            ResponseStyle::Playful => {
                if context.frequency > 5 {
                    let pool = [
                        "Again? Seriously?".to_string(),
                        format!("This is the {}th time today!", context.frequency),
                        "You really love this, don't you?".to_string(),
                        "I'm starting to see a pattern here...".to_string(),
                    ];
                    self.picker.pick_owned(&pool)
                } else if command.to_lowercase().contains("instagram") {
                    self.picker.pick(INSTAGRAM).to_string()
                } else {
                    "Alright, if you say so!".to_string()
                }
            }
            ResponseStyle::Encouraging => self.picker.pick(ENCOURAGING).to_string(),
            ResponseStyle::Questioning => self.picker.pick(QUESTIONING).to_string(),
            ResponseStyle::Protective => self.picker.pick(PROTECTIVE).to_string(),
            ResponseStyle::Neutral => self.picker.pick(NEUTRAL).to_string(),
        }
    }

    /// A concern message when one intent dominates recent history.
    ///
    /// Persistence failures yield `None`.
    pub fn analyze_user_behavior(&self, db: &Database) -> Option<String> {
        let recent = match db.recent_commands(BEHAVIOR_WINDOW) {
            Ok(recent) => recent,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read command history for behavior analysis");
                return None;
            }
        };

        // Insertion order breaks ties toward the most recent intent
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in &recent {
            let count = counts.entry(record.intent.as_str()).or_insert(0);
            if *count == 0 {
                order.push(record.intent.as_str());
            }
            *count += 1;
        }

        let mut top: Option<(&str, usize)> = None;
        for intent in order {
            let count = counts[intent];
            if top.map_or(true, |(_, best)| count > best) {
                top = Some((intent, count));
            }
        }

        match top {
            Some((intent, count)) if count > 5 => Some(format!(
                "I noticed you've been using {} a lot. Is everything alright?",
                intent
            )),
            _ => None,
        }
    }

    /// Empathetic reply to a detected emotional state.
    pub fn respond_to_emotion(&self, detected: &str) -> (String, Emotion) {
        let (text, emotion) = match detected.to_lowercase().as_str() {
            "stressed" => ("You sound stressed. Want to talk about it?", Emotion::Concerned),
            "happy" => ("You seem happy! That's great to hear!", Emotion::Happy),
            "tired" => ("You sound tired. Maybe you should rest?", Emotion::Calm),
            "frustrated" => ("I can tell you're frustrated. How can I help?", Emotion::Concerned),
            _ => ("How are you feeling?", Emotion::Neutral),
        };
        (text.to_string(), emotion)
    }
}
