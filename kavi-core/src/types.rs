//! Persisted domain records
//!
//! | Record | Written by | Read by |
//! |--------|------------|---------|
//! | [`CommandRecord`] | the assistant pipeline, once per utterance | context replay, personality, proactive triggers |
//! | [`BehaviorPattern`] | the assistant pipeline, upserted per canonical action | proactive pattern triggers |
//! | [`ProactiveInteraction`] | the proactive engine, once per emitted message | audit only |
//!
//! Timestamps are stored in UTC; hour-of-day and weekday fields are recorded in
//! the device's local time at the moment of observation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named slot values extracted from an utterance.
pub type Parameters = BTreeMap<String, String>;

// ============================================
// Command history
// ============================================

/// One processed utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    /// Database row id (0 before insert)
    pub id: i64,
    /// The utterance after pronoun resolution
    pub command: String,
    pub timestamp: DateTime<Utc>,
    /// Intent tag, e.g. `OPEN_APP`
    pub intent: String,
    pub parameters: Parameters,
    pub success: bool,
    pub execution_time_ms: i64,
}

impl CommandRecord {
    pub fn new(command: &str, intent: &str, parameters: Parameters, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            command: command.to_string(),
            timestamp,
            intent: intent.to_string(),
            parameters,
            success: true,
            execution_time_ms: 0,
        }
    }
}

// ============================================
// Behavior patterns
// ============================================

/// How often a canonical action happens at a given hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorPattern {
    pub id: i64,
    /// Canonical action name, e.g. `open_instagram`
    pub action: String,
    /// Local hour, 0-23
    pub time_of_day: u32,
    /// Local weekday, 1 (Monday) to 7 (Sunday)
    pub day_of_week: u32,
    pub frequency: i64,
    pub last_occurrence: DateTime<Utc>,
    /// Running mean of the gap between occurrences
    pub average_interval_ms: i64,
}

// ============================================
// Proactive interactions
// ============================================

/// Which trigger category produced a proactive message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    TimeBased,
    PatternBased,
    AnomalyBased,
    ContextBased,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::TimeBased => "time_based",
            TriggerType::PatternBased => "pattern_based",
            TriggerType::AnomalyBased => "anomaly_based",
            TriggerType::ContextBased => "context_based",
        }
    }
}

impl std::str::FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time_based" => Ok(TriggerType::TimeBased),
            "pattern_based" => Ok(TriggerType::PatternBased),
            "anomaly_based" => Ok(TriggerType::AnomalyBased),
            "context_based" => Ok(TriggerType::ContextBased),
            _ => Err(format!("unknown trigger type: {}", s)),
        }
    }
}

/// Audit entry for an unsolicited message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProactiveInteraction {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub trigger: TriggerType,
    pub user_response: Option<String>,
    pub was_positive: Option<bool>,
}
