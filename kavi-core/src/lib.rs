//! # kavi-core
//!
//! Core library for Kavi, a personality-driven voice assistant.
//!
//! This library provides:
//! - Rule-based intent classification with slot extraction
//! - Short-term conversation memory with pronoun resolution
//! - Personality-colored replies and proactive (unsolicited) messages
//! - Action dispatch onto pluggable platform collaborators
//! - A weighted security risk aggregator over a device inventory
//! - SQLite persistence, configuration and logging
//!
//! ## Architecture
//!
//! An utterance flows through [`Assistant::process`]:
//! resolve pronouns → [`classify`] → log → personality reply → dispatch →
//! record the turn. The [`ProactiveMonitor`] and [`SecurityReporter`] run on
//! their own and speak through the same [`voice::Speaker`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use kavi_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use assistant::{Assistant, Turn};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use context::ConversationContext;
pub use db::Database;
pub use dispatch::ActionDispatcher;
pub use error::{Error, Result};
pub use intent::{classify, CommandResult, Intent};
pub use personality::{PersonalityEngine, ResponseContext, ResponseStyle};
pub use platform::{Platform, SimulatedDevice};
pub use proactive::{ProactiveEngine, ProactiveMessage, ProactiveMonitor};
pub use security::{
    create_default_analyzer, DeviceSnapshot, SecurityReport, SecurityReporter, ThreatAnalyzer,
    ThreatLevel,
};
pub use types::*;
pub use voice::{Emotion, Speaker, VoiceQueue};

// Public modules
pub mod assistant;
pub mod canned;
pub mod clock;
pub mod config;
pub mod context;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod intent;
pub mod logging;
pub mod personality;
pub mod platform;
pub mod proactive;
pub mod question;
pub mod security;
pub mod types;
pub mod voice;
