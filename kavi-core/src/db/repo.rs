//! Database repository layer
//!
//! Provides query and insert operations for all persisted record types.

use crate::error::{Error, Result};
use crate::security::{DetectedThreat, SecurityReport, ThreatLevel};
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;

/// Timestamps are written with a fixed width and `Z` suffix so that string
/// comparison in SQL matches chronological order.
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Read an RFC 3339 column; a malformed value is a conversion error.
fn parse_ts(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            let idx = row.as_ref().column_index(column).unwrap_or(0);
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        })
}

/// Database handle with a single guarded connection
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    // ============================================
    // Command history operations
    // ============================================

    /// Append a processed command, returning its row id
    pub fn insert_command(&self, record: &CommandRecord) -> Result<i64> {
        let parameters = serde_json::to_string(&record.parameters)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO command_history
                (command, ts, intent, parameters, success, execution_time_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.command,
                ts(&record.timestamp),
                record.intent,
                parameters,
                record.success,
                record.execution_time_ms,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The `limit` most recent commands, newest first
    pub fn recent_commands(&self, limit: usize) -> Result<Vec<CommandRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM command_history ORDER BY ts DESC, id DESC LIMIT ?",
        )?;
        let rows = stmt.query_map([limit as i64], Self::row_to_command)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    /// Commands at or after `since`, oldest first
    pub fn commands_since(&self, since: DateTime<Utc>) -> Result<Vec<CommandRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM command_history WHERE ts >= ? ORDER BY ts ASC, id ASC")?;
        let rows = stmt.query_map([ts(&since)], Self::row_to_command)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    /// Number of commands at or after `since`
    pub fn command_count_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM command_history WHERE ts >= ?",
            [ts(&since)],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// Number of commands with `intent` at or after `since`
    pub fn intent_count_since(&self, intent: &str, since: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM command_history WHERE intent = ?1 AND ts >= ?2",
            params![intent, ts(&since)],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    fn row_to_command(row: &Row) -> rusqlite::Result<CommandRecord> {
        let parameters_str: String = row.get("parameters")?;

        Ok(CommandRecord {
            id: row.get("id")?,
            command: row.get("command")?,
            timestamp: parse_ts(row, "ts")?,
            intent: row.get("intent")?,
            parameters: serde_json::from_str(&parameters_str).unwrap_or_default(),
            success: row.get("success")?,
            execution_time_ms: row.get("execution_time_ms")?,
        })
    }

    // ============================================
    // Behavior pattern operations
    // ============================================

    /// Record one occurrence of `action` at local `hour` / `weekday`.
    ///
    /// The first occurrence creates the pattern with frequency 1. Later ones
    /// bump the frequency and fold the gap since the previous occurrence into
    /// the running average interval.
    pub fn upsert_behavior_pattern(
        &self,
        action: &str,
        hour: u32,
        weekday: u32,
        at: DateTime<Utc>,
    ) -> Result<BehaviorPattern> {
        let conn = self.conn.lock().unwrap();

        let existing = conn
            .query_row(
                "SELECT * FROM behavior_patterns WHERE action = ?1 AND time_of_day = ?2",
                params![action, hour],
                Self::row_to_pattern,
            )
            .optional()?;

        let pattern = match existing {
            Some(mut pattern) => {
                let gap_ms = (at - pattern.last_occurrence).num_milliseconds().max(0);
                // Imported rows may carry frequency 0
                let seen = pattern.frequency.max(1);
                let gaps_before = seen - 1;
                pattern.average_interval_ms =
                    (pattern.average_interval_ms * gaps_before + gap_ms) / seen;
                pattern.frequency = seen + 1;
                pattern.day_of_week = weekday;
                pattern.last_occurrence = at;

                conn.execute(
                    r#"
                    UPDATE behavior_patterns SET
                        frequency = ?1,
                        day_of_week = ?2,
                        last_occurrence = ?3,
                        average_interval_ms = ?4
                    WHERE id = ?5
                    "#,
                    params![
                        pattern.frequency,
                        pattern.day_of_week,
                        ts(&pattern.last_occurrence),
                        pattern.average_interval_ms,
                        pattern.id,
                    ],
                )?;
                pattern
            }
            None => {
                conn.execute(
                    r#"
                    INSERT INTO behavior_patterns
                        (action, time_of_day, day_of_week, frequency, last_occurrence, average_interval_ms)
                    VALUES (?1, ?2, ?3, 1, ?4, 0)
                    "#,
                    params![action, hour, weekday, ts(&at)],
                )?;
                BehaviorPattern {
                    id: conn.last_insert_rowid(),
                    action: action.to_string(),
                    time_of_day: hour,
                    day_of_week: weekday,
                    frequency: 1,
                    last_occurrence: at,
                    average_interval_ms: 0,
                }
            }
        };

        Ok(pattern)
    }

    /// Insert or replace a pattern wholesale (imports and tests)
    pub fn put_behavior_pattern(&self, pattern: &BehaviorPattern) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO behavior_patterns
                (action, time_of_day, day_of_week, frequency, last_occurrence, average_interval_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(action, time_of_day) DO UPDATE SET
                day_of_week = excluded.day_of_week,
                frequency = excluded.frequency,
                last_occurrence = excluded.last_occurrence,
                average_interval_ms = excluded.average_interval_ms
            "#,
            params![
                pattern.action,
                pattern.time_of_day,
                pattern.day_of_week,
                pattern.frequency,
                ts(&pattern.last_occurrence),
                pattern.average_interval_ms,
            ],
        )?;
        Ok(())
    }

    /// Patterns observed at local `hour`, most frequent first
    pub fn patterns_by_hour(&self, hour: u32) -> Result<Vec<BehaviorPattern>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM behavior_patterns WHERE time_of_day = ? ORDER BY frequency DESC, action ASC",
        )?;
        let rows = stmt.query_map([hour], Self::row_to_pattern)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    fn row_to_pattern(row: &Row) -> rusqlite::Result<BehaviorPattern> {
        Ok(BehaviorPattern {
            id: row.get("id")?,
            action: row.get("action")?,
            time_of_day: row.get("time_of_day")?,
            day_of_week: row.get("day_of_week")?,
            frequency: row.get("frequency")?,
            last_occurrence: parse_ts(row, "last_occurrence")?,
            average_interval_ms: row.get("average_interval_ms")?,
        })
    }

    // ============================================
    // Proactive interaction operations
    // ============================================

    pub fn insert_proactive_interaction(&self, interaction: &ProactiveInteraction) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO proactive_interactions (ts, message, trigger, user_response, was_positive)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                ts(&interaction.timestamp),
                interaction.message,
                interaction.trigger.as_str(),
                interaction.user_response,
                interaction.was_positive,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Attach the user's reaction to an earlier proactive message
    pub fn record_proactive_response(
        &self,
        id: i64,
        response: &str,
        was_positive: bool,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE proactive_interactions SET user_response = ?1, was_positive = ?2 WHERE id = ?3",
            params![response, was_positive, id],
        )?;
        Ok(())
    }

    /// The `limit` most recent proactive messages, newest first
    pub fn recent_proactive_interactions(&self, limit: usize) -> Result<Vec<ProactiveInteraction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM proactive_interactions ORDER BY ts DESC, id DESC LIMIT ?",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            let trigger_str: String = row.get("trigger")?;
            Ok(ProactiveInteraction {
                id: row.get("id")?,
                timestamp: parse_ts(row, "ts")?,
                message: row.get("message")?,
                trigger: trigger_str.parse().unwrap_or(TriggerType::ContextBased),
                user_response: row.get("user_response")?,
                was_positive: row.get("was_positive")?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    // ============================================
    // Security report operations
    // ============================================

    pub fn insert_security_report(&self, report: &SecurityReport) -> Result<()> {
        let threats = serde_json::to_string(&report.threats)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO security_reports (id, ts, threat_level, total_score, summary, threats)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                report.id,
                ts(&report.generated_at),
                report.threat_level.as_str(),
                report.total_score,
                report.summary,
                threats,
            ],
        )?;
        Ok(())
    }

    /// The `limit` most recent reports, newest first
    pub fn recent_security_reports(&self, limit: usize) -> Result<Vec<SecurityReport>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM security_reports ORDER BY ts DESC LIMIT ?")?;
        let rows = stmt.query_map([limit as i64], |row| {
            let level_str: String = row.get("threat_level")?;
            let threats_str: String = row.get("threats")?;
            let threats: Vec<DetectedThreat> =
                serde_json::from_str(&threats_str).unwrap_or_default();
            Ok(SecurityReport {
                id: row.get("id")?,
                generated_at: parse_ts(row, "ts")?,
                threat_level: level_str.parse().unwrap_or(ThreatLevel::Safe),
                total_score: row.get("total_score")?,
                threats,
                summary: row.get("summary")?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{Severity, ThreatType};
    use chrono::{Duration, TimeZone};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, hour, minute, 0).unwrap()
    }

    fn command(text: &str, intent: &str, when: DateTime<Utc>) -> CommandRecord {
        let mut parameters = Parameters::new();
        parameters.insert("query".to_string(), text.to_string());
        CommandRecord::new(text, intent, parameters, when)
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/kavi.db");
        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_recent_commands_newest_first() {
        let db = test_db();
        db.insert_command(&command("first", "SEARCH_WEB", at(9, 0))).unwrap();
        db.insert_command(&command("second", "SEARCH_WEB", at(9, 5))).unwrap();
        db.insert_command(&command("third", "WEATHER", at(9, 10))).unwrap();

        let recent = db.recent_commands(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].command, "third");
        assert_eq!(recent[1].command, "second");
        assert_eq!(recent[1].parameters.get("query").unwrap(), "second");
    }

    #[test]
    fn test_counts_since() {
        let db = test_db();
        db.insert_command(&command("a", "OPEN_APP", at(8, 0))).unwrap();
        db.insert_command(&command("b", "OPEN_APP", at(10, 0))).unwrap();
        db.insert_command(&command("c", "WEATHER", at(11, 0))).unwrap();

        assert_eq!(db.command_count_since(at(9, 0)).unwrap(), 2);
        assert_eq!(db.intent_count_since("OPEN_APP", at(9, 0)).unwrap(), 1);
        assert_eq!(db.intent_count_since("OPEN_APP", at(7, 0)).unwrap(), 2);

        let window = db.commands_since(at(10, 0)).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].command, "b");
    }

    #[test]
    fn test_upsert_behavior_pattern_tracks_interval() {
        let db = test_db();
        let first = db.upsert_behavior_pattern("open_email", 9, 1, at(9, 0)).unwrap();
        assert_eq!(first.frequency, 1);
        assert_eq!(first.average_interval_ms, 0);

        let start = at(9, 0);
        db.upsert_behavior_pattern("open_email", 9, 2, start + Duration::days(1))
            .unwrap();
        let third = db
            .upsert_behavior_pattern("open_email", 9, 4, start + Duration::days(3))
            .unwrap();

        assert_eq!(third.frequency, 3);
        assert_eq!(third.day_of_week, 4);
        assert_eq!(
            third.average_interval_ms,
            Duration::days(1).num_milliseconds() * 3 / 2
        );
    }

    #[test]
    fn test_patterns_by_hour_sorted_by_frequency() {
        let db = test_db();
        for _ in 0..3 {
            db.upsert_behavior_pattern("open_email", 9, 1, at(9, 0)).unwrap();
        }
        db.upsert_behavior_pattern("make_coffee", 9, 1, at(9, 0)).unwrap();
        db.upsert_behavior_pattern("open_workout", 18, 1, at(18, 0)).unwrap();

        let patterns = db.patterns_by_hour(9).unwrap();
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].action, "open_email");
        assert_eq!(patterns[0].frequency, 3);
        assert_eq!(patterns[1].action, "make_coffee");
    }

    #[test]
    fn test_upsert_over_zero_frequency_row() {
        let db = test_db();
        db.put_behavior_pattern(&BehaviorPattern {
            id: 0,
            action: "open_email".to_string(),
            time_of_day: 9,
            day_of_week: 1,
            frequency: 0,
            last_occurrence: at(8, 0),
            average_interval_ms: 0,
        })
        .unwrap();

        let pattern = db.upsert_behavior_pattern("open_email", 9, 1, at(9, 0)).unwrap();
        assert_eq!(pattern.frequency, 2);
        assert_eq!(pattern.average_interval_ms, Duration::hours(1).num_milliseconds());

        // Connection is still usable afterwards
        assert_eq!(db.patterns_by_hour(9).unwrap()[0].frequency, 2);
        db.insert_command(&command("a", "WEATHER", at(9, 1))).unwrap();
    }

    #[test]
    fn test_corrupt_timestamp_is_an_error() {
        let db = test_db();
        db.insert_command(&command("good", "WEATHER", at(9, 0))).unwrap();
        db.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO command_history (command, ts, intent, parameters, success, execution_time_ms)
                 VALUES ('bad', 'not-a-time', 'WEATHER', '{}', 1, 0)",
                [],
            )
            .unwrap();

        let err = db.recent_commands(10).unwrap_err();
        assert!(matches!(
            err,
            Error::Database(rusqlite::Error::FromSqlConversionFailure(..))
        ));
    }

    #[test]
    fn test_proactive_interaction_roundtrip_with_response() {
        let db = test_db();
        let id = db
            .insert_proactive_interaction(&ProactiveInteraction {
                id: 0,
                timestamp: at(12, 10),
                message: "It's lunchtime. Have you eaten yet?".to_string(),
                trigger: TriggerType::TimeBased,
                user_response: None,
                was_positive: None,
            })
            .unwrap();
        db.record_proactive_response(id, "yes", true).unwrap();

        let recent = db.recent_proactive_interactions(5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].trigger, TriggerType::TimeBased);
        assert_eq!(recent[0].user_response.as_deref(), Some("yes"));
        assert_eq!(recent[0].was_positive, Some(true));
    }

    #[test]
    fn test_security_report_log() {
        let db = test_db();
        let report = SecurityReport {
            id: "r-1".to_string(),
            generated_at: at(3, 0),
            threat_level: ThreatLevel::Medium,
            total_score: 30,
            threats: vec![DetectedThreat {
                threat_type: ThreatType::SpywarePermissionCombo,
                severity: Severity::Dangerous,
                description: "High Risk: Can record audio and draw over other apps.".to_string(),
                package_name: Some("com.example.spy".to_string()),
                score: 30,
            }],
            summary: "Threat Level: MEDIUM. Found 1 issues.".to_string(),
        };
        db.insert_security_report(&report).unwrap();

        let reports = db.recent_security_reports(10).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].threat_level, ThreatLevel::Medium);
        assert_eq!(reports[0].threats[0].score, 30);
        assert_eq!(
            reports[0].threats[0].package_name.as_deref(),
            Some("com.example.spy")
        );
    }
}
