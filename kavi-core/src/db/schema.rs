//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: assistant history
    r#"
    -- ============================================
    -- Command history (append-only)
    -- ============================================

    CREATE TABLE IF NOT EXISTS command_history (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        command            TEXT NOT NULL,
        ts                 DATETIME NOT NULL,
        intent             TEXT NOT NULL,
        parameters         JSON NOT NULL,
        success            INTEGER NOT NULL DEFAULT 1,
        execution_time_ms  INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_command_history_ts ON command_history(ts);
    CREATE INDEX IF NOT EXISTS idx_command_history_intent ON command_history(intent, ts);

    -- ============================================
    -- Behavior patterns (upserted per action and hour)
    -- ============================================

    CREATE TABLE IF NOT EXISTS behavior_patterns (
        id                   INTEGER PRIMARY KEY AUTOINCREMENT,
        action               TEXT NOT NULL,
        time_of_day          INTEGER NOT NULL,
        day_of_week          INTEGER NOT NULL,
        frequency            INTEGER NOT NULL DEFAULT 1,
        last_occurrence      DATETIME NOT NULL,
        average_interval_ms  INTEGER NOT NULL DEFAULT 0,

        UNIQUE(action, time_of_day)
    );

    CREATE INDEX IF NOT EXISTS idx_behavior_patterns_hour ON behavior_patterns(time_of_day);

    -- ============================================
    -- Proactive interactions (audit)
    -- ============================================

    CREATE TABLE IF NOT EXISTS proactive_interactions (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        ts             DATETIME NOT NULL,
        message        TEXT NOT NULL,
        trigger        TEXT NOT NULL,
        user_response  TEXT,
        was_positive   INTEGER
    );
    "#,
    // Version 2: security report log
    r#"
    CREATE TABLE IF NOT EXISTS security_reports (
        id            TEXT PRIMARY KEY,
        ts            DATETIME NOT NULL,
        threat_level  TEXT NOT NULL,
        total_score   INTEGER NOT NULL,
        summary       TEXT NOT NULL,
        threats       JSON NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_security_reports_ts ON security_reports(ts);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
