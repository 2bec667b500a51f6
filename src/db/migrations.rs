use anyhow::{bail, Context, Result};
use rusqlite::{Connection, Transaction};

const CURRENT_SCHEMA_VERSION: i32 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE frame_records (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    label TEXT NOT NULL,
    confidence REAL NOT NULL,
    scores TEXT NOT NULL,
    stress_score INTEGER NOT NULL
);
CREATE INDEX idx_frame_records_session ON frame_records(session_id);
CREATE INDEX idx_frame_records_user_time ON frame_records(user_id, timestamp);

CREATE TABLE session_summaries (
    session_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT NOT NULL,
    duration_minutes REAL NOT NULL,
    entry_count INTEGER NOT NULL,
    emotion_distribution TEXT NOT NULL,
    dominant_emotion TEXT,
    average_stress REAL NOT NULL,
    min_stress INTEGER NOT NULL,
    max_stress INTEGER NOT NULL,
    stress_level TEXT NOT NULL,
    average_confidence REAL NOT NULL,
    quality_score REAL NOT NULL,
    recommendations TEXT NOT NULL,
    warning TEXT
);
CREATE INDEX idx_session_summaries_user ON session_summaries(user_id);

CREATE TABLE alerts (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    alert_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    message TEXT NOT NULL,
    metadata TEXT NOT NULL,
    acknowledged INTEGER NOT NULL DEFAULT 0,
    acknowledged_at TEXT,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);
CREATE INDEX idx_alerts_user_type_time ON alerts(user_id, alert_type, created_at);
CREATE INDEX idx_alerts_user_time ON alerts(user_id, created_at);
";

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mut version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    if version > CURRENT_SCHEMA_VERSION {
        bail!(
            "database version ({}) is newer than supported schema ({})",
            version,
            CURRENT_SCHEMA_VERSION
        );
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)
            .with_context(|| format!("migration to version {next_version} failed"))?;
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<()> {
    match version {
        1 => tx
            .execute_batch(SCHEMA_V1)
            .context("failed to execute schema v1"),
        other => bail!("unknown schema version {other}"),
    }
}
