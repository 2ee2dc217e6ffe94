// SPDX-License-Identifier: MIT OR Apache-2.0
//! Schema setup. The `messages` table is versioned with `PRAGMA
//! user_version`; `message_traces` shares the same database file but is
//! versioned independently by checking for its own existence, since it is
//! owned by a different subsystem and a shared counter would couple their
//! migrations together.

use rusqlite::Connection;

use crate::error::IndexError;

const MESSAGES_SCHEMA_VERSION: i64 = 1;

pub(crate) fn apply_pragmas(conn: &Connection) -> Result<(), IndexError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

pub(crate) fn ensure_messages_schema(conn: &Connection) -> Result<(), IndexError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version >= MESSAGES_SCHEMA_VERSION {
        return Ok(());
    }

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            subject TEXT NOT NULL,
            sender TEXT NOT NULL,
            endpoint_hash TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            ttl INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_subject ON messages(subject);
        CREATE INDEX IF NOT EXISTS idx_messages_endpoint_created
            ON messages(endpoint_hash, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_messages_status ON messages(status);
        CREATE INDEX IF NOT EXISTS idx_messages_ttl ON messages(ttl);",
    )?;

    conn.pragma_update(None, "user_version", MESSAGES_SCHEMA_VERSION)?;
    Ok(())
}

pub(crate) fn ensure_traces_schema(conn: &Connection) -> Result<(), IndexError> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'message_traces'",
        [],
        |row| row.get::<_, i64>(0).map(|c| c > 0),
    )?;
    if exists {
        return Ok(());
    }

    conn.execute_batch(
        "CREATE TABLE message_traces (
            message_id TEXT PRIMARY KEY,
            trace_id TEXT NOT NULL,
            span_id TEXT NOT NULL,
            parent_span_id TEXT,
            subject TEXT NOT NULL,
            from_endpoint TEXT NOT NULL,
            to_endpoint TEXT NOT NULL,
            status TEXT NOT NULL,
            budget_hops_used INTEGER NOT NULL,
            budget_ttl_remaining_ms INTEGER NOT NULL,
            sent_at TEXT NOT NULL,
            delivered_at TEXT,
            processed_at TEXT,
            error TEXT
        );
        CREATE INDEX idx_traces_trace_id ON message_traces(trace_id);
        CREATE INDEX idx_traces_subject ON message_traces(subject);
        CREATE INDEX idx_traces_sent_at ON message_traces(sent_at DESC);
        CREATE INDEX idx_traces_dead_lettered ON message_traces(status)
            WHERE status = 'dead_lettered';",
    )?;

    Ok(())
}
