// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`SqliteIndex`] — the derived query layer over the Maildir store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use relay_envelope::{IndexedMessage, MessageStatus, TraceSpan, TraceStatus};
use relay_maildir::MaildirStore;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::IndexError;
use crate::metrics::IndexMetrics;
use crate::schema;

/// A SQLite-backed index rebuildable from the Maildir filesystem. The
/// connection is wrapped in a mutex: SQLite serializes writers anyway and
/// this keeps the type `Sync` without a connection pool.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

fn status_to_str(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::New => "new",
        MessageStatus::Cur => "cur",
        MessageStatus::Failed => "failed",
        MessageStatus::Processed => "processed",
    }
}

fn status_from_str(s: &str) -> Result<MessageStatus, IndexError> {
    match s {
        "new" => Ok(MessageStatus::New),
        "cur" => Ok(MessageStatus::Cur),
        "failed" => Ok(MessageStatus::Failed),
        "processed" => Ok(MessageStatus::Processed),
        other => Err(IndexError::Unavailable(format!(
            "unknown message status {other:?} in index"
        ))),
    }
}

fn trace_status_to_str(status: TraceStatus) -> &'static str {
    match status {
        TraceStatus::Pending => "pending",
        TraceStatus::Delivered => "delivered",
        TraceStatus::Processed => "processed",
        TraceStatus::Failed => "failed",
        TraceStatus::DeadLettered => "dead_lettered",
    }
}

fn trace_status_from_str(s: &str) -> Result<TraceStatus, IndexError> {
    match s {
        "pending" => Ok(TraceStatus::Pending),
        "delivered" => Ok(TraceStatus::Delivered),
        "processed" => Ok(TraceStatus::Processed),
        "failed" => Ok(TraceStatus::Failed),
        "dead_lettered" => Ok(TraceStatus::DeadLettered),
        other => Err(IndexError::Unavailable(format!(
            "unknown trace status {other:?} in index"
        ))),
    }
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, IndexError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| IndexError::Unavailable(format!("bad timestamp {s:?}: {e}")))
}

impl SqliteIndex {
    /// Open (creating if absent) the database file at `path` and ensure
    /// both the `messages` and `message_traces` schemas exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;
        schema::apply_pragmas(&conn)?;
        schema::ensure_messages_schema(&conn)?;
        schema::ensure_traces_schema(&conn)?;
        info!(target: "relay.index", path = %path.as_ref().display(), "index opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database, useful for tests.
    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn =
            Connection::open_in_memory().map_err(|e| IndexError::Unavailable(e.to_string()))?;
        schema::apply_pragmas(&conn)?;
        schema::ensure_messages_schema(&conn)?;
        schema::ensure_traces_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// `INSERT OR REPLACE` a message row — indexing is idempotent.
    pub fn insert_message(&self, msg: &IndexedMessage) -> Result<(), IndexError> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO messages (id, subject, sender, endpoint_hash, status, created_at, ttl)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                msg.id,
                msg.subject,
                msg.sender,
                msg.endpoint_hash,
                status_to_str(msg.status),
                msg.created_at.to_rfc3339(),
                msg.ttl,
            ],
        )?;
        Ok(())
    }

    /// Update only the status column for an existing row.
    pub fn update_status(&self, id: &str, status: MessageStatus) -> Result<(), IndexError> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        conn.execute(
            "UPDATE messages SET status = ?1 WHERE id = ?2",
            params![status_to_str(status), id],
        )?;
        Ok(())
    }

    /// Fetch a single message row by id (the Maildir filename).
    pub fn get_message(&self, id: &str) -> Result<Option<IndexedMessage>, IndexError> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        conn.query_row(
            "SELECT id, subject, sender, endpoint_hash, status, created_at, ttl
             FROM messages WHERE id = ?1",
            params![id],
            Self::row_to_message,
        )
        .optional()
        .map_err(IndexError::from)?
        .transpose()
    }

    /// All messages for a concrete subject, newest first.
    pub fn get_by_subject(&self, subject: &str) -> Result<Vec<IndexedMessage>, IndexError> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, subject, sender, endpoint_hash, status, created_at, ttl
             FROM messages WHERE subject = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![subject], Self::row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }

    /// All messages for an endpoint hash, newest first.
    pub fn get_by_endpoint(&self, endpoint_hash: &str) -> Result<Vec<IndexedMessage>, IndexError> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, subject, sender, endpoint_hash, status, created_at, ttl
             FROM messages WHERE endpoint_hash = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![endpoint_hash], Self::row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }

    /// Count messages authored by `sender` with `created_at >= since`, for
    /// the rate limiter's sliding window.
    pub fn count_by_sender_since(&self, sender: &str, since: DateTime<Utc>) -> Result<u32, IndexError> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE sender = ?1 AND created_at >= ?2",
            params![sender, since.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    /// Delete rows whose `ttl` has passed `now_ms`. Returns the count removed.
    pub fn delete_expired(&self, now_ms: i64) -> Result<usize, IndexError> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        let removed = conn.execute("DELETE FROM messages WHERE ttl < ?1", params![now_ms])?;
        Ok(removed)
    }

    fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<IndexedMessage, IndexError>> {
        let status_str: String = row.get(4)?;
        let created_at_str: String = row.get(5)?;
        Ok((|| {
            Ok(IndexedMessage {
                id: row.get(0)?,
                subject: row.get(1)?,
                sender: row.get(2)?,
                endpoint_hash: row.get(3)?,
                status: status_from_str(&status_str)?,
                created_at: parse_rfc3339(&created_at_str)?,
                ttl: row.get(6)?,
            })
        })())
    }

    /// Drop all message rows and rescan every endpoint's `new/cur/failed`
    /// subdirectories, re-inserting with the Maildir filename as the row id.
    /// Returns the number of rows re-inserted.
    pub fn rebuild(
        &self,
        maildir: &MaildirStore,
        endpoint_hashes: &[String],
    ) -> Result<usize, IndexError> {
        {
            let conn = self.conn.lock().expect("index mutex poisoned");
            conn.execute("DELETE FROM messages", [])?;
        }

        let mut count = 0usize;
        for hash in endpoint_hashes {
            let mailbox = maildir.mailbox(hash);
            for (dir_name, status) in [
                ("new", MessageStatus::New),
                ("cur", MessageStatus::Cur),
                ("failed", MessageStatus::Failed),
            ] {
                let filenames = match dir_name {
                    "new" => mailbox.list_new()?,
                    "cur" => mailbox.list_cur()?,
                    _ => mailbox.list_failed()?,
                };
                for filename in filenames {
                    let envelope = match status {
                        MessageStatus::New => mailbox_read_new(maildir, hash, &filename),
                        MessageStatus::Cur => mailbox_read_cur(maildir, hash, &filename),
                        MessageStatus::Failed => mailbox_read_failed(maildir, hash, &filename),
                        MessageStatus::Processed => unreachable!(),
                    };
                    let Some(envelope) = envelope? else {
                        continue;
                    };
                    self.insert_message(&IndexedMessage {
                        id: filename,
                        subject: envelope.subject.clone(),
                        sender: envelope.from.clone(),
                        endpoint_hash: hash.clone(),
                        status,
                        created_at: envelope.created_at,
                        ttl: envelope.budget.ttl,
                    })?;
                    count += 1;
                }
            }
        }

        debug!(target: "relay.index", rows = count, "index rebuilt from maildir");
        Ok(count)
    }

    /// Insert or replace a trace span.
    pub fn record_span(&self, span: &TraceSpan) -> Result<(), IndexError> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO message_traces
                (message_id, trace_id, span_id, parent_span_id, subject, from_endpoint,
                 to_endpoint, status, budget_hops_used, budget_ttl_remaining_ms,
                 sent_at, delivered_at, processed_at, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                span.message_id,
                span.trace_id,
                span.span_id,
                span.parent_span_id,
                span.subject,
                span.from_endpoint,
                span.to_endpoint,
                trace_status_to_str(span.status),
                span.budget_hops_used,
                span.budget_ttl_remaining_ms,
                span.sent_at.to_rfc3339(),
                span.delivered_at.map(|t| t.to_rfc3339()),
                span.processed_at.map(|t| t.to_rfc3339()),
                span.error,
            ],
        )?;
        Ok(())
    }

    /// All spans sharing `trace_id`, ordered by send time.
    pub fn get_spans_by_trace(&self, trace_id: &str) -> Result<Vec<TraceSpan>, IndexError> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT message_id, trace_id, span_id, parent_span_id, subject, from_endpoint,
                    to_endpoint, status, budget_hops_used, budget_ttl_remaining_ms,
                    sent_at, delivered_at, processed_at, error
             FROM message_traces WHERE trace_id = ?1 ORDER BY sent_at ASC",
        )?;
        let rows = stmt
            .query_map(params![trace_id], Self::row_to_span)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }

    /// Every span currently marked `dead_lettered`, via the partial index.
    pub fn get_dead_lettered_spans(&self) -> Result<Vec<TraceSpan>, IndexError> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT message_id, trace_id, span_id, parent_span_id, subject, from_endpoint,
                    to_endpoint, status, budget_hops_used, budget_ttl_remaining_ms,
                    sent_at, delivered_at, processed_at, error
             FROM message_traces WHERE status = 'dead_lettered' ORDER BY sent_at DESC",
        )?;
        let rows = stmt
            .query_map([], Self::row_to_span)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }

    #[allow(clippy::type_complexity)]
    fn row_to_span(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<TraceSpan, IndexError>> {
        let status_str: String = row.get(7)?;
        let sent_at_str: String = row.get(10)?;
        let delivered_at_str: Option<String> = row.get(11)?;
        let processed_at_str: Option<String> = row.get(12)?;
        Ok((|| {
            Ok(TraceSpan {
                message_id: row.get(0)?,
                trace_id: row.get(1)?,
                span_id: row.get(2)?,
                parent_span_id: row.get(3)?,
                subject: row.get(4)?,
                from_endpoint: row.get(5)?,
                to_endpoint: row.get(6)?,
                status: trace_status_from_str(&status_str)?,
                budget_hops_used: row.get(8)?,
                budget_ttl_remaining_ms: row.get(9)?,
                sent_at: parse_rfc3339(&sent_at_str)?,
                delivered_at: delivered_at_str.map(|s| parse_rfc3339(&s)).transpose()?,
                processed_at: processed_at_str.map(|s| parse_rfc3339(&s)).transpose()?,
                error: row.get(13)?,
            })
        })())
    }

    /// Aggregate metrics over the `messages` table.
    pub fn metrics(&self) -> Result<IndexMetrics, IndexError> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        IndexMetrics::compute(&conn)
    }
}

fn mailbox_read_new(
    maildir: &MaildirStore,
    hash: &str,
    filename: &str,
) -> Result<Option<relay_envelope::Envelope>, IndexError> {
    read_envelope_file(maildir, hash, "new", filename)
}

fn mailbox_read_cur(
    maildir: &MaildirStore,
    hash: &str,
    filename: &str,
) -> Result<Option<relay_envelope::Envelope>, IndexError> {
    read_envelope_file(maildir, hash, "cur", filename)
}

fn mailbox_read_failed(
    maildir: &MaildirStore,
    hash: &str,
    filename: &str,
) -> Result<Option<relay_envelope::Envelope>, IndexError> {
    read_envelope_file(maildir, hash, "failed", filename)
}

fn read_envelope_file(
    maildir: &MaildirStore,
    hash: &str,
    sub: &str,
    filename: &str,
) -> Result<Option<relay_envelope::Envelope>, IndexError> {
    let path = maildir.root().join(hash).join(sub).join(format!("{filename}.json"));
    match std::fs::read(&path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(relay_maildir::MaildirError::from(e).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(id: &str, subject: &str, status: MessageStatus) -> IndexedMessage {
        IndexedMessage {
            id: id.to_string(),
            subject: subject.to_string(),
            sender: "relay.human.cli".to_string(),
            endpoint_hash: "hash-a".to_string(),
            status,
            created_at: Utc::now(),
            ttl: Utc::now().timestamp_millis() + 60_000,
        }
    }

    #[test]
    fn insert_and_get_round_trips() {
        let index = SqliteIndex::open_in_memory().unwrap();
        let msg = message("01ARZ", "relay.agent.a", MessageStatus::New);
        index.insert_message(&msg).unwrap();

        let fetched = index.get_message("01ARZ").unwrap().unwrap();
        assert_eq!(fetched.subject, "relay.agent.a");
        assert_eq!(fetched.status, MessageStatus::New);
    }

    #[test]
    fn insert_or_replace_is_idempotent() {
        let index = SqliteIndex::open_in_memory().unwrap();
        let msg = message("01ARZ", "relay.agent.a", MessageStatus::New);
        index.insert_message(&msg).unwrap();
        index.insert_message(&msg).unwrap();

        let all = index.get_by_subject("relay.agent.a").unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn update_status_changes_only_status() {
        let index = SqliteIndex::open_in_memory().unwrap();
        let msg = message("01ARZ", "relay.agent.a", MessageStatus::New);
        index.insert_message(&msg).unwrap();
        index.update_status("01ARZ", MessageStatus::Processed).unwrap();

        let fetched = index.get_message("01ARZ").unwrap().unwrap();
        assert_eq!(fetched.status, MessageStatus::Processed);
        assert_eq!(fetched.subject, "relay.agent.a");
    }

    #[test]
    fn get_message_missing_returns_none() {
        let index = SqliteIndex::open_in_memory().unwrap();
        assert!(index.get_message("nope").unwrap().is_none());
    }

    #[test]
    fn delete_expired_removes_only_past_ttl() {
        let index = SqliteIndex::open_in_memory().unwrap();
        let now = Utc::now().timestamp_millis();
        let mut expired = message("expired", "relay.agent.a", MessageStatus::New);
        expired.ttl = now - 1000;
        let mut alive = message("alive", "relay.agent.a", MessageStatus::New);
        alive.ttl = now + 60_000;

        index.insert_message(&expired).unwrap();
        index.insert_message(&alive).unwrap();

        let removed = index.delete_expired(now).unwrap();
        assert_eq!(removed, 1);
        assert!(index.get_message("expired").unwrap().is_none());
        assert!(index.get_message("alive").unwrap().is_some());
    }

    #[test]
    fn metrics_counts_and_groups() {
        let index = SqliteIndex::open_in_memory().unwrap();
        index
            .insert_message(&message("a", "relay.agent.a", MessageStatus::New))
            .unwrap();
        index
            .insert_message(&message("b", "relay.agent.a", MessageStatus::Processed))
            .unwrap();
        index
            .insert_message(&message("c", "relay.agent.b", MessageStatus::New))
            .unwrap();

        let metrics = index.metrics().unwrap();
        assert_eq!(metrics.total, 3);
        assert_eq!(metrics.active_endpoint_count, 1);
        let top_subject = &metrics.by_subject[0];
        assert_eq!(top_subject.key, "relay.agent.a");
        assert_eq!(top_subject.count, 2);
    }

    #[test]
    fn trace_spans_round_trip_by_trace_id() {
        let index = SqliteIndex::open_in_memory().unwrap();
        let span = TraceSpan {
            message_id: "m1".to_string(),
            trace_id: "t1".to_string(),
            span_id: "s1".to_string(),
            parent_span_id: None,
            subject: "relay.agent.a".to_string(),
            from_endpoint: "relay.human.cli".to_string(),
            to_endpoint: "relay.agent.a".to_string(),
            status: TraceStatus::Delivered,
            budget_hops_used: 1,
            budget_ttl_remaining_ms: 3_600_000,
            sent_at: Utc::now(),
            delivered_at: Some(Utc::now()),
            processed_at: None,
            error: None,
        };
        index.record_span(&span).unwrap();

        let spans = index.get_spans_by_trace("t1").unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].message_id, "m1");
        assert_eq!(spans[0].status, TraceStatus::Delivered);
    }

    #[test]
    fn dead_lettered_spans_are_queryable_via_partial_index() {
        let index = SqliteIndex::open_in_memory().unwrap();
        let mut span = TraceSpan {
            message_id: "m2".to_string(),
            trace_id: "t2".to_string(),
            span_id: "s2".to_string(),
            parent_span_id: None,
            subject: "relay.agent.x".to_string(),
            from_endpoint: "relay.agent.x".to_string(),
            to_endpoint: "relay.agent.x".to_string(),
            status: TraceStatus::DeadLettered,
            budget_hops_used: 1,
            budget_ttl_remaining_ms: 0,
            sent_at: Utc::now(),
            delivered_at: None,
            processed_at: None,
            error: Some("cycle detected".to_string()),
        };
        index.record_span(&span).unwrap();
        span.message_id = "m3".to_string();
        span.trace_id = "t3".to_string();
        span.status = TraceStatus::Delivered;
        index.record_span(&span).unwrap();

        let dead = index.get_dead_lettered_spans().unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].message_id, "m2");
    }
}
