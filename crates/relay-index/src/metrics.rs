// SPDX-License-Identifier: MIT OR Apache-2.0
//! Aggregate metrics computed over the `messages` table.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Count of messages grouped by a single dimension (status or subject).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupCount {
    /// The group key (a status string or a subject).
    pub key: String,
    /// Number of rows in this group.
    pub count: i64,
}

/// Snapshot of index-wide metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetrics {
    /// Total row count in `messages`.
    pub total: i64,
    /// Counts grouped by status.
    pub by_status: Vec<GroupCount>,
    /// Counts grouped by subject, descending by count.
    pub by_subject: Vec<GroupCount>,
    /// Average delivery latency in milliseconds (`delivered_at - sent_at`
    /// over `message_traces` rows that have both timestamps).
    pub latency_avg_ms: Option<f64>,
    /// Maximum observed delivery latency in milliseconds.
    pub latency_max_ms: Option<f64>,
    /// Approximate 95th percentile latency via an `OFFSET` over sorted rows.
    pub latency_p95_ms: Option<f64>,
    /// Distinct endpoint hashes with at least one message.
    pub active_endpoint_count: i64,
}

impl IndexMetrics {
    pub(crate) fn compute(conn: &Connection) -> Result<Self, IndexError> {
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?;

        let by_status = {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM messages GROUP BY status ORDER BY status",
            )?;
            stmt.query_map([], |r| {
                Ok(GroupCount {
                    key: r.get(0)?,
                    count: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?
        };

        let by_subject = {
            let mut stmt = conn.prepare(
                "SELECT subject, COUNT(*) AS c FROM messages GROUP BY subject ORDER BY c DESC",
            )?;
            stmt.query_map([], |r| {
                Ok(GroupCount {
                    key: r.get(0)?,
                    count: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?
        };

        let active_endpoint_count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT endpoint_hash) FROM messages",
            [],
            |r| r.get(0),
        )?;

        let latencies = {
            let mut stmt = conn.prepare(
                "SELECT (julianday(delivered_at) - julianday(sent_at)) * 86400000.0 AS latency_ms
                 FROM message_traces
                 WHERE delivered_at IS NOT NULL
                 ORDER BY latency_ms ASC",
            )?;
            stmt.query_map([], |r| r.get::<_, f64>(0))?
                .collect::<Result<Vec<_>, _>>()?
        };

        let (latency_avg_ms, latency_max_ms, latency_p95_ms) = if latencies.is_empty() {
            (None, None, None)
        } else {
            let sum: f64 = latencies.iter().sum();
            let avg = sum / latencies.len() as f64;
            let max = latencies.iter().copied().fold(f64::MIN, f64::max);
            let p95_offset = ((latencies.len() as f64) * 0.95) as usize;
            let p95_idx = p95_offset.min(latencies.len() - 1);
            (Some(avg), Some(max), Some(latencies[p95_idx]))
        };

        Ok(Self {
            total,
            by_status,
            by_subject,
            latency_avg_ms,
            latency_max_ms,
            latency_p95_ms,
            active_endpoint_count,
        })
    }
}
