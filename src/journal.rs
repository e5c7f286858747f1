// 🗄️ Event Journal - SQLite export of the ledger audit trail
//
// The ledger itself stays in memory; this is a write-behind sink for the
// drained event log. Re-appending an already journaled sequence number is
// ignored, so a crashed export can simply be retried.

use crate::entities::AccountId;
use crate::events::{LedgerEvent, RecordedEvent};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

pub fn open_journal(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open journal {}", path.display()))?;
    setup_journal(&conn)?;
    Ok(conn)
}

pub fn setup_journal(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Ledger Events Table (append-only audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            sequence INTEGER UNIQUE NOT NULL,
            event_type TEXT NOT NULL,
            account TEXT,
            data TEXT NOT NULL,
            journaled_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_events_account ON ledger_events(account)",
        [],
    )?;

    Ok(())
}

/// Append events in one SQLite transaction; returns how many were new
pub fn append_events(conn: &mut Connection, events: &[RecordedEvent]) -> Result<usize> {
    let tx = conn.transaction()?;
    let journaled_at = Utc::now().to_rfc3339();
    let mut inserted = 0;

    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO ledger_events (
                event_id, sequence, event_type, account, data, journaled_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;

        for recorded in events {
            let data = serde_json::to_string(&recorded.event)
                .context("Failed to serialize ledger event")?;
            let account = recorded.event.primary_account().map(|a| a.as_str().to_string());

            inserted += stmt.execute(params![
                uuid::Uuid::new_v4().to_string(),
                recorded.sequence as i64,
                recorded.event.event_type(),
                account,
                data,
                journaled_at,
            ])?;
        }
    }

    tx.commit()?;
    Ok(inserted)
}

/// Every journaled event in sequence order
pub fn load_events(conn: &Connection) -> Result<Vec<RecordedEvent>> {
    let mut stmt = conn.prepare("SELECT sequence, data FROM ledger_events ORDER BY sequence ASC")?;
    let rows = stmt.query_map([], read_row)?;
    let events = collect_events(rows)?;
    Ok(events)
}

/// Events indexed under one account, in sequence order
pub fn events_for_account(conn: &Connection, account: &AccountId) -> Result<Vec<RecordedEvent>> {
    let mut stmt = conn.prepare(
        "SELECT sequence, data FROM ledger_events
         WHERE account = ?1
         ORDER BY sequence ASC",
    )?;
    let rows = stmt.query_map(params![account.as_str()], read_row)?;
    let events = collect_events(rows)?;
    Ok(events)
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn collect_events(
    rows: impl Iterator<Item = rusqlite::Result<(i64, String)>>,
) -> Result<Vec<RecordedEvent>> {
    rows.map(|row| {
        let (sequence, data) = row?;
        let event: LedgerEvent = serde_json::from_str(&data)
            .with_context(|| format!("Corrupt journal entry at sequence {}", sequence))?;
        Ok(RecordedEvent {
            sequence: sequence as u64,
            event,
        })
    })
    .collect()
}
