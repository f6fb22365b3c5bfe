// 🗄️ Run Ledger - append-only event history in SQLite (WAL)
// Every run leaves events behind: what was removed, what was quarantined,
// and whether integrity held. Events are never updated or deleted.

use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Event for audit trail
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(
        run_id: &str,
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
        }
    }
}

pub struct RunLedger {
    conn: Connection,
}

impl RunLedger {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        // WAL for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT UNIQUE NOT NULL,
                run_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_run ON events(run_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
            [],
        )?;

        Ok(RunLedger { conn })
    }

    /// Insert a batch atomically
    pub fn insert_events(&mut self, events: &[Event]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        for event in events {
            tx.execute(
                "INSERT INTO events (
                    event_id, run_id, timestamp, event_type, entity_type, entity_id, data
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.event_id,
                    event.run_id,
                    event.timestamp.to_rfc3339(),
                    event.event_type,
                    event.entity_type,
                    event.entity_id,
                    serde_json::to_string(&event.data)?,
                ],
            )?;
        }
        tx.commit()?;
        Ok(events.len())
    }

    pub fn events_for_run(&self, run_id: &str) -> Result<Vec<Event>> {
        self.query_events(
            "SELECT event_id, run_id, timestamp, event_type, entity_type, entity_id, data
             FROM events WHERE run_id = ?1 ORDER BY id",
            params![run_id],
        )
    }

    /// Every event ever recorded about one entity, e.g. one barcode
    pub fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>> {
        self.query_events(
            "SELECT event_id, run_id, timestamp, event_type, entity_type, entity_id, data
             FROM events WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY id",
            params![entity_type, entity_id],
        )
    }

    pub fn all_events(&self) -> Result<Vec<Event>> {
        self.query_events(
            "SELECT event_id, run_id, timestamp, event_type, entity_type, entity_id, data
             FROM events ORDER BY id",
            [],
        )
    }

    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count)
    }

    fn query_events<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(sql)?;

        let events = stmt
            .query_map(params, |row| {
                let timestamp_str: String = row.get(2)?;
                let data_json: String = row.get(6)?;

                Ok(Event {
                    event_id: row.get(0)?,
                    run_id: row.get(1)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                        .map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
                        })?
                        .with_timezone(&Utc),
                    event_type: row.get(3)?,
                    entity_type: row.get(4)?,
                    entity_id: row.get(5)?,
                    data: serde_json::from_str(&data_json).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
                    })?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log() {
        let mut ledger = RunLedger::open_in_memory().unwrap();

        let event = Event::new(
            "run-1",
            "item_removed",
            "item",
            "1001",
            serde_json::json!({"canonical": "1002"}),
        );
        ledger.insert_events(std::slice::from_ref(&event)).unwrap();

        let events = ledger.events_for_entity("item", "1001").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "item_removed");
        assert_eq!(events[0].data["canonical"], "1002");
        assert_eq!(events[0].timestamp, event.timestamp);
    }

    #[test]
    fn test_batch_insert_and_run_filter() {
        let mut ledger = RunLedger::open_in_memory().unwrap();

        let events = vec![
            Event::new("run-1", "run_started", "run", "run-1", serde_json::json!({})),
            Event::new("run-1", "run_verified", "run", "run-1", serde_json::json!({"clean": true})),
            Event::new("run-2", "run_started", "run", "run-2", serde_json::json!({})),
        ];
        assert_eq!(ledger.insert_events(&events).unwrap(), 3);

        let run1 = ledger.events_for_run("run-1").unwrap();
        assert_eq!(run1.len(), 2);
        assert_eq!(run1[1].event_type, "run_verified");
        assert_eq!(ledger.count().unwrap(), 3);
        assert_eq!(ledger.all_events().unwrap().len(), 3);
    }

    #[test]
    fn test_ledger_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let mut ledger = RunLedger::open(&path).unwrap();
            ledger
                .insert_events(&[Event::new("r", "run_started", "run", "r", serde_json::json!({}))])
                .unwrap();
        }

        let ledger = RunLedger::open(&path).unwrap();
        assert_eq!(ledger.count().unwrap(), 1);
    }
}
