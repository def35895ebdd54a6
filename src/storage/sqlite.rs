//! SQLite-backed `EventStore` + `RosterStore`.
//!
//! A single `parking_lot`-guarded `rusqlite::Connection`, a WAL pragma block
//! run once at open, and `anyhow::Context` wrapping every fallible query.
//! Events are stored as JSON payloads rather than normalized columns — the
//! event vocabulary (`Event`) is closed and versioned at the Rust type level
//! already, so a second normalized schema would only be a second place for
//! the two to drift apart.

use anyhow::Context;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::event::{Event, EventEnvelope};
use crate::event_log::{EventFilter, EventStore};
use crate::models::{Lane, PropertyType, Rep, RepParameters, RepStatus};
use crate::roster::{RosterSnapshot, RosterStore};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("opening sqlite db at {path}"))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;

             CREATE TABLE IF NOT EXISTS events (
                 seq     INTEGER PRIMARY KEY AUTOINCREMENT,
                 ts      TEXT NOT NULL,
                 payload TEXT NOT NULL
             );

             CREATE TABLE IF NOT EXISTS roster_meta (
                 id      INTEGER PRIMARY KEY CHECK (id = 1),
                 version INTEGER NOT NULL
             );

             CREATE TABLE IF NOT EXISTS reps (
                 id                TEXT PRIMARY KEY,
                 display_name      TEXT NOT NULL,
                 property_types    TEXT NOT NULL,
                 max_units         INTEGER,
                 can_handle_1kplus INTEGER NOT NULL,
                 sub1k_order       INTEGER NOT NULL,
                 over1k_order      INTEGER,
                 status            TEXT NOT NULL
             );",
        )
        .context("running schema migration")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl EventStore for SqliteStore {
    fn append(&self, event: Event, ts: DateTime<Utc>) -> anyhow::Result<u64> {
        let conn = self.conn.lock();
        let payload = serde_json::to_string(&event).context("serializing event")?;
        conn.execute(
            "INSERT INTO events (ts, payload) VALUES (?1, ?2)",
            params![ts.to_rfc3339(), payload],
        )
        .context("inserting event")?;
        Ok(conn.last_insert_rowid() as u64)
    }

    fn range(&self, filter: &EventFilter) -> anyhow::Result<Vec<EventEnvelope>> {
        Ok(self.all()?.into_iter().filter(|e| filter.matches(e)).collect())
    }

    fn all(&self) -> anyhow::Result<Vec<EventEnvelope>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT seq, ts, payload FROM events ORDER BY seq ASC")
            .context("preparing event scan")?;
        let rows = stmt
            .query_map([], |row| {
                let seq: i64 = row.get(0)?;
                let ts: String = row.get(1)?;
                let payload: String = row.get(2)?;
                Ok((seq, ts, payload))
            })
            .context("scanning events")?;

        let mut out = Vec::new();
        for row in rows {
            let (seq, ts, payload) = row.context("reading event row")?;
            let ts = DateTime::parse_from_rfc3339(&ts)
                .context("parsing event timestamp")?
                .with_timezone(&Utc);
            let event: Event = serde_json::from_str(&payload).context("deserializing event")?;
            out.push(EventEnvelope {
                seq: seq as u64,
                ts,
                event,
            });
        }
        Ok(out)
    }
}

fn property_type_from_str(s: &str) -> anyhow::Result<PropertyType> {
    match s {
        "mfh" => Ok(PropertyType::Mfh),
        "mf" => Ok(PropertyType::Mf),
        "sfh" => Ok(PropertyType::Sfh),
        "commercial" => Ok(PropertyType::Commercial),
        other => anyhow::bail!("unknown property type {other}"),
    }
}

impl RosterStore for SqliteStore {
    fn load(&self) -> anyhow::Result<Option<RosterSnapshot>> {
        let conn = self.conn.lock();
        let version: Option<i64> = conn
            .query_row("SELECT version FROM roster_meta WHERE id = 1", [], |row| row.get(0))
            .ok();
        let Some(version) = version else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT id, display_name, property_types, max_units, can_handle_1kplus,
                    sub1k_order, over1k_order, status
             FROM reps",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let display_name: String = row.get(1)?;
            let property_types: String = row.get(2)?;
            let max_units: Option<i64> = row.get(3)?;
            let can_handle_1kplus: i64 = row.get(4)?;
            let sub1k_order: i64 = row.get(5)?;
            let over1k_order: Option<i64> = row.get(6)?;
            let status: String = row.get(7)?;
            Ok((
                id,
                display_name,
                property_types,
                max_units,
                can_handle_1kplus,
                sub1k_order,
                over1k_order,
                status,
            ))
        })?;

        let mut reps = Vec::new();
        for row in rows {
            let (id, display_name, property_types, max_units, can_1kplus, sub1k_order, over1k_order, status) =
                row?;
            let property_types: Vec<String> =
                serde_json::from_str(&property_types).context("parsing rep property types")?;
            let property_types = property_types
                .iter()
                .map(|s| property_type_from_str(s))
                .collect::<anyhow::Result<_>>()?;
            reps.push(Rep {
                id,
                display_name,
                parameters: RepParameters {
                    property_types,
                    max_units,
                    can_handle_1kplus: can_1kplus != 0,
                },
                sub1k_order: sub1k_order as u32,
                over1k_order: over1k_order.map(|o| o as u32),
                status: if status == "active" {
                    RepStatus::Active
                } else {
                    RepStatus::Ooo
                },
            });
        }

        Ok(Some(RosterSnapshot {
            version: version as u64,
            reps,
        }))
    }

    fn save(&self, snapshot: &RosterSnapshot) -> anyhow::Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("opening roster save transaction")?;
        tx.execute("DELETE FROM reps", [])?;
        tx.execute(
            "INSERT INTO roster_meta (id, version) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET version = excluded.version",
            params![snapshot.version as i64],
        )?;
        for rep in &snapshot.reps {
            let property_types: Vec<&'static str> = rep
                .parameters
                .property_types
                .iter()
                .map(|p| match p {
                    PropertyType::Mfh => "mfh",
                    PropertyType::Mf => "mf",
                    PropertyType::Sfh => "sfh",
                    PropertyType::Commercial => "commercial",
                })
                .collect();
            let property_types = serde_json::to_string(&property_types)?;
            tx.execute(
                "INSERT INTO reps (id, display_name, property_types, max_units, can_handle_1kplus,
                                   sub1k_order, over1k_order, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    rep.id,
                    rep.display_name,
                    property_types,
                    rep.parameters.max_units,
                    rep.parameters.can_handle_1kplus as i64,
                    rep.sub1k_order,
                    rep.over1k_order,
                    match rep.status {
                        RepStatus::Active => "active",
                        RepStatus::Ooo => "ooo",
                    },
                ],
            )?;
        }
        tx.commit().context("committing roster save")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SkipTarget;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn tmp_path() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotation.db").to_string_lossy().to_string();
        (dir, path)
    }

    #[test]
    fn append_then_all_round_trips_events_in_order() {
        let (_dir, path) = tmp_path();
        let store = SqliteStore::open(&path).unwrap();
        store
            .append(
                Event::Skip {
                    rep_id: "A".into(),
                    target: SkipTarget::Sub1k,
                    day: Utc::now().date_naive(),
                },
                Utc::now(),
            )
            .unwrap();
        store
            .append(
                Event::Skip {
                    rep_id: "B".into(),
                    target: SkipTarget::Sub1k,
                    day: Utc::now().date_naive(),
                },
                Utc::now(),
            )
            .unwrap();

        let events = store.all().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].seq < events[1].seq);
    }

    #[test]
    fn roster_round_trips_through_save_and_load() {
        let (_dir, path) = tmp_path();
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.load().unwrap().is_none());

        let snapshot = RosterSnapshot {
            version: 3,
            reps: vec![Rep {
                id: "A".into(),
                display_name: "Rep A".into(),
                parameters: RepParameters {
                    property_types: BTreeSet::from([PropertyType::Mfh, PropertyType::Sfh]),
                    max_units: Some(400),
                    can_handle_1kplus: false,
                },
                sub1k_order: 1,
                over1k_order: None,
                status: RepStatus::Active,
            }],
        };
        store.save(&snapshot).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.version, 3);
        assert_eq!(loaded.reps.len(), 1);
        assert_eq!(loaded.reps[0].id, "A");
        assert_eq!(loaded.reps[0].parameters.max_units, Some(400));
    }
}
