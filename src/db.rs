// SQLite-backed reading store
//
// Durable alternative to InMemoryReadingStore. One row per account; the
// account id is the primary key, so the "one reading per account" invariant
// is enforced by the schema as well as by the engine.

use crate::error::StoreError;
use crate::reading::NormalizedReading;
use crate::store::ReadingStore;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meter_readings (
            account_id INTEGER PRIMARY KEY,
            reading_id TEXT NOT NULL,
            meter_reading_date_time TEXT NOT NULL,
            meter_read_value TEXT NOT NULL,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    Ok(())
}

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<NormalizedReading> {
    Ok(NormalizedReading {
        account_id: row.get(0)?,
        id: row.get(1)?,
        meter_reading_date_time: row.get(2)?,
        meter_read_value: row.get(3)?,
    })
}

pub struct SqliteReadingStore {
    conn: Mutex<Connection>,
}

impl SqliteReadingStore {
    /// Open (or create) a database file and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::with_connection(conn).context("Failed to initialize database schema")
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?).context("Failed to initialize database schema")
    }

    pub fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        setup_database(&conn)?;
        Ok(SqliteReadingStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM meter_readings", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl ReadingStore for SqliteReadingStore {
    fn get(&self, account_id: i64) -> Result<Option<NormalizedReading>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let reading = conn
            .query_row(
                "SELECT account_id, reading_id, meter_reading_date_time, meter_read_value
                 FROM meter_readings
                 WHERE account_id = ?1",
                params![account_id],
                reading_from_row,
            )
            .optional()?;
        Ok(reading)
    }

    fn upsert(&self, account_id: i64, reading: NormalizedReading) -> Result<(), StoreError> {
        if reading.account_id != account_id {
            return Err(StoreError::Corrupt {
                account_id,
                message: format!("reading belongs to account {}", reading.account_id),
            });
        }

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT INTO meter_readings (
                account_id, reading_id, meter_reading_date_time, meter_read_value
            ) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(account_id) DO UPDATE SET
                reading_id = excluded.reading_id,
                meter_reading_date_time = excluded.meter_reading_date_time,
                meter_read_value = excluded.meter_read_value,
                updated_at = CURRENT_TIMESTAMP",
            params![
                account_id,
                reading.id,
                reading.meter_reading_date_time,
                reading.meter_read_value,
            ],
        )?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<NormalizedReading>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn.prepare(
            "SELECT account_id, reading_id, meter_reading_date_time, meter_read_value
             FROM meter_readings
             ORDER BY account_id",
        )?;

        let readings = stmt
            .query_map([], reading_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(readings)
    }
}
