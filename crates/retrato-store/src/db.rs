// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::{StoreError, StoreErrorCode};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS customers (
    id                  TEXT PRIMARY KEY,
    name                TEXT NOT NULL,
    email               TEXT NOT NULL UNIQUE,
    cellphone           TEXT NOT NULL DEFAULT '',
    tax_id              TEXT NOT NULL,
    gateway_customer_id TEXT,
    created_at          TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS generations (
    id               TEXT PRIMARY KEY,
    style            TEXT NOT NULL,
    status           TEXT NOT NULL,
    original_path    TEXT NOT NULL,
    generated_path   TEXT,
    watermarked_path TEXT,
    created_at       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS orders (
    id               TEXT PRIMARY KEY,
    generation_id    TEXT NOT NULL REFERENCES generations(id),
    customer_id      TEXT NOT NULL REFERENCES customers(id),
    product          TEXT NOT NULL,
    size             TEXT,
    price_cents      INTEGER NOT NULL,
    status           TEXT NOT NULL,
    charge_id        TEXT NOT NULL,
    shipping_address TEXT,
    tracking_code    TEXT,
    notes            TEXT,
    created_at       TEXT NOT NULL,
    paid_at          TEXT,
    shipped_at       TEXT
);
CREATE INDEX IF NOT EXISTS idx_customers_email ON customers(email);
CREATE INDEX IF NOT EXISTS idx_orders_charge ON orders(charge_id);
CREATE INDEX IF NOT EXISTS idx_orders_status_created ON orders(status, created_at DESC);
";

/// Single-file relational store. The connection is serialized behind a
/// mutex; every query this service runs is a point lookup or a small page.
pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::new(StoreErrorCode::Io, e.to_string()))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::new(StoreErrorCode::Io, e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::new(StoreErrorCode::Io, e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::new(StoreErrorCode::Internal, "connection lock poisoned"))
    }

    /// Cheap liveness probe for readiness checks.
    pub fn ping(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::new(
                StoreErrorCode::Internal,
                format!("stored timestamp `{raw}` is not rfc3339: {e}"),
            )
        })
}

pub(crate) fn parse_timestamp_opt(
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.as_deref().map(parse_timestamp).transpose()
}
