//! Record source: read access to the cardholder store.
//!
//! The connection is a scoped resource — opened for the up-front batch read
//! and released before any image processing starts.

mod schema;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;

pub use schema::SCHEMA;

use crate::record::{PersonRecord, TimestampField};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Cardholders whose biometric data changed after `since`, oldest id
    /// first. Timestamps come back as raw text and are parsed leniently;
    /// malformed values surface as `TimestampField::Invalid`.
    pub fn fetch_recent_records(&self, since: DateTime<Utc>) -> Result<Vec<PersonRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.first_name, b.updated_at, a.photo_updated_at
            FROM biometric_data b
            JOIN cardholders c ON c.id = b.cardholder_id
            LEFT JOIN cardholder_aux a ON a.cardholder_id = c.id
            WHERE b.updated_at IS NOT NULL
              AND datetime(b.updated_at) > datetime(?)
            ORDER BY c.id
            "#,
        )?;

        let since_str = since.format("%Y-%m-%d %H:%M:%S").to_string();
        let records = stmt
            .query_map([since_str], |row| {
                let biometric: Option<String> = row.get(2)?;
                let photo: Option<String> = row.get(3)?;
                Ok(PersonRecord {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_biometric_update: TimestampField::parse(biometric.as_deref()),
                    last_photo_update: TimestampField::parse(photo.as_deref()),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }
}
