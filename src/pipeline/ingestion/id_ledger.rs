use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::app::ports::ExistingIdSource;
use crate::error::Result;
use crate::pipeline::processing::normalize::clean_id;
use crate::types::Mode;

/// Local record of ids already exported, per mode. Append-only: recording an
/// id twice keeps the first sighting.
pub struct IdLedger {
    conn: Connection,
}

impl IdLedger {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path.as_ref())?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS known_ids (
                mode           TEXT NOT NULL,
                id             TEXT NOT NULL,
                first_seen_at  INTEGER NOT NULL,
                PRIMARY KEY (mode, id)
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    pub fn existing_ids(&self, mode: Mode) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM known_ids WHERE mode = ?1")?;
        let rows = stmt.query_map(params![mode.as_str()], |row| row.get::<_, String>(0))?;
        let mut ids = HashSet::new();
        for id in rows {
            ids.insert(id?);
        }
        Ok(ids)
    }

    /// Store cleaned, non-empty ids; returns how many were new
    pub fn record_ids<I, S>(&mut self, mode: Mode, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = Utc::now().timestamp();
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO known_ids (mode, id, first_seen_at) VALUES (?1, ?2, ?3)",
            )?;
            for id in ids {
                let id = clean_id(id.as_ref());
                if id.is_empty() {
                    continue;
                }
                inserted += stmt.execute(params![mode.as_str(), id, now])?;
            }
        }
        tx.commit()?;
        info!("Recorded {} new {} ids in ledger", inserted, mode);
        Ok(inserted)
    }

    /// The ledger's ids for one mode as a duplicate-id source
    pub fn for_mode(&self, mode: Mode) -> LedgerIdSource<'_> {
        LedgerIdSource { ledger: self, mode }
    }
}

pub struct LedgerIdSource<'a> {
    ledger: &'a IdLedger,
    mode: Mode,
}

impl ExistingIdSource for LedgerIdSource<'_> {
    fn name(&self) -> &str {
        "ledger"
    }

    fn existing_ids(&self) -> Result<HashSet<String>> {
        self.ledger.existing_ids(self.mode)
    }
}
