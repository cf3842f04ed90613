pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}

/// Whether an error wraps a SQLite unique-constraint violation. The ledger
/// uses this to detect transaction-id collisions and retry generation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentRow;

    fn payment(id: &str, transaction_id: &str) -> PaymentRow {
        PaymentRow {
            id: id.to_string(),
            amount_cents: 1000,
            method: "upi".to_string(),
            status: "success".to_string(),
            receiver: "acme".to_string(),
            description: None,
            transaction_id: transaction_id.to_string(),
            failure_reason: None,
            created_at_ms: 1_700_000_000_000,
            updated_at_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn duplicate_transaction_id_is_a_unique_violation() {
        let db = Database::open_in_memory().unwrap();

        db.insert_payment(&payment("a", "TXN1")).unwrap();
        let err = db.insert_payment(&payment("b", "TXN1")).unwrap_err();

        assert!(is_unique_violation(&err));
    }

    #[test]
    fn other_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&anyhow::anyhow!("boom")));
    }
}
