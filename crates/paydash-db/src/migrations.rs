use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            username        TEXT NOT NULL UNIQUE,
            email           TEXT NOT NULL UNIQUE,
            password        TEXT NOT NULL,
            role            TEXT NOT NULL DEFAULT 'standard',
            is_active       INTEGER NOT NULL DEFAULT 1,
            created_at_ms   INTEGER NOT NULL,
            updated_at_ms   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS payments (
            id              TEXT PRIMARY KEY,
            amount_cents    INTEGER NOT NULL,
            method          TEXT NOT NULL,
            status          TEXT NOT NULL,
            receiver        TEXT NOT NULL,
            description     TEXT,
            transaction_id  TEXT NOT NULL UNIQUE,
            failure_reason  TEXT,
            created_at_ms   INTEGER NOT NULL,
            updated_at_ms   INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_payments_created
            ON payments(created_at_ms DESC);

        CREATE INDEX IF NOT EXISTS idx_payments_status_created
            ON payments(status, created_at_ms);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
