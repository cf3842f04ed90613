use crate::models::{PaymentQuery, PaymentRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, ToSql};

impl Database {
    // -- Users --

    pub fn insert_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, role, is_active, created_at_ms, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    user.id,
                    user.username,
                    user.email,
                    user.password,
                    user.role,
                    user.is_active,
                    user.created_at_ms,
                    user.updated_at_ms,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{USER_SELECT} WHERE username = ?1"))?;
            let row = stmt.query_row([username], map_user_row).optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{USER_SELECT} WHERE id = ?1"))?;
            let row = stmt.query_row([id], map_user_row).optional()?;
            Ok(row)
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{USER_SELECT} ORDER BY created_at_ms ASC"))?;
            let rows = stmt
                .query_map([], map_user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Full-row update keyed on id. The caller is responsible for bumping
    /// `updated_at_ms`.
    pub fn update_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET email = ?2, password = ?3, role = ?4, is_active = ?5, updated_at_ms = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    user.id,
                    user.email,
                    user.password,
                    user.role,
                    user.is_active,
                    user.updated_at_ms,
                ],
            )?;
            Ok(())
        })
    }

    // -- Payments --

    pub fn insert_payment(&self, payment: &PaymentRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO payments (id, amount_cents, method, status, receiver, description,
                                       transaction_id, failure_reason, created_at_ms, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    payment.id,
                    payment.amount_cents,
                    payment.method,
                    payment.status,
                    payment.receiver,
                    payment.description,
                    payment.transaction_id,
                    payment.failure_reason,
                    payment.created_at_ms,
                    payment.updated_at_ms,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_payment(&self, id: &str) -> Result<Option<PaymentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{PAYMENT_SELECT} WHERE id = ?1"))?;
            let row = stmt.query_row([id], map_payment_row).optional()?;
            Ok(row)
        })
    }

    /// Filtered page of payments, newest first, plus the filtered total
    /// independent of pagination.
    pub fn list_payments(&self, query: &PaymentQuery) -> Result<(Vec<PaymentRow>, u64)> {
        self.with_conn(|conn| {
            let (where_sql, params) = build_payment_filter(query);

            let total: u64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM payments{where_sql}"),
                rusqlite::params_from_iter(params.iter()),
                |row| row.get(0),
            )?;

            let sql = format!(
                "{PAYMENT_SELECT}{where_sql}
                 ORDER BY created_at_ms DESC, rowid DESC
                 LIMIT {} OFFSET {}",
                query.limit, query.offset
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), map_payment_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total))
        })
    }

    /// Every payment, newest first. Used by the CSV export.
    pub fn all_payments(&self) -> Result<Vec<PaymentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{PAYMENT_SELECT} ORDER BY created_at_ms DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([], map_payment_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

}

// -- Aggregation --
//
// These take a &Connection directly so the stats computation can run all of
// its sub-queries under one `with_conn` lock and see a single snapshot.

/// Count of payments created in [start_ms, end_ms], optionally restricted
/// to one status.
pub fn count_payments_between(
    conn: &Connection,
    start_ms: i64,
    end_ms: i64,
    status: Option<&str>,
) -> Result<u64> {
    let count: u64 = match status {
        Some(status) => conn.query_row(
            "SELECT COUNT(*) FROM payments
             WHERE created_at_ms BETWEEN ?1 AND ?2 AND status = ?3",
            rusqlite::params![start_ms, end_ms, status],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM payments WHERE created_at_ms BETWEEN ?1 AND ?2",
            rusqlite::params![start_ms, end_ms],
            |row| row.get(0),
        )?,
    };
    Ok(count)
}

/// Summed cents of successful payments created in [start_ms, end_ms].
pub fn sum_success_cents_between(conn: &Connection, start_ms: i64, end_ms: i64) -> Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM payments
         WHERE status = 'success' AND created_at_ms BETWEEN ?1 AND ?2",
        rusqlite::params![start_ms, end_ms],
        |row| row.get(0),
    )?;
    Ok(total)
}

/// Summed cents of successful payments in the half-open day window
/// [day_start_ms, day_end_ms). Used for the per-day trend points.
pub fn sum_success_cents_day(conn: &Connection, day_start_ms: i64, day_end_ms: i64) -> Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM payments
         WHERE status = 'success' AND created_at_ms >= ?1 AND created_at_ms < ?2",
        rusqlite::params![day_start_ms, day_end_ms],
        |row| row.get(0),
    )?;
    Ok(total)
}

const USER_SELECT: &str =
    "SELECT id, username, email, password, role, is_active, created_at_ms, updated_at_ms FROM users";

const PAYMENT_SELECT: &str =
    "SELECT id, amount_cents, method, status, receiver, description, transaction_id, failure_reason,
            created_at_ms, updated_at_ms
     FROM payments";

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        role: row.get(4)?,
        is_active: row.get(5)?,
        created_at_ms: row.get(6)?,
        updated_at_ms: row.get(7)?,
    })
}

fn map_payment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PaymentRow> {
    Ok(PaymentRow {
        id: row.get(0)?,
        amount_cents: row.get(1)?,
        method: row.get(2)?,
        status: row.get(3)?,
        receiver: row.get(4)?,
        description: row.get(5)?,
        transaction_id: row.get(6)?,
        failure_reason: row.get(7)?,
        created_at_ms: row.get(8)?,
        updated_at_ms: row.get(9)?,
    })
}

fn build_payment_filter(query: &PaymentQuery) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(status) = &query.status {
        params.push(Box::new(status.clone()));
        clauses.push(format!("status = ?{}", params.len()));
    }
    if let Some(method) = &query.method {
        params.push(Box::new(method.clone()));
        clauses.push(format!("method = ?{}", params.len()));
    }
    if let Some(start_ms) = query.start_ms {
        params.push(Box::new(start_ms));
        clauses.push(format!("created_at_ms >= ?{}", params.len()));
    }
    if let Some(end_ms) = query.end_ms {
        params.push(Box::new(end_ms));
        clauses.push(format!("created_at_ms <= ?{}", params.len()));
    }

    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
