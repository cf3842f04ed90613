/// Database row types — these map directly to SQLite rows.
/// Distinct from paydash-types API models to keep the DB layer independent;
/// amounts live here as integer cents so SUM stays exact, timestamps as
/// unix milliseconds.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub is_active: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone)]
pub struct PaymentRow {
    pub id: String,
    pub amount_cents: i64,
    pub method: String,
    pub status: String,
    pub receiver: String,
    pub description: Option<String>,
    pub transaction_id: String,
    pub failure_reason: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// Filter for the payments list query. All set fields are ANDed together;
/// the date range is inclusive.
#[derive(Debug, Clone, Default)]
pub struct PaymentQuery {
    pub status: Option<String>,
    pub method: Option<String>,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub offset: u64,
    pub limit: u32,
}
