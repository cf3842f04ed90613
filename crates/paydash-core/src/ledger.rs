//! The payment ledger: the write path, queries and export.
//!
//! Every successful write synchronously recomputes the dashboard stats and
//! hands both the new record and the fresh snapshot to the event sink, in
//! that order. Delivery is best-effort; persistence is not.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use paydash_db::models::{PaymentQuery, PaymentRow};
use paydash_db::{is_unique_violation, Database};
use paydash_types::api::{CreatePaymentRequest, PaymentFilter};
use paydash_types::events::LedgerEvent;
use paydash_types::models::Payment;

use crate::convert::{amount_to_cents, payment_from_row};
use crate::error::LedgerError;
use crate::stats::StatsAggregator;

/// Where ledger events go. The ledger holds this as an abstract capability
/// so its write path is testable without a real connection layer.
pub trait EventSink: Send + Sync {
    /// Best-effort, non-blocking fan-out to currently connected observers.
    fn publish(&self, event: LedgerEvent);
}

/// Sink that drops everything. For contexts with no broadcast layer.
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: LedgerEvent) {}
}

pub struct PaymentLedger {
    db: Arc<Database>,
    stats: StatsAggregator,
    sink: Arc<dyn EventSink>,
    transaction_ids: fn() -> String,
}

impl PaymentLedger {
    pub fn new(db: Arc<Database>, sink: Arc<dyn EventSink>) -> Self {
        Self::with_transaction_ids(db, sink, new_transaction_id)
    }

    /// Like `new`, with a custom transaction-id generator. Lets tests seed
    /// deterministic collisions against the store's uniqueness backstop.
    pub fn with_transaction_ids(
        db: Arc<Database>,
        sink: Arc<dyn EventSink>,
        transaction_ids: fn() -> String,
    ) -> Self {
        Self {
            stats: StatsAggregator::new(db.clone()),
            db,
            sink,
            transaction_ids,
        }
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    /// Record a payment. The write is durable before stats recompute, and
    /// stats recompute completes before either event is published. The
    /// `payment-created` event always precedes `stats-updated` for a given
    /// write.
    pub async fn create(&self, req: CreatePaymentRequest) -> Result<Payment, LedgerError> {
        let cents = amount_to_cents(req.amount).ok_or(LedgerError::InvalidAmount)?;
        if req.receiver.trim().is_empty() {
            return Err(LedgerError::EmptyReceiver);
        }

        let now_ms = Utc::now().timestamp_millis();
        let mut row = PaymentRow {
            id: Uuid::new_v4().to_string(),
            amount_cents: cents,
            method: req.method.as_str().to_string(),
            status: req.status.as_str().to_string(),
            receiver: req.receiver,
            description: req.description,
            transaction_id: (self.transaction_ids)(),
            failure_reason: req.failure_reason,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        };

        // The UNIQUE constraint on transaction_id is the authoritative
        // backstop; on collision, regenerate once before giving up.
        if let Err(e) = self.insert(row.clone()).await {
            if !is_unique_violation(&e) {
                return Err(LedgerError::Storage(e));
            }
            warn!("transaction id {} collided, regenerating", row.transaction_id);
            row.transaction_id = (self.transaction_ids)();
            if let Err(e) = self.insert(row.clone()).await {
                if is_unique_violation(&e) {
                    return Err(LedgerError::PersistenceConflict);
                }
                return Err(LedgerError::Storage(e));
            }
        }

        let payment = payment_from_row(&row)?;
        info!("payment {} recorded ({})", payment.id, payment.transactionid);

        let snapshot = self.stats.compute().await?;
        self.sink.publish(LedgerEvent::PaymentCreated(payment.clone()));
        self.sink.publish(LedgerEvent::StatsUpdated(snapshot));

        Ok(payment)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Payment, LedgerError> {
        let db = self.db.clone();
        let key = id.to_string();
        let row = tokio::task::spawn_blocking(move || db.get_payment(&key))
            .await
            .map_err(|e| anyhow!("join error: {e}"))??
            .ok_or(LedgerError::NotFound(id))?;
        Ok(payment_from_row(&row)?)
    }

    /// Filtered page, newest first, plus the filtered total independent of
    /// pagination.
    pub async fn list(&self, filter: &PaymentFilter) -> Result<(Vec<Payment>, u64), LedgerError> {
        let limit = filter.limit();
        // Offset arithmetic in u64: page and limit come straight off the
        // query string, and their product can exceed u32.
        let offset = u64::from(filter.page() - 1) * u64::from(limit);
        let query = PaymentQuery {
            status: filter.status.map(|s| s.as_str().to_string()),
            method: filter.method.map(|m| m.as_str().to_string()),
            start_ms: filter.start_date.map(|d| d.timestamp_millis()),
            end_ms: filter.end_date.map(|d| d.timestamp_millis()),
            offset,
            limit,
        };

        let db = self.db.clone();
        let (rows, total) = tokio::task::spawn_blocking(move || db.list_payments(&query))
            .await
            .map_err(|e| anyhow!("join error: {e}"))??;

        let payments = rows
            .iter()
            .map(payment_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((payments, total))
    }

    /// Every record as CSV, newest first, one header row. Fields are
    /// quoted/escaped by the writer so the output round-trips.
    pub async fn export_csv(&self) -> Result<String, LedgerError> {
        let db = self.db.clone();
        let rows = tokio::task::spawn_blocking(move || db.all_payments())
            .await
            .map_err(|e| anyhow!("join error: {e}"))??;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "ID",
                "Amount",
                "Method",
                "Status",
                "Receiver",
                "Description",
                "Transaction ID",
                "Failure Reason",
                "Created At",
            ])
            .map_err(|e| anyhow!("csv write failed: {e}"))?;

        for row in &rows {
            let payment = payment_from_row(row)?;
            writer
                .write_record([
                    payment.id.to_string(),
                    payment.amount.to_string(),
                    payment.method.to_string(),
                    payment.status.to_string(),
                    payment.receiver,
                    payment.description.unwrap_or_default(),
                    payment.transactionid,
                    payment.failure_reason.unwrap_or_default(),
                    payment.created_at.to_rfc3339(),
                ])
                .map_err(|e| anyhow!("csv write failed: {e}"))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow!("csv flush failed: {e}"))?;
        Ok(String::from_utf8(bytes).map_err(|e| anyhow!("csv produced invalid utf-8: {e}"))?)
    }

    async fn insert(&self, row: PaymentRow) -> anyhow::Result<()> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.insert_payment(&row))
            .await
            .map_err(|e| anyhow!("join error: {e}"))?
    }
}

/// Time-based identifier with a zero-padded 3-digit random suffix,
/// e.g. `TXN1700000000000042`.
fn new_transaction_id() -> String {
    let suffix: u32 = rand::rng().random_range(0..1000);
    format!("TXN{}{:03}", Utc::now().timestamp_millis(), suffix)
}
