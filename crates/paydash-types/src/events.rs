use serde::{Deserialize, Serialize};

use crate::models::{Payment, StatsSnapshot};

/// Events fanned out to every connected dashboard client. Serialized as
/// `{"event": "payment-created", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum LedgerEvent {
    /// A payment was written to the ledger.
    PaymentCreated(Payment),

    /// Aggregates were recomputed after a ledger write.
    StatsUpdated(StatsSnapshot),
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PaymentCreated(_) => "payment-created",
            Self::StatsUpdated(_) => "stats-updated",
        }
    }
}
