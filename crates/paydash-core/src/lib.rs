pub mod convert;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod stats;

pub use error::{AuthError, LedgerError};
pub use guard::SessionGuard;
pub use ledger::{EventSink, NullSink, PaymentLedger};
pub use stats::StatsAggregator;
