use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use paydash_core::EventSink;
use paydash_types::events::LedgerEvent;

struct Subscriber {
    tx: mpsc::UnboundedSender<LedgerEvent>,
    connected_at: DateTime<Utc>,
}

/// Manages the set of live dashboard connections and fans ledger events
/// out to all of them. Cheap to clone; publish never blocks and a dead
/// subscriber never affects delivery to the others.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    subscribers: RwLock<HashMap<Uuid, Subscriber>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                subscribers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a new live observer. Returns the connection id (used only
    /// for later unsubscription) and the event receiver.
    pub fn subscribe(&self) -> (Uuid, mpsc::UnboundedReceiver<LedgerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        match self.inner.subscribers.write() {
            Ok(mut subs) => {
                subs.insert(
                    conn_id,
                    Subscriber {
                        tx,
                        connected_at: Utc::now(),
                    },
                );
            }
            Err(e) => error!("subscriber registry poisoned on subscribe: {e}"),
        }

        (conn_id, rx)
    }

    /// Idempotent removal; a handle already gone (prior disconnect, pruned
    /// after a failed delivery) is a no-op.
    pub fn unsubscribe(&self, conn_id: Uuid) {
        let Ok(mut subs) = self.inner.subscribers.write() else {
            error!("subscriber registry poisoned on unsubscribe");
            return;
        };
        if let Some(sub) = subs.remove(&conn_id) {
            let held = Utc::now().signed_duration_since(sub.connected_at);
            info!("subscriber {conn_id} removed after {}s", held.num_seconds());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Deliver an event to every registered connection, each independently.
    /// A failed delivery is logged and that subscriber pruned; it is never
    /// surfaced to the caller and never stalls the other subscribers.
    pub fn publish(&self, event: LedgerEvent) {
        let dead: Vec<Uuid> = {
            let Ok(subs) = self.inner.subscribers.read() else {
                error!("subscriber registry poisoned on publish");
                return;
            };
            subs.iter()
                .filter(|(_, sub)| sub.tx.send(event.clone()).is_err())
                .map(|(&id, _)| id)
                .collect()
        };

        for conn_id in dead {
            warn!("delivery to subscriber {conn_id} failed, dropping it");
            self.unsubscribe(conn_id);
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for Dispatcher {
    fn publish(&self, event: LedgerEvent) {
        Dispatcher::publish(self, event);
    }
}
