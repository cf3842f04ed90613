//! Ledger write path, queries, aggregation and the broadcast handoff.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use paydash_core::{EventSink, LedgerError, PaymentLedger, StatsAggregator};
use paydash_db::models::PaymentRow;
use paydash_db::Database;
use paydash_types::api::{CreatePaymentRequest, PaymentFilter};
use paydash_types::events::LedgerEvent;
use paydash_types::models::{PaymentMethod, PaymentStatus};

/// Sink that records published events in order.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: LedgerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn test_ledger() -> (Arc<Database>, Arc<RecordingSink>, PaymentLedger) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let sink = Arc::new(RecordingSink::default());
    let ledger = PaymentLedger::new(db.clone(), sink.clone());
    (db, sink, ledger)
}

fn payment_request(amount: Decimal, status: PaymentStatus) -> CreatePaymentRequest {
    CreatePaymentRequest {
        amount,
        method: PaymentMethod::Upi,
        status,
        receiver: "acme".to_string(),
        description: None,
        failure_reason: None,
    }
}

fn seed_backdated(db: &Database, receiver: &str, cents: i64, status: &str, created_at_ms: i64) {
    db.insert_payment(&PaymentRow {
        id: Uuid::new_v4().to_string(),
        amount_cents: cents,
        method: "credit_card".to_string(),
        status: status.to_string(),
        receiver: receiver.to_string(),
        description: None,
        transaction_id: format!("TXN{created_at_ms}{receiver}").replace(|c: char| !c.is_ascii_alphanumeric(), ""),
        failure_reason: None,
        created_at_ms,
        updated_at_ms: created_at_ms,
    })
    .unwrap();
}

#[tokio::test]
async fn non_positive_amounts_are_rejected_with_no_record() {
    let (_db, sink, ledger) = test_ledger();

    for amount in [Decimal::ZERO, Decimal::new(-500, 2)] {
        let err = ledger
            .create(payment_request(amount, PaymentStatus::Success))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount));
    }

    let (items, total) = ledger.list(&PaymentFilter::default()).await.unwrap();
    assert!(items.is_empty());
    assert_eq!(total, 0);
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn over_precise_amounts_are_rejected() {
    let (_db, _sink, ledger) = test_ledger();
    let err = ledger
        .create(payment_request(Decimal::new(10005, 3), PaymentStatus::Success))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount));
}

#[tokio::test]
async fn empty_receiver_is_rejected() {
    let (_db, _sink, ledger) = test_ledger();
    let mut req = payment_request(Decimal::new(100, 0), PaymentStatus::Success);
    req.receiver = "   ".to_string();
    let err = ledger.create(req).await.unwrap_err();
    assert!(matches!(err, LedgerError::EmptyReceiver));
}

#[tokio::test]
async fn back_to_back_creates_get_distinct_transaction_ids() {
    let (_db, _sink, ledger) = test_ledger();

    let a = ledger
        .create(payment_request(Decimal::new(1000, 2), PaymentStatus::Success))
        .await
        .unwrap();
    let b = ledger
        .create(payment_request(Decimal::new(1000, 2), PaymentStatus::Success))
        .await
        .unwrap();

    assert_ne!(a.transactionid, b.transactionid);
}

/// Returns the same id for the first two calls, fresh ids after — so the
/// second create collides once and its retry succeeds.
fn colliding_then_fresh() -> String {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    match CALLS.fetch_add(1, Ordering::SeqCst) {
        0 | 1 => "TXN111111111111111".to_string(),
        n => format!("TXN222222222222{n:03}"),
    }
}

fn always_stuck() -> String {
    "TXN999999999999999".to_string()
}

#[tokio::test]
async fn transaction_id_collision_retries_once_with_a_fresh_id() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let sink = Arc::new(RecordingSink::default());
    let ledger = PaymentLedger::with_transaction_ids(db, sink, colliding_then_fresh);

    let first = ledger
        .create(payment_request(Decimal::new(1000, 2), PaymentStatus::Success))
        .await
        .unwrap();
    let second = ledger
        .create(payment_request(Decimal::new(2000, 2), PaymentStatus::Success))
        .await
        .unwrap();

    assert_eq!(first.transactionid, "TXN111111111111111");
    assert!(second.transactionid.starts_with("TXN222"));
    assert_ne!(second.transactionid, first.transactionid);
}

#[tokio::test]
async fn collision_that_survives_the_retry_surfaces_a_conflict() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let sink = Arc::new(RecordingSink::default());
    let ledger = PaymentLedger::with_transaction_ids(db, sink.clone(), always_stuck);

    ledger
        .create(payment_request(Decimal::new(1000, 2), PaymentStatus::Success))
        .await
        .unwrap();
    let err = ledger
        .create(payment_request(Decimal::new(2000, 2), PaymentStatus::Success))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::PersistenceConflict));

    // Only the first write persisted, and only it was broadcast.
    let (_, total) = ledger.list(&PaymentFilter::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(sink.events().len(), 2);
}

#[tokio::test]
async fn page_far_past_the_end_is_empty_not_a_panic() {
    let (db, _sink, ledger) = test_ledger();

    let now_ms = Utc::now().timestamp_millis();
    seed_backdated(&db, "only", 1000, "success", now_ms - 1000);

    let filter = PaymentFilter {
        page: Some(u32::MAX),
        limit: Some(1000),
        ..Default::default()
    };
    let (items, total) = ledger.list(&filter).await.unwrap();

    assert!(items.is_empty());
    assert_eq!(total, 1);
}

#[tokio::test]
async fn create_persists_then_publishes_payment_before_stats() {
    let (_db, sink, ledger) = test_ledger();

    let payment = ledger
        .create(CreatePaymentRequest {
            amount: Decimal::new(100, 0),
            method: PaymentMethod::Upi,
            status: PaymentStatus::Success,
            receiver: "acme".to_string(),
            description: None,
            failure_reason: None,
        })
        .await
        .unwrap();

    assert!(payment.transactionid.starts_with("TXN"));
    assert!(payment.transactionid[3..].chars().all(|c| c.is_ascii_digit()));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    match &events[0] {
        LedgerEvent::PaymentCreated(broadcast) => {
            assert_eq!(broadcast.id, payment.id);
            assert_eq!(broadcast.transactionid, payment.transactionid);
        }
        other => panic!("expected payment-created first, got {}", other.name()),
    }
    match &events[1] {
        LedgerEvent::StatsUpdated(stats) => {
            assert!(stats.revenue_today >= Decimal::new(100, 0));
        }
        other => panic!("expected stats-updated second, got {}", other.name()),
    }
}

#[tokio::test]
async fn find_by_id_roundtrips_and_misses_cleanly() {
    let (_db, _sink, ledger) = test_ledger();

    let created = ledger
        .create(payment_request(Decimal::new(1999, 2), PaymentStatus::Pending))
        .await
        .unwrap();

    let fetched = ledger.find_by_id(created.id).await.unwrap();
    assert_eq!(fetched.amount, Decimal::new(1999, 2));
    assert_eq!(fetched.status, PaymentStatus::Pending);

    let missing = Uuid::new_v4();
    let err = ledger.find_by_id(missing).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(id) if id == missing));
}

#[tokio::test]
async fn list_pages_newest_first_with_filtered_total() {
    let (db, _sink, ledger) = test_ledger();

    let base_ms = Utc::now().timestamp_millis() - 60_000;
    for i in 0..25 {
        seed_backdated(&db, &format!("r{i:02}"), 1000 + i, "success", base_ms + i * 1000);
    }

    let filter = PaymentFilter {
        page: Some(2),
        limit: Some(10),
        ..Default::default()
    };
    let (items, total) = ledger.list(&filter).await.unwrap();

    assert_eq!(total, 25);
    assert_eq!(items.len(), 10);
    // Newest first: page 2 holds records 11..=20 counting from the newest.
    assert_eq!(items[0].receiver, "r14");
    assert_eq!(items[9].receiver, "r05");
}

#[tokio::test]
async fn list_filters_apply_conjunctively() {
    let (db, _sink, ledger) = test_ledger();

    let now_ms = Utc::now().timestamp_millis();
    seed_backdated(&db, "match", 1000, "success", now_ms - 3000);
    seed_backdated(&db, "wrongstatus", 1000, "failed", now_ms - 2000);
    db.insert_payment(&PaymentRow {
        id: Uuid::new_v4().to_string(),
        amount_cents: 1000,
        method: "paypal".to_string(),
        status: "success".to_string(),
        receiver: "wrongmethod".to_string(),
        description: None,
        transaction_id: "TXN000000000001".to_string(),
        failure_reason: None,
        created_at_ms: now_ms - 1000,
        updated_at_ms: now_ms - 1000,
    })
    .unwrap();

    let filter = PaymentFilter {
        status: Some(PaymentStatus::Success),
        method: Some(PaymentMethod::CreditCard),
        ..Default::default()
    };
    let (items, total) = ledger.list(&filter).await.unwrap();

    assert_eq!(total, 1);
    assert_eq!(items[0].receiver, "match");
}

#[tokio::test]
async fn stats_reflect_a_single_payment_made_today() {
    let (_db, _sink, ledger) = test_ledger();

    ledger
        .create(payment_request(Decimal::new(4250, 2), PaymentStatus::Success))
        .await
        .unwrap();

    let stats = ledger.stats().compute().await.unwrap();
    assert_eq!(stats.transactions_today, 1);
    assert_eq!(stats.revenue_today, Decimal::new(4250, 2));
    assert_eq!(stats.revenue_this_week, Decimal::new(4250, 2));
    assert_eq!(stats.failed_transactions, 0);

    assert_eq!(stats.revenue_trend.len(), 7);
    let last = stats.revenue_trend.last().unwrap();
    assert_eq!(last.revenue, Decimal::new(4250, 2));
    for point in &stats.revenue_trend[..6] {
        assert_eq!(point.revenue, Decimal::ZERO);
    }
}

#[tokio::test]
async fn revenue_counts_only_successful_payments() {
    let (_db, _sink, ledger) = test_ledger();

    ledger
        .create(payment_request(Decimal::new(5000, 2), PaymentStatus::Success))
        .await
        .unwrap();
    ledger
        .create(payment_request(Decimal::new(7000, 2), PaymentStatus::Failed))
        .await
        .unwrap();
    ledger
        .create(payment_request(Decimal::new(9000, 2), PaymentStatus::Pending))
        .await
        .unwrap();

    let stats = ledger.stats().compute().await.unwrap();
    assert_eq!(stats.transactions_today, 3);
    assert_eq!(stats.revenue_today, Decimal::new(5000, 2));
    assert_eq!(stats.failed_transactions, 1);
}

#[tokio::test]
async fn empty_ledger_still_yields_a_full_trend() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let stats = StatsAggregator::new(db).compute().await.unwrap();

    assert_eq!(stats.transactions_today, 0);
    assert_eq!(stats.revenue_today, Decimal::ZERO);
    assert_eq!(stats.revenue_trend.len(), 7);
    assert!(stats.revenue_trend.iter().all(|p| p.revenue == Decimal::ZERO));
}

#[tokio::test]
async fn csv_export_round_trips_awkward_fields() {
    let (_db, _sink, ledger) = test_ledger();

    let mut req = payment_request(Decimal::new(12345, 2), PaymentStatus::Success);
    req.receiver = "Widgets, \"Inc\"".to_string();
    req.description = Some("line one\nline two".to_string());
    let created = ledger.create(req).await.unwrap();

    let csv_text = ledger.export_csv().await.unwrap();
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());

    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "ID");
    assert_eq!(&headers[6], "Transaction ID");

    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(&records[0][1], "123.45");
    assert_eq!(&records[0][4], "Widgets, \"Inc\"");
    assert_eq!(&records[0][5], "line one\nline two");
    assert_eq!(&records[0][6], created.transactionid);
}

#[tokio::test]
async fn export_orders_newest_first() {
    let (db, _sink, ledger) = test_ledger();

    let base_ms = Utc::now().timestamp_millis() - 10_000;
    seed_backdated(&db, "older", 1000, "success", base_ms);
    seed_backdated(&db, "newer", 2000, "success", base_ms + 5000);

    let csv_text = ledger.export_csv().await.unwrap();
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let receivers: Vec<String> = reader
        .records()
        .map(|r| r.unwrap()[4].to_string())
        .collect();

    assert_eq!(receivers, vec!["newer".to_string(), "older".to_string()]);
}
