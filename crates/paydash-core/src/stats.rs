//! Dashboard aggregates, recomputed on demand from persisted state.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{Days, Local, NaiveDate};

use paydash_db::{queries, Database};
use paydash_types::models::{StatsSnapshot, TrendPoint};

use crate::convert::cents_to_amount;

/// Pure read-side computation over the ledger's persisted payments. All
/// sub-queries of one `compute` run under a single connection lock, so a
/// snapshot is internally consistent even while writes race it.
pub struct StatsAggregator {
    db: Arc<Database>,
}

impl StatsAggregator {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn compute(&self) -> Result<StatsSnapshot> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || compute_blocking(&db))
            .await
            .map_err(|e| anyhow!("join error: {e}"))?
    }
}

fn compute_blocking(db: &Database) -> Result<StatsSnapshot> {
    // "now" is captured once so every window below shares the same
    // reference point. Day boundaries are local calendar days.
    let now = Local::now();
    let now_ms = now.timestamp_millis();
    let today = now.date_naive();
    let today_start_ms = local_day_start_ms(today)?;
    let week_start_ms = now_ms - 7 * 24 * 60 * 60 * 1000;

    db.with_conn(|conn| {
        let transactions_today = queries::count_payments_between(conn, today_start_ms, now_ms, None)?;
        let transactions_this_week = queries::count_payments_between(conn, week_start_ms, now_ms, None)?;
        let revenue_today = queries::sum_success_cents_between(conn, today_start_ms, now_ms)?;
        let revenue_this_week = queries::sum_success_cents_between(conn, week_start_ms, now_ms)?;
        let failed_transactions =
            queries::count_payments_between(conn, week_start_ms, now_ms, Some("failed"))?;

        // Exactly 7 points, oldest first, ending at today. A day with no
        // successful payments still contributes a zero point.
        let mut revenue_trend = Vec::with_capacity(7);
        for back in (0..7u64).rev() {
            let day = today
                .checked_sub_days(Days::new(back))
                .context("trend day underflow")?;
            let next_day = day.checked_add_days(Days::new(1)).context("trend day overflow")?;
            let cents = queries::sum_success_cents_day(
                conn,
                local_day_start_ms(day)?,
                local_day_start_ms(next_day)?,
            )?;
            revenue_trend.push(TrendPoint {
                date: day.format("%Y-%m-%d").to_string(),
                revenue: cents_to_amount(cents),
            });
        }

        Ok(StatsSnapshot {
            transactions_today,
            transactions_this_week,
            revenue_today: cents_to_amount(revenue_today),
            revenue_this_week: cents_to_amount(revenue_this_week),
            failed_transactions,
            revenue_trend,
        })
    })
}

/// Unix millis of local midnight on `day`. `earliest` picks the first
/// valid instant when a DST shift lands on midnight.
fn local_day_start_ms(day: NaiveDate) -> Result<i64> {
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .context("invalid midnight")?
        .and_local_timezone(Local)
        .earliest()
        .with_context(|| format!("no local midnight on {day}"))?;
    Ok(midnight.timestamp_millis())
}
