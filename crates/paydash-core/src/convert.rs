//! Conversions between DB rows and API models.
//!
//! Amounts cross this boundary as integer cents (exact SQL sums) and come
//! back out as two-decimal `Decimal` values; timestamps as unix millis.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use paydash_db::models::{PaymentRow, UserRow};
use paydash_types::models::{Payment, PaymentMethod, PaymentStatus, UserRole, UserView};

/// Converts a positive amount with at most two decimal places to cents.
/// Returns `None` for zero, negative, or over-precise values.
pub fn amount_to_cents(amount: Decimal) -> Option<i64> {
    if amount <= Decimal::ZERO || amount.normalize().scale() > 2 {
        return None;
    }
    let mut scaled = amount;
    scaled.rescale(2);
    i64::try_from(scaled.mantissa()).ok()
}

pub fn cents_to_amount(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub fn ms_to_utc(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp {ms} out of range"))
}

pub fn payment_from_row(row: &PaymentRow) -> Result<Payment> {
    Ok(Payment {
        id: row.id.parse()?,
        amount: cents_to_amount(row.amount_cents),
        method: PaymentMethod::from_str(&row.method)?,
        status: PaymentStatus::from_str(&row.status)?,
        receiver: row.receiver.clone(),
        description: row.description.clone(),
        transactionid: row.transaction_id.clone(),
        failure_reason: row.failure_reason.clone(),
        created_at: ms_to_utc(row.created_at_ms)?,
        updated_at: ms_to_utc(row.updated_at_ms)?,
    })
}

/// The redacted user view. The password hash stays behind in the row.
pub fn user_view_from_row(row: &UserRow) -> Result<UserView> {
    Ok(UserView {
        id: row.id.parse()?,
        username: row.username.clone(),
        email: row.email.clone(),
        role: UserRole::from_str(&row.role)?,
        is_active: row.is_active,
        created_at: ms_to_utc(row.created_at_ms)?,
        updated_at: ms_to_utc(row.updated_at_ms)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_amounts() {
        assert_eq!(amount_to_cents(Decimal::ZERO), None);
        assert_eq!(amount_to_cents(Decimal::new(-100, 2)), None);
        // 1.005 has three decimal places
        assert_eq!(amount_to_cents(Decimal::new(1005, 3)), None);
    }

    #[test]
    fn converts_two_decimal_amounts() {
        assert_eq!(amount_to_cents(Decimal::new(4250, 2)), Some(4250));
        assert_eq!(amount_to_cents(Decimal::new(100, 0)), Some(10000));
        // 10.50 written with a trailing zero of extra scale
        assert_eq!(amount_to_cents(Decimal::new(10500, 3)), Some(1050));
        assert_eq!(cents_to_amount(4250), Decimal::new(4250, 2));
    }
}
