//! SurrealDB repository implementations.

mod business;
mod payment_method;
mod recurring_expense;
mod shipping_zone;

pub use business::SurrealBusinessRepository;
pub use payment_method::SurrealPaymentMethodRepository;
pub use recurring_expense::SurrealRecurringExpenseRepository;
pub use shipping_zone::SurrealShippingZoneRepository;

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid {field} UUID: {e}")))
}

pub(crate) fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, DbError> {
    Decimal::from_str(raw).map_err(|e| DbError::Decode(format!("invalid {field} decimal: {e}")))
}

pub(crate) fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| DbError::Decode(format!("invalid {field} date: {e}")))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
