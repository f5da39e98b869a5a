//! Recurring expense domain model and its status lifecycle.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TenantryError, TenantryResult};
use crate::lifecycle::{Lifecycle, Transition, TransitionTable};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecurringExpenseStatus {
    Active,
    Paused,
    Ended,
    Canceled,
}

impl RecurringExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for RecurringExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurringExpenseStatus {
    type Err = TenantryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "ended" => Ok(Self::Ended),
            "canceled" => Ok(Self::Canceled),
            other => Err(TenantryError::validation(
                "status",
                format!("unknown recurring expense status: {other}"),
            )),
        }
    }
}

/// Every status can be left, and canceled expenses can only be reactivated.
pub static RECURRING_EXPENSE_TRANSITIONS: LazyLock<TransitionTable<RecurringExpenseStatus>> =
    LazyLock::new(|| {
        use RecurringExpenseStatus::*;
        TransitionTable::new(
            "recurring_expense",
            &[
                (Active, &[Paused, Ended, Canceled]),
                (Paused, &[Active, Ended, Canceled]),
                (Ended, &[Active, Canceled]),
                (Canceled, &[Active]),
            ],
        )
    });

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// The `n`th occurrence after `anchor`. Month arithmetic is counted from
    /// the anchor and clamps to the last day of shorter months, so a schedule
    /// anchored on the 31st does not drift after February.
    pub fn occurrence(&self, anchor: NaiveDate, n: u32) -> Option<NaiveDate> {
        match self {
            Self::Daily => anchor.checked_add_days(Days::new(u64::from(n))),
            Self::Weekly => anchor.checked_add_days(Days::new(7 * u64::from(n))),
            Self::Monthly => anchor.checked_add_months(Months::new(n)),
            Self::Yearly => anchor.checked_add_months(Months::new(n.checked_mul(12)?)),
        }
    }
}

impl FromStr for Frequency {
    type Err = TenantryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(TenantryError::validation(
                "frequency",
                format!("unknown frequency: {other}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringExpense {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub business_id: Uuid,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Next date an occurrence is due. Starts at `start_date` and moves
    /// along the schedule as occurrences are recorded.
    pub next_date: NaiveDate,
    pub amount: Decimal,
    /// Copied from the owning business at creation.
    pub currency: String,
    pub category: String,
    pub note: Option<String>,
    pub status: RecurringExpenseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringExpense {
    /// The due date that follows `next_date` on this schedule.
    ///
    /// Only active expenses produce occurrences. Fails with `Conflict` once
    /// the following date would fall after `end_date`.
    pub fn following_date(&self) -> TenantryResult<NaiveDate> {
        if self.status != RecurringExpenseStatus::Active {
            return Err(TenantryError::Conflict {
                entity: "recurring_expense".into(),
                message: format!("expense is {}, occurrences need active", self.status),
            });
        }
        let overflow = || TenantryError::validation("next_date", "schedule overflows the calendar");
        let mut n = 1u32;
        let following = loop {
            let date = self
                .frequency
                .occurrence(self.start_date, n)
                .ok_or_else(overflow)?;
            if date > self.next_date {
                break date;
            }
            n = n.checked_add(1).ok_or_else(overflow)?;
        };
        if self.end_date.is_some_and(|end| following > end) {
            return Err(TenantryError::Conflict {
                entity: "recurring_expense".into(),
                message: format!("schedule ends before {following}"),
            });
        }
        Ok(following)
    }
}

impl Lifecycle for RecurringExpense {
    type Status = RecurringExpenseStatus;

    fn transitions() -> &'static TransitionTable<RecurringExpenseStatus> {
        &RECURRING_EXPENSE_TRANSITIONS
    }

    fn status(&self) -> RecurringExpenseStatus {
        self.status
    }

    fn apply(&mut self, transition: Transition<RecurringExpenseStatus>) {
        self.status = transition.to();
    }
}

#[derive(Debug, Clone)]
pub struct CreateRecurringExpense {
    pub tenant_id: Uuid,
    pub business_id: Uuid,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub amount: Decimal,
    pub currency: String,
    pub category: String,
    pub note: Option<String>,
}

impl CreateRecurringExpense {
    pub fn validate(&self) -> TenantryResult<()> {
        validate_amount(self.amount)?;
        validate_category(&self.category)?;
        validate_dates(self.start_date, self.end_date)
    }
}

/// Field edits. Status changes go through
/// [`RecurringExpenseRepository::update_status`](crate::repository::RecurringExpenseRepository::update_status).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateRecurringExpense {
    pub frequency: Option<Frequency>,
    pub start_date: Option<NaiveDate>,
    /// `Some(None)` removes the end date.
    pub end_date: Option<Option<NaiveDate>>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub note: Option<Option<String>>,
}

impl UpdateRecurringExpense {
    /// Validate the edit against the row it will be applied to.
    pub fn validate_against(&self, current: &RecurringExpense) -> TenantryResult<()> {
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
        }
        if let Some(category) = &self.category {
            validate_category(category)?;
        }
        let start = self.start_date.unwrap_or(current.start_date);
        let end = self.end_date.unwrap_or(current.end_date);
        validate_dates(start, end)
    }
}

fn validate_amount(amount: Decimal) -> TenantryResult<()> {
    if amount <= Decimal::ZERO {
        return Err(TenantryError::validation(
            "amount",
            "amount must be greater than zero",
        ));
    }
    Ok(())
}

fn validate_category(category: &str) -> TenantryResult<()> {
    if category.trim().is_empty() {
        return Err(TenantryError::validation("category", "category is required"));
    }
    Ok(())
}

fn validate_dates(start: NaiveDate, end: Option<NaiveDate>) -> TenantryResult<()> {
    if end.is_some_and(|end| end < start) {
        return Err(TenantryError::validation(
            "end_date",
            "end date must not be before start date",
        ));
    }
    Ok(())
}
