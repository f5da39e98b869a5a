//! SurrealDB implementation of [`RecurringExpenseRepository`].

use chrono::{DateTime, NaiveDate, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenantry_core::error::{TenantryError, TenantryResult};
use tenantry_core::lifecycle::Transition;
use tenantry_core::models::recurring_expense::{
    CreateRecurringExpense, RecurringExpense, RecurringExpenseStatus, UpdateRecurringExpense,
};
use tenantry_core::repository::{PaginatedResult, Pagination, RecurringExpenseRepository};
use tracing::debug;
use uuid::Uuid;

use super::{CountRow, format_date, parse_date, parse_decimal, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct RecurringExpenseRow {
    tenant_id: String,
    business_id: String,
    frequency: String,
    start_date: String,
    end_date: Option<String>,
    next_date: String,
    amount: String,
    currency: String,
    category: String,
    note: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct RecurringExpenseRowWithId {
    record_id: String,
    tenant_id: String,
    business_id: String,
    frequency: String,
    start_date: String,
    end_date: Option<String>,
    next_date: String,
    amount: String,
    currency: String,
    category: String,
    note: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecurringExpenseRow {
    fn into_expense(self, id: Uuid) -> Result<RecurringExpense, DbError> {
        Ok(RecurringExpense {
            id,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            business_id: parse_uuid("business", &self.business_id)?,
            frequency: self
                .frequency
                .parse()
                .map_err(|e: TenantryError| DbError::Decode(e.to_string()))?,
            start_date: parse_date("start_date", &self.start_date)?,
            end_date: self
                .end_date
                .as_deref()
                .map(|d| parse_date("end_date", d))
                .transpose()?,
            next_date: parse_date("next_date", &self.next_date)?,
            amount: parse_decimal("amount", &self.amount)?,
            currency: self.currency,
            category: self.category,
            note: self.note,
            status: self
                .status
                .parse()
                .map_err(|e: TenantryError| DbError::Decode(e.to_string()))?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl RecurringExpenseRowWithId {
    fn try_into_expense(self) -> Result<RecurringExpense, DbError> {
        let id = parse_uuid("recurring_expense", &self.record_id)?;
        RecurringExpenseRow {
            tenant_id: self.tenant_id,
            business_id: self.business_id,
            frequency: self.frequency,
            start_date: self.start_date,
            end_date: self.end_date,
            next_date: self.next_date,
            amount: self.amount,
            currency: self.currency,
            category: self.category,
            note: self.note,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_expense(id)
    }
}

fn first(rows: Vec<RecurringExpenseRow>, id: Uuid) -> Result<Option<RecurringExpense>, DbError> {
    rows.into_iter()
        .next()
        .map(|row| row.into_expense(id))
        .transpose()
}

fn not_found(id: Uuid) -> DbError {
    DbError::NotFound {
        entity: "recurring_expense".into(),
        id: id.to_string(),
    }
}

/// SurrealDB implementation of the RecurringExpense repository.
#[derive(Clone)]
pub struct SurrealRecurringExpenseRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRecurringExpenseRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RecurringExpenseRepository for SurrealRecurringExpenseRepository<C> {
    async fn create(&self, input: CreateRecurringExpense) -> TenantryResult<RecurringExpense> {
        let id = Uuid::new_v4();

        let result = self
            .db
            .query(
                "CREATE type::record('recurring_expense', $id) SET \
                 tenant_id = $tenant_id, business_id = $business_id, \
                 frequency = $frequency, start_date = $start_date, \
                 end_date = $end_date, next_date = $start_date, \
                 amount = $amount, currency = $currency, \
                 category = $category, note = $note, status = $status",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("business_id", input.business_id.to_string()))
            .bind(("frequency", input.frequency.as_str().to_string()))
            .bind(("start_date", format_date(input.start_date)))
            .bind(("end_date", input.end_date.map(format_date)))
            .bind(("amount", input.amount.to_string()))
            .bind(("currency", input.currency))
            .bind(("category", input.category))
            .bind(("note", input.note))
            .bind((
                "status",
                RecurringExpenseStatus::Active.as_str().to_string(),
            ))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("recurring_expense", e.to_string()))?;
        let rows: Vec<RecurringExpenseRow> = result.take(0).map_err(DbError::from)?;
        Ok(first(rows, id)?.ok_or_else(|| not_found(id))?)
    }

    async fn get(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
    ) -> TenantryResult<RecurringExpense> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('recurring_expense', $id) \
                 WHERE tenant_id = $tenant_id AND business_id = $business_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("business_id", business_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RecurringExpenseRow> = result.take(0).map_err(DbError::from)?;
        Ok(first(rows, id)?.ok_or_else(|| not_found(id))?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        status: Option<RecurringExpenseStatus>,
        pagination: Pagination,
    ) -> TenantryResult<PaginatedResult<RecurringExpense>> {
        let filter = if status.is_some() {
            " AND status = $status"
        } else {
            ""
        };
        let status = status.map(|s| s.as_str().to_string());

        let count_query = format!(
            "SELECT count() AS total FROM recurring_expense \
             WHERE tenant_id = $tenant_id AND business_id = $business_id{filter} \
             GROUP ALL"
        );
        let mut count_result = self
            .db
            .query(&count_query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("business_id", business_id.to_string()))
            .bind(("status", status.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM recurring_expense \
             WHERE tenant_id = $tenant_id AND business_id = $business_id{filter} \
             ORDER BY created_at ASC \
             LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("business_id", business_id.to_string()))
            .bind(("status", status))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RecurringExpenseRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_expense())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
        input: UpdateRecurringExpense,
    ) -> TenantryResult<RecurringExpense> {
        let mut sets = Vec::new();
        if input.frequency.is_some() {
            sets.push("frequency = $frequency");
        }
        if input.start_date.is_some() {
            // A new schedule restarts at its first occurrence.
            sets.push("start_date = $start_date, next_date = $start_date");
        }
        if input.end_date.is_some() {
            sets.push("end_date = $end_date");
        }
        if input.amount.is_some() {
            sets.push("amount = $amount");
        }
        if input.category.is_some() {
            sets.push("category = $category");
        }
        if input.note.is_some() {
            sets.push("note = $note");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('recurring_expense', $id) SET {} \
             WHERE tenant_id = $tenant_id AND business_id = $business_id",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("business_id", business_id.to_string()));

        if let Some(frequency) = input.frequency {
            builder = builder.bind(("frequency", frequency.as_str().to_string()));
        }
        if let Some(start_date) = input.start_date {
            builder = builder.bind(("start_date", format_date(start_date)));
        }
        if let Some(end_date) = input.end_date {
            builder = builder.bind(("end_date", end_date.map(format_date)));
        }
        if let Some(amount) = input.amount {
            builder = builder.bind(("amount", amount.to_string()));
        }
        if let Some(category) = input.category {
            builder = builder.bind(("category", category));
        }
        if let Some(note) = input.note {
            builder = builder.bind(("note", note));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("recurring_expense", e.to_string()))?;
        let rows: Vec<RecurringExpenseRow> = result.take(0).map_err(DbError::from)?;
        Ok(first(rows, id)?.ok_or_else(|| not_found(id))?)
    }

    async fn update_status(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
        transition: Transition<RecurringExpenseStatus>,
    ) -> TenantryResult<RecurringExpense> {
        let result = self
            .db
            .query(
                "UPDATE type::record('recurring_expense', $id) SET \
                 status = $to, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id AND business_id = $business_id \
                 AND status = $from",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("business_id", business_id.to_string()))
            .bind(("from", transition.from().as_str().to_string()))
            .bind(("to", transition.to().as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("recurring_expense", e.to_string()))?;
        let rows: Vec<RecurringExpenseRow> = result.take(0).map_err(DbError::from)?;
        if let Some(updated) = first(rows, id)? {
            return Ok(updated);
        }

        // Nothing matched: either the row is gone or its status moved on.
        let current = self.get(tenant_id, business_id, id).await?;
        debug!(
            recurring_expense_id = %id,
            expected = %transition.from(),
            actual = %current.status,
            "Status compare-and-set lost"
        );
        Err(TenantryError::Conflict {
            entity: "recurring_expense".into(),
            message: format!(
                "status is {}, expected {}",
                current.status,
                transition.from()
            ),
        })
    }

    async fn advance_next_date(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> TenantryResult<RecurringExpense> {
        let result = self
            .db
            .query(
                "UPDATE type::record('recurring_expense', $id) SET \
                 next_date = $to, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id AND business_id = $business_id \
                 AND next_date = $from AND status = $active",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("business_id", business_id.to_string()))
            .bind(("from", format_date(from)))
            .bind(("to", format_date(to)))
            .bind((
                "active",
                RecurringExpenseStatus::Active.as_str().to_string(),
            ))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("recurring_expense", e.to_string()))?;
        let rows: Vec<RecurringExpenseRow> = result.take(0).map_err(DbError::from)?;
        if let Some(updated) = first(rows, id)? {
            return Ok(updated);
        }

        let current = self.get(tenant_id, business_id, id).await?;
        debug!(
            recurring_expense_id = %id,
            expected = %from,
            actual = %current.next_date,
            status = %current.status,
            "Next date compare-and-set lost"
        );
        let message = if current.status == RecurringExpenseStatus::Active {
            format!("next date is {}, expected {from}", current.next_date)
        } else {
            format!("expense is {}", current.status)
        };
        Err(TenantryError::Conflict {
            entity: "recurring_expense".into(),
            message,
        })
    }

    async fn delete(&self, tenant_id: Uuid, business_id: Uuid, id: Uuid) -> TenantryResult<()> {
        let result = self
            .db
            .query(
                "DELETE type::record('recurring_expense', $id) \
                 WHERE tenant_id = $tenant_id AND business_id = $business_id \
                 RETURN BEFORE",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("business_id", business_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("recurring_expense", e.to_string()))?;
        let rows: Vec<RecurringExpenseRow> = result.take(0).map_err(DbError::from)?;
        first(rows, id)?.ok_or_else(|| not_found(id))?;
        Ok(())
    }
}
