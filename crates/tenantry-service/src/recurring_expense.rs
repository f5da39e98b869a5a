//! Recurring expense service.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tenantry_core::RequestContext;
use tenantry_core::error::TenantryResult;
use tenantry_core::lifecycle::Lifecycle;
use tenantry_core::models::recurring_expense::{
    CreateRecurringExpense, Frequency, RecurringExpense, RecurringExpenseStatus,
    UpdateRecurringExpense,
};
use tenantry_core::repository::{
    BusinessRepository, PaginatedResult, Pagination, RecurringExpenseRepository, SharedCache,
};
use tracing::info;
use uuid::Uuid;

use crate::config::Operation;
use crate::coordinator::TransactionCoordinator;
use crate::throttle::ThrottleGate;

#[derive(Debug, Clone)]
pub struct NewRecurringExpense {
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub amount: Decimal,
    pub category: String,
    pub note: Option<String>,
}

pub struct RecurringExpenseService<B, R, C>
where
    B: BusinessRepository,
    R: RecurringExpenseRepository,
    C: SharedCache,
{
    businesses: B,
    expenses: R,
    throttle: Arc<ThrottleGate<C>>,
    coordinator: TransactionCoordinator,
}

impl<B, R, C> RecurringExpenseService<B, R, C>
where
    B: BusinessRepository,
    R: RecurringExpenseRepository,
    C: SharedCache,
{
    pub fn new(
        businesses: B,
        expenses: R,
        throttle: Arc<ThrottleGate<C>>,
        coordinator: TransactionCoordinator,
    ) -> Self {
        Self {
            businesses,
            expenses,
            throttle,
            coordinator,
        }
    }

    /// New expenses start `Active`, in the business's currency.
    pub async fn create_expense(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
        input: NewRecurringExpense,
    ) -> TenantryResult<RecurringExpense> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                self.throttle
                    .check(Operation::ExpenseCreate, business_id, ctx.user_id())
                    .await?;

                let business = self
                    .businesses
                    .get_by_id(ctx.tenant_id(), business_id)
                    .await?;
                let create = CreateRecurringExpense {
                    tenant_id: ctx.tenant_id(),
                    business_id,
                    frequency: input.frequency,
                    start_date: input.start_date,
                    end_date: input.end_date,
                    amount: input.amount,
                    currency: business.currency,
                    category: input.category.trim().to_string(),
                    note: input.note.filter(|n| !n.trim().is_empty()),
                };
                create.validate()?;
                let expense = self.expenses.create(create).await?;
                info!(business_id = %business_id, expense_id = %expense.id, "Recurring expense created");
                Ok(expense)
            })
            .await
    }

    pub async fn get_expense(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
        id: Uuid,
    ) -> TenantryResult<RecurringExpense> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, self.expenses.get(ctx.tenant_id(), business_id, id))
            .await
    }

    pub async fn list_expenses(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
        status: Option<RecurringExpenseStatus>,
        pagination: Pagination,
    ) -> TenantryResult<PaginatedResult<RecurringExpense>> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(
                deadline,
                self.expenses
                    .list(ctx.tenant_id(), business_id, status, pagination),
            )
            .await
    }

    /// Edit schedule, amount or description. Status has its own operation.
    pub async fn update_expense(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
        id: Uuid,
        update: UpdateRecurringExpense,
    ) -> TenantryResult<RecurringExpense> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                self.throttle
                    .check(Operation::ExpenseUpdate, business_id, ctx.user_id())
                    .await?;

                let current = self
                    .expenses
                    .get(ctx.tenant_id(), business_id, id)
                    .await?;
                update.validate_against(&current)?;
                self.expenses
                    .update(ctx.tenant_id(), business_id, id, update)
                    .await
            })
            .await
    }

    /// Move the expense to `to` if its lifecycle allows it.
    ///
    /// The write only lands if the stored status is still the one the
    /// transition was checked against.
    pub async fn update_status(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
        id: Uuid,
        to: RecurringExpenseStatus,
    ) -> TenantryResult<RecurringExpense> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                self.throttle
                    .check(Operation::ExpenseStatus, business_id, ctx.user_id())
                    .await?;

                let mut expense = self
                    .expenses
                    .get(ctx.tenant_id(), business_id, id)
                    .await?;
                let transition = expense.transition_to(to)?;
                let saved = self
                    .expenses
                    .update_status(ctx.tenant_id(), business_id, id, transition)
                    .await?;
                info!(
                    expense_id = %id,
                    from = %transition.from(),
                    to = %transition.to(),
                    "Recurring expense status changed"
                );
                Ok(saved)
            })
            .await
    }

    /// Record that the occurrence due on `next_date` happened and move the
    /// expense to its following due date.
    ///
    /// Two callers recording the same occurrence cannot both advance it:
    /// the second sees `Conflict`.
    pub async fn record_occurrence(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
        id: Uuid,
    ) -> TenantryResult<RecurringExpense> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                self.throttle
                    .check(Operation::ExpenseUpdate, business_id, ctx.user_id())
                    .await?;

                let expense = self
                    .expenses
                    .get(ctx.tenant_id(), business_id, id)
                    .await?;
                let following = expense.following_date()?;
                let saved = self
                    .expenses
                    .advance_next_date(
                        ctx.tenant_id(),
                        business_id,
                        id,
                        expense.next_date,
                        following,
                    )
                    .await?;
                info!(
                    expense_id = %id,
                    occurred_on = %expense.next_date,
                    next_date = %saved.next_date,
                    "Recurring expense occurrence recorded"
                );
                Ok(saved)
            })
            .await
    }

    pub async fn delete_expense(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
        id: Uuid,
    ) -> TenantryResult<()> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                self.throttle
                    .check(Operation::ExpenseDelete, business_id, ctx.user_id())
                    .await?;
                self.expenses
                    .delete(ctx.tenant_id(), business_id, id)
                    .await
            })
            .await
    }
}
