//! Order fulfilment and payment lifecycles.
//!
//! Orders themselves are managed elsewhere; this module only carries the
//! two status tables and the rule tying them together: payment status may
//! change only while the order is live.

use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{TenantryError, TenantryResult};
use crate::lifecycle::{Lifecycle, Transition, TransitionTable};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Placed,
    ReadyForShipment,
    Shipped,
    Fulfilled,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Placed => "placed",
            Self::ReadyForShipment => "ready_for_shipment",
            Self::Shipped => "shipped",
            Self::Fulfilled => "fulfilled",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        }
    }

    /// Statuses in which the payment status may still change.
    pub fn accepts_payment_updates(&self) -> bool {
        matches!(
            self,
            Self::Placed | Self::ReadyForShipment | Self::Shipped | Self::Fulfilled
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl OrderPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for OrderPaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ReadyForShipment is optional: Placed may go straight to Shipped.
pub static ORDER_TRANSITIONS: LazyLock<TransitionTable<OrderStatus>> = LazyLock::new(|| {
    use OrderStatus::*;
    TransitionTable::new(
        "order",
        &[
            (Pending, &[Placed, Cancelled]),
            (Placed, &[ReadyForShipment, Shipped, Cancelled]),
            (ReadyForShipment, &[Shipped, Cancelled]),
            (Shipped, &[Fulfilled]),
            (Fulfilled, &[Returned]),
        ],
    )
});

pub static ORDER_PAYMENT_TRANSITIONS: LazyLock<TransitionTable<OrderPaymentStatus>> =
    LazyLock::new(|| {
        use OrderPaymentStatus::*;
        TransitionTable::new(
            "order_payment",
            &[
                (Pending, &[Paid, Failed]),
                (Paid, &[Refunded]),
                (Failed, &[Pending]),
            ],
        )
    });

/// Status pair of one order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderState {
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
}

impl Default for OrderState {
    fn default() -> Self {
        Self {
            status: OrderStatus::Pending,
            payment_status: OrderPaymentStatus::Pending,
        }
    }
}

impl OrderState {
    pub fn transition_payment(
        &mut self,
        to: OrderPaymentStatus,
    ) -> TenantryResult<Transition<OrderPaymentStatus>> {
        if !self.status.accepts_payment_updates() {
            return Err(TenantryError::Conflict {
                entity: "order".into(),
                message: format!(
                    "payment status cannot change while order is {}",
                    self.status
                ),
            });
        }
        let transition = ORDER_PAYMENT_TRANSITIONS.check(self.payment_status, to)?;
        self.payment_status = transition.to();
        Ok(transition)
    }
}

impl Lifecycle for OrderState {
    type Status = OrderStatus;

    fn transitions() -> &'static TransitionTable<OrderStatus> {
        &ORDER_TRANSITIONS
    }

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn apply(&mut self, transition: Transition<OrderStatus>) {
        self.status = transition.to();
    }
}
