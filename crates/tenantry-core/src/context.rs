//! Caller identity and per-request limits.
//!
//! Authentication and authorization happen before the engine is invoked;
//! the engine only trusts the tenant and actor ids it is handed.

use std::time::{Duration, Instant};

use uuid::Uuid;

/// An already-authenticated actor acting inside one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Actor {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
}

/// Everything a service operation needs to know about its caller.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub actor: Actor,
    /// Operations still running at this instant are abandoned.
    pub deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(tenant_id: Uuid, user_id: Uuid) -> Self {
        Self {
            actor: Actor { tenant_id, user_id },
            deadline: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn tenant_id(&self) -> Uuid {
        self.actor.tenant_id
    }

    pub fn user_id(&self) -> Uuid {
        self.actor.user_id
    }

    /// True once the deadline (if any) has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
