//! Guarded lifecycle transitions.
//!
//! A [`TransitionTable`] is a static adjacency map `status -> allowed next
//! statuses`. Self-transitions are only allowed when listed, and a status
//! with no outgoing edges is terminal.
//!
//! The only way to obtain a [`Transition`] is to have a table approve it,
//! and repositories accept status changes only in the form of a
//! `Transition`. That keeps every persisted status change behind the
//! table check.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use crate::error::{TenantryError, TenantryResult};

/// Marker for status enums usable in a [`TransitionTable`].
pub trait Status: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> Status for T where T: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// A transition approved by a [`TransitionTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S> {
    from: S,
    to: S,
}

impl<S: Copy> Transition<S> {
    pub fn from(&self) -> S {
        self.from
    }

    pub fn to(&self) -> S {
        self.to
    }
}

#[derive(Debug, Clone)]
pub struct TransitionTable<S: Status> {
    entity: &'static str,
    edges: HashMap<S, HashSet<S>>,
}

impl<S: Status> TransitionTable<S> {
    /// Build a table from `(status, allowed targets)` rows. Statuses that
    /// never appear on the left-hand side are terminal.
    pub fn new(entity: &'static str, rows: &[(S, &[S])]) -> Self {
        let edges = rows
            .iter()
            .map(|(from, targets)| (*from, targets.iter().copied().collect()))
            .collect();
        Self { entity, edges }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn can_transition(&self, from: S, to: S) -> bool {
        self.edges
            .get(&from)
            .is_some_and(|targets| targets.contains(&to))
    }

    pub fn is_terminal(&self, status: S) -> bool {
        self.edges.get(&status).is_none_or(HashSet::is_empty)
    }

    /// Allowed targets from `from`, in no particular order.
    pub fn allowed_from(&self, from: S) -> Vec<S> {
        self.edges
            .get(&from)
            .map(|targets| targets.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Approve `from -> to` or explain why not.
    pub fn check(&self, from: S, to: S) -> TenantryResult<Transition<S>> {
        if self.can_transition(from, to) {
            Ok(Transition { from, to })
        } else {
            Err(TenantryError::InvalidTransition {
                entity: self.entity.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Check and apply a transition to an in-memory entity. On rejection
    /// the entity is left untouched. Persisting the result is the
    /// caller's job.
    pub fn transition<E>(&self, entity: &mut E, to: S) -> TenantryResult<Transition<S>>
    where
        E: Lifecycle<Status = S>,
    {
        let transition = self.check(entity.status(), to)?;
        entity.apply(transition);
        Ok(transition)
    }
}

/// An entity whose status is governed by a [`TransitionTable`].
pub trait Lifecycle {
    type Status: Status;

    fn transitions() -> &'static TransitionTable<Self::Status>;

    fn status(&self) -> Self::Status;

    /// Store the target status of an approved transition.
    fn apply(&mut self, transition: Transition<Self::Status>);

    fn transition_to(&mut self, to: Self::Status) -> TenantryResult<Transition<Self::Status>>
    where
        Self: Sized,
    {
        Self::transitions().transition(self, to)
    }
}
