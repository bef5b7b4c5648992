#![forbid(unsafe_code)]

//! Observed viewport state and the shared read handle over it.
//!
//! The engine is the only writer of [`ObservedState`]. Readers receive
//! clones, so mutating a returned snapshot never reaches the engine.
//! [`StateHandle`] lets listeners read the live state while the engine is
//! in the middle of a notification cycle.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::InvalidArgumentError;
use crate::query::BreakpointQuery;

/// Last known width (in the configured unit) and the breakpoint it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedState {
    pub width: f64,
    pub breakpoint: String,
}

impl ObservedState {
    #[must_use]
    pub fn new(width: f64, breakpoint: impl Into<String>) -> Self {
        Self {
            width,
            breakpoint: breakpoint.into(),
        }
    }

    /// Whether the current breakpoint satisfies `query`.
    ///
    /// # Errors
    ///
    /// [`InvalidArgumentError`] for an empty query.
    pub fn matches(&self, query: impl Into<BreakpointQuery>) -> Result<bool, InvalidArgumentError> {
        query.into().evaluate(&self.breakpoint)
    }
}

/// Shared, read-only view of engine state.
///
/// Cloning a handle shares the same storage. Only the crate that owns the
/// writer half (see [`StateCell`]) can change the value.
#[derive(Debug, Clone)]
pub struct StateHandle {
    inner: Rc<RefCell<ObservedState>>,
}

impl StateHandle {
    /// Independent snapshot of the current state.
    #[must_use]
    pub fn get(&self) -> ObservedState {
        self.inner.borrow().clone()
    }

    /// Current breakpoint name.
    #[must_use]
    pub fn breakpoint(&self) -> String {
        self.inner.borrow().breakpoint.clone()
    }

    /// Current width in the configured unit.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.inner.borrow().width
    }

    /// See [`ObservedState::matches`].
    ///
    /// # Errors
    ///
    /// [`InvalidArgumentError`] for an empty query.
    pub fn matches(&self, query: impl Into<BreakpointQuery>) -> Result<bool, InvalidArgumentError> {
        let query = query.into();
        query.evaluate(&self.inner.borrow().breakpoint)
    }
}

/// Writer half of the engine state.
///
/// Every write completes (and releases its borrow) before returning, so a
/// listener reading through a [`StateHandle`] afterwards never conflicts.
#[derive(Debug)]
pub struct StateCell {
    inner: Rc<RefCell<ObservedState>>,
}

impl StateCell {
    #[must_use]
    pub fn new(initial: ObservedState) -> Self {
        Self {
            inner: Rc::new(RefCell::new(initial)),
        }
    }

    /// Replace the state, returning the previous value.
    pub fn replace(&self, next: ObservedState) -> ObservedState {
        self.inner.replace(next)
    }

    #[must_use]
    pub fn get(&self) -> ObservedState {
        self.inner.borrow().clone()
    }

    #[must_use]
    pub fn handle(&self) -> StateHandle {
        StateHandle {
            inner: Rc::clone(&self.inner),
        }
    }
}
