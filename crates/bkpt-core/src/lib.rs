#![forbid(unsafe_code)]

//! Core data model for viewport breakpoint resolution.
//!
//! - [`table`]: normalized breakpoint tables and width lookup.
//! - [`unit`]: `px` / `em` measurement conversion.
//! - [`state`]: observed state snapshots and the shared read handle.
//! - [`query`]: name / name-set queries for `matches`.
//! - [`notifier`]: keyed listener registry with snapshot-at-trigger semantics.
//! - [`error`]: configuration and argument errors.

pub mod error;
pub mod notifier;
pub mod query;
pub mod state;
pub mod table;
pub mod unit;

pub use error::{ConfigurationError, InvalidArgumentError};
pub use notifier::{Listener, ListenerId, Notifier};
pub use query::BreakpointQuery;
pub use state::{ObservedState, StateCell, StateHandle};
pub use table::{BreakpointDefinition, BreakpointSpec, BreakpointTable, DEFAULT_BREAKPOINTS};
pub use unit::{DEFAULT_ROOT_FONT_SIZE, Unit};
