#![forbid(unsafe_code)]

//! Host-driven breakpoint resolution runtime.
//!
//! The embedding environment owns the clock and the resize signal: it calls
//! [`BreakpointManager::resize_signal`] for every raw resize notification
//! and [`BreakpointManager::poll`] on each timer tick or animation frame.
//! The manager rate-limits those signals, re-resolves the breakpoint, and
//! publishes `resize` / `change` / `destroy` events to subscribers.

pub mod config;
pub mod host;
pub mod manager;
pub mod rate_limit;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use bkpt_core::{
    BreakpointDefinition, BreakpointQuery, BreakpointSpec, BreakpointTable, ConfigurationError,
    InvalidArgumentError, Listener, ListenerId, ObservedState, StateHandle, Unit,
};
pub use config::{ConfigLoadError, ManagerConfig};
pub use host::Viewport;
pub use manager::{BreakpointManager, EventKind, ManagerEvent, ManagerNotifier, UnknownEventKind};
pub use rate_limit::{Debounce, FrameThrottle, RateLimit, RateLimiter, Throttle};
pub use web_time::Instant;
