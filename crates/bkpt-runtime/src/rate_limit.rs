#![forbid(unsafe_code)]

//! Rate limiting for the high-frequency resize signal.
//!
//! A [`RateLimiter`] sits between the host's resize notifications and the
//! resolution cycle. The host calls [`RateLimiter::request`] for every raw
//! signal and [`RateLimiter::poll`] on its own schedule (timer tick or
//! animation frame). `poll` returns `true` when the wrapped cycle should run.
//!
//! # Contract
//!
//! Any number of `request`s inside one window release at most one cycle
//! per window, on the trailing edge. Requests carry no arguments, so the
//! released cycle always samples the latest viewport.
//!
//! Time is supplied by the caller. Nothing here reads a clock, which keeps
//! every limiter deterministic under test and usable from a wasm host.

use std::fmt::Debug;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::Instant;

/// Debounce window used when a config names `debounce` without a window.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Throttle window used when a config names `throttle` without a window.
pub const DEFAULT_THROTTLE_MS: u64 = 16;

/// Collapses bursts of requests into bounded-frequency releases.
pub trait RateLimiter: Debug {
    /// Record one raw signal at `now`.
    fn request(&mut self, now: Instant);

    /// Whether a pending request is released at `now`. A release consumes
    /// the pending request.
    fn poll(&mut self, now: Instant) -> bool;

    /// Drop any pending request.
    fn cancel(&mut self);

    /// Whether a request is waiting to be released.
    fn is_pending(&self) -> bool;

    /// Earliest instant at which `poll` may release, if anything is pending.
    fn deadline(&self) -> Option<Instant>;
}

/// Trailing-edge debounce: release once `window` has passed since the most
/// recent request.
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    last_request: Option<Instant>,
}

impl Debounce {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last_request: None,
        }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}

impl RateLimiter for Debounce {
    fn request(&mut self, now: Instant) {
        self.last_request = Some(now);
    }

    fn poll(&mut self, now: Instant) -> bool {
        match self.last_request {
            Some(at) if now.saturating_duration_since(at) >= self.window => {
                self.last_request = None;
                true
            }
            _ => false,
        }
    }

    fn cancel(&mut self) {
        self.last_request = None;
    }

    fn is_pending(&self) -> bool {
        self.last_request.is_some()
    }

    fn deadline(&self) -> Option<Instant> {
        self.last_request.map(|at| at + self.window)
    }
}

/// Trailing-edge throttle: release at most once per `window`, measured from
/// the first request of a burst. Later requests in the burst do not push
/// the deadline back.
#[derive(Debug, Clone)]
pub struct Throttle {
    window: Duration,
    burst_start: Option<Instant>,
}

impl Throttle {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            burst_start: None,
        }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}

impl RateLimiter for Throttle {
    fn request(&mut self, now: Instant) {
        if self.burst_start.is_none() {
            self.burst_start = Some(now);
        }
    }

    fn poll(&mut self, now: Instant) -> bool {
        match self.burst_start {
            Some(at) if now.saturating_duration_since(at) >= self.window => {
                self.burst_start = None;
                true
            }
            _ => false,
        }
    }

    fn cancel(&mut self) {
        self.burst_start = None;
    }

    fn is_pending(&self) -> bool {
        self.burst_start.is_some()
    }

    fn deadline(&self) -> Option<Instant> {
        self.burst_start.map(|at| at + self.window)
    }
}

/// Frame-aligned throttle: every `poll` is one animation frame, and a frame
/// releases whatever was requested since the previous frame.
///
/// Polling twice with the same `now` counts as one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameThrottle {
    requested_at: Option<Instant>,
    last_frame: Option<Instant>,
}

impl FrameThrottle {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            requested_at: None,
            last_frame: None,
        }
    }
}

impl RateLimiter for FrameThrottle {
    fn request(&mut self, now: Instant) {
        if self.requested_at.is_none() {
            self.requested_at = Some(now);
        }
    }

    fn poll(&mut self, now: Instant) -> bool {
        if self.requested_at.is_none() || self.last_frame == Some(now) {
            return false;
        }
        self.requested_at = None;
        self.last_frame = Some(now);
        true
    }

    fn cancel(&mut self) {
        self.requested_at = None;
    }

    fn is_pending(&self) -> bool {
        self.requested_at.is_some()
    }

    fn deadline(&self) -> Option<Instant> {
        self.requested_at
    }
}

/// Serializable choice of limiting strategy.
///
/// ```toml
/// [rate_limit]
/// kind = "debounce"
/// window_ms = 100
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateLimit {
    /// One cycle per animation frame.
    Frame,
    /// See [`Debounce`].
    Debounce {
        #[serde(default = "default_debounce_ms")]
        window_ms: u64,
    },
    /// See [`Throttle`].
    Throttle {
        #[serde(default = "default_throttle_ms")]
        window_ms: u64,
    },
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_throttle_ms() -> u64 {
    DEFAULT_THROTTLE_MS
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::Frame
    }
}

impl RateLimit {
    /// Debounce with the default 100 ms window.
    #[must_use]
    pub const fn debounce() -> Self {
        Self::Debounce {
            window_ms: DEFAULT_DEBOUNCE_MS,
        }
    }

    /// Instantiate the limiter this value describes.
    #[must_use]
    pub fn build(self) -> Box<dyn RateLimiter> {
        match self {
            Self::Frame => Box::new(FrameThrottle::new()),
            Self::Debounce { window_ms } => Box::new(Debounce::new(Duration::from_millis(window_ms))),
            Self::Throttle { window_ms } => Box::new(Throttle::new(Duration::from_millis(window_ms))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
