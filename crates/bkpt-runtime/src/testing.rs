#![forbid(unsafe_code)]

//! Deterministic host doubles for tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use web_time::Instant;

use crate::host::Viewport;

#[derive(Debug, Default)]
struct FakeViewportState {
    width: Option<f64>,
    font_size: Option<f64>,
    attached: bool,
    attach_calls: u32,
    detach_calls: u32,
}

/// Scriptable viewport. Clones share state, so a test keeps one handle
/// while the manager owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeViewport {
    inner: Rc<RefCell<FakeViewportState>>,
}

impl FakeViewport {
    /// A viewport reporting `width` pixels.
    #[must_use]
    pub fn with_width(width: f64) -> Self {
        let vp = Self::default();
        vp.set_width(width);
        vp
    }

    /// A viewport that has no measurement yet.
    #[must_use]
    pub fn unmeasured() -> Self {
        Self::default()
    }

    pub fn set_width(&self, width: f64) {
        self.inner.borrow_mut().width = Some(width);
    }

    pub fn set_root_font_size(&self, size: f64) {
        self.inner.borrow_mut().font_size = Some(size);
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.borrow().attached
    }

    #[must_use]
    pub fn attach_calls(&self) -> u32 {
        self.inner.borrow().attach_calls
    }

    #[must_use]
    pub fn detach_calls(&self) -> u32 {
        self.inner.borrow().detach_calls
    }
}

impl Viewport for FakeViewport {
    fn width_px(&self) -> Option<f64> {
        self.inner.borrow().width
    }

    fn root_font_size(&self) -> Option<f64> {
        self.inner.borrow().font_size
    }

    fn attach_resize(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.attached = true;
        inner.attach_calls += 1;
    }

    fn detach_resize(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.attached = false;
        inner.detach_calls += 1;
    }
}

/// Host-controlled monotonic clock anchored at construction.
#[derive(Debug, Clone, Copy)]
pub struct ManualClock {
    origin: Instant,
    offset: Duration,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn now(&self) -> Instant {
        self.origin + self.offset
    }

    /// Advance by `ms` milliseconds and return the new instant.
    pub fn advance_ms(&mut self, ms: u64) -> Instant {
        self.offset += Duration::from_millis(ms);
        self.now()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}
