#![forbid(unsafe_code)]

//! Viewport whose measurements are pushed by the embedding host.

use std::cell::RefCell;
use std::rc::Rc;

use bkpt_runtime::Viewport;

#[derive(Debug, Default)]
struct HostMeasurements {
    width: Option<f64>,
    root_font_size: Option<f64>,
    attached: bool,
}

/// Host-driven [`Viewport`].
///
/// The host writes the latest `innerWidth` / computed font size here before
/// signalling a resize. Clones share storage, so the runner keeps a handle
/// after the manager takes ownership of another.
#[derive(Debug, Clone, Default)]
pub struct HostViewport {
    inner: Rc<RefCell<HostMeasurements>>,
}

impl HostViewport {
    #[must_use]
    pub fn new(width: Option<f64>, root_font_size: Option<f64>) -> Self {
        let vp = Self::default();
        {
            let mut inner = vp.inner.borrow_mut();
            inner.width = width;
            inner.root_font_size = root_font_size;
        }
        vp
    }

    pub fn set_width(&self, width: f64) {
        self.inner.borrow_mut().width = Some(width);
    }

    pub fn set_root_font_size(&self, size: f64) {
        self.inner.borrow_mut().root_font_size = Some(size);
    }

    /// Whether the manager currently wants resize signals.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.borrow().attached
    }
}

impl Viewport for HostViewport {
    fn width_px(&self) -> Option<f64> {
        self.inner.borrow().width
    }

    fn root_font_size(&self) -> Option<f64> {
        self.inner.borrow().root_font_size
    }

    fn attach_resize(&mut self) {
        self.inner.borrow_mut().attached = true;
    }

    fn detach_resize(&mut self) {
        self.inner.borrow_mut().attached = false;
    }
}
