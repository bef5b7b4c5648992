#![forbid(unsafe_code)]

//! Host environment capabilities consumed by the engine.
//!
//! The engine never reads the viewport or subscribes to resize events on
//! its own. The embedding layer implements [`Viewport`] and delivers resize
//! signals by calling into the manager.

/// Viewport measurement and resize-subscription capability.
pub trait Viewport {
    /// Current viewport width in CSS pixels, or `None` before the host has
    /// a measurement.
    fn width_px(&self) -> Option<f64>;

    /// Root font size in pixels, used by the `em` unit.
    fn root_font_size(&self) -> Option<f64> {
        None
    }

    /// Start delivering resize signals. Called once, during construction.
    fn attach_resize(&mut self) {}

    /// Stop delivering resize signals. Called once, from `destroy` or drop.
    fn detach_resize(&mut self) {}
}

impl<V: Viewport + ?Sized> Viewport for Box<V> {
    fn width_px(&self) -> Option<f64> {
        (**self).width_px()
    }

    fn root_font_size(&self) -> Option<f64> {
        (**self).root_font_size()
    }

    fn attach_resize(&mut self) {
        (**self).attach_resize();
    }

    fn detach_resize(&mut self) {
        (**self).detach_resize();
    }
}
