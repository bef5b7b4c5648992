#![forbid(unsafe_code)]

//! Platform-independent runner for the web surface.
//!
//! [`RunnerCore`] owns a [`BreakpointManager`] over a [`HostViewport`] and
//! converts host timestamps (milliseconds since an arbitrary origin, as
//! produced by `performance.now()` or `requestAnimationFrame`) into
//! [`Instant`]s. It has no wasm dependency, so it is tested natively.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use bkpt_runtime::{
    BreakpointManager, BreakpointQuery, ConfigLoadError, EventKind, Instant,
    InvalidArgumentError, ListenerId, ManagerConfig, ManagerEvent, ManagerNotifier, ObservedState,
    StateHandle,
};

use crate::host_viewport::HostViewport;

/// Manager plus host clock mapping.
pub struct RunnerCore {
    manager: BreakpointManager<HostViewport>,
    viewport: HostViewport,
    origin: Instant,
}

impl RunnerCore {
    /// Build a runner with the viewport's initial measurements.
    ///
    /// `width_px` of `None` means the host could not measure yet; the
    /// initial state then resolves against a width of zero.
    pub fn new(
        config: &ManagerConfig,
        width_px: Option<f64>,
        root_font_size: Option<f64>,
    ) -> Result<Self, ConfigLoadError> {
        let viewport = HostViewport::new(width_px, root_font_size);
        let manager = BreakpointManager::new(config, viewport.clone())?;
        Ok(Self {
            manager,
            viewport,
            origin: Instant::now(),
        })
    }

    /// Build from a JSON document. An empty or whitespace-only string uses
    /// the default configuration.
    pub fn from_json(
        config_json: &str,
        width_px: Option<f64>,
        root_font_size: Option<f64>,
    ) -> Result<Self, ConfigLoadError> {
        let config = if config_json.trim().is_empty() {
            ManagerConfig::default()
        } else {
            ManagerConfig::from_json_str(config_json)?
        };
        tracing::debug!(
            default_config = config_json.trim().is_empty(),
            width_px,
            "web runner configured"
        );
        Self::new(&config, width_px, root_font_size)
    }

    /// Map a host timestamp to an [`Instant`]. Negative or non-finite
    /// values clamp to the origin.
    #[must_use]
    pub fn instant_at(&self, now_ms: f64) -> Instant {
        if !now_ms.is_finite() || now_ms <= 0.0 {
            return self.origin;
        }
        // Whole microseconds keep millisecond inputs exact.
        self.origin + Duration::from_micros((now_ms * 1000.0).round() as u64)
    }

    /// Record a raw resize notification with the freshly measured width.
    pub fn resize(&mut self, width_px: f64, now_ms: f64) {
        self.viewport.set_width(width_px);
        let now = self.instant_at(now_ms);
        self.manager.resize_signal(now);
    }

    pub fn set_root_font_size(&self, size_px: f64) {
        self.viewport.set_root_font_size(size_px);
    }

    /// Timer tick or animation frame. Returns `true` when a cycle ran.
    pub fn frame(&mut self, now_ms: f64) -> bool {
        let now = self.instant_at(now_ms);
        self.manager.poll(now)
    }

    pub fn flush(&mut self) -> bool {
        self.manager.flush()
    }

    /// Host timestamp at which the pending cycle becomes due.
    #[must_use]
    pub fn next_deadline_ms(&self) -> Option<f64> {
        self.manager
            .next_deadline()
            .map(|at| at.saturating_duration_since(self.origin).as_micros() as f64 / 1000.0)
    }

    #[must_use]
    pub fn state(&self) -> ObservedState {
        self.manager.state()
    }

    pub fn matches_value(&self, query: &serde_json::Value) -> Result<bool, InvalidArgumentError> {
        self.manager.matches_value(query)
    }

    pub fn on(&self, kind: EventKind, callback: impl Fn(&ManagerEvent) + 'static) -> ListenerId {
        self.manager.on(kind, callback)
    }

    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.manager.off(kind, id)
    }

    pub fn destroy(&mut self) {
        self.manager.destroy();
    }

    #[must_use]
    pub fn viewport(&self) -> &HostViewport {
        &self.viewport
    }

    #[must_use]
    pub fn manager(&self) -> &BreakpointManager<HostViewport> {
        &self.manager
    }
}

/// A driving call arrived while the runner was already inside a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerBusy;

impl std::fmt::Display for RunnerBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("breakpoint runner is already running a cycle")
    }
}

impl std::error::Error for RunnerBusy {}

/// [`RunnerCore`] behind shared references, for callers whose listeners
/// call back into the runner.
///
/// Driving calls (`resize`, `frame`, `flush`) borrow the core mutably and
/// fail with [`RunnerBusy`] when re-entered. Reads and subscriptions go
/// through a [`StateHandle`] and a [`ManagerNotifier`] clone and never touch
/// the core, so listeners may use them mid-cycle. `destroy` from inside a
/// cycle is deferred until the driving call returns.
pub struct SharedRunner {
    core: RefCell<RunnerCore>,
    viewport: HostViewport,
    state: StateHandle,
    notifier: ManagerNotifier,
    destroy_requested: Cell<bool>,
}

impl SharedRunner {
    #[must_use]
    pub fn new(core: RunnerCore) -> Self {
        Self {
            viewport: core.viewport().clone(),
            state: core.manager().state_handle(),
            notifier: core.manager().notifier(),
            core: RefCell::new(core),
            destroy_requested: Cell::new(false),
        }
    }

    fn drive<T>(&self, f: impl FnOnce(&mut RunnerCore) -> T) -> Result<T, RunnerBusy> {
        let out = {
            let mut core = self.core.try_borrow_mut().map_err(|_| RunnerBusy)?;
            f(&mut core)
        };
        if self.destroy_requested.get() {
            if let Ok(mut core) = self.core.try_borrow_mut() {
                core.destroy();
            }
        }
        Ok(out)
    }

    pub fn resize(&self, width_px: f64, now_ms: f64) -> Result<(), RunnerBusy> {
        self.drive(|core| core.resize(width_px, now_ms))
    }

    pub fn frame(&self, now_ms: f64) -> Result<bool, RunnerBusy> {
        self.drive(|core| core.frame(now_ms))
    }

    pub fn flush(&self) -> Result<bool, RunnerBusy> {
        self.drive(RunnerCore::flush)
    }

    pub fn set_root_font_size(&self, size_px: f64) {
        self.viewport.set_root_font_size(size_px);
    }

    /// `None` while a cycle is running.
    #[must_use]
    pub fn next_deadline_ms(&self) -> Option<f64> {
        self.core
            .try_borrow()
            .ok()
            .and_then(|core| core.next_deadline_ms())
    }

    #[must_use]
    pub fn state(&self) -> ObservedState {
        self.state.get()
    }

    pub fn matches_value(&self, query: &serde_json::Value) -> Result<bool, InvalidArgumentError> {
        self.state.matches(BreakpointQuery::from_value(query)?)
    }

    pub fn on(&self, kind: EventKind, callback: impl Fn(&ManagerEvent) + 'static) -> ListenerId {
        self.notifier.on(kind, callback)
    }

    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.notifier.off(&kind, id)
    }

    /// Narrow `id` for a host with a smaller id type. On overflow the
    /// registration is removed again and `None` returned.
    pub fn narrow_id<T: TryFrom<u64>>(&self, kind: EventKind, id: ListenerId) -> Option<T> {
        match T::try_from(id.get()) {
            Ok(raw) => Some(raw),
            Err(_) => {
                self.notifier.off(&kind, id);
                None
            }
        }
    }

    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.notifier.listener_count(&kind)
    }

    /// Unsubscribe every registration in `registry` under `kind` whose
    /// callback satisfies `same`. Returns how many were removed.
    pub fn off_callback<C>(
        &self,
        registry: &CallbackRegistry<C>,
        kind: EventKind,
        same: impl FnMut(&C) -> bool,
    ) -> usize {
        registry
            .remove_where(kind, same)
            .into_iter()
            .filter(|id| self.notifier.off(&kind, *id))
            .count()
    }

    /// Destroy now, or after the running cycle if called from a listener.
    /// Returns `false` when deferred.
    pub fn destroy(&self) -> bool {
        self.destroy_requested.set(true);
        match self.core.try_borrow_mut() {
            Ok(mut core) => {
                core.destroy();
                true
            }
            Err(_) => {
                tracing::debug!("destroy requested inside a cycle, deferred");
                false
            }
        }
    }

    /// Whether `destroy` has been requested.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroy_requested.get()
    }
}

/// Foreign callbacks kept per registration so they can be removed by
/// identity rather than by id.
#[derive(Debug)]
pub struct CallbackRegistry<C> {
    entries: RefCell<Vec<(EventKind, ListenerId, C)>>,
}

impl<C> Default for CallbackRegistry<C> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }
}

impl<C> CallbackRegistry<C> {
    pub fn insert(&self, kind: EventKind, id: ListenerId, callback: C) {
        self.entries.borrow_mut().push((kind, id, callback));
    }

    /// Drop matching entries and return their ids.
    pub fn remove_where(&self, kind: EventKind, mut same: impl FnMut(&C) -> bool) -> Vec<ListenerId> {
        let mut removed = Vec::new();
        self.entries.borrow_mut().retain(|(k, id, callback)| {
            if *k == kind && same(callback) {
                removed.push(*id);
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn forget(&self, kind: EventKind, id: ListenerId) {
        self.entries
            .borrow_mut()
            .retain(|(k, entry, _)| !(*k == kind && *entry == id));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Holds the first failure raised by a foreign listener during a trigger.
///
/// Foreign callbacks cannot unwind through the notifier, so each wrapped
/// callback checks the latch first: once a failure is stored the remaining
/// callbacks are skipped, and the runner hands the failure back to its
/// caller after the trigger returns.
#[derive(Debug)]
pub struct FailureLatch<E> {
    slot: Rc<RefCell<Option<E>>>,
}

impl<E> Clone for FailureLatch<E> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<E> Default for FailureLatch<E> {
    fn default() -> Self {
        Self {
            slot: Rc::new(RefCell::new(None)),
        }
    }
}

impl<E> FailureLatch<E> {
    /// Run `f` unless a failure is already latched; latch its error.
    pub fn run(&self, f: impl FnOnce() -> Result<(), E>) {
        if self.is_tripped() {
            return;
        }
        if let Err(err) = f() {
            *self.slot.borrow_mut() = Some(err);
        }
    }

    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Clear the latch, returning the stored failure as an `Err`.
    pub fn take(&self) -> Result<(), E> {
        match self.slot.borrow_mut().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::rc::Weak;

    #[test]
    fn json_config_drives_resolution() {
        let mut core = RunnerCore::from_json(
            r#"{"breakpoints": {"small": 0, "large": 1000}, "rate_limit": {"kind": "debounce", "window_ms": 50}}"#,
            Some(400.0),
            None,
        )
        .unwrap();
        assert_eq!(core.state(), ObservedState::new(400.0, "small"));

        core.resize(1200.0, 10.0);
        assert!(!core.frame(40.0));
        assert_eq!(core.next_deadline_ms(), Some(60.0));
        assert!(core.frame(60.0));
        assert_eq!(core.state(), ObservedState::new(1200.0, "large"));
        assert_eq!(core.next_deadline_ms(), None);
    }

    #[test]
    fn empty_json_uses_defaults() {
        let core = RunnerCore::from_json("  ", Some(1000.0), None).unwrap();
        assert_eq!(core.state().breakpoint, "md");
        assert!(core.viewport().is_attached());
    }

    #[test]
    fn invalid_json_config_is_rejected() {
        assert!(matches!(
            RunnerCore::from_json(r#"{"breakpoints": []}"#, Some(0.0), None),
            Err(ConfigLoadError::Invalid(_))
        ));
        assert!(matches!(
            RunnerCore::from_json("[", Some(0.0), None),
            Err(ConfigLoadError::Json(_))
        ));
    }

    #[test]
    fn unmeasured_viewport_resolves_at_zero() {
        let core = RunnerCore::from_json("", None, None).unwrap();
        assert_eq!(core.state(), ObservedState::new(0.0, "xs"));
    }

    #[test]
    fn host_timestamps_clamp_to_origin() {
        let core = RunnerCore::from_json("", Some(0.0), None).unwrap();
        let origin = core.instant_at(0.0);
        assert_eq!(core.instant_at(-5.0), origin);
        assert_eq!(core.instant_at(f64::NAN), origin);
        assert_eq!(core.instant_at(250.0) - origin, Duration::from_millis(250));
    }

    #[test]
    fn em_unit_uses_pushed_font_size() {
        let mut core = RunnerCore::from_json(
            r#"{"unit": "em", "breakpoints": {"narrow": 0, "wide": 40}}"#,
            Some(600.0),
            Some(20.0),
        )
        .unwrap();
        assert_eq!(core.state(), ObservedState::new(30.0, "narrow"));

        core.set_root_font_size(10.0);
        core.resize(600.0, 1.0);
        assert!(core.frame(17.0));
        assert_eq!(core.state(), ObservedState::new(60.0, "wide"));
    }

    #[test]
    fn matches_accepts_json_queries() {
        let core = RunnerCore::from_json("", Some(800.0), None).unwrap();
        assert!(core.matches_value(&json!("sm")).unwrap());
        assert!(core.matches_value(&json!(["lg", "sm"])).unwrap());
        assert_eq!(
            core.matches_value(&json!(null)),
            Err(InvalidArgumentError::MissingQuery)
        );
    }

    #[test]
    fn destroy_detaches_viewport() {
        let mut core = RunnerCore::from_json("", Some(800.0), None).unwrap();
        let fired = Rc::new(Cell::new(0u32));
        {
            let fired = Rc::clone(&fired);
            core.on(EventKind::Destroy, move |_| fired.set(fired.get() + 1));
        }
        core.destroy();
        core.destroy();
        assert_eq!(fired.get(), 1);
        assert!(!core.viewport().is_attached());
        assert!(core.manager().is_destroyed());
    }

    #[test]
    fn latch_skips_after_first_failure() {
        let latch: FailureLatch<&str> = FailureLatch::default();
        let calls = Cell::new(0u32);
        latch.run(|| {
            calls.set(calls.get() + 1);
            Ok(())
        });
        latch.run(|| {
            calls.set(calls.get() + 1);
            Err("boom")
        });
        latch.run(|| {
            calls.set(calls.get() + 1);
            Ok(())
        });
        assert_eq!(calls.get(), 2);
        assert!(latch.is_tripped());
        assert_eq!(latch.take(), Err("boom"));
        assert_eq!(latch.take(), Ok(()));
    }

    #[test]
    fn failing_listener_aborts_the_rest_of_the_trigger() {
        let mut core = RunnerCore::from_json("", Some(500.0), None).unwrap();
        let latch: FailureLatch<String> = FailureLatch::default();
        let later = Rc::new(Cell::new(0u32));
        {
            let latch = latch.clone();
            core.on(EventKind::Resize, move |_| {
                latch.run(|| Err("listener failed".to_string()));
            });
        }
        {
            let latch = latch.clone();
            let later = Rc::clone(&later);
            core.on(EventKind::Resize, move |_| {
                latch.run(|| {
                    later.set(later.get() + 1);
                    Ok(())
                });
            });
        }

        core.resize(900.0, 0.0);
        core.frame(16.0);
        assert_eq!(later.get(), 0);
        assert_eq!(latch.take(), Err("listener failed".to_string()));
        // State was committed before listeners ran.
        assert_eq!(core.state().breakpoint, "sm");
    }

    fn shared_at(width: f64) -> Rc<SharedRunner> {
        Rc::new(SharedRunner::new(
            RunnerCore::from_json("", Some(width), None).unwrap(),
        ))
    }

    #[test]
    fn listener_reads_state_and_unsubscribes_mid_frame() {
        let runner = shared_at(500.0);
        let weak: Weak<SharedRunner> = Rc::downgrade(&runner);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let id_slot = Rc::new(Cell::new(None));
        let id = {
            let seen = Rc::clone(&seen);
            let id_slot = Rc::clone(&id_slot);
            runner.on(EventKind::Change, move |_| {
                let Some(runner) = weak.upgrade() else { return };
                let state = runner.state();
                let wide = runner.matches_value(&json!(["md", "lg"])).unwrap();
                seen.borrow_mut().push((state.breakpoint, wide));
                if let Some(id) = id_slot.get() {
                    assert!(runner.off(EventKind::Change, id));
                }
                runner.on(EventKind::Resize, |_| {});
            })
        };
        id_slot.set(Some(id));

        runner.resize(1000.0, 0.0).unwrap();
        assert!(runner.frame(16.0).unwrap());
        runner.resize(300.0, 20.0).unwrap();
        assert!(runner.frame(32.0).unwrap());

        assert_eq!(*seen.borrow(), vec![("md".to_string(), true)]);
        assert_eq!(runner.state(), ObservedState::new(300.0, "xs"));
    }

    #[test]
    fn driving_from_a_listener_is_busy() {
        let runner = shared_at(500.0);
        let weak = Rc::downgrade(&runner);
        let outcome = Rc::new(Cell::new(None));
        {
            let outcome = Rc::clone(&outcome);
            runner.on(EventKind::Resize, move |_| {
                if let Some(runner) = weak.upgrade() {
                    outcome.set(Some(runner.frame(100.0)));
                    assert_eq!(runner.next_deadline_ms(), None);
                }
            });
        }
        runner.resize(900.0, 0.0).unwrap();
        assert_eq!(runner.frame(16.0), Ok(true));
        assert_eq!(outcome.get(), Some(Err(RunnerBusy)));
    }

    #[test]
    fn destroy_inside_a_cycle_is_deferred() {
        let runner = shared_at(500.0);
        let weak = Rc::downgrade(&runner);
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let log = Rc::clone(&log);
            runner.on(EventKind::Resize, move |_| {
                log.borrow_mut().push("resize");
                if let Some(runner) = weak.upgrade() {
                    assert!(!runner.destroy());
                }
            });
        }
        {
            let log = Rc::clone(&log);
            runner.on(EventKind::Destroy, move |_| log.borrow_mut().push("destroy"));
        }

        runner.resize(900.0, 0.0).unwrap();
        assert!(runner.frame(16.0).unwrap());
        assert!(runner.is_destroyed());
        assert_eq!(*log.borrow(), vec!["resize", "destroy"]);

        runner.resize(1300.0, 20.0).unwrap();
        assert!(!runner.frame(40.0).unwrap());
        assert!(runner.destroy());
        assert_eq!(*log.borrow(), vec!["resize", "destroy"]);
        assert_eq!(runner.state().breakpoint, "sm");
    }

    #[test]
    fn off_by_callback_identity_removes_only_that_callback() {
        let runner = shared_at(500.0);
        let registry: CallbackRegistry<&'static str> = CallbackRegistry::default();
        let hits = Rc::new(RefCell::new(Vec::new()));
        for name in ["a", "b", "a"] {
            let hits = Rc::clone(&hits);
            let id = runner.on(EventKind::Resize, move |_| hits.borrow_mut().push(name));
            registry.insert(EventKind::Resize, id, name);
        }

        assert_eq!(runner.off_callback(&registry, EventKind::Change, |c| *c == "a"), 0);
        assert_eq!(runner.off_callback(&registry, EventKind::Resize, |c| *c == "a"), 2);
        assert_eq!(registry.len(), 1);

        runner.resize(600.0, 0.0).unwrap();
        runner.frame(16.0).unwrap();
        assert_eq!(*hits.borrow(), vec!["b"]);
    }

    #[test]
    fn unaddressable_id_is_unregistered() {
        let runner = shared_at(500.0);
        let mut kept = 0;
        loop {
            let id = runner.on(EventKind::Resize, |_| {});
            match runner.narrow_id::<u8>(EventKind::Resize, id) {
                Some(raw) => {
                    assert_eq!(u64::from(raw), id.get());
                    kept += 1;
                }
                None => {
                    assert!(id.get() > u64::from(u8::MAX));
                    break;
                }
            }
        }
        assert_eq!(runner.listener_count(EventKind::Resize), kept);
    }

    #[test]
    fn forget_drops_a_single_registration() {
        let registry: CallbackRegistry<u8> = CallbackRegistry::default();
        registry.insert(EventKind::Resize, ListenerId::from_raw(1), 7);
        registry.insert(EventKind::Resize, ListenerId::from_raw(2), 7);
        registry.forget(EventKind::Resize, ListenerId::from_raw(1));
        assert_eq!(
            registry.remove_where(EventKind::Resize, |c| *c == 7),
            vec![ListenerId::from_raw(2)]
        );
        assert!(registry.is_empty());
    }
}
