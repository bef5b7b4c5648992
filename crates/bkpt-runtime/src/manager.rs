#![forbid(unsafe_code)]

//! Breakpoint resolution engine.
//!
//! # Design
//!
//! [`BreakpointManager`] owns the normalized table, the measurement unit,
//! a [`RateLimiter`], the observed state, and a [`Notifier`] keyed by
//! [`EventKind`]. The host drives it:
//!
//! 1. every raw resize signal → [`BreakpointManager::resize_signal`]
//! 2. every timer tick / animation frame → [`BreakpointManager::poll`]
//!
//! When the limiter releases, one resolution cycle runs:
//!
//! 1. sample the viewport width and convert it to the configured unit;
//! 2. resolve the breakpoint (last entry with threshold `<=` width, falling
//!    back to the smallest entry);
//! 3. overwrite the state;
//! 4. trigger `resize` with the new state;
//! 5. trigger `change` with `(old, new)` iff the breakpoint name changed.
//!
//! # Invariants
//!
//! 1. There is always a current breakpoint; construction computes one.
//! 2. Construction is silent: no event fires for the initial state.
//! 3. State is written before any event fires, and `resize` fires before
//!    `change` within a cycle.
//! 4. At most one `change` per cycle, and none if the name is unchanged.
//! 5. After [`BreakpointManager::destroy`], no cycle runs and the last
//!    state stays readable.
//!
//! # Failure Modes
//!
//! - **Listener panic**: propagates out of `poll` / `flush`. The state for
//!   that cycle is already committed; later listeners of the same trigger
//!   are skipped.

use std::str::FromStr;

use bkpt_core::{
    BreakpointQuery, BreakpointTable, ConfigurationError, InvalidArgumentError, Listener,
    ListenerId, Notifier, ObservedState, StateCell, StateHandle, Unit,
};
use tracing::{debug, info, info_span, trace, warn};
use web_time::Instant;

use crate::config::{ManagerConfig, ResolvedConfig};
use crate::host::Viewport;
use crate::rate_limit::RateLimiter;

/// Events published by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Every processed cycle.
    Resize,
    /// A cycle that moved to a different breakpoint.
    Change,
    /// The manager was destroyed.
    Destroy,
}

impl EventKind {
    pub const ALL: [Self; 3] = [Self::Resize, Self::Change, Self::Destroy];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resize => "resize",
            Self::Change => "change",
            Self::Destroy => "destroy",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event name that is not `resize`, `change`, or `destroy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind(pub String);

impl std::fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown event {:?}: expected resize, change, or destroy", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Payload delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    /// State after the cycle.
    Resize(ObservedState),
    /// State before and after a breakpoint transition.
    Change {
        old: ObservedState,
        new: ObservedState,
    },
    Destroy,
}

impl ManagerEvent {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Resize(_) => EventKind::Resize,
            Self::Change { .. } => EventKind::Change,
            Self::Destroy => EventKind::Destroy,
        }
    }
}

/// Listener registry type used by the manager.
pub type ManagerNotifier = Notifier<EventKind, ManagerEvent>;

/// Resolves viewport width to a named breakpoint and publishes transitions.
pub struct BreakpointManager<V: Viewport> {
    table: BreakpointTable,
    unit: Unit,
    root_font_size_fallback: f64,
    viewport: V,
    limiter: Box<dyn RateLimiter>,
    state: StateCell,
    notifier: ManagerNotifier,
    destroyed: bool,
    cycles: u64,
}

impl<V: Viewport> std::fmt::Debug for BreakpointManager<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakpointManager")
            .field("table", &self.table)
            .field("unit", &self.unit)
            .field("limiter", &self.limiter)
            .field("state", &self.state.get())
            .field("destroyed", &self.destroyed)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl<V: Viewport> BreakpointManager<V> {
    /// Build a manager using the limiter named in `config`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`] for an empty or unorderable table, an unknown
    /// unit, or an unusable font-size fallback. The viewport is not attached
    /// when construction fails.
    pub fn new(config: &ManagerConfig, viewport: V) -> Result<Self, ConfigurationError> {
        let resolved = config.resolve()?;
        let limiter = resolved.rate_limit.build();
        Ok(Self::from_resolved(resolved, viewport, limiter))
    }

    /// Build a manager with an injected limiter; `config.rate_limit` is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Same as [`BreakpointManager::new`].
    pub fn with_limiter(
        config: &ManagerConfig,
        viewport: V,
        limiter: Box<dyn RateLimiter>,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self::from_resolved(config.resolve()?, viewport, limiter))
    }

    fn from_resolved(
        resolved: ResolvedConfig,
        mut viewport: V,
        limiter: Box<dyn RateLimiter>,
    ) -> Self {

        let width = resolved.unit.lookup_width(
            viewport.width_px().unwrap_or(0.0),
            viewport.root_font_size().unwrap_or(resolved.root_font_size_fallback),
            resolved.root_font_size_fallback,
        );
        let initial = ObservedState::new(width, resolved.table.resolve(width).name.clone());

        viewport.attach_resize();
        info!(
            table = %resolved.table,
            unit = %resolved.unit,
            width,
            breakpoint = %initial.breakpoint,
            "breakpoint manager attached"
        );

        Self {
            table: resolved.table,
            unit: resolved.unit,
            root_font_size_fallback: resolved.root_font_size_fallback,
            viewport,
            limiter,
            state: StateCell::new(initial),
            notifier: Notifier::new(),
            destroyed: false,
            cycles: 0,
        }
    }

    // ── Host-facing driving API ──────────────────────────────────────────

    /// Record a raw resize signal. Ignored after destroy.
    pub fn resize_signal(&mut self, now: Instant) {
        if self.destroyed {
            trace!("resize signal after destroy ignored");
            return;
        }
        self.limiter.request(now);
    }

    /// Run a cycle if the limiter releases one at `now`. Returns whether a
    /// cycle ran.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.destroyed || !self.limiter.poll(now) {
            return false;
        }
        debug!(limiter = ?self.limiter, "rate limiter released cycle");
        self.run_cycle();
        true
    }

    /// Run a pending cycle now, bypassing the limiter window. Returns
    /// whether a cycle ran.
    pub fn flush(&mut self) -> bool {
        if self.destroyed || !self.limiter.is_pending() {
            return false;
        }
        self.limiter.cancel();
        debug!("pending cycle flushed");
        self.run_cycle();
        true
    }

    /// Detach from the resize signal, cancel any pending cycle, and fire
    /// `destroy`. Repeated calls are no-ops.
    pub fn destroy(&mut self) {
        if self.destroyed {
            debug!("destroy on already destroyed manager ignored");
            return;
        }
        self.destroyed = true;
        self.limiter.cancel();
        self.viewport.detach_resize();
        info!(cycles = self.cycles, "breakpoint manager destroyed");
        self.notifier
            .trigger(&EventKind::Destroy, &ManagerEvent::Destroy);
    }

    fn sample_width(&self) -> f64 {
        let raw = self.viewport.width_px().unwrap_or(0.0);
        let font = self
            .viewport
            .root_font_size()
            .unwrap_or(self.root_font_size_fallback);
        self.unit
            .lookup_width(raw, font, self.root_font_size_fallback)
    }

    fn run_cycle(&mut self) {
        let width = self.sample_width();
        let name = match self.table.lookup(width) {
            Some(def) => def.name.clone(),
            None => {
                let first = self.table.first();
                warn!(
                    width,
                    fallback = %first.name,
                    "no breakpoint threshold at or below width, using smallest"
                );
                first.name.clone()
            }
        };

        let next = ObservedState::new(width, name);
        let old = self.state.replace(next.clone());
        self.cycles += 1;
        let changed = old.breakpoint != next.breakpoint;

        let _span = info_span!(
            "bkpt.cycle",
            cycle = self.cycles,
            width,
            breakpoint = %next.breakpoint,
            changed
        )
        .entered();

        self.notifier
            .trigger(&EventKind::Resize, &ManagerEvent::Resize(next.clone()));

        if changed {
            info!(from = %old.breakpoint, to = %next.breakpoint, "breakpoint changed");
            self.notifier
                .trigger(&EventKind::Change, &ManagerEvent::Change { old, new: next });
        }
    }

    // ── Consumer API ─────────────────────────────────────────────────────

    /// Independent snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> ObservedState {
        self.state.get()
    }

    /// Shared read handle; listeners use it to read the live state.
    #[must_use]
    pub fn state_handle(&self) -> StateHandle {
        self.state.handle()
    }

    /// Whether the current breakpoint is `query` (a name) or is contained in
    /// it (a collection of names).
    ///
    /// # Errors
    ///
    /// [`InvalidArgumentError::EmptyQuery`] for an empty name or collection.
    pub fn matches(&self, query: impl Into<BreakpointQuery>) -> Result<bool, InvalidArgumentError> {
        self.state_handle().matches(query)
    }

    /// [`BreakpointManager::matches`] for a dynamically typed query.
    ///
    /// # Errors
    ///
    /// See [`BreakpointQuery::from_value`].
    pub fn matches_value(&self, query: &serde_json::Value) -> Result<bool, InvalidArgumentError> {
        let query = BreakpointQuery::from_value(query)?;
        self.matches(query)
    }

    /// Subscribe to `kind` with a callback receiving the raw event.
    pub fn on(&self, kind: EventKind, callback: impl Fn(&ManagerEvent) + 'static) -> ListenerId {
        self.notifier.on(kind, callback)
    }

    /// Subscribe a shared callback so it can later be removed by identity.
    pub fn on_listener(&self, kind: EventKind, listener: Listener<ManagerEvent>) -> ListenerId {
        self.notifier.on_listener(kind, listener)
    }

    /// Unsubscribe one registration. Returns whether it existed.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.notifier.off(&kind, id)
    }

    /// Unsubscribe every registration of `listener` under `kind`.
    pub fn off_listener(&self, kind: EventKind, listener: &Listener<ManagerEvent>) -> usize {
        self.notifier.off_listener(&kind, listener)
    }

    /// Subscribe to `resize` with the post-cycle state.
    pub fn on_resize(&self, callback: impl Fn(&ObservedState) + 'static) -> ListenerId {
        self.notifier.on(EventKind::Resize, move |event| {
            if let ManagerEvent::Resize(state) = event {
                callback(state);
            }
        })
    }

    /// Subscribe to `change` with `(old, new)`.
    pub fn on_change(
        &self,
        callback: impl Fn(&ObservedState, &ObservedState) + 'static,
    ) -> ListenerId {
        self.notifier.on(EventKind::Change, move |event| {
            if let ManagerEvent::Change { old, new } = event {
                callback(old, new);
            }
        })
    }

    /// Subscribe to `destroy`.
    pub fn on_destroy(&self, callback: impl Fn() + 'static) -> ListenerId {
        self.notifier.on(EventKind::Destroy, move |_| callback())
    }

    /// Handle onto the listener registry, for subscribing from listeners.
    #[must_use]
    pub fn notifier(&self) -> ManagerNotifier {
        self.notifier.clone()
    }

    // ── Introspection ────────────────────────────────────────────────────

    #[must_use]
    pub fn table(&self) -> &BreakpointTable {
        &self.table
    }

    #[must_use]
    pub fn unit(&self) -> Unit {
        self.unit
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Number of resolution cycles processed since construction.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[must_use]
    pub fn has_pending_cycle(&self) -> bool {
        !self.destroyed && self.limiter.is_pending()
    }

    /// When the pending cycle becomes eligible; hosts use it to schedule
    /// the next `poll`.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.destroyed {
            None
        } else {
            self.limiter.deadline()
        }
    }

    #[must_use]
    pub fn viewport(&self) -> &V {
        &self.viewport
    }
}

impl<V: Viewport> Drop for BreakpointManager<V> {
    fn drop(&mut self) {
        if !self.destroyed {
            self.viewport.detach_resize();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimit;
    use crate::testing::{FakeViewport, ManualClock};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn record_all(manager: &BreakpointManager<FakeViewport>) -> Log {
        let log: Log = Rc::default();
        for kind in EventKind::ALL {
            let log = Rc::clone(&log);
            manager.on(kind, move |event| {
                let line = match event {
                    ManagerEvent::Resize(s) => format!("resize:{}:{}", s.breakpoint, s.width),
                    ManagerEvent::Change { old, new } => {
                        format!("change:{}->{}", old.breakpoint, new.breakpoint)
                    }
                    ManagerEvent::Destroy => "destroy".to_string(),
                };
                log.borrow_mut().push(line);
            });
        }
        log
    }

    fn resize_to(
        manager: &mut BreakpointManager<FakeViewport>,
        clock: &mut ManualClock,
        width: f64,
    ) {
        manager.viewport().set_width(width);
        manager.resize_signal(clock.now());
        assert!(manager.poll(clock.advance_ms(16)));
    }

    fn manager_at(width: f64) -> BreakpointManager<FakeViewport> {
        BreakpointManager::new(&ManagerConfig::default(), FakeViewport::with_width(width)).unwrap()
    }

    #[test]
    fn initial_state_is_computed_silently() {
        let manager = manager_at(1000.0);
        assert_eq!(manager.state(), ObservedState::new(1000.0, "md"));
        assert_eq!(manager.cycles(), 0);
        assert!(manager.viewport().is_attached());
    }

    #[test]
    fn unmeasured_viewport_starts_at_width_zero() {
        let manager =
            BreakpointManager::new(&ManagerConfig::default(), FakeViewport::unmeasured()).unwrap();
        assert_eq!(manager.state(), ObservedState::new(0.0, "xs"));
    }

    #[test]
    fn construction_failure_does_not_attach() {
        let vp = FakeViewport::with_width(100.0);
        let err = BreakpointManager::new(&ManagerConfig::default().with_unit("pt"), vp.clone())
            .unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownUnit("pt".into()));
        assert_eq!(vp.attach_calls(), 0);
    }

    #[test]
    fn width_sequence_scenario() {
        let mut clock = ManualClock::new();
        let mut manager = manager_at(500.0);
        let log = record_all(&manager);

        resize_to(&mut manager, &mut clock, 500.0);
        resize_to(&mut manager, &mut clock, 800.0);
        resize_to(&mut manager, &mut clock, 850.0);
        resize_to(&mut manager, &mut clock, 1300.0);

        assert_eq!(
            *log.borrow(),
            vec![
                "resize:xs:500",
                "resize:sm:800",
                "change:xs->sm",
                "resize:sm:850",
                "resize:lg:1300",
                "change:sm->lg",
            ]
        );
        assert_eq!(manager.cycles(), 4);
    }

    #[test]
    fn change_listener_sees_committed_state() {
        let mut clock = ManualClock::new();
        let mut manager = manager_at(500.0);
        let handle = manager.state_handle();
        let seen = Rc::new(RefCell::new(None));
        {
            let seen = Rc::clone(&seen);
            manager.on_change(move |old, new| {
                assert_eq!(old.breakpoint, "xs");
                *seen.borrow_mut() = Some((handle.get(), new.clone()));
            });
        }
        resize_to(&mut manager, &mut clock, 1250.0);

        let (live, payload) = seen.borrow_mut().take().unwrap();
        assert_eq!(live, payload);
        assert_eq!(live.breakpoint, "lg");
    }

    #[test]
    fn em_unit_divides_by_font_size() {
        let vp = FakeViewport::with_width(1536.0);
        vp.set_root_font_size(16.0);
        let config = ManagerConfig::default()
            .with_unit("em")
            .with_breakpoints([("xs", 0.0), ("sm", 48.0), ("md", 62.0), ("lg", 75.0)].into_iter().collect::<bkpt_core::BreakpointSpec>());
        let manager = BreakpointManager::new(&config, vp).unwrap();
        assert_eq!(manager.state(), ObservedState::new(96.0, "lg"));
    }

    #[test]
    fn em_unit_without_host_font_uses_fallback() {
        let config = ManagerConfig::default()
            .with_unit("em")
            .with_root_font_size_fallback(10.0);
        let manager = BreakpointManager::new(&config, FakeViewport::with_width(500.0)).unwrap();
        assert_eq!(manager.state().width, 50.0);
    }

    #[test]
    fn matches_forms() {
        let manager = manager_at(800.0);
        assert!(manager.matches("sm").unwrap());
        assert!(!manager.matches("md").unwrap());
        assert!(manager.matches(["sm", "md"]).unwrap());
        assert!(!manager.matches(vec!["xs".to_string()]).unwrap());
        assert_eq!(manager.matches(""), Err(InvalidArgumentError::EmptyQuery));
        assert_eq!(
            manager.matches_value(&serde_json::Value::Null),
            Err(InvalidArgumentError::MissingQuery)
        );
        assert_eq!(
            manager.matches_value(&serde_json::json!(42)),
            Err(InvalidArgumentError::UnsupportedQuery { found: "number" })
        );
        assert!(manager.matches_value(&serde_json::json!(["lg", "sm"])).unwrap());
    }

    #[test]
    fn destroy_detaches_and_freezes_state() {
        let mut clock = ManualClock::new();
        let mut manager = manager_at(500.0);
        let log = record_all(&manager);
        resize_to(&mut manager, &mut clock, 900.0);

        manager.viewport().set_width(1300.0);
        manager.resize_signal(clock.now());
        manager.destroy();
        manager.destroy();

        assert!(manager.is_destroyed());
        assert!(!manager.viewport().is_attached());
        assert_eq!(manager.viewport().detach_calls(), 1);
        assert!(!manager.has_pending_cycle());

        manager.resize_signal(clock.now());
        assert!(!manager.poll(clock.advance_ms(500)));
        assert!(!manager.flush());

        assert_eq!(manager.state(), ObservedState::new(900.0, "sm"));
        assert_eq!(
            *log.borrow(),
            vec!["resize:sm:900", "change:xs->sm", "destroy"]
        );
    }

    #[test]
    fn drop_detaches_undestroyed_manager() {
        let vp = FakeViewport::with_width(10.0);
        {
            let _manager = BreakpointManager::new(&ManagerConfig::default(), vp.clone()).unwrap();
            assert!(vp.is_attached());
        }
        assert!(!vp.is_attached());
        assert_eq!(vp.detach_calls(), 1);
    }

    #[test]
    fn debounced_burst_runs_one_cycle() {
        let mut clock = ManualClock::new();
        let config = ManagerConfig::default().with_rate_limit(RateLimit::debounce());
        let vp = FakeViewport::with_width(500.0);
        let mut manager = BreakpointManager::new(&config, vp.clone()).unwrap();
        let log = record_all(&manager);

        for w in [600.0, 700.0, 800.0, 1000.0] {
            vp.set_width(w);
            manager.resize_signal(clock.advance_ms(20));
            assert!(!manager.poll(clock.now()));
        }
        assert_eq!(manager.next_deadline(), Some(clock.now() + std::time::Duration::from_millis(100)));
        assert!(!manager.poll(clock.advance_ms(99)));
        assert!(manager.poll(clock.advance_ms(1)));

        assert_eq!(*log.borrow(), vec!["resize:md:1000", "change:xs->md"]);
    }

    #[test]
    fn limiter_follows_configured_rate_limit() {
        let clock = ManualClock::new();
        let config =
            ManagerConfig::default().with_rate_limit(RateLimit::Throttle { window_ms: 40 });
        let mut manager = BreakpointManager::new(&config, FakeViewport::with_width(500.0)).unwrap();
        manager.resize_signal(clock.now());
        assert_eq!(
            manager.next_deadline(),
            Some(clock.now() + std::time::Duration::from_millis(40))
        );
    }

    #[test]
    fn flush_bypasses_window() {
        let mut clock = ManualClock::new();
        let config = ManagerConfig::default().with_rate_limit(RateLimit::debounce());
        let vp = FakeViewport::with_width(500.0);
        let mut manager = BreakpointManager::new(&config, vp.clone()).unwrap();
        assert!(!manager.flush());

        vp.set_width(1200.0);
        manager.resize_signal(clock.now());
        assert!(manager.flush());
        assert_eq!(manager.state().breakpoint, "lg");
        assert!(!manager.poll(clock.advance_ms(200)));
    }

    #[test]
    fn negative_width_falls_back_to_smallest() {
        let mut clock = ManualClock::new();
        let config = ManagerConfig::default()
            .with_breakpoints([("sm", 300.0), ("lg", 900.0)].into_iter().collect::<bkpt_core::BreakpointSpec>());
        let mut manager = BreakpointManager::new(&config, FakeViewport::with_width(1000.0)).unwrap();
        resize_to(&mut manager, &mut clock, -10.0);
        assert_eq!(manager.state(), ObservedState::new(-10.0, "sm"));
    }

    #[test]
    fn listener_panic_leaves_state_committed() {
        let mut clock = ManualClock::new();
        let mut manager = manager_at(500.0);
        let changes = Rc::new(RefCell::new(0));
        manager.on_resize(|_| panic!("resize listener failed"));
        {
            let changes = Rc::clone(&changes);
            manager.on_change(move |_, _| *changes.borrow_mut() += 1);
        }

        manager.viewport().set_width(1300.0);
        manager.resize_signal(clock.now());
        let now = clock.advance_ms(16);
        let result =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| manager.poll(now)));
        assert!(result.is_err());
        assert_eq!(manager.state().breakpoint, "lg");
        assert_eq!(*changes.borrow(), 0);
    }

    #[test]
    fn event_kind_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert_eq!(
            "scroll".parse::<EventKind>(),
            Err(UnknownEventKind("scroll".into()))
        );
    }

    #[test]
    fn off_stops_delivery() {
        let mut clock = ManualClock::new();
        let mut manager = manager_at(500.0);
        let hits = Rc::new(RefCell::new(0));
        let id = {
            let hits = Rc::clone(&hits);
            manager.on_resize(move |_| *hits.borrow_mut() += 1)
        };
        resize_to(&mut manager, &mut clock, 600.0);
        assert!(manager.off(EventKind::Resize, id));
        resize_to(&mut manager, &mut clock, 700.0);
        assert_eq!(*hits.borrow(), 1);
    }
}
