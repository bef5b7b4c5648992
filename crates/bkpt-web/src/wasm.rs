#![forbid(unsafe_code)]

//! `wasm-bindgen` exports for [`WebBreakpointManager`].
//!
//! This module wraps [`super::runner_core::RunnerCore`] with JS-friendly types.
//! Only compiled on `wasm32` targets.

use js_sys::{Array, Object, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use bkpt_runtime::{EventKind, ListenerId, ManagerEvent, ObservedState};

use super::runner_core::{CallbackRegistry, FailureLatch, RunnerBusy, RunnerCore, SharedRunner};

fn console_error(msg: &str) {
    let global = js_sys::global();
    let Ok(console) = Reflect::get(&global, &"console".into()) else {
        return;
    };
    let Ok(error) = Reflect::get(&console, &"error".into()) else {
        return;
    };
    let Ok(error_fn) = error.dyn_into::<js_sys::Function>() else {
        return;
    };
    let _ = error_fn.call1(&console, &JsValue::from_str(msg));
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("panic: {info}")
            };
            console_error(&msg);
        }));
    });
}

#[wasm_bindgen(start)]
pub fn wasm_start() {
    install_panic_hook();
}

fn set_js(obj: &Object, key: &str, value: JsValue) {
    let _ = Reflect::set(obj, &JsValue::from_str(key), &value);
}

fn js_error(msg: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&msg.to_string()).into()
}

fn state_to_js(state: &ObservedState) -> JsValue {
    let obj = Object::new();
    set_js(&obj, "width", JsValue::from_f64(state.width));
    set_js(&obj, "breakpoint", JsValue::from_str(&state.breakpoint));
    obj.into()
}

/// Structural copy of a JS query argument, enough for query validation.
fn query_to_json(value: &JsValue) -> serde_json::Value {
    if value.is_null() || value.is_undefined() {
        serde_json::Value::Null
    } else if let Some(s) = value.as_string() {
        serde_json::Value::String(s)
    } else if Array::is_array(value) {
        let items = Array::from(value).iter().map(|v| query_to_json(&v)).collect();
        serde_json::Value::Array(items)
    } else if let Some(b) = value.as_bool() {
        serde_json::Value::Bool(b)
    } else if let Some(n) = value.as_f64() {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    } else {
        serde_json::Value::Object(serde_json::Map::new())
    }
}

fn config_json(config: &JsValue) -> Result<String, JsValue> {
    if config.is_null() || config.is_undefined() {
        return Ok(String::new());
    }
    if let Some(s) = config.as_string() {
        return Ok(s);
    }
    js_sys::JSON::stringify(config).map(String::from)
}

fn parse_kind(event: &str) -> Result<EventKind, JsValue> {
    event.parse().map_err(js_error)
}

/// Breakpoint manager driven from JavaScript.
///
/// Every method takes `&self`, so listeners may call `state`, `matches`,
/// `on`, `off`, and `destroy` while a cycle is running.
///
/// ```js
/// const mgr = new WebBreakpointManager({ breakpoints: { xs: 0, md: 992 } }, innerWidth);
/// addEventListener("resize", () => mgr.resize(innerWidth, performance.now()));
/// requestAnimationFrame(function tick(t) { mgr.frame(t); requestAnimationFrame(tick); });
/// const onChange = (oldState, newState) => console.log(oldState, newState);
/// mgr.on("change", onChange);
/// mgr.off("change", onChange);
/// ```
#[wasm_bindgen]
pub struct WebBreakpointManager {
    runner: SharedRunner,
    callbacks: CallbackRegistry<js_sys::Function>,
    failures: FailureLatch<JsValue>,
}

impl WebBreakpointManager {
    /// Surface the first listener exception of the last driving call.
    fn settle<T>(&self, outcome: Result<T, RunnerBusy>) -> Result<T, JsValue> {
        let value = outcome.map_err(js_error)?;
        self.failures.take()?;
        Ok(value)
    }
}

#[wasm_bindgen]
impl WebBreakpointManager {
    /// `config` may be an object, a JSON string, or `undefined` for defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config: JsValue,
        width_px: Option<f64>,
        root_font_size: Option<f64>,
    ) -> Result<WebBreakpointManager, JsValue> {
        install_panic_hook();
        let json = config_json(&config)?;
        let core = RunnerCore::from_json(&json, width_px, root_font_size).map_err(js_error)?;
        Ok(Self {
            runner: SharedRunner::new(core),
            callbacks: CallbackRegistry::default(),
            failures: FailureLatch::default(),
        })
    }

    /// Forward a raw `resize` notification with the current `innerWidth`.
    pub fn resize(&self, width_px: f64, now_ms: f64) -> Result<(), JsValue> {
        self.runner.resize(width_px, now_ms).map_err(js_error)
    }

    #[wasm_bindgen(js_name = setRootFontSize)]
    pub fn set_root_font_size(&self, size_px: f64) {
        self.runner.set_root_font_size(size_px);
    }

    /// Timer tick or animation frame. Rethrows the first listener exception.
    pub fn frame(&self, now_ms: f64) -> Result<bool, JsValue> {
        self.settle(self.runner.frame(now_ms))
    }

    pub fn flush(&self) -> Result<bool, JsValue> {
        self.settle(self.runner.flush())
    }

    #[wasm_bindgen(js_name = nextDeadlineMs)]
    pub fn next_deadline_ms(&self) -> Option<f64> {
        self.runner.next_deadline_ms()
    }

    /// `{ width, breakpoint }` snapshot.
    pub fn state(&self) -> JsValue {
        state_to_js(&self.runner.state())
    }

    pub fn matches(&self, query: JsValue) -> Result<bool, JsValue> {
        self.runner
            .matches_value(&query_to_json(&query))
            .map_err(js_error)
    }

    /// Subscribe to `"resize"`, `"change"`, or `"destroy"`; returns an id
    /// that [`Self::off`] also accepts.
    pub fn on(&self, event: &str, callback: js_sys::Function) -> Result<u32, JsValue> {
        let kind = parse_kind(event)?;
        let latch = self.failures.clone();
        let target = callback.clone();
        let id = self.runner.on(kind, move |event| {
            latch.run(|| {
                let result = match event {
                    ManagerEvent::Resize(state) => {
                        target.call1(&JsValue::NULL, &state_to_js(state))
                    }
                    ManagerEvent::Change { old, new } => {
                        target.call2(&JsValue::NULL, &state_to_js(old), &state_to_js(new))
                    }
                    ManagerEvent::Destroy => target.call0(&JsValue::NULL),
                };
                result.map(drop)
            });
        });
        let Some(raw) = self.runner.narrow_id::<u32>(kind, id) else {
            return Err(js_error("listener id space exhausted"));
        };
        self.callbacks.insert(kind, id, callback);
        Ok(raw)
    }

    /// Unsubscribe by the function passed to `on` (every registration of
    /// it) or by the id `on` returned. Returns whether anything was removed.
    pub fn off(&self, event: &str, listener: JsValue) -> Result<bool, JsValue> {
        let kind = parse_kind(event)?;
        if let Some(func) = listener.dyn_ref::<js_sys::Function>() {
            let removed = self
                .runner
                .off_callback(&self.callbacks, kind, |f| Object::is(f, func));
            return Ok(removed > 0);
        }
        let raw = listener
            .as_f64()
            .filter(|n| n.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(n))
            .ok_or_else(|| js_error("off expects the listener function or the id returned by on"))?;
        let id = ListenerId::from_raw(raw as u64);
        self.callbacks.forget(kind, id);
        Ok(self.runner.off(kind, id))
    }

    /// Called from a listener, teardown runs once the current cycle ends.
    pub fn destroy(&self) -> Result<(), JsValue> {
        if self.runner.destroy() {
            self.failures.take()?;
        }
        Ok(())
    }

    #[wasm_bindgen(js_name = isDestroyed)]
    pub fn is_destroyed(&self) -> bool {
        self.runner.is_destroyed()
    }
}
