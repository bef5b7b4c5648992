#![forbid(unsafe_code)]

//! Browser host adapter for bkpt.
//!
//! The page owns the event loop: it forwards `resize` notifications and
//! animation-frame timestamps, and [`runner_core::RunnerCore`] turns them
//! into breakpoint cycles. On `wasm32` the runner is exported to JavaScript
//! as `WebBreakpointManager`.

pub mod host_viewport;
pub mod runner_core;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::WebBreakpointManager;

pub use host_viewport::HostViewport;
pub use runner_core::{CallbackRegistry, FailureLatch, RunnerBusy, RunnerCore, SharedRunner};
