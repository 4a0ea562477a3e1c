// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`invocation`] describes what to run: a command or a callable.
//! - [`launcher`] builds the `tokio::process::Command` and spawns it.
//! - [`pump`] owns the workers that move bytes between pipes and buffers or
//!   external handles.
//! - [`controller`] is the live handle on a running child.
//! - [`result`] is the terminal snapshot returned once the child is done.
//! - [`callable`] is the helper-process protocol for named functions.
//! - [`service`] provides [`Exec`], the facade callers use.

pub mod callable;
pub mod controller;
pub mod invocation;
pub(crate) mod launcher;
pub(crate) mod pump;
pub mod result;
pub mod service;

pub use callable::{
    CALLABLE_ENV, CALLABLE_FAILURE_EXIT_CODE, CALLABLE_UNKNOWN_EXIT_CODE, Callable,
    CallableContext, CallableFn, CallableRegistry,
};
pub use controller::{Controller, ControllerState, RedirectTarget};
pub use invocation::{CommandSpec, Invocation};
pub use pump::PipeEnd;
pub use result::ExecResult;
pub use service::{Exec, Execution};
