// src/exec/service.rs

//! `Exec`: the entry point that ties resolution, routing, launching and the
//! controller together for one invocation.

use std::path::PathBuf;

use tracing::debug;

use crate::config::{ExecOptions, ResolvedOptions, resolve};
use crate::errors::{ExecError, Result};
use crate::exec::callable::Callable;
use crate::exec::controller::Controller;
use crate::exec::invocation::{CommandSpec, Invocation};
use crate::exec::launcher::launch;
use crate::exec::result::ExecResult;
use crate::logging::log_command;
use crate::route::{StreamSpec, plan_streams};

/// What [`Exec::exec`] hands back.
pub enum Execution {
    /// The invocation was backgrounded; the caller drives the controller.
    Background(Controller),
    Completed(ExecResult),
}

impl Execution {
    /// Wait for a background controller if needed and return the result.
    pub async fn into_result(self) -> Result<ExecResult> {
        match self {
            Execution::Background(mut controller) => controller.wait().await,
            Execution::Completed(result) => Ok(result),
        }
    }

    pub fn into_controller(self) -> Option<Controller> {
        match self {
            Execution::Background(controller) => Some(controller),
            Execution::Completed(_) => None,
        }
    }

    pub fn is_background(&self) -> bool {
        matches!(self, Execution::Background(_))
    }
}

/// Subprocess execution service.
///
/// Holds the configured defaults layer and the helper executable used for
/// callables. Each call resolves its own options once; nothing set on a call
/// leaks into the next one.
#[derive(Debug, Clone)]
pub struct Exec {
    defaults: ExecOptions,
    callable_host: PathBuf,
}

impl Default for Exec {
    fn default() -> Self {
        Self::new()
    }
}

impl Exec {
    /// A service with no configured defaults. Callables are hosted by the
    /// current executable.
    pub fn new() -> Self {
        let callable_host =
            std::env::current_exe().unwrap_or_else(|_| PathBuf::from("/proc/self/exe"));
        Self {
            defaults: ExecOptions::default(),
            callable_host,
        }
    }

    pub fn with_defaults(defaults: ExecOptions) -> Self {
        Self {
            defaults,
            ..Self::new()
        }
    }

    /// Overlay `defaults` onto the configured layer.
    pub fn configure_defaults(&mut self, defaults: ExecOptions) -> &mut Self {
        self.defaults.overlay(defaults);
        self
    }

    /// Use `host` as the helper executable for callables. It must dispatch
    /// through [`CallableRegistry::run_if_requested`](crate::exec::CallableRegistry::run_if_requested).
    /// A process that still has `PROCEXEC_CALLABLE` set refuses to launch
    /// callables.
    pub fn callable_host(mut self, host: impl Into<PathBuf>) -> Self {
        self.callable_host = host.into();
        self
    }

    pub fn defaults(&self) -> &ExecOptions {
        &self.defaults
    }

    /// Run `invocation`.
    ///
    /// In the foreground every controller-managed stream is closed straight
    /// away and the call waits for the result. In the background the
    /// controller is returned without waiting.
    pub async fn exec(
        &self,
        invocation: impl Into<Invocation>,
        options: ExecOptions,
    ) -> Result<Execution> {
        let (mut controller, background) = self.start(invocation.into(), options)?;
        if background {
            return Ok(Execution::Background(controller));
        }

        controller.close_streams();
        let result = controller.wait().await?;
        Ok(Execution::Completed(result))
    }

    /// Run `invocation` in the foreground and hand the controller to
    /// `callback` while the child runs.
    ///
    /// Whatever way the callback ends, the remaining controller-managed
    /// streams are closed before the result is collected. An error from the
    /// callback is reported as [`ExecError::Callback`] once the child has
    /// been waited for. Backgrounded invocations skip the callback and
    /// return the controller.
    pub async fn exec_with<F>(
        &self,
        invocation: impl Into<Invocation>,
        options: ExecOptions,
        callback: F,
    ) -> Result<Execution>
    where
        F: AsyncFnOnce(&mut Controller) -> anyhow::Result<()>,
    {
        let (mut controller, background) = self.start(invocation.into(), options)?;
        if background {
            debug!(pid = controller.pid(), "background invocation, callback not run");
            return Ok(Execution::Background(controller));
        }

        let outcome = callback(&mut controller).await;
        controller.close_streams();

        if let Err(err) = outcome {
            // The callback error is what the caller sees, even if collecting
            // the child fails or its status handler aborts.
            if let Err(collect) = controller.wait().await {
                debug!(pid = controller.pid(), error = %collect, "collecting after callback error failed");
            }
            return Err(ExecError::Callback(err));
        }

        let result = controller.wait().await?;
        Ok(Execution::Completed(result))
    }

    /// Run a registered callable in a helper process.
    pub async fn exec_callable(&self, callable: Callable, options: ExecOptions) -> Result<Execution> {
        self.exec(callable, options).await
    }

    /// Run in the foreground with `out` captured; returns it as text.
    pub async fn capture(
        &self,
        invocation: impl Into<Invocation>,
        options: ExecOptions,
    ) -> Result<String> {
        let options = options.background(false).stdout(StreamSpec::Capture);
        let result = self.exec(invocation, options).await?.into_result().await?;
        Ok(result.captured_out_str().unwrap_or_default())
    }

    pub async fn capture_callable(&self, callable: Callable, options: ExecOptions) -> Result<String> {
        self.capture(callable, options).await
    }

    /// Run a shell string in the foreground and return its exit code.
    pub async fn sh(&self, cmd: impl Into<String>, options: ExecOptions) -> Result<i32> {
        let options = options.background(false);
        let result = self
            .exec(CommandSpec::shell(cmd), options)
            .await?
            .into_result()
            .await?;
        Ok(result.exit_code())
    }

    fn start(&self, invocation: Invocation, options: ExecOptions) -> Result<(Controller, bool)> {
        let resolved = resolve(options, &self.defaults);
        log_invocation(&invocation, &resolved);

        let behavior = &resolved.behavior;
        let plan = plan_streams(
            behavior.stdin.clone(),
            behavior.stdout.clone(),
            behavior.stderr.clone(),
        )?;
        let launched = launch(&invocation, &resolved, plan.bindings, &self.callable_host)?;

        let background = resolved.behavior.background;
        let handler = resolved.behavior.nonzero_status_handler;
        let controller = Controller::new(launched, plan.controller, plan.pumps, handler);
        Ok((controller, background))
    }
}

fn log_invocation(invocation: &Invocation, options: &ResolvedOptions) {
    let behavior = &options.behavior;
    let Some(logger) = &behavior.logger else {
        return;
    };
    let Some(cmd) = behavior.log_cmd.clone().or_else(|| invocation.describe()) else {
        return;
    };
    log_command(logger, behavior.log_level, &cmd);
}
