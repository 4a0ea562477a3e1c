// src/config/resolve.rs

//! Three-tier option resolution: call layer, then configured defaults, then
//! built-in defaults. Runs once per invocation; the result never changes.

use crate::config::model::{BehaviorOptions, ExecOptions, ResolvedOptions, SpawnOptions};
use crate::route::StreamSpec;
use crate::types::PgroupSetting;

/// Collapse `call` over `configured` over the built-in defaults.
pub fn resolve(call: ExecOptions, configured: &ExecOptions) -> ResolvedOptions {
    let mut layered = configured.clone();
    layered.overlay(call);

    let background = layered.background.unwrap_or(false);
    // Unrouted streams go nowhere for background jobs and to the parent's
    // own streams otherwise.
    let default_stream = || {
        if background {
            StreamSpec::Null
        } else {
            StreamSpec::Inherit
        }
    };

    let pgroup = layered.pgroup.or_else(|| {
        layered
            .new_pgroup
            .filter(|new| *new)
            .map(|_| PgroupSetting::New)
    });

    let behavior = BehaviorOptions {
        env: layered.env.unwrap_or_default(),
        logger: layered.logger,
        log_level: layered.log_level.unwrap_or_default(),
        log_cmd: layered.log_cmd,
        argv0: layered.argv0,
        background,
        stdin: layered.stdin.unwrap_or_else(default_stream),
        stdout: layered.stdout.unwrap_or_else(default_stream),
        stderr: layered.stderr.unwrap_or_else(default_stream),
        nonzero_status_handler: layered.nonzero_status_handler,
    };

    let spawn = SpawnOptions {
        chdir: layered.chdir,
        close_others: layered.close_others.unwrap_or(false),
        pgroup,
        umask: layered.umask,
        unsetenv_others: layered.unsetenv_others.unwrap_or(false),
        rlimits: layered.rlimits.into_values().collect(),
    };

    ResolvedOptions { behavior, spawn }
}
