// src/builtins.rs

//! Callables hosted by the `procexec` binary.
//!
//! These are small enough to double as fixtures: the integration tests use
//! the binary as their callable host.

use std::io::{self, Read, Write};

use anyhow::{Context, bail};

use crate::exec::{CallableContext, CallableRegistry};

/// Registry with every built-in callable.
pub fn registry() -> CallableRegistry {
    CallableRegistry::new()
        .register("exit", exit)
        .register("echo", echo)
        .register("cat", cat)
        .register("env", env)
        .register("fail", fail)
        .register("panic", panic)
}

/// `exit [CODE]`: exit with CODE (default 0).
fn exit(ctx: &CallableContext) -> anyhow::Result<i32> {
    match ctx.args.first() {
        Some(code) => code
            .parse()
            .with_context(|| format!("invalid exit code `{code}`")),
        None => Ok(0),
    }
}

/// `echo ARGS...`: print the arguments separated by spaces.
fn echo(ctx: &CallableContext) -> anyhow::Result<i32> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", ctx.args.join(" "))?;
    Ok(0)
}

/// `cat`: copy standard input to standard output.
fn cat(_ctx: &CallableContext) -> anyhow::Result<i32> {
    let mut input = Vec::new();
    io::stdin().lock().read_to_end(&mut input)?;
    io::stdout().lock().write_all(&input)?;
    Ok(0)
}

/// `env [NAME]`: print one variable, or every `KEY=VALUE` pair sorted.
fn env(ctx: &CallableContext) -> anyhow::Result<i32> {
    let mut out = io::stdout().lock();
    match ctx.args.first() {
        Some(name) => match std::env::var(name) {
            Ok(value) => writeln!(out, "{value}")?,
            Err(_) => return Ok(1),
        },
        None => {
            let mut vars: Vec<(String, String)> = std::env::vars().collect();
            vars.sort();
            for (key, value) in vars {
                writeln!(out, "{key}={value}")?;
            }
        }
    }
    Ok(0)
}

/// `fail [MESSAGE]`: return an error.
fn fail(ctx: &CallableContext) -> anyhow::Result<i32> {
    let message = if ctx.args.is_empty() {
        "requested failure".to_string()
    } else {
        ctx.args.join(" ")
    };
    bail!(message)
}

/// `panic`: panic inside the callable.
fn panic(_ctx: &CallableContext) -> anyhow::Result<i32> {
    panic!("callable panicked on request")
}
