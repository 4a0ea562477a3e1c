// src/config/validate.rs

//! Keyed option boundary.
//!
//! Callers that build options from dynamic input (a TOML table, CLI flags
//! mapped to keys) go through [`ExecOptions::set`]. Every key is checked
//! against the known behaviour / spawn key sets here, so an unknown key
//! fails before anything touches a process.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;

use anyhow::anyhow;
use nix::libc::{RLIM_INFINITY, rlim_t};
use nix::sys::resource::Resource;
use tracing::warn;

use crate::config::model::{ExecOptions, RLimit, StatusHandler};
use crate::errors::{ExecError, Result};
use crate::logging::parse_level_str;
use crate::route::StreamSpec;
use crate::route::spec::parse_octal;
use crate::types::{LogLevelSetting, PgroupSetting, StreamName};

/// Keys that control how the service treats the invocation.
pub const BEHAVIOR_KEYS: &[&str] = &[
    "argv0",
    "background",
    "env",
    "err",
    "in",
    "log_cmd",
    "log_level",
    "logger",
    "nonzero_status_handler",
    "out",
];

/// Keys applied when creating the OS process.
pub const SPAWN_KEYS: &[&str] = &[
    "chdir",
    "close_others",
    "new_pgroup",
    "pgroup",
    "umask",
    "unsetenv_others",
];

/// Prefix of resource-limit keys, e.g. `rlimit_nofile`.
pub const RLIMIT_PREFIX: &str = "rlimit_";

/// Whether `key` names a recognised option.
pub fn is_known_key(key: &str) -> bool {
    BEHAVIOR_KEYS.contains(&key) || SPAWN_KEYS.contains(&key) || key.starts_with(RLIMIT_PREFIX)
}

impl ExecOptions {
    /// Build a layer from a keyed table, rejecting unknown keys.
    pub fn from_table(table: &toml::Table) -> Result<Self> {
        let mut opts = ExecOptions::default();
        for (key, value) in table {
            opts.set(key, value)?;
        }
        Ok(opts)
    }

    /// Set one option from its keyed form.
    pub fn set(&mut self, key: &str, value: &toml::Value) -> Result<()> {
        if !is_known_key(key) {
            return Err(ExecError::invalid_option(key, "unknown key"));
        }

        match key {
            "env" => self.env = Some(parse_env(value)?),
            "logger" => self.logger = Some(expect_str(key, value)?.to_string()),
            "log_level" => self.log_level = Some(parse_log_level(value)?),
            "log_cmd" => self.log_cmd = Some(expect_str(key, value)?.to_string()),
            "argv0" => self.argv0 = Some(expect_str(key, value)?.to_string()),
            "background" => self.background = Some(expect_bool(key, value)?),
            "in" => self.stdin = Some(StreamSpec::from_value(StreamName::In, value)?),
            "out" => self.stdout = Some(StreamSpec::from_value(StreamName::Out, value)?),
            "err" => self.stderr = Some(StreamSpec::from_value(StreamName::Err, value)?),
            "nonzero_status_handler" => {
                self.nonzero_status_handler = Some(builtin_handler(expect_str(key, value)?)?)
            }
            "chdir" => self.chdir = Some(PathBuf::from(expect_str(key, value)?)),
            "close_others" => self.close_others = Some(expect_bool(key, value)?),
            "new_pgroup" => self.new_pgroup = Some(expect_bool(key, value)?),
            "pgroup" => self.pgroup = Some(parse_pgroup(value)?),
            "umask" => self.umask = Some(parse_mode(key, value)?),
            "unsetenv_others" => self.unsetenv_others = Some(expect_bool(key, value)?),
            rlimit => {
                let limit = parse_rlimit(rlimit, value)?;
                self.rlimits.insert(limit.key(), limit);
            }
        }
        Ok(())
    }
}

fn expect_str<'a>(key: &str, value: &'a toml::Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| ExecError::invalid_option(key, format!("expected a string, got {value}")))
}

fn expect_bool(key: &str, value: &toml::Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| ExecError::invalid_option(key, format!("expected a boolean, got {value}")))
}

fn parse_env(value: &toml::Value) -> Result<std::collections::BTreeMap<String, Option<String>>> {
    let table = value
        .as_table()
        .ok_or_else(|| ExecError::invalid_option("env", "expected a table"))?;

    table
        .iter()
        .map(|(k, v)| match v {
            toml::Value::String(s) => Ok((k.clone(), Some(s.clone()))),
            // `false` removes an inherited variable.
            toml::Value::Boolean(false) => Ok((k.clone(), None)),
            toml::Value::Integer(i) => Ok((k.clone(), Some(i.to_string()))),
            other => Err(ExecError::invalid_option(
                "env",
                format!("value for {k} must be a string or false, got {other}"),
            )),
        })
        .collect()
}

fn parse_log_level(value: &toml::Value) -> Result<LogLevelSetting> {
    match value {
        toml::Value::Boolean(false) => Ok(LogLevelSetting::Off),
        toml::Value::String(s) => parse_level_str(s)
            .map(LogLevelSetting::Level)
            .ok_or_else(|| ExecError::invalid_option("log_level", format!("unknown level {s}"))),
        other => Err(ExecError::invalid_option(
            "log_level",
            format!("expected a level name or false, got {other}"),
        )),
    }
}

fn parse_pgroup(value: &toml::Value) -> Result<PgroupSetting> {
    match value {
        toml::Value::Boolean(true) => Ok(PgroupSetting::New),
        toml::Value::Integer(0) => Ok(PgroupSetting::New),
        toml::Value::Integer(pgid) if *pgid > 0 => i32::try_from(*pgid)
            .map(PgroupSetting::Join)
            .map_err(|_| ExecError::invalid_option("pgroup", format!("pgid {pgid} out of range"))),
        other => Err(ExecError::invalid_option(
            "pgroup",
            format!("expected true or a process group id, got {other}"),
        )),
    }
}

fn parse_mode(key: &str, value: &toml::Value) -> Result<u32> {
    let mode = match value {
        toml::Value::Integer(i) => u32::try_from(*i).ok(),
        toml::Value::String(s) => parse_octal(s),
        _ => None,
    };
    mode.filter(|m| *m <= 0o7777)
        .ok_or_else(|| ExecError::invalid_option(key, format!("invalid mode {value}")))
}

fn parse_rlimit(key: &str, value: &toml::Value) -> Result<RLimit> {
    let name = &key[RLIMIT_PREFIX.len()..];
    let resource = resource_by_name(name)
        .ok_or_else(|| ExecError::invalid_option(key, format!("unknown resource `{name}`")))?;

    let (soft, hard) = match value {
        toml::Value::Array(items) => match items.as_slice() {
            [soft, hard] => (rlimit_value(key, soft)?, rlimit_value(key, hard)?),
            _ => {
                return Err(ExecError::invalid_option(key, "expected [soft, hard]"));
            }
        },
        single => {
            let limit = rlimit_value(key, single)?;
            (limit, limit)
        }
    };

    if soft > hard {
        return Err(ExecError::invalid_option(
            key,
            "soft limit exceeds hard limit",
        ));
    }

    Ok(RLimit {
        resource,
        soft,
        hard,
    })
}

fn rlimit_value(key: &str, value: &toml::Value) -> Result<rlim_t> {
    match value {
        toml::Value::Integer(i) if *i >= 0 => Ok(*i as rlim_t),
        toml::Value::String(s) if s == "unlimited" || s == "infinity" => Ok(RLIM_INFINITY),
        other => Err(ExecError::invalid_option(
            key,
            format!("expected a non-negative integer or \"unlimited\", got {other}"),
        )),
    }
}

fn resource_by_name(name: &str) -> Option<Resource> {
    let resource = match name {
        "core" => Resource::RLIMIT_CORE,
        "cpu" => Resource::RLIMIT_CPU,
        "data" => Resource::RLIMIT_DATA,
        "fsize" => Resource::RLIMIT_FSIZE,
        "nofile" => Resource::RLIMIT_NOFILE,
        "stack" => Resource::RLIMIT_STACK,
        #[cfg(target_os = "linux")]
        "as" => Resource::RLIMIT_AS,
        #[cfg(target_os = "linux")]
        "nproc" => Resource::RLIMIT_NPROC,
        #[cfg(target_os = "linux")]
        "memlock" => Resource::RLIMIT_MEMLOCK,
        #[cfg(target_os = "linux")]
        "rss" => Resource::RLIMIT_RSS,
        _ => return None,
    };
    Some(resource)
}

fn builtin_handler(name: &str) -> Result<StatusHandler> {
    let handler: StatusHandler = match name {
        "error" => Arc::new(|status: &ExitStatus| Err(anyhow!("command exited with {status}"))),
        "warn" => Arc::new(|status: &ExitStatus| {
            warn!(%status, "command exited with nonzero status");
            Ok(())
        }),
        other => {
            return Err(ExecError::invalid_option(
                "nonzero_status_handler",
                format!("unknown handler `{other}` (expected \"error\" or \"warn\")"),
            ));
        }
    };
    Ok(handler)
}
