// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::model::ExecOptions;
use crate::errors::Result;

/// On-disk shape of a defaults file.
///
/// ```toml
/// [defaults]
/// logger = "exec"
/// err = ["child", "out"]
/// rlimit_nofile = 1024
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDefaultsFile {
    #[serde(default)]
    pub defaults: toml::Table,
}

/// Load a defaults file from a given path and return the raw table.
///
/// This only performs TOML deserialization; option keys are checked by
/// [`load_defaults`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawDefaultsFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawDefaultsFile = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load a defaults file and turn its `[defaults]` table into an option layer.
///
/// Unknown keys or ill-typed values fail with
/// [`ExecError::InvalidOption`](crate::errors::ExecError::InvalidOption).
pub fn load_defaults(path: impl AsRef<Path>) -> Result<ExecOptions> {
    let raw = load_from_path(&path)?;
    ExecOptions::from_table(&raw.defaults)
}

/// Helper to resolve a default config path.
///
/// Returns `Procexec.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Procexec.toml")
}
