// src/config/mod.rs

//! Option Resolver.
//!
//! - [`model`] defines the sparse [`ExecOptions`] layer and the resolved
//!   behaviour / spawn records.
//! - [`validate`] is the keyed boundary (`set`, `from_table`) that rejects
//!   unknown keys.
//! - [`resolve`] collapses the layers into [`ResolvedOptions`].
//! - [`loader`] reads configured defaults from a TOML file.

pub mod loader;
pub mod model;
pub mod resolve;
pub mod validate;

pub use loader::{default_config_path, load_defaults};
pub use model::{
    BehaviorOptions, ExecOptions, RLimit, ResolvedOptions, SpawnOptions, StatusHandler,
};
pub use resolve::resolve;
pub use validate::{BEHAVIOR_KEYS, RLIMIT_PREFIX, SPAWN_KEYS, is_known_key};
