// tests/common/mod.rs
#![allow(dead_code)]

use procexec::Exec;

pub use procexec_test_utils::{SharedBuffer, init_tracing, with_timeout};

/// Service whose callables are hosted by the `procexec` binary.
pub fn exec() -> Exec {
    init_tracing();
    Exec::new().callable_host(env!("CARGO_BIN_EXE_procexec"))
}
