//! Environment-based tuning for the coroutine runtime.
//!
//! `GANTRY_STACK_SIZE` sets the stack size used when spawning handler
//! coroutines. Accepts decimal (`65536`) or hexadecimal (`0x10000`) values;
//! defaults to 64 KB, which covers typical controller call depths.

use std::env;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for handler coroutines in bytes (default 64 KB / 0x10000).
    pub stack_size: usize,
}

pub(crate) const DEFAULT_STACK_SIZE: usize = 0x10000;

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let stack_size = env::var("GANTRY_STACK_SIZE")
            .ok()
            .and_then(|val| {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).ok()
                } else {
                    val.parse().ok()
                }
            })
            .unwrap_or(DEFAULT_STACK_SIZE);
        RuntimeConfig { stack_size }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}
