use crate::dispatch::Teardown;
use serde::Deserialize;

pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Environment variables read by [`KernelConfig::from_env`].
pub mod env_keys {
    pub const POOL_CAPACITY: &str = "SCOPEWIRE_POOL_CAPACITY";
    pub const PREFIX: &str = "SCOPEWIRE_PREFIX";
    pub const STRICT_TEARDOWN: &str = "SCOPEWIRE_STRICT_TEARDOWN";
}

/// Kernel configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Idle contexts kept for reuse by each endpoint pool
    pub pool_capacity: usize,
    /// Name prefix applied to endpoints created by the kernel
    pub prefix: String,
    /// Panic when a request scope leaks handles or children on release
    pub strict_teardown: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            prefix: String::new(),
            strict_teardown: true,
        }
    }
}

impl KernelConfig {
    /// Defaults overridden by `SCOPEWIRE_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`; unparsable values keep the current setting.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(env_keys::POOL_CAPACITY) {
            match raw.trim().parse::<usize>() {
                Ok(capacity) => self.pool_capacity = capacity,
                Err(_) => log::warn!(
                    "ignoring {}={:?}: not a non-negative integer",
                    env_keys::POOL_CAPACITY,
                    raw
                ),
            }
        }
        if let Some(prefix) = lookup(env_keys::PREFIX) {
            self.prefix = prefix;
        }
        if let Some(raw) = lookup(env_keys::STRICT_TEARDOWN) {
            match parse_flag(&raw) {
                Some(strict) => self.strict_teardown = strict,
                None => log::warn!(
                    "ignoring {}={:?}: expected true or false",
                    env_keys::STRICT_TEARDOWN,
                    raw
                ),
            }
        }
        self
    }

    pub fn teardown(&self) -> Teardown {
        if self.strict_teardown {
            Teardown::Strict
        } else {
            Teardown::Lenient
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
