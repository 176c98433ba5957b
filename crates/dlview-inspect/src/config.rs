use dlview_core::{LoadConfig, LONG_LOAD_CONFIG};
use std::env;
use std::time::Duration;

pub const DEFAULT_STACK_DEPTH: usize = 20;
pub const MAX_STACK_DEPTH: usize = 200;
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONSOLE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorConfig {
    pub stack_depth: usize,
    /// Upper bound on one backend call. `None` waits forever.
    pub backend_timeout: Option<Duration>,
    pub console_capacity: usize,
    pub load: LoadConfig,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            stack_depth: DEFAULT_STACK_DEPTH,
            backend_timeout: Some(DEFAULT_BACKEND_TIMEOUT),
            console_capacity: DEFAULT_CONSOLE_CAPACITY,
            load: LONG_LOAD_CONFIG,
        }
    }
}

impl InspectorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(depth) = lookup("DLVIEW_STACK_DEPTH").and_then(|v| v.trim().parse::<usize>().ok()) {
            config.stack_depth = clamp_stack_depth(depth);
        }
        if let Some(ms) = lookup("DLVIEW_BACKEND_TIMEOUT_MS").and_then(|v| v.trim().parse::<u64>().ok()) {
            config.backend_timeout = if ms == 0 {
                None
            } else {
                Some(Duration::from_millis(ms))
            };
        }
        config
    }
}

pub fn clamp_stack_depth(depth: usize) -> usize {
    depth.clamp(1, MAX_STACK_DEPTH)
}

/// Tolerant boolean parsing for environment flags. Unrecognized values
/// yield `None`.
pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" | "off" | "OFF" => Some(false),
        _ => None,
    }
}
