//! Environment-driven pipeline configuration.

/// Settings for `RequestPipeline::from_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkConfig {
    /// Verbose per-call logging.
    pub debug: bool,
}

impl NetworkConfig {
    pub const DEBUG_ENV: &'static str = "NETKIT_DEBUG";

    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let debug = lookup(Self::DEBUG_ENV)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        Self { debug }
    }
}
