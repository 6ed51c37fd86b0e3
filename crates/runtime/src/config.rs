use std::time::Duration;

/// Script support configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ScriptSupportConfig {
    /// Maximum number of scripts executing at once (default: available parallelism).
    pub pool_size: usize,
    /// Upper bound for [`ScriptSupport::shutdown`](crate::ScriptSupport::shutdown)
    /// to wait for outstanding work (default: 5 s).
    pub drain_timeout: Duration,
}

impl ScriptSupportConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default               |
    /// |---------------------------|-----------------------|
    /// | `SCRIPT_POOL_SIZE`        | available parallelism |
    /// | `SCRIPT_DRAIN_TIMEOUT_MS` | `5000`                |
    pub fn from_env() -> Self {
        let pool_size: usize = std::env::var("SCRIPT_POOL_SIZE")
            .map(|v| v.parse().expect("SCRIPT_POOL_SIZE must be a valid usize"))
            .unwrap_or_else(|_| default_pool_size());

        let drain_timeout_ms: u64 = std::env::var("SCRIPT_DRAIN_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .expect("SCRIPT_DRAIN_TIMEOUT_MS must be a valid u64");

        Self {
            pool_size: pool_size.max(1),
            drain_timeout: Duration::from_millis(drain_timeout_ms),
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }
}

impl Default for ScriptSupportConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
