use std::time::Duration;

/// Gateway configuration loaded from environment variables.
///
/// Defaults target an interpreter gateway listening on the local host.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// WebSocket URL of the interpreter gateway (default: `ws://127.0.0.1:25333`).
    pub ws_url: String,
    /// Number of connections, and therefore concurrent calls (default: `2`).
    pub pool_size: usize,
    /// Upper bound for one call including its retry (default: 10 s).
    pub call_timeout: Duration,
    /// Command line that starts the interpreter process. `None` means the
    /// gateway is managed externally.
    pub command: Option<Vec<String>>,
    /// Grace period after spawning the process before connecting (default: 500 ms).
    pub startup_delay: Duration,
    /// Module search path handed to the launched process as `PYTHONPATH`.
    pub python_path: Option<String>,
}

impl GatewayConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                  |
    /// |----------------------------|--------------------------|
    /// | `GATEWAY_WS_URL`           | `ws://127.0.0.1:25333`   |
    /// | `GATEWAY_POOL_SIZE`        | `2`                      |
    /// | `GATEWAY_CALL_TIMEOUT_MS`  | `10000`                  |
    /// | `GATEWAY_COMMAND`          | unset                    |
    /// | `GATEWAY_STARTUP_DELAY_MS` | `500`                    |
    ///
    /// `GATEWAY_COMMAND` is split on whitespace, e.g. `python3 -m gateway`.
    pub fn from_env() -> Self {
        let ws_url = std::env::var("GATEWAY_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:25333".into());

        let pool_size: usize = std::env::var("GATEWAY_POOL_SIZE")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("GATEWAY_POOL_SIZE must be a valid usize");

        let call_timeout_ms: u64 = std::env::var("GATEWAY_CALL_TIMEOUT_MS")
            .unwrap_or_else(|_| "10000".into())
            .parse()
            .expect("GATEWAY_CALL_TIMEOUT_MS must be a valid u64");

        let command = std::env::var("GATEWAY_COMMAND")
            .ok()
            .map(|line| parse_command(&line))
            .filter(|parts| !parts.is_empty());

        let startup_delay_ms: u64 = std::env::var("GATEWAY_STARTUP_DELAY_MS")
            .unwrap_or_else(|_| "500".into())
            .parse()
            .expect("GATEWAY_STARTUP_DELAY_MS must be a valid u64");

        Self {
            ws_url,
            pool_size: pool_size.max(1),
            call_timeout: Duration::from_millis(call_timeout_ms),
            command,
            startup_delay: Duration::from_millis(startup_delay_ms),
            python_path: None,
        }
    }

    /// Same configuration pointing at another URL.
    pub fn with_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    pub fn with_python_path(mut self, python_path: Option<String>) -> Self {
        self.python_path = python_path;
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:25333".into(),
            pool_size: 2,
            call_timeout: Duration::from_secs(10),
            command: None,
            startup_delay: Duration::from_millis(500),
            python_path: None,
        }
    }
}

fn parse_command(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}
