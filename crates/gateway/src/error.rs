use pvscript_core::scripting::ScriptFailure;

/// Errors that can occur when talking to the interpreter gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The WebSocket could not be opened or dropped mid-call.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The gateway answered with something that is not a valid response.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The call did not complete within the configured timeout.
    #[error("Gateway call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The interpreter process could not be started.
    #[error("Cannot launch gateway process: {0}")]
    Launch(String),

    /// The adapter has been closed.
    #[error("Gateway is closed")]
    Closed,
}

impl GatewayError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// True when a fresh connection might succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<GatewayError> for ScriptFailure {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout { elapsed_ms } => ScriptFailure::Timeout { elapsed_ms },
            other => ScriptFailure::transport(other.to_string()),
        }
    }
}
