//! Gateway wire schema and parser.
//!
//! Both directions carry JSON text frames tagged by `"type"`:
//!
//! - `invoke`: run a script file with a widget token and bound values.
//! - `result`: the outcome of one invoke, matched by `call_id`.
//!
//! Every message carries `version`; a response whose version or
//! `call_id` does not match the request is treated as malformed.

use pvscript_core::scripting::ScriptBindings;
use pvscript_core::types::Timestamp;
use pvscript_core::value::Quality;
use pvscript_core::widget::WidgetToken;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::GatewayError;

/// Wire protocol version spoken by this crate.
pub const PROTOCOL_VERSION: u32 = 1;

/// All messages exchanged with the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    Invoke(InvokeRequest),
    Result(InvokeResponse),
}

/// Widget as seen by the external interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetRef {
    /// Per-call token; property updates for it are returned in the response.
    pub token: WidgetToken,
    pub name: String,
    pub widget_type: String,
}

/// One declared input with its live value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireBinding {
    /// Declared input name, the variable the script reads.
    pub name: String,
    /// Name of the live data source feeding the input.
    #[serde(default)]
    pub pv: String,
    pub value: Value,
    pub timestamp: Timestamp,
    pub quality: Quality,
}

/// Request to run a script in the external interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub version: u32,
    pub call_id: Uuid,
    pub script_path: String,
    pub widget: WidgetRef,
    /// Declared name of the input that fired, absent for explicit runs.
    #[serde(default)]
    pub trigger: Option<String>,
    pub bindings: Vec<WireBinding>,
}

impl InvokeRequest {
    /// Marshal bindings for one call, minting a fresh call id and widget token.
    pub fn from_bindings(script_path: impl Into<String>, bindings: &ScriptBindings) -> Self {
        let widget = bindings.widget();
        Self {
            version: PROTOCOL_VERSION,
            call_id: Uuid::new_v4(),
            script_path: script_path.into(),
            widget: WidgetRef {
                token: WidgetToken::new(),
                name: widget.name().to_string(),
                widget_type: widget.widget_type().to_string(),
            },
            trigger: bindings.trigger_name().map(str::to_string),
            bindings: bindings
                .inputs()
                .iter()
                .map(|(name, live)| WireBinding {
                    name: name.clone(),
                    pv: live.name.clone(),
                    value: live.value.clone(),
                    timestamp: live.timestamp,
                    quality: live.quality,
                })
                .collect(),
        }
    }

    /// Serialize as a tagged `invoke` frame.
    pub fn to_frame(&self) -> Result<String, GatewayError> {
        serde_json::to_string(&GatewayMessage::Invoke(self.clone()))
            .map_err(|e| GatewayError::Protocol(format!("Cannot encode request: {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    /// The script raised; `error` holds the message.
    Error,
}

/// Property write requested by the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyUpdate {
    pub property: String,
    pub value: Value,
}

/// Outcome of one invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub version: u32,
    pub call_id: Uuid,
    pub status: ResponseStatus,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub updates: Vec<PropertyUpdate>,
}

impl InvokeResponse {
    /// Successful response to `request`.
    pub fn ok(request: &InvokeRequest, value: Option<Value>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            call_id: request.call_id,
            status: ResponseStatus::Ok,
            value,
            error: None,
            updates: Vec::new(),
        }
    }

    /// Script-error response to `request`.
    pub fn error(request: &InvokeRequest, message: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            call_id: request.call_id,
            status: ResponseStatus::Error,
            value: None,
            error: Some(message.into()),
            updates: Vec::new(),
        }
    }

    pub fn with_update(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.updates.push(PropertyUpdate {
            property: property.into(),
            value: value.into(),
        });
        self
    }

    /// Serialize as a tagged `result` frame.
    pub fn to_frame(&self) -> Result<String, GatewayError> {
        serde_json::to_string(&GatewayMessage::Result(self.clone()))
            .map_err(|e| GatewayError::Protocol(format!("Cannot encode response: {e}")))
    }

    /// Reject responses that do not answer `call_id` in this protocol version.
    pub fn check(&self, call_id: Uuid) -> Result<(), GatewayError> {
        if self.version != PROTOCOL_VERSION {
            return Err(GatewayError::Protocol(format!(
                "Unsupported protocol version {} (expected {PROTOCOL_VERSION})",
                self.version
            )));
        }
        if self.call_id != call_id {
            return Err(GatewayError::Protocol(format!(
                "Response for call {} while waiting for {call_id}",
                self.call_id
            )));
        }
        Ok(())
    }
}

/// Parse a gateway text frame into a typed message.
///
/// Returns `Err` for malformed JSON or unknown `type` values.
pub fn parse_message(text: &str) -> Result<GatewayMessage, serde_json::Error> {
    serde_json::from_str(text)
}
