//! WebSocket client for the interpreter gateway.
//!
//! [`GatewayClient`] holds the endpoint; [`GatewayClient::connect`] opens
//! a [`GatewayConnection`] that carries one call at a time.

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::GatewayError;
use crate::messages::{parse_message, GatewayMessage, InvokeRequest, InvokeResponse};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Endpoint of one interpreter gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    ws_url: String,
}

/// A live WebSocket connection to the gateway.
pub struct GatewayConnection {
    ws_stream: WsStream,
}

impl GatewayClient {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Open a WebSocket to the gateway.
    pub async fn connect(&self) -> Result<GatewayConnection, GatewayError> {
        let (ws_stream, _response) = connect_async(self.ws_url.as_str()).await.map_err(|e| {
            GatewayError::Connection(format!("Failed to connect to gateway at {}: {e}", self.ws_url))
        })?;

        tracing::debug!(url = %self.ws_url, "Connected to script gateway");

        Ok(GatewayConnection { ws_stream })
    }
}

impl GatewayConnection {
    /// Send one request and wait for its response.
    ///
    /// Pings are answered by the WebSocket layer; any other frame that is
    /// not the matching `result` fails the call.
    pub async fn call(&mut self, request: &InvokeRequest) -> Result<InvokeResponse, GatewayError> {
        let frame = request.to_frame()?;
        self.ws_stream
            .send(Message::Text(frame))
            .await
            .map_err(|e| GatewayError::Connection(format!("Send failed: {e}")))?;

        loop {
            let msg = match self.ws_stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Err(GatewayError::Connection(format!("Receive failed: {e}"))),
                None => return Err(GatewayError::Connection("Gateway closed the connection".into())),
            };

            match msg {
                Message::Text(text) => {
                    return match parse_message(&text) {
                        Ok(GatewayMessage::Result(response)) => {
                            response.check(request.call_id)?;
                            Ok(response)
                        }
                        Ok(GatewayMessage::Invoke(_)) => {
                            Err(GatewayError::Protocol("Unexpected invoke from gateway".into()))
                        }
                        Err(e) => Err(GatewayError::Protocol(format!("Malformed response: {e}"))),
                    };
                }
                Message::Close(_) => {
                    return Err(GatewayError::Connection("Gateway closed the connection".into()));
                }
                Message::Binary(_) => {
                    return Err(GatewayError::Protocol("Unexpected binary frame".into()));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    /// Close the WebSocket, ignoring errors from an already dead peer.
    pub async fn close(mut self) {
        let _ = self.ws_stream.close(None).await;
    }
}
