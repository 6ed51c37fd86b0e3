//! In-test interpreter gateway.
//!
//! Accepts WebSocket connections and answers every `invoke` with whatever
//! the handler returns, while counting connections, calls and the peak
//! number of calls in flight.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pvscript_gateway::messages::{parse_message, GatewayMessage};
use pvscript_gateway::{InvokeRequest, InvokeResponse};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// What the fake gateway does with one request.
pub enum Reply {
    Send(InvokeResponse),
    /// Answer after a delay.
    Delayed(Duration, InvokeResponse),
    /// Send a raw text frame.
    Raw(String),
    /// Never answer.
    Hang,
    /// Drop the connection without answering.
    Hangup,
}

#[derive(Default)]
pub struct Counters {
    pub connections: AtomicUsize,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

pub struct FakeGateway {
    pub url: String,
    pub counters: Arc<Counters>,
    task: JoinHandle<()>,
}

impl FakeGateway {
    /// Start a gateway; `handler` gets the request and the 0-based call number.
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&InvokeRequest, usize) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!("ws://{}", listener.local_addr().expect("local addr"));
        let counters = Arc::new(Counters::default());
        let handler = Arc::new(handler);

        let task_counters = Arc::clone(&counters);
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                task_counters.connections.fetch_add(1, Ordering::SeqCst);
                let counters = Arc::clone(&task_counters);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(msg)) = ws.next().await {
                        let Message::Text(text) = msg else { continue };
                        let Ok(GatewayMessage::Invoke(request)) = parse_message(&text) else {
                            continue;
                        };
                        let n = counters.calls.fetch_add(1, Ordering::SeqCst);
                        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        counters.peak_in_flight.fetch_max(now, Ordering::SeqCst);

                        let frame = match handler(&request, n) {
                            Reply::Send(response) => Some(response.to_frame().expect("encode")),
                            Reply::Delayed(delay, response) => {
                                tokio::time::sleep(delay).await;
                                Some(response.to_frame().expect("encode"))
                            }
                            Reply::Raw(text) => Some(text),
                            Reply::Hang => {
                                std::future::pending::<()>().await;
                                None
                            }
                            Reply::Hangup => None,
                        };

                        counters.in_flight.fetch_sub(1, Ordering::SeqCst);
                        match frame {
                            Some(frame) => {
                                if ws.send(Message::Text(frame)).await.is_err() {
                                    return;
                                }
                            }
                            None => return,
                        }
                    }
                });
            }
        });

        Self { url, counters, task }
    }

    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.counters.connections.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl Drop for FakeGateway {
    fn drop(&mut self) {
        self.task.abort();
    }
}
