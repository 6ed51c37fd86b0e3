//! Fixed-size pool of gateway connections.
//!
//! Each slot holds at most one lazily opened connection and carries one
//! call at a time. A semaphore with one permit per slot bounds concurrent
//! calls; a connection that fails mid-call is discarded rather than
//! returned to its slot.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use pvscript_events::{EventBus, ScriptEvent, ScriptEventKind};
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};

use crate::client::{GatewayClient, GatewayConnection};
use crate::error::GatewayError;
use crate::messages::{InvokeRequest, InvokeResponse};

type Slot = Arc<Mutex<Option<Pooled>>>;

pub struct ConnectionPool {
    client: GatewayClient,
    slots: Vec<Slot>,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
    /// Live connections, whether parked in a slot or in use.
    open: Arc<AtomicUsize>,
    events: Option<Arc<EventBus>>,
}

/// An open connection, counted in `open` until it is dropped.
struct Pooled {
    conn: Option<GatewayConnection>,
    open: Arc<AtomicUsize>,
}

impl Pooled {
    fn new(conn: GatewayConnection, open: &Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self {
            conn: Some(conn),
            open: Arc::clone(open),
        }
    }

    async fn call(&mut self, request: &InvokeRequest) -> Result<InvokeResponse, GatewayError> {
        match self.conn.as_mut() {
            Some(conn) => conn.call(request).await,
            None => Err(GatewayError::Closed),
        }
    }

    async fn close(mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close().await;
        }
    }
}

impl Drop for Pooled {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A checked-out slot. Field order matters: the slot unlocks before the
/// permit is returned, so every permit holder finds a free slot.
struct Lease {
    index: usize,
    slot: OwnedMutexGuard<Option<Pooled>>,
    _permit: OwnedSemaphorePermit,
}

impl ConnectionPool {
    pub fn new(client: GatewayClient, size: usize, events: Option<Arc<EventBus>>) -> Self {
        let size = size.max(1);
        Self {
            client,
            slots: (0..size).map(|_| Arc::new(Mutex::new(None))).collect(),
            permits: Arc::new(Semaphore::new(size)),
            closed: AtomicBool::new(false),
            open: Arc::new(AtomicUsize::new(0)),
            events,
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Number of open connections, including those carrying a call.
    pub fn connected(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Run one call on a free slot, connecting it first if needed.
    pub async fn call(&self, request: &InvokeRequest) -> Result<InvokeResponse, GatewayError> {
        let mut lease = self.acquire().await?;

        // Taken out for the duration of the call: if the caller's future is
        // dropped mid-call, the half-used connection goes with it.
        let mut conn = match lease.slot.take() {
            Some(conn) => conn,
            None => {
                let conn = Pooled::new(self.client.connect().await?, &self.open);
                tracing::info!(slot = lease.index, url = %self.client.ws_url(), "Gateway slot connected");
                self.publish(ScriptEvent::new(ScriptEventKind::GatewayConnected).with_source(self.client.ws_url()));
                conn
            }
        };

        match conn.call(request).await {
            Ok(response) => {
                *lease.slot = Some(conn);
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(slot = lease.index, error = %e, "Discarding gateway connection");
                self.publish(
                    ScriptEvent::new(ScriptEventKind::GatewayDisconnected)
                        .with_source(self.client.ws_url())
                        .with_error(e.to_string(), true),
                );
                conn.close().await;
                Err(e)
            }
        }
    }

    /// Close every connection; later calls fail with [`GatewayError::Closed`].
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.permits.close();
        for slot in &self.slots {
            if let Some(conn) = slot.lock().await.take() {
                conn.close().await;
            }
        }
    }

    async fn acquire(&self) -> Result<Lease, GatewayError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GatewayError::Closed);
        }
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| GatewayError::Closed)?;

        for (index, slot) in self.slots.iter().enumerate() {
            if let Ok(guard) = Arc::clone(slot).try_lock_owned() {
                return Ok(Lease {
                    index,
                    slot: guard,
                    _permit: permit,
                });
            }
        }

        // Only reachable while `close` briefly holds a slot lock.
        let guard = Arc::clone(&self.slots[0]).lock_owned().await;
        Ok(Lease {
            index: 0,
            slot: guard,
            _permit: permit,
        })
    }

    fn publish(&self, event: ScriptEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}
