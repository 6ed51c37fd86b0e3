//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans [`ScriptEvent`]s out to observers such as status
//! panels or test probes. It is shared via `Arc<EventBus>` between the
//! manager and the gateway adapter.

use chrono::{DateTime, Utc};
use pvscript_core::types::UnitId;
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// ScriptEvent
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptEventKind {
    /// A submission was admitted and handed to the pool.
    Scheduled,
    /// A submission was dropped because the unit was already pending.
    Skipped,
    /// A submission arrived after shutdown began.
    Rejected,
    Completed,
    Failed,
    /// A gateway connection slot connected.
    GatewayConnected,
    /// A gateway connection slot was discarded.
    GatewayDisconnected,
}

impl ScriptEventKind {
    /// Dot-separated event name, e.g. `"script.completed"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "script.scheduled",
            Self::Skipped => "script.skipped",
            Self::Rejected => "script.rejected",
            Self::Completed => "script.completed",
            Self::Failed => "script.failed",
            Self::GatewayConnected => "gateway.connected",
            Self::GatewayDisconnected => "gateway.disconnected",
        }
    }
}

/// One runtime event.
///
/// Constructed via [`ScriptEvent::new`] and enriched with
/// [`with_unit`](ScriptEvent::with_unit),
/// [`with_widget`](ScriptEvent::with_widget) and
/// [`with_error`](ScriptEvent::with_error).
#[derive(Debug, Clone, Serialize)]
pub struct ScriptEvent {
    pub kind: ScriptEventKind,

    /// Unit the event refers to, if any.
    pub unit: Option<UnitId>,

    /// Source identifier of the unit, or the gateway URL for connectivity events.
    pub source: Option<String>,

    /// Name of the widget that triggered the execution.
    pub widget: Option<String>,

    /// Failure description for [`ScriptEventKind::Failed`] and disconnects.
    pub error: Option<String>,

    /// True when the failure was a transport failure rather than a script error.
    pub transport: bool,

    pub timestamp: DateTime<Utc>,
}

impl ScriptEvent {
    pub fn new(kind: ScriptEventKind) -> Self {
        Self {
            kind,
            unit: None,
            source: None,
            widget: None,
            error: None,
            transport: false,
            timestamp: Utc::now(),
        }
    }

    /// Attach the unit and its source identifier.
    pub fn with_unit(mut self, unit: UnitId, source: impl Into<String>) -> Self {
        self.unit = Some(unit);
        self.source = Some(source.into());
        self
    }

    /// Attach a source without a unit, e.g. a gateway URL.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_widget(mut self, widget: impl Into<String>) -> Self {
        self.widget = Some(widget.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>, transport: bool) -> Self {
        self.error = Some(error.into());
        self.transport = transport;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use pvscript_events::bus::{EventBus, ScriptEvent, ScriptEventKind};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(ScriptEvent::new(ScriptEventKind::GatewayConnected));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<ScriptEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unconsumed events are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Without subscribers the event is silently dropped.
    pub fn publish(&self, event: ScriptEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScriptEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
