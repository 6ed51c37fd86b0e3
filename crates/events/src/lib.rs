//! Script runtime event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ScriptEvent`]: the envelope published for every scheduling
//!   decision, execution outcome and gateway connectivity change.

pub mod bus;

pub use bus::{EventBus, ScriptEvent, ScriptEventKind};
