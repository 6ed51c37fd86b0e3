//! Gateway to an external script interpreter process.
//!
//! Provides the versioned wire schema, a WebSocket client, a fixed-size
//! connection pool, an optional launcher for the interpreter process and
//! [`GatewayAdapter`], which ties them together with a per-call timeout
//! and a single retry on transport failure.

pub mod adapter;
pub mod client;
pub mod config;
pub mod error;
pub mod launcher;
pub mod messages;
pub mod pool;

pub use adapter::GatewayAdapter;
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use messages::{InvokeRequest, InvokeResponse, PropertyUpdate, ResponseStatus, PROTOCOL_VERSION};
