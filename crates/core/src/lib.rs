//! Domain types for the widget script runtime.
//!
//! Everything in this crate is free of scheduling concerns: executable
//! units, submission contexts, live values, the widget handle contract,
//! macro expansion and execution results. The manager lives in
//! `pvscript-runtime`, the out-of-process transport in `pvscript-gateway`.

pub mod error;
pub mod macros;
pub mod preferences;
pub mod scripting;
pub mod types;
pub mod value;
pub mod widget;
