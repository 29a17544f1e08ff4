//! va-realtime – WebSocket-Realtime-Client (C7)
//!
//! Einzelne WebSocket-Verbindung mit TLS, ein Worker-Task, Batching und
//! Wiederverbindung nach dem Schema in §4.7.

pub mod client;
pub mod error;
pub mod worker;

pub use client::{ClientConfig, ConnectionState, RealtimeClient};
pub use error::{RealtimeError, RealtimeResult};
pub use va_protocol::message::ServerEvent;
