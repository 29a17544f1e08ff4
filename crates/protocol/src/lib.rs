//! va-protocol – Realtime-Session-Protokoll
//!
//! Definiert die JSON-Steuernachrichten des Realtime-Clients (C6: Aufbau
//! der Uplink-Nachrichten, tolerantes Parsen der Downlink-Ereignisse),
//! den G.711-μ-law-Codec und eine duenne Base64-Huelle.

pub mod b64;
pub mod error;
pub mod message;
pub mod ulaw;

pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    AudioFormatDescriptor, AudioFormatKind, Backend, MessageBuilder, ServerEvent, SessionUpdate,
    WireFormat,
};
