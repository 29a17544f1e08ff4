//! va-core – Gemeinsame Typen, Fehlertypen und Event-Bus
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Voice-Assistant-Crates gemeinsam genutzt werden: den globalen
//! Fehlertyp, die Event- und App-Zustands-Enums aus dem Datenmodell, und
//! den Event-Bus (C9), ueber den Eingabequellen, Audio-Pipeline und
//! Realtime-Client mit der Session-State-Machine kommunizieren.

pub mod bus;
pub mod error;
pub mod event;

// Re-Exporte fuer bequemen Zugriff
pub use bus::EventBus;
pub use error::{Result, VaError};
pub use event::{AppState, Event};
