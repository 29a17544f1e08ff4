//! va-session – Session-State-Machine (C8)
//!
//! Bindet Audio-Pipeline (`va-audio`), Realtime-Client (`va-realtime`) und
//! Event-Bus (`va-core`) zu einem vollstaendigen Gespraechsablauf
//! zusammen: Leerlauf -> Zuhoeren -> Verarbeiten -> Sprechen, mit Fehler-
//! und Abbruchpfaden (§4.8).

pub mod bridge;
pub mod machine;
pub mod ui;

pub use bridge::{make_pipeline_delivery, make_realtime_callback};
pub use machine::SessionMachine;
pub use ui::{NoopUi, Page, SessionUi};
