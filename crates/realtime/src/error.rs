//! Fehlertypen fuer den Realtime-Client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Client nicht verbunden")]
    NotConnected,
    #[error("Client nicht konfiguriert")]
    NotConfigured,
    #[error("Sende-Warteschlange voll, Chunk verworfen")]
    QueueFull,
    #[error("WebSocket-Fehler: {0}")]
    WebSocket(String),
    #[error("Ungueltiger Zustand: {0}")]
    InvalidState(String),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;

impl From<RealtimeError> for va_core::VaError {
    fn from(value: RealtimeError) -> Self {
        match value {
            RealtimeError::NotConnected => va_core::VaError::NotConnected,
            RealtimeError::NotConfigured => {
                va_core::VaError::InvalidState("Realtime-Client nicht konfiguriert".into())
            }
            RealtimeError::QueueFull => {
                va_core::VaError::InvalidState("Sende-Warteschlange voll".into())
            }
            RealtimeError::WebSocket(msg) => va_core::VaError::TransportError(msg),
            RealtimeError::InvalidState(msg) => va_core::VaError::InvalidState(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_konvertierung_not_connected() {
        let e: va_core::VaError = RealtimeError::NotConnected.into();
        assert!(matches!(e, va_core::VaError::NotConnected));
    }

    #[test]
    fn fehler_konvertierung_websocket_wird_transport() {
        let e: va_core::VaError = RealtimeError::WebSocket("boom".into()).into();
        assert!(matches!(e, va_core::VaError::TransportError(_)));
    }
}
