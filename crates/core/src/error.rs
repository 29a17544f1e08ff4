//! Fehlertypen fuer den Voice-Assistant-Core
//!
//! Zentraler Fehler-Enum der die Fehlerarten aus dem Fehlerbehandlungs-
//! Design abdeckt. Untermodule definieren eigene, engere Fehler und
//! konvertieren via `#[from]` in diesen Typ.

use thiserror::Error;

/// Globaler Result-Alias fuer den Voice-Assistant-Core
pub type Result<T> = std::result::Result<T, VaError>;

/// Alle moeglichen Fehler im Voice-Assistant-System
#[derive(Debug, Error)]
pub enum VaError {
    #[error("Ungueltiges Argument: {0}")]
    InvalidArgument(String),

    #[error("Ungueltiger Zustand: {0}")]
    InvalidState(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Timeout(String),

    #[error("Speicher nicht verfuegbar: {0}")]
    OutOfMemory(String),

    #[error("Nicht verbunden")]
    NotConnected,

    #[error("Codec-E/A-Fehler: {0}")]
    CodecIo(String),

    #[error("Protokollfehler: {0}")]
    Protocol(String),

    #[error("Dienstfehler {code}: {message}")]
    ServiceError { code: i64, message: String },

    #[error("Transportfehler: {0}")]
    TransportError(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl VaError {
    /// Gibt true zurueck wenn der Fehler eine Wiederholung nahelegt
    /// (Reconnect, erneuter Versuch), statt ein dauerhafter Defekt zu sein.
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::NotConnected | Self::TransportError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = VaError::InvalidState("not connected".into());
        assert_eq!(e.to_string(), "Ungueltiger Zustand: not connected");
    }

    #[test]
    fn wiederholbar_erkennung() {
        assert!(VaError::Timeout("recv".into()).ist_wiederholbar());
        assert!(!VaError::InvalidArgument("bad".into()).ist_wiederholbar());
    }

    #[test]
    fn service_error_felder() {
        let e = VaError::ServiceError {
            code: 4000,
            message: "x".into(),
        };
        assert!(e.to_string().contains("4000"));
        assert!(e.to_string().contains('x'));
    }
}
