//! Fehlertypen fuer das Realtime-Session-Protokoll (C6)

use thiserror::Error;

pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Nachricht konnte nicht geparst werden: {0}")]
    ParseFailed(String),

    #[error("Pflichtfeld fehlt: {0}")]
    FieldMissing(String),

    #[error("Puffer zu klein: {0}")]
    BufferTooSmall(String),
}

impl From<ProtocolError> for va_core::VaError {
    fn from(err: ProtocolError) -> Self {
        va_core::VaError::Protocol(err.to_string())
    }
}
