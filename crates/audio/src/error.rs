//! Fehlertypen fuer die Audio-Pipeline (C1, C2, C5)

use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Pipeline
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Kein Standard-Eingabegeraet verfuegbar")]
    KeinStandardEingabegeraet,

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Oeffnen des Codecs fehlgeschlagen: {0}")]
    OpenFailed(String),

    #[error("Lesen vom Codec fehlgeschlagen: {0}")]
    ReadFailed(String),

    #[error("Schreiben auf den Codec fehlgeschlagen: {0}")]
    WriteFailed(String),

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Ungueltiges Argument: {0}")]
    InvalidArgument(String),

    #[error("Pipeline laeuft bereits")]
    AlreadyRunning,

    #[error("Pipeline nicht initialisiert")]
    NotInitialized,

    #[error("Oeffnen des Codec-Geraets fehlgeschlagen: {0}")]
    CodecOpenFailed(String),

    #[error("Speicherallokation fehlgeschlagen: {0}")]
    AllocFailed(String),

    #[error("Ring-Buffer-Ueberlauf (nicht fatal, Frame verworfen)")]
    BufferOverflow,

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unerwarteter Fehler: {0}")]
    Anyhow(#[from] anyhow::Error),
}

pub type AudioResult<T> = Result<T, AudioError>;

impl From<AudioError> for va_core::VaError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::InvalidArgument(m) => va_core::VaError::InvalidArgument(m),
            AudioError::AlreadyRunning | AudioError::NotInitialized => {
                va_core::VaError::InvalidState(err.to_string())
            }
            other => va_core::VaError::CodecIo(other.to_string()),
        }
    }
}
