//! Ereignis- und App-Zustands-Definitionen
//!
//! `Event` ist die Taggged-Union, die ueber den Event-Bus (`bus.rs`) laeuft
//! und von der Session-State-Machine konsumiert wird. `AppState` ist der
//! globale Konversationszustand; beide entsprechen exakt dem Datenmodell.

use std::time::Duration;

/// Alle Ereignisse, die die Session-State-Machine antreiben koennen.
///
/// Jede Variante ist absichtlich klein und ohne geliehene Zeiger gehalten
/// (siehe Designnotiz zu Rohzeiger-Feldern in Ereignissen): Texte/Bytes, die
/// ein Ereignis begleiten sollen, werden vom Erzeuger in einen eigenen
/// `String`/`Vec<u8>` kopiert, bevor sie eingereiht werden.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Kurzes Antippen der Bedienflaeche
    UserTap,
    /// Langes Halten der Bedienflaeche
    UserLongPress,
    /// Physischer Tastendruck
    ButtonPress,
    /// Abbruchwunsch des Benutzers
    Cancel,

    /// VAD-Kante: Sprache beginnt
    VoiceStart,
    /// VAD-Kante: Sprache endet
    VoiceEnd,

    /// Dienst hat mit der Antwort begonnen (`response.created`)
    ServiceResponseStart,
    /// Dienst hat die Antwort beendet (`response.done` / `audio.done`)
    ServiceResponseEnd,
    /// Dienst hat einen Fehler gemeldet
    ServiceError { code: i64, message: String },

    /// Wiedergabe der Antwort ist vollstaendig ausgespielt
    AudioDone,

    /// Netzwerk/WebSocket wieder verbunden
    NetUp,
    /// Netzwerk/WebSocket getrennt
    NetDown,
}

impl Event {
    /// Kurzer, stabiler Name fuer Logging/Metriken
    pub fn kind(&self) -> &'static str {
        match self {
            Event::UserTap => "user_tap",
            Event::UserLongPress => "user_long_press",
            Event::ButtonPress => "button_press",
            Event::Cancel => "cancel",
            Event::VoiceStart => "voice_start",
            Event::VoiceEnd => "voice_end",
            Event::ServiceResponseStart => "service_response_start",
            Event::ServiceResponseEnd => "service_response_end",
            Event::ServiceError { .. } => "service_error",
            Event::AudioDone => "audio_done",
            Event::NetUp => "net_up",
            Event::NetDown => "net_down",
        }
    }
}

/// Globaler Konversationszustand. Genau ein Zustand zu jeder Zeit;
/// Uebergaenge werden von der Session-State-Machine serialisiert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Init,
    Idle,
    Listening,
    Processing,
    Speaking,
    Error,
}

impl AppState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::Init => "init",
            AppState::Idle => "idle",
            AppState::Listening => "listening",
            AppState::Processing => "processing",
            AppState::Speaking => "speaking",
            AppState::Error => "error",
        }
    }
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Zeitstempel eines Ereignisses (monoton), fuer die Bus-Huelle in `bus.rs`.
pub fn monotonic_now() -> Duration {
    use std::sync::OnceLock;
    use std::time::Instant;
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_namen() {
        assert_eq!(Event::VoiceStart.kind(), "voice_start");
        assert_eq!(
            Event::ServiceError {
                code: 1,
                message: "x".into()
            }
            .kind(),
            "service_error"
        );
    }

    #[test]
    fn app_state_display() {
        assert_eq!(AppState::Listening.to_string(), "listening");
    }

    #[test]
    fn monotonic_now_steigt() {
        let a = monotonic_now();
        let b = monotonic_now();
        assert!(b >= a);
    }
}
