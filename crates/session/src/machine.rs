//! Session-State-Machine (C8)
//!
//! Einziger Eigentuemer des globalen Konversationszustands. Laeuft auf
//! einem dedizierten Betriebssystem-Thread, der `Event`s vom Event-Bus
//! mit 100 ms Empfangs-Timeout konsumiert (§4.8) -- dieselbe
//! Thread-statt-Tokio-Task-Entscheidung wie bei `va_audio::pipeline` und
//! `va_realtime::client`, weil `EventReceiver::recv_timeout` synchron
//! blockiert; ein gemeinsam genutzter Tokio-Executor waere hier nur
//! zusaetzliche Komplexitaet ohne Nutzen (siehe DESIGN.md). Ein einzelnes
//! `parking_lot::Mutex` serialisiert alle Zustandsuebergaenge, im selben
//! Sperrstil wie `crates/signaling/src/connection.rs` im Lehrer-Repo.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use va_audio::AudioPipeline;
use va_core::bus::EventReceiver;
use va_core::{AppState, Event};
use va_realtime::RealtimeClient;

use crate::ui::{Page, SessionUi};

/// Bindet C5 (Audio-Pipeline), C7 (Realtime-Client) und C9 (ueber den an
/// `spawn` uebergebenen Empfaenger) zu einem Gespraechsablauf zusammen.
pub struct SessionMachine {
    state: Mutex<AppState>,
    pipeline: Arc<AudioPipeline>,
    client: Arc<RealtimeClient>,
    ui: Arc<dyn SessionUi>,
    user_transcript: Mutex<String>,
    ai_transcript: Mutex<String>,
    shutdown: AtomicBool,
}

impl SessionMachine {
    /// Erstellt die Maschine im Zustand `Init` (§4.8: "initial state: Idle
    /// after Init succeeds" -- der Aufrufer ruft `mark_ready` sobald
    /// Pipeline und Client erfolgreich initialisiert wurden).
    pub fn new(pipeline: Arc<AudioPipeline>, client: Arc<RealtimeClient>, ui: Arc<dyn SessionUi>) -> Self {
        Self {
            state: Mutex::new(AppState::Init),
            pipeline,
            client,
            ui,
            user_transcript: Mutex::new(String::new()),
            ai_transcript: Mutex::new(String::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Markiert die Initialisierung als abgeschlossen und wechselt von
    /// `Init` nach `Idle`.
    pub fn mark_ready(&self) {
        let mut state = self.state.lock();
        *state = AppState::Idle;
        self.ui.set_page(Page::from(*state));
        self.ui.show_status("bereit", true);
    }

    pub fn state(&self) -> AppState {
        *self.state.lock()
    }

    pub fn user_transcript(&self) -> String {
        self.user_transcript.lock().clone()
    }

    pub fn ai_transcript(&self) -> String {
        self.ai_transcript.lock().clone()
    }

    /// Haengt ein Transkript-Delta an (§6 Kollaborator-Schnittstelle
    /// `update_transcript`); direkt vom Realtime-Downlink aufgerufen, nicht
    /// ueber den Event-Bus (hohe Frequenz, siehe `bridge.rs`).
    pub fn append_transcript(&self, text: &str, is_user: bool) {
        let mut buf = if is_user {
            self.user_transcript.lock()
        } else {
            self.ai_transcript.lock()
        };
        buf.push_str(text);
        self.ui.update_transcript(text, is_user);
    }

    fn clear_transcripts(&self) {
        self.user_transcript.lock().clear();
        self.ai_transcript.lock().clear();
        self.ui.clear_transcript();
    }

    /// Wendet ein einzelnes Ereignis auf die Zustandsmaschine an (§4.8
    /// Uebergangstabelle). Unbekannte (Zustand, Ereignis)-Paare sind
    /// idempotente No-ops -- der Zustand bleibt unveraendert.
    pub fn apply(&self, event: Event) {
        let mut state = self.state.lock();
        let from = *state;

        let to = match (from, &event) {
            (AppState::Idle, Event::UserTap | Event::ButtonPress) => {
                if self.client.is_connected() {
                    self.clear_transcripts();
                    if let Err(e) = self.pipeline.start_recording() {
                        warn!("Aufnahme konnte nicht gestartet werden: {}", e);
                    }
                    AppState::Listening
                } else {
                    self.ui.show_status("nicht verbunden", false);
                    AppState::Idle
                }
            }

            (AppState::Listening, Event::UserTap | Event::VoiceEnd) => {
                if let Err(e) = self.pipeline.stop_recording() {
                    warn!("Aufnahme konnte nicht gestoppt werden: {}", e);
                }
                // `commit_audio` loest bei Backend::Manual intern bereits
                // `response.create` aus (siehe `va_realtime::worker`), ein
                // zusaetzlicher Aufruf hier wuerde doppelt senden.
                if let Err(e) = self.client.commit_audio() {
                    warn!("Audio konnte nicht committet werden: {}", e);
                }
                AppState::Processing
            }

            (AppState::Listening, Event::Cancel | Event::UserLongPress) => {
                if let Err(e) = self.pipeline.stop_recording() {
                    warn!("Aufnahme konnte nicht gestoppt werden: {}", e);
                }
                AppState::Idle
            }

            (AppState::Processing, Event::ServiceResponseStart) => {
                if let Err(e) = self.pipeline.start_playback() {
                    warn!("Wiedergabe konnte nicht gestartet werden: {}", e);
                }
                AppState::Speaking
            }

            (AppState::Processing, Event::ServiceError { code, message }) => {
                self.ui.show_error(message);
                warn!(code, message, "Dienstfehler waehrend Verarbeitung");
                AppState::Error
            }

            (AppState::Processing, Event::Cancel) => {
                if let Err(e) = self.client.cancel_response() {
                    warn!("Antwort konnte nicht abgebrochen werden: {}", e);
                }
                AppState::Idle
            }

            (AppState::Speaking, Event::ServiceResponseEnd | Event::AudioDone) => {
                if let Err(e) = self.pipeline.stop_playback() {
                    warn!("Wiedergabe konnte nicht gestoppt werden: {}", e);
                }
                AppState::Idle
            }

            (AppState::Speaking, Event::UserTap | Event::Cancel) => {
                if let Err(e) = self.client.cancel_response() {
                    warn!("Antwort konnte nicht abgebrochen werden: {}", e);
                }
                if let Err(e) = self.pipeline.clear_playback() {
                    warn!("Wiedergabepuffer konnte nicht geleert werden: {}", e);
                }
                if let Err(e) = self.pipeline.stop_playback() {
                    warn!("Wiedergabe konnte nicht gestoppt werden: {}", e);
                }
                AppState::Idle
            }

            (AppState::Error, Event::UserTap) => AppState::Idle,

            // Netzwerkereignisse loesen (noch) keinen Zustandswechsel aus,
            // sollen aber fuer Diagnosezwecke sichtbar sein.
            (_, Event::NetUp) => {
                debug!("Netzwerk wieder verbunden");
                from
            }
            (_, Event::NetDown) => {
                warn!("Netzwerk getrennt");
                from
            }

            // Alle anderen (Zustand, Ereignis)-Kombinationen: idempotentes
            // No-op (§4.8 "Transitions are idempotent on same-state
            // events").
            (state, event) => {
                debug!(?state, kind = event.kind(), "Ereignis ohne Uebergang ignoriert");
                from
            }
        };

        if to != from {
            info!(from = %from, to = %to, "Zustandsuebergang");
            *state = to;
            self.ui.set_page(Page::from(to));
        }
    }

    /// Signalisiert dem laufenden `spawn`-Thread, sich geordnet zu beenden.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Startet den Session-Thread, der `bus_rx` bis zum Abbruch konsumiert
    /// (§4.8/§5: 100 ms Empfangs-Timeout, damit `request_shutdown`
    /// zeitnah bemerkt wird).
    pub fn spawn(self: Arc<Self>, bus_rx: EventReceiver) -> std::thread::JoinHandle<()> {
        std::thread::Builder::new()
            .name("va-session".to_string())
            .spawn(move || {
                debug!("Session-Thread gestartet");
                while !self.shutdown.load(Ordering::SeqCst) {
                    match bus_rx.recv_timeout(Duration::from_millis(100)) {
                        Ok(Some(event)) => self.apply(event),
                        Ok(None) => continue, // Timeout: periodisches Polling
                        Err(e) => {
                            warn!("Event-Bus getrennt, Session-Thread beendet sich: {}", e);
                            break;
                        }
                    }
                }
                debug!("Session-Thread beendet");
            })
            .expect("Session-Thread konnte nicht gestartet werden")
    }
}
