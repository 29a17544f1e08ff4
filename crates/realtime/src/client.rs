//! Realtime-Client (C7) — oeffentliche Fassade
//!
//! Besitzt genau eine WebSocket-Verbindung und genau einen Worker-Task.
//! Die Fassade selbst ist synchron: sie haelt keinen Tokio-Kontext,
//! sondern startet bei `connect()` einen dedizierten Betriebssystem-
//! Thread, der eine eigene Tokio-Runtime betreibt und den Worker-Loop
//! faehrt — dieselbe Idee wie der dedizierte Audio-Thread in
//! `va-audio::pipeline`, nur mit einer async statt synchronen Schleife
//! im Inneren, weil `tokio-tungstenite` async ist.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use va_protocol::message::{Backend, ServerEvent, WireFormat};

use crate::error::{RealtimeError, RealtimeResult};
use crate::worker::{self, WorkerCommand};

/// Tiefe der Sende-Warteschlange fuer PCM16-Audio-Chunks (§4.7).
pub const AUDIO_QUEUE_DEPTH: usize = 20;

/// Verbindungszustand der State-Machine aus §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Ready = 3,
    Streaming = 4,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Ready,
            4 => Self::Streaming,
            _ => Self::Disconnected,
        }
    }
}

/// Konfiguration fuer Endpunkt, Anmeldedaten und Audioformat.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub credentials: Option<String>,
    pub voice: String,
    pub sample_rate: u32,
    pub backend: Backend,
    /// Wire-Format fuer `session.update` und die Uplink-Kodierung (§6:
    /// "8 kHz, mono, G.711 μ-law (recommended) or 16 kHz PCM16").
    pub wire_format: WireFormat,
    /// Wiederverbindungsverzoegerung nach Verbindungsabbruch (§6 Default 5000ms).
    pub reconnect_delay_ms: u64,
    /// Maximalzahl Frames pro Batch, bevor gesendet wird (§6 Default 2).
    pub batch_frames: usize,
    /// Maximale Wartezeit seit dem ersten gepufferten Frame (§6 Default 100ms).
    pub batch_timeout_ms: u64,
    /// Pacing-Pause nach jedem Versand (§6/§9 Default 70ms, siehe
    /// Designnotiz "the paced 70 ms sleep ... should be configuration, not
    /// a literal constant").
    pub send_paced_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            credentials: None,
            voice: "default".to_string(),
            sample_rate: 8000,
            backend: Backend::Auto,
            wire_format: WireFormat::G711Ulaw,
            reconnect_delay_ms: worker::RECONNECT_DELAY_MS,
            batch_frames: worker::BATCH_FRAMES,
            batch_timeout_ms: worker::BATCH_TIMEOUT_MS,
            send_paced_delay_ms: worker::POST_SEND_SLEEP_MS,
        }
    }
}

pub type EventCallback = dyn Fn(ServerEvent) + Send + Sync;

/// Gemeinsamer Zustand zwischen Fassade und Worker-Thread.
pub(crate) struct SharedState {
    pub(crate) conn_state: AtomicU8,
}

/// Realtime-Client: haelt Konfiguration, Kommando-Kanaele und den
/// gemeinsamen Verbindungszustand.
pub struct RealtimeClient {
    config: Mutex<Option<ClientConfig>>,
    callback: Mutex<Option<Arc<EventCallback>>>,
    shared: Arc<SharedState>,
    audio_tx: Mutex<Option<Sender<Vec<u8>>>>,
    control_tx: Mutex<Option<Sender<WorkerCommand>>>,
    worker_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl RealtimeClient {
    /// Erstellt den Client ohne Verbindung (§4.7 `init`).
    pub fn init() -> Self {
        Self {
            config: Mutex::new(None),
            callback: Mutex::new(None),
            shared: Arc::new(SharedState {
                conn_state: AtomicU8::new(ConnectionState::Disconnected as u8),
            }),
            audio_tx: Mutex::new(None),
            control_tx: Mutex::new(None),
            worker_thread: Mutex::new(None),
        }
    }

    /// Setzt Endpunkt, Anmeldedaten, Stimme, Samplerate und Backend.
    pub fn configure(&self, config: ClientConfig) {
        *self.config.lock() = Some(config);
    }

    pub fn register_callback(&self, callback: impl Fn(ServerEvent) + Send + Sync + 'static) {
        *self.callback.lock() = Some(Arc::new(callback));
    }

    /// Baut die WebSocket-Verbindung auf und startet den Worker-Thread.
    pub fn connect(&self) -> RealtimeResult<()> {
        let config = self
            .config
            .lock()
            .clone()
            .ok_or(RealtimeError::NotConfigured)?;
        let callback = self.callback.lock().clone();

        let (audio_tx, audio_rx) = bounded::<Vec<u8>>(AUDIO_QUEUE_DEPTH);
        let (control_tx, control_rx) = bounded::<WorkerCommand>(16);

        *self.audio_tx.lock() = Some(audio_tx);
        *self.control_tx.lock() = Some(control_tx);

        self.shared
            .conn_state
            .store(ConnectionState::Connecting as u8, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("va-realtime-worker".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        warn!("Tokio-Runtime konnte nicht erstellt werden: {}", e);
                        return;
                    }
                };
                runtime.block_on(worker::run(config, shared, audio_rx, control_rx, callback));
            })
            .map_err(|e| RealtimeError::WebSocket(e.to_string()))?;

        *self.worker_thread.lock() = Some(handle);
        debug!("Realtime-Worker-Thread gestartet");
        Ok(())
    }

    /// Trennt die Verbindung und stoppt den Worker-Thread.
    pub fn disconnect(&self) {
        if let Some(tx) = self.control_tx.lock().take() {
            let _ = tx.send(WorkerCommand::Shutdown);
        }
        self.audio_tx.lock().take();
        if let Some(handle) = self.worker_thread.lock().take() {
            let _ = handle.join();
        }
        self.shared
            .conn_state
            .store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
    }

    pub fn deinit(&self) {
        self.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            self.get_state(),
            ConnectionState::Connected | ConnectionState::Ready | ConnectionState::Streaming
        )
    }

    pub fn get_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.shared.conn_state.load(Ordering::SeqCst))
    }

    /// Reiht PCM16-Bytes zur Uebertragung ein; verwirft bei voller
    /// Warteschlange den neuesten Chunk mit einer Warnung (§4.7).
    pub fn send_audio(&self, bytes: Vec<u8>) -> RealtimeResult<()> {
        if !self.is_connected() {
            return Err(RealtimeError::InvalidState("nicht verbunden".into()));
        }
        let guard = self.audio_tx.lock();
        let tx = guard.as_ref().ok_or(RealtimeError::NotConnected)?;
        if tx.try_send(bytes).is_err() {
            warn!("Audio-Warteschlange voll, Chunk verworfen");
            return Err(RealtimeError::QueueFull);
        }
        Ok(())
    }

    pub fn commit_audio(&self) -> RealtimeResult<()> {
        self.send_control(WorkerCommand::CommitAudio)
    }

    pub fn create_response(&self) -> RealtimeResult<()> {
        self.send_control(WorkerCommand::CreateResponse)
    }

    pub fn cancel_response(&self) -> RealtimeResult<()> {
        self.send_control(WorkerCommand::CancelResponse)
    }

    fn send_control(&self, cmd: WorkerCommand) -> RealtimeResult<()> {
        if !self.is_connected() {
            return Err(RealtimeError::InvalidState("nicht verbunden".into()));
        }
        let guard = self.control_tx.lock();
        let tx = guard.as_ref().ok_or(RealtimeError::NotConnected)?;
        tx.send(cmd)
            .map_err(|e| RealtimeError::WebSocket(e.to_string()))
    }
}

impl Default for RealtimeClient {
    fn default() -> Self {
        Self::init()
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_spiegelt_worker_defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.reconnect_delay_ms, worker::RECONNECT_DELAY_MS);
        assert_eq!(cfg.batch_frames, worker::BATCH_FRAMES);
        assert_eq!(cfg.batch_timeout_ms, worker::BATCH_TIMEOUT_MS);
        assert_eq!(cfg.send_paced_delay_ms, worker::POST_SEND_SLEEP_MS);
    }

    #[test]
    fn init_ist_disconnected() {
        let client = RealtimeClient::init();
        assert_eq!(client.get_state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
    }

    #[test]
    fn connect_ohne_konfiguration_schlaegt_fehl() {
        let client = RealtimeClient::init();
        let result = client.connect();
        assert!(matches!(result, Err(RealtimeError::NotConfigured)));
    }

    #[test]
    fn send_audio_ohne_verbindung_schlaegt_fehl() {
        let client = RealtimeClient::init();
        let result = client.send_audio(vec![0u8; 10]);
        assert!(result.is_err());
    }

    #[test]
    fn commit_ohne_verbindung_schlaegt_fehl() {
        let client = RealtimeClient::init();
        assert!(client.commit_audio().is_err());
        assert!(client.create_response().is_err());
        assert!(client.cancel_response().is_err());
    }

    #[test]
    fn configure_erlaubt_erneutes_konfigurieren() {
        let client = RealtimeClient::init();
        client.configure(ClientConfig {
            endpoint: "wss://example.invalid/session".into(),
            ..Default::default()
        });
        client.configure(ClientConfig {
            endpoint: "wss://example.invalid/other".into(),
            ..Default::default()
        });
        assert_eq!(
            client.config.lock().as_ref().unwrap().endpoint,
            "wss://example.invalid/other"
        );
    }

    #[test]
    fn connection_state_roundtrip_ueber_u8() {
        for s in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Ready,
            ConnectionState::Streaming,
        ] {
            assert_eq!(ConnectionState::from_u8(s as u8), s);
        }
    }
}
