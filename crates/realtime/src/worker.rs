//! Worker-Loop des Realtime-Clients (C7)
//!
//! Laeuft als einzige async Aufgabe auf der dedizierten Tokio-Runtime, die
//! `client.rs` auf einem eigenen Betriebssystem-Thread startet. Struktur
//! (Connect-Schleife mit Backoff, getrennter Schreib-/Lese-Zugriff auf den
//! Split-Stream, `thiserror`-Fehlerpropagation) folgt
//! `other_examples/.../voice-client.rs.rs`s `connection_handler` und dem
//! Zustandsuebergangs-/Keepalive-Schema aus
//! `crates/signaling/src/connection.rs` im Lehrer-Repo; hier zusaetzlich
//! um das in §4.7 fixierte Batching/Pacing und Dual-Backend-Commit
//! erweitert.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver as CbReceiver;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use va_protocol::b64;
use va_protocol::message::{
    AudioFormatDescriptor, Backend, MessageBuilder, ServerEvent, SessionUpdate, WireFormat,
};
use va_protocol::ulaw;

use crate::client::{ClientConfig, ConnectionState, EventCallback, SharedState};

/// Baut die Handshake-Anfrage mit dem Backend-abhaengigen Auth-Header
/// (§6: `api-key:<value>` fuer das manuelle Backend, `Authorization:
/// Bearer <token>` fuer das automatische), analog zum
/// `Request::builder().header("Authorization", ...)`-Muster in
/// `other_examples/.../openai_realtime.rs`.
fn build_handshake_request(
    config: &ClientConfig,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, tokio_tungstenite::tungstenite::Error>
{
    let mut request = config.endpoint.as_str().into_client_request()?;
    if let Some(credentials) = &config.credentials {
        let headers = request.headers_mut();
        let value = match config.backend {
            Backend::Manual => credentials.clone(),
            Backend::Auto => format!("Bearer {credentials}"),
        };
        let header_name = match config.backend {
            Backend::Manual => "api-key",
            Backend::Auto => "Authorization",
        };
        let header_value = value.parse().map_err(|e| {
            tokio_tungstenite::tungstenite::Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("ungueltiger Auth-Header-Wert: {e}"),
            ))
        })?;
        headers.insert(header_name, header_value);
    }
    Ok(request)
}

/// Default-Maximalzahl Frames pro Batch, bevor gesendet wird (§4.7 Default
/// 2) -- `ClientConfig::batch_frames` ist die tatsaechlich wirksame,
/// konfigurierbare Groesse (§9: keine literalen Konstanten fuer
/// Zeit-/Groessenparameter).
pub const BATCH_FRAMES: usize = 2;
/// Default-Wartezeit seit dem ersten gepufferten Frame (§4.7 Default 100ms).
pub const BATCH_TIMEOUT_MS: u64 = 100;
/// Default-Pacing-Pause nach jedem Versand (§4.7/§9).
pub const POST_SEND_SLEEP_MS: u64 = 70;
/// Default-Wiederverbindungsverzoegerung (§4.7 Default 5s).
pub const RECONNECT_DELAY_MS: u64 = 5000;
/// Wartezeit pro Warteschlangen-Poll (§4.7).
pub const QUEUE_POLL_MS: u64 = 20;

#[derive(Debug)]
pub enum WorkerCommand {
    CommitAudio,
    CreateResponse,
    CancelResponse,
    Shutdown,
}

struct Batch {
    frames: Vec<Vec<u8>>,
    started_at: Option<Instant>,
    max_frames: usize,
    timeout: Duration,
}

impl Batch {
    fn new(max_frames: usize, timeout_ms: u64) -> Self {
        Self {
            frames: Vec::new(),
            started_at: None,
            max_frames: max_frames.max(1),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn push(&mut self, frame: Vec<u8>) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        self.frames.push(frame);
    }

    fn ready_by_count(&self) -> bool {
        self.frames.len() >= self.max_frames
    }

    fn ready_by_timeout(&self) -> bool {
        match self.started_at {
            Some(t) => !self.frames.is_empty() && t.elapsed() >= self.timeout,
            None => false,
        }
    }

    fn take(&mut self) -> Vec<Vec<u8>> {
        self.started_at = None;
        std::mem::take(&mut self.frames)
    }
}

/// Hauptschleife: verbindet, sendet `session.update`, betreibt Batching
/// und Event-Dispatch, und verbindet nach Verbindungsabbruch mit
/// `RECONNECT_DELAY_MS` Verzoegerung erneut -- bis `Shutdown` empfangen
/// wird.
pub async fn run(
    config: ClientConfig,
    shared: Arc<SharedState>,
    audio_rx: CbReceiver<Vec<u8>>,
    control_rx: CbReceiver<WorkerCommand>,
    callback: Option<Arc<EventCallback>>,
) {
    'reconnect: loop {
        shared
            .conn_state
            .store(ConnectionState::Connecting as u8, Ordering::SeqCst);
        info!(endpoint = %config.endpoint, "Verbinde mit Realtime-Dienst");

        let request = match build_handshake_request(&config) {
            Ok(r) => r,
            Err(e) => {
                warn!("Handshake-Anfrage konnte nicht gebaut werden: {}", e);
                if wait_for_shutdown_or_reconnect(&control_rx, config.reconnect_delay_ms).await {
                    break 'reconnect;
                }
                continue 'reconnect;
            }
        };

        let ws_stream = match connect_async(request).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                warn!("Verbindungsaufbau fehlgeschlagen: {}", e);
                if wait_for_shutdown_or_reconnect(&control_rx, config.reconnect_delay_ms).await {
                    break 'reconnect;
                }
                continue 'reconnect;
            }
        };

        shared
            .conn_state
            .store(ConnectionState::Connected as u8, Ordering::SeqCst);
        let (mut write, mut read) = ws_stream.split();

        let session_update = MessageBuilder::session_update(&SessionUpdate {
            bot_id: None,
            user_id: None,
            voice: Some(config.voice.clone()),
            input_audio_format: AudioFormatDescriptor::new(
                config.wire_format,
                config.sample_rate,
                1,
            ),
            output_audio_format: AudioFormatDescriptor::new(
                config.wire_format,
                config.sample_rate,
                1,
            ),
        });

        if write.send(Message::Text(session_update.into())).await.is_err() {
            warn!("session.update konnte nicht gesendet werden, verbinde neu");
            shared
                .conn_state
                .store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
            if wait_for_shutdown_or_reconnect(&control_rx, config.reconnect_delay_ms).await {
                break 'reconnect;
            }
            continue 'reconnect;
        }
        shared
            .conn_state
            .store(ConnectionState::Ready as u8, Ordering::SeqCst);
        debug!("session.update gesendet, Client ist bereit");

        let mut batch = Batch::new(config.batch_frames, config.batch_timeout_ms);

        'connection: loop {
            // 1. Steuerkommandos ohne zu blockieren abarbeiten.
            while let Ok(cmd) = control_rx.try_recv() {
                match cmd {
                    WorkerCommand::Shutdown => {
                        let _ = write.send(Message::Close(None)).await;
                        shared
                            .conn_state
                            .store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
                        break 'reconnect;
                    }
                    WorkerCommand::CommitAudio => {
                        let msg = MessageBuilder::audio_commit(config.backend);
                        let _ = write.send(Message::Text(msg.into())).await;
                        if config.backend == va_protocol::message::Backend::Manual {
                            let create = MessageBuilder::response_create();
                            let _ = write.send(Message::Text(create.into())).await;
                        }
                    }
                    WorkerCommand::CreateResponse => {
                        let msg = MessageBuilder::response_create();
                        let _ = write.send(Message::Text(msg.into())).await;
                    }
                    WorkerCommand::CancelResponse => {
                        let msg = MessageBuilder::response_cancel();
                        let _ = write.send(Message::Text(msg.into())).await;
                    }
                }
            }

            // 2. Audio-Warteschlange pollen (§4.7: bis zu 20ms pro Empfang).
            if let Ok(chunk) = audio_rx.recv_timeout(Duration::from_millis(QUEUE_POLL_MS)) {
                batch.push(chunk);
            }

            // 3. Batch senden, sobald Zaehler oder Timeout erreicht sind.
            if batch.ready_by_count() || batch.ready_by_timeout() {
                shared
                    .conn_state
                    .store(ConnectionState::Streaming as u8, Ordering::SeqCst);
                let frames = batch.take();
                if send_batch(&mut write, &frames, config.wire_format).await.is_err() {
                    warn!("Senden des Audio-Batches fehlgeschlagen, trenne Verbindung");
                    break 'connection;
                }
                tokio::time::sleep(Duration::from_millis(config.send_paced_delay_ms)).await;
                shared
                    .conn_state
                    .store(ConnectionState::Ready as u8, Ordering::SeqCst);
            }

            // 4. Kurz auf eingehende Nachrichten pollen, ohne die
            //    Warteschlangen-Bearbeitung nennenswert zu verzoegern.
            match tokio::time::timeout(Duration::from_millis(5), read.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    dispatch_text(&text, &callback);
                }
                Ok(Some(Ok(Message::Close(_)))) => {
                    info!("Server hat die Verbindung geschlossen");
                    break 'connection;
                }
                Ok(Some(Ok(_))) => {} // Ping/Pong/Binary: keine Verarbeitung (§Offene Frage 2)
                Ok(Some(Err(e))) => {
                    warn!("WebSocket-Lesefehler: {}", e);
                    break 'connection;
                }
                Ok(None) => {
                    info!("WebSocket-Stream beendet");
                    break 'connection;
                }
                Err(_) => {} // Timeout: kein Frame in diesem Intervall
            }
        }

        shared
            .conn_state
            .store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
        if wait_for_shutdown_or_reconnect(&control_rx, config.reconnect_delay_ms).await {
            break 'reconnect;
        }
    }

    debug!("Realtime-Worker beendet");
}

/// Wartet `reconnect_delay_ms`, bricht aber sofort ab falls zwischenzeitlich
/// `Shutdown` ueber den Steuerkanal eintrifft. Gibt `true` zurueck wenn
/// beendet werden soll.
async fn wait_for_shutdown_or_reconnect(control_rx: &CbReceiver<WorkerCommand>, reconnect_delay_ms: u64) -> bool {
    let deadline = Instant::now() + Duration::from_millis(reconnect_delay_ms);
    loop {
        if let Ok(WorkerCommand::Shutdown) = control_rx.try_recv() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Kodiert gebatchte PCM16-Frames gemaess dem vereinbarten Wire-Format und
/// sendet sie als `input_audio_buffer.append` (§6).
async fn send_batch(
    write: &mut (impl Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin),
    frames: &[Vec<u8>],
    wire_format: WireFormat,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let mut pcm: Vec<i16> = Vec::new();
    for frame in frames {
        pcm.extend(frame.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])));
    }
    let wire_bytes = match wire_format {
        WireFormat::G711Ulaw => ulaw::encode_frame(&pcm),
        WireFormat::Pcm16 => pcm.iter().flat_map(|s| s.to_le_bytes()).collect(),
    };
    let encoded = b64::encode(&wire_bytes);
    let msg = MessageBuilder::audio_append(&encoded);
    write.send(Message::Text(msg.into())).await
}

fn dispatch_text(text: &str, callback: &Option<Arc<EventCallback>>) {
    match va_protocol::message::parse_server_event(text) {
        Ok(event) => {
            if let Some(cb) = callback {
                invoke_callback(cb, event);
            }
        }
        Err(e) => warn!("Downlink-Ereignis konnte nicht geparst werden: {}", e),
    }
}

fn invoke_callback(callback: &Arc<EventCallback>, event: ServerEvent) {
    // Der Callback laeuft synchron im Worker-Kontext (§4.7 "Safety").
    (callback)(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_wird_ab_batch_frames_bereit() {
        let mut batch = Batch::new(BATCH_FRAMES, BATCH_TIMEOUT_MS);
        assert!(!batch.ready_by_count());
        batch.push(vec![1, 2]);
        assert!(!batch.ready_by_count());
        batch.push(vec![3, 4]);
        assert!(batch.ready_by_count());
    }

    #[test]
    fn batch_take_leert_und_setzt_start_zurueck() {
        let mut batch = Batch::new(BATCH_FRAMES, BATCH_TIMEOUT_MS);
        batch.push(vec![1, 2]);
        let taken = batch.take();
        assert_eq!(taken.len(), 1);
        assert!(!batch.ready_by_timeout());
        assert!(batch.frames.is_empty());
    }

    #[test]
    fn batch_timeout_ohne_frames_nie_bereit() {
        let batch = Batch::new(BATCH_FRAMES, BATCH_TIMEOUT_MS);
        assert!(!batch.ready_by_timeout());
    }

    #[test]
    fn batch_respektiert_konfigurierte_groesse() {
        let mut batch = Batch::new(1, BATCH_TIMEOUT_MS);
        batch.push(vec![1, 2]);
        assert!(batch.ready_by_count(), "max_frames=1 sollte nach einem Frame bereit sein");
    }

    fn test_config(backend: Backend, credentials: Option<&str>) -> ClientConfig {
        ClientConfig {
            endpoint: "wss://example.invalid/session".into(),
            credentials: credentials.map(str::to_string),
            backend,
            ..Default::default()
        }
    }

    #[test]
    fn handshake_request_ohne_credentials_hat_keinen_auth_header() {
        let config = test_config(Backend::Auto, None);
        let request = build_handshake_request(&config).unwrap();
        assert!(request.headers().get("Authorization").is_none());
        assert!(request.headers().get("api-key").is_none());
    }

    #[test]
    fn handshake_request_manual_setzt_api_key_header() {
        let config = test_config(Backend::Manual, Some("geheim123"));
        let request = build_handshake_request(&config).unwrap();
        assert_eq!(
            request.headers().get("api-key").unwrap(),
            "geheim123"
        );
        assert!(request.headers().get("Authorization").is_none());
    }

    #[test]
    fn handshake_request_auto_setzt_bearer_header() {
        let config = test_config(Backend::Auto, Some("geheim123"));
        let request = build_handshake_request(&config).unwrap();
        assert_eq!(
            request.headers().get("Authorization").unwrap(),
            "Bearer geheim123"
        );
        assert!(request.headers().get("api-key").is_none());
    }
}
