//! va-app – Bibliotheks-Root
//!
//! Verdrahtet Audio-Pipeline (C5), Realtime-Client (C7) und Session-
//! State-Machine (C8) zu einem lauffaehigen Prozess und stellt den
//! oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use config::AppConfig;
use va_audio::{AudioPipeline, PipelineConfig, VadConfig};
use va_core::EventBus;
use va_protocol::message::WireFormat;
use va_realtime::{ClientConfig, RealtimeClient};
use va_session::{make_pipeline_delivery, make_realtime_callback, NoopUi, SessionMachine};

/// Haelt die vier Prozess-weiten Singletons zusammen (§5: "No global
/// mutable state other than: the process-wide event bus singleton, the
/// audio pipeline singleton, the realtime client singleton, the session
/// singleton"). Jedes hat ein explizites `init`/`deinit`.
pub struct App {
    pub config: AppConfig,
    pipeline: Arc<AudioPipeline>,
    client: Arc<RealtimeClient>,
    session: Arc<SessionMachine>,
    session_thread: std::thread::JoinHandle<()>,
}

impl App {
    /// Baut alle Singletons in der vorgeschriebenen Reihenfolge auf:
    /// Event-Bus -> Pipeline -> Realtime-Client -> Session (§5).
    pub fn neu(config: AppConfig) -> Result<Self> {
        let (bus, bus_rx) = EventBus::with_default_depth();

        let client = Arc::new(RealtimeClient::init());

        let wire_format = match config.realtime.wire_format.as_str() {
            "pcm16" => WireFormat::Pcm16,
            _ => WireFormat::G711Ulaw,
        };

        client.configure(ClientConfig {
            endpoint: config.realtime.endpoint.clone(),
            credentials: config.realtime.api_key.clone(),
            voice: config.realtime.voice.clone(),
            sample_rate: config.realtime.sample_rate,
            backend: config.realtime.backend(),
            wire_format,
            reconnect_delay_ms: config.realtime.reconnect_delay_ms,
            batch_frames: config.realtime.batch_frames,
            batch_timeout_ms: config.realtime.batch_timeout_ms,
            send_paced_delay_ms: config.realtime.send_paced_delay_ms,
        });

        let ui: Arc<dyn va_session::SessionUi> = Arc::new(NoopUi);
        let delivery = make_pipeline_delivery(bus.clone(), Arc::clone(&client), Arc::clone(&ui));

        let pipeline_config = PipelineConfig {
            format: va_audio::AudioFormat {
                sample_rate: config.audio.sample_rate,
                channels: config.audio.channels,
            },
            vad: VadConfig {
                aggressiveness: config.audio.vad_mode,
                ..VadConfig::default()
            },
            aec_mode: config.audio.aec_mode,
            ns_level: config.audio.ns_level,
            aec: config.audio.aec,
            ns: config.audio.ns,
            vad_enabled: config.audio.vad,
            aec_reference_from_playback: config.audio.aec_reference_from_playback,
            capture_buffer_frames: 8,
            playback_buffer_frames: 8,
            input_device_name: config.audio.input_device.clone(),
            output_device_name: config.audio.output_device.clone(),
            on_delivery: Some(delivery),
        };

        let pipeline = Arc::new(AudioPipeline::init(pipeline_config)?);

        let session = Arc::new(SessionMachine::new(
            Arc::clone(&pipeline),
            Arc::clone(&client),
            ui,
        ));

        let on_transcript_delta = {
            let session = Arc::clone(&session);
            move |text: String| session.append_transcript(&text, false)
        };
        client.register_callback(make_realtime_callback(
            bus.clone(),
            Arc::clone(&pipeline),
            wire_format,
            on_transcript_delta,
        ));

        client.connect()?;

        let session_thread = Arc::clone(&session).spawn(bus_rx);
        session.mark_ready();

        Ok(Self {
            config,
            pipeline,
            client,
            session,
            session_thread,
        })
    }

    pub fn session(&self) -> &Arc<SessionMachine> {
        &self.session
    }

    /// Laeuft bis zum Shutdown-Signal (Ctrl-C) und faehrt danach alle
    /// Subsysteme in umgekehrter Aufbaureihenfolge geordnet herunter:
    /// Session -> Realtime-Client -> Audio-Pipeline.
    pub async fn laufen(self) -> Result<()> {
        tracing::info!(
            endpoint = %self.config.realtime.endpoint,
            backend = %self.config.realtime.backend,
            "Voice-Assistant laeuft. Warte auf Shutdown-Signal (Ctrl-C)..."
        );
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, faehre Subsysteme geordnet herunter");

        self.herunterfahren();
        Ok(())
    }

    /// Geordnetes Herunterfahren: Session zuerst (stoppt neue
    /// Zustandsuebergaenge), dann Realtime-Client (trennt die
    /// Verbindung), zuletzt die Audio-Pipeline (stoppt Streams).
    pub fn herunterfahren(self) {
        self.session.request_shutdown();
        let _ = self.session_thread.join();

        self.client.deinit();
        self.pipeline.deinit();
        std::thread::sleep(Duration::from_millis(30));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_baut_ohne_echten_server_auf() {
        // `connect()` versucht einen echten WebSocket-Aufbau, der in einer
        // Testumgebung ohne Netzwerk fehlschlaegt, aber nicht blockiert
        // (der Worker-Thread versucht selbst bei Fehlschlag weiterzulaufen
        // und mit Verzoegerung erneut zu verbinden) -- `App::neu` selbst
        // schlaegt nur fehl, wenn der Worker-Thread nicht gestartet werden
        // kann.
        let mut config = AppConfig::default();
        config.realtime.endpoint = "wss://127.0.0.1:1/nicht-erreichbar".into();
        let app = App::neu(config).expect("App sollte trotz unerreichbarem Endpunkt aufbauen");
        assert_eq!(app.session().state(), va_core::AppState::Idle);
        app.herunterfahren();
    }
}
