//! Verdrahtung zwischen C5 (Audio-Pipeline), C7 (Realtime-Client) und C9
//! (Event-Bus).
//!
//! Haelt die Datenflussgrenzen aus §3 ein: VAD-Kanten und dienstseitige
//! Steuerereignisse laufen ueber den Event-Bus und werden von der Session-
//! State-Machine konsumiert; hochfrequente Nutzdaten (Audio-Deltas,
//! Transkript-Deltas, rohe Capture-Frames) werden dagegen sofort in einen
//! eigenen, besessenen Wert kopiert und direkt weitergereicht, statt ueber
//! den Bus zu laufen (Designnotiz zu Rohzeiger-Feldern: ein `Event` darf
//! keinen Zeiger auf Daten tragen, die nur fuer die Dauer eines Callbacks
//! gueltig sind).

use std::sync::Arc;

use tracing::{debug, trace, warn};

use va_audio::pipeline::DeliveryCallback;
use va_audio::{AudioPipeline, VadState};
use va_core::{Event, EventBus};
use va_protocol::message::{ServerEvent, WireFormat};
use va_protocol::{b64, ulaw};
use va_realtime::RealtimeClient;

use crate::ui::SessionUi;

/// Baut den Delivery-Callback, den `PipelineConfig::on_delivery` aus dem
/// Recorder-Pfad synchron fuer jeden verarbeiteten Frame aufruft (§4.5).
///
/// Postet VAD-Kanten auf den Event-Bus (ueber `post_from_isr`, da der
/// Aufruf aus dem Audio-Thread-Kontext kommt und niemals blockieren darf)
/// und reicht den verarbeiteten Frame direkt an den Realtime-Client
/// weiter -- die Reihenfolge ("VAD edge events are delivered before the
/// audio frame that caused them is enqueued for transmission", §5) ist
/// dadurch garantiert, dass beide Schritte synchron nacheinander in
/// diesem einen Aufruf passieren. Der Pegel 0..100 wird ausserdem direkt
/// an den UI-Kollaborator durchgereicht (§6 `update_audio_level`).
pub fn make_pipeline_delivery(
    bus: EventBus,
    client: Arc<RealtimeClient>,
    ui: Arc<dyn SessionUi>,
) -> Arc<DeliveryCallback> {
    Arc::new(move |bytes: &[u8], vad_state: VadState, level: u8| {
        match vad_state {
            VadState::VoiceStart => bus.post_from_isr(Event::VoiceStart),
            VadState::VoiceEnd => bus.post_from_isr(Event::VoiceEnd),
            VadState::Silence | VadState::Voice => {}
        }
        trace!(level, "Capture-Frame verarbeitet");
        ui.update_audio_level(level);

        if let Err(e) = client.send_audio(bytes.to_vec()) {
            debug!("Frame nicht an Realtime-Client weitergereicht: {}", e);
        }
    })
}

/// Baut den Downlink-Callback, den `RealtimeClient::register_callback`
/// synchron aus dem Realtime-Worker-Thread fuer jedes geparste
/// `ServerEvent` aufruft (§4.7 "callback runs synchronously").
///
/// `on_audio_delta`/`on_transcript_delta` werden direkt aufgerufen (hohe
/// Frequenz, Rohdaten bereits dekodiert/kopiert); die restlichen
/// Ereignisse werden in `Event`s uebersetzt und auf den Bus gepostet, wo
/// sie sequenziell Trigger der Session-State-Machine sind.
pub fn make_realtime_callback(
    bus: EventBus,
    pipeline: Arc<AudioPipeline>,
    wire_format: WireFormat,
    on_transcript_delta: impl Fn(String) + Send + Sync + 'static,
) -> impl Fn(ServerEvent) + Send + Sync + 'static {
    move |event: ServerEvent| match event {
        ServerEvent::SessionCreated { session_id } => {
            debug!(?session_id, "Sitzung angelegt");
        }
        ServerEvent::SessionUpdated { session_id } => {
            debug!(?session_id, "Sitzung aktualisiert");
        }
        ServerEvent::SpeechStarted | ServerEvent::SpeechStopped | ServerEvent::Committed => {
            trace!(kind = ?event, "dienstseitiges Zwischenereignis");
        }
        ServerEvent::ResponseCreated => {
            post(&bus, Event::ServiceResponseStart);
        }
        ServerEvent::AudioDelta { audio_base64 } => match decode_audio_delta(&audio_base64, wire_format) {
            Ok(pcm_bytes) => {
                let written = pipeline.write_playback(&pcm_bytes, std::time::Duration::from_millis(200));
                if written < pcm_bytes.len() {
                    warn!("Wiedergabepuffer voll, Audio-Delta teilweise verworfen");
                }
            }
            Err(e) => warn!("Audio-Delta konnte nicht dekodiert werden: {}", e),
        },
        ServerEvent::TranscriptDelta { text } => on_transcript_delta(text),
        ServerEvent::AudioDone => post(&bus, Event::AudioDone),
        ServerEvent::ResponseDone => post(&bus, Event::ServiceResponseEnd),
        ServerEvent::Error { code, message } => {
            post(&bus, Event::ServiceError { code, message });
        }
        ServerEvent::Unknown { type_name } => {
            trace!(type_name, "unbekanntes Downlink-Ereignis ignoriert");
        }
    }
}

/// Base64 dekodieren und gemaess dem in `session.update` vereinbarten
/// Wire-Format in PCM16-Bytes wandeln (§6).
fn decode_audio_delta(audio_base64: &str, wire_format: WireFormat) -> va_protocol::ProtocolResult<Vec<u8>> {
    let raw = b64::decode(audio_base64)?;
    let pcm_bytes = match wire_format {
        WireFormat::G711Ulaw => {
            let pcm = ulaw::decode_frame(&raw);
            pcm.iter().flat_map(|s| s.to_le_bytes()).collect()
        }
        WireFormat::Pcm16 => raw,
    };
    Ok(pcm_bytes)
}

fn post(bus: &EventBus, event: Event) {
    // Aus dem Realtime-Worker-Thread: kein ISR-Kontext, darf kurz
    // blockieren, aber nicht unbegrenzt -- 50ms ist grosszuegig fuer eine
    // Warteschlange der Tiefe 20, die die Session-Machine alle 100ms leert.
    if let Err(e) = bus.post(event, std::time::Duration::from_millis(50)) {
        warn!("Ereignis konnte nicht auf den Bus gepostet werden: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_audio_delta_leeres_signal_ulaw() {
        let silence_ulaw = vec![0xFFu8; 4]; // 0xFF dekodiert zu 0 in G.711 u-law
        let encoded = b64::encode(&silence_ulaw);
        let pcm = decode_audio_delta(&encoded, WireFormat::G711Ulaw).unwrap();
        assert_eq!(pcm.len(), 8); // 4 Samples * 2 Bytes
    }

    #[test]
    fn decode_audio_delta_pcm16_reicht_bytes_unveraendert_durch() {
        let raw = vec![1u8, 2, 3, 4];
        let encoded = b64::encode(&raw);
        let pcm = decode_audio_delta(&encoded, WireFormat::Pcm16).unwrap();
        assert_eq!(pcm, raw);
    }

    #[test]
    fn decode_audio_delta_ungueltiges_base64_schlaegt_fehl() {
        let result = decode_audio_delta("!!!nicht-base64!!!", WireFormat::G711Ulaw);
        assert!(result.is_err());
    }
}
