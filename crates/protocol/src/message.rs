//! Realtime-Session-Protokoll (C6)
//!
//! Baut die Uplink-JSON-Nachrichten des Clients und parst die
//! Downlink-Ereignisse des Dienstes. Jede Nachricht ist ein kleines JSON-
//! Objekt mit einem Top-Level `"type"` (Uplink) bzw. toleranter
//! `"type"`/`"event_type"` (Downlink); Audio-Payloads reisen als
//! Base64-codierte Bytes in einem Geschwister-Feld.
//!
//! Downlink-Parsing ist absichtlich tolerant gegenueber zwei Back-Ends
//! (siehe Designnotiz "Dual-Backend-Parsing"): ein einziges `ServerEvent`
//! wird aus beiden Nachrichtenformen rekonstruiert.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ProtocolError, ProtocolResult};

/// Wire-Format eines Audiokanals, wie es in `session.update` verhandelt wird.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    Pcm16,
    G711Ulaw,
}

impl WireFormat {
    fn as_format_str(&self) -> &'static str {
        match self {
            WireFormat::Pcm16 => "pcm16",
            WireFormat::G711Ulaw => "g711_ulaw",
        }
    }
}

/// Audioformat-Deskriptor, wie ihn `session.update` fuer Ein- und Ausgabe
/// traegt: `{ "type":"raw", "format":"g711_ulaw", "sample_rate":8000, "channels":1 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormatDescriptor {
    #[serde(rename = "type")]
    pub kind: AudioFormatKind,
    pub format: WireFormat,
    pub sample_rate: u32,
    pub channels: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormatKind {
    Raw,
}

impl AudioFormatDescriptor {
    pub fn new(format: WireFormat, sample_rate: u32, channels: u8) -> Self {
        Self {
            kind: AudioFormatKind::Raw,
            format,
            sample_rate,
            channels,
        }
    }
}

/// Welche der beiden im Quellsystem vorgefundenen Backend-Varianten
/// angesprochen wird (siehe Designnotiz "Dual-Backend-Parsing"). Bestimmt
/// nur, ob `commit` oder `complete` gesendet wird und ob der Client selbst
/// `response.create` ausloesen muss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Client sendet `commit` und danach explizit `response.create`.
    Manual,
    /// Client sendet `complete`; der Dienst triggert die Antwort selbst.
    Auto,
}

/// Konfiguration fuer `session.update`.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub bot_id: Option<String>,
    pub user_id: Option<String>,
    pub voice: Option<String>,
    pub input_audio_format: AudioFormatDescriptor,
    pub output_audio_format: AudioFormatDescriptor,
}

/// Baut die Uplink-Nachrichten (C6: "Messages the client builds").
pub struct MessageBuilder;

impl MessageBuilder {
    /// `{"type":"session.update","session":{...}}`. Es gibt bewusst kein
    /// `turn_detection`-Feld — der Client treibt commit/response manuell.
    pub fn session_update(cfg: &SessionUpdate) -> String {
        let mut session = json!({
            "input_audio_format": cfg.input_audio_format,
            "output_audio_format": cfg.output_audio_format,
        });
        let obj = session.as_object_mut().expect("session ist ein Objekt");
        if let Some(bot_id) = &cfg.bot_id {
            obj.insert("bot_id".into(), json!(bot_id));
        }
        if let Some(user_id) = &cfg.user_id {
            obj.insert("user_id".into(), json!(user_id));
        }
        if let Some(voice) = &cfg.voice {
            obj.insert("voice".into(), json!(voice));
        }
        json!({"type": "session.update", "session": session}).to_string()
    }

    /// `{"type":"input_audio_buffer.append","audio":"<base64>"}`
    pub fn audio_append(audio_base64: &str) -> String {
        json!({"type": "input_audio_buffer.append", "audio": audio_base64}).to_string()
    }

    /// `commit` (manual) oder `complete` (auto) — backend-spezifisch gewaehlt.
    pub fn audio_commit(backend: Backend) -> String {
        match backend {
            Backend::Manual => json!({"type": "input_audio_buffer.commit"}).to_string(),
            Backend::Auto => json!({"type": "input_audio_buffer.complete"}).to_string(),
        }
    }

    pub fn response_create() -> String {
        json!({"type": "response.create"}).to_string()
    }

    pub fn response_cancel() -> String {
        json!({"type": "response.cancel"}).to_string()
    }
}

/// Alle vom Client erkannten Downlink-Ereignisse ("Messages the client
/// parses"), auf eine einzige Taxonomie reduziert (siehe Designnotiz
/// "Dual-Backend-Parsing").
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    SessionCreated { session_id: Option<String> },
    SessionUpdated { session_id: Option<String> },
    SpeechStarted,
    SpeechStopped,
    Committed,
    ResponseCreated,
    /// Base64-codierte Audio-Deltas; der Aufrufer dekodiert mit `ulaw`/PCM16.
    AudioDelta { audio_base64: String },
    TranscriptDelta { text: String },
    AudioDone,
    ResponseDone,
    Error { code: i64, message: String },
    /// Ein erkannter, aber hier nicht modellierter Ereignistyp.
    Unknown { type_name: String },
}

/// Liest ein Top-Level-Feld, das entweder `"type"` oder das legacy
/// `"event_type"` heisst.
fn type_field(value: &Value) -> Option<&str> {
    value
        .get("type")
        .or_else(|| value.get("event_type"))
        .and_then(Value::as_str)
}

/// Liest ein Feld `key` entweder auf oberster Ebene oder unter `"data"`.
fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value
        .get(key)
        .or_else(|| value.get("data").and_then(|d| d.get(key)))
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    field(value, key).and_then(Value::as_str).map(str::to_owned)
}

/// Parst einen rohen Downlink-Text in ein `ServerEvent`. Toleriert sowohl
/// `"type"`/`"event_type"` als auch flache und `"data":{...}`-Formen (S6).
pub fn parse_server_event(text: &str) -> ProtocolResult<ServerEvent> {
    let value: Value = serde_json::from_str(text).map_err(|e| ProtocolError::ParseFailed(e.to_string()))?;

    let type_name = type_field(&value)
        .ok_or_else(|| ProtocolError::FieldMissing("type".into()))?
        .to_string();

    let event = match type_name.as_str() {
        "session.created" => ServerEvent::SessionCreated {
            session_id: str_field(&value, "session_id").or_else(|| {
                value
                    .get("session")
                    .and_then(|s| s.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            }),
        },
        "session.updated" => ServerEvent::SessionUpdated {
            session_id: str_field(&value, "session_id").or_else(|| {
                value
                    .get("session")
                    .and_then(|s| s.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            }),
        },
        "input_audio_buffer.speech_started" => ServerEvent::SpeechStarted,
        "input_audio_buffer.speech_stopped" => ServerEvent::SpeechStopped,
        "input_audio_buffer.committed" => ServerEvent::Committed,
        "response.created" => ServerEvent::ResponseCreated,
        "response.audio.delta" => {
            let audio = str_field(&value, "delta")
                .or_else(|| str_field(&value, "audio"))
                .ok_or_else(|| ProtocolError::FieldMissing("delta/audio".into()))?;
            ServerEvent::AudioDelta { audio_base64: audio }
        }
        "response.audio_transcript.delta" => {
            let text = str_field(&value, "delta")
                .or_else(|| str_field(&value, "transcript"))
                .ok_or_else(|| ProtocolError::FieldMissing("delta/transcript".into()))?;
            ServerEvent::TranscriptDelta { text }
        }
        "response.audio.done" => ServerEvent::AudioDone,
        "response.done" => ServerEvent::ResponseDone,
        "error" => {
            let code = field(&value, "code")
                .and_then(Value::as_i64)
                .ok_or_else(|| ProtocolError::FieldMissing("code".into()))?;
            let message = str_field(&value, "message")
                .or_else(|| str_field(&value, "msg"))
                .ok_or_else(|| ProtocolError::FieldMissing("message/msg".into()))?;
            ServerEvent::Error { code, message }
        }
        other => ServerEvent::Unknown {
            type_name: other.to_string(),
        },
    };

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_update_enthaelt_keine_turn_detection() {
        let msg = MessageBuilder::session_update(&SessionUpdate {
            bot_id: None,
            user_id: None,
            voice: Some("alloy".into()),
            input_audio_format: AudioFormatDescriptor::new(WireFormat::G711Ulaw, 8000, 1),
            output_audio_format: AudioFormatDescriptor::new(WireFormat::G711Ulaw, 8000, 1),
        });
        assert!(!msg.contains("turn_detection"));
        assert!(msg.contains("\"type\":\"session.update\""));
        assert!(msg.contains("g711_ulaw"));
        let back: Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(back["session"]["voice"], "alloy");
    }

    #[test]
    fn audio_append_huellt_base64() {
        let msg = MessageBuilder::audio_append("QUJD");
        let v: Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(v["type"], "input_audio_buffer.append");
        assert_eq!(v["audio"], "QUJD");
    }

    #[test]
    fn commit_backend_spezifisch() {
        assert!(MessageBuilder::audio_commit(Backend::Manual).contains("commit"));
        assert!(MessageBuilder::audio_commit(Backend::Auto).contains("complete"));
    }

    #[test]
    fn parser_toleriert_event_type_und_data_shape() {
        // S6
        let a = parse_server_event(r#"{"event_type":"error","code":4000,"msg":"x"}"#).unwrap();
        let b = parse_server_event(r#"{"type":"error","data":{"code":4000,"message":"x"}}"#).unwrap();
        assert_eq!(
            a,
            ServerEvent::Error {
                code: 4000,
                message: "x".into()
            }
        );
        assert_eq!(a, b);
    }

    #[test]
    fn parser_audio_delta_beide_feldnamen() {
        let a = parse_server_event(r#"{"type":"response.audio.delta","delta":"QQ=="}"#).unwrap();
        let b = parse_server_event(r#"{"type":"response.audio.delta","audio":"QQ=="}"#).unwrap();
        assert_eq!(
            a,
            ServerEvent::AudioDelta {
                audio_base64: "QQ==".into()
            }
        );
        assert_eq!(a, b);
    }

    #[test]
    fn parser_session_created_mit_id() {
        let ev = parse_server_event(r#"{"type":"session.created","session_id":"sess_1"}"#).unwrap();
        assert_eq!(
            ev,
            ServerEvent::SessionCreated {
                session_id: Some("sess_1".into())
            }
        );
    }

    #[test]
    fn parser_unbekannter_typ() {
        let ev = parse_server_event(r#"{"type":"future.event"}"#).unwrap();
        assert_eq!(
            ev,
            ServerEvent::Unknown {
                type_name: "future.event".into()
            }
        );
    }

    #[test]
    fn parser_fehlt_type_feld() {
        let err = parse_server_event(r#"{"foo":"bar"}"#);
        assert!(matches!(err, Err(ProtocolError::FieldMissing(_))));
    }
}
