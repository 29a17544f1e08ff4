//! Anwendungs-Konfiguration (§6 "Configuration recognized at init")
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Prozess auch ohne Konfigurations-
//! datei lauffaehig ist -- Fallback-Struktur nach dem Vorbild von
//! `ServerConfig::laden` im Lehrer-Repo.

use serde::{Deserialize, Serialize};

use va_protocol::message::Backend;

/// Vollstaendige Anwendungskonfiguration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct AppConfig {
    pub realtime: RealtimeEinstellungen,
    pub audio: AudioEinstellungen,
    pub logging: LoggingEinstellungen,
}

/// Verbindungs- und Protokoll-Einstellungen des Realtime-Clients (§4.7/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeEinstellungen {
    /// `"manual"` oder `"auto"` -- bestimmt URL-Schema, Commit-Nachricht
    /// und ob nach dem Commit automatisch `response.create` folgt.
    pub backend: String,
    /// Ziel-Endpunkt (vollstaendige `wss://`-URL inklusive Query-Parametern).
    pub endpoint: String,
    /// API-Schluessel oder Bearer-Token, je nach Backend.
    pub api_key: Option<String>,
    /// Deployment-/Bot-Bezeichner (Backend-abhaengig optional).
    pub deployment: Option<String>,
    pub voice: String,
    pub sample_rate: u32,
    /// `"pcm16"` oder `"g711_ulaw"`.
    pub wire_format: String,
    pub reconnect_delay_ms: u64,
    pub batch_frames: usize,
    pub batch_timeout_ms: u64,
    pub send_paced_delay_ms: u64,
}

impl Default for RealtimeEinstellungen {
    fn default() -> Self {
        Self {
            backend: "auto".into(),
            endpoint: String::new(),
            api_key: None,
            deployment: None,
            voice: "default".into(),
            sample_rate: 8000,
            wire_format: "g711_ulaw".into(),
            reconnect_delay_ms: 5000,
            batch_frames: 2,
            batch_timeout_ms: 100,
            send_paced_delay_ms: 70,
        }
    }
}

impl RealtimeEinstellungen {
    pub fn backend(&self) -> Backend {
        match self.backend.as_str() {
            "manual" => Backend::Manual,
            _ => Backend::Auto,
        }
    }
}

/// Audio-Pipeline-Einstellungen (§4.5/§6 Unterstruktur "audio").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    pub sample_rate: u32,
    pub channels: u16,
    pub vad: bool,
    /// Aggressivitaet der Sprachaktivitaetserkennung 0..3.
    pub vad_mode: u8,
    pub ns: bool,
    /// Stufe der Rauschunterdrueckung 0..3.
    pub ns_level: u8,
    pub aec: bool,
    /// Modus der Echounterdrueckung 0..2.
    pub aec_mode: u8,
    pub aec_reference_from_playback: bool,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            vad: true,
            vad_mode: 0,
            ns: true,
            ns_level: 1,
            aec: true,
            aec_mode: 1,
            aec_reference_from_playback: false,
            input_device: None,
            output_device: None,
        }
    }
}

/// Logging-Einstellungen, im selben Schema wie im Lehrer-Repo
/// (`LoggingEinstellungen` in `crates/.../config.rs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Format: "json" oder "text".
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl AppConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei. Gibt die
    /// Standardkonfiguration zurueck, wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.realtime.sample_rate, 8000);
        assert_eq!(cfg.audio.sample_rate, 16000);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn backend_aus_string() {
        let mut cfg = RealtimeEinstellungen::default();
        cfg.backend = "manual".into();
        assert_eq!(cfg.backend(), Backend::Manual);
        cfg.backend = "auto".into();
        assert_eq!(cfg.backend(), Backend::Auto);
        cfg.backend = "unbekannt".into();
        assert_eq!(cfg.backend(), Backend::Auto, "unbekannte Werte fallen auf auto zurueck");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [realtime]
            backend = "manual"
            endpoint = "wss://example.invalid/session"
            voice = "alloy"

            [audio]
            sample_rate = 8000
        "#;
        let cfg: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.realtime.backend, "manual");
        assert_eq!(cfg.realtime.voice, "alloy");
        assert_eq!(cfg.audio.sample_rate, 8000);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.audio.channels, 1);
    }
}
