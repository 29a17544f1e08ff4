//! Energiebasierte Sprachaktivitaetserkennung (C4)
//!
//! Eigene State-Machine mit vier Zustaenden und Hysterese, exakt nach dem
//! in der Spezifikation fixierten Uebergangsschema. Die Zustands- und
//! Energie-Berechnungs-Struktur (RMS in Integer-Arithmetik) ist vom
//! Aufbau des Lehrer-Moduls `crates/audio/src/dsp/vad.rs` (f32,
//! kontinuierliches Hangover-Modell) inspiriert; die eigentliche Semantik
//! ist vollstaendig neu, da der Lehrer keinen 4-Zustands-Automaten mit
//! einmaligen Kantenereignissen kennt.
//!
//! Anders als die uebrigen C3-Stufen implementiert der VAD nicht
//! `AudioProcessor`: er veraendert die Samples nicht, sondern liefert pro
//! Frame einen Zustandsuebergang plus Pegelschaetzung zurueck, die der
//! Aufrufer synchron aus dem Verarbeitungskontext beobachtet.

/// Sprachaktivitaetszustand. `VoiceStart`/`VoiceEnd` sind Einzelframe-
/// Kantenzustaende, die genau einmal beobachtet werden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VadState {
    #[default]
    Silence,
    VoiceStart,
    Voice,
    VoiceEnd,
}

#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// Energieschwelle auf RMS-Basis von int16-Samples (Default 100).
    pub energy_threshold: i64,
    /// Stille-Dauer bis Sprachende (Default 500 ms).
    pub silence_duration_ms: u64,
    /// Aggressivitaetsmodus 0..3; skaliert die effektive Schwelle nach
    /// oben (hoehere Stufe = weniger falsch-positive VoiceStart-Kanten).
    /// Entscheidung, da die Spezifikation den Modus nennt, aber seine
    /// Wirkung nicht festlegt — siehe Offene-Fragen-Eintrag in DESIGN.md.
    pub aggressiveness: u8,
    /// Framedauer in ms, zur Umrechnung von `silence_duration_ms` in
    /// Frame-Anzahl (Standard: 60 ms, siehe `FRAME_MS`).
    pub frame_ms: u64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 100,
            silence_duration_ms: 500,
            aggressiveness: 0,
            frame_ms: 60,
        }
    }
}

impl VadConfig {
    fn effective_threshold(&self) -> i64 {
        self.energy_threshold * (1 + i64::from(self.aggressiveness.min(3)))
    }
}

pub struct Vad {
    config: VadConfig,
    state: VadState,
    /// Anzahl aufeinanderfolgender leiser Frames seit dem ersten Dip
    /// waehrend `Voice` (None solange noch keiner aufgetreten ist).
    silence_frames: Option<u64>,
    last_level: u8,
}

impl Vad {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            state: VadState::Silence,
            silence_frames: None,
            last_level: 0,
        }
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    pub fn level(&self) -> u8 {
        self.last_level
    }

    pub fn set_config(&mut self, config: VadConfig) {
        self.config = config;
    }

    pub fn reset(&mut self) {
        self.state = VadState::Silence;
        self.silence_frames = None;
        self.last_level = 0;
    }

    /// RMS-Energie eines Frames in `int64`, wie in §4.4 gefordert
    /// (`sqrt(Σ x[i]² / N)`), um Ueberlauf bei der Summation zu vermeiden.
    fn rms_energy(samples: &[i16]) -> i64 {
        if samples.is_empty() {
            return 0;
        }
        let sum_sq: i64 = samples.iter().map(|&s| i64::from(s) * i64::from(s)).sum();
        let mean = sum_sq / samples.len() as i64;
        (mean as f64).sqrt() as i64
    }

    /// Berechnet nur den Pegel 0..100, ohne die Zustandsmaschine zu
    /// beruehren -- fuer den Fall, dass VAD per Konfiguration deaktiviert
    /// ist und trotzdem ein Pegel fuer die UI gebraucht wird.
    pub fn level_only(samples: &[i16]) -> u8 {
        let energy = Self::rms_energy(samples);
        (energy / 100).min(100).max(0) as u8
    }

    /// Verarbeitet einen Frame und liefert den (moeglicherweise neuen)
    /// Zustand zusammen mit dem Pegel 0..100.
    pub fn process_frame(&mut self, samples: &[i16]) -> (VadState, u8) {
        let energy = Self::rms_energy(samples);
        self.last_level = (energy / 100).min(100).max(0) as u8;
        let thresh = self.config.effective_threshold();
        let above = energy > thresh;

        self.state = match self.state {
            VadState::Silence => {
                if above {
                    self.silence_frames = None;
                    VadState::VoiceStart
                } else {
                    VadState::Silence
                }
            }
            VadState::VoiceStart => VadState::Voice, // immer genau einen Frame nach VoiceStart
            VadState::Voice => {
                if above {
                    self.silence_frames = None;
                    VadState::Voice
                } else {
                    let frames = self.silence_frames.unwrap_or(0) + 1;
                    self.silence_frames = Some(frames);
                    let elapsed_ms = frames * self.config.frame_ms;
                    if elapsed_ms >= self.config.silence_duration_ms {
                        VadState::VoiceEnd
                    } else {
                        VadState::Voice
                    }
                }
            }
            VadState::VoiceEnd => {
                self.silence_frames = None;
                VadState::Silence
            }
        };

        (self.state, self.last_level)
    }
}
