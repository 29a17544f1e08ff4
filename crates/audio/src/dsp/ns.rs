//! Einfache Rauschunterdrueckung (C3, NS)
//!
//! Keine Spektralsubtraktion — eine bewusste Daempfung leiser Samples:
//! Schwelle `t = 500 + 200*level`, `level ∈ {0,1,2,3}`; fuer jedes Sample
//! gilt: `|sample| < t ⇒ sample /= 4`. Struktur (Stufen-Enum,
//! `AudioProcessor`-Anbindung) nach dem Vorbild von
//! `crates/audio/src/dsp/noise_suppression.rs` im Lehrer-Repo; die dortige
//! spektrale-Subtraktions-Naeherung entfaellt zugunsten der in der
//! Spezifikation fixierten, einfacheren Regel.

use super::AudioProcessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NsLevel(pub u8);

impl NsLevel {
    fn threshold(&self) -> i32 {
        500 + 200 * i32::from(self.0.min(3))
    }
}

pub struct NoiseSuppressor {
    level: NsLevel,
    enabled: bool,
}

impl NoiseSuppressor {
    pub fn new(level: u8) -> Self {
        Self {
            level: NsLevel(level.min(3)),
            enabled: true,
        }
    }

    pub fn set_level(&mut self, level: u8) {
        self.level = NsLevel(level.min(3));
    }
}

impl AudioProcessor for NoiseSuppressor {
    fn process(&mut self, samples: &mut [i16]) {
        if !self.enabled {
            return;
        }
        let t = self.level.threshold();
        for sample in samples.iter_mut() {
            if i32::from(*sample).abs() < t {
                *sample /= 4;
            }
        }
    }

    fn reset(&mut self) {
        // Zustandslos: nichts zurueckzusetzen.
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daempft_leise_samples() {
        let mut ns = NoiseSuppressor::new(0); // t = 500
        let mut samples = [100i16, 499, -499];
        ns.process(&mut samples);
        assert_eq!(samples, [25, 124, -124]);
    }

    #[test]
    fn laesst_laute_samples_unveraendert() {
        let mut ns = NoiseSuppressor::new(0); // t = 500
        let mut samples = [500i16, 1000, -2000];
        ns.process(&mut samples);
        assert_eq!(samples, [500, 1000, -2000]);
    }

    #[test]
    fn hoehere_stufe_groessere_schwelle() {
        assert!(NsLevel(3).threshold() > NsLevel(0).threshold());
        assert_eq!(NsLevel(3).threshold(), 1100);
    }

    #[test]
    fn deaktiviert_unveraendert() {
        let mut ns = NoiseSuppressor::new(2);
        ns.set_enabled(false);
        let original = [10i16, 20, 30];
        let mut samples = original;
        ns.process(&mut samples);
        assert_eq!(samples, original);
    }
}
