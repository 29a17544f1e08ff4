//! Einfache akustische Echounterdrueckung (C3, AEC)
//!
//! Eine bewusst simple lineare Naeherung (siehe Non-Goal "high-fidelity
//! DSP" der Spezifikation), keine adaptive Filterung: `out[i] =
//! clip_i16(mic[i] - gain*ref[i])` mit `gain = (50 + 20*mode) / 100`.
//! Ohne verfuegbares Referenzframe wird die Stufe fuer diesen Frame
//! uebersprungen. Die Referenz wird unter einem kurzen Lock kopiert, nie
//! als Zeiger gehalten — Struktur nach dem Vorbild von
//! `crates/audio/src/dsp/echo_cancel.rs` im Lehrer-Repo (Referenzpuffer
//! unter Lock), die dortige adaptive Verzoegerungslogik entfaellt, da die
//! Spezifikation nur Gain/Modus kennt.

use parking_lot::Mutex;

use super::{clip_i16, AudioProcessor};

/// AEC-Modus 0..2, bestimmt den Daempfungsgrad der Referenz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AecMode(pub u8);

impl AecMode {
    /// `gain = (50 + 20*mode) / 100`, als Festkommawert in Promille
    /// gerechnet um reine Integer-Arithmetik zu erlauben.
    fn gain_per_mille(&self) -> i64 {
        (50 + 20 * i64::from(self.0.min(2))) * 10
    }
}

pub struct SimpleAec {
    mode: AecMode,
    reference: Mutex<Option<Vec<i16>>>,
    enabled: bool,
}

impl SimpleAec {
    pub fn new(mode: u8) -> Self {
        Self {
            mode: AecMode(mode.min(2)),
            reference: Mutex::new(None),
            enabled: true,
        }
    }

    /// Liefert ein Referenzframe gleicher Laenge, das fuer das naechste
    /// `process` verwendet wird. Eine Kopie wird gespeichert, kein Zeiger.
    pub fn feed_reference(&self, reference: &[i16]) {
        *self.reference.lock() = Some(reference.to_vec());
    }

    pub fn set_mode(&mut self, mode: u8) {
        self.mode = AecMode(mode.min(2));
    }
}

impl AudioProcessor for SimpleAec {
    fn process(&mut self, samples: &mut [i16]) {
        if !self.enabled {
            return;
        }
        let reference = self.reference.lock().take();
        let reference = match reference {
            Some(r) if r.len() == samples.len() => r,
            _ => return, // kein (passendes) Referenzframe: AEC wird fuer diesen Frame uebersprungen
        };

        let gain = self.mode.gain_per_mille();
        for (mic, refr) in samples.iter_mut().zip(reference.iter()) {
            let echo = (gain * i64::from(*refr)) / 1000;
            *mic = clip_i16(i64::from(*mic) - echo);
        }
    }

    fn reset(&mut self) {
        *self.reference.lock() = None;
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
    fn ohne_referenz_unveraendert() {
        let mut aec = SimpleAec::new(1);
        let original = [1000i16, -1000, 500];
        let mut samples = original;
        aec.process(&mut samples);
        assert_eq!(samples, original);
    }

    #[test]
    fn subtrahiert_referenz_mit_gain() {
        let mut aec = SimpleAec::new(0); // gain = 0.5
        aec.feed_reference(&[1000, 1000]);
        let mut samples = [2000i16, 2000];
        aec.process(&mut samples);
        assert_eq!(samples, [1500, 1500]);
    }

    #[test]
    fn hoeherer_modus_staerkere_daempfung() {
        let mut aec_low = SimpleAec::new(0);
        let mut aec_high = SimpleAec::new(2);
        aec_low.feed_reference(&[1000]);
        aec_high.feed_reference(&[1000]);
        let mut a = [2000i16];
        let mut b = [2000i16];
        aec_low.process(&mut a);
        aec_high.process(&mut b);
        assert!(b[0] < a[0]);
    }

    #[test]
    fn referenz_laenge_mismatch_wird_uebersprungen() {
        let mut aec = SimpleAec::new(1);
        aec.feed_reference(&[1, 2, 3]);
        let mut samples = [100i16, 200];
        aec.process(&mut samples);
        assert_eq!(samples, [100, 200]);
    }

    #[test]
    fn clipping_an_den_grenzen() {
        let mut aec = SimpleAec::new(2);
        aec.feed_reference(&[-32768]);
        let mut samples = [i16::MAX];
        aec.process(&mut samples); // darf nicht ueberlaufen/panicken
    }
}
