//! Codec I/O (C1)
//!
//! Stellt eine einheitliche blockierende Lese-/Schreib-Schnittstelle zum
//! Mikrofon und Lautsprecher bereit. Das Oeffnen legt das Geraet im
//! konfigurierten Format fest; das Schliessen gibt es frei. Ein einzelnes
//! `read` liefert genau `FRAME_BYTES` PCM16 (liefert das Geraet mehr
//! Kanaele, wird nur Kanal 0 behalten — Stereo-Downmix durch Auswahl).
//!
//! cpal-Formatverhandlung und Callback-Struktur folgen
//! `crates/audio/src/capture.rs`/`src/playback.rs` im Lehrer-Repo: dort
//! landen Samples in einem `ringbuf`-Producer/Consumer-Paar; hier landen
//! sie stattdessen im selbstgebauten, fristbehafteten `RingBuffer` aus
//! `ringbuf.rs`, weil C1/C2 eine blockierende Lese-/Schreiboperation mit
//! Timeout verlangen statt der lock-freien Semantik des Lehrer-Crates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use tracing::{debug, warn};

use crate::error::{AudioError, AudioResult};
use crate::ringbuf::RingBuffer;

/// Feste Prozessweite Audioformat-Konstante (§3 Datenmodell): Samplerate,
/// stets 16 Bit, stets 1 Kanal auf dem Uplink-Pfad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const FRAME_MS: u32 = 60;

    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as usize) * (Self::FRAME_MS as usize) / 1000
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_samples() * 2
    }
}

/// Blockierender Mikrofon-Codec. Oeffnen/Schliessen ist exklusiv — ein
/// zweites `open` ohne vorheriges `close` schlaegt fehl.
pub struct MicCodec {
    stream: Option<Stream>,
    buffer: Arc<RingBuffer>,
    format: AudioFormat,
    open: AtomicBool,
}

impl MicCodec {
    pub fn new(format: AudioFormat, buffer: Arc<RingBuffer>) -> Self {
        Self {
            stream: None,
            buffer,
            format,
            open: AtomicBool::new(false),
        }
    }

    /// Oeffnet das Mikrofon im konfigurierten Format und startet den
    /// cpal-Capture-Stream. Der Callback macht nur minimale Arbeit: Bytes
    /// (mit optionalem Downmix auf Kanal 0) in den Ring-Buffer schreiben.
    pub fn open(&mut self, device: &cpal::Device, device_channels: u16) -> AudioResult<()> {
        if self.open.swap(true, Ordering::SeqCst) {
            return Err(AudioError::AlreadyRunning);
        }

        let config = StreamConfig {
            channels: device_channels,
            sample_rate: cpal::SampleRate(self.format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer = Arc::clone(&self.buffer);
        let channels = device_channels as usize;

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[i16], _info: &cpal::InputCallbackInfo| {
                    let mono: Vec<u8> = if channels <= 1 {
                        data.iter().flat_map(|s| s.to_le_bytes()).collect()
                    } else {
                        data.chunks(channels)
                            .flat_map(|frame| frame[0].to_le_bytes())
                            .collect()
                    };
                    let written = buffer.push(&mono, Duration::from_millis(0));
                    if written < mono.len() {
                        warn!("Capture-Ring-Buffer voll, Samples verworfen");
                    }
                },
                move |err| warn!("cpal Input-Stream-Fehler: {}", err),
                None,
            )
            .map_err(|e| AudioError::OpenFailed(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::OpenFailed(e.to_string()))?;

        self.stream = Some(stream);
        debug!("MicCodec geoeffnet: {} Hz", self.format.sample_rate);
        Ok(())
    }

    /// Liest genau `FRAME_BYTES` PCM16, blockiert bis zu `timeout`.
    pub fn read(&self, timeout: Duration) -> AudioResult<Vec<u8>> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(AudioError::NotInitialized);
        }
        let bytes = self.buffer.pop_up_to(self.format.frame_bytes(), timeout);
        Ok(bytes)
    }

    pub fn close(&mut self) {
        self.stream = None;
        self.open.store(false, Ordering::SeqCst);
        self.buffer.reset();
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Blockierender Lautsprecher-Codec.
pub struct SpeakerCodec {
    stream: Option<Stream>,
    buffer: Arc<RingBuffer>,
    format: AudioFormat,
    open: AtomicBool,
}

impl SpeakerCodec {
    pub fn new(format: AudioFormat, buffer: Arc<RingBuffer>) -> Self {
        Self {
            stream: None,
            buffer,
            format,
            open: AtomicBool::new(false),
        }
    }

    /// Oeffnet den Lautsprecher. Bei leerem Puffer wird Stille ausgegeben,
    /// damit der DAC geprimt bleibt (siehe `pipeline.rs`-Playertask).
    pub fn open(&mut self, device: &cpal::Device, device_channels: u16, sample_format: SampleFormat) -> AudioResult<()> {
        if self.open.swap(true, Ordering::SeqCst) {
            return Err(AudioError::AlreadyRunning);
        }

        let config = StreamConfig {
            channels: device_channels,
            sample_rate: cpal::SampleRate(self.format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer = Arc::clone(&self.buffer);
        let channels = device_channels as usize;

        let stream = match sample_format {
            SampleFormat::I16 => device
                .build_output_stream(
                    &config,
                    move |data: &mut [i16], _info: &cpal::OutputCallbackInfo| {
                        fill_output(&buffer, data, channels);
                    },
                    move |err| warn!("cpal Output-Stream-Fehler: {}", err),
                    None,
                )
                .map_err(|e| AudioError::OpenFailed(e.to_string()))?,
            other => {
                return Err(AudioError::OpenFailed(format!(
                    "nicht unterstuetztes Sample-Format: {other:?}"
                )))
            }
        };

        stream
            .play()
            .map_err(|e| AudioError::OpenFailed(e.to_string()))?;

        self.stream = Some(stream);
        debug!("SpeakerCodec geoeffnet: {} Hz", self.format.sample_rate);
        Ok(())
    }

    /// Schreibt beliebig viele Bytes (Vielfaches der Sample-Groesse) in
    /// den Playback-Ring-Buffer.
    pub fn write(&self, bytes: &[u8], timeout: Duration) -> AudioResult<usize> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(AudioError::NotInitialized);
        }
        Ok(self.buffer.push(bytes, timeout))
    }

    pub fn close(&mut self) {
        self.stream = None;
        self.open.store(false, Ordering::SeqCst);
        self.buffer.reset();
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

fn fill_output(buffer: &RingBuffer, data: &mut [i16], channels: usize) {
    let mono_bytes_needed = (data.len() / channels.max(1)) * 2;
    let bytes = buffer.pop_up_to(mono_bytes_needed, Duration::from_millis(0));
    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();

    for (i, out_frame) in data.chunks_mut(channels.max(1)).enumerate() {
        let s = samples.get(i).copied().unwrap_or(0);
        for out in out_frame.iter_mut() {
            *out = s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_groessen_berechnung() {
        let fmt = AudioFormat {
            sample_rate: 8000,
            channels: 1,
        };
        assert_eq!(fmt.frame_samples(), 480);
        assert_eq!(fmt.frame_bytes(), 960);
    }

    #[test]
    fn frame_groessen_16khz() {
        let fmt = AudioFormat {
            sample_rate: 16000,
            channels: 1,
        };
        assert_eq!(fmt.frame_samples(), 960);
        assert_eq!(fmt.frame_bytes(), 1920);
    }

    #[test]
    fn fill_output_liefert_stille_bei_leerem_puffer() {
        let rb = RingBuffer::new(1024);
        let mut out = [123i16; 8];
        fill_output(&rb, &mut out, 1);
        assert_eq!(out, [0i16; 8]);
    }

    #[test]
    fn fill_output_dupliziert_auf_kanaele() {
        let rb = RingBuffer::new(1024);
        rb.push(&100i16.to_le_bytes(), Duration::from_millis(10));
        rb.push(&200i16.to_le_bytes(), Duration::from_millis(10));
        let mut out = [0i16; 4]; // 2 Frames x 2 Kanaele
        fill_output(&rb, &mut out, 2);
        assert_eq!(out, [100, 100, 200, 200]);
    }
}
