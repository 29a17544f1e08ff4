//! va-audio – Mikrofon-Capture, Frame-DSP, VAD und Wiedergabe
//!
//! Stellt die Audio-Haelfte des Sprachassistenten bereit:
//! - Codec-I/O (C1): blockierendes Lesen/Schreiben von Mikrofon/Lautsprecher via cpal
//! - Ring-Puffer (C2): fristbehafteter Byte-Ring-Puffer zwischen Audio-Thread und Nutzer
//! - Frame-DSP (C3): Hochpassfilter, einfache Echounterdrueckung, einfache Rauschunterdrueckung
//! - Sprachaktivitaetserkennung (C4): energiebasierte 4-Zustands-Automatik
//! - Pipeline (C5): bindet C1-C4 zu einem steuerbaren Dienst zusammen

pub mod codec_io;
pub mod device;
pub mod dsp;
pub mod error;
pub mod pipeline;
pub mod ringbuf;
pub mod volume;

pub use codec_io::{AudioFormat, MicCodec, SpeakerCodec};
pub use device::{
    get_default_input, get_default_output, list_input_devices, list_output_devices, AudioDevice,
};
pub use dsp::vad::{Vad, VadConfig, VadState};
pub use dsp::AudioProcessor;
pub use error::{AudioError, AudioResult};
pub use pipeline::{AudioPipeline, PipelineConfig};
pub use ringbuf::RingBuffer;
pub use volume::VolumeController;
