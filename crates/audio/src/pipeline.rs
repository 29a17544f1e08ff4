//! Audio-Processing-Pipeline (C5)
//!
//! Bindet Codec I/O (C1), Ring-Puffer (C2), DSP-Kette (C3) und VAD (C4) zu
//! einem einzigen Dienst zusammen, der den Hintergrund-Thread fuer
//! Aufnahme und Wiedergabe betreibt. Die Kommandostruktur (ein dedizierter
//! Thread, gesteuert ueber `crossbeam_channel`, Zustand hinter
//! `parking_lot::RwLock`) folgt `crates/audio/src/engine.rs` im
//! Lehrer-Repo; PTT-spezifische Kommandos entfallen, weil VAD allein die
//! Sprachaktivitaet steuert.
//!
//! Zwei Ring-Buffer pro Richtung: ein hardware-seitiger (gespeist von /
//! gelesen durch den cpal-Callback in `codec_io.rs`) und ein
//! anwendungsseitiger (verarbeitete Capture-Frames bzw. noch nicht
//! lautstaerke-angepasste Wiedergabe-Frames). Das haelt den cpal-Callback
//! winzig (reines Kopieren) waehrend HPF/AEC/NS/VAD und Lautstaerke auf
//! dem Pipeline-Thread laufen.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::DeviceTrait;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::codec_io::{AudioFormat, MicCodec, SpeakerCodec};
use crate::device;
use crate::dsp::aec::SimpleAec;
use crate::dsp::hpf::HighPassFilter;
use crate::dsp::ns::NoiseSuppressor;
use crate::dsp::vad::{Vad, VadConfig, VadState};
use crate::dsp::AudioProcessor;
use crate::error::{AudioError, AudioResult};
use crate::ringbuf::RingBuffer;
use crate::volume::VolumeController;

/// Signatur des Delivery-Callbacks aus §4.5: verarbeitete Frame-Bytes,
/// der aus diesem Frame resultierende VAD-Zustand und der Pegel 0..100.
pub type DeliveryCallback = dyn Fn(&[u8], VadState, u8) + Send + Sync;

/// Konfiguration der Pipeline (§6 AppConfig-Unterstruktur "audio").
#[derive(Clone)]
pub struct PipelineConfig {
    pub format: AudioFormat,
    pub vad: VadConfig,
    pub aec_mode: u8,
    pub ns_level: u8,
    /// Ob die AEC-Stufe ueberhaupt angewendet wird (§3 `{aec, ns, vad}`).
    pub aec: bool,
    /// Ob die Rauschunterdrueckung ueberhaupt angewendet wird.
    pub ns: bool,
    /// Ob die Sprachaktivitaetserkennung ueberhaupt angewendet wird; bei
    /// `false` bleibt der Zustand immer `Silence` und der Pegel wird ohne
    /// die Zustandsmaschine berechnet.
    pub vad_enabled: bool,
    /// Ob der Player dem AEC sein Ausgangssignal als Referenz zufuehrt.
    /// Entscheidung siehe DESIGN.md (Offene Frage 1).
    pub aec_reference_from_playback: bool,
    pub capture_buffer_frames: usize,
    pub playback_buffer_frames: usize,
    /// `None` waehlt das Standardgeraet des Hosts (siehe `device.rs`).
    pub input_device_name: Option<String>,
    pub output_device_name: Option<String>,
    /// Delivery-Callback (§4.5): wird pro aufgenommenem, verarbeitetem
    /// Frame synchron aus dem Pipeline-Thread aufgerufen.
    pub on_delivery: Option<Arc<DeliveryCallback>>,
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("format", &self.format)
            .field("vad", &self.vad)
            .field("aec_mode", &self.aec_mode)
            .field("ns_level", &self.ns_level)
            .field("aec", &self.aec)
            .field("ns", &self.ns)
            .field("vad_enabled", &self.vad_enabled)
            .field("aec_reference_from_playback", &self.aec_reference_from_playback)
            .field("capture_buffer_frames", &self.capture_buffer_frames)
            .field("playback_buffer_frames", &self.playback_buffer_frames)
            .field("input_device_name", &self.input_device_name)
            .field("output_device_name", &self.output_device_name)
            .field("on_delivery", &self.on_delivery.as_ref().map(|_| "Fn(..)"))
            .finish()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let format = AudioFormat {
            sample_rate: 16000,
            channels: 1,
        };
        Self {
            format,
            vad: VadConfig::default(),
            aec_mode: 1,
            ns_level: 1,
            aec: true,
            ns: true,
            vad_enabled: true,
            aec_reference_from_playback: false,
            capture_buffer_frames: 8,
            playback_buffer_frames: 8,
            input_device_name: None,
            output_device_name: None,
            on_delivery: None,
        }
    }
}

/// Kommandos an den Pipeline-Hintergrund-Thread.
enum PipelineCommand {
    StartRecording,
    StopRecording,
    StartPlayback,
    StopPlayback,
    ClearPlayback,
    Shutdown,
}

struct SharedState {
    recording: AtomicBool,
    playing: AtomicBool,
    level: AtomicU8,
}

/// Audio-Pipeline: oeffentliche Fassade fuer C1-C4 zusammen.
///
/// Recorder- und Player-Logik laufen in einem dedizierten Thread; diese
/// Struktur selbst ist ein duenner, klonbarer Handle darauf.
pub struct AudioPipeline {
    cmd_tx: Sender<PipelineCommand>,
    capture_buf: Arc<RingBuffer>,
    playback_buf: Arc<RingBuffer>,
    shared: Arc<SharedState>,
    vad: Arc<Mutex<Vad>>,
    volume: Arc<Mutex<VolumeController>>,
    /// Referenzframe fuer die AEC, zugefuehrt ueber `feed_aec_ref` (§4.3).
    aec_ref: Arc<Mutex<Option<Vec<i16>>>>,
    config: PipelineConfig,
}

impl AudioPipeline {
    /// Initialisiert die Pipeline, startet aber noch keine Streams (§4.5
    /// `init`).
    pub fn init(config: PipelineConfig) -> AudioResult<Self> {
        let (cmd_tx, cmd_rx) = bounded::<PipelineCommand>(32);

        let capture_buf = Arc::new(RingBuffer::new(
            config.format.frame_bytes() * config.capture_buffer_frames,
        ));
        let playback_buf = Arc::new(RingBuffer::new(
            config.format.frame_bytes() * config.playback_buffer_frames,
        ));

        let shared = Arc::new(SharedState {
            recording: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            level: AtomicU8::new(0),
        });

        let vad = Arc::new(Mutex::new(Vad::new(config.vad)));
        let volume = Arc::new(Mutex::new(VolumeController::new()));
        let aec_ref = Arc::new(Mutex::new(None));

        let thread_capture = Arc::clone(&capture_buf);
        let thread_playback = Arc::clone(&playback_buf);
        let thread_shared = Arc::clone(&shared);
        let thread_vad = Arc::clone(&vad);
        let thread_volume = Arc::clone(&volume);
        let thread_aec_ref = Arc::clone(&aec_ref);
        let thread_config = config.clone();

        std::thread::Builder::new()
            .name("va-audio-pipeline".to_string())
            .spawn(move || {
                pipeline_thread(
                    cmd_rx,
                    thread_capture,
                    thread_playback,
                    thread_shared,
                    thread_vad,
                    thread_volume,
                    thread_aec_ref,
                    thread_config,
                );
            })
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

        info!("Audio-Pipeline initialisiert");

        Ok(Self {
            cmd_tx,
            capture_buf,
            playback_buf,
            shared,
            vad,
            volume,
            aec_ref,
            config,
        })
    }

    pub fn deinit(&self) {
        let _ = self.cmd_tx.send(PipelineCommand::Shutdown);
    }

    pub fn configure(&mut self, config: PipelineConfig) {
        self.vad.lock().set_config(config.vad);
        self.config = config;
    }

    pub fn start_recording(&self) -> AudioResult<()> {
        self.send(PipelineCommand::StartRecording)
    }

    pub fn stop_recording(&self) -> AudioResult<()> {
        self.send(PipelineCommand::StopRecording)
    }

    pub fn start_playback(&self) -> AudioResult<()> {
        self.send(PipelineCommand::StartPlayback)
    }

    pub fn stop_playback(&self) -> AudioResult<()> {
        self.send(PipelineCommand::StopPlayback)
    }

    pub fn clear_playback(&self) -> AudioResult<()> {
        self.send(PipelineCommand::ClearPlayback)
    }

    /// Schreibt PCM16-Bytes in den Wiedergabepuffer, blockiert bis zu
    /// `timeout`. Liefert die tatsaechlich geschriebene Byteanzahl.
    pub fn write_playback(&self, bytes: &[u8], timeout: Duration) -> usize {
        self.playback_buf.push(bytes, timeout)
    }

    /// Liest aufgenommene, bereits DSP-verarbeitete PCM16-Bytes,
    /// blockiert bis zu `timeout`.
    pub fn read_capture(&self, max_bytes: usize, timeout: Duration) -> Vec<u8> {
        self.capture_buf.pop_up_to(max_bytes, timeout)
    }

    /// Fuehrt der AEC ein Referenzframe zu (§4.3). Ohne ein fuer den
    /// naechsten Frame passendes Referenzframe wird AEC fuer diesen Frame
    /// uebersprungen, nicht fehlerhaft. Eine Kopie wird gespeichert, kein
    /// Zeiger auf den Aufrufer-Puffer.
    pub fn feed_aec_ref(&self, bytes: &[u8]) {
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        *self.aec_ref.lock() = Some(samples);
    }

    pub fn set_volume(&self, volume_0_100: u8) {
        self.volume.lock().set_volume(volume_0_100);
    }

    pub fn set_mute(&self, muted: bool) {
        self.volume.lock().set_mute(muted);
    }

    pub fn get_vad_state(&self) -> VadState {
        self.vad.lock().state()
    }

    pub fn get_level(&self) -> u8 {
        self.shared.level.load(Ordering::Relaxed)
    }

    pub fn is_recording(&self) -> bool {
        self.shared.recording.load(Ordering::Relaxed)
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    fn send(&self, cmd: PipelineCommand) -> AudioResult<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|e| AudioError::StreamFehler(e.to_string()))
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(PipelineCommand::Shutdown);
        debug!("Audio-Pipeline gestoppt");
    }
}

/// Haelt die Codec-Handles und hardware-seitigen Puffer, die ausschliesslich
/// der Pipeline-Thread besitzt (nicht mit der Fassade geteilt).
struct DeviceState {
    mic: Option<MicCodec>,
    speaker: Option<SpeakerCodec>,
    raw_capture: Arc<RingBuffer>,
    device_playback: Arc<RingBuffer>,
    last_playback_write: Instant,
}

#[allow(clippy::too_many_arguments)]
fn pipeline_thread(
    cmd_rx: Receiver<PipelineCommand>,
    capture_buf: Arc<RingBuffer>,
    playback_buf: Arc<RingBuffer>,
    shared: Arc<SharedState>,
    vad: Arc<Mutex<Vad>>,
    volume: Arc<Mutex<VolumeController>>,
    aec_ref: Arc<Mutex<Option<Vec<i16>>>>,
    config: PipelineConfig,
) {
    let mut hpf = HighPassFilter::new();
    let mut aec = SimpleAec::new(config.aec_mode);
    aec.set_enabled(config.aec);
    let mut ns = NoiseSuppressor::new(config.ns_level);
    ns.set_enabled(config.ns);
    let frame_bytes = config.format.frame_bytes();
    let frame_ms = AudioFormat::FRAME_MS as u64;

    let mut devices = DeviceState {
        mic: None,
        speaker: None,
        raw_capture: Arc::new(RingBuffer::new(frame_bytes * 4)),
        device_playback: Arc::new(RingBuffer::new(frame_bytes * 4)),
        last_playback_write: Instant::now(),
    };

    debug!("Pipeline-Thread gestartet");

    loop {
        match cmd_rx.recv_timeout(Duration::from_millis(20)) {
            Ok(PipelineCommand::StartRecording) => {
                if devices.mic.is_none() {
                    match open_mic(&config, &devices.raw_capture) {
                        Ok(codec) => {
                            devices.mic = Some(codec);
                            hpf.reset();
                            aec.reset();
                            vad.lock().reset();
                            shared.recording.store(true, Ordering::Relaxed);
                            info!("Aufnahme gestartet");
                        }
                        Err(e) => warn!("Mikrofon konnte nicht geoeffnet werden: {}", e),
                    }
                } else {
                    debug!("Aufnahme laeuft bereits (idempotent)");
                }
            }
            Ok(PipelineCommand::StopRecording) => {
                if let Some(mut codec) = devices.mic.take() {
                    codec.close();
                }
                shared.recording.store(false, Ordering::Relaxed);
                info!("Aufnahme gestoppt");
            }
            Ok(PipelineCommand::StartPlayback) => {
                if devices.speaker.is_none() {
                    match open_speaker(&config, &devices.device_playback) {
                        Ok(codec) => {
                            devices.speaker = Some(codec);
                            devices.last_playback_write = Instant::now();
                            shared.playing.store(true, Ordering::Relaxed);
                            info!("Wiedergabe gestartet");
                        }
                        Err(e) => warn!("Lautsprecher konnte nicht geoeffnet werden: {}", e),
                    }
                } else {
                    debug!("Wiedergabe laeuft bereits (idempotent)");
                }
            }
            Ok(PipelineCommand::StopPlayback) => {
                if let Some(mut codec) = devices.speaker.take() {
                    codec.close();
                }
                shared.playing.store(false, Ordering::Relaxed);
                info!("Wiedergabe gestoppt");
            }
            Ok(PipelineCommand::ClearPlayback) => {
                playback_buf.reset();
                devices.device_playback.reset();
                debug!("Wiedergabepuffer geleert");
            }
            Ok(PipelineCommand::Shutdown) => {
                if let Some(mut codec) = devices.mic.take() {
                    codec.close();
                }
                if let Some(mut codec) = devices.speaker.take() {
                    codec.close();
                }
                info!("Pipeline-Thread beendet");
                break;
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if shared.recording.load(Ordering::Relaxed) {
                    process_one_capture_frame(
                        &devices.raw_capture,
                        &capture_buf,
                        &mut hpf,
                        &mut aec,
                        &mut ns,
                        &vad,
                        &aec_ref,
                        &shared,
                        &config,
                        frame_bytes,
                    );
                }
                if shared.playing.load(Ordering::Relaxed) {
                    apply_playback_volume(
                        &playback_buf,
                        &devices.device_playback,
                        &volume,
                        &aec_ref,
                        config.aec_reference_from_playback,
                        &mut devices.last_playback_write,
                        frame_bytes,
                        frame_ms,
                    );
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                warn!("Pipeline-Kommandokanal getrennt");
                break;
            }
        }
    }
}

/// Oeffnet das Mikrofon im konfigurierten Format gegen den hardware-
/// seitigen Rohpuffer (§4.1/§4.5).
fn open_mic(config: &PipelineConfig, raw_capture: &Arc<RingBuffer>) -> AudioResult<MicCodec> {
    let device = device::load_cpal_input_device(config.input_device_name.as_deref())?;
    let supported = device
        .default_input_config()
        .map_err(|e| AudioError::OpenFailed(e.to_string()))?;
    let mut codec = MicCodec::new(config.format, Arc::clone(raw_capture));
    codec.open(&device, supported.channels())?;
    Ok(codec)
}

/// Oeffnet den Lautsprecher gegen den hardware-seitigen Wiedergabepuffer.
fn open_speaker(config: &PipelineConfig, device_playback: &Arc<RingBuffer>) -> AudioResult<SpeakerCodec> {
    let device = device::load_cpal_output_device(config.output_device_name.as_deref())?;
    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::OpenFailed(e.to_string()))?;
    let mut codec = SpeakerCodec::new(config.format, Arc::clone(device_playback));
    codec.open(&device, supported.channels(), supported.sample_format())?;
    Ok(codec)
}

/// Zieht -- falls vorhanden -- einen rohen Frame aus dem hardware-seitigen
/// Capture-Puffer, wendet die DSP-Kette HPF -> AEC -> NS an, aktualisiert
/// den VAD, meldet den verarbeiteten Frame an den Delivery-Callback und
/// legt ihn zusaetzlich fuer direkte Leser (`read_capture`) in
/// `capture_buf` ab (§4.5, Invariante 1: Reihenfolge HPF -> AEC -> NS ->
/// VAD).
#[allow(clippy::too_many_arguments)]
fn process_one_capture_frame(
    raw_capture: &RingBuffer,
    capture_buf: &RingBuffer,
    hpf: &mut HighPassFilter,
    aec: &mut SimpleAec,
    ns: &mut NoiseSuppressor,
    vad: &Arc<Mutex<Vad>>,
    aec_ref: &Arc<Mutex<Option<Vec<i16>>>>,
    shared: &SharedState,
    config: &PipelineConfig,
    frame_bytes: usize,
) {
    let raw = raw_capture.pop_up_to(frame_bytes, Duration::from_millis(0));
    if raw.len() < 2 {
        return;
    }

    let mut samples: Vec<i16> = raw
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();

    hpf.process(&mut samples);
    if let Some(reference) = aec_ref.lock().take() {
        aec.feed_reference(&reference);
    }
    aec.process(&mut samples);
    ns.process(&mut samples);

    let (vad_state, level) = if config.vad_enabled {
        vad.lock().process_frame(&samples)
    } else {
        (VadState::Silence, Vad::level_only(&samples))
    };
    shared.level.store(level, Ordering::Relaxed);

    let processed_bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

    if let Some(callback) = &config.on_delivery {
        callback(&processed_bytes, vad_state, level);
    }

    capture_buf.push(&processed_bytes, Duration::from_millis(0));
}

/// Zieht -- falls vorhanden -- einen Frame aus dem anwendungsseitigen
/// Wiedergabepuffer, wendet Lautstaerke/Mute an und legt das Ergebnis in
/// den hardware-seitigen Puffer, den der cpal-Ausgabe-Callback konsumiert.
/// Fuehrt optional der AEC das soeben geschriebene Signal als Referenz zu
/// (DESIGN.md Offene Frage 1) und haelt den DAC bei Leerlauf > 2xFRAME_MS
/// mit einem Stilleframe geprimt (§4.5 Player-Task).
#[allow(clippy::too_many_arguments)]
fn apply_playback_volume(
    playback_buf: &RingBuffer,
    device_playback: &RingBuffer,
    volume: &Arc<Mutex<VolumeController>>,
    aec_ref: &Arc<Mutex<Option<Vec<i16>>>>,
    feed_aec_reference: bool,
    last_write: &mut Instant,
    frame_bytes: usize,
    frame_ms: u64,
) {
    let raw = playback_buf.pop_up_to(frame_bytes, Duration::from_millis(0));
    if raw.len() < 2 {
        if last_write.elapsed() >= Duration::from_millis(frame_ms * 2) {
            let silence = vec![0u8; frame_bytes];
            device_playback.push(&silence, Duration::from_millis(0));
            *last_write = Instant::now();
        }
        return;
    }

    let mut samples: Vec<i16> = raw
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    volume.lock().apply(&mut samples);

    if feed_aec_reference {
        *aec_ref.lock() = Some(samples.clone());
    }

    let processed_bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    device_playback.push(&processed_bytes, Duration::from_millis(0));
    *last_write = Instant::now();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_init_deinit() {
        let pipeline = AudioPipeline::init(PipelineConfig::default()).unwrap();
        pipeline.deinit();
        std::thread::sleep(Duration::from_millis(20));
    }

    #[test]
    fn start_stop_playback_kommando() {
        // Startet ohne Audio-Hardware: das Oeffnen des Lautsprechers kann
        // fehlschlagen (kein Geraet im Testcontainer), die Pipeline selbst
        // darf dabei aber nicht abstuerzen oder haengen bleiben.
        let pipeline = AudioPipeline::init(PipelineConfig::default()).unwrap();
        assert!(pipeline.start_playback().is_ok());
        std::thread::sleep(Duration::from_millis(30));
        assert!(pipeline.stop_playback().is_ok());
        std::thread::sleep(Duration::from_millis(20));
        assert!(!pipeline.is_playing());
    }

    #[test]
    fn write_read_playback_roundtrip() {
        let pipeline = AudioPipeline::init(PipelineConfig::default()).unwrap();
        let bytes = vec![1u8, 2, 3, 4];
        let written = pipeline.write_playback(&bytes, Duration::from_millis(50));
        assert_eq!(written, 4);
    }

    #[test]
    fn clear_playback_leert_puffer() {
        let pipeline = AudioPipeline::init(PipelineConfig::default()).unwrap();
        pipeline.write_playback(&[1, 2, 3, 4], Duration::from_millis(50));
        assert!(pipeline.clear_playback().is_ok());
        std::thread::sleep(Duration::from_millis(20));
        let data = pipeline.read_capture(4, Duration::from_millis(10));
        assert!(data.is_empty());
    }

    #[test]
    fn get_level_default_null() {
        let pipeline = AudioPipeline::init(PipelineConfig::default()).unwrap();
        assert_eq!(pipeline.get_level(), 0);
    }

    #[test]
    fn get_vad_state_default_silence() {
        let pipeline = AudioPipeline::init(PipelineConfig::default()).unwrap();
        assert_eq!(pipeline.get_vad_state(), VadState::Silence);
    }

    #[test]
    fn set_volume_set_mute_schlagen_nicht_fehl() {
        let pipeline = AudioPipeline::init(PipelineConfig::default()).unwrap();
        pipeline.set_volume(50);
        pipeline.set_mute(true);
        pipeline.set_mute(false);
    }

    #[test]
    fn feed_aec_ref_schlaegt_nicht_fehl() {
        let pipeline = AudioPipeline::init(PipelineConfig::default()).unwrap();
        let frame = vec![0u8; pipeline.config.format.frame_bytes()];
        pipeline.feed_aec_ref(&frame);
    }

    #[test]
    fn delivery_callback_wird_bei_rohem_frame_aufgerufen() {
        use std::sync::atomic::AtomicUsize;

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let config = PipelineConfig {
            on_delivery: Some(Arc::new(move |_bytes, _vad, _level| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            })),
            ..PipelineConfig::default()
        };
        let frame_bytes = config.format.frame_bytes();

        // Ohne Mikrofon-Hardware im Testcontainer simulieren wir den
        // Recorder-Pfad direkt ueber die interne Verarbeitungsfunktion statt
        // ueber `start_recording` (das ein echtes cpal-Geraet braucht).
        let mut hpf = HighPassFilter::new();
        let mut aec = SimpleAec::new(config.aec_mode);
        let mut ns = NoiseSuppressor::new(config.ns_level);
        let vad = Arc::new(Mutex::new(Vad::new(config.vad)));
        let aec_ref = Arc::new(Mutex::new(None));
        let shared = SharedState {
            recording: AtomicBool::new(true),
            playing: AtomicBool::new(false),
            level: AtomicU8::new(0),
        };
        let raw_capture = RingBuffer::new(frame_bytes * 2);
        let capture_buf = RingBuffer::new(frame_bytes * 2);
        raw_capture.push(&vec![0u8; frame_bytes], Duration::from_millis(10));

        process_one_capture_frame(
            &raw_capture,
            &capture_buf,
            &mut hpf,
            &mut aec,
            &mut ns,
            &vad,
            &aec_ref,
            &shared,
            &config,
            frame_bytes,
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deaktiviertes_vad_liefert_immer_silence() {
        let seen_state = Arc::new(Mutex::new(VadState::Silence));
        let seen_state_clone = Arc::clone(&seen_state);
        let config = PipelineConfig {
            vad_enabled: false,
            on_delivery: Some(Arc::new(move |_bytes, vad, _level| {
                *seen_state_clone.lock() = vad;
            })),
            ..PipelineConfig::default()
        };
        let frame_bytes = config.format.frame_bytes();

        let mut hpf = HighPassFilter::new();
        let mut aec = SimpleAec::new(config.aec_mode);
        aec.set_enabled(config.aec);
        let mut ns = NoiseSuppressor::new(config.ns_level);
        ns.set_enabled(config.ns);
        let vad = Arc::new(Mutex::new(Vad::new(config.vad)));
        let aec_ref = Arc::new(Mutex::new(None));
        let shared = SharedState {
            recording: AtomicBool::new(true),
            playing: AtomicBool::new(false),
            level: AtomicU8::new(0),
        };
        let raw_capture = RingBuffer::new(frame_bytes * 2);
        let capture_buf = RingBuffer::new(frame_bytes * 2);
        // Lauter Frame, der bei aktivem VAD einen VoiceStart ausloesen wuerde.
        let loud_sample = 30000i16.to_le_bytes();
        let loud: Vec<u8> = (0..frame_bytes / 2)
            .flat_map(|_| loud_sample)
            .collect();
        raw_capture.push(&loud, Duration::from_millis(10));

        process_one_capture_frame(
            &raw_capture,
            &capture_buf,
            &mut hpf,
            &mut aec,
            &mut ns,
            &vad,
            &aec_ref,
            &shared,
            &config,
            frame_bytes,
        );

        assert_eq!(*seen_state.lock(), VadState::Silence);
    }

    #[test]
    fn deaktivierte_ns_stufe_daempft_nicht() {
        let config = PipelineConfig {
            ns: false,
            ..PipelineConfig::default()
        };
        let mut ns = NoiseSuppressor::new(config.ns_level);
        ns.set_enabled(config.ns);
        let mut samples = [100i16, -100];
        ns.process(&mut samples);
        assert_eq!(samples, [100, -100], "deaktivierte NS darf Samples nicht veraendern");
    }

    #[test]
    fn deaktivierte_aec_stufe_subtrahiert_nicht() {
        let config = PipelineConfig {
            aec: false,
            ..PipelineConfig::default()
        };
        let mut aec = SimpleAec::new(config.aec_mode);
        aec.set_enabled(config.aec);
        aec.feed_reference(&[1000, 1000]);
        let mut samples = [1000i16, 1000];
        aec.process(&mut samples);
        assert_eq!(samples, [1000, 1000], "deaktivierte AEC darf Samples nicht veraendern");
    }
}
