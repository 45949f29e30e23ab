/// Alert audio playback from removable storage.
///
/// `play_sound` is the blocking path, for boot chimes and other places
/// where stalling is acceptable. Alerts go through `play_sound_async`: the
/// file is read once into a heap buffer sized to the file, and every
/// `update()` call decodes and pushes one bounded chunk of samples to the
/// speaker, so the scan loop keeps running during playback.
///
/// Only one async playback is in flight. A request that arrives while one
/// is playing is dropped with `SoundError::Busy`; the alert already playing
/// finishes.
use alloc::vec::Vec;

use crate::board;
use crate::error::{SoundError, StorageError};
use crate::event::AudioRequest;
use crate::wav::{self, PcmFormat, WavInfo};

/// Largest number of samples pushed per `update()`
pub const MAX_CHUNK_SAMPLES: usize = 512;

pub const ALERT_SOUND: &str = "alert.wav";

pub const STARTUP_SOUND: &str = "startup.wav";

/// File store the audio assets live on.
pub trait Storage {
    type File: StorageFile;

    fn mount(&mut self, bus: &board::StorageBus) -> Result<(), StorageError>;

    /// Open a file by name. `StorageError::NotFound` if it does not exist.
    fn open(&mut self, name: &str) -> Result<Self::File, StorageError>;
}

/// An open file, read sequentially.
pub trait StorageFile {
    fn size(&self) -> usize;

    /// Read into `buf`, returning the number of bytes read (0 at end of file).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError>;
}

/// Speaker output.
pub trait AudioSink {
    /// Volume in [0.0, 1.0]
    fn set_volume(&mut self, level: f32);

    /// Queue samples without blocking. Returns how many were accepted,
    /// possibly fewer than offered when the output buffer is full.
    fn write(&mut self, samples: &[i16], format: &PcmFormat) -> usize;

    /// Whether queued samples are still being played out.
    fn is_playing(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundConfig {
    pub volume: f32,
    /// Samples pushed per `update()`, capped at `MAX_CHUNK_SAMPLES`
    pub chunk_samples: usize,
    /// Played on every threat detection
    pub alert_asset: &'static str,
    /// Played once when the system comes up
    pub startup_asset: &'static str,
}

impl SoundConfig {
    pub const fn new() -> Self {
        Self {
            volume: board::DEFAULT_VOLUME,
            chunk_samples: MAX_CHUNK_SAMPLES,
            alert_asset: ALERT_SOUND,
            startup_asset: STARTUP_SOUND,
        }
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct Playback {
    buffer: Vec<u8>,
    info: WavInfo,
    cursor: usize,
}

impl Playback {
    fn remaining(&self) -> &[u8] {
        let start = self.info.data_offset + self.cursor;
        let end = self.info.data_offset + self.info.data_len;
        &self.buffer[start..end]
    }

    fn fully_queued(&self) -> bool {
        self.cursor >= self.info.data_len
    }
}

pub struct SoundEngine<S: Storage, A: AudioSink> {
    storage: S,
    sink: A,
    config: SoundConfig,
    volume: f32,
    storage_ready: bool,
    playback: Option<Playback>,
}

impl<S: Storage, A: AudioSink> SoundEngine<S, A> {
    pub fn new(storage: S, sink: A, config: SoundConfig) -> Self {
        Self {
            storage,
            sink,
            config,
            volume: config.volume,
            storage_ready: false,
            playback: None,
        }
    }

    /// Mount the storage bus and apply the configured volume. A mount
    /// failure is logged and leaves the engine silent.
    pub fn initialize(&mut self) {
        self.set_volume(self.config.volume);

        let bus = board::storage_bus();
        match self.storage.mount(&bus) {
            Ok(()) => {
                self.storage_ready = true;
                log::info!("Sound engine ready (SD on CS GPIO{})", bus.cs);
            }
            Err(e) => {
                self.storage_ready = false;
                log::error!("SD card mount failed: {}; alerts will be silent", e);
            }
        }
    }

    pub fn set_volume(&mut self, level: f32) {
        self.volume = level.clamp(0.0, 1.0);
        self.sink.set_volume(self.volume);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_storage_ready(&self) -> bool {
        self.storage_ready
    }

    /// Whether an async playback is in flight
    pub fn is_active(&self) -> bool {
        self.playback.is_some()
    }

    /// Bytes held by the async playback buffer (0 when idle)
    pub fn buffered_bytes(&self) -> usize {
        self.playback.as_ref().map_or(0, |p| p.buffer.len())
    }

    pub fn config(&self) -> &SoundConfig {
        &self.config
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    /// Load, decode and play `name`, returning once playback has finished.
    pub fn play_sound(&mut self, name: &str) -> Result<(), SoundError> {
        if self.playback.is_some() {
            return Err(SoundError::Busy);
        }
        let (buffer, info) = self.load_wav(name)?;
        let mut playback = Playback {
            buffer,
            info,
            cursor: 0,
        };

        while !playback.fully_queued() {
            let pushed = push_chunk(&mut self.sink, &mut playback, self.config.chunk_samples);
            if pushed == 0 {
                core::hint::spin_loop();
            }
        }
        while self.sink.is_playing() {
            core::hint::spin_loop();
        }
        Ok(())
    }

    /// Load `name` and start playing it from `update()`. Returns
    /// immediately.
    pub fn play_sound_async(&mut self, name: &str) -> Result<(), SoundError> {
        if self.playback.is_some() {
            return Err(SoundError::Busy);
        }
        let (buffer, info) = self.load_wav(name)?;
        log::debug!(
            "Playing {} ({} Hz, {} ch, {} bit, {} bytes)",
            name,
            info.format.sample_rate,
            info.format.channels,
            info.format.bits_per_sample,
            info.data_len,
        );
        self.playback = Some(Playback {
            buffer,
            info,
            cursor: 0,
        });
        Ok(())
    }

    /// Advance async playback by one chunk. No-op when idle.
    pub fn update(&mut self) {
        let Some(playback) = self.playback.as_mut() else {
            return;
        };

        if !playback.fully_queued() {
            push_chunk(&mut self.sink, playback, self.config.chunk_samples);
        }

        if playback.fully_queued() && !self.sink.is_playing() {
            // Releases the buffer
            self.playback = None;
            log::debug!("Async playback finished");
        }
    }

    /// Bus entry point for audio requests. Never blocks on playback.
    pub fn handle_audio_request(&mut self, request: &AudioRequest) {
        match self.play_sound_async(request.sound) {
            Ok(()) => {}
            Err(SoundError::Busy) => log::debug!("Dropping audio request '{}': busy", request.sound),
            Err(e) => log::warn!("Cannot play '{}': {}", request.sound, e),
        }
    }

    fn load_wav(&mut self, name: &str) -> Result<(Vec<u8>, WavInfo), SoundError> {
        if name.is_empty() {
            return Err(SoundError::EmptyName);
        }
        if !self.storage_ready {
            return Err(StorageError::NotMounted.into());
        }

        let mut file = self.storage.open(name)?;
        let size = file.size();
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(size)
            .map_err(|_| SoundError::OutOfMemory(size))?;
        buffer.resize(size, 0);

        let mut filled = 0;
        while filled < size {
            let n = file.read(&mut buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buffer.truncate(filled);

        let info = wav::parse_header(&buffer)?;
        Ok((buffer, info))
    }
}

/// Decode and offer one chunk to the sink. Returns the samples accepted.
fn push_chunk<A: AudioSink>(sink: &mut A, playback: &mut Playback, chunk_samples: usize) -> usize {
    let format = playback.info.format;
    let bytes_per_sample = format.bytes_per_sample();
    let channels = format.channels as usize;
    // Whole frames only
    let max = chunk_samples.clamp(channels, MAX_CHUNK_SAMPLES);
    let max = max - max % channels;

    let mut samples = [0i16; MAX_CHUNK_SAMPLES];
    let raw = playback.remaining();
    let raw = &raw[..raw.len().min(max * bytes_per_sample)];
    let decoded = wav::decode_samples(&format, raw, &mut samples[..max]);

    let accepted = sink.write(&samples[..decoded], &format).min(decoded);
    playback.cursor += accepted * bytes_per_sample;
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::tests::build_wav;
    use core::cell::Cell;
    use std::collections::BTreeMap;
    use std::string::{String, ToString};

    #[derive(Default)]
    struct MemStorage {
        files: BTreeMap<String, Vec<u8>>,
        fail_mount: bool,
    }

    struct MemFile {
        data: Vec<u8>,
        pos: usize,
    }

    impl Storage for MemStorage {
        type File = MemFile;

        fn mount(&mut self, _bus: &board::StorageBus) -> Result<(), StorageError> {
            if self.fail_mount {
                Err(StorageError::MountFailed)
            } else {
                Ok(())
            }
        }

        fn open(&mut self, name: &str) -> Result<MemFile, StorageError> {
            self.files
                .get(name)
                .map(|data| MemFile {
                    data: data.clone(),
                    pos: 0,
                })
                .ok_or(StorageError::NotFound)
        }
    }

    impl StorageFile for MemFile {
        fn size(&self) -> usize {
            self.data.len()
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
            // Short reads, like an SD card sector at a time
            let n = buf.len().min(self.data.len() - self.pos).min(100);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    /// Accepts up to `capacity` samples per write and keeps "playing" for
    /// `tail` polls after the last write.
    struct FakeSink {
        capacity: usize,
        tail: u32,
        written: Vec<i16>,
        writes: usize,
        draining: Cell<u32>,
        volume: f32,
    }

    impl FakeSink {
        fn new(capacity: usize, tail: u32) -> Self {
            Self {
                capacity,
                tail,
                written: Vec::new(),
                writes: 0,
                draining: Cell::new(0),
                volume: 0.0,
            }
        }
    }

    impl AudioSink for FakeSink {
        fn set_volume(&mut self, level: f32) {
            self.volume = level;
        }

        fn write(&mut self, samples: &[i16], _format: &PcmFormat) -> usize {
            let n = samples.len().min(self.capacity);
            self.written.extend_from_slice(&samples[..n]);
            self.writes += 1;
            self.draining.set(self.tail);
            n
        }

        fn is_playing(&self) -> bool {
            let left = self.draining.get();
            if left > 0 {
                self.draining.set(left - 1);
            }
            left > 0
        }
    }

    fn tone(samples: usize) -> Vec<u8> {
        let data: Vec<u8> = (0..samples as i16).flat_map(|s| s.to_le_bytes()).collect();
        build_wav(1, 16_000, 16, &data)
    }

    fn engine(capacity: usize, tail: u32) -> SoundEngine<MemStorage, FakeSink> {
        let mut storage = MemStorage::default();
        storage.files.insert(ALERT_SOUND.to_string(), tone(1500));
        storage.files.insert("bad.wav".to_string(), b"RIFF....JUNK".to_vec());
        let mut e = SoundEngine::new(storage, FakeSink::new(capacity, tail), SoundConfig::new());
        e.initialize();
        e
    }

    #[test]
    fn initialize_applies_default_volume() {
        let e = engine(4096, 0);
        assert!(e.is_storage_ready());
        assert_eq!(e.volume(), board::DEFAULT_VOLUME);
        assert_eq!(e.sink().volume, board::DEFAULT_VOLUME);
    }

    #[test]
    fn volume_is_clamped() {
        let mut e = engine(4096, 0);
        e.set_volume(3.0);
        assert_eq!(e.volume(), 1.0);
        e.set_volume(-1.0);
        assert_eq!(e.volume(), 0.0);
    }

    #[test]
    fn update_when_idle_is_noop() {
        let mut e = engine(4096, 0);
        for _ in 0..10 {
            e.update();
        }
        assert!(!e.is_active());
        assert_eq!(e.sink().writes, 0);
    }

    #[test]
    fn async_playback_streams_in_bounded_chunks() {
        let mut e = engine(4096, 3);
        e.play_sound_async(ALERT_SOUND).unwrap();
        assert!(e.is_active());
        assert!(e.buffered_bytes() > 3000);
        // Nothing pushed until the loop runs
        assert!(e.sink().written.is_empty());

        let mut updates = 0;
        while e.is_active() {
            e.update();
            updates += 1;
            assert!(updates < 100, "playback never finished");
        }
        // 1500 samples at 512 per chunk: 3 chunks, then the tail drains
        assert_eq!(e.sink().writes, 3);
        assert_eq!(e.sink().written.len(), 1500);
        assert_eq!(e.sink().written[1499], 1499);
        assert_eq!(e.buffered_bytes(), 0);

        let writes = e.sink().writes;
        e.update();
        assert_eq!(e.sink().writes, writes);
    }

    #[test]
    fn partial_writes_resume_where_they_stopped() {
        let mut e = engine(100, 0);
        e.play_sound_async(ALERT_SOUND).unwrap();
        while e.is_active() {
            e.update();
        }
        let expected: Vec<i16> = (0..1500).collect();
        assert_eq!(e.sink().written, expected);
    }

    #[test]
    fn request_during_playback_is_dropped() {
        let mut e = engine(4096, 0);
        e.play_sound_async(ALERT_SOUND).unwrap();
        assert_eq!(e.play_sound_async(ALERT_SOUND), Err(SoundError::Busy));
        assert_eq!(e.play_sound(ALERT_SOUND), Err(SoundError::Busy));
        e.handle_audio_request(&AudioRequest { sound: ALERT_SOUND });
        while e.is_active() {
            e.update();
        }
        assert_eq!(e.sink().written.len(), 1500);
    }

    #[test]
    fn blocking_playback_completes() {
        let mut e = engine(256, 5);
        e.play_sound(ALERT_SOUND).unwrap();
        assert_eq!(e.sink().written.len(), 1500);
        assert!(!e.sink().is_playing());
        assert!(!e.is_active());
    }

    #[test]
    fn missing_file_degrades() {
        let mut e = engine(4096, 0);
        assert_eq!(
            e.play_sound_async("nope.wav"),
            Err(SoundError::Storage(StorageError::NotFound))
        );
        assert!(!e.is_active());
        e.handle_audio_request(&AudioRequest { sound: "nope.wav" });
        assert!(!e.is_active());
    }

    #[test]
    fn malformed_file_degrades() {
        let mut e = engine(4096, 0);
        assert!(matches!(
            e.play_sound_async("bad.wav"),
            Err(SoundError::MalformedHeader(_))
        ));
        assert!(!e.is_active());
    }

    #[test]
    fn empty_name_rejected() {
        let mut e = engine(4096, 0);
        assert_eq!(e.play_sound_async(""), Err(SoundError::EmptyName));
    }

    #[test]
    fn unmounted_storage_is_silent() {
        let storage = MemStorage {
            files: BTreeMap::new(),
            fail_mount: true,
        };
        let mut e = SoundEngine::new(storage, FakeSink::new(4096, 0), SoundConfig::new());
        e.initialize();
        assert!(!e.is_storage_ready());
        assert_eq!(
            e.play_sound_async(ALERT_SOUND),
            Err(SoundError::Storage(StorageError::NotMounted))
        );
        e.update();
        assert_eq!(e.sink().writes, 0);
    }

    #[test]
    fn stereo_8bit_chunks_keep_whole_frames() {
        let mut storage = MemStorage::default();
        storage
            .files
            .insert("s.wav".to_string(), build_wav(2, 8000, 8, &vec![0x80; 1001 * 2]));
        let config = SoundConfig {
            chunk_samples: 101,
            ..SoundConfig::new()
        };
        let mut e = SoundEngine::new(storage, FakeSink::new(4096, 0), config);
        e.initialize();
        e.play_sound_async("s.wav").unwrap();
        e.update();
        assert_eq!(e.sink().written.len(), 100);
        while e.is_active() {
            e.update();
        }
        assert_eq!(e.sink().written.len(), 2002);
        assert!(e.sink().written.iter().all(|&s| s == 0));
    }
}
