/// Error types for the detection core.
///
/// None of these are fatal: every caller logs the error at the point of
/// occurrence and degrades a single alert or report, never the scan loop.
use thiserror::Error;

/// Radio configuration failures reported by a `RadioDriver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("failed to set WiFi channel {0}")]
    ChannelSet(u8),
    #[error("failed to start promiscuous capture")]
    CaptureStart,
    #[error("failed to start BLE scan")]
    ScanStart,
}

/// Failures from the removable file store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage mount failed")]
    MountFailed,
    #[error("storage not mounted")]
    NotMounted,
    #[error("file not found")]
    NotFound,
    #[error("read failed")]
    ReadFailed,
}

/// Failures while loading or playing an audio asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SoundError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("malformed audio header: {0}")]
    MalformedHeader(&'static str),
    #[error("unsupported PCM format: {bits} bits, {channels} channels")]
    UnsupportedFormat { bits: u16, channels: u16 },
    #[error("empty asset name")]
    EmptyName,
    #[error("cannot allocate {0} bytes for audio buffer")]
    OutOfMemory(usize),
    #[error("playback already in progress")]
    Busy,
}
