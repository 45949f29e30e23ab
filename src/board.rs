/// Hardware constants for supported boards.
///
/// Each board module defines the storage bus pins, GPS UART wiring, and
/// audio defaults, selected at compile time via feature flags. The core
/// never touches the pins itself; firmware binaries read them when building
/// the `Storage` and `AudioSink` implementations handed to the library.

#[cfg(feature = "board-m5fire")]
mod hw {
    pub const SD_SCK_PIN: u8 = 18;
    pub const SD_MISO_PIN: u8 = 19;
    pub const SD_MOSI_PIN: u8 = 23;
    pub const SD_CS_PIN: u8 = 4;
    pub const GPS_RX_PIN: u8 = 16;
    pub const GPS_TX_PIN: u8 = 17;
    pub const HAS_SD_CARD: bool = true;
    pub const BOARD_NAME: &str = "m5stack_fire";
}

#[cfg(all(feature = "board-m5stickc", not(feature = "board-m5fire")))]
mod hw {
    // No SD slot; the storage mount fails and alerts stay silent
    pub const SD_SCK_PIN: u8 = 0;
    pub const SD_MISO_PIN: u8 = 0;
    pub const SD_MOSI_PIN: u8 = 0;
    pub const SD_CS_PIN: u8 = 0;
    // BN-220 on the hat header: module TX to G26, module RX to G25
    pub const GPS_RX_PIN: u8 = 26;
    pub const GPS_TX_PIN: u8 = 25;
    pub const HAS_SD_CARD: bool = false;
    pub const BOARD_NAME: &str = "m5stickc_plus2";
}

#[cfg(not(any(feature = "board-m5fire", feature = "board-m5stickc")))]
mod hw {
    pub const SD_SCK_PIN: u8 = 18;
    pub const SD_MISO_PIN: u8 = 19;
    pub const SD_MOSI_PIN: u8 = 23;
    pub const SD_CS_PIN: u8 = 4;
    pub const GPS_RX_PIN: u8 = 16;
    pub const GPS_TX_PIN: u8 = 17;
    pub const HAS_SD_CARD: bool = false;
    pub const BOARD_NAME: &str = "host";
}

pub use hw::*;

/// GPS module (BN-220) serial baud rate
pub const GPS_BAUD_RATE: u32 = 9600;

/// Speaker volume applied by `SoundEngine::initialize`, in [0.0, 1.0]
pub const DEFAULT_VOLUME: f32 = 0.4;

/// SD card SPI clock used when mounting the storage bus
pub const SD_SPI_FREQ_HZ: u32 = 25_000_000;

/// Pin set for the SPI bus the removable storage is mounted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageBus {
    pub sck: u8,
    pub miso: u8,
    pub mosi: u8,
    pub cs: u8,
    pub freq_hz: u32,
}

/// The fixed storage interface for the selected board.
pub const fn storage_bus() -> StorageBus {
    StorageBus {
        sck: SD_SCK_PIN,
        miso: SD_MISO_PIN,
        mosi: SD_MOSI_PIN,
        cs: SD_CS_PIN,
        freq_hz: SD_SPI_FREQ_HZ,
    }
}
