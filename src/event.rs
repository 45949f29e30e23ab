/// Values carried over the event bus.
///
/// Observations are owned copies of what the radio driver handed us: the
/// driver's frame buffer is only borrowed while parsing, so nothing here
/// points back into driver memory. Identifier fields are bounded
/// `heapless::String`s filled with [`truncate_into`], which cuts oversized
/// input at a UTF-8 boundary instead of rejecting it.
use heapless::String;
use serde::Serialize;

/// Raw 6-byte MAC address
pub type MacAddress = [u8; 6];

/// SSID string (802.11 caps SSIDs at 32 bytes)
pub type SsidString = String<32>;

/// BLE device name / threat identifier
pub type NameString = String<63>;

/// 128-bit UUID string ("0000xxxx-0000-1000-8000-00805f9b34fb")
pub type UuidString = String<36>;

/// Formatted MAC ("aa:bb:cc:dd:ee:ff")
pub type MacString = String<17>;

/// Formatted OUI ("aa:bb:cc")
pub type OuiString = String<8>;

/// Copy `s` into a bounded string, truncating at the last char boundary
/// that fits.
pub fn truncate_into<const N: usize>(s: &str) -> String<N> {
    let mut end = s.len().min(N);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::new();
    // Cannot fail: `end <= N`
    let _ = out.push_str(&s[..end]);
    out
}

/// 802.11 management frame kinds the scanner captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSubtype {
    ProbeRequest,
    ProbeResponse,
    Beacon,
}

impl FrameSubtype {
    /// Subtype tag carried in telemetry: 0x20 for probes, 0x80 for beacons.
    pub fn code(&self) -> u8 {
        match self {
            FrameSubtype::ProbeRequest | FrameSubtype::ProbeResponse => 0x20,
            FrameSubtype::Beacon => 0x80,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameSubtype::ProbeRequest => "probe_req",
            FrameSubtype::ProbeResponse => "probe_resp",
            FrameSubtype::Beacon => "beacon",
        }
    }
}

/// A captured WiFi management frame
#[derive(Debug, Clone, PartialEq)]
pub struct WiFiFrameEvent {
    pub mac: MacAddress,
    /// Empty when the frame carried no readable SSID
    pub ssid: SsidString,
    pub rssi: i8,
    pub channel: u8,
    pub subtype: FrameSubtype,
}

/// A BLE advertisement seen during a scan window
#[derive(Debug, Clone, PartialEq)]
pub struct BluetoothDeviceEvent {
    pub mac: MacAddress,
    pub name: NameString,
    pub rssi: i8,
    /// First advertised service UUID, if any
    pub service_uuid: Option<UuidString>,
}

/// Unified observation type carried through the observation queue
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    WiFi(WiFiFrameEvent),
    Bluetooth(BluetoothDeviceEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RadioType {
    #[serde(rename = "wifi")]
    WiFi,
    #[serde(rename = "bluetooth")]
    Bluetooth,
}

impl RadioType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RadioType::WiFi => "wifi",
            RadioType::Bluetooth => "bluetooth",
        }
    }
}

/// What kind of device a threat is believed to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThreatCategory {
    /// Flock Safety ALPR cameras and their accessories
    #[serde(rename = "Surveillance Device")]
    SurveillanceDevice,
    /// Raven gunshot detector
    #[serde(rename = "Acoustic Detector")]
    AcousticDetector,
}

impl ThreatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::SurveillanceDevice => "Surveillance Device",
            ThreatCategory::AcousticDetector => "Acoustic Detector",
        }
    }
}

/// Which signals contributed to a detection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Indicators {
    pub name_match: bool,
    pub mac_match: bool,
    pub uuid_match: bool,
}

/// Snapshot of a positive match. One is produced per matching observation;
/// repeated sightings produce repeated events.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreatEvent {
    pub mac: MacAddress,
    /// Matched SSID or device name (may be empty)
    pub identifier: NameString,
    pub rssi: i8,
    /// WiFi channel, 0 for BLE
    pub channel: u8,
    pub radio: RadioType,
    /// 0..=100
    pub certainty: u8,
    pub category: ThreatCategory,
    pub indicators: Indicators,
}

/// Request to play a named sound asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioRequest {
    pub sound: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_input() {
        let s: SsidString = truncate_into("Flock-Guest");
        assert_eq!(s.as_str(), "Flock-Guest");
    }

    #[test]
    fn truncate_cuts_oversized_input() {
        let long = "abcdefghijklmnopqrstuvwxyz0123456789";
        let s: SsidString = truncate_into(long);
        assert_eq!(s.len(), 32);
        assert_eq!(s.as_str(), &long[..32]);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        // 31 ASCII bytes followed by a 2-byte char straddling the limit
        let input = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaé";
        let s: SsidString = truncate_into(input);
        assert_eq!(s.len(), 31);
        assert!(s.chars().all(|c| c == 'a'));
    }

    #[test]
    fn subtype_codes() {
        assert_eq!(FrameSubtype::ProbeRequest.code(), 0x20);
        assert_eq!(FrameSubtype::ProbeResponse.code(), 0x20);
        assert_eq!(FrameSubtype::Beacon.code(), 0x80);
    }
}
