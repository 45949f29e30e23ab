/// Threat analyzer: classifies observations against the signature database.
///
/// WiFi evidence is an SSID substring match and/or an OUI prefix match.
/// BLE evidence is a device-name substring match and/or a Raven service
/// UUID match; the UUID is the stronger signal and decides the category on
/// its own. An observation with no evidence produces nothing. There is no
/// rate limiting or deduplication: every matching sighting is an event.
use core::fmt::Write;

use crate::event::{
    truncate_into, BluetoothDeviceEvent, Indicators, MacAddress, MacString, OuiString,
    RadioType, ThreatCategory, ThreatEvent, WiFiFrameEvent,
};
use crate::event_bus::EventBus;
use crate::signatures::{Signatures, DEFAULT_SIGNATURES};

/// SSID and OUI both matched
pub const CERTAINTY_NAME_AND_MAC: u8 = 95;
/// Raven service UUID advertised
pub const CERTAINTY_UUID: u8 = 90;
/// SSID or BLE name matched alone
pub const CERTAINTY_NAME_ONLY: u8 = 70;
/// OUI matched alone
pub const CERTAINTY_MAC_ONLY: u8 = 50;

/// Certainty score for a combination of signals, 0 when nothing matched.
pub fn calculate_certainty(indicators: &Indicators) -> u8 {
    let Indicators {
        name_match,
        mac_match,
        uuid_match,
    } = *indicators;

    if uuid_match {
        CERTAINTY_UUID.max(if name_match { CERTAINTY_NAME_AND_MAC } else { 0 })
    } else if name_match && mac_match {
        CERTAINTY_NAME_AND_MAC
    } else if name_match {
        CERTAINTY_NAME_ONLY
    } else if mac_match {
        CERTAINTY_MAC_ONLY
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThreatAnalyzer {
    signatures: &'static Signatures,
}

impl ThreatAnalyzer {
    pub fn new() -> Self {
        Self::with_signatures(&DEFAULT_SIGNATURES)
    }

    pub const fn with_signatures(signatures: &'static Signatures) -> Self {
        Self { signatures }
    }

    /// Log the loaded signature counts.
    pub fn initialize(&self) {
        log::info!(
            "Threat analyzer loaded: {} network names, {} MAC prefixes, {} BLE names, {} Raven services",
            self.signatures.network_names.len(),
            self.signatures.mac_prefixes.len(),
            self.signatures.ble_identifiers.len(),
            self.signatures.raven_services.len(),
        );
    }

    /// SSID contains a configured network name (case-sensitive).
    pub fn matches_network_name(&self, ssid: &str) -> bool {
        !ssid.is_empty()
            && self
                .signatures
                .network_names
                .iter()
                .any(|name| ssid.contains(name))
    }

    /// MAC's OUI equals a configured prefix.
    pub fn matches_mac_prefix(&self, mac: &MacAddress) -> bool {
        let oui = oui_of(mac);
        self.signatures
            .mac_prefixes
            .iter()
            .any(|prefix| prefix.eq_ignore_ascii_case(&oui))
    }

    /// BLE device name contains a configured identifier (case-sensitive).
    pub fn matches_ble_name(&self, name: &str) -> bool {
        !name.is_empty()
            && self
                .signatures
                .ble_identifiers
                .iter()
                .any(|id| name.contains(id))
    }

    /// Advertised service UUID is one of the Raven services.
    pub fn matches_raven_service(&self, uuid: &str) -> bool {
        self.signatures
            .raven_services
            .iter()
            .any(|known| known.eq_ignore_ascii_case(uuid))
    }

    /// Score a WiFi frame. `None` when no signal matched.
    pub fn analyze_wifi_frame(&self, frame: &WiFiFrameEvent) -> Option<ThreatEvent> {
        let indicators = Indicators {
            name_match: self.matches_network_name(&frame.ssid),
            mac_match: self.matches_mac_prefix(&frame.mac),
            uuid_match: false,
        };
        let certainty = calculate_certainty(&indicators);
        if certainty == 0 {
            return None;
        }

        Some(ThreatEvent {
            mac: frame.mac,
            identifier: truncate_into(&frame.ssid),
            rssi: frame.rssi,
            channel: frame.channel,
            radio: RadioType::WiFi,
            certainty,
            category: ThreatCategory::SurveillanceDevice,
            indicators,
        })
    }

    /// Score a BLE advertisement. `None` when no signal matched.
    pub fn analyze_bluetooth_device(&self, device: &BluetoothDeviceEvent) -> Option<ThreatEvent> {
        let uuid_match = device
            .service_uuid
            .as_deref()
            .is_some_and(|uuid| self.matches_raven_service(uuid));
        let indicators = Indicators {
            name_match: self.matches_ble_name(&device.name),
            mac_match: false,
            uuid_match,
        };
        let certainty = calculate_certainty(&indicators);
        if certainty == 0 {
            return None;
        }

        let category = if uuid_match {
            ThreatCategory::AcousticDetector
        } else {
            ThreatCategory::SurveillanceDevice
        };

        Some(ThreatEvent {
            mac: device.mac,
            identifier: device.name.clone(),
            rssi: device.rssi,
            channel: 0,
            radio: RadioType::Bluetooth,
            certainty,
            category,
            indicators,
        })
    }

    /// Bus entry point for WiFi observations.
    pub fn handle_wifi_frame(&self, bus: &EventBus<'_>, frame: &WiFiFrameEvent) {
        if let Some(threat) = self.analyze_wifi_frame(frame) {
            emit_threat(bus, &threat);
        }
    }

    /// Bus entry point for BLE observations.
    pub fn handle_bluetooth_device(&self, bus: &EventBus<'_>, device: &BluetoothDeviceEvent) {
        if let Some(threat) = self.analyze_bluetooth_device(device) {
            emit_threat(bus, &threat);
        }
    }
}

impl Default for ThreatAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn emit_threat(bus: &EventBus<'_>, threat: &ThreatEvent) {
    let mut mac = MacString::new();
    format_mac(&threat.mac, &mut mac);
    log::info!(
        "Threat: {} {} '{}' certainty {} ({}) rssi {}",
        threat.radio.as_str(),
        mac,
        threat.identifier,
        threat.certainty,
        threat.category.as_str(),
        threat.rssi,
    );
    bus.publish_threat(threat);
}

/// Format a 6-byte MAC address into "aa:bb:cc:dd:ee:ff"
pub fn format_mac(mac: &MacAddress, buf: &mut MacString) {
    let _ = write!(
        buf,
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
}

/// The first three octets as lowercase colon-hex ("aa:bb:cc")
pub fn oui_of(mac: &MacAddress) -> OuiString {
    let mut s = OuiString::new();
    let _ = write!(s, "{:02x}:{:02x}:{:02x}", mac[0], mac[1], mac[2]);
    s
}
