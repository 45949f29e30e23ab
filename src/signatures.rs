/// Signature database for surveillance device detection.
///
/// Compiled-in, read-only reference tables. Network names and BLE
/// identifiers are matched as case-sensitive substrings, so case variants
/// are listed explicitly. OUI prefixes are lowercase colon-hex, the form
/// produced by `analyzer::oui_of`.

/// A set of signature tables the analyzer matches against.
#[derive(Debug, Clone, Copy)]
pub struct Signatures {
    /// WiFi SSID substrings
    pub network_names: &'static [&'static str],
    /// MAC OUI prefixes ("aa:bb:cc")
    pub mac_prefixes: &'static [&'static str],
    /// BLE device name substrings
    pub ble_identifiers: &'static [&'static str],
    /// Raven service UUIDs, full 128-bit lowercase form
    pub raven_services: &'static [&'static str],
}

/// WiFi network name patterns.
pub static NETWORK_NAMES: &[&str] = &[
    "flock",
    "Flock",
    "FLOCK",
    "FS Ext Battery",
    "Penguin",
    "Pigvision",
];

/// MAC address OUI prefixes for target devices (Silicon Labs modules
/// shipped in Flock Safety hardware).
pub static MAC_PREFIXES: &[&str] = &[
    "58:8e:81", "cc:cc:cc", "ec:1b:bd", "90:35:ea", "04:0d:84",
    "f0:82:c0", "1c:34:f1", "38:5b:44", "94:34:69", "b4:e3:f9",
    "70:c9:4e", "3c:91:80", "d8:f3:bc", "80:30:49", "14:5a:fc",
    "74:4c:a1", "08:3a:88", "9c:2f:9d", "94:08:53", "e4:aa:ea",
];

/// BLE device name patterns.
pub static BLE_IDENTIFIERS: &[&str] = &["FS Ext Battery", "Penguin", "Flock", "Pigvision"];

/// Raven acoustic gunshot detector service UUIDs.
pub static RAVEN_SERVICES: &[&str] = &[
    "0000180a-0000-1000-8000-00805f9b34fb", // Device info (all firmware)
    "00003100-0000-1000-8000-00805f9b34fb", // GPS (1.2.0+)
    "00003200-0000-1000-8000-00805f9b34fb", // Power/battery (1.2.0+)
    "00003300-0000-1000-8000-00805f9b34fb", // Network (1.2.0+)
    "00003400-0000-1000-8000-00805f9b34fb", // Upload stats (1.2.0+)
    "00003500-0000-1000-8000-00805f9b34fb", // Error tracking (1.2.0+)
    "00001809-0000-1000-8000-00805f9b34fb", // Health thermometer (legacy 1.1.7)
    "00001819-0000-1000-8000-00805f9b34fb", // Location and navigation (legacy 1.1.7)
];

/// The default compiled-in database.
pub static DEFAULT_SIGNATURES: Signatures = Signatures {
    network_names: NETWORK_NAMES,
    mac_prefixes: MAC_PREFIXES,
    ble_identifiers: BLE_IDENTIFIERS,
    raven_services: RAVEN_SERVICES,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_sizes() {
        assert_eq!(NETWORK_NAMES.len(), 6);
        assert_eq!(MAC_PREFIXES.len(), 20);
        assert_eq!(BLE_IDENTIFIERS.len(), 4);
        assert_eq!(RAVEN_SERVICES.len(), 8);
    }

    #[test]
    fn prefixes_are_lowercase_colon_hex() {
        for prefix in MAC_PREFIXES {
            assert_eq!(prefix.len(), 8, "{prefix}");
            for (i, b) in prefix.bytes().enumerate() {
                if i % 3 == 2 {
                    assert_eq!(b, b':', "{prefix}");
                } else {
                    assert!(b.is_ascii_digit() || (b'a'..=b'f').contains(&b), "{prefix}");
                }
            }
        }
    }

    #[test]
    fn raven_uuids_on_bluetooth_base() {
        for uuid in RAVEN_SERVICES {
            assert_eq!(uuid.len(), 36);
            assert!(uuid.starts_with("0000"));
            assert!(uuid.ends_with("-0000-1000-8000-00805f9b34fb"));
            assert_eq!(*uuid, uuid.to_ascii_lowercase());
        }
    }
}
