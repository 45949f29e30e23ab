/// Time-sliced WiFi sniffer and BLE scanning engine.
///
/// WiFi: promiscuous capture stays on while `update()` hops channels
/// 1..=13, dwelling a fixed time on each. BLE: a short scan window is
/// launched at a fixed interval after the previous window completed. The
/// two share one radio, so both timers are serviced from the same
/// non-blocking `update()` call, each with its own elapsed-time check.
///
/// Driver callbacks (`RadioLink::on_wifi_frame`, `on_ble_advertisement`,
/// `on_ble_scan_complete`) may run in any context. They parse into owned
/// observations and push them into the observation queue; the main loop
/// publishes them with `RadioScanner::publish_pending`.
use core::fmt::Write;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use ieee80211::match_frames;
use ieee80211::mgmt_frame::{BeaconFrame, ProbeRequestFrame, ProbeResponseFrame};

use crate::error::RadioError;
use crate::event::{
    truncate_into, BluetoothDeviceEvent, FrameSubtype, MacAddress, Observation, UuidString,
    WiFiFrameEvent,
};
use crate::event_bus::EventBus;
use crate::queue::{DropPolicy, ObservationQueue, DEFAULT_QUEUE_DEPTH};
use crate::signatures::RAVEN_SERVICES;

/// Highest 2.4 GHz channel scanned
pub const MAX_WIFI_CHANNEL: u8 = 13;

/// Dwell time per WiFi channel
pub const CHANNEL_SWITCH_MS: u32 = 500;

/// Length of one BLE scan window
pub const BLE_SCAN_MS: u32 = 1000;

/// Gap between the end of one BLE scan and the start of the next
pub const BLE_SCAN_INTERVAL_MS: u32 = 5000;

/// Scanner timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    pub dwell_ms: u32,
    pub max_channel: u8,
    pub ble_scan_ms: u32,
    pub ble_interval_ms: u32,
}

impl ScanConfig {
    pub const fn new() -> Self {
        Self {
            dwell_ms: CHANNEL_SWITCH_MS,
            max_channel: MAX_WIFI_CHANNEL,
            ble_scan_ms: BLE_SCAN_MS,
            ble_interval_ms: BLE_SCAN_INTERVAL_MS,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Platform radio control used by the scanner.
///
/// Implementations must not block: `start_ble_scan` launches a window and
/// returns, and the platform reports the end of the window through
/// `RadioLink::on_ble_scan_complete`.
pub trait RadioDriver {
    /// Enable promiscuous capture of management frames.
    fn start_wifi_capture(&mut self) -> Result<(), RadioError>;
    fn set_wifi_channel(&mut self, channel: u8) -> Result<(), RadioError>;
    fn start_ble_scan(&mut self, duration_ms: u32) -> Result<(), RadioError>;
}

// ── Frame parsing ─────────────────────────────────────────────────────

/// Parse a raw 802.11 frame into a WiFi observation using the ieee80211
/// crate.
///
/// Only beacons, probe requests and probe responses produce an event.
/// A missing or non-UTF-8 SSID becomes an empty string; an oversized one is
/// truncated. Safe to call from driver context (no allocation, no
/// blocking).
pub fn parse_wifi_frame(frame: &[u8], rssi: i8, channel: u8) -> Option<WiFiFrameEvent> {
    let result = match_frames! {
        frame,
        beacon = BeaconFrame<'_> => {
            build_wifi_event(
                &beacon.header.transmitter_address.0,
                beacon.body.ssid(),
                rssi, channel, FrameSubtype::Beacon,
            )
        }
        probe_req = ProbeRequestFrame<'_> => {
            build_wifi_event(
                &probe_req.header.transmitter_address.0,
                probe_req.body.ssid(),
                rssi, channel, FrameSubtype::ProbeRequest,
            )
        }
        probe_resp = ProbeResponseFrame<'_> => {
            build_wifi_event(
                &probe_resp.header.transmitter_address.0,
                probe_resp.body.ssid(),
                rssi, channel, FrameSubtype::ProbeResponse,
            )
        }
    };

    result.ok()
}

fn build_wifi_event(
    mac: &MacAddress,
    ssid: Option<&str>,
    rssi: i8,
    channel: u8,
    subtype: FrameSubtype,
) -> WiFiFrameEvent {
    // Hidden networks broadcast a NUL-filled SSID
    let ssid = ssid.unwrap_or("").trim_end_matches('\0');
    WiFiFrameEvent {
        mac: *mac,
        ssid: truncate_into(ssid),
        rssi,
        channel,
        subtype,
    }
}

/// Parse BLE advertisement data (AD structures) into an observation.
///
/// AD structure format: [length] [type] [data...]
/// Types we care about:
///   0x02/0x03 = Incomplete/Complete list of 16-bit service UUIDs
///   0x04/0x05 = Incomplete/Complete list of 32-bit service UUIDs
///   0x06/0x07 = Incomplete/Complete list of 128-bit service UUIDs
///   0x08/0x09 = Shortened/Complete local name
///
/// One service UUID is kept, expanded to its 128-bit string form: the
/// first one listed in `preferred` if any is advertised, otherwise the
/// first one advertised. A complete local name wins over a shortened one.
pub struct BleAdvParser;

impl BleAdvParser {
    pub fn parse(addr: &MacAddress, rssi: i8, ad_data: &[u8]) -> BluetoothDeviceEvent {
        Self::parse_preferring(addr, rssi, ad_data, &[])
    }

    pub fn parse_preferring(
        addr: &MacAddress,
        rssi: i8,
        ad_data: &[u8],
        preferred: &[&str],
    ) -> BluetoothDeviceEvent {
        let mut event = BluetoothDeviceEvent {
            mac: *addr,
            name: heapless::String::new(),
            rssi,
            service_uuid: None,
        };
        let mut have_complete_name = false;
        let mut have_preferred_uuid = false;
        let mut offer = |event: &mut BluetoothDeviceEvent, uuid: UuidString| {
            if have_preferred_uuid {
                return;
            }
            if preferred.iter().any(|p| p.eq_ignore_ascii_case(&uuid)) {
                have_preferred_uuid = true;
                event.service_uuid = Some(uuid);
            } else if event.service_uuid.is_none() {
                event.service_uuid = Some(uuid);
            }
        };

        let mut pos = 0;
        while pos < ad_data.len() {
            let len = ad_data[pos] as usize;
            if len == 0 || pos + 1 + len > ad_data.len() {
                break;
            }

            let ad_type = ad_data[pos + 1];
            let data = &ad_data[pos + 2..pos + 1 + len];

            match ad_type {
                0x02 | 0x03 => {
                    for c in data.chunks_exact(2) {
                        let uuid = u16::from_le_bytes([c[0], c[1]]);
                        offer(&mut event, uuid_from_u32(uuid as u32));
                    }
                }
                0x04 | 0x05 => {
                    for c in data.chunks_exact(4) {
                        let uuid = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                        offer(&mut event, uuid_from_u32(uuid));
                    }
                }
                0x06 | 0x07 => {
                    for c in data.chunks_exact(16) {
                        let mut bytes = [0u8; 16];
                        bytes.copy_from_slice(c);
                        offer(&mut event, uuid_from_le_bytes(&bytes));
                    }
                }
                0x08 | 0x09 if !have_complete_name => {
                    let name = match core::str::from_utf8(data) {
                        Ok(name) => name,
                        // Keep the readable prefix of a mangled name
                        Err(e) => core::str::from_utf8(&data[..e.valid_up_to()]).unwrap_or(""),
                    };
                    event.name = truncate_into(name);
                    have_complete_name = ad_type == 0x09;
                }
                _ => {}
            }

            pos += 1 + len;
        }

        event
    }
}

/// Expand a 16- or 32-bit UUID onto the Bluetooth base UUID.
pub fn uuid_from_u32(short: u32) -> UuidString {
    let mut s = UuidString::new();
    let _ = write!(s, "{:08x}-0000-1000-8000-00805f9b34fb", short);
    s
}

/// Format a 128-bit UUID given in over-the-air (little-endian) byte order.
pub fn uuid_from_le_bytes(le: &[u8; 16]) -> UuidString {
    let mut be = *le;
    be.reverse();
    let mut s = UuidString::new();
    let _ = write!(
        s,
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        be[0], be[1], be[2], be[3], be[4], be[5], be[6], be[7],
        be[8], be[9], be[10], be[11], be[12], be[13], be[14], be[15]
    );
    s
}

// ── Callback-side shared state ────────────────────────────────────────

/// State shared between driver callbacks and the main loop.
///
/// Field ownership: `current_channel` and `ble_active = true` are written
/// by the main loop only; `ble_active = false` and `last_ble_scan` by the
/// scan-completion callback only. Observations cross through the queue.
pub struct RadioLink<const N: usize = DEFAULT_QUEUE_DEPTH> {
    queue: ObservationQueue<N>,
    current_channel: AtomicU8,
    ble_active: AtomicBool,
    last_ble_scan: AtomicU32,
}

impl<const N: usize> RadioLink<N> {
    pub const fn new(policy: DropPolicy) -> Self {
        Self {
            queue: ObservationQueue::new(policy),
            current_channel: AtomicU8::new(1),
            ble_active: AtomicBool::new(false),
            last_ble_scan: AtomicU32::new(0),
        }
    }

    /// WiFi promiscuous callback entry point.
    pub fn on_wifi_frame(&self, frame: &[u8], rssi: i8, channel: u8) {
        if let Some(event) = parse_wifi_frame(frame, rssi, channel) {
            self.queue.push(Observation::WiFi(event));
        }
    }

    /// BLE scan-result callback entry point.
    pub fn on_ble_advertisement(&self, addr: &MacAddress, rssi: i8, ad_data: &[u8]) {
        let event = BleAdvParser::parse_preferring(addr, rssi, ad_data, RAVEN_SERVICES);
        self.queue.push(Observation::Bluetooth(event));
    }

    /// BLE scan-window completion callback entry point.
    pub fn on_ble_scan_complete(&self, now_ms: u32) {
        self.last_ble_scan.store(now_ms, Ordering::Relaxed);
        self.ble_active.store(false, Ordering::Release);
    }

    pub fn current_channel(&self) -> u8 {
        self.current_channel.load(Ordering::Relaxed)
    }

    pub fn is_scanning_ble(&self) -> bool {
        self.ble_active.load(Ordering::Acquire)
    }

    pub fn queue(&self) -> &ObservationQueue<N> {
        &self.queue
    }
}

impl<const N: usize> Default for RadioLink<N> {
    fn default() -> Self {
        Self::new(DropPolicy::default())
    }
}

// ── Main-loop scanner ─────────────────────────────────────────────────

pub struct RadioScanner<'a, D: RadioDriver, const N: usize = DEFAULT_QUEUE_DEPTH> {
    driver: D,
    link: &'a RadioLink<N>,
    config: ScanConfig,
    last_channel_switch: u32,
    capture_active: bool,
}

impl<'a, D: RadioDriver, const N: usize> RadioScanner<'a, D, N> {
    pub fn new(driver: D, link: &'a RadioLink<N>, config: ScanConfig) -> Self {
        Self {
            driver,
            link,
            config,
            last_channel_switch: 0,
            capture_active: false,
        }
    }

    /// Start promiscuous capture on channel 1. The first BLE window opens
    /// one interval after `now_ms`. If capture fails to start it is retried
    /// at every dwell expiry until it does.
    pub fn initialize(&mut self, now_ms: u32) {
        self.start_capture();
        if let Err(e) = self.driver.set_wifi_channel(1) {
            log::warn!("{}, retrying next dwell", e);
        }
        self.link.current_channel.store(1, Ordering::Relaxed);
        self.link.last_ble_scan.store(now_ms, Ordering::Relaxed);
        self.last_channel_switch = now_ms;

        log::info!(
            "Radio scanner ready: {} ms dwell over channels 1-{}, {} ms BLE window every {} ms",
            self.config.dwell_ms,
            self.config.max_channel,
            self.config.ble_scan_ms,
            self.config.ble_interval_ms,
        );
    }

    /// Advance both sub-state timers. Never blocks.
    pub fn update(&mut self, now_ms: u32) {
        if now_ms.wrapping_sub(self.last_channel_switch) >= self.config.dwell_ms {
            if !self.capture_active {
                self.start_capture();
            }
            self.switch_wifi_channel(now_ms);
        }

        if !self.link.is_scanning_ble() {
            let last = self.link.last_ble_scan.load(Ordering::Relaxed);
            if now_ms.wrapping_sub(last) >= self.config.ble_interval_ms {
                self.perform_ble_scan(now_ms);
            }
        }
    }

    /// Publish every queued observation on the bus. Returns how many were
    /// published.
    pub fn publish_pending(&self, bus: &EventBus<'_>) -> usize {
        let mut count = 0;
        while let Some(observation) = self.link.queue.pop() {
            match observation {
                Observation::WiFi(ref frame) => bus.publish_wifi_frame(frame),
                Observation::Bluetooth(ref device) => bus.publish_bluetooth_device(device),
            }
            count += 1;
        }
        count
    }

    pub fn current_wifi_channel(&self) -> u8 {
        self.link.current_channel()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Whether promiscuous capture is running
    pub fn is_capturing(&self) -> bool {
        self.capture_active
    }

    fn start_capture(&mut self) {
        match self.driver.start_wifi_capture() {
            Ok(()) => {
                if !self.capture_active {
                    log::info!("WiFi sniffer started");
                }
                self.capture_active = true;
            }
            Err(e) => {
                self.capture_active = false;
                log::warn!("WiFi sniffer: {}, retrying next dwell", e);
            }
        }
    }

    fn switch_wifi_channel(&mut self, now_ms: u32) {
        let current = self.link.current_channel();
        let next = if current >= self.config.max_channel {
            1
        } else {
            current + 1
        };

        match self.driver.set_wifi_channel(next) {
            Ok(()) => self.link.current_channel.store(next, Ordering::Relaxed),
            Err(e) => log::warn!("{}, retrying next dwell", e),
        }
        self.last_channel_switch = now_ms;
    }

    fn perform_ble_scan(&mut self, now_ms: u32) {
        self.link.ble_active.store(true, Ordering::Release);
        if let Err(e) = self.driver.start_ble_scan(self.config.ble_scan_ms) {
            log::warn!("{}, retrying next interval", e);
            self.link.ble_active.store(false, Ordering::Release);
            self.link.last_ble_scan.store(now_ms, Ordering::Relaxed);
        } else {
            log::debug!("BLE scan started ({} ms)", self.config.ble_scan_ms);
        }
    }
}
