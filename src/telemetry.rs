/// Detection reports as newline-delimited JSON.
///
/// One record per threat:
///
/// ```text
/// {"event":"threat_detected","ms_since_boot":8123,
///  "source":{"radio":"wifi","channel":6,"rssi":-58,"frequency":2437},
///  "target":{"identity":"Flock-A1B2","mac":"58:8e:81:01:02:03","oui":"58:8e:81",
///            "label":"Surveillance Device","certainty":95},
///  "indicators":{"name_match":true,"mac_match":true,"uuid_match":false},
///  "location":{"lat":48.1173,"lon":11.5167,"alt":545.4,"satellites":8,
///              "hdop":0.9,"fix_age_ms":120,"utc":"2024-03-23T12:35:19Z"}}
/// ```
///
/// (one line on the wire). `frequency` is omitted for BLE, `location` when
/// no fresh GPS fix exists.
use heapless::Vec;
use serde::Serialize;

use crate::analyzer::{format_mac, oui_of};
use crate::event::{Indicators, MacString, OuiString, RadioType, ThreatCategory, ThreatEvent};
use crate::gps::{GpsFix, IsoTimestamp};

/// Maximum size of a serialized report, newline included. Covers the
/// worst case: a 63-byte identifier of control characters (6 bytes each as
/// `\u00XX`), every numeric field at its widest and a full location.
pub const MAX_REPORT_LEN: usize = 1024;

pub type ReportBuffer = Vec<u8, MAX_REPORT_LEN>;

pub const THREAT_EVENT: &str = "threat_detected";

/// Where finished report lines go (serial console, BLE notify, log, ...).
pub trait ReportSink {
    /// `line` is one complete JSON record including the trailing newline.
    fn emit(&mut self, line: &[u8]);
}

/// Writes each report through the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn emit(&mut self, line: &[u8]) {
        match core::str::from_utf8(line) {
            Ok(s) => log::info!("{}", s.trim_end()),
            Err(_) => log::warn!("Dropping non-UTF-8 report"),
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    event: &'static str,
    ms_since_boot: u32,
    source: Source,
    target: Target<'a>,
    indicators: &'a Indicators,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
}

#[derive(Serialize)]
struct Source {
    radio: RadioType,
    channel: u8,
    rssi: i8,
    /// Centre frequency in MHz
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency: Option<u16>,
}

#[derive(Serialize)]
struct Target<'a> {
    identity: &'a str,
    mac: MacString,
    oui: OuiString,
    label: ThreatCategory,
    certainty: u8,
}

#[derive(Serialize)]
struct Location {
    lat: f64,
    lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    alt: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    satellites: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hdop: Option<f32>,
    fix_age_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    utc: Option<IsoTimestamp>,
}

impl From<&GpsFix> for Location {
    fn from(fix: &GpsFix) -> Self {
        Self {
            lat: fix.latitude,
            lon: fix.longitude,
            alt: fix.altitude_m,
            satellites: fix.satellites,
            hdop: fix.hdop,
            fix_age_ms: fix.age_ms,
            utc: fix.utc.map(|t| t.to_iso8601()),
        }
    }
}

/// 2.4 GHz centre frequency for a WiFi channel
pub fn wifi_channel_mhz(channel: u8) -> Option<u16> {
    match channel {
        1..=13 => Some(2407 + 5 * channel as u16),
        14 => Some(2484),
        _ => None,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryReporter {
    boot_ms: u32,
}

impl TelemetryReporter {
    pub const fn new() -> Self {
        Self { boot_ms: 0 }
    }

    /// Record the boot reference time that `ms_since_boot` counts from.
    pub fn initialize(&mut self, now_ms: u32) {
        self.boot_ms = now_ms;
        log::info!("Telemetry reporter ready");
    }

    /// Serialize one threat as an NDJSON line.
    pub fn report(&self, threat: &ThreatEvent, now_ms: u32, fix: Option<&GpsFix>) -> Option<ReportBuffer> {
        let mut mac = MacString::new();
        format_mac(&threat.mac, &mut mac);

        let report = Report {
            event: THREAT_EVENT,
            ms_since_boot: now_ms.wrapping_sub(self.boot_ms),
            source: Source {
                radio: threat.radio,
                channel: threat.channel,
                rssi: threat.rssi,
                frequency: match threat.radio {
                    RadioType::WiFi => wifi_channel_mhz(threat.channel),
                    RadioType::Bluetooth => None,
                },
            },
            target: Target {
                identity: threat.identifier.as_str(),
                mac,
                oui: oui_of(&threat.mac),
                label: threat.category,
                certainty: threat.certainty,
            },
            indicators: &threat.indicators,
            location: fix.map(Location::from),
        };

        let mut out = ReportBuffer::new();
        out.resize(MAX_REPORT_LEN, 0).ok()?;
        match serde_json_core::to_slice(&report, &mut out[..MAX_REPORT_LEN - 1]) {
            Ok(len) => {
                out.truncate(len);
                out.push(b'\n').ok()?;
                Some(out)
            }
            Err(_) => {
                log::warn!("Threat report does not fit in {} bytes", MAX_REPORT_LEN);
                None
            }
        }
    }

    /// Serialize `threat` and hand the line to `sink`. Failures are logged
    /// and the report is skipped.
    pub fn handle_threat_detection(
        &self,
        threat: &ThreatEvent,
        now_ms: u32,
        fix: Option<&GpsFix>,
        sink: &mut dyn ReportSink,
    ) {
        if let Some(line) = self.report(threat, now_ms, fix) {
            sink.emit(&line);
        }
    }
}
