/// NMEA 0183 receiver for the GPS module on the board UART.
///
/// Bytes are fed one at a time from the serial port. Complete `$..*hh`
/// sentences are checksum-verified, and `GGA` and `RMC` sentences from any
/// talker (GP, GN, GL, ...) update the stored position, quality and UTC
/// time. Everything else is counted and ignored.
use core::fmt::Write;

use heapless::{String, Vec};

/// Longest sentence NMEA 0183 allows, including `$` and `*hh`
pub const MAX_SENTENCE_LEN: usize = 82;

/// A fix older than this is not reported
pub const MAX_FIX_AGE_MS: u32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsConfig {
    pub max_fix_age_ms: u32,
}

impl GpsConfig {
    pub const fn new() -> Self {
        Self {
            max_fix_age_ms: MAX_FIX_AGE_MS,
        }
    }
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// "YYYY-MM-DDTHH:MM:SSZ"
pub type IsoTimestamp = String<20>;

impl UtcDateTime {
    pub fn to_iso8601(&self) -> IsoTimestamp {
        let mut s = IsoTimestamp::new();
        // 20 bytes always fit
        let _ = write!(
            s,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        );
        s
    }
}

/// Snapshot of a fresh position fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: Option<f32>,
    pub satellites: Option<u8>,
    pub hdop: Option<f32>,
    pub age_ms: u32,
    pub utc: Option<UtcDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Date {
    year: u16,
    month: u8,
    day: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Time {
    hour: u8,
    minute: u8,
    second: u8,
}

pub struct GpsHandler {
    config: GpsConfig,
    line: Vec<u8, MAX_SENTENCE_LEN>,
    in_sentence: bool,

    location: Option<(f64, f64)>,
    location_at: u32,
    altitude_m: Option<f32>,
    satellites: Option<u8>,
    hdop: Option<f32>,
    date: Option<Date>,
    time: Option<Time>,

    chars_processed: u32,
    sentences_with_fix: u32,
    passed_checksum: u32,
    failed_checksum: u32,
}

impl GpsHandler {
    pub const fn new(config: GpsConfig) -> Self {
        Self {
            config,
            line: Vec::new(),
            in_sentence: false,
            location: None,
            location_at: 0,
            altitude_m: None,
            satellites: None,
            hdop: None,
            date: None,
            time: None,
            chars_processed: 0,
            sentences_with_fix: 0,
            passed_checksum: 0,
            failed_checksum: 0,
        }
    }

    pub fn initialize(&self) {
        log::info!(
            "GPS on UART RX GPIO{} / TX GPIO{} @ {} baud",
            crate::board::GPS_RX_PIN,
            crate::board::GPS_TX_PIN,
            crate::board::GPS_BAUD_RATE,
        );
    }

    /// Feed one byte from the UART. `now_ms` timestamps any fix it completes.
    pub fn feed(&mut self, byte: u8, now_ms: u32) {
        self.chars_processed = self.chars_processed.wrapping_add(1);

        match byte {
            b'$' => {
                self.line.clear();
                self.in_sentence = true;
            }
            b'\r' | b'\n' => {
                if self.in_sentence && !self.line.is_empty() {
                    let line = self.line.clone();
                    self.line.clear();
                    self.process_sentence(&line, now_ms);
                }
                self.in_sentence = false;
            }
            _ if self.in_sentence => {
                if self.line.push(byte).is_err() {
                    // Overlong, not NMEA
                    self.line.clear();
                    self.in_sentence = false;
                }
            }
            _ => {}
        }
    }

    pub fn feed_bytes(&mut self, bytes: &[u8], now_ms: u32) {
        for &b in bytes {
            self.feed(b, now_ms);
        }
    }

    // ── Fix ──────────────────────────────────────────────────────────

    /// A location has been received and is younger than the age limit.
    pub fn has_valid_fix(&self, now_ms: u32) -> bool {
        self.location.is_some() && self.fix_age(now_ms).is_some_and(|age| age < self.config.max_fix_age_ms)
    }

    /// Milliseconds since the location was last updated
    pub fn fix_age(&self, now_ms: u32) -> Option<u32> {
        self.location.map(|_| now_ms.wrapping_sub(self.location_at))
    }

    pub fn fix(&self, now_ms: u32) -> Option<GpsFix> {
        if !self.has_valid_fix(now_ms) {
            return None;
        }
        let (latitude, longitude) = self.location?;
        Some(GpsFix {
            latitude,
            longitude,
            altitude_m: self.altitude_m,
            satellites: self.satellites,
            hdop: self.hdop,
            age_ms: now_ms.wrapping_sub(self.location_at),
            utc: self.utc(),
        })
    }

    pub fn latitude(&self) -> Option<f64> {
        self.location.map(|(lat, _)| lat)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.location.map(|(_, lon)| lon)
    }

    pub fn altitude(&self) -> Option<f32> {
        self.altitude_m
    }

    pub fn satellites(&self) -> Option<u8> {
        self.satellites
    }

    pub fn hdop(&self) -> Option<f32> {
        self.hdop
    }

    /// UTC date and time, once both have been seen
    pub fn utc(&self) -> Option<UtcDateTime> {
        let (d, t) = (self.date?, self.time?);
        Some(UtcDateTime {
            year: d.year,
            month: d.month,
            day: d.day,
            hour: t.hour,
            minute: t.minute,
            second: t.second,
        })
    }

    // ── Counters ─────────────────────────────────────────────────────

    pub fn chars_processed(&self) -> u32 {
        self.chars_processed
    }

    pub fn sentences_with_fix(&self) -> u32 {
        self.sentences_with_fix
    }

    pub fn passed_checksum(&self) -> u32 {
        self.passed_checksum
    }

    pub fn failed_checksum(&self) -> u32 {
        self.failed_checksum
    }

    // ── Parsing ──────────────────────────────────────────────────────

    /// `line` is everything between `$` and the line ending.
    fn process_sentence(&mut self, line: &[u8], now_ms: u32) {
        let Some(body) = self.verify_checksum(line) else {
            return;
        };
        let Ok(body) = core::str::from_utf8(body) else {
            return;
        };

        let mut fields = body.split(',');
        let Some(id) = fields.next() else {
            return;
        };
        if id.len() != 5 || !id.is_ascii() {
            return;
        }
        match &id[2..] {
            "GGA" => self.parse_gga(fields, now_ms),
            "RMC" => self.parse_rmc(fields, now_ms),
            _ => {}
        }
    }

    fn verify_checksum<'l>(&mut self, line: &'l [u8]) -> Option<&'l [u8]> {
        let star = line.iter().rposition(|&b| b == b'*');
        let valid = star.and_then(|star| {
            let hex = line.get(star + 1..star + 3)?;
            let expected = u8::from_str_radix(core::str::from_utf8(hex).ok()?, 16).ok()?;
            let body = &line[..star];
            let actual = body.iter().fold(0u8, |acc, b| acc ^ b);
            (actual == expected).then_some(body)
        });

        match valid {
            Some(body) => {
                self.passed_checksum = self.passed_checksum.wrapping_add(1);
                Some(body)
            }
            None => {
                self.failed_checksum = self.failed_checksum.wrapping_add(1);
                log::debug!("NMEA checksum failed");
                None
            }
        }
    }

    /// time, lat, N/S, lon, E/W, quality, satellites, hdop, altitude, ...
    fn parse_gga<'s>(&mut self, mut f: impl Iterator<Item = &'s str>, now_ms: u32) {
        let time = f.next().and_then(parse_time);
        let lat = coordinate(f.next(), f.next(), 2);
        let lon = coordinate(f.next(), f.next(), 3);
        let quality = f.next().and_then(|q| q.parse::<u8>().ok()).unwrap_or(0);
        let satellites = f.next().and_then(|s| s.parse::<u8>().ok());
        let hdop = f.next().and_then(|h| h.parse::<f32>().ok());
        let altitude = f.next().and_then(|a| a.parse::<f32>().ok());

        if time.is_some() {
            self.time = time;
        }
        if satellites.is_some() {
            self.satellites = satellites;
        }
        if hdop.is_some() {
            self.hdop = hdop;
        }
        if quality > 0 {
            if let (Some(lat), Some(lon)) = (lat, lon) {
                self.set_location(lat, lon, now_ms);
                if altitude.is_some() {
                    self.altitude_m = altitude;
                }
            }
        }
    }

    /// time, status, lat, N/S, lon, E/W, speed, course, date, ...
    fn parse_rmc<'s>(&mut self, mut f: impl Iterator<Item = &'s str>, now_ms: u32) {
        let time = f.next().and_then(parse_time);
        let active = f.next() == Some("A");
        let lat = coordinate(f.next(), f.next(), 2);
        let lon = coordinate(f.next(), f.next(), 3);
        let _speed = f.next();
        let _course = f.next();
        let date = f.next().and_then(parse_date);

        if time.is_some() {
            self.time = time;
        }
        if date.is_some() {
            self.date = date;
        }
        if active {
            if let (Some(lat), Some(lon)) = (lat, lon) {
                self.set_location(lat, lon, now_ms);
            }
        }
    }

    fn set_location(&mut self, lat: f64, lon: f64, now_ms: u32) {
        self.location = Some((lat, lon));
        self.location_at = now_ms;
        self.sentences_with_fix = self.sentences_with_fix.wrapping_add(1);
    }
}

impl Default for GpsHandler {
    fn default() -> Self {
        Self::new(GpsConfig::new())
    }
}

/// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere to signed decimal degrees
fn coordinate(value: Option<&str>, hemisphere: Option<&str>, degree_digits: usize) -> Option<f64> {
    let value = value?;
    if value.len() <= degree_digits || !value.is_char_boundary(degree_digits) {
        return None;
    }
    let degrees: f64 = value[..degree_digits].parse::<u16>().ok()?.into();
    let minutes: f64 = value[degree_digits..].parse().ok()?;
    if minutes >= 60.0 {
        return None;
    }
    let abs = degrees + minutes / 60.0;
    match hemisphere? {
        "N" | "E" => Some(abs),
        "S" | "W" => Some(-abs),
        _ => None,
    }
}

/// `hhmmss[.sss]`
fn parse_time(s: &str) -> Option<Time> {
    let [h, m, s] = two_digit_fields(s)?;
    (h < 24 && m < 60 && s < 61).then_some(Time {
        hour: h,
        minute: m,
        second: s,
    })
}

/// `ddmmyy`
fn parse_date(s: &str) -> Option<Date> {
    if s.len() != 6 {
        return None;
    }
    let [d, m, y] = two_digit_fields(s)?;
    ((1..=31).contains(&d) && (1..=12).contains(&m)).then_some(Date {
        year: 2000 + y as u16,
        month: m,
        day: d,
    })
}

fn two_digit_fields(s: &str) -> Option<[u8; 3]> {
    let b = s.as_bytes();
    if b.len() < 6 || !b[..6].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let pair = |i: usize| (b[i] - b'0') * 10 + (b[i + 1] - b'0');
    Some([pair(0), pair(2), pair(4)])
}

#[cfg(test)]
mod tests {
    use super::*;

    const GGA: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";
    const RMC: &[u8] = b"$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n";

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn parses_gga_fix() {
        let mut gps = GpsHandler::default();
        gps.feed_bytes(GGA, 1000);

        assert_eq!(gps.passed_checksum(), 1);
        assert_eq!(gps.sentences_with_fix(), 1);
        assert!(close(gps.latitude().unwrap(), 48.0 + 7.038 / 60.0));
        assert!(close(gps.longitude().unwrap(), 11.0 + 31.0 / 60.0));
        assert_eq!(gps.altitude(), Some(545.4));
        assert_eq!(gps.satellites(), Some(8));
        assert_eq!(gps.hdop(), Some(0.9));
        assert_eq!(gps.chars_processed() as usize, GGA.len());
    }

    #[test]
    fn rmc_supplies_date() {
        let mut gps = GpsHandler::default();
        gps.feed_bytes(RMC, 0);
        let utc = gps.utc().unwrap();
        assert_eq!(
            utc,
            UtcDateTime {
                year: 2094,
                month: 3,
                day: 23,
                hour: 12,
                minute: 35,
                second: 19
            }
        );
        assert_eq!(utc.to_iso8601().as_str(), "2094-03-23T12:35:19Z");
    }

    #[test]
    fn fix_expires_after_max_age() {
        let mut gps = GpsHandler::default();
        assert!(!gps.has_valid_fix(0));
        assert!(gps.fix(0).is_none());

        gps.feed_bytes(GGA, 10_000);
        assert!(gps.has_valid_fix(10_000));
        assert!(gps.has_valid_fix(11_999));
        assert!(!gps.has_valid_fix(12_000));
        assert!(gps.fix(12_000).is_none());
        // Stale position is still readable
        assert!(gps.latitude().is_some());

        let fix = gps.fix(10_500).unwrap();
        assert_eq!(fix.age_ms, 500);
        assert_eq!(fix.satellites, Some(8));
    }

    #[test]
    fn fix_age_survives_millis_wraparound() {
        let mut gps = GpsHandler::default();
        gps.feed_bytes(GGA, u32::MAX - 100);
        assert_eq!(gps.fix_age(400), Some(501));
        assert!(gps.has_valid_fix(400));
    }

    #[test]
    fn bad_checksum_is_counted_and_ignored() {
        let mut gps = GpsHandler::default();
        gps.feed_bytes(b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*48\r\n", 0);
        assert_eq!(gps.failed_checksum(), 1);
        assert!(gps.latitude().is_none());

        gps.feed_bytes(b"$GPGGA,123519,4807.038,N\r\n", 0);
        assert_eq!(gps.failed_checksum(), 2);
    }

    #[test]
    fn no_fix_quality_leaves_location_unset() {
        // Quality 0, checksum recomputed for the edited sentence
        let body = b"GPGGA,123519,4807.038,N,01131.000,E,0,00,,,M,,M,,";
        let sum = body.iter().fold(0u8, |a, b| a ^ b);
        let mut line = std::vec::Vec::new();
        line.push(b'$');
        line.extend_from_slice(body);
        line.extend_from_slice(std::format!("*{:02X}\n", sum).as_bytes());

        let mut gps = GpsHandler::default();
        gps.feed_bytes(&line, 0);
        assert_eq!(gps.passed_checksum(), 1);
        assert_eq!(gps.sentences_with_fix(), 0);
        assert!(gps.latitude().is_none());
    }

    #[test]
    fn southern_western_hemispheres_are_negative() {
        assert!(close(coordinate(Some("3351.000"), Some("S"), 2).unwrap(), -33.85));
        assert!(close(coordinate(Some("15112.000"), Some("W"), 3).unwrap(), -151.2));
        assert_eq!(coordinate(Some(""), Some("N"), 2), None);
        assert_eq!(coordinate(Some("4807.038"), Some("X"), 2), None);
    }

    #[test]
    fn other_talkers_and_noise() {
        let mut gps = GpsHandler::default();
        gps.feed_bytes(b"garbage before the dollar", 0);
        let gn: std::vec::Vec<u8> = GGA
            .iter()
            .map(|&b| if b == b'P' { b'N' } else { b })
            .collect();
        // GP -> GN flips one bit in the XOR: 'P' ^ 'N' = 0x1e
        let text = std::string::String::from_utf8(gn).unwrap().replace("*47", "*59");
        gps.feed_bytes(text.as_bytes(), 5);
        assert_eq!(gps.sentences_with_fix(), 1);
    }

    #[test]
    fn overlong_line_is_discarded() {
        let mut gps = GpsHandler::default();
        gps.feed(b'$', 0);
        for _ in 0..200 {
            gps.feed(b'A', 0);
        }
        gps.feed(b'\n', 0);
        assert_eq!(gps.passed_checksum(), 0);
        assert_eq!(gps.failed_checksum(), 0);
        gps.feed_bytes(GGA, 0);
        assert_eq!(gps.sentences_with_fix(), 1);
    }
}
