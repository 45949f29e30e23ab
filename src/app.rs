/// Component wiring and the cooperative main loop step.
///
/// Construction order is explicit:
///
/// 1. Build the components into an `App` and call `initialize`.
/// 2. Build the `EventBus` *after* the `App` (handlers borrow it) and call
///    `App::subscribe`.
/// 3. Initialize the `RadioScanner`, then call `App::start`, which publishes
///    `SystemReady`.
/// 4. Loop on `App::tick`.
///
/// Subscriptions:
///
/// | topic            | handler                                              |
/// |------------------|------------------------------------------------------|
/// | WiFiFrame        | `ThreatAnalyzer::handle_wifi_frame`                   |
/// | BluetoothDevice  | `ThreatAnalyzer::handle_bluetooth_device`             |
/// | Threat           | telemetry report, then `AudioRequest(alert asset)`   |
/// | AudioRequest     | `SoundEngine::handle_audio_request`                  |
/// | SystemReady      | `AudioRequest(startup asset)`                        |
use core::cell::{Cell, Ref, RefCell};

use crate::analyzer::ThreatAnalyzer;
use crate::event::{AudioRequest, ThreatEvent};
use crate::event_bus::EventBus;
use crate::gps::GpsHandler;
use crate::scanner::{RadioDriver, RadioScanner};
use crate::sound::{AudioSink, SoundEngine, Storage};
use crate::telemetry::{ReportSink, TelemetryReporter};

/// Main-loop owned components. Everything here is touched only from the
/// main loop; interior mutability lets bus handlers share it by reference.
pub struct App<S: Storage, A: AudioSink, K: ReportSink> {
    analyzer: ThreatAnalyzer,
    reporter: TelemetryReporter,
    sound: RefCell<SoundEngine<S, A>>,
    gps: RefCell<GpsHandler>,
    reports: RefCell<K>,
    now_ms: Cell<u32>,
}

impl<S: Storage, A: AudioSink, K: ReportSink> App<S, A, K> {
    pub fn new(analyzer: ThreatAnalyzer, sound: SoundEngine<S, A>, gps: GpsHandler, reports: K) -> Self {
        Self {
            analyzer,
            reporter: TelemetryReporter::new(),
            sound: RefCell::new(sound),
            gps: RefCell::new(gps),
            reports: RefCell::new(reports),
            now_ms: Cell::new(0),
        }
    }

    /// Initialize every main-loop component. Failures inside (storage
    /// mount, for one) are logged by the component and leave it degraded.
    pub fn initialize(&mut self, now_ms: u32) {
        self.now_ms.set(now_ms);
        self.analyzer.initialize();
        self.reporter.initialize(now_ms);
        self.sound.get_mut().initialize();
        self.gps.get_mut().initialize();
    }

    /// Register every handler. Replaces any earlier subscriptions.
    pub fn subscribe<'a>(&'a self, bus: &mut EventBus<'a>) {
        bus.subscribe_wifi_frame(move |bus, frame| self.analyzer.handle_wifi_frame(bus, frame));
        bus.subscribe_bluetooth_device(move |bus, device| {
            self.analyzer.handle_bluetooth_device(bus, device)
        });
        bus.subscribe_threat(move |bus, threat| self.on_threat(bus, threat));
        bus.subscribe_audio_request(move |_, request| {
            self.sound.borrow_mut().handle_audio_request(request)
        });
        bus.subscribe_system_ready(move |bus| {
            let sound = self.sound.borrow().config().startup_asset;
            bus.publish_audio_request(&AudioRequest { sound });
        });
    }

    /// Announce that every component is up.
    pub fn start(&self, bus: &EventBus<'_>) {
        log::info!("FlockSquawk ready on {}", crate::board::BOARD_NAME);
        bus.publish_system_ready();
    }

    /// One main-loop iteration: advance the radio schedule, publish what
    /// the driver callbacks queued, then feed the speaker one chunk.
    pub fn tick<D: RadioDriver, const N: usize>(
        &self,
        scanner: &mut RadioScanner<'_, D, N>,
        bus: &EventBus<'_>,
        now_ms: u32,
    ) {
        self.now_ms.set(now_ms);
        scanner.update(now_ms);
        scanner.publish_pending(bus);
        self.sound.borrow_mut().update();
    }

    /// Bytes read from the GPS UART
    pub fn feed_gps(&self, bytes: &[u8], now_ms: u32) {
        self.gps.borrow_mut().feed_bytes(bytes, now_ms);
    }

    pub fn sound(&self) -> Ref<'_, SoundEngine<S, A>> {
        self.sound.borrow()
    }

    pub fn gps(&self) -> Ref<'_, GpsHandler> {
        self.gps.borrow()
    }

    pub fn reports(&self) -> Ref<'_, K> {
        self.reports.borrow()
    }

    fn on_threat(&self, bus: &EventBus<'_>, threat: &ThreatEvent) {
        let now_ms = self.now_ms.get();
        let fix = self.gps.borrow().fix(now_ms);
        self.reporter
            .handle_threat_detection(threat, now_ms, fix.as_ref(), &mut *self.reports.borrow_mut());

        // Copied out so the sound engine is not borrowed during dispatch
        let sound = self.sound.borrow().config().alert_asset;
        bus.publish_audio_request(&AudioRequest { sound });
    }
}
