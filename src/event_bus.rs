/// Topic-based dispatcher between producers and consumers.
///
/// One handler slot per topic. Subscribing replaces whatever was there;
/// publishing calls the handler synchronously and returns once it has
/// finished, or does nothing if the slot is empty. The bus does no
/// queuing, no error handling and no reentrancy protection.
///
/// Handlers receive the bus itself so they can re-publish derived events
/// (a threat handler requesting audio, for example). That is how one event
/// reaches more than one consumer.
///
/// The bus is built and subscribed during setup, then shared by reference
/// in main-loop context. Handlers may borrow components that outlive the
/// bus (`'a`). Since handlers are not `Send`, the bus cannot be handed to
/// radio driver callbacks; those go through `queue::ObservationQueue`.
use alloc::boxed::Box;

use crate::event::{AudioRequest, BluetoothDeviceEvent, ThreatEvent, WiFiFrameEvent};

type Handler<'a, E> = Box<dyn Fn(&EventBus<'a>, &E) + 'a>;

struct Slot<'a, E> {
    handler: Option<Handler<'a, E>>,
}

impl<'a, E> Slot<'a, E> {
    const fn empty() -> Self {
        Self { handler: None }
    }

    fn set(&mut self, handler: Handler<'a, E>) {
        self.handler = Some(handler);
    }

    fn call(&self, bus: &EventBus<'a>, event: &E) {
        if let Some(handler) = &self.handler {
            handler(bus, event);
        }
    }
}

/// Process-wide event dispatcher
pub struct EventBus<'a> {
    wifi_frame: Slot<'a, WiFiFrameEvent>,
    bluetooth_device: Slot<'a, BluetoothDeviceEvent>,
    threat: Slot<'a, ThreatEvent>,
    system_ready: Slot<'a, ()>,
    audio_request: Slot<'a, AudioRequest>,
}

impl<'a> EventBus<'a> {
    pub const fn new() -> Self {
        Self {
            wifi_frame: Slot::empty(),
            bluetooth_device: Slot::empty(),
            threat: Slot::empty(),
            system_ready: Slot::empty(),
            audio_request: Slot::empty(),
        }
    }

    pub fn subscribe_wifi_frame(&mut self, handler: impl Fn(&EventBus<'a>, &WiFiFrameEvent) + 'a) {
        self.wifi_frame.set(Box::new(handler));
    }

    pub fn subscribe_bluetooth_device(
        &mut self,
        handler: impl Fn(&EventBus<'a>, &BluetoothDeviceEvent) + 'a,
    ) {
        self.bluetooth_device.set(Box::new(handler));
    }

    pub fn subscribe_threat(&mut self, handler: impl Fn(&EventBus<'a>, &ThreatEvent) + 'a) {
        self.threat.set(Box::new(handler));
    }

    pub fn subscribe_system_ready(&mut self, handler: impl Fn(&EventBus<'a>) + 'a) {
        self.system_ready.set(Box::new(move |bus: &EventBus<'a>, _: &()| handler(bus)));
    }

    pub fn subscribe_audio_request(&mut self, handler: impl Fn(&EventBus<'a>, &AudioRequest) + 'a) {
        self.audio_request.set(Box::new(handler));
    }

    pub fn publish_wifi_frame(&self, event: &WiFiFrameEvent) {
        self.wifi_frame.call(self, event);
    }

    pub fn publish_bluetooth_device(&self, event: &BluetoothDeviceEvent) {
        self.bluetooth_device.call(self, event);
    }

    pub fn publish_threat(&self, event: &ThreatEvent) {
        self.threat.call(self, event);
    }

    pub fn publish_system_ready(&self) {
        self.system_ready.call(self, &());
    }

    pub fn publish_audio_request(&self, event: &AudioRequest) {
        self.audio_request.call(self, event);
    }
}

impl Default for EventBus<'_> {
    fn default() -> Self {
        Self::new()
    }
}
