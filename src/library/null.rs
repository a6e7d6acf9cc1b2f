//! Null audio library (no sound output)
//!
//! Behaves like a device with no hardware behind it: devices and contexts
//! are virtual, listener properties are validated and stored, nothing is
//! rendered. Faults can be injected to exercise the backend's failure paths.

use super::{
    AudioLibrary, DEFAULT_AUXILIARY_SENDS, EFFECTS_EXTENSION, ErrorFlag, ListenerProperties,
};
use crate::error::LibraryError;
use crate::math::Pose;

/// Name of the single device the null library exposes.
pub const NULL_DEVICE_NAME: &str = "Null Output";

/// Failure to inject into the next matching library call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullFault {
    NoDevice,
    NoContext,
    ActivateContext,
    ListenerGain,
    ListenerPose,
    AuxiliarySends,
    MetersPerUnit,
    SpeedOfSound,
}

#[derive(Debug, PartialEq, Eq)]
pub struct NullDevice {
    id: u32,
}

impl NullDevice {
    pub fn id(&self) -> u32 {
        self.id
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct NullContext {
    id: u32,
    device: u32,
}

impl NullContext {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn device_id(&self) -> u32 {
        self.device
    }
}

#[derive(Debug, Default)]
pub struct NullLibrary {
    error: ErrorFlag,
    auxiliary_sends: Option<u32>,
    faults: Vec<NullFault>,
    next_id: u32,
    open_devices: usize,
    live_contexts: usize,
    current_context: Option<u32>,
    listener: ListenerProperties,
    extension_queries: usize,
}

impl NullLibrary {
    /// Null library without the effects extension.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise the effects extension with the default send count.
    pub fn with_effects(self) -> Self {
        self.with_auxiliary_sends(DEFAULT_AUXILIARY_SENDS)
    }

    /// Advertise the effects extension with `sends` auxiliary sends.
    pub fn with_auxiliary_sends(mut self, sends: u32) -> Self {
        self.auxiliary_sends = Some(sends);
        self
    }

    pub fn with_fault(mut self, fault: NullFault) -> Self {
        self.inject_fault(fault);
        self
    }

    /// Make the next call matching `fault` fail. Each fault fires once.
    pub fn inject_fault(&mut self, fault: NullFault) {
        self.faults.push(fault);
    }

    pub fn open_devices(&self) -> usize {
        self.open_devices
    }

    pub fn live_contexts(&self) -> usize {
        self.live_contexts
    }

    pub fn current_context(&self) -> Option<u32> {
        self.current_context
    }

    pub fn listener(&self) -> &ListenerProperties {
        &self.listener
    }

    /// Number of extension queries made so far.
    pub fn extension_queries(&self) -> usize {
        self.extension_queries
    }

    fn trip(&mut self, fault: NullFault) -> bool {
        match self.faults.iter().position(|f| *f == fault) {
            Some(index) => {
                self.faults.remove(index);
                true
            }
            None => false,
        }
    }

    /// Apply a listener update against the current context.
    fn update_listener(
        &mut self,
        fault: NullFault,
        apply: impl FnOnce(&mut ListenerProperties) -> Result<(), LibraryError>,
    ) {
        if self.trip(fault) {
            self.error.raise(LibraryError::InvalidOperation);
            return;
        }
        if self.current_context.is_none() {
            self.error.raise(LibraryError::InvalidOperation);
            return;
        }
        let result = apply(&mut self.listener);
        self.error.record(result);
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl AudioLibrary for NullLibrary {
    type Device = NullDevice;
    type Context = NullContext;

    fn take_error(&mut self) -> Option<LibraryError> {
        self.error.take()
    }

    fn open_device(&mut self, name: Option<&str>) -> Option<NullDevice> {
        if self.trip(NullFault::NoDevice) {
            return None;
        }
        if name.is_some_and(|name| name != NULL_DEVICE_NAME) {
            return None;
        }

        self.open_devices += 1;
        Some(NullDevice { id: self.next_id() })
    }

    fn create_context(&mut self, device: &NullDevice) -> Option<NullContext> {
        if self.trip(NullFault::NoContext) {
            self.error.raise(LibraryError::InvalidDevice);
            return None;
        }

        self.live_contexts += 1;
        Some(NullContext {
            id: self.next_id(),
            device: device.id,
        })
    }

    fn make_context_current(&mut self, context: Option<&NullContext>) -> bool {
        if context.is_some() && self.trip(NullFault::ActivateContext) {
            self.error.raise(LibraryError::InvalidContext);
            return false;
        }

        self.current_context = context.map(|c| c.id);
        true
    }

    fn set_listener_gain(&mut self, gain: f32) {
        self.update_listener(NullFault::ListenerGain, |l| l.set_gain(gain));
    }

    fn set_listener_pose(&mut self, pose: &Pose) {
        self.update_listener(NullFault::ListenerPose, |l| l.set_pose(pose));
    }

    fn is_extension_present(&mut self, _device: &NullDevice, name: &str) -> bool {
        self.extension_queries += 1;
        name == EFFECTS_EXTENSION && self.auxiliary_sends.is_some()
    }

    fn max_auxiliary_sends(&mut self, _device: &NullDevice) -> u32 {
        if self.trip(NullFault::AuxiliarySends) {
            self.error.raise(LibraryError::InvalidDevice);
            return 0;
        }
        match self.auxiliary_sends {
            Some(sends) => sends,
            None => {
                self.error.raise(LibraryError::InvalidEnum);
                0
            }
        }
    }

    fn set_meters_per_unit(&mut self, meters: f32) {
        if self.auxiliary_sends.is_none() {
            self.error.raise(LibraryError::InvalidEnum);
            return;
        }
        self.update_listener(NullFault::MetersPerUnit, |l| l.set_meters_per_unit(meters));
    }

    fn set_speed_of_sound(&mut self, speed: f32) {
        self.update_listener(NullFault::SpeedOfSound, |l| l.set_speed_of_sound(speed));
    }

    fn close_device(&mut self, _device: NullDevice) {
        self.open_devices = self.open_devices.saturating_sub(1);
    }

    fn destroy_context(&mut self, context: NullContext) {
        if self.current_context == Some(context.id) {
            self.current_context = None;
        }
        self.live_contexts = self.live_contexts.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_device() {
        let mut library = NullLibrary::new();
        assert!(library.open_device(Some("Speakers")).is_none());
        assert!(library.open_device(Some(NULL_DEVICE_NAME)).is_some());
        assert_eq!(library.open_devices(), 1);
    }

    #[test]
    fn test_listener_requires_current_context() {
        let mut library = NullLibrary::new();
        library.set_listener_gain(0.5);
        assert_eq!(library.take_error(), Some(LibraryError::InvalidOperation));

        let device = library.open_device(None).unwrap();
        let context = library.create_context(&device).unwrap();
        assert!(library.make_context_current(Some(&context)));

        library.set_listener_gain(0.5);
        assert_eq!(library.take_error(), None);
        assert_eq!(library.listener().gain, 0.5);
    }

    #[test]
    fn test_faults_fire_once() {
        let mut library = NullLibrary::new().with_fault(NullFault::NoDevice);
        assert!(library.open_device(None).is_none());
        assert!(library.open_device(None).is_some());
    }

    #[test]
    fn test_extension_query() {
        let mut plain = NullLibrary::new();
        let device = plain.open_device(None).unwrap();
        assert!(!plain.is_extension_present(&device, EFFECTS_EXTENSION));
        assert_eq!(plain.max_auxiliary_sends(&device), 0);
        assert_eq!(plain.take_error(), Some(LibraryError::InvalidEnum));

        let mut effects = NullLibrary::new().with_auxiliary_sends(4);
        let device = effects.open_device(None).unwrap();
        assert!(effects.is_extension_present(&device, EFFECTS_EXTENSION));
        assert!(!effects.is_extension_present(&device, "ALC_EXT_UNKNOWN"));
        assert_eq!(effects.max_auxiliary_sends(&device), 4);
        assert_eq!(effects.take_error(), None);
        assert_eq!(effects.extension_queries(), 2);
    }

    #[test]
    fn test_release_tracking() {
        let mut library = NullLibrary::new();
        let device = library.open_device(None).unwrap();
        let context = library.create_context(&device).unwrap();
        library.make_context_current(Some(&context));
        assert_eq!(context.device_id(), device.id());

        library.close_device(device);
        library.destroy_context(context);

        assert_eq!(library.open_devices(), 0);
        assert_eq!(library.live_contexts(), 0);
        assert_eq!(library.current_context(), None);
    }
}
