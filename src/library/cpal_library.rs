//! Audio library backed by cpal, with Steam Audio providing effects
//!
//! Each context owns an output stream on its device. The stream renders
//! only while its context is current, and scales whatever the fill
//! callback produces by the listener gain. The effects extension is
//! reported when a Steam Audio context can be created for the device; the
//! check runs once per device and is cached.

use std::cell::OnceCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};

use super::{
    AudioLibrary, DEFAULT_AUXILIARY_SENDS, EFFECTS_EXTENSION, ErrorFlag, ListenerProperties,
};
use crate::error::LibraryError;
use crate::math::Pose;

/// Callback that renders into an interleaved f32 buffer
///
/// Receives the buffer, the stream sample rate and channel count, and
/// returns the number of frames it filled.
pub type FillCallback = dyn Fn(&mut [f32], u32, u16) -> usize + Send + Sync;

/// No context is current.
const NO_CONTEXT: u64 = 0;

/// State read by the stream callbacks.
struct RenderShared {
    gain_bits: AtomicU32,
    current_context: AtomicU64,
    frames_rendered: AtomicUsize,
}

pub struct CpalDevice {
    device: cpal::Device,
    name: String,
    effects: OnceCell<Option<audionimbus::Context>>,
}

impl CpalDevice {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn effects_available(&self) -> bool {
        self.effects
            .get_or_init(|| {
                match audionimbus::Context::try_new(&audionimbus::ContextSettings::default()) {
                    Ok(context) => {
                        log::info!("Steam Audio effects available on '{}'", self.name);
                        Some(context)
                    }
                    Err(e) => {
                        log::warn!("Steam Audio effects unavailable on '{}': {}", self.name, e);
                        None
                    }
                }
            })
            .is_some()
    }
}

pub struct CpalContext {
    id: u64,
    stream: cpal::Stream,
    stream_config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
}

impl CpalContext {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.stream_config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.stream_config.channels
    }

    pub fn sample_format(&self) -> cpal::SampleFormat {
        self.sample_format
    }
}

pub struct CpalLibrary {
    host: cpal::Host,
    error: ErrorFlag,
    auxiliary_sends: u32,
    current_context: Option<u64>,
    next_context_id: u64,
    listener: ListenerProperties,
    shared: Arc<RenderShared>,
    fill_callback: Option<Arc<FillCallback>>,
}

impl CpalLibrary {
    /// Library on the platform's default cpal host.
    pub fn new() -> Self {
        Self::with_host(cpal::default_host())
    }

    pub fn with_host(host: cpal::Host) -> Self {
        log::debug!("Using cpal host {:?}", host.id());
        let listener = ListenerProperties::default();
        Self {
            host,
            error: ErrorFlag::default(),
            auxiliary_sends: DEFAULT_AUXILIARY_SENDS,
            current_context: None,
            next_context_id: NO_CONTEXT,
            shared: Arc::new(RenderShared {
                gain_bits: AtomicU32::new(listener.gain.to_bits()),
                current_context: AtomicU64::new(NO_CONTEXT),
                frames_rendered: AtomicUsize::new(0),
            }),
            listener,
            fill_callback: None,
        }
    }

    /// Ceiling on auxiliary sends reported for devices with effects.
    ///
    /// Steam Audio has no per-device send limit, so the count is the number
    /// of effect slots the host is prepared to route, not a hardware value.
    pub fn auxiliary_sends(mut self, sends: u32) -> Self {
        self.auxiliary_sends = sends;
        self
    }

    /// Set the callback that renders source audio. Applies to contexts
    /// created afterwards.
    pub fn set_fill_callback<F>(&mut self, callback: F)
    where
        F: Fn(&mut [f32], u32, u16) -> usize + Send + Sync + 'static,
    {
        self.fill_callback = Some(Arc::new(callback));
    }

    pub fn listener(&self) -> &ListenerProperties {
        &self.listener
    }

    pub fn current_context(&self) -> Option<u64> {
        self.current_context
    }

    /// Gain the output streams currently apply.
    pub fn output_gain(&self) -> f32 {
        f32::from_bits(self.shared.gain_bits.load(Ordering::Relaxed))
    }

    /// Frames rendered by the fill callback across all contexts.
    pub fn frames_rendered(&self) -> usize {
        self.shared.frames_rendered.load(Ordering::Relaxed)
    }

    fn find_device(&self, name: &str) -> Option<cpal::Device> {
        let devices = match self.host.output_devices() {
            Ok(devices) => devices,
            Err(e) => {
                log::warn!("Failed to enumerate output devices: {}", e);
                return None;
            }
        };

        devices
            .into_iter()
            .find(|device| device.name().map(|n| n == name).unwrap_or(false))
    }

    fn update_listener(
        &mut self,
        apply: impl FnOnce(&mut ListenerProperties) -> Result<(), LibraryError>,
    ) {
        if self.current_context.is_none() {
            self.error.raise(LibraryError::InvalidOperation);
            return;
        }
        let result = apply(&mut self.listener);
        self.error.record(result);
    }

    fn set_current(&mut self, id: Option<u64>) {
        self.current_context = id;
        self.shared
            .current_context
            .store(id.unwrap_or(NO_CONTEXT), Ordering::Relaxed);
    }

    /// Build a stream that renders only while context `id` is current.
    fn build_stream<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        id: u64,
    ) -> Result<cpal::Stream, cpal::BuildStreamError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let shared = self.shared.clone();
        let fill_callback = self.fill_callback.clone();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;

        device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if shared.current_context.load(Ordering::Relaxed) != id {
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0f32);
                    }
                    return;
                }

                let gain = f32::from_bits(shared.gain_bits.load(Ordering::Relaxed));
                let mut temp_buffer = vec![0.0f32; data.len()];
                let frames_filled = match &fill_callback {
                    Some(fill) => fill(&mut temp_buffer, sample_rate, channels),
                    None => 0,
                };

                for (sample, value) in data.iter_mut().zip(temp_buffer.iter()) {
                    *sample = T::from_sample(value * gain);
                }

                shared
                    .frames_rendered
                    .fetch_add(frames_filled, Ordering::Relaxed);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
    }
}

impl Default for CpalLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioLibrary for CpalLibrary {
    type Device = CpalDevice;
    type Context = CpalContext;

    fn take_error(&mut self) -> Option<LibraryError> {
        self.error.take()
    }

    fn open_device(&mut self, name: Option<&str>) -> Option<CpalDevice> {
        let device = match name {
            Some(name) => self.find_device(name),
            None => self.host.default_output_device(),
        }?;

        let name = device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string());
        log::info!("Opened audio device '{}'", name);

        Some(CpalDevice {
            device,
            name,
            effects: OnceCell::new(),
        })
    }

    fn create_context(&mut self, device: &CpalDevice) -> Option<CpalContext> {
        let default_config = match device.device.default_output_config() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("No output configuration for '{}': {}", device.name, e);
                self.error.raise(LibraryError::InvalidDevice);
                return None;
            }
        };

        let id = self.next_context_id + 1;
        let stream_config = default_config.config();
        let sample_format = default_config.sample_format();

        let stream = match sample_format {
            cpal::SampleFormat::F32 => self.build_stream::<f32>(&device.device, &stream_config, id),
            cpal::SampleFormat::I16 => self.build_stream::<i16>(&device.device, &stream_config, id),
            cpal::SampleFormat::U16 => self.build_stream::<u16>(&device.device, &stream_config, id),
            _ => {
                log::warn!("Unsupported sample format {:?} on '{}'", sample_format, device.name);
                self.error.raise(LibraryError::InvalidDevice);
                return None;
            }
        };

        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Failed to build stream on '{}': {}", device.name, e);
                self.error.raise(LibraryError::InvalidDevice);
                return None;
            }
        };

        self.next_context_id = id;
        log::debug!(
            "Created context {} on '{}': {}ch, {}Hz, {:?}",
            id,
            device.name,
            stream_config.channels,
            stream_config.sample_rate.0,
            sample_format
        );

        Some(CpalContext {
            id,
            stream,
            stream_config,
            sample_format,
        })
    }

    fn make_context_current(&mut self, context: Option<&CpalContext>) -> bool {
        let Some(context) = context else {
            self.set_current(None);
            return true;
        };

        if let Err(e) = context.stream.play() {
            log::warn!("Failed to start stream for context {}: {}", context.id, e);
            self.error.raise(LibraryError::InvalidContext);
            return false;
        }

        self.set_current(Some(context.id));
        true
    }

    fn set_listener_gain(&mut self, gain: f32) {
        self.update_listener(|l| l.set_gain(gain));
        self.shared
            .gain_bits
            .store(self.listener.gain.to_bits(), Ordering::Relaxed);
    }

    fn set_listener_pose(&mut self, pose: &Pose) {
        self.update_listener(|l| l.set_pose(pose));
    }

    fn is_extension_present(&mut self, device: &CpalDevice, name: &str) -> bool {
        name == EFFECTS_EXTENSION && device.effects_available()
    }

    fn max_auxiliary_sends(&mut self, device: &CpalDevice) -> u32 {
        if !device.effects_available() {
            self.error.raise(LibraryError::InvalidEnum);
            return 0;
        }
        self.auxiliary_sends
    }

    fn set_meters_per_unit(&mut self, meters: f32) {
        self.update_listener(|l| l.set_meters_per_unit(meters));
    }

    fn set_speed_of_sound(&mut self, speed: f32) {
        self.update_listener(|l| l.set_speed_of_sound(speed));
    }

    fn close_device(&mut self, device: CpalDevice) {
        log::info!("Closed audio device '{}'", device.name);
    }

    fn destroy_context(&mut self, context: CpalContext) {
        if self.current_context == Some(context.id) {
            self.set_current(None);
        }
        if let Err(e) = context.stream.pause() {
            log::debug!("Failed to pause stream for context {}: {}", context.id, e);
        }
        log::debug!("Destroyed context {}", context.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Library plus an open default device, or `None` on machines without
    /// audio output.
    fn with_default_device() -> Option<(CpalLibrary, CpalDevice)> {
        let mut library = CpalLibrary::with_host(cpal::default_host()).auxiliary_sends(3);
        match library.open_device(None) {
            Some(device) => Some((library, device)),
            None => {
                println!("No default output device available, skipping");
                None
            }
        }
    }

    #[test]
    fn test_listener_requires_current_context() {
        let mut library = CpalLibrary::new();

        library.set_listener_gain(0.5);
        assert_eq!(library.take_error(), Some(LibraryError::InvalidOperation));
        library.set_speed_of_sound(343.3);
        assert_eq!(library.take_error(), Some(LibraryError::InvalidOperation));
        library.set_meters_per_unit(1.0);
        assert_eq!(library.take_error(), Some(LibraryError::InvalidOperation));

        assert_eq!(library.output_gain(), 1.0);
        assert_eq!(library.current_context(), None);
    }

    #[test]
    fn test_unknown_device_name() {
        let mut library = CpalLibrary::new();
        assert!(library.open_device(Some("No Such Output Device")).is_none());
    }

    #[test]
    fn test_auxiliary_sends_follow_effects_support() {
        let Some((mut library, device)) = with_default_device() else {
            return;
        };
        assert!(!device.name().is_empty());

        let sends = library.max_auxiliary_sends(&device);
        if library.is_extension_present(&device, EFFECTS_EXTENSION) {
            assert_eq!(sends, 3);
            assert_eq!(library.take_error(), None);
        } else {
            assert_eq!(sends, 0);
            assert_eq!(library.take_error(), Some(LibraryError::InvalidEnum));
        }
        assert!(!library.is_extension_present(&device, "ALC_EXT_UNKNOWN"));
    }

    #[test]
    fn test_current_context_drives_stream_gain() {
        let Some((mut library, device)) = with_default_device() else {
            return;
        };
        let Some(context) = library.create_context(&device) else {
            println!("Device has no usable output stream, skipping");
            return;
        };
        if !library.make_context_current(Some(&context)) {
            assert_eq!(library.take_error(), Some(LibraryError::InvalidContext));
            return;
        }
        assert_eq!(library.current_context(), Some(context.id()));

        library.set_listener_gain(0.0);
        assert_eq!(library.take_error(), None);
        assert_eq!(library.output_gain(), 0.0);

        library.set_listener_gain(-1.0);
        assert_eq!(library.take_error(), Some(LibraryError::InvalidValue));
        assert_eq!(library.output_gain(), 0.0);

        assert!(library.make_context_current(None));
        library.destroy_context(context);
        library.close_device(device);
        assert_eq!(library.current_context(), None);
    }
}
