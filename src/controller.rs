//! Device and context lifecycle for the audio backend
//!
//! [`AudioBackendController`] owns the audio library and walks a
//! [`BackendState`] through the host's lifecycle:
//!
//! ```text
//! Uninitialized --create--> Allocated --load--> Active
//!       ^                      |  ^               |
//!       +-------destroy--------+  +----unload-----+
//! ```
//!
//! `load` opens the device, activates a context and configures the listener.
//! Every listener call is checked against the library's error flag; the
//! first failure aborts the load, is reported to the host once, and
//! releases whatever the load had acquired. Nothing is committed to the
//! state until the whole sequence has succeeded.

use std::time::Duration;

use crate::config::BackendConfig;
use crate::error::{BackendError, Operation, Result};
use crate::host::{ConfigurationSection, Host, HostModule};
use crate::library::{AudioLibrary, CheckedCall, EFFECTS_EXTENSION};

/// Effects support detected on the open device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectsCapability {
    #[default]
    None,
    ExtendedEffects,
}

/// Per-session state produced by `create`.
///
/// `context` is only ever set together with `device`.
pub struct BackendState<L: AudioLibrary> {
    device: Option<L::Device>,
    context: Option<L::Context>,
    effects: EffectsCapability,
    auxiliary_send_count: u32,
    config: BackendConfig,
}

impl<L: AudioLibrary> BackendState<L> {
    fn new(config: BackendConfig) -> Self {
        Self {
            device: None,
            context: None,
            effects: EffectsCapability::None,
            auxiliary_send_count: 0,
            config,
        }
    }

    pub fn device(&self) -> Option<&L::Device> {
        self.device.as_ref()
    }

    pub fn context(&self) -> Option<&L::Context> {
        self.context.as_ref()
    }

    pub fn effects_capability(&self) -> EffectsCapability {
        self.effects
    }

    pub fn auxiliary_send_count(&self) -> u32 {
        self.auxiliary_send_count
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.device.is_some() || self.context.is_some()
    }
}

impl<L: AudioLibrary> std::fmt::Debug for BackendState<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendState")
            .field("device", &self.device.is_some())
            .field("context", &self.context.is_some())
            .field("effects", &self.effects)
            .field("auxiliary_send_count", &self.auxiliary_send_count)
            .field("config", &self.config)
            .finish()
    }
}

struct Capabilities {
    effects: EffectsCapability,
    auxiliary_sends: u32,
}

pub struct AudioBackendController<L: AudioLibrary> {
    library: L,
}

impl<L: AudioLibrary> AudioBackendController<L> {
    pub fn new(library: L) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut L {
        &mut self.library
    }

    /// Allocate an unloaded state configured from the host's section.
    ///
    /// Invalid configuration is reported to the host and yields no state.
    pub fn create(
        &self,
        host: &dyn Host,
        configuration: &dyn ConfigurationSection,
    ) -> Option<BackendState<L>> {
        match BackendConfig::from_section(configuration) {
            Ok(config) => {
                log::debug!("Created audio backend state: {:?}", config);
                Some(BackendState::new(config))
            }
            Err(e) => {
                host.log_error(format_args!("[audio] Failed to create audio backend: {}", e));
                None
            }
        }
    }

    /// Open the output device and configure the listener.
    ///
    /// An absent state is ignored. On failure the error has already been
    /// reported to the host and the state is left unloaded.
    pub fn load(
        &mut self,
        host: &dyn Host,
        state: Option<&mut BackendState<L>>,
        identifier: &str,
    ) -> Result<()> {
        let Some(state) = state else {
            return Ok(());
        };

        if state.is_loaded() {
            let err = BackendError::InvalidState("backend is already loaded".into());
            host.log_error(format_args!("[audio] {}", err));
            return Err(err);
        }

        log::debug!("Loading audio backend for '{}'", identifier);

        if let Some(stale) = self.library.take_error() {
            log::debug!("Discarding stale audio library error: {}", stale);
        }

        let Some(device) = self.library.open_device(state.config.device_name.as_deref()) else {
            host.log_error(format_args!("Error: Could not open an audio device"));
            return Err(BackendError::AudioDevice(match &state.config.device_name {
                Some(name) => format!("could not open '{}'", name),
                None => "could not open the default device".into(),
            }));
        };

        let Some(context) = self.library.create_context(&device) else {
            host.log_error(format_args!("[audio] Unable to create a context"));
            self.library.close_device(device);
            self.library.take_error();
            return Err(BackendError::Context("context creation failed".into()));
        };

        if !self.library.make_context_current(Some(&context)) {
            host.log_error(format_args!("[audio] Unable to make context current"));
            self.release(device, context);
            return Err(BackendError::Context("context activation failed".into()));
        }

        match self.configure(&device, &state.config) {
            Ok(capabilities) => {
                log::info!(
                    "Audio backend loaded (effects: {:?}, auxiliary sends: {})",
                    capabilities.effects,
                    capabilities.auxiliary_sends
                );
                state.effects = capabilities.effects;
                state.auxiliary_send_count = capabilities.auxiliary_sends;
                state.device = Some(device);
                state.context = Some(context);
                Ok(())
            }
            Err(e) => {
                host.log_error(format_args!("[audio] {}", e));
                self.release(device, context);
                Err(e)
            }
        }
    }

    /// Per-frame hook. Mixing happens inside the audio library, so the
    /// backend never consumes time here.
    pub fn update(&self, _host: &dyn Host, _state: Option<&BackendState<L>>) -> Duration {
        Duration::ZERO
    }

    /// Release the device and context. Does nothing unless a context is
    /// held, so repeated calls are harmless.
    pub fn unload(&mut self, _host: &dyn Host, state: Option<&mut BackendState<L>>) {
        let Some(state) = state else {
            return;
        };
        let Some(context) = state.context.take() else {
            return;
        };

        self.library.make_context_current(None);
        if let Some(device) = state.device.take() {
            self.library.close_device(device);
        }
        self.library.destroy_context(context);
        self.library.take_error();

        log::info!("Audio backend unloaded");
    }

    /// Drop the state. An absent state is ignored.
    pub fn destroy(&mut self, _host: &dyn Host, state: Option<BackendState<L>>) {
        if let Some(state) = state {
            if state.context.is_some() {
                log::warn!("Destroying audio backend state that was never unloaded");
            }
            drop(state);
        }
    }

    /// Listener setup and capability query, run with the new context current.
    fn configure(&mut self, device: &L::Device, config: &BackendConfig) -> Result<Capabilities> {
        let lib = &mut self.library;

        lib.checked(Operation::SetListenerGain, |lib| {
            lib.set_listener_gain(config.listener_gain)
        })?;
        lib.checked(Operation::SetListenerPose, |lib| {
            lib.set_listener_pose(&config.listener_pose)
        })?;

        let effects = if lib.is_extension_present(device, EFFECTS_EXTENSION) {
            EffectsCapability::ExtendedEffects
        } else {
            EffectsCapability::None
        };

        let auxiliary_sends = match effects {
            EffectsCapability::ExtendedEffects => {
                let sends = lib.checked(Operation::QueryAuxiliarySends, |lib| {
                    lib.max_auxiliary_sends(device)
                })?;
                lib.checked(Operation::SetMetersPerUnit, |lib| {
                    lib.set_meters_per_unit(config.meters_per_unit)
                })?;
                sends
            }
            EffectsCapability::None => 0,
        };

        lib.checked(Operation::SetSpeedOfSound, |lib| {
            lib.set_speed_of_sound(config.speed_of_sound)
        })?;

        Ok(Capabilities {
            effects,
            auxiliary_sends,
        })
    }

    /// Undo a partial load.
    fn release(&mut self, device: L::Device, context: L::Context) {
        log::warn!("Releasing audio device after failed load");
        self.library.make_context_current(None);
        self.library.destroy_context(context);
        self.library.close_device(device);
        self.library.take_error();
    }
}

impl<L: AudioLibrary> HostModule for AudioBackendController<L> {
    type State = BackendState<L>;

    fn create(
        &mut self,
        host: &dyn Host,
        configuration: &dyn ConfigurationSection,
    ) -> Option<BackendState<L>> {
        AudioBackendController::create(self, host, configuration)
    }

    fn load(&mut self, host: &dyn Host, state: Option<&mut BackendState<L>>, identifier: &str) {
        // Failures are reported to the host inside load.
        if let Err(e) = AudioBackendController::load(self, host, state, identifier) {
            log::debug!("Audio backend unavailable: {}", e);
        }
    }

    fn update(&mut self, host: &dyn Host, state: Option<&BackendState<L>>) -> Duration {
        AudioBackendController::update(self, host, state)
    }

    fn unload(&mut self, host: &dyn Host, state: Option<&mut BackendState<L>>) {
        AudioBackendController::unload(self, host, state)
    }

    fn destroy(&mut self, host: &dyn Host, state: Option<BackendState<L>>) {
        AudioBackendController::destroy(self, host, state)
    }
}
