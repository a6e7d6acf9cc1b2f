//! Underlying audio library capability
//!
//! The library reports most failures through a sticky error flag rather than
//! return values, so a failed property set is only visible if someone reads
//! the flag afterwards. [`CheckedCall::checked`] pairs each call with that
//! read so callers get a `Result` back.

pub mod cpal_library;
pub mod null;

pub use cpal_library::CpalLibrary;
pub use null::{NullFault, NullLibrary};

use crate::error::{BackendError, LibraryError, Operation, Result};
use crate::math::{Pose, Vec3};

/// Name of the vendor-neutral effects extension queried on the open device.
pub const EFFECTS_EXTENSION: &str = "ALC_EXT_EFX";

/// Auxiliary sends reported by devices that support effects, unless the
/// library is configured otherwise.
pub const DEFAULT_AUXILIARY_SENDS: u32 = 2;

pub trait AudioLibrary {
    /// Handle to an open output device.
    type Device;
    /// Rendering context bound to a device.
    type Context;

    /// Read and reset the error flag.
    fn take_error(&mut self) -> Option<LibraryError>;

    /// Open the named output device, or the default one for `None`.
    fn open_device(&mut self, name: Option<&str>) -> Option<Self::Device>;

    fn create_context(&mut self, device: &Self::Device) -> Option<Self::Context>;

    /// Make `context` the target of listener calls. `None` releases the
    /// current context.
    fn make_context_current(&mut self, context: Option<&Self::Context>) -> bool;

    fn set_listener_gain(&mut self, gain: f32);

    fn set_listener_pose(&mut self, pose: &Pose);

    fn is_extension_present(&mut self, device: &Self::Device, name: &str) -> bool;

    fn max_auxiliary_sends(&mut self, device: &Self::Device) -> u32;

    fn set_meters_per_unit(&mut self, meters: f32);

    fn set_speed_of_sound(&mut self, speed: f32);

    fn close_device(&mut self, device: Self::Device);

    fn destroy_context(&mut self, context: Self::Context);
}

/// Result-returning wrapper over flag-reporting library calls.
pub trait CheckedCall: AudioLibrary + Sized {
    /// Run `call`, then consume the error flag. A raised flag becomes a
    /// [`BackendError::Library`] tagged with `operation`.
    fn checked<T>(&mut self, operation: Operation, call: impl FnOnce(&mut Self) -> T) -> Result<T> {
        let value = call(self);
        match self.take_error() {
            None => Ok(value),
            Some(source) => Err(BackendError::Library { operation, source }),
        }
    }
}

impl<L: AudioLibrary> CheckedCall for L {}

/// Listener state shared by the library implementations, with the library's
/// validation rules. Setters report failures as flag codes.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerProperties {
    pub gain: f32,
    pub pose: Pose,
    pub meters_per_unit: f32,
    pub speed_of_sound: f32,
}

impl Default for ListenerProperties {
    fn default() -> Self {
        Self {
            gain: 1.0,
            pose: Pose::identity(),
            meters_per_unit: 1.0,
            speed_of_sound: 343.3,
        }
    }
}

impl ListenerProperties {
    pub fn set_gain(&mut self, gain: f32) -> std::result::Result<(), LibraryError> {
        if !gain.is_finite() || gain < 0.0 {
            return Err(LibraryError::InvalidValue);
        }
        self.gain = gain;
        Ok(())
    }

    pub fn set_pose(&mut self, pose: &Pose) -> std::result::Result<(), LibraryError> {
        if !pose.is_finite() {
            return Err(LibraryError::InvalidValue);
        }
        self.pose = *pose;
        Ok(())
    }

    pub fn set_meters_per_unit(&mut self, meters: f32) -> std::result::Result<(), LibraryError> {
        if !meters.is_finite() || meters <= 0.0 {
            return Err(LibraryError::InvalidValue);
        }
        self.meters_per_unit = meters;
        Ok(())
    }

    pub fn set_speed_of_sound(&mut self, speed: f32) -> std::result::Result<(), LibraryError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(LibraryError::InvalidValue);
        }
        self.speed_of_sound = speed;
        Ok(())
    }

    /// Listener orientation as (forward, up).
    pub fn orientation(&self) -> (Vec3, Vec3) {
        (self.pose.forward(), self.pose.up())
    }
}

/// Sticky error flag. Only the first error is kept until it is read.
#[derive(Debug, Default)]
pub(crate) struct ErrorFlag(Option<LibraryError>);

impl ErrorFlag {
    pub(crate) fn raise(&mut self, error: LibraryError) {
        if self.0.is_none() {
            self.0 = Some(error);
        }
    }

    pub(crate) fn record(&mut self, result: std::result::Result<(), LibraryError>) {
        if let Err(error) = result {
            self.raise(error);
        }
    }

    pub(crate) fn take(&mut self) -> Option<LibraryError> {
        self.0.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_flag_keeps_first_error() {
        let mut flag = ErrorFlag::default();
        flag.raise(LibraryError::InvalidValue);
        flag.raise(LibraryError::InvalidEnum);

        assert_eq!(flag.take(), Some(LibraryError::InvalidValue));
        assert_eq!(flag.take(), None);
    }

    #[test]
    fn test_listener_validation() {
        let mut listener = ListenerProperties::default();
        assert!(listener.set_gain(0.0).is_ok());
        assert_eq!(listener.set_gain(-0.5), Err(LibraryError::InvalidValue));
        assert_eq!(listener.gain, 0.0);

        assert_eq!(
            listener.set_speed_of_sound(0.0),
            Err(LibraryError::InvalidValue)
        );
        assert_eq!(
            listener.set_meters_per_unit(f32::NAN),
            Err(LibraryError::InvalidValue)
        );
        assert!(listener.set_speed_of_sound(1500.0).is_ok());
        assert_eq!(listener.speed_of_sound, 1500.0);
    }

    #[test]
    fn test_checked_consumes_flag() {
        let mut library = NullLibrary::new();
        let device = library.open_device(None).unwrap();
        let context = library.create_context(&device).unwrap();
        assert!(library.make_context_current(Some(&context)));

        let result = library.checked(Operation::SetSpeedOfSound, |lib| {
            lib.set_speed_of_sound(-1.0)
        });
        assert!(matches!(
            result,
            Err(BackendError::Library {
                operation: Operation::SetSpeedOfSound,
                source: LibraryError::InvalidValue,
            })
        ));
        assert_eq!(library.take_error(), None);

        let result = library.checked(Operation::SetSpeedOfSound, |lib| {
            lib.set_speed_of_sound(343.3)
        });
        assert!(result.is_ok());
    }
}
