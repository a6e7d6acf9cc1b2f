//! Scoped lifecycle driver
//!
//! [`AudioSession`] calls a [`HostModule`] the way a host would, and makes
//! sure `unload` and `destroy` run when the session goes away.

use std::time::Duration;

use crate::host::{ConfigurationSection, Host, HostModule};

pub struct AudioSession<'h, M: HostModule> {
    host: &'h dyn Host,
    module: M,
    state: Option<M::State>,
    is_running: bool,
}

impl<'h, M: HostModule> AudioSession<'h, M> {
    /// Run `create`. The session holds no state if the module refused it.
    pub fn new(
        host: &'h dyn Host,
        mut module: M,
        configuration: &dyn ConfigurationSection,
    ) -> Self {
        let state = module.create(host, configuration);
        Self {
            host,
            module,
            state,
            is_running: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.state.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn state(&self) -> Option<&M::State> {
        self.state.as_ref()
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    /// Run `load`. Calling again while running does nothing.
    ///
    /// Without a state the session never counts as running. A load that
    /// failed still counts as running: call `stop()` before retrying.
    pub fn start(&mut self, identifier: &str) {
        if self.is_running {
            return;
        }
        self.module.load(self.host, self.state.as_mut(), identifier);
        self.is_running = self.state.is_some();
    }

    /// Run one `update`.
    pub fn tick(&mut self) -> Duration {
        self.module.update(self.host, self.state.as_ref())
    }

    /// Run `unload`.
    pub fn stop(&mut self) {
        self.module.unload(self.host, self.state.as_mut());
        self.is_running = false;
    }
}

impl<M: HostModule> Drop for AudioSession<'_, M> {
    fn drop(&mut self) {
        self.stop();
        self.module.destroy(self.host, self.state.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{AudioBackendController, EffectsCapability};
    use crate::host::{EmptySection, ErrorLog};
    use crate::library::{NullFault, NullLibrary};
    use std::collections::HashMap;

    #[test]
    fn test_session_lifecycle() {
        let host = ErrorLog::new();
        let controller = AudioBackendController::new(NullLibrary::new().with_effects());
        let mut session = AudioSession::new(&host, controller, &EmptySection);
        assert!(session.is_created());

        session.start("session");
        assert!(session.is_running());
        assert_eq!(session.tick(), Duration::ZERO);

        let state = session.state().unwrap();
        assert!(state.is_loaded());
        assert_eq!(state.effects_capability(), EffectsCapability::ExtendedEffects);

        session.stop();
        assert!(!session.state().unwrap().is_loaded());
        assert_eq!(session.module().library().open_devices(), 0);
        assert!(host.is_empty());
    }

    #[test]
    fn test_failed_load_still_runs() {
        let host = ErrorLog::new();
        let controller =
            AudioBackendController::new(NullLibrary::new().with_fault(NullFault::NoDevice));
        let mut session = AudioSession::new(&host, controller, &EmptySection);

        session.start("no-device");
        assert!(!session.state().unwrap().is_loaded());
        assert_eq!(session.tick(), Duration::ZERO);
        assert_eq!(host.len(), 1);
    }

    #[test]
    fn test_rejected_configuration() {
        let host = ErrorLog::new();
        let mut section = HashMap::new();
        section.insert("speed_of_sound".to_string(), "-5".to_string());

        let controller = AudioBackendController::new(NullLibrary::new());
        let mut session = AudioSession::new(&host, controller, &section);
        assert!(!session.is_created());

        session.start("rejected");
        assert!(!session.is_running());
        assert_eq!(session.tick(), Duration::ZERO);
        assert_eq!(host.len(), 1);
    }

    #[test]
    fn test_restart_after_failed_load() {
        let host = ErrorLog::new();
        let controller =
            AudioBackendController::new(NullLibrary::new().with_fault(NullFault::SpeedOfSound));
        let mut session = AudioSession::new(&host, controller, &EmptySection);

        session.start("first");
        assert!(session.is_running());
        assert!(!session.state().unwrap().is_loaded());

        session.start("ignored");
        assert!(!session.state().unwrap().is_loaded());

        session.stop();
        session.start("retry");
        assert!(session.is_running());
        assert!(session.state().unwrap().is_loaded());
        assert_eq!(host.len(), 1);
    }
}
