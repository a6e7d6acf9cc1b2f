//! Host module contract
//!
//! The host drives a backend through five lifecycle calls, in the order
//! `create → load → {update}* → unload → destroy`. It hands the backend an
//! error-logging capability and the backend's configuration section.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

/// Capabilities the host exposes to a backend.
pub trait Host {
    /// Report an error to the host's log.
    fn log_error(&self, message: fmt::Arguments<'_>);
}

/// Key/value lookup into the backend's section of the host configuration.
pub trait ConfigurationSection {
    fn get(&self, key: &str) -> Option<&str>;
}

impl ConfigurationSection for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }
}

impl ConfigurationSection for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        BTreeMap::get(self, key).map(String::as_str)
    }
}

/// Section used when the host has no configuration for the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySection;

impl ConfigurationSection for EmptySection {
    fn get(&self, _key: &str) -> Option<&str> {
        None
    }
}

/// Host that forwards errors to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHost;

impl Host for LogHost {
    fn log_error(&self, message: fmt::Arguments<'_>) {
        log::error!("{}", message);
    }
}

/// Host that keeps every reported error so it can be inspected later,
/// e.g. to surface them in a UI after a failed load.
#[derive(Debug, Default)]
pub struct ErrorLog {
    errors: RefCell<Vec<String>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.errors.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.errors.borrow_mut().clear();
    }
}

impl Host for ErrorLog {
    fn log_error(&self, message: fmt::Arguments<'_>) {
        let message = message.to_string();
        log::error!("{}", message);
        self.errors.borrow_mut().push(message);
    }
}

/// The five entry points a host resolves from a backend module.
///
/// State is passed as an `Option` because the host may hand back a state
/// that `create` never produced; every call must tolerate that.
pub trait HostModule {
    type State;

    fn create(
        &mut self,
        host: &dyn Host,
        configuration: &dyn ConfigurationSection,
    ) -> Option<Self::State>;

    fn load(&mut self, host: &dyn Host, state: Option<&mut Self::State>, identifier: &str);

    /// Per-frame hook; returns the time consumed by the backend.
    fn update(&mut self, host: &dyn Host, state: Option<&Self::State>) -> Duration;

    fn unload(&mut self, host: &dyn Host, state: Option<&mut Self::State>);

    fn destroy(&mut self, host: &dyn Host, state: Option<Self::State>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_log_collects_messages() {
        let log = ErrorLog::new();
        assert!(log.is_empty());

        log.log_error(format_args!("[audio] {}", "first"));
        log.log_error(format_args!("second {}", 2));

        assert_eq!(log.len(), 2);
        assert_eq!(log.errors(), vec!["[audio] first", "second 2"]);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_sections() {
        let mut map = HashMap::new();
        map.insert("gain".to_string(), "0.5".to_string());
        let section: &dyn ConfigurationSection = &map;
        assert_eq!(section.get("gain"), Some("0.5"));
        assert_eq!(section.get("missing"), None);

        assert_eq!(EmptySection.get("gain"), None);
    }
}
