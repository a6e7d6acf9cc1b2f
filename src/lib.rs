//! # PetalSonic Backend
//!
//! Device and context lifecycle for a 3D positional audio backend that a host
//! application drives through five calls: `create`, `load`, `update`,
//! `unload` and `destroy`.
//!
//! On `load` the backend opens an output device, activates a rendering
//! context, starts the listener silent, checks for the effects extension and
//! sets the distance scale and speed of sound. Every listener call is checked
//! against the audio library's error flag, and the first failure aborts the
//! load and is reported through the host.
//!
//! ## Quick Start
//!
//! ```no_run
//! use petalsonic_backend::*;
//!
//! let host = LogHost;
//! let controller = AudioBackendController::new(CpalLibrary::new());
//! let mut session = AudioSession::new(&host, controller, &EmptySection);
//!
//! session.start("main");
//! if let Some(state) = session.state() {
//!     println!("effects: {:?}", state.effects_capability());
//! }
//! session.tick();
//! // unload and destroy run when the session is dropped
//! ```
//!
//! ## Key Components
//!
//! - **[`AudioBackendController`]**: the lifecycle state machine
//! - **[`BackendState`]**: device, context and detected capabilities
//! - **[`AudioLibrary`]**: the underlying audio library, with
//!   [`CpalLibrary`] for real output and [`NullLibrary`] for headless runs
//! - **[`Host`]** / **[`HostModule`]**: the host module contract
//! - **[`AudioSession`]**: runs the lifecycle in host order and cleans up on drop

pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod library;
pub mod math;
pub mod session;

pub use config::BackendConfig;
pub use controller::{AudioBackendController, BackendState, EffectsCapability};
pub use error::{BackendError, LibraryError, Operation, Result};
pub use host::{ConfigurationSection, EmptySection, ErrorLog, Host, HostModule, LogHost};
pub use library::{AudioLibrary, CheckedCall, CpalLibrary, NullFault, NullLibrary};
pub use math::{Pose, Quat, Vec3};
pub use session::AudioSession;
