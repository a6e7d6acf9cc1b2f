//! Error types for the audio backend

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Context error: {0}")]
    Context(String),

    #[error("{}: {source}", .operation.failure_message())]
    Library {
        operation: Operation,
        #[source]
        source: LibraryError,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Error flag codes raised by the underlying audio library.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryError {
    #[error("invalid name")]
    InvalidName,

    #[error("invalid enum")]
    InvalidEnum,

    #[error("invalid value")]
    InvalidValue,

    #[error("invalid operation")]
    InvalidOperation,

    #[error("out of memory")]
    OutOfMemory,

    #[error("invalid device")]
    InvalidDevice,

    #[error("invalid context")]
    InvalidContext,
}

/// Library calls whose failure is only visible through the error flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SetListenerGain,
    SetListenerPose,
    QueryAuxiliarySends,
    SetMetersPerUnit,
    SetSpeedOfSound,
}

impl Operation {
    pub fn failure_message(&self) -> &'static str {
        match self {
            Operation::SetListenerGain => "Can not adjust volume level for audio device",
            Operation::SetListenerPose => "Can not place the listener",
            Operation::QueryAuxiliarySends => {
                "Failed to get the number of auxiliary sends available"
            }
            Operation::SetMetersPerUnit => "Failed to set map units for effects",
            Operation::SetSpeedOfSound => "Failed to set the speed of sound",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::SetListenerGain => "set listener gain",
            Operation::SetListenerPose => "set listener pose",
            Operation::QueryAuxiliarySends => "query auxiliary sends",
            Operation::SetMetersPerUnit => "set meters per unit",
            Operation::SetSpeedOfSound => "set speed of sound",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
