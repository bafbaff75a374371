//! Crate-wide error type
//!
//! Each layer reports its own error enum; [`Error`] gathers them so callers
//! at the outer boundary (the CLI, a route layer) can classify failures
//! without matching every variant.

use crate::cli::ExitCodes;
use crate::config::ConfigError;
use crate::core::channel::ChannelError;
use crate::core::logger::LogError;
use crate::core::registry::RegistryError;
use crate::core::session::SessionError;
use thiserror::Error;

/// Convenience alias for results using the crate error type
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure surfaced by the device layer
#[derive(Error, Debug)]
pub enum Error {
    /// Channel failure
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Session failure
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Registry failure
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// History failure
    #[error(transparent)]
    Log(#[from] LogError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Caller supplied an unusable value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// How a boundary should present a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Device exists but is not connected
    NotConnected,
    /// Device identifier unknown
    NotFound,
    /// Request was malformed or rejected by the instrument
    BadRequest,
    /// Channel, storage or configuration failed
    UpstreamFailure,
}

impl FailureClass {
    /// HTTP-style status a route layer would answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotConnected => 409,
            Self::NotFound => 404,
            Self::BadRequest => 400,
            Self::UpstreamFailure => 502,
        }
    }

    /// CLI exit code
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NotConnected => ExitCodes::NOT_CONNECTED,
            Self::NotFound => ExitCodes::DEVICE_NOT_FOUND,
            Self::BadRequest => ExitCodes::INVALID_ARGS,
            Self::UpstreamFailure => ExitCodes::CONNECTION_FAILED,
        }
    }
}

impl Error {
    /// Classify this failure
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::Session(SessionError::NotConnected) => FailureClass::NotConnected,
            Self::Session(SessionError::Instrument(_)) | Self::InvalidArgument(_) => {
                FailureClass::BadRequest
            }
            Self::Registry(RegistryError::NotFound(_)) => FailureClass::NotFound,
            Self::Registry(RegistryError::DuplicateId(_)) => FailureClass::BadRequest,
            Self::Registry(RegistryError::ConnectionFailed { .. })
            | Self::Session(SessionError::Channel(_) | SessionError::MalformedResponse(_))
            | Self::Channel(_)
            | Self::Log(_)
            | Self::Config(_) => FailureClass::UpstreamFailure,
        }
    }

    /// CLI exit code for this failure
    pub fn exit_code(&self) -> u8 {
        self.failure_class().exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::from(RegistryError::NotFound("dev9".into()));
        assert_eq!(err.to_string(), "Device not found: dev9");
    }

    #[test]
    fn test_failure_classes() {
        assert_eq!(
            Error::from(SessionError::NotConnected).failure_class(),
            FailureClass::NotConnected
        );
        assert_eq!(
            Error::from(RegistryError::NotFound("x".into())).failure_class(),
            FailureClass::NotFound
        );
        assert_eq!(
            Error::from(SessionError::Instrument("Invalid temperature value".into())).failure_class(),
            FailureClass::BadRequest
        );
        assert_eq!(
            Error::from(SessionError::Channel(ChannelError::NotOpen)).failure_class(),
            FailureClass::UpstreamFailure
        );
        assert_eq!(FailureClass::NotFound.status_code(), 404);
    }
}
