//! Why a load attempt was aborted.

use thiserror::Error;

use crate::status::NtStatus;

/// Failure of one step of `DriverEntry`.
///
/// Every variant carries the host's status exactly as it was returned; the
/// variant only records which step produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("unload callback registration failed: {0}")]
    CallbackRegistration(NtStatus),

    #[error("streaming subsystem binding failed: {0}")]
    Binding(NtStatus),

    #[error("filter factory registration failed: {0}")]
    Registration(NtStatus),
}

impl LoadError {
    /// The host status behind this failure, unmodified.
    pub const fn status(&self) -> NtStatus {
        match *self {
            LoadError::CallbackRegistration(st)
            | LoadError::Binding(st)
            | LoadError::Registration(st) => st,
        }
    }
}

impl From<LoadError> for NtStatus {
    fn from(err: LoadError) -> Self {
        err.status()
    }
}
