//! Status taxonomy: transport status, consumer error, and the mapping between them.

use serde::{Deserialize, Serialize};

use crate::protocol::QmiStatus;

/// Status returned by the transport for a send or open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientStatus {
    Success,
    GeneralFailure,
    Unsupported,
    InvalidParameter,
    EngineBusy,
    PhoneOffline,
    Timeout,
    InvalidHandle,
    ServiceNotPresent,
    Internal,
    NotInitialized,
    InvalidMessageId,
}

impl ClientStatus {
    pub fn is_success(self) -> bool {
        self == ClientStatus::Success
    }
}

/// Error surfaced to the location consumer. Closed set; no free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocApiError {
    #[error("general failure")]
    GeneralFailure,
    #[error("unsupported")]
    Unsupported,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("engine busy")]
    EngineBusy,
    #[error("phone offline")]
    PhoneOffline,
    #[error("timeout")]
    Timeout,
    #[error("invalid handle")]
    InvalidHandle,
    #[error("service not present")]
    ServiceNotPresent,
    #[error("internal error")]
    Internal,
}

/// Map a transport status onto the consumer taxonomy.
pub fn convert_err(status: ClientStatus) -> Result<(), LocApiError> {
    match status {
        ClientStatus::Success => Ok(()),
        ClientStatus::GeneralFailure => Err(LocApiError::GeneralFailure),
        ClientStatus::Unsupported => Err(LocApiError::Unsupported),
        ClientStatus::InvalidParameter => Err(LocApiError::InvalidParameter),
        ClientStatus::EngineBusy => Err(LocApiError::EngineBusy),
        ClientStatus::PhoneOffline => Err(LocApiError::PhoneOffline),
        ClientStatus::Timeout => Err(LocApiError::Timeout),
        ClientStatus::InvalidHandle => Err(LocApiError::InvalidHandle),
        ClientStatus::ServiceNotPresent => Err(LocApiError::ServiceNotPresent),
        ClientStatus::Internal => Err(LocApiError::Internal),
        ClientStatus::NotInitialized | ClientStatus::InvalidMessageId => {
            Err(LocApiError::GeneralFailure)
        }
    }
}

/// Map a status carried inside an indication onto the consumer taxonomy.
pub fn status_err(status: QmiStatus) -> Result<(), LocApiError> {
    match status {
        QmiStatus::Success => Ok(()),
        QmiStatus::GeneralFailure | QmiStatus::XtraVersionCheckFailure => {
            Err(LocApiError::GeneralFailure)
        }
        QmiStatus::Unsupported | QmiStatus::ConfigNotSupported => Err(LocApiError::Unsupported),
        QmiStatus::InvalidParameter => Err(LocApiError::InvalidParameter),
        QmiStatus::EngineBusy => Err(LocApiError::EngineBusy),
        QmiStatus::PhoneOffline => Err(LocApiError::PhoneOffline),
        QmiStatus::Timeout => Err(LocApiError::Timeout),
        QmiStatus::InsufficientMemory => Err(LocApiError::Internal),
    }
}
