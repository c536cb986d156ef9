//! Emergency data-call client.
//!
//! The platform data service sits behind [`DataCallBackend`]. [`DataCallClient`]
//! tracks the call lifecycle and maps backend results onto [`LocApiError`].
//! Connection events from the backend travel over a channel and become
//! `DataCallOpened` / `DataCallClosed` reports via
//! [`LocApiAdapter::handle_data_call_event`]. Nothing here touches the
//! positioning session.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::adapter::LocApiAdapter;
use crate::error::LocApiError;
use crate::report::Report;

/// Result of a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCallStatus {
    Success,
    RetryLater,
    InvalidHandle,
    NotInitialized,
    Failure,
}

/// Connection events raised by the backend after a call was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCallEvent {
    Connected,
    Disconnected,
}

/// Profile chosen by the backend when opening a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallProfile {
    pub profile_index: i32,
    pub pdp_type: i32,
}

pub trait DataCallBackend: Send {
    fn init(&mut self, due_to_ssr: bool) -> DataCallStatus;
    /// Open a call; the backend keeps `events` and raises connection events on it.
    fn open_call(
        &mut self,
        events: mpsc::UnboundedSender<DataCallEvent>,
    ) -> Result<CallProfile, DataCallStatus>;
    fn start_call(&mut self, profile: CallProfile) -> DataCallStatus;
    fn stop_call(&mut self) -> DataCallStatus;
    fn close_call(&mut self);
    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DataCallError {
    #[error("data service library could not be loaded")]
    LibraryLoad,
    #[error("data service interface not available")]
    NoInterface,
    #[error("data service init failed: {0:?}")]
    Init(DataCallStatus),
}

impl DataCallError {
    /// Numeric code reported to the host for a failed init.
    pub fn code(&self) -> i32 {
        match self {
            DataCallError::LibraryLoad => 1,
            DataCallError::NoInterface => 2,
            DataCallError::Init(_) => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCallState {
    Uninit,
    Initialized,
    Opened,
    Started,
}

pub struct DataCallClient {
    backend: Option<Box<dyn DataCallBackend>>,
    events: mpsc::UnboundedSender<DataCallEvent>,
    state: DataCallState,
}

impl DataCallClient {
    /// `backend` is `None` when the platform has no data service.
    pub fn new(
        backend: Option<Box<dyn DataCallBackend>>,
        events: mpsc::UnboundedSender<DataCallEvent>,
    ) -> Self {
        Self {
            backend,
            events,
            state: DataCallState::Uninit,
        }
    }

    pub fn state(&self) -> DataCallState {
        self.state
    }

    /// Initialize the backend. Called again after a subsystem restart with
    /// `due_to_ssr` set.
    pub fn init(&mut self, due_to_ssr: bool) -> Result<(), DataCallError> {
        let Some(backend) = self.backend.as_mut() else {
            error!("no data service interface");
            return Err(DataCallError::NoInterface);
        };
        match backend.init(due_to_ssr) {
            DataCallStatus::Success => {
                debug!(due_to_ssr, "data service client initialized");
                self.state = DataCallState::Initialized;
                Ok(())
            }
            status => {
                error!(status = ?status, "data service client init failed");
                Err(DataCallError::Init(status))
            }
        }
    }

    /// Open an emergency call and start it. A backend asking to retry later is
    /// `EngineBusy`; any other failure is `Unsupported`.
    pub fn open_and_start(&mut self) -> Result<(), LocApiError> {
        let backend = match (self.state, self.backend.as_mut()) {
            (DataCallState::Uninit, _) | (_, None) => {
                error!("data call requested before init");
                return Err(LocApiError::Unsupported);
            }
            (_, Some(backend)) => backend,
        };
        let profile = match backend.open_call(self.events.clone()) {
            Ok(profile) => profile,
            Err(DataCallStatus::RetryLater) => {
                error!("emergency call not started, retry later");
                return Err(LocApiError::EngineBusy);
            }
            Err(status) => {
                error!(status = ?status, "emergency call not opened");
                return Err(LocApiError::Unsupported);
            }
        };
        self.state = DataCallState::Opened;
        match backend.start_call(profile) {
            DataCallStatus::Success => {
                debug!(?profile, "emergency call start requested");
                self.state = DataCallState::Started;
                Ok(())
            }
            status => {
                error!(status = ?status, "emergency call not started");
                Err(LocApiError::Unsupported)
            }
        }
    }

    pub fn stop(&mut self) -> Result<(), LocApiError> {
        let status = match (self.state, self.backend.as_mut()) {
            (DataCallState::Opened | DataCallState::Started, Some(backend)) => {
                backend.stop_call()
            }
            _ => DataCallStatus::NotInitialized,
        };
        match status {
            DataCallStatus::Success => {
                debug!("emergency call stop requested");
                self.state = DataCallState::Opened;
                Ok(())
            }
            DataCallStatus::InvalidHandle => {
                error!("no call handle for emergency call");
                Err(LocApiError::InvalidHandle)
            }
            status => {
                error!(status = ?status, "emergency call not stopped");
                Err(LocApiError::GeneralFailure)
            }
        }
    }

    /// Release the call handle.
    pub fn close(&mut self) {
        match (self.state, self.backend.as_mut()) {
            (DataCallState::Opened | DataCallState::Started, Some(backend)) => {
                backend.close_call();
                self.state = DataCallState::Initialized;
                debug!("data call handle released");
            }
            _ => debug!("no data call handle to release"),
        }
    }

    /// Release the data service client interface.
    pub fn release(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.release();
            debug!("data service client released");
        }
        self.state = DataCallState::Uninit;
    }
}

impl LocApiAdapter {
    pub fn handle_data_call_event(&mut self, event: DataCallEvent) {
        match event {
            DataCallEvent::Connected => {
                debug!("emergency call is up");
                self.report(Report::DataCallOpened);
            }
            DataCallEvent::Disconnected => {
                error!("emergency call is stopped");
                self.report(Report::DataCallClosed);
            }
        }
    }
}
