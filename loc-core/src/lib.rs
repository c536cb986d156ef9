//! Location protocol adapter.
//! Host-driven: the host supplies the transport and the report sink; the adapter
//! turns consumer calls into requests and indications into reports.

pub mod error;
pub mod indication;
pub mod protocol;
pub mod request;
pub mod wire;

pub mod dispatch;
pub mod mask;
pub mod transport;

pub mod events;
pub mod report;
pub mod transcode;

pub mod aiding;
pub mod cert;
pub mod dataservice;
pub mod settings;
pub mod xtra;
pub mod zpp;

pub mod config;
pub mod adapter;

#[cfg(test)]
mod test_util;

pub use crate::config::AdapterConfig;
pub use crate::adapter::{
    AgpsBearer, FixOptions, LocApiAdapter, PositionMode, ServerKind, SupportedFeatures,
};
pub use aiding::AidingData;
pub use dataservice::{DataCallBackend, DataCallClient, DataCallError, DataCallEvent};
pub use settings::{GpsLock, LppProfile};
pub use error::{convert_err, status_err, ClientStatus, LocApiError};
pub use indication::Indication;
pub use mask::{EventMask, QmiEventMask, SessionController};
pub use protocol::{MsgId, QmiStatus};
pub use report::{Report, ReportSink};
pub use request::Request;
pub use transport::{inbox, Inbound, InboundQueue, IndicationInbox, ServiceError, Transport};
pub use wire::{decode_frame, encode_frame, Frame, FrameDecodeError, FrameEncodeError};
