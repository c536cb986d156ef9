//! Transport seam: the channel to the co-processor is owned by the host and
//! handed to the adapter as a `Transport`. Indications come back through an
//! `IndicationInbox`, which completes blocking requests and queues the
//! indication for the adapter's own processing.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

use crate::dispatch::Correlator;
use crate::error::ClientStatus;
use crate::indication::Indication;
use crate::mask::QmiEventMask;
use crate::protocol::MsgId;
use crate::request::Request;

/// Channel to the positioning co-processor.
pub trait Transport: Send {
    /// Open the service channel with an initial event mask.
    fn open(&mut self, event_mask: QmiEventMask) -> ClientStatus;
    fn close(&mut self);
    /// Queue a request. The answer, if any, arrives as an indication.
    fn send(&mut self, request: &Request) -> ClientStatus;
    fn register_event_mask(&mut self, event_mask: QmiEventMask) -> bool;
    /// Bit `i` of the result is set when `ids[i]` is supported.
    fn probe(&mut self, ids: &[MsgId]) -> u64;
}

/// Errors reported by the transport outside any request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceError {
    ServiceUnavailable,
    General,
}

/// Work item for the adapter's serialized queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Indication(Indication),
    ServiceError(ServiceError),
}

/// Delivery side, cloned into whatever task reads from the transport.
#[derive(Clone)]
pub struct IndicationInbox {
    correlator: Correlator,
    tx: mpsc::UnboundedSender<Inbound>,
}

/// Receiving side, owned by the adapter.
pub struct InboundQueue {
    pub(crate) correlator: Correlator,
    rx: mpsc::UnboundedReceiver<Inbound>,
}

/// Create a connected inbox/queue pair.
pub fn inbox() -> (IndicationInbox, InboundQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    let correlator = Correlator::default();
    (
        IndicationInbox {
            correlator: correlator.clone(),
            tx,
        },
        InboundQueue { correlator, rx },
    )
}

impl IndicationInbox {
    /// Complete a waiting request, if any, then queue the indication for routing.
    pub fn deliver(&self, indication: Indication) {
        if self.correlator.resolve(&indication) {
            trace!(msg_id = ?indication.msg_id(), "indication completed a waiter");
        }
        let _ = self.tx.send(Inbound::Indication(indication));
    }

    pub fn service_error(&self, error: ServiceError) {
        let _ = self.tx.send(Inbound::ServiceError(error));
    }
}

impl InboundQueue {
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Inbound> {
        self.rx.try_recv().ok()
    }
}
