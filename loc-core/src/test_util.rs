//! Scripted transport and helpers shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::adapter::LocApiAdapter;
use crate::config::AdapterConfig;
use crate::error::ClientStatus;
use crate::indication::Indication;
use crate::mask::{EventMask, QmiEventMask};
use crate::protocol::{MsgId, QmiStatus};
use crate::report::Report;
use crate::request::Request;
use crate::transport::{self, InboundQueue, IndicationInbox, Transport};

/// How the mock answers one send of a given message id.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Send succeeds and this indication is delivered.
    Indication(Indication),
    /// Send returns this status; nothing is delivered.
    Status(ClientStatus),
    /// Send succeeds and nothing is delivered.
    Silent,
}

#[derive(Default)]
pub struct MockState {
    pub sent: Vec<Request>,
    pub registrations: Vec<QmiEventMask>,
    pub opened: Vec<QmiEventMask>,
    pub closed: usize,
    pub supported: Vec<MsgId>,
    pub open_status: Option<ClientStatus>,
    pub reject_registration: bool,
    scripts: HashMap<MsgId, VecDeque<Reply>>,
}

impl MockState {
    pub fn sent_ids(&self) -> Vec<MsgId> {
        self.sent.iter().map(Request::msg_id).collect()
    }

    pub fn count(&self, id: MsgId) -> usize {
        self.sent.iter().filter(|r| r.msg_id() == id).count()
    }
}

/// Records traffic; unscripted sends succeed and are acknowledged with success.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    inbox: Option<IndicationInbox>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inbox(inbox: IndicationInbox) -> Self {
        Self {
            state: Arc::default(),
            inbox: Some(inbox),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Queue a reply for the next send of `id`.
    pub fn script(&self, id: MsgId, reply: Reply) {
        self.state()
            .scripts
            .entry(id)
            .or_default()
            .push_back(reply);
    }

    pub fn deliver(&self, indication: Indication) {
        if let Some(inbox) = &self.inbox {
            inbox.deliver(indication);
        }
    }
}

impl Transport for MockTransport {
    fn open(&mut self, event_mask: QmiEventMask) -> ClientStatus {
        let mut state = self.state();
        state.opened.push(event_mask);
        state.open_status.unwrap_or(ClientStatus::Success)
    }

    fn close(&mut self) {
        self.state().closed += 1;
    }

    fn send(&mut self, request: &Request) -> ClientStatus {
        let id = request.msg_id();
        let reply = {
            let mut state = self.state();
            state.sent.push(request.clone());
            state.scripts.get_mut(&id).and_then(VecDeque::pop_front)
        };
        match reply {
            Some(Reply::Indication(indication)) => {
                self.deliver(indication);
                ClientStatus::Success
            }
            Some(Reply::Status(status)) => status,
            Some(Reply::Silent) => ClientStatus::Success,
            None => {
                self.deliver(Indication::Ack {
                    id,
                    status: QmiStatus::Success,
                });
                ClientStatus::Success
            }
        }
    }

    fn register_event_mask(&mut self, event_mask: QmiEventMask) -> bool {
        let mut state = self.state();
        state.registrations.push(event_mask);
        !state.reject_registration
    }

    fn probe(&mut self, ids: &[MsgId]) -> u64 {
        let state = self.state();
        ids.iter()
            .enumerate()
            .filter(|(_, id)| state.supported.contains(id))
            .fold(0u64, |acc, (i, _)| acc | (1 << i))
    }
}

pub fn ack(id: MsgId, status: QmiStatus) -> Indication {
    Indication::Ack { id, status }
}

/// An adapter wired to a mock transport, with its inbound queue and reports.
pub struct Harness {
    pub transport: MockTransport,
    pub queue: InboundQueue,
    pub adapter: LocApiAdapter,
    reports: mpsc::UnboundedReceiver<Report>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AdapterConfig::default())
    }

    pub fn with_config(config: AdapterConfig) -> Self {
        let (inbox, queue) = transport::inbox();
        let transport = MockTransport::with_inbox(inbox);
        let (tx, reports) = mpsc::unbounded_channel();
        let adapter = LocApiAdapter::new(Box::new(transport.clone()), Box::new(tx), &queue, config);
        Self {
            transport,
            queue,
            adapter,
            reports,
        }
    }

    /// Opened with `mask`, inbound traffic processed and reports discarded.
    pub async fn opened(mask: EventMask) -> Self {
        let mut h = Self::new();
        h.adapter.open(mask).await.unwrap();
        h.pump();
        h.drain_reports();
        h
    }

    /// Route everything waiting in the inbound queue.
    pub fn pump(&mut self) {
        while let Some(item) = self.queue.try_recv() {
            self.adapter.handle_inbound(item);
        }
    }

    /// Deliver an indication as the transport would, then route it.
    pub fn inject(&mut self, indication: Indication) {
        self.transport.deliver(indication);
        self.pump();
    }

    pub fn drain_reports(&mut self) -> Vec<Report> {
        let mut out = Vec::new();
        while let Ok(report) = self.reports.try_recv() {
            out.push(report);
        }
        out
    }
}
