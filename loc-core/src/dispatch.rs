//! Request dispatch: fire-and-forget and blocking sends, indication
//! correlation, and the busy-retry queue.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::ClientStatus;
use crate::indication::Indication;
use crate::mask::SessionController;
use crate::protocol::{MsgId, QmiStatus};
use crate::request::Request;
use crate::transport::Transport;

struct Waiter {
    epoch: u64,
    tx: oneshot::Sender<Indication>,
}

#[derive(Default)]
struct Waiters {
    next_epoch: u64,
    by_id: HashMap<MsgId, VecDeque<Waiter>>,
}

/// Pending blocking requests keyed by companion indication id. Each waiter
/// carries an epoch so a timed-out call removes only its own entry.
#[derive(Clone, Default)]
pub struct Correlator {
    inner: Arc<Mutex<Waiters>>,
}

impl Correlator {
    fn lock(&self) -> MutexGuard<'_, Waiters> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: MsgId) -> (u64, oneshot::Receiver<Indication>) {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self.lock();
        let epoch = waiters.next_epoch;
        waiters.next_epoch += 1;
        waiters
            .by_id
            .entry(id)
            .or_default()
            .push_back(Waiter { epoch, tx });
        (epoch, rx)
    }

    pub fn cancel(&self, id: MsgId, epoch: u64) {
        let mut waiters = self.lock();
        if let Some(queue) = waiters.by_id.get_mut(&id) {
            queue.retain(|w| w.epoch != epoch);
            if queue.is_empty() {
                waiters.by_id.remove(&id);
            }
        }
    }

    /// Hand the indication to the oldest live waiter for its id. Returns true if one took it.
    pub fn resolve(&self, indication: &Indication) -> bool {
        let id = indication.msg_id();
        let mut waiters = self.lock();
        let Some(queue) = waiters.by_id.get_mut(&id) else {
            return false;
        };
        let mut delivered = false;
        while let Some(waiter) = queue.pop_front() {
            if waiter.tx.send(indication.clone()).is_ok() {
                delivered = true;
                break;
            }
        }
        if queue.is_empty() {
            waiters.by_id.remove(&id);
        }
        delivered
    }

    pub fn pending(&self, id: MsgId) -> usize {
        self.lock().by_id.get(&id).map_or(0, VecDeque::len)
    }
}

/// A busy-rejected request waiting for the engine to come on.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub request: Request,
    pub timeout: Duration,
}

impl PendingRequest {
    pub fn msg_id(&self) -> MsgId {
        self.request.msg_id()
    }
}

/// FIFO of busy-rejected requests. Holds at most one record per message id;
/// a newer rejection of the same class replaces the older payload in place.
#[derive(Debug, Default)]
pub struct RetryQueue {
    pending: VecDeque<PendingRequest>,
}

impl RetryQueue {
    pub fn push(&mut self, record: PendingRequest) {
        let id = record.msg_id();
        match self.pending.iter_mut().find(|p| p.msg_id() == id) {
            Some(existing) => *existing = record,
            None => self.pending.push_back(record),
        }
    }

    /// Replay every record once, oldest first, and empty the queue. Replays are
    /// raw sends: no correlation, no re-queuing.
    pub fn drain(&mut self, transport: &mut dyn Transport) -> usize {
        let count = self.pending.len();
        for record in self.pending.drain(..) {
            let status = transport.send(&record.request);
            debug!(msg_id = ?record.msg_id(), status = ?status, "replayed busy request");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.pending.iter()
    }
}

/// Sends requests on behalf of the adapter.
pub struct Dispatcher {
    correlator: Correlator,
    retry: RetryQueue,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(correlator: Correlator, timeout: Duration) -> Self {
        Self {
            correlator,
            retry: RetryQueue::default(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send without waiting for an indication.
    pub fn send(
        &mut self,
        transport: &mut dyn Transport,
        session: &mut SessionController,
        request: Request,
    ) -> ClientStatus {
        let status = transport.send(&request);
        if status == ClientStatus::EngineBusy {
            self.cache_busy(transport, session, request);
        } else if !status.is_success() {
            warn!(msg_id = ?request.msg_id(), status = ?status, "send failed");
        }
        status
    }

    /// Send and wait for the indication carrying the same id, or the timeout.
    /// `Ok` holds the indication whatever its embedded status.
    pub async fn send_sync(
        &mut self,
        transport: &mut dyn Transport,
        session: &mut SessionController,
        request: Request,
    ) -> Result<Indication, ClientStatus> {
        let id = request.msg_id();
        let (epoch, rx) = self.correlator.register(id);
        let status = transport.send(&request);
        let result = if !status.is_success() {
            self.correlator.cancel(id, epoch);
            Err(status)
        } else {
            match tokio::time::timeout(self.timeout, rx).await {
                Ok(Ok(indication)) => Ok(indication),
                Ok(Err(_)) => Err(ClientStatus::GeneralFailure),
                Err(_) => {
                    self.correlator.cancel(id, epoch);
                    Err(ClientStatus::Timeout)
                }
            }
        };
        let busy = match &result {
            Err(ClientStatus::EngineBusy) => true,
            Ok(indication) => indication.status() == Some(QmiStatus::EngineBusy),
            Err(_) => false,
        };
        if busy {
            self.cache_busy(transport, session, request);
        } else if let Err(status) = &result {
            warn!(msg_id = ?id, status = ?status, "blocking request failed");
        }
        result
    }

    fn cache_busy(
        &mut self,
        transport: &mut dyn Transport,
        session: &mut SessionController,
        request: Request,
    ) {
        session.ensure_engine_state(transport);
        debug!(msg_id = ?request.msg_id(), "engine busy, caching request");
        self.retry.push(PendingRequest {
            request,
            timeout: self.timeout,
        });
    }

    pub fn drain_retry_queue(&mut self, transport: &mut dyn Transport) -> usize {
        self.retry.drain(transport)
    }

    pub fn retry_queue(&self) -> &RetryQueue {
        &self.retry
    }

    pub fn clear_retry_queue(&mut self) {
        self.retry.clear();
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::QmiEventMask;
    use crate::protocol::SuplVersion;
    use crate::request::ProtocolConfigParameters;
    use crate::test_util::{MockTransport, Reply};
    use crate::transport;
    use crate::wire::encode_payload;

    const TIMEOUT: Duration = Duration::from_millis(1000);

    fn supl_request() -> Request {
        Request::SetProtocolConfigParameters(ProtocolConfigParameters {
            supl_version: Some(SuplVersion::V2_0),
            ..Default::default()
        })
    }

    fn setup() -> (MockTransport, SessionController, Dispatcher) {
        let (inbox, queue) = transport::inbox();
        let transport = MockTransport::with_inbox(inbox);
        let dispatcher = Dispatcher::new(queue.correlator, TIMEOUT);
        (transport, SessionController::new(), dispatcher)
    }

    #[tokio::test]
    async fn blocking_request_returns_correlated_indication() {
        let (mut transport, mut session, mut dispatcher) = setup();
        let ack = Indication::Ack {
            id: MsgId::SetProtocolConfigParameters,
            status: QmiStatus::Success,
        };
        transport.script(MsgId::SetProtocolConfigParameters, Reply::Indication(ack.clone()));
        let result = dispatcher
            .send_sync(&mut transport, &mut session, supl_request())
            .await;
        assert_eq!(result, Ok(ack));
        assert_eq!(dispatcher.correlator().pending(MsgId::SetProtocolConfigParameters), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_request_times_out() {
        let (mut transport, mut session, mut dispatcher) = setup();
        transport.script(MsgId::SetProtocolConfigParameters, Reply::Silent);
        let result = dispatcher
            .send_sync(&mut transport, &mut session, supl_request())
            .await;
        assert_eq!(result, Err(ClientStatus::Timeout));
        assert_eq!(dispatcher.correlator().pending(MsgId::SetProtocolConfigParameters), 0);
        assert!(dispatcher.retry_queue().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_not_queued() {
        let (mut transport, mut session, mut dispatcher) = setup();
        transport.script(
            MsgId::SetProtocolConfigParameters,
            Reply::Status(ClientStatus::PhoneOffline),
        );
        let result = dispatcher
            .send_sync(&mut transport, &mut session, supl_request())
            .await;
        assert_eq!(result, Err(ClientStatus::PhoneOffline));
        assert!(dispatcher.retry_queue().is_empty());
        assert_eq!(dispatcher.correlator().pending(MsgId::SetProtocolConfigParameters), 0);
    }

    #[tokio::test]
    async fn busy_status_queues_once_and_replays_same_bytes() {
        let (mut transport, mut session, mut dispatcher) = setup();
        transport.script(
            MsgId::SetProtocolConfigParameters,
            Reply::Status(ClientStatus::EngineBusy),
        );
        let result = dispatcher
            .send_sync(&mut transport, &mut session, supl_request())
            .await;
        assert_eq!(result, Err(ClientStatus::EngineBusy));
        assert_eq!(dispatcher.retry_queue().len(), 1);
        assert_eq!(
            transport.state().registrations,
            vec![QmiEventMask::ENGINE_STATE]
        );

        let sent_before = transport.state().sent.len();
        assert_eq!(dispatcher.drain_retry_queue(&mut transport), 1);
        assert!(dispatcher.retry_queue().is_empty());
        let sent = transport.state().sent.clone();
        assert_eq!(sent.len(), sent_before + 1);
        let replay = &sent[sent.len() - 1];
        assert_eq!(replay.msg_id(), MsgId::SetProtocolConfigParameters);
        assert_eq!(
            encode_payload(replay).unwrap(),
            encode_payload(&supl_request()).unwrap()
        );
        assert_eq!(dispatcher.correlator().pending(MsgId::SetProtocolConfigParameters), 0);
    }

    #[tokio::test]
    async fn busy_indication_status_queues() {
        let (mut transport, mut session, mut dispatcher) = setup();
        transport.script(
            MsgId::SetProtocolConfigParameters,
            Reply::Indication(Indication::Ack {
                id: MsgId::SetProtocolConfigParameters,
                status: QmiStatus::EngineBusy,
            }),
        );
        let result = dispatcher
            .send_sync(&mut transport, &mut session, supl_request())
            .await;
        assert!(matches!(result, Ok(Indication::Ack { status: QmiStatus::EngineBusy, .. })));
        assert_eq!(dispatcher.retry_queue().len(), 1);
    }

    #[test]
    fn fire_and_forget_busy_queues() {
        let (mut transport, mut session, mut dispatcher) = setup();
        transport.script(MsgId::Stop, Reply::Status(ClientStatus::EngineBusy));
        let status = dispatcher.send(&mut transport, &mut session, Request::Stop { session_id: 1 });
        assert_eq!(status, ClientStatus::EngineBusy);
        assert_eq!(dispatcher.retry_queue().len(), 1);
    }

    #[test]
    fn retry_queue_keeps_fifo_and_one_record_per_id() {
        let mut queue = RetryQueue::default();
        queue.push(PendingRequest {
            request: Request::SetNmeaTypes { nmea_sentence_type: 1 },
            timeout: TIMEOUT,
        });
        queue.push(PendingRequest {
            request: Request::Stop { session_id: 1 },
            timeout: TIMEOUT,
        });
        queue.push(PendingRequest {
            request: Request::SetNmeaTypes { nmea_sentence_type: 2 },
            timeout: TIMEOUT,
        });
        assert_eq!(queue.len(), 2);

        let mut transport = MockTransport::new();
        assert_eq!(queue.drain(&mut transport), 2);
        assert!(queue.is_empty());
        assert_eq!(
            transport.state().sent,
            vec![
                Request::SetNmeaTypes { nmea_sentence_type: 2 },
                Request::Stop { session_id: 1 },
            ]
        );
    }

    #[test]
    fn replay_failure_is_not_requeued() {
        let mut queue = RetryQueue::default();
        queue.push(PendingRequest {
            request: Request::Stop { session_id: 1 },
            timeout: TIMEOUT,
        });
        let mut transport = MockTransport::new();
        transport.script(MsgId::Stop, Reply::Status(ClientStatus::EngineBusy));
        queue.drain(&mut transport);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn correlator_serves_waiters_in_order() {
        let correlator = Correlator::default();
        let (_e1, rx1) = correlator.register(MsgId::SetServer);
        let (e2, rx2) = correlator.register(MsgId::SetServer);
        correlator.cancel(MsgId::SetServer, e2);
        drop(rx2);
        let ack = Indication::Ack {
            id: MsgId::SetServer,
            status: QmiStatus::Success,
        };
        assert!(correlator.resolve(&ack));
        assert_eq!(rx1.await.unwrap(), ack);
        assert!(!correlator.resolve(&ack));
    }

    #[test]
    fn dropped_receiver_is_skipped() {
        let correlator = Correlator::default();
        let (_e1, rx1) = correlator.register(MsgId::SetServer);
        let (_e2, mut rx2) = correlator.register(MsgId::SetServer);
        drop(rx1);
        let ack = Indication::Ack {
            id: MsgId::SetServer,
            status: QmiStatus::Success,
        };
        assert!(correlator.resolve(&ack));
        assert_eq!(rx2.try_recv().unwrap(), ack);
    }
}
