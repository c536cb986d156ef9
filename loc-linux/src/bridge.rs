//! Co-processor bridge: framed socket to the process that owns the QMI
//! channel. A writer task drains outgoing frames; a reader task delivers
//! indications into the adapter's inbox.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Context};
use loc_core::wire::{decode_body, encode_frame, frame_len, Frame, LEN_PREFIX};
use loc_core::{
    ClientStatus, IndicationInbox, MsgId, QmiEventMask, Request, ServiceError, Transport,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeAddr {
    Unix(PathBuf),
    Tcp(String),
}

impl BridgeAddr {
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix("unix:") {
            Some(path) => BridgeAddr::Unix(PathBuf::from(path)),
            None => BridgeAddr::Tcp(s.to_string()),
        }
    }
}

/// Connect and split into boxed halves.
pub async fn connect(addr: &BridgeAddr) -> anyhow::Result<(BoxedReader, BoxedWriter)> {
    match addr {
        #[cfg(unix)]
        BridgeAddr::Unix(path) => {
            let stream = tokio::net::UnixStream::connect(path)
                .await
                .with_context(|| format!("connecting to {}", path.display()))?;
            let (r, w) = stream.into_split();
            Ok((Box::new(r), Box::new(w)))
        }
        #[cfg(not(unix))]
        BridgeAddr::Unix(path) => bail!("unix sockets unsupported here: {}", path.display()),
        BridgeAddr::Tcp(host) => {
            let stream = tokio::net::TcpStream::connect(host.as_str())
                .await
                .with_context(|| format!("connecting to {host}"))?;
            stream.set_nodelay(true)?;
            let (r, w) = stream.into_split();
            Ok((Box::new(r), Box::new(w)))
        }
    }
}

/// Read one frame. `Ok(None)` on a clean end of stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> anyhow::Result<Option<Frame>> {
    let mut prefix = [0u8; LEN_PREFIX];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let mut body = vec![0u8; frame_len(prefix)?];
    reader
        .read_exact(&mut body)
        .await
        .context("bridge closed mid-frame")?;
    Ok(Some(decode_body(&body)?))
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> anyhow::Result<()> {
    let bytes = encode_frame(frame)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Wait for the bridge's `Hello` and return the message ids it accepts.
pub async fn handshake<R: AsyncRead + Unpin>(reader: &mut R) -> anyhow::Result<Vec<MsgId>> {
    match read_frame(reader).await? {
        Some(Frame::Hello { supported }) => {
            debug!(count = supported.len(), "bridge hello");
            Ok(supported)
        }
        Some(other) => bail!("expected hello, got {other:?}"),
        None => bail!("bridge closed before hello"),
    }
}

/// `Transport` over the bridge. Sends never block; frames queue for the writer task.
pub struct SocketTransport {
    frames: mpsc::UnboundedSender<Frame>,
    supported: HashSet<MsgId>,
}

impl SocketTransport {
    pub fn new(frames: mpsc::UnboundedSender<Frame>, supported: Vec<MsgId>) -> Self {
        Self {
            frames,
            supported: supported.into_iter().collect(),
        }
    }

    fn push(&self, frame: Frame) -> ClientStatus {
        match self.frames.send(frame) {
            Ok(()) => ClientStatus::Success,
            Err(_) => ClientStatus::ServiceNotPresent,
        }
    }
}

impl Transport for SocketTransport {
    fn open(&mut self, event_mask: QmiEventMask) -> ClientStatus {
        self.push(Frame::Open {
            event_mask: event_mask.bits(),
        })
    }

    fn close(&mut self) {
        let _ = self.push(Frame::Close);
    }

    fn send(&mut self, request: &Request) -> ClientStatus {
        trace!(msg_id = ?request.msg_id(), "send");
        self.push(Frame::Request(request.clone()))
    }

    fn register_event_mask(&mut self, event_mask: QmiEventMask) -> bool {
        self.push(Frame::RegisterEventMask {
            event_mask: event_mask.bits(),
        })
        .is_success()
    }

    fn probe(&mut self, ids: &[MsgId]) -> u64 {
        ids.iter()
            .enumerate()
            .filter(|(_, id)| self.supported.contains(id))
            .fold(0u64, |acc, (i, _)| acc | (1 << i))
    }
}

/// Drain `rx` onto the socket until the channel closes or a write fails.
pub async fn run_writer<W: AsyncWrite + Unpin>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Frame>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            warn!(error = %e, "bridge write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Deliver inbound frames until the bridge goes away, then signal the
/// service as unavailable.
pub async fn run_reader<R: AsyncRead + Unpin>(mut reader: R, inbox: IndicationInbox) {
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(Frame::Indication(ind))) => inbox.deliver(ind),
            Ok(Some(Frame::ServiceError(err))) => inbox.service_error(err),
            Ok(Some(other)) => warn!(frame = ?other, "unexpected frame from bridge"),
            Ok(None) => {
                warn!("bridge closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "bridge read failed");
                break;
            }
        }
    }
    inbox.service_error(ServiceError::ServiceUnavailable);
}
