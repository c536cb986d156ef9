//! Adapter task, report consumer and wiring between them and the bridge.

use std::future::Future;
use std::pin::Pin;

use anyhow::Context;
use loc_core::{inbox, LocApiAdapter, Report};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::bridge::{self, BoxedReader, BoxedWriter, SocketTransport};
use crate::config::Config;
use crate::xtra::XtraSource;

/// Run until `shutdown` resolves or the bridge goes away.
pub async fn run(
    cfg: Config,
    mut reader: BoxedReader,
    writer: BoxedWriter,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let supported = bridge::handshake(&mut reader).await?;

    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    let (inbox, mut queue) = inbox();
    let writer_task = tokio::spawn(bridge::run_writer(writer, frame_rx));
    let reader_task = tokio::spawn(bridge::run_reader(reader, inbox));

    let (report_tx, report_rx) = mpsc::unbounded_channel();
    let (xtra_tx, mut xtra_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let source = XtraSource::new(cfg.xtra_urls_fallback.clone())?;
    let consumer = tokio::spawn(consume_reports(report_rx, source, xtra_tx));

    let mut adapter = LocApiAdapter::new(
        Box::new(SocketTransport::new(frame_tx, supported)),
        Box::new(report_tx),
        &queue,
        cfg.adapter.clone(),
    );
    adapter
        .open(cfg.event_mask)
        .await
        .context("opening location service")?;
    info!(event_mask = ?cfg.event_mask, "location service open");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
            inbound = queue.recv() => match inbound {
                Some(inbound) => adapter.handle_inbound(inbound),
                None => {
                    warn!("bridge gone");
                    break;
                }
            },
            Some(blob) = xtra_rx.recv() => {
                if !inject_xtra(&mut adapter, &blob, &mut shutdown).await {
                    info!("shutting down during XTRA injection");
                    break;
                }
            }
        }
    }

    adapter.close();
    drop(adapter);
    let _ = writer_task.await;
    reader_task.abort();
    let _ = consumer.await;
    Ok(())
}

/// Inject an XTRA blob unless `shutdown` resolves first. Returns false when
/// shutdown won; the injection is abandoned part way.
async fn inject_xtra<S>(
    adapter: &mut LocApiAdapter,
    blob: &[u8],
    shutdown: &mut Pin<&mut S>,
) -> bool
where
    S: Future<Output = ()>,
{
    tokio::select! {
        result = adapter.set_xtra_data(blob) => {
            if let Err(e) = result {
                warn!(error = %e, "XTRA injection failed");
            }
            true
        }
        _ = shutdown.as_mut() => false,
    }
}

/// Log reports and serve XTRA requests. Downloads run on their own task and
/// hand the blob back to the adapter task.
async fn consume_reports(
    mut rx: mpsc::UnboundedReceiver<Report>,
    mut source: XtraSource,
    xtra_tx: mpsc::UnboundedSender<Vec<u8>>,
) {
    while let Some(report) = rx.recv().await {
        match report {
            Report::Position {
                location, status, ..
            } => debug!(
                lat = location.latitude,
                lon = location.longitude,
                accuracy = location.accuracy,
                status = ?status,
                "position"
            ),
            Report::Nmea(sentence) => trace!(%sentence, "nmea"),
            Report::XtraServer { urls } => {
                info!(urls = ?urls, "XTRA servers");
                source.update(&urls);
            }
            Report::RequestXtraData => {
                let source = source.clone();
                let tx = xtra_tx.clone();
                tokio::spawn(async move {
                    match source.download().await {
                        Ok(blob) => {
                            let _ = tx.send(blob);
                        }
                        Err(e) => warn!(error = %e, "XTRA request not served"),
                    }
                });
            }
            Report::EngineDown => warn!("engine down"),
            Report::EngineUp => info!("engine up"),
            other => debug!(report = ?other, "report"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loc_core::wire::Frame;
    use loc_core::{Indication, QmiStatus};
    use std::time::Duration;
    use tokio::io::{split, AsyncWriteExt};

    use crate::bridge::{read_frame, write_frame};

    fn test_config() -> Config {
        let mut cfg = Config::default();
        cfg.adapter.sync_timeout_ms = 50;
        cfg
    }

    #[tokio::test]
    async fn opens_answers_and_closes_on_shutdown() {
        let (client, bridge) = tokio::io::duplex(64 * 1024);
        let (cr, cw) = split(client);
        let (mut br, mut bw) = split(bridge);
        write_frame(&mut bw, &Frame::Hello { supported: vec![] })
            .await
            .unwrap();

        let fake_bridge = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Ok(Some(frame)) = read_frame(&mut br).await {
                if let Frame::Request(req) = &frame {
                    let ack = Indication::Ack {
                        id: req.msg_id(),
                        status: QmiStatus::Success,
                    };
                    write_frame(&mut bw, &Frame::Indication(ack)).await.unwrap();
                }
                let done = frame == Frame::Close;
                seen.push(frame);
                if done {
                    break;
                }
            }
            seen
        });

        run(test_config(), Box::new(cr), Box::new(cw), async {})
            .await
            .unwrap();
        let seen = fake_bridge.await.unwrap();
        assert!(matches!(seen.first(), Some(Frame::Open { .. })));
        assert_eq!(seen.last(), Some(&Frame::Close));
        assert!(seen.iter().any(|f| matches!(f, Frame::Request(_))));
    }

    #[tokio::test]
    async fn shutdown_interrupts_xtra_injection() {
        let mut cfg = Config::default();
        cfg.adapter.sync_timeout_ms = 60_000;
        cfg.adapter.xtra_part_len = 4;
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
        let (_inbox, queue) = inbox();
        let (report_tx, _report_rx) = mpsc::unbounded_channel::<Report>();
        let mut adapter = LocApiAdapter::new(
            Box::new(SocketTransport::new(frame_tx, vec![])),
            Box::new(report_tx),
            &queue,
            cfg.adapter.clone(),
        );

        // Nothing answers the first part, so only shutdown can end the call.
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let shutdown = async {
            let _ = stop_rx.await;
        };
        tokio::pin!(shutdown);
        let injection = inject_xtra(&mut adapter, &[0u8; 16], &mut shutdown);
        tokio::pin!(injection);
        let early = tokio::time::timeout(Duration::from_millis(20), &mut injection).await;
        assert!(early.is_err());
        stop_tx.send(()).unwrap();
        assert!(!injection.await);
        assert!(matches!(frame_rx.try_recv(), Ok(Frame::Request(_))));
    }

    #[tokio::test]
    async fn bridge_loss_ends_the_daemon() {
        let (client, bridge) = tokio::io::duplex(64 * 1024);
        let (cr, cw) = split(client);
        let (_br, mut bw) = split(bridge);
        write_frame(&mut bw, &Frame::Hello { supported: vec![] })
            .await
            .unwrap();
        bw.shutdown().await.unwrap();

        run(
            test_config(),
            Box::new(cr),
            Box::new(cw),
            std::future::pending(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn missing_hello_is_fatal() {
        let (client, bridge) = tokio::io::duplex(1024);
        let (cr, cw) = split(client);
        drop(bridge);
        assert!(run(test_config(), Box::new(cr), Box::new(cw), async {})
            .await
            .is_err());
    }
}
