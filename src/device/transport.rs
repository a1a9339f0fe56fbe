//! Asynchronous packet transport to the panel.

use super::protocol::{Packet, PACKET_LEN};
use crate::error::{Error, Result};
use async_trait::async_trait;
use log::{debug, error, warn};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Resolves once a submitted transfer has finished, successfully or not.
pub type Completion = oneshot::Receiver<Result<()>>;

/// Failed packets in a row after which the device is considered gone.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 24;

/// Fixed-length interrupt-style writes with per-transfer completion.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Queue one packet. Must not block; packets go out in submission order.
    fn submit(&self, packet: Packet, timeout: Duration) -> Completion;

    /// Release the device. Callers drain outstanding transfers first.
    async fn close(&self) -> Result<()>;
}

/// A blocking sink for single wire packets, one transfer per call.
pub trait PacketEndpoint: Send + 'static {
    fn write_packet(&mut self, packet: &[u8; PACKET_LEN], timeout: Duration) -> Result<()>;
}

type Request = (Packet, Duration, oneshot::Sender<Result<()>>);

/// Feeds a [`PacketEndpoint`] from a dedicated blocking task, in submission order.
pub struct EndpointTransport {
    queue: Mutex<Option<mpsc::UnboundedSender<Request>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EndpointTransport {
    /// Start writing to `endpoint`. Persistent write failures are reported on `faults`.
    pub fn spawn<E: PacketEndpoint>(endpoint: E, faults: mpsc::UnboundedSender<Error>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::task::spawn_blocking(move || write_loop(endpoint, rx, faults));

        Self {
            queue: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }
}

#[async_trait]
impl Transport for EndpointTransport {
    fn submit(&self, packet: Packet, timeout: Duration) -> Completion {
        let (done_tx, done_rx) = oneshot::channel();
        let queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        match queue.as_ref() {
            Some(tx) => {
                if let Err(mpsc::error::SendError((_, _, done_tx))) =
                    tx.send((packet, timeout, done_tx))
                {
                    let _ = done_tx.send(Err(Error::Device("writer has stopped".to_string())));
                }
            }
            None => {
                let _ = done_tx.send(Err(Error::Device("device is closed".to_string())));
            }
        }
        done_rx
    }

    async fn close(&self) -> Result<()> {
        // Dropping the sender lets the writer finish what is queued and exit
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).take();
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            worker
                .await
                .map_err(|e| Error::Device(format!("writer task failed: {}", e)))?;
        }
        debug!("Display transport closed");
        Ok(())
    }
}

fn write_loop<E: PacketEndpoint>(
    mut endpoint: E,
    mut rx: mpsc::UnboundedReceiver<Request>,
    faults: mpsc::UnboundedSender<Error>,
) {
    let mut failures = 0u32;

    while let Some((packet, timeout, done)) = rx.blocking_recv() {
        let result = endpoint.write_packet(&packet.to_bytes(), timeout);

        if result.is_ok() {
            failures = 0;
        } else {
            failures += 1;
            if failures == MAX_CONSECUTIVE_FAILURES {
                error!("{} consecutive packet writes failed", failures);
                let _ = faults.send(Error::Device(format!(
                    "{} consecutive packet writes failed",
                    failures
                )));
            }
        }

        if done.send(result).is_err() {
            warn!("Completion for packet {} was abandoned", packet.sequence);
        }
    }
    // The endpoint is dropped here, on the blocking thread
}
