//! Bounded, best-effort screen updates.
//!
//! At most [`IN_FLIGHT_LIMIT`] messages are outstanding. A message holds its
//! permit until the completion of its final packet is observed. When no permit
//! is free the new screen is dropped: a slow panel skips stale frames instead of
//! building a backlog.

use super::protocol::{encode_message, split_packets};
use super::transport::Transport;
use crate::display::CharacterMatrix;
use crate::error::{Error, Result};
use log::{debug, trace, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Messages allowed in flight at once.
pub const IN_FLIGHT_LIMIT: usize = 2;

/// Default per-packet timeout.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(100);

/// Anything that can accept a finished screen.
pub trait FrameSink {
    /// Returns false if the screen was dropped.
    fn submit(&self, matrix: &CharacterMatrix) -> bool;
}

pub struct DeviceWriter<T: Transport> {
    transport: Arc<T>,
    tokens: Arc<Semaphore>,
    timeout: Duration,
}

impl<T: Transport> DeviceWriter<T> {
    pub fn new(transport: T) -> Self {
        Self::with_timeout(transport, TRANSFER_TIMEOUT)
    }

    pub fn with_timeout(transport: T, timeout: Duration) -> Self {
        Self {
            transport: Arc::new(transport),
            tokens: Arc::new(Semaphore::new(IN_FLIGHT_LIMIT)),
            timeout,
        }
    }

    /// Permits currently free.
    pub fn available_tokens(&self) -> usize {
        self.tokens.available_permits()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a screen if a permit is free. Never waits for the device.
    pub fn submit(&self, matrix: &CharacterMatrix) -> bool {
        let permit = match self.tokens.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                trace!("Display busy, skipping update");
                return false;
            }
        };

        self.dispatch(matrix, permit);
        true
    }

    /// Blank the panel.
    pub fn clear(&self) -> bool {
        self.submit(&CharacterMatrix::blank())
    }

    fn dispatch(&self, matrix: &CharacterMatrix, permit: OwnedSemaphorePermit) {
        let message = encode_message(&matrix.to_bytes());
        let mut permit = Some(permit);

        for packet in split_packets(&message) {
            let completion = self.transport.submit(packet, self.timeout);
            // Only the final packet carries the permit
            let token = if packet.is_last() { permit.take() } else { None };
            tokio::spawn(async move {
                match completion.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("Packet {} failed: {}", packet.sequence, e),
                    Err(_) => warn!("Packet {} was dropped by the transport", packet.sequence),
                }
                drop(token);
            });
        }
    }

    /// Wait for every in-flight message, leave the panel blank, then release the device.
    pub async fn close(self) -> Result<()> {
        self.drain().await?;
        if self.clear() {
            self.drain().await?;
        }
        self.transport.close().await
    }

    async fn drain(&self) -> Result<()> {
        let all = self
            .tokens
            .acquire_many(IN_FLIGHT_LIMIT as u32)
            .await
            .map_err(|e| Error::Device(format!("token pool closed: {}", e)))?;
        debug!("All display transfers drained");
        drop(all);
        Ok(())
    }
}

impl<T: Transport> FrameSink for DeviceWriter<T> {
    fn submit(&self, matrix: &CharacterMatrix) -> bool {
        DeviceWriter::submit(self, matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::protocol::{Packet, PACKETS_PER_MESSAGE};
    use crate::device::transport::Completion;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Holds every transfer open until the test completes it.
    #[derive(Default)]
    struct ManualTransport {
        pending: Mutex<Vec<(Packet, oneshot::Sender<Result<()>>)>>,
        closed: Mutex<bool>,
    }

    impl ManualTransport {
        fn complete(&self, index: usize, result: Result<()>) {
            let (_, done) = self.pending.lock().unwrap().remove(index);
            let _ = done.send(result);
        }

        fn sequences(&self) -> Vec<u8> {
            self.pending.lock().unwrap().iter().map(|(p, _)| p.sequence).collect()
        }
    }

    #[async_trait]
    impl Transport for ManualTransport {
        fn submit(&self, packet: Packet, _timeout: Duration) -> Completion {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().unwrap().push((packet, tx));
            rx
        }

        async fn close(&self) -> Result<()> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    async fn settle<T: Transport>(writer: &DeviceWriter<T>, tokens: usize) {
        for _ in 0..100 {
            if writer.available_tokens() == tokens {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {} free tokens", tokens);
    }

    #[tokio::test]
    async fn test_backpressure_drops_extra_frames() {
        let writer = DeviceWriter::new(ManualTransport::default());
        let matrix = CharacterMatrix::blank();

        assert!(writer.submit(&matrix));
        assert!(writer.submit(&matrix));
        assert!(!writer.submit(&matrix));
        assert_eq!(writer.transport().sequences().len(), 2 * PACKETS_PER_MESSAGE);

        // Completing the first message's final packet frees exactly one slot
        writer.transport().complete(PACKETS_PER_MESSAGE - 1, Ok(()));
        settle(&writer, 1).await;
        assert!(writer.submit(&matrix));
        assert!(!writer.submit(&matrix));
    }

    #[tokio::test]
    async fn test_only_final_packet_releases_token() {
        let writer = DeviceWriter::new(ManualTransport::default());
        assert!(writer.submit(&CharacterMatrix::blank()));
        assert_eq!(writer.transport().sequences(), vec![0, 2, 4, 6, 8, 10]);

        for _ in 0..PACKETS_PER_MESSAGE - 1 {
            writer.transport().complete(0, Ok(()));
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(writer.available_tokens(), IN_FLIGHT_LIMIT - 1);

        writer.transport().complete(0, Ok(()));
        settle(&writer, IN_FLIGHT_LIMIT).await;
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_packets_do_not_leak_tokens() {
        let writer = DeviceWriter::new(ManualTransport::default());
        assert!(writer.submit(&CharacterMatrix::blank()));

        writer
            .transport()
            .complete(0, Err(Error::Timeout(TRANSFER_TIMEOUT)));
        // The rest of the message is still on its way
        assert_eq!(writer.transport().sequences(), vec![2, 4, 6, 8, 10]);

        for _ in 0..3 {
            writer.transport().complete(0, Ok(()));
        }
        writer
            .transport()
            .complete(1, Err(Error::Device("stall".to_string())));
        settle(&writer, IN_FLIGHT_LIMIT).await;
    }

    #[tokio::test]
    async fn test_close_waits_for_in_flight_messages() {
        let writer = DeviceWriter::new(ManualTransport::default());
        assert!(writer.submit(&CharacterMatrix::blank()));

        let mut drain = tokio_test::task::spawn(writer.drain());
        tokio_test::assert_pending!(drain.poll());

        for _ in 0..PACKETS_PER_MESSAGE {
            writer.transport().complete(0, Ok(()));
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(drain.is_woken());
        tokio_test::assert_ready_ok!(drain.poll());
    }

    #[tokio::test]
    async fn test_close_clears_panel_and_releases_transport() {
        let writer = DeviceWriter::new(ManualTransport::default());
        let transport_view = writer.transport.clone();

        let closing = tokio::spawn(writer.close());
        // close() submits a blank screen and waits for it
        for _ in 0..100 {
            if transport_view.sequences().len() == PACKETS_PER_MESSAGE {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(transport_view.sequences().len(), PACKETS_PER_MESSAGE);
        assert!(!*transport_view.closed.lock().unwrap());

        for _ in 0..PACKETS_PER_MESSAGE {
            transport_view.complete(0, Ok(()));
        }
        closing.await.unwrap().unwrap();
        assert!(*transport_view.closed.lock().unwrap());
    }
}
