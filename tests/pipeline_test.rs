use async_trait::async_trait;
use lcdscope::app::overlay::{OverlayState, OVERLAY_TIMEOUT};
use lcdscope::audio::{AudioControl, FRAME_LEN};
use lcdscope::device::protocol::{join_packets, END_PACKET, PACKETS_PER_MESSAGE};
use lcdscope::device::{Completion, Packet, Transport};
use lcdscope::{App, DeviceWriter, Result, SpectrumAnalyzer, VolumeEvent};
use std::f32::consts::PI;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Completes every transfer immediately and keeps a copy of what was sent.
#[derive(Clone, Default)]
struct LoopbackTransport {
    sent: Arc<Mutex<Vec<Packet>>>,
}

impl LoopbackTransport {
    fn messages(&self) -> Vec<[u8; 42]> {
        let sent = self.sent.lock().unwrap();
        sent.chunks_exact(PACKETS_PER_MESSAGE)
            .map(|chunk| {
                let packets: [Packet; PACKETS_PER_MESSAGE] = chunk.try_into().unwrap();
                join_packets(&packets)
            })
            .collect()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn submit(&self, packet: Packet, _timeout: Duration) -> Completion {
        self.sent.lock().unwrap().push(packet);
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Ok(()));
        rx
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Stream {
    corked: bool,
}

impl AudioControl for Stream {
    fn pause(&mut self) {
        self.corked = true;
    }

    fn resume(&mut self) {
        self.corked = false;
    }
}

fn tone(start: usize, len: usize, bin: usize) -> Vec<f32> {
    // Reduce the phase in integers first; f32 cannot hold bin * i radians precisely
    (start..start + len)
        .map(|i| 2.0 * (2.0 * PI * ((bin * i) % FRAME_LEN) as f32 / FRAME_LEN as f32).sin())
        .collect()
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn new_app(transport: LoopbackTransport) -> App<LoopbackTransport, Stream> {
    App::new(
        SpectrumAnalyzer::new(FRAME_LEN).unwrap(),
        DeviceWriter::new(transport),
        Stream::default(),
        OVERLAY_TIMEOUT,
    )
}

#[tokio::test]
async fn test_irregular_chunks_produce_one_screen() {
    let transport = LoopbackTransport::default();
    let mut app = new_app(transport.clone());
    let now = Instant::now();

    app.on_data(&tone(0, 1500, 100), now);
    settle().await;
    assert!(transport.messages().is_empty());
    assert_eq!(app.residue_len(), 1500);

    app.on_data(&tone(1500, 3000, 100), now);
    settle().await;
    assert_eq!(transport.messages().len(), 1);
    assert_eq!(app.residue_len(), 404);

    app.on_data(&tone(4500, 100, 100), now);
    settle().await;
    assert_eq!(transport.messages().len(), 1);
    assert_eq!(app.residue_len(), 504);

    let screen = transport.messages()[0];
    // Column 10 holds the tone and is full height on both rows
    assert_eq!(screen[10], 0x07);
    assert_eq!(screen[16 + 10], 0x07);
    assert_eq!(&screen[32..35], &[0xFF, 0xFF, 0xFF]);
    assert_eq!(&screen[35..], &END_PACKET);

    let sequences: Vec<u8> = transport.sent.lock().unwrap().iter().map(|p| p.sequence).collect();
    assert_eq!(sequences, vec![0, 2, 4, 6, 8, 10]);
}

#[tokio::test]
async fn test_volume_overlay_preempts_spectrum() {
    let transport = LoopbackTransport::default();
    let mut app = new_app(transport.clone());
    let start = Instant::now();

    app.on_volume(
        VolumeEvent {
            level: 50,
            muted: false,
        },
        start,
    );
    settle().await;
    assert!(app.audio().corked);
    let messages = transport.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(&messages[0][..16], b"Volume: 50%     ");
    assert_eq!(&messages[0][16..24], &[0, 0, 1, 1, 2, 2, 3, 3]);

    // Frames that were already queued are analysed but not shown
    app.on_data(&tone(0, FRAME_LEN, 100), start);
    settle().await;
    assert_eq!(transport.messages().len(), 1);

    // A second change pushes the deadline out
    let later = start + Duration::from_secs(2);
    app.on_volume(
        VolumeEvent {
            level: 0,
            muted: true,
        },
        later,
    );
    settle().await;
    assert_eq!(&transport.messages()[1][..16], b"Muted           ");

    app.on_tick(start + OVERLAY_TIMEOUT);
    assert!(matches!(
        app.overlay_state(),
        OverlayState::VolumeOverlay { .. }
    ));

    app.on_tick(later + OVERLAY_TIMEOUT);
    settle().await;
    assert_eq!(app.overlay_state(), OverlayState::Spectrum);
    assert!(!app.audio().corked);
    let messages = transport.messages();
    assert_eq!(messages.len(), 3);
    assert!(messages[2][..32].iter().all(|&b| b == b' '));

    // Spectrum output resumes
    app.on_data(&tone(0, FRAME_LEN, 100), later + OVERLAY_TIMEOUT);
    settle().await;
    assert_eq!(transport.messages().len(), 4);
}

#[tokio::test]
async fn test_close_leaves_panel_blank() {
    let transport = LoopbackTransport::default();
    let mut app = new_app(transport.clone());

    app.on_data(&tone(0, FRAME_LEN, 40), Instant::now());
    app.close().await.unwrap();

    let messages = transport.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[1][..32].iter().all(|&b| b == b' '));
}
