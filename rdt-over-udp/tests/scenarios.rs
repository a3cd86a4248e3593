//! End-to-end scenarios over real loopback sockets.
//!
//! Each test runs two endpoints in-process.  Both receive loops are tokio
//! tasks, so the sides make progress concurrently while the test body sends
//! and then waits on a channel fed by the delivery callback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use rdt_over_udp::protocol::ProtocolKind;
use rdt_over_udp::rdt20::Rdt20;
use rdt_over_udp::rdt21::Rdt21;
use rdt_over_udp::simulator::{FaultModel, UnreliableChannel, Verdict};
use rdt_over_udp::{ChannelConfig, Endpoint, EndpointConfig, Protocol, Socket, StateError};

const POLL: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Two loopback sockets on OS-chosen ports, connected to each other.
async fn socket_pair() -> (Socket, Socket) {
    let a = Socket::bind("127.0.0.1", 0).await.expect("bind a");
    let b = Socket::bind("127.0.0.1", 0).await.expect("bind b");
    a.connect(b.local_addr()).await.expect("connect a");
    b.connect(a.local_addr()).await.expect("connect b");
    (a, b)
}

/// Forward every delivered payload into a channel.
fn collect(endpoint: &Endpoint) -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = mpsc::unbounded_channel();
    endpoint.add_receiver(move |payload: &[u8]| {
        let _ = tx.send(payload.to_vec());
    });
    rx
}

/// Damages the last byte of the first datagram it sees, then passes
/// everything through.  Counts every datagram it judges.
#[derive(Default)]
struct CorruptFirst {
    seen: Arc<AtomicUsize>,
}

impl FaultModel for CorruptFirst {
    fn judge(&mut self, len: usize) -> Verdict {
        if self.seen.fetch_add(1, Ordering::SeqCst) > 0 || len == 0 {
            return Verdict::pass();
        }
        Verdict {
            flip: Some((len - 1, 0)),
            ..Verdict::pass()
        }
    }
}

/// Both sides corrupt their first inbound datagram.  The counter tracks
/// how many datagrams reached `b`.
async fn corrupt_first_pair(
    a_engine: Box<dyn Protocol>,
    b_engine: Box<dyn Protocol>,
) -> (Endpoint, Endpoint, Arc<AtomicUsize>) {
    let (a, b) = socket_pair().await;
    let b_model = CorruptFirst::default();
    let arrivals_at_b = Arc::clone(&b_model.seen);
    let a = UnreliableChannel::with_model(a, CorruptFirst::default());
    let b = UnreliableChannel::with_model(b, b_model);
    (
        Endpoint::start(a.into(), a_engine, POLL),
        Endpoint::start(b.into(), b_engine, POLL),
        arrivals_at_b,
    )
}

// ---------------------------------------------------------------------------
// Scenario A: 3.0 over a perfect channel on the chat program's ports
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rdt30_hello_is_delivered_exactly_once() {
    let a_config = EndpointConfig {
        protocol: ProtocolKind::Rdt30,
        local_port: 7777,
        remote_port: 8888,
        poll_interval: Some(POLL),
        channel: Some(ChannelConfig::perfect()),
        ..EndpointConfig::default()
    };
    let b_config = a_config.mirrored();

    let a = Endpoint::open(&a_config).await.expect("open 7777");
    let b = Endpoint::open(&b_config).await.expect("open 8888");
    let mut delivered = collect(&b);

    a.send(b"hello").await.expect("send");

    let got = tokio::time::timeout(Duration::from_secs(2), delivered.recv())
        .await
        .expect("delivery timed out");
    assert_eq!(got, Some(b"hello".to_vec()));

    // Nothing else shows up, even after a retransmission timeout would
    // have passed.
    let extra = tokio::time::timeout(Duration::from_millis(300), delivered.recv()).await;
    assert!(extra.is_err(), "unexpected second delivery: {extra:?}");

    a.shutdown().await;
    b.shutdown().await;
}

// ---------------------------------------------------------------------------
// Scenario B: first frame corrupted on both sides
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rdt20_loses_message_when_nak_is_corrupted() {
    let (a, b, _) = corrupt_first_pair(Box::new(Rdt20::new()), Box::new(Rdt20::new())).await;
    let mut delivered = collect(&b);

    a.send(b"hello").await.expect("send");

    // B NAKs the damaged frame, A cannot read the damaged NAK and gives up.
    let got = tokio::time::timeout(Duration::from_millis(500), delivered.recv()).await;
    assert!(got.is_err(), "2.0 should have lost the message, got {got:?}");

    // A is idle again, so the next send is accepted.
    a.send(b"again").await.expect("sender returned to idle");

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn rdt21_recovers_with_one_retransmission() {
    let (a, b, arrivals_at_b) =
        corrupt_first_pair(Box::new(Rdt21::new()), Box::new(Rdt21::new())).await;
    let mut delivered = collect(&b);

    a.send(b"hello").await.expect("send");
    assert_eq!(a.send(b"too soon").await, Err(StateError::AwaitingAck));

    let got = tokio::time::timeout(Duration::from_secs(2), delivered.recv())
        .await
        .expect("2.1 should deliver after retransmitting");
    assert_eq!(got, Some(b"hello".to_vec()));

    let extra = tokio::time::timeout(Duration::from_millis(200), delivered.recv()).await;
    assert!(extra.is_err(), "delivered twice: {extra:?}");

    // The damaged original plus exactly one retransmission.
    assert_eq!(arrivals_at_b.load(Ordering::SeqCst), 2);

    a.shutdown().await;
    b.shutdown().await;
}

// ---------------------------------------------------------------------------
// Raw-channel behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rdt10_delivers_garbage_verbatim() {
    let (a, b) = socket_pair().await;
    let a = Endpoint::start(
        a.into(),
        ProtocolKind::Rdt10.build(0, Duration::ZERO, std::time::Instant::now()),
        POLL,
    );
    let b_channel = UnreliableChannel::with_model(b, CorruptFirst::default());
    let b = Endpoint::start(
        b_channel.into(),
        ProtocolKind::Rdt10.build(0, Duration::ZERO, std::time::Instant::now()),
        POLL,
    );
    let mut delivered = collect(&b);

    a.send(b"abc").await.unwrap();
    let got = tokio::time::timeout(Duration::from_secs(2), delivered.recv())
        .await
        .unwrap();
    assert_eq!(got, Some(vec![b'a', b'b', b'c' ^ 0x01]));

    a.shutdown().await;
    b.shutdown().await;
}
