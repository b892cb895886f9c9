//! Physical transports under cross-boundary channels.
//!
//! The extension plumbing that really carries messages between page,
//! relays, and panel only has to satisfy [`TransportTx`] plus a frame
//! receiver. Two in-repo transports cover development and tests:
//! [`pair_transport`], a duplex point-to-point link with a bounded queue
//! and a parked-message backlog, and [`BroadcastHub`], a same-tab
//! broadcast medium that echoes to every endpoint.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};

use super::envelope::Envelope;
use super::errors::{ChannelError, ChannelResult};

/// One frame on the wire.
#[derive(Debug, Clone)]
pub enum Frame {
    Message(Envelope),
    /// Sentinel: parked envelopes wait in the backlog, pull them.
    Backlog,
}

/// Result of a transport-level send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    Sent,
    /// The receiver's queue ceiling is hit; park and announce instead.
    Overflow,
    Closed,
}

/// Sending half of a transport endpoint.
pub trait TransportTx: Send + Sync {
    fn post(&self, envelope: &Envelope) -> PostOutcome;

    /// Parks an envelope beside the saturated queue. Returns true when a
    /// backlog notice still needs to be announced (consecutive overflows
    /// coalesce into one outstanding sentinel).
    fn park(&self, envelope: Envelope) -> bool;

    /// Forces the backlog sentinel past the queue ceiling.
    fn announce_backlog(&self);

    /// Synchronously drains envelopes parked for this endpoint.
    fn pull_backlog(&self) -> ChannelResult<Vec<Envelope>>;

    /// Whether the medium echoes frames back to every endpoint, its own
    /// sender included.
    fn is_broadcast(&self) -> bool;
}

enum ReceiverKind {
    Queue {
        rx: mpsc::UnboundedReceiver<Frame>,
        depth: Arc<AtomicUsize>,
    },
    Feed(broadcast::Receiver<Envelope>),
}

/// Receiving half of a transport endpoint.
pub struct FrameReceiver(ReceiverKind);

impl FrameReceiver {
    pub async fn recv(&mut self) -> Option<Frame> {
        match &mut self.0 {
            ReceiverKind::Queue { rx, depth } => {
                let frame = rx.recv().await?;
                if matches!(frame, Frame::Message(_)) {
                    depth.fetch_sub(1, Ordering::AcqRel);
                }
                Some(frame)
            }
            ReceiverKind::Feed(rx) => loop {
                match rx.recv().await {
                    Ok(envelope) => return Some(Frame::Message(envelope)),
                    Err(broadcast::error::RecvError::Lagged(dropped)) => {
                        tracing::warn!(dropped, "broadcast endpoint lagged, frames lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
        }
    }
}

/// Both halves of one transport endpoint.
pub struct TransportLink {
    pub tx: Arc<dyn TransportTx>,
    pub rx: FrameReceiver,
}

/// Envelopes parked beside a saturated queue, one direction of a pair.
#[derive(Default)]
struct BacklogSlot {
    parked: Mutex<VecDeque<Envelope>>,
    announced: AtomicBool,
    fail_pulls: AtomicBool,
}

/// One endpoint of a point-to-point pair.
pub struct PairEnd {
    out_queue: mpsc::UnboundedSender<Frame>,
    out_depth: Arc<AtomicUsize>,
    capacity: usize,
    out_backlog: Arc<BacklogSlot>,
    in_backlog: Arc<BacklogSlot>,
}

impl PairEnd {
    /// Fault injection: makes the next pulls on this endpoint fail, for
    /// exercising the fatal pull path.
    pub fn set_pull_fault(&self, on: bool) {
        self.in_backlog.fail_pulls.store(on, Ordering::Release);
    }
}

impl TransportTx for PairEnd {
    fn post(&self, envelope: &Envelope) -> PostOutcome {
        if self.out_depth.load(Ordering::Acquire) >= self.capacity {
            return PostOutcome::Overflow;
        }
        match self.out_queue.send(Frame::Message(envelope.clone())) {
            Ok(()) => {
                self.out_depth.fetch_add(1, Ordering::AcqRel);
                PostOutcome::Sent
            }
            Err(_) => PostOutcome::Closed,
        }
    }

    fn park(&self, envelope: Envelope) -> bool {
        self.out_backlog.parked.lock().unwrap().push_back(envelope);
        !self.out_backlog.announced.swap(true, Ordering::AcqRel)
    }

    fn announce_backlog(&self) {
        let _ = self.out_queue.send(Frame::Backlog);
    }

    fn pull_backlog(&self) -> ChannelResult<Vec<Envelope>> {
        if self.in_backlog.fail_pulls.load(Ordering::Acquire) {
            return Err(ChannelError::BacklogPull("injected pull fault".into()));
        }
        self.in_backlog.announced.store(false, Ordering::Release);
        let mut parked = self.in_backlog.parked.lock().unwrap();
        Ok(parked.drain(..).collect())
    }

    fn is_broadcast(&self) -> bool {
        false
    }
}

/// One end of a built pair, with the concrete sender still visible so
/// tests can reach the fault-injection switch before type erasure.
pub struct PairLink {
    pub end: Arc<PairEnd>,
    pub rx: FrameReceiver,
}

impl From<PairLink> for TransportLink {
    fn from(link: PairLink) -> Self {
        TransportLink {
            tx: link.end,
            rx: link.rx,
        }
    }
}

/// Builds a duplex point-to-point transport.
///
/// `capacity` is the per-direction queue ceiling; posting past it reports
/// [`PostOutcome::Overflow`] and the sender is expected to park.
pub fn pair_transport(capacity: usize) -> (PairLink, PairLink) {
    let (to_b, from_a) = mpsc::unbounded_channel();
    let (to_a, from_b) = mpsc::unbounded_channel();
    let depth_ab = Arc::new(AtomicUsize::new(0));
    let depth_ba = Arc::new(AtomicUsize::new(0));
    let backlog_ab = Arc::new(BacklogSlot::default());
    let backlog_ba = Arc::new(BacklogSlot::default());

    let a = PairLink {
        end: Arc::new(PairEnd {
            out_queue: to_b,
            out_depth: depth_ab.clone(),
            capacity,
            out_backlog: backlog_ab.clone(),
            in_backlog: backlog_ba.clone(),
        }),
        rx: FrameReceiver(ReceiverKind::Queue {
            rx: from_b,
            depth: depth_ba.clone(),
        }),
    };
    let b = PairLink {
        end: Arc::new(PairEnd {
            out_queue: to_a,
            out_depth: depth_ba,
            capacity,
            out_backlog: backlog_ba,
            in_backlog: backlog_ab,
        }),
        rx: FrameReceiver(ReceiverKind::Queue {
            rx: from_a,
            depth: depth_ab,
        }),
    };
    (a, b)
}

/// Same-tab broadcast medium. Every attached endpoint sees every frame,
/// its own sends included.
pub struct BroadcastHub {
    feed: broadcast::Sender<Envelope>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity);
        Self { feed }
    }

    pub fn attach(&self) -> TransportLink {
        let rx = self.feed.subscribe();
        TransportLink {
            tx: Arc::new(HubEnd {
                feed: self.feed.clone(),
            }),
            rx: FrameReceiver(ReceiverKind::Feed(rx)),
        }
    }
}

struct HubEnd {
    feed: broadcast::Sender<Envelope>,
}

impl TransportTx for HubEnd {
    fn post(&self, envelope: &Envelope) -> PostOutcome {
        // No receivers is not a failure for a broadcast medium.
        let _ = self.feed.send(envelope.clone());
        PostOutcome::Sent
    }

    fn park(&self, _envelope: Envelope) -> bool {
        false
    }

    fn announce_backlog(&self) {}

    fn pull_backlog(&self) -> ChannelResult<Vec<Envelope>> {
        Ok(Vec::new())
    }

    fn is_broadcast(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event: &str) -> Envelope {
        Envelope::new("scope", event, json!(null))
    }

    #[tokio::test]
    async fn test_pair_delivers_in_order() {
        let (a, mut b) = pair_transport(8);
        assert_eq!(a.end.post(&envelope("one")), PostOutcome::Sent);
        assert_eq!(a.end.post(&envelope("two")), PostOutcome::Sent);

        for wanted in ["one", "two"] {
            match b.rx.recv().await {
                Some(Frame::Message(env)) => assert_eq!(env.event, wanted),
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_overflow_at_capacity() {
        let (a, _b) = pair_transport(2);
        assert_eq!(a.end.post(&envelope("one")), PostOutcome::Sent);
        assert_eq!(a.end.post(&envelope("two")), PostOutcome::Sent);
        assert_eq!(a.end.post(&envelope("three")), PostOutcome::Overflow);
    }

    #[tokio::test]
    async fn test_receiving_frees_capacity() {
        let (a, mut b) = pair_transport(1);
        assert_eq!(a.end.post(&envelope("one")), PostOutcome::Sent);
        assert_eq!(a.end.post(&envelope("two")), PostOutcome::Overflow);

        let _ = b.rx.recv().await;
        assert_eq!(a.end.post(&envelope("two")), PostOutcome::Sent);
    }

    #[tokio::test]
    async fn test_backlog_park_and_pull() {
        let (a, mut b) = pair_transport(1);
        a.end.post(&envelope("one"));
        assert_eq!(a.end.post(&envelope("two")), PostOutcome::Overflow);

        // First park wants an announcement, the second coalesces.
        assert!(a.end.park(envelope("two")));
        assert!(!a.end.park(envelope("three")));
        a.end.announce_backlog();

        // Ceiling-exempt sentinel arrives even with the queue full.
        let _ = b.rx.recv().await; // "one"
        match b.rx.recv().await {
            Some(Frame::Backlog) => {}
            other => panic!("unexpected frame: {:?}", other),
        }

        let pulled = b.end.pull_backlog().unwrap();
        let events: Vec<_> = pulled.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(events, vec!["two", "three"]);

        // Pull resets the announcement latch.
        assert!(a.end.park(envelope("four")));
    }

    #[tokio::test]
    async fn test_pull_fault_injection() {
        let (a, b) = pair_transport(1);
        a.end.park(envelope("parked"));
        b.end.set_pull_fault(true);
        let err = b.end.pull_backlog().unwrap_err();
        assert!(matches!(err, ChannelError::BacklogPull(_)));
    }

    #[tokio::test]
    async fn test_post_to_dropped_peer_reports_closed() {
        let (a, b) = pair_transport(4);
        drop(b);
        assert_eq!(a.end.post(&envelope("one")), PostOutcome::Closed);
    }

    #[tokio::test]
    async fn test_broadcast_echoes_to_sender() {
        let hub = BroadcastHub::new(16);
        let mut me = hub.attach();
        let mut other = hub.attach();

        assert_eq!(me.tx.post(&envelope("ping")), PostOutcome::Sent);

        for link in [&mut me, &mut other] {
            match link.rx.recv().await {
                Some(Frame::Message(env)) => assert_eq!(env.event, "ping"),
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }
}
