//! Cross-boundary channel over a physical transport.
//!
//! A `PortChannel` namespaces its traffic by logical-channel name, so
//! several channels can ride one link. Incoming frames from foreign
//! namespaces are dropped; on broadcast media each outgoing envelope is
//! tagged with a per-process instance id and own echoes are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::emitter::ListenerTable;
use super::envelope::Envelope;
use super::errors::ChannelError;
use super::transport::{Frame, PostOutcome, TransportLink, TransportTx};
use super::{Channel, Listener, ListenerId};

struct PortShared {
    name: String,
    instance: Option<Uuid>,
    listeners: ListenerTable,
    tx: Arc<dyn TransportTx>,
    closed: AtomicBool,
    terminal: Mutex<Option<ChannelError>>,
}

impl PortShared {
    fn deliver(&self, envelope: Envelope) {
        if envelope.source != self.name {
            return;
        }
        if let (Some(mine), Some(theirs)) = (self.instance, envelope.instance) {
            if mine == theirs {
                return;
            }
        }
        for listener in self.listeners.snapshot(&envelope.event) {
            listener(envelope.args.clone());
        }
    }
}

/// One logical channel attached to one transport endpoint.
///
/// Must be created inside a tokio runtime; incoming frames are handled on
/// a spawned pump task.
pub struct PortChannel {
    shared: Arc<PortShared>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl PortChannel {
    pub fn attach(name: impl Into<String>, link: TransportLink) -> Self {
        let TransportLink { tx, mut rx } = link;
        let instance = tx.is_broadcast().then(Uuid::new_v4);
        let shared = Arc::new(PortShared {
            name: name.into(),
            instance,
            listeners: ListenerTable::default(),
            tx,
            closed: AtomicBool::new(false),
            terminal: Mutex::new(None),
        });

        let pump_shared = shared.clone();
        let pump = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if pump_shared.closed.load(Ordering::Acquire) {
                    break;
                }
                match frame {
                    Frame::Message(envelope) => pump_shared.deliver(envelope),
                    Frame::Backlog => match pump_shared.tx.pull_backlog() {
                        Ok(envelopes) => {
                            for envelope in envelopes {
                                pump_shared.deliver(envelope);
                            }
                        }
                        Err(error) => {
                            tracing::error!(
                                channel = %pump_shared.name,
                                %error,
                                "backlog pull failed, channel is dead"
                            );
                            *pump_shared.terminal.lock().unwrap() = Some(error);
                            pump_shared.closed.store(true, Ordering::Release);
                            pump_shared.listeners.clear(None);
                            break;
                        }
                    },
                }
            }
        });

        Self {
            shared,
            pump: Mutex::new(Some(pump)),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Instance id used for self-echo filtering; set on broadcast media.
    pub fn instance(&self) -> Option<Uuid> {
        self.shared.instance
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// The error that killed the channel, if the pump died on one.
    pub fn terminal_error(&self) -> Option<ChannelError> {
        self.shared.terminal.lock().unwrap().clone()
    }
}

impl Channel for PortChannel {
    fn subscribe(&self, event: &str, listener: Listener) -> ListenerId {
        self.shared.listeners.insert(event, listener)
    }

    fn unsubscribe(&self, event: &str, id: ListenerId) -> bool {
        self.shared.listeners.remove(event, id)
    }

    fn unsubscribe_all(&self, event: Option<&str>) {
        self.shared.listeners.clear(event);
    }

    fn dispatch(&self, event: &str, args: Value) -> bool {
        if self.is_closed() {
            return false;
        }
        let envelope = Envelope::new(self.shared.name.clone(), event, args)
            .with_instance(self.shared.instance);
        match self.shared.tx.post(&envelope) {
            PostOutcome::Sent => true,
            PostOutcome::Closed => false,
            PostOutcome::Overflow => {
                if self.shared.tx.park(envelope) {
                    self.shared.tx.announce_backlog();
                }
                true
            }
        }
    }

    fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.listeners.clear(None);
        if let Some(pump) = self.pump.lock().unwrap().take() {
            pump.abort();
        }
    }
}

impl Drop for PortChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::transport::{pair_transport, BroadcastHub};
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::{timeout, Duration};

    fn forwarder() -> (Listener, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener: Listener = Arc::new(move |args| {
            let _ = tx.send(args);
        });
        (listener, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("delivery timed out")
            .expect("listener channel closed")
    }

    #[tokio::test]
    async fn test_round_trip_between_ends() {
        let (left, right) = pair_transport(8);
        let a = PortChannel::attach("scope", left.into());
        let b = PortChannel::attach("scope", right.into());

        let (listener, mut rx) = forwarder();
        b.subscribe("ping", listener);

        assert!(a.dispatch("ping", json!({"n": 1})));
        assert_eq!(next(&mut rx).await, json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_foreign_namespace_filtered() {
        let (left, right) = pair_transport(8);
        let a = PortChannel::attach("alpha", left.into());
        let b = PortChannel::attach("beta", right.into());

        let (beta_listener, mut beta_rx) = forwarder();
        b.subscribe("ping", beta_listener);

        a.dispatch("ping", json!(1));
        let outcome = timeout(Duration::from_millis(50), beta_rx.recv()).await;
        assert!(outcome.is_err(), "foreign-namespace frame leaked through");
    }

    #[tokio::test]
    async fn test_shared_medium_carries_both_namespaces() {
        let hub = BroadcastHub::new(16);
        let a_alpha = PortChannel::attach("alpha", hub.attach());
        let b_alpha = PortChannel::attach("alpha", hub.attach());
        let a_beta = PortChannel::attach("beta", hub.attach());
        let b_beta = PortChannel::attach("beta", hub.attach());

        let (alpha_listener, mut alpha_rx) = forwarder();
        b_alpha.subscribe("ping", alpha_listener);
        let (beta_listener, mut beta_rx) = forwarder();
        b_beta.subscribe("ping", beta_listener);

        a_alpha.dispatch("ping", json!("for-alpha"));
        a_beta.dispatch("ping", json!("for-beta"));

        assert_eq!(next(&mut alpha_rx).await, json!("for-alpha"));
        assert_eq!(next(&mut beta_rx).await, json!("for-beta"));
    }

    #[tokio::test]
    async fn test_broadcast_drops_own_echo() {
        let hub = BroadcastHub::new(16);
        let a = PortChannel::attach("scope", hub.attach());
        let b = PortChannel::attach("scope", hub.attach());
        assert!(a.instance().is_some());

        let (a_listener, mut a_rx) = forwarder();
        let (b_listener, mut b_rx) = forwarder();
        a.subscribe("ping", a_listener);
        b.subscribe("ping", b_listener);

        a.dispatch("ping", json!(7));
        assert_eq!(next(&mut b_rx).await, json!(7));
        let echo = timeout(Duration::from_millis(50), a_rx.recv()).await;
        assert!(echo.is_err(), "own echo was not dropped");
    }

    #[tokio::test]
    async fn test_backlog_pull_delivers_parked() {
        let (left, right) = pair_transport(1);
        let a = PortChannel::attach("scope", left.into());
        let b = PortChannel::attach("scope", right.into());

        let (listener, mut rx) = forwarder();
        b.subscribe("data", listener);

        // Fill the single queue slot, then overflow into the backlog.
        assert!(a.dispatch("data", json!(1)));
        assert!(a.dispatch("data", json!(2)));
        assert!(a.dispatch("data", json!(3)));

        for wanted in [json!(1), json!(2), json!(3)] {
            assert_eq!(next(&mut rx).await, wanted);
        }
    }

    #[tokio::test]
    async fn test_pull_failure_is_fatal() {
        let (left, right) = pair_transport(1);
        let fail_end = right.end.clone();
        let a = PortChannel::attach("scope", left.into());
        let b = PortChannel::attach("scope", right.into());

        fail_end.set_pull_fault(true);
        let (listener, mut rx) = forwarder();
        b.subscribe("data", listener);

        a.dispatch("data", json!(1));
        a.dispatch("data", json!(2));

        // The queued frame still lands, then the pull kills the channel.
        assert_eq!(next(&mut rx).await, json!(1));
        timeout(Duration::from_secs(1), async {
            while !b.is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("channel never died");
        assert!(matches!(
            b.terminal_error(),
            Some(ChannelError::BacklogPull(_))
        ));
        assert!(!b.dispatch("data", json!(3)));
    }

    #[tokio::test]
    async fn test_close_stops_delivery() {
        let (left, right) = pair_transport(8);
        let a = PortChannel::attach("scope", left.into());
        let b = PortChannel::attach("scope", right.into());

        let (listener, mut rx) = forwarder();
        b.subscribe("ping", listener);
        b.close();

        a.dispatch("ping", json!(1));
        let outcome = timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(matches!(outcome, Err(_) | Ok(None)));
    }
}
