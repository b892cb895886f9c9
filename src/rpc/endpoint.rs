//! # RPC Endpoint
//!
//! Symmetric request/response machinery over a [`Channel`]. Each endpoint
//! can both register named methods and call methods registered on the
//! peer. Outbound calls carry a locally unique id; the response listener
//! resolves the matching in-flight call and ignores ids it does not know.
//!
//! # API
//!
//! - `execute`: call a method on the peer, await the typed result
//! - `register_method` / `register_fn`: expose a method to the peer
//! - `pending_count`: in-flight outbound calls, for diagnostics
//! - `close`: detach from the channel; in-flight calls keep their timers

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::channel::{Channel, ListenerId};

use super::errors::{MethodFault, RpcError, RpcResult};
use super::protocol::{
    RequestFrame, ResponseFrame, CODE_HANDLER_FAULT, CODE_METHOD_NOT_FOUND, REQUEST_EVENT,
    RESPONSE_EVENT,
};

/// Deadline applied to outbound calls unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Async handler for one registered method. Receives the raw call args
/// and produces either a result value or a fault that travels back to
/// the caller as a code-500 response.
pub type MethodHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, MethodFault>> + Send + Sync>;

// ==================
// In-Flight Calls
// ==================

struct PendingCall {
    resolver: oneshot::Sender<RpcResult<Value>>,
    method: String,
    timer: JoinHandle<()>,
}

struct EndpointShared {
    channel: Arc<dyn Channel>,
    methods: RwLock<HashMap<String, MethodHandler>>,
    pending: Mutex<HashMap<u64, PendingCall>>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl EndpointShared {
    fn handle_request(self: &Arc<Self>, args: Value) {
        let frame: RequestFrame = match serde_json::from_value(args) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(%error, "malformed rpc request frame");
                return;
            }
        };

        let handler = self
            .methods
            .read()
            .unwrap()
            .get(&frame.method_name)
            .cloned();

        match handler {
            None => {
                self.respond(ResponseFrame::fail(
                    frame.id,
                    CODE_METHOD_NOT_FOUND,
                    format!("no handler for method {}", frame.method_name),
                ));
            }
            Some(handler) => {
                let shared = Arc::clone(self);
                tokio::spawn(async move {
                    let response = match handler(frame.args).await {
                        Ok(result) => ResponseFrame::ok(frame.id, result),
                        Err(fault) => {
                            ResponseFrame::fail(frame.id, CODE_HANDLER_FAULT, fault.message)
                        }
                    };
                    shared.respond(response);
                });
            }
        }
    }

    fn handle_response(&self, args: Value) {
        let frame: ResponseFrame = match serde_json::from_value(args) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(%error, "malformed rpc response frame");
                return;
            }
        };

        let call = self.pending.lock().unwrap().remove(&frame.id);
        let Some(call) = call else {
            // Late responses after a timeout land here. Not an error.
            tracing::trace!(id = frame.id, "response for unknown or settled call");
            return;
        };
        call.timer.abort();

        let outcome = match frame.error {
            Some(fault) => Err(RpcError::Remote {
                code: fault.code,
                message: fault.message,
            }),
            None => Ok(frame.result.unwrap_or(Value::Null)),
        };
        let _ = call.resolver.send(outcome);
    }

    fn respond(&self, frame: ResponseFrame) {
        let wire = match serde_json::to_value(&frame) {
            Ok(wire) => wire,
            Err(error) => {
                tracing::warn!(%error, id = frame.id, "unserializable rpc response");
                return;
            }
        };
        if !self.channel.dispatch(RESPONSE_EVENT, wire) {
            tracing::warn!(id = frame.id, "rpc response was not dispatched");
        }
    }

    fn cancel(&self, id: u64) {
        if let Some(call) = self.pending.lock().unwrap().remove(&id) {
            call.timer.abort();
        }
    }
}

// ==================
// Endpoint
// ==================

/// One side of an RPC association over a shared channel.
pub struct RpcEndpoint {
    shared: Arc<EndpointShared>,
    hooks: Mutex<Vec<(&'static str, ListenerId)>>,
}

impl RpcEndpoint {
    /// Attaches to `channel` with the default call deadline.
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self::with_timeout(channel, DEFAULT_TIMEOUT)
    }

    /// Attaches to `channel` with an explicit call deadline.
    pub fn with_timeout(channel: Arc<dyn Channel>, timeout: Duration) -> Self {
        let shared = Arc::new(EndpointShared {
            channel: Arc::clone(&channel),
            methods: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            timeout,
        });

        // The channel holds these listener closures for its lifetime, so
        // they capture the shared state weakly to keep teardown acyclic.
        let weak = Arc::downgrade(&shared);
        let request_hook = channel.subscribe(
            REQUEST_EVENT,
            Arc::new(move |args| {
                if let Some(shared) = weak.upgrade() {
                    shared.handle_request(args);
                }
            }),
        );
        let weak = Arc::downgrade(&shared);
        let response_hook = channel.subscribe(
            RESPONSE_EVENT,
            Arc::new(move |args| {
                if let Some(shared) = weak.upgrade() {
                    shared.handle_response(args);
                }
            }),
        );

        Self {
            shared,
            hooks: Mutex::new(vec![
                (REQUEST_EVENT, request_hook),
                (RESPONSE_EVENT, response_hook),
            ]),
        }
    }

    /// Calls `method` on the peer and awaits the decoded result.
    ///
    /// Resolves with [`RpcError::Timeout`] if no response arrives within
    /// the deadline, and with [`RpcError::Remote`] if the peer answers
    /// with an error payload.
    pub async fn execute<A, R>(&self, method: &str, args: A) -> RpcResult<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let args = serde_json::to_value(args).map_err(|e| RpcError::Codec(e.to_string()))?;
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (resolver, receiver) = oneshot::channel();

        let timer = {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                tokio::time::sleep(shared.timeout).await;
                if let Some(call) = shared.pending.lock().unwrap().remove(&id) {
                    tracing::warn!(method = %call.method, id, "rpc call timed out");
                    let _ = call.resolver.send(Err(RpcError::Timeout));
                }
            })
        };

        // Registered before dispatch so a same-turn response cannot miss it.
        self.shared.pending.lock().unwrap().insert(
            id,
            PendingCall {
                resolver,
                method: method.to_string(),
                timer,
            },
        );

        let frame = RequestFrame {
            method_name: method.to_string(),
            id,
            args,
        };
        let wire = match serde_json::to_value(&frame) {
            Ok(wire) => wire,
            Err(error) => {
                self.shared.cancel(id);
                return Err(RpcError::Codec(error.to_string()));
            }
        };
        if !self.shared.channel.dispatch(REQUEST_EVENT, wire) {
            self.shared.cancel(id);
            return Err(RpcError::Dispatch);
        }

        match receiver.await {
            Ok(Ok(value)) => {
                serde_json::from_value(value).map_err(|e| RpcError::Codec(e.to_string()))
            }
            Ok(Err(error)) => Err(error),
            Err(_) => Err(RpcError::ChannelClosed),
        }
    }

    /// Registers an async method handler. Fails if the name is taken.
    pub fn register_method(&self, name: &str, handler: MethodHandler) -> RpcResult<()> {
        let mut methods = self.shared.methods.write().unwrap();
        if methods.contains_key(name) {
            return Err(RpcError::DuplicateMethod(name.to_string()));
        }
        methods.insert(name.to_string(), handler);
        Ok(())
    }

    /// Registers a synchronous method handler. Fails if the name is taken.
    pub fn register_fn<F>(&self, name: &str, handler: F) -> RpcResult<()>
    where
        F: Fn(Value) -> Result<Value, MethodFault> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.register_method(
            name,
            Arc::new(move |args| {
                let handler = Arc::clone(&handler);
                async move { handler(args) }.boxed()
            }),
        )
    }

    /// The channel this endpoint rides on.
    pub fn channel(&self) -> Arc<dyn Channel> {
        Arc::clone(&self.shared.channel)
    }

    /// Number of outbound calls still awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().unwrap().len()
    }

    /// Detaches from the channel. In-flight calls are left to their
    /// timers, so abandoned callers still resolve with a timeout.
    pub fn close(&self) {
        let hooks: Vec<_> = self.hooks.lock().unwrap().drain(..).collect();
        for (event, id) in hooks {
            self.shared.channel.unsubscribe(event, id);
        }
    }
}

impl Drop for RpcEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{pair_transport, PortChannel};
    use serde_json::json;

    fn linked_endpoints() -> (RpcEndpoint, RpcEndpoint) {
        let (left, right) = pair_transport(64);
        let left: Arc<dyn Channel> = Arc::new(PortChannel::attach("rpc-test", left.into()));
        let right: Arc<dyn Channel> = Arc::new(PortChannel::attach("rpc-test", right.into()));
        (RpcEndpoint::new(left), RpcEndpoint::new(right))
    }

    #[tokio::test]
    async fn test_round_trip_call() {
        let (client, server) = linked_endpoints();
        server
            .register_fn("math.double", |args| {
                let n = args.as_i64().ok_or_else(|| MethodFault::new("not a number"))?;
                Ok(json!(n * 2))
            })
            .unwrap();

        let doubled: i64 = client.execute("math.double", 21).await.unwrap();
        assert_eq!(doubled, 42);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_method_resolves_with_404() {
        let (client, _server) = linked_endpoints();
        let outcome = client.execute::<_, Value>("no.such.method", json!(null)).await;
        match outcome {
            Err(RpcError::Remote { code, message }) => {
                assert_eq!(code, CODE_METHOD_NOT_FOUND);
                assert!(message.contains("no.such.method"));
            }
            other => panic!("expected 404 remote fault, got {:?}", other),
        }
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_handler_fault_resolves_with_500() {
        let (client, server) = linked_endpoints();
        server
            .register_fn("always.fails", |_| Err(MethodFault::new("boom")))
            .unwrap();

        let outcome = client.execute::<_, Value>("always.fails", json!(null)).await;
        assert_eq!(
            outcome,
            Err(RpcError::Remote {
                code: CODE_HANDLER_FAULT,
                message: "boom".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_synchronous_error() {
        let (endpoint, _peer) = linked_endpoints();
        endpoint.register_fn("dup", |_| Ok(json!(1))).unwrap();
        let second = endpoint.register_fn("dup", |_| Ok(json!(2)));
        assert_eq!(second, Err(RpcError::DuplicateMethod("dup".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_call_times_out_and_clears_pending() {
        let (left, right) = pair_transport(64);
        let channel: Arc<dyn Channel> = Arc::new(PortChannel::attach("rpc-test", left.into()));
        let client = RpcEndpoint::new(channel);
        // Keep the peer link alive but attach no endpoint to it, so the
        // request is accepted by the transport and never answered.
        let _silent_peer = right;

        let outcome = client.execute::<_, Value>("void", json!(null)).await;
        assert_eq!(outcome, Err(RpcError::Timeout));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_failure_cleans_up_immediately() {
        let (left, right) = pair_transport(4);
        drop(right);
        let channel: Arc<dyn Channel> = Arc::new(PortChannel::attach("rpc-test", left.into()));
        let client = RpcEndpoint::new(channel);

        let outcome = client.execute::<_, Value>("void", json!(null)).await;
        assert_eq!(outcome, Err(RpcError::Dispatch));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_correlate_by_id() {
        let (client, server) = linked_endpoints();
        server
            .register_method(
                "echo.delay",
                Arc::new(|args| {
                    async move {
                        let ms = args["ms"].as_u64().unwrap_or(0);
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                        Ok(args["tag"].clone())
                    }
                    .boxed()
                }),
            )
            .unwrap();

        let slow = client.execute::<_, String>("echo.delay", json!({"ms": 50, "tag": "slow"}));
        let fast = client.execute::<_, String>("echo.delay", json!({"ms": 1, "tag": "fast"}));
        let (slow, fast) = tokio::join!(slow, fast);
        assert_eq!(slow.unwrap(), "slow");
        assert_eq!(fast.unwrap(), "fast");
    }

    #[tokio::test]
    async fn test_both_directions_share_one_channel() {
        let (alpha, beta) = linked_endpoints();
        alpha.register_fn("whoami", |_| Ok(json!("alpha"))).unwrap();
        beta.register_fn("whoami", |_| Ok(json!("beta"))).unwrap();

        let from_alpha: String = alpha.execute("whoami", json!(null)).await.unwrap();
        let from_beta: String = beta.execute("whoami", json!(null)).await.unwrap();
        assert_eq!(from_alpha, "beta");
        assert_eq!(from_beta, "alpha");
    }
}
