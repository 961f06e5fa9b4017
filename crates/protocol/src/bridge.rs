// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The full-duplex JSON-RPC 2.0 bridge: two cooperating tasks (reader,
//! writer) hidden behind `send_request` / `send_notification` / `start` /
//! `close`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::dispatch::{DispatchError, Dispatcher};
use crate::envelope::{Envelope, InboundMessage, JsonRpcError};
use crate::error::ProtocolError;

const OUTBOUND_QUEUE_CAPACITY: usize = 256;

type Waiter = oneshot::Sender<Result<Value, JsonRpcError>>;

struct Waiters {
    pending: Mutex<HashMap<u64, Waiter>>,
}

impl Waiters {
    fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn register(&self, id: u64, tx: Waiter) {
        self.pending.lock().insert(id, tx);
    }

    /// Delivers at most once: if no waiter is registered for `id`, the
    /// response is silently dropped.
    fn deliver(&self, id: u64, result: Result<Value, JsonRpcError>) {
        if let Some(tx) = self.pending.lock().remove(&id) {
            let _ = tx.send(result);
        }
    }

    fn deregister(&self, id: u64) {
        self.pending.lock().remove(&id);
    }

    /// Fails every still-registered waiter with a cancellation error.
    fn cancel_all(&self) {
        let mut pending = self.pending.lock();
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(JsonRpcError::internal("bridge closed")));
        }
    }
}

/// Bidirectional JSON-RPC 2.0 connection over a newline-framed stdio-style
/// stream. Construct with [`Bridge::new`], spawn its pump with
/// [`Bridge::start`], then call `send_request`/`send_notification`. `close`
/// tears the whole thing down.
pub struct Bridge {
    next_id: AtomicU64,
    waiters: Arc<Waiters>,
    outbound_tx: mpsc::Sender<String>,
    outbound_rx: Mutex<Option<mpsc::Receiver<String>>>,
    cancel: CancellationToken,
    default_timeout: Duration,
}

impl Bridge {
    pub fn new(default_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        Self {
            next_id: AtomicU64::new(1),
            waiters: Arc::new(Waiters::new()),
            outbound_tx: tx,
            outbound_rx: Mutex::new(Some(rx)),
            cancel: CancellationToken::new(),
            default_timeout,
        }
    }

    /// Begins the reader and writer pumps. `reader`/`writer` are the
    /// subprocess's stdout/stdin. Runs until `close()` is called or the
    /// stream ends. Returns `Err(ProtocolError::AlreadyStarted)` instead of
    /// spawning a second pair of pumps if called more than once.
    pub fn start<R, W>(
        &self,
        reader: R,
        writer: W,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<(), ProtocolError>
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let outbound_rx = self
            .outbound_rx
            .lock()
            .take()
            .ok_or(ProtocolError::AlreadyStarted)?;

        tokio::spawn(Self::writer_loop(writer, outbound_rx, self.cancel.clone()));
        tokio::spawn(Self::reader_loop(
            reader,
            self.waiters.clone(),
            dispatcher,
            self.outbound_tx.clone(),
            self.cancel.clone(),
        ));
        Ok(())
    }

    /// Allocates a monotonically increasing id, enqueues the request, and
    /// waits for its correlated response. Effective timeout is
    /// `min(per_call, default)`; `per_call = None` uses the default; a
    /// default of zero disables the timeout entirely.
    #[instrument(skip(self, params), fields(%method))]
    pub async fn send_request(
        &self,
        method: &str,
        params: Value,
        per_call: Option<Duration>,
    ) -> Result<Value, ProtocolError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.waiters.register(id, tx);

        let envelope = Envelope::request(id, method, params);
        if self.enqueue(envelope).await.is_err() {
            self.waiters.deregister(id);
            return Err(ProtocolError::ConnectionClosed);
        }

        let effective = match (per_call, self.default_timeout.is_zero()) {
            (Some(d), _) if !self.default_timeout.is_zero() => d.min(self.default_timeout),
            (Some(d), true) => d,
            (None, true) => Duration::MAX,
            (None, false) => self.default_timeout,
        };

        let outcome = if effective == Duration::MAX {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.waiters.deregister(id);
                    return Err(ProtocolError::Cancelled);
                }
                r = rx => r,
            }
        } else {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.waiters.deregister(id);
                    return Err(ProtocolError::Cancelled);
                }
                r = tokio::time::timeout(effective, rx) => {
                    match r {
                        Ok(inner) => inner,
                        Err(_) => {
                            self.waiters.deregister(id);
                            return Err(ProtocolError::Timeout(effective));
                        }
                    }
                }
            }
        };

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ProtocolError::Remote(err)),
            Err(_) => Err(ProtocolError::Cancelled),
        }
    }

    /// Fire-and-forget: no id, no waiter.
    pub async fn send_notification(&self, method: &str, params: Value) -> Result<(), ProtocolError> {
        let envelope = Envelope::notification(method, params);
        self.enqueue(envelope)
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Cancels the shared context, causing the reader/writer pumps to exit,
    /// and fails every outstanding waiter.
    pub fn close(&self) {
        self.cancel.cancel();
        self.waiters.cancel_all();
    }

    async fn enqueue(&self, envelope: Envelope) -> Result<(), ()> {
        let line = serde_json::to_string(&envelope).map_err(|_| ())?;
        self.outbound_tx.send(line).await.map_err(|_| ())
    }

    async fn reader_loop<R>(
        reader: R,
        waiters: Arc<Waiters>,
        dispatcher: Arc<dyn Dispatcher>,
        outbound_tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        let mut lines = BufReader::new(reader).lines();
        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            let line = match line {
                Ok(Some(line)) if !line.trim().is_empty() => line,
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "agent protocol bridge: read error");
                    break;
                }
            };

            let envelope: Envelope = match serde_json::from_str(&line) {
                Ok(env) => env,
                Err(err) => {
                    warn!(error = %err, "agent protocol bridge: malformed line, skipping");
                    continue;
                }
            };

            match envelope.classify() {
                Some(InboundMessage::Response { id, result }) => {
                    waiters.deliver(id, result);
                }
                Some(InboundMessage::Notification { method, params }) => {
                    dispatcher.handle_notification(&method, params).await;
                }
                Some(InboundMessage::Request { id, method, params }) => {
                    let response = match dispatcher.handle_request(&method, params).await {
                        Ok(value) => Envelope::response_ok(id, value),
                        Err(DispatchError::UnknownMethod(method)) => {
                            Envelope::response_err(id, JsonRpcError::method_not_found(&method))
                        }
                        Err(DispatchError::Failed(message)) => {
                            Envelope::response_err(id, JsonRpcError::internal(message))
                        }
                    };
                    if let Ok(line) = serde_json::to_string(&response) {
                        if outbound_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                }
                None => warn!(%line, "agent protocol bridge: unrecognized envelope shape"),
            }
        }

        waiters.cancel_all();
    }

    async fn writer_loop<W>(
        writer: W,
        mut outbound_rx: mpsc::Receiver<String>,
        cancel: CancellationToken,
    ) where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut writer = writer;
        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                line = outbound_rx.recv() => line,
            };
            let Some(line) = line else { break };
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if writer.write_all(b"\n").await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
