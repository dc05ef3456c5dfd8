//! Async connection driver.
//!
//! [`CableClient`] owns one WebSocket and one [`Cable`] inside a background
//! task. Handle methods queue cable operations to that task and wait for
//! the result; inbound frames go through a [`Dispatcher`] and come out as
//! [`CableEvent`]s on the receiver returned by [`CableClient::connect`].
//!
//! # Architecture
//!
//! ```text
//!   CableClient                     background task
//!       │ subscribe(id)                   │
//!       │ ──── Request::Run ────────────► │ Dispatcher::execute → WsWriter
//!       │ ◄─── oneshot Result ──────────  │
//!       │                                 │
//!   events.recv() ◄──── CableEvent ────── │ WsReader → Dispatcher::receive
//! ```
//!
//! Events are queued inside the task when the receiver falls behind, so
//! handle methods keep working even while events go unread.
//!
//! There is no reconnection: the task ends when the socket closes, errors,
//! the server sends `disconnect`, or [`CableClient::shutdown`] is called.
//! A final [`CableEvent::Closed`] marks the end.

// Rust guideline compliant 2026-02

use std::collections::VecDeque;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::cable::{Cable, Transition};
use crate::config::CableConfig;
use crate::dispatch::{CableEvent, Dispatcher};
use crate::error::CableError;
use crate::identifier::Identifier;
use crate::ws::{self, WsMessage, WsReader, WsWriter};

/// Cable operation queued for the background task.
#[derive(Debug)]
enum Operation {
    Subscribe(Identifier),
    Unsubscribe(Identifier),
    Perform {
        action: String,
        data: Vec<(String, Value)>,
        identifier: Identifier,
    },
    Drop(Identifier),
}

impl Operation {
    fn apply(&self, cable: &Cable) -> Result<Transition, CableError> {
        match self {
            Self::Subscribe(id) => cable.subscribe_to(id),
            Self::Unsubscribe(id) => cable.unsubscribe_from(id),
            Self::Perform {
                action,
                data,
                identifier,
            } => cable.perform(action, data, identifier),
            Self::Drop(id) => Ok(cable.drop_subscription(id)),
        }
    }
}

#[derive(Debug)]
enum Request {
    Run {
        op: Operation,
        reply: oneshot::Sender<Result<(), CableError>>,
    },
    Shutdown,
}

/// Handle to a live cable connection.
#[derive(Debug)]
pub struct CableClient {
    url: String,
    request_tx: mpsc::UnboundedSender<Request>,
}

impl CableClient {
    /// Dial the configured endpoint and spawn the connection task.
    ///
    /// Must be called within a tokio runtime. Operations fail with
    /// [`CableError::Disconnected`] until [`CableEvent::Connected`] has been
    /// received.
    ///
    /// # Errors
    ///
    /// Returns an error if the WebSocket handshake fails.
    pub async fn connect(config: &CableConfig) -> Result<(Self, mpsc::Receiver<CableEvent>)> {
        let url = config.cable_url();
        log::info!("[Client] Connecting to {}", url);
        let (writer, reader) = ws::connect(&url, &config.headers).await?;
        log::info!("[Client] WebSocket connected");

        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer.max(1));
        let (request_tx, request_rx) = mpsc::unbounded_channel();

        let dispatcher = Dispatcher::new(Cable::new(url.clone()));
        tokio::spawn(run_connection(dispatcher, writer, reader, request_rx, event_tx));

        Ok((Self { url, request_tx }, event_rx))
    }

    /// Endpoint this client is connected to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subscribe to `id`.
    pub async fn subscribe(&self, id: Identifier) -> Result<(), CableError> {
        self.run(Operation::Subscribe(id)).await
    }

    /// Unsubscribe from `id`.
    pub async fn unsubscribe(&self, id: Identifier) -> Result<(), CableError> {
        self.run(Operation::Unsubscribe(id)).await
    }

    /// Perform `action` with `data` on `id`.
    pub async fn perform(
        &self,
        action: impl Into<String>,
        data: Vec<(String, Value)>,
        id: Identifier,
    ) -> Result<(), CableError> {
        self.run(Operation::Perform {
            action: action.into(),
            data,
            identifier: id,
        })
        .await
    }

    /// Forget `id`, unsubscribing first if it is active.
    pub async fn drop_subscription(&self, id: Identifier) -> Result<(), CableError> {
        self.run(Operation::Drop(id)).await
    }

    /// Close the socket and stop the background task.
    pub fn shutdown(&self) {
        let _ = self.request_tx.send(Request::Shutdown);
    }

    async fn run(&self, op: Operation) -> Result<(), CableError> {
        let (reply, response) = oneshot::channel();
        self.request_tx
            .send(Request::Run { op, reply })
            .map_err(|err| CableError::General(format!("connection task stopped: {err}")))?;
        response
            .await
            .map_err(|err| CableError::General(format!("connection task stopped: {err}")))?
    }
}

impl Drop for CableClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Background task: route frames and requests until the connection ends.
async fn run_connection(
    mut dispatcher: Dispatcher,
    mut writer: WsWriter,
    mut reader: WsReader,
    mut request_rx: mpsc::UnboundedReceiver<Request>,
    event_tx: mpsc::Sender<CableEvent>,
) {
    let mut pending: VecDeque<CableEvent> = VecDeque::new();

    loop {
        tokio::select! {
            permit = event_tx.reserve(), if !pending.is_empty() => {
                match permit {
                    Ok(permit) => {
                        if let Some(event) = pending.pop_front() {
                            permit.send(event);
                        }
                    }
                    Err(_) => {
                        log::debug!("[Client] Event receiver dropped, discarding {} events", pending.len());
                        pending.clear();
                    }
                }
            }

            msg = reader.recv() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let event = dispatcher.receive(&text);
                        let server_closing = matches!(event, CableEvent::Disconnect { .. });
                        if !event_tx.is_closed() {
                            pending.push_back(event);
                        }
                        if server_closing {
                            let _ = writer.close().await;
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = writer.send_pong(data).await;
                    }
                    Some(Ok(WsMessage::Close { code, reason })) => {
                        log::info!("[Client] Connection closed by server (code={}, reason={:?})", code, reason);
                        break;
                    }
                    Some(Ok(WsMessage::Binary(_) | WsMessage::Pong(_))) => {}
                    Some(Err(e)) => {
                        log::warn!("[Client] WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        log::info!("[Client] WebSocket stream ended");
                        break;
                    }
                }
            }

            Some(request) = request_rx.recv() => {
                match request {
                    Request::Run { op, reply } => {
                        let result = dispatcher.execute(&mut writer, |cable| op.apply(cable)).await;
                        if let Err(err) = &result {
                            log::debug!("[Client] {:?} failed: {}", op, err);
                        }
                        let _ = reply.send(result);
                    }
                    Request::Shutdown => {
                        log::info!("[Client] Shutdown requested, closing connection");
                        let _ = writer.close().await;
                        break;
                    }
                }
            }
        }
    }

    // Fail queued and future requests before blocking on the final flush.
    drop(request_rx);
    pending.push_back(CableEvent::Closed);
    for event in pending {
        if event_tx.send(event).await.is_err() {
            break;
        }
    }
}
