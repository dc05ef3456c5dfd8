//! Dispatch adapter: inbound frames in, cable updates and events out.
//!
//! [`dispatch`] is the pure step: decode one frame, fold it through
//! [`Cable::apply`], and describe what happened as a [`CableEvent`].
//! [`Dispatcher`] owns the current cable, runs that step for each frame, and
//! fans events out to registered listeners.
//!
//! # Architecture
//!
//! ```text
//!   transport frames ──► Dispatcher::receive ──► decode ──► Cable::apply
//!                               │
//!                               └──► listeners (on_event / on_data / on_error)
//!
//!   caller ops ──► Dispatcher::execute ──► Cable op ──► FrameSink::send_frame
//! ```
//!
//! A malformed frame becomes [`CableEvent::Error`]; processing continues with
//! the next frame.

// Rust guideline compliant 2026-02

use futures_util::{Stream, StreamExt};
use serde_json::Value;

use crate::cable::{Cable, Transition};
use crate::codec::{self, WireMessage};
use crate::error::CableError;
use crate::identifier::Identifier;
use crate::subscription::SubscriptionState;
use crate::transport::FrameSink;

/// What an inbound frame meant to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum CableEvent {
    /// Server welcome; the cable is connected.
    Connected,
    /// Server keepalive.
    Ping(i64),
    /// Subscription confirmed.
    Confirmed(Identifier),
    /// Subscription rejected.
    Rejected(Identifier),
    /// Data pushed to a subscription.
    Received {
        /// Subscription the data belongs to.
        identifier: Identifier,
        /// Payload exactly as sent by the server.
        message: Value,
    },
    /// Server announced it is closing the connection.
    Disconnect {
        /// Reason given by the server.
        reason: Option<String>,
        /// Whether the server allows reconnecting.
        reconnect: Option<bool>,
    },
    /// A frame could not be decoded.
    Error(CableError),
    /// The transport ended. Emitted by the connection driver, never by
    /// [`dispatch`].
    Closed,
}

impl From<WireMessage> for CableEvent {
    fn from(message: WireMessage) -> Self {
        match message {
            WireMessage::Welcome => Self::Connected,
            WireMessage::Ping(timestamp) => Self::Ping(timestamp),
            WireMessage::Confirm(id) => Self::Confirmed(id),
            WireMessage::Rejected(id) => Self::Rejected(id),
            WireMessage::Disconnect { reason, reconnect } => Self::Disconnect { reason, reconnect },
            WireMessage::ReceiveData(identifier, message) => Self::Received {
                identifier,
                message,
            },
            WireMessage::Error(reason) => Self::Error(CableError::General(reason)),
        }
    }
}

/// Decode `frame` and fold it into `cable`.
#[must_use]
pub fn dispatch(cable: &Cable, frame: &str) -> (Cable, CableEvent) {
    let message = codec::decode(frame);
    let next = cable.apply(&message);
    (next, CableEvent::from(message))
}

/// Callback invoked with every dispatched event.
pub type Listener = Box<dyn FnMut(&CableEvent) + Send>;

/// Owns a cable and routes inbound frames through it.
pub struct Dispatcher {
    cable: Cable,
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cable", &self.cable)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Dispatcher {
    /// Wrap `cable` with no listeners.
    pub fn new(cable: Cable) -> Self {
        Self {
            cable,
            listeners: Vec::new(),
        }
    }

    /// Current cable value.
    #[must_use]
    pub fn cable(&self) -> &Cable {
        &self.cable
    }

    /// Register a listener for every event.
    pub fn on_event<F>(&mut self, listener: F)
    where
        F: FnMut(&CableEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Register a handler for data pushes only.
    pub fn on_data<F>(&mut self, mut handler: F)
    where
        F: FnMut(&Identifier, &Value) + Send + 'static,
    {
        self.on_event(move |event| {
            if let CableEvent::Received {
                identifier,
                message,
            } = event
            {
                handler(identifier, message);
            }
        });
    }

    /// Register a handler for undecodable frames.
    pub fn on_error<F>(&mut self, mut handler: F)
    where
        F: FnMut(&CableError) + Send + 'static,
    {
        self.on_event(move |event| {
            if let CableEvent::Error(err) = event {
                handler(err);
            }
        });
    }

    /// Process one inbound frame: update the cable, notify listeners, and
    /// return the event.
    pub fn receive(&mut self, frame: &str) -> CableEvent {
        let (next, event) = dispatch(&self.cable, frame);
        self.cable = next;

        match &event {
            CableEvent::Connected => log::info!("[Dispatch] Welcome received, cable connected"),
            CableEvent::Confirmed(id) => log::info!("[Dispatch] Subscription confirmed: {}", id),
            CableEvent::Rejected(id) => log::warn!("[Dispatch] Subscription rejected: {}", id),
            CableEvent::Received { identifier, .. }
                if !self
                    .cable
                    .subscription(identifier)
                    .is_some_and(SubscriptionState::is_active) =>
            {
                log::trace!("[Dispatch] Data for inactive subscription: {}", identifier);
            }
            CableEvent::Disconnect { reason, reconnect } => log::warn!(
                "[Dispatch] Server requested disconnect (reason={:?}, reconnect={:?})",
                reason,
                reconnect
            ),
            CableEvent::Error(err) => log::warn!(
                "[Dispatch] {} (frame: {})",
                err,
                codec::truncate(frame, 100)
            ),
            _ => {}
        }

        for listener in &mut self.listeners {
            listener(&event);
        }
        event
    }

    /// Run a cable operation against the current cable.
    ///
    /// On success the cable advances and the outgoing frame (if any) is
    /// returned; on error the cable is left as it was.
    pub fn run<F>(&mut self, op: F) -> Result<Option<String>, CableError>
    where
        F: FnOnce(&Cable) -> Result<Transition, CableError>,
    {
        let (cable, frame) = op(&self.cable)?.into_parts();
        self.cable = cable;
        Ok(frame)
    }

    /// Run an operation and send its frame through `sink`.
    ///
    /// The cable only advances once the frame is handed to `sink`; a failed
    /// send leaves it as it was so the operation can be retried.
    pub async fn execute<S, F>(&mut self, sink: &mut S, op: F) -> Result<(), CableError>
    where
        S: FrameSink + ?Sized,
        F: FnOnce(&Cable) -> Result<Transition, CableError>,
    {
        let (cable, frame) = op(&self.cable)?.into_parts();
        if let Some(frame) = frame {
            sink.send_frame(&frame)
                .await
                .map_err(|err| CableError::General(format!("send failed: {err:#}")))?;
        }
        self.cable = cable;
        Ok(())
    }

    /// Process every frame from `frames` until the stream ends.
    ///
    /// Returns the number of frames processed, bad ones included.
    pub async fn listen<S>(&mut self, mut frames: S) -> usize
    where
        S: Stream<Item = String> + Unpin,
    {
        let mut processed = 0;
        while let Some(frame) = frames.next().await {
            self.receive(&frame);
            processed += 1;
        }
        log::debug!("[Dispatch] Frame stream ended after {} frames", processed);
        processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const WELCOME: &str = r#"{"type":"welcome"}"#;

    fn chat() -> Identifier {
        Identifier::new("ChatChannel", [("room", "general")])
    }

    #[test]
    fn test_dispatch_welcome_connects() {
        let (cable, event) = dispatch(&Cable::new("ws://x"), WELCOME);
        assert!(cable.is_connected());
        assert_eq!(event, CableEvent::Connected);
    }

    #[test]
    fn test_dispatch_bad_frame_is_error_event() {
        let cable = Cable::new("ws://x");
        let (next, event) = dispatch(&cable, "not json");
        assert_eq!(next, cable);
        assert!(matches!(event, CableEvent::Error(CableError::General(_))));
    }

    #[test]
    fn test_receive_notifies_data_and_error_handlers() {
        let data = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(0));

        let mut dispatcher = Dispatcher::new(Cable::new("ws://x"));
        let sink = Arc::clone(&data);
        dispatcher.on_data(move |id, message| {
            sink.lock().unwrap().push((id.clone(), message.clone()));
        });
        let counter = Arc::clone(&errors);
        dispatcher.on_error(move |_| *counter.lock().unwrap() += 1);

        dispatcher.receive(WELCOME);
        dispatcher.receive("garbage");
        dispatcher.receive(
            r#"{"identifier":"{\"channel\":\"ChatChannel\",\"room\":\"general\"}","message":{"text":"hi"}}"#,
        );

        assert_eq!(
            *data.lock().unwrap(),
            vec![(chat(), serde_json::json!({"text": "hi"}))]
        );
        assert_eq!(*errors.lock().unwrap(), 1);
        assert!(dispatcher.cable().is_connected());
    }

    #[test]
    fn test_run_keeps_cable_on_error() {
        let mut dispatcher = Dispatcher::new(Cable::new("ws://x"));
        let before = dispatcher.cable().clone();
        assert_eq!(
            dispatcher.run(|cable| cable.subscribe_to(&chat())),
            Err(CableError::Disconnected)
        );
        assert_eq!(dispatcher.cable(), &before);
    }

    #[tokio::test]
    async fn test_execute_sends_frame() {
        let mut dispatcher = Dispatcher::new(Cable::new("ws://x"));
        dispatcher.receive(WELCOME);

        let mut sent: Vec<String> = Vec::new();
        dispatcher
            .execute(&mut sent, |cable| cable.subscribe_to(&chat()))
            .await
            .unwrap();

        assert_eq!(sent, vec![codec::subscribe_command(&chat())]);
        assert_eq!(
            dispatcher.cable().subscription(&chat()),
            Some(SubscriptionState::Attempted)
        );
    }

    #[tokio::test]
    async fn test_execute_drop_without_frame_sends_nothing() {
        let mut dispatcher = Dispatcher::new(Cable::new("ws://x"));
        let mut sent: Vec<String> = Vec::new();
        dispatcher
            .execute(&mut sent, |cable| Ok(cable.drop_subscription(&chat())))
            .await
            .unwrap();
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn test_execute_failed_send_keeps_cable() {
        let mut dispatcher = Dispatcher::new(Cable::new("ws://x"));
        dispatcher.receive(WELCOME);

        let (mut closed, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        drop(rx);
        let result = dispatcher
            .execute(&mut closed, |cable| cable.subscribe_to(&chat()))
            .await;
        assert!(matches!(result, Err(CableError::General(msg)) if msg.starts_with("send failed")));
        assert_eq!(dispatcher.cable().subscription(&chat()), None);

        let mut sent: Vec<String> = Vec::new();
        dispatcher
            .execute(&mut sent, |cable| cable.subscribe_to(&chat()))
            .await
            .unwrap();
        assert_eq!(sent, vec![codec::subscribe_command(&chat())]);
        assert_eq!(
            dispatcher.cable().subscription(&chat()),
            Some(SubscriptionState::Attempted)
        );
    }

    #[tokio::test]
    async fn test_listen_survives_bad_frames() {
        let frames = vec![
            WELCOME.to_string(),
            "{{{".to_string(),
            r#"{"type":"ping","message":5}"#.to_string(),
        ];
        let mut dispatcher = Dispatcher::new(Cable::new("ws://x"));
        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&events);
        dispatcher.on_event(move |event| seen.lock().unwrap().push(event.clone()));

        let processed = dispatcher.listen(futures_util::stream::iter(frames)).await;

        assert_eq!(processed, 3);
        let events = events.lock().unwrap();
        assert_eq!(events[0], CableEvent::Connected);
        assert!(matches!(events[1], CableEvent::Error(_)));
        assert_eq!(events[2], CableEvent::Ping(5));
    }
}
