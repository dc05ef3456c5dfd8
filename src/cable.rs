//! Cable state machine.
//!
//! A [`Cable`] is a value: connection status plus the subscription registry.
//! Operations never mutate it; each one returns a [`Transition`] holding the
//! next cable and at most one frame for the transport to send.
//!
//! ```text
//! Cable::new(url)                       Disconnected, no subscriptions
//!   .apply(&Welcome)                    Connected
//!   .subscribe_to(&id)?                 id → Attempted, frame: subscribe
//!   .apply(&Confirm(id))                id → Subscribed
//!   .perform("speak", &data, &id)?      frame: message
//!   .unsubscribe_from(&id)?             id → Unsubscribed, frame: unsubscribe
//!   .drop_subscription(&id)             id removed
//! ```

// Rust guideline compliant 2026-02

use serde_json::Value;

use crate::codec::{self, WireMessage};
use crate::error::CableError;
use crate::identifier::Identifier;
use crate::subscription::{Registry, SubscriptionState};

/// Connection status. Only ever moves from `Disconnected` to `Connected`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CableStatus {
    /// Waiting for the server's welcome.
    #[default]
    Disconnected,
    /// Welcome received.
    Connected,
}

/// One logical multiplexed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cable {
    url: String,
    status: CableStatus,
    registry: Registry,
}

/// Result of a cable operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Cable after the operation.
    pub cable: Cable,
    /// Frame to hand to the transport, if any.
    pub frame: Option<String>,
}

impl Transition {
    fn new(cable: Cable, frame: Option<String>) -> Self {
        Self { cable, frame }
    }

    /// Split into `(cable, frame)`.
    #[must_use]
    pub fn into_parts(self) -> (Cable, Option<String>) {
        (self.cable, self.frame)
    }
}

impl Cable {
    /// Fresh cable: disconnected with no subscriptions.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: CableStatus::Disconnected,
            registry: Registry::new(),
        }
    }

    /// Transport endpoint this cable talks to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> CableStatus {
        self.status
    }

    /// Whether the server has welcomed this cable.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == CableStatus::Connected
    }

    /// State of the subscription for `id`.
    #[must_use]
    pub fn subscription(&self, id: &Identifier) -> Option<SubscriptionState> {
        self.registry.get(id)
    }

    /// All registry entries, in unspecified order.
    pub fn subscriptions(&self) -> impl Iterator<Item = (&Identifier, SubscriptionState)> {
        self.registry.iter()
    }

    /// Identifiers whose subscription is `Attempted` or `Subscribed`.
    pub fn active_identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.registry
            .iter()
            .filter(|(_, state)| state.is_active())
            .map(|(id, _)| id)
    }

    /// Start subscribing to `id`.
    ///
    /// Allowed when there is no entry or the previous attempt ended in
    /// `Rejected` or `Unsubscribed`; that entry is replaced.
    pub fn subscribe_to(&self, id: &Identifier) -> Result<Transition, CableError> {
        self.ensure_connected()?;

        match self.registry.get(id) {
            Some(SubscriptionState::Attempted) => {
                Err(CableError::AlreadyTryingToSubscribe(id.clone()))
            }
            Some(SubscriptionState::Subscribed) => Err(CableError::AlreadySubscribed(id.clone())),
            Some(SubscriptionState::Rejected | SubscriptionState::Unsubscribed) | None => {
                let mut next = self.clone();
                next.registry.put(id.clone(), SubscriptionState::Attempted);
                log::debug!("[Cable] Subscribing to {}", id);
                Ok(Transition::new(next, Some(codec::subscribe_command(id))))
            }
        }
    }

    /// Unsubscribe from an active subscription. The entry stays as
    /// `Unsubscribed` until dropped.
    pub fn unsubscribe_from(&self, id: &Identifier) -> Result<Transition, CableError> {
        self.ensure_connected()?;
        self.ensure_active(id)?;

        let mut next = self.clone();
        next.registry.set_status(id, SubscriptionState::Unsubscribed);
        log::debug!("[Cable] Unsubscribing from {}", id);
        Ok(Transition::new(next, Some(codec::unsubscribe_command(id))))
    }

    /// Invoke `action` on an active subscription.
    ///
    /// An `Attempted` subscription qualifies, so a perform can go out before
    /// the server confirms. The cable itself is unchanged.
    pub fn perform(
        &self,
        action: &str,
        data: &[(String, Value)],
        id: &Identifier,
    ) -> Result<Transition, CableError> {
        self.ensure_connected()?;
        self.ensure_active(id)?;

        log::trace!("[Cable] Perform '{}' on {}", action, id);
        Ok(Transition::new(
            self.clone(),
            Some(codec::perform_command(action, data, id)),
        ))
    }

    /// Forget `id` whatever its state. Emits an unsubscribe frame only when
    /// the removed subscription was active. Works while disconnected.
    #[must_use]
    pub fn drop_subscription(&self, id: &Identifier) -> Transition {
        let mut next = self.clone();
        match next.registry.remove(id) {
            Some(state) if state.is_active() => {
                log::debug!("[Cable] Dropped active subscription {}", id);
                Transition::new(next, Some(codec::unsubscribe_command(id)))
            }
            _ => Transition::new(next, None),
        }
    }

    /// Fold one inbound message into the cable. Never fails.
    #[must_use]
    pub fn apply(&self, message: &WireMessage) -> Self {
        let mut next = self.clone();
        match message {
            WireMessage::Welcome => next.status = CableStatus::Connected,
            WireMessage::Confirm(id) => {
                next.registry.set_status(id, SubscriptionState::Subscribed);
            }
            WireMessage::Rejected(id) => {
                next.registry.set_status(id, SubscriptionState::Rejected);
            }
            WireMessage::Ping(_)
            | WireMessage::Disconnect { .. }
            | WireMessage::ReceiveData(..)
            | WireMessage::Error(_) => {}
        }
        next
    }

    fn ensure_connected(&self) -> Result<(), CableError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(CableError::Disconnected)
        }
    }

    fn ensure_active(&self, id: &Identifier) -> Result<(), CableError> {
        if self.registry.is_active(id) {
            Ok(())
        } else {
            Err(CableError::ChannelNotSubscribed(id.clone()))
        }
    }
}
