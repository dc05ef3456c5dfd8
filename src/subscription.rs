//! Per-identifier subscription lifecycle.
//!
//! ```text
//! (none) ─subscribe─► Attempted ─confirm─► Subscribed ─unsubscribe─► Unsubscribed
//!                         │
//!                         └─reject─► Rejected
//! Rejected | Unsubscribed ─subscribe─► Attempted
//! any ─drop─► (none)
//! ```

use std::collections::HashMap;

use crate::identifier::Identifier;

/// Negotiation state of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    /// Subscribe sent, no answer yet.
    Attempted,
    /// Server confirmed the subscription.
    Subscribed,
    /// Server refused the subscription.
    Rejected,
    /// Client unsubscribed; entry kept until dropped.
    Unsubscribed,
}

impl SubscriptionState {
    /// `Attempted` and `Subscribed` count as active.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Attempted | Self::Subscribed)
    }
}

/// Mapping from identifier to subscription state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    entries: HashMap<Identifier, SubscriptionState>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// State recorded for `id`.
    #[must_use]
    pub fn get(&self, id: &Identifier) -> Option<SubscriptionState> {
        self.entries.get(id).copied()
    }

    /// Insert or overwrite the entry for `id`.
    pub fn put(&mut self, id: Identifier, state: SubscriptionState) {
        self.entries.insert(id, state);
    }

    /// Remove the entry for `id`, returning its last state.
    pub fn remove(&mut self, id: &Identifier) -> Option<SubscriptionState> {
        self.entries.remove(id)
    }

    /// Update the state of an existing entry.
    ///
    /// Unknown identifiers are left absent; returns whether an entry changed.
    pub fn set_status(&mut self, id: &Identifier, state: SubscriptionState) -> bool {
        match self.entries.get_mut(id) {
            Some(current) => {
                *current = state;
                true
            }
            None => false,
        }
    }

    /// Whether `id` is `Attempted` or `Subscribed`.
    #[must_use]
    pub fn is_active(&self, id: &Identifier) -> bool {
        self.get(id).is_some_and(SubscriptionState::is_active)
    }

    /// Iterate entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, SubscriptionState)> {
        self.entries.iter().map(|(id, state)| (id, *state))
    }
}
