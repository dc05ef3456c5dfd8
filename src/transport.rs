//! Transport seam.
//!
//! The protocol core never touches a socket. Outgoing frames go through a
//! [`FrameSink`]; inbound frames arrive as `String`s from whatever stream
//! the host owns (see [`crate::dispatch::Dispatcher::listen`]).
//!
//! The sink is bound to one connection, so the cable's URL is implied by
//! whichever sink the caller pairs with that cable.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Write side of a text-frame transport.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one complete text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying connection is gone.
    async fn send_frame(&mut self, frame: &str) -> Result<()>;
}

/// In-process sink: frames land on a channel for a host event loop (or a
/// test) to forward.
#[async_trait]
impl FrameSink for mpsc::UnboundedSender<String> {
    async fn send_frame(&mut self, frame: &str) -> Result<()> {
        self.send(frame.to_string())
            .map_err(|err| anyhow!("frame receiver dropped: {err}"))
    }
}

/// Records every frame; handy for tests and dry runs.
#[async_trait]
impl FrameSink for Vec<String> {
    async fn send_frame(&mut self, frame: &str) -> Result<()> {
        self.push(frame.to_string());
        Ok(())
    }
}
