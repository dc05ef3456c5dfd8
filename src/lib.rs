//! Cable client - ActionCable protocol engine.
//!
//! Opens one logical connection ("cable"), subscribes to named,
//! parameterized channels, performs channel actions, and receives
//! server-pushed data. Subscription lifecycle is tracked per identifier and
//! protocol violations come back as [`CableError`] values.
//!
//! # Architecture
//!
//! The protocol core is pure and synchronous:
//!
//! - **Identifier** - channel name + ordered parameters
//! - **Codec** - outgoing command frames, inbound frame classification
//! - **Registry** - identifier → subscription state
//! - **Cable** - connection status + registry; every operation returns a new
//!   cable and at most one outgoing frame
//! - **Dispatch** - folds inbound frames through the cable and notifies
//!   listeners
//!
//! Around it sit the I/O adapters:
//!
//! - [`ws`] - WebSocket transport (tokio-tungstenite)
//! - [`client`] - background connection task driving a cable over a socket
//! - [`config`] - configuration loading
//!
//! # Example
//!
//! ```
//! use cable_client::{codec::WireMessage, Cable, Identifier};
//!
//! let room = Identifier::new("ChatChannel", [("room", "general")]);
//! let cable = Cable::new("ws://localhost:3000/cable").apply(&WireMessage::Welcome);
//!
//! let step = cable.subscribe_to(&room).unwrap();
//! assert!(step.frame.unwrap().contains("\"command\":\"subscribe\""));
//! assert!(step.cable.subscribe_to(&room).is_err());
//! ```

pub mod cable;
pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod identifier;
pub mod subscription;
pub mod transport;
pub mod ws;

pub use cable::{Cable, CableStatus, Transition};
pub use client::CableClient;
pub use codec::{decode, Command, WireMessage};
pub use config::CableConfig;
pub use dispatch::{dispatch, CableEvent, Dispatcher};
pub use error::CableError;
pub use identifier::Identifier;
pub use subscription::{Registry, SubscriptionState};
pub use transport::FrameSink;
