//! Client-side proxy objects over a bidirectional message transport.
//!
//! A remote host exposes a set of named objects, each with methods, signals
//! and properties. [`Channel`] performs the init handshake against that host,
//! builds one [`ProxyObject`] per schema entry, forwards method invocations
//! as correlated requests, fans incoming signal emissions out to subscribers
//! and mirrors pushed property updates.
//!
//! The transport is anything that can deliver whole messages in both
//! directions: implement [`Transport`] for the outbound side and feed every
//! inbound frame to [`Channel::handle_message`].

pub mod channel;
pub mod error;
pub mod pending;
pub mod properties;
pub mod proxy;
pub mod signals;
pub mod transport;
pub mod wire;

pub use channel::{Channel, ChannelState};
pub use error::ChannelError;
pub use proxy::{PropertyValue, ProxyObject};
pub use signals::Subscription;
pub use transport::{FnTransport, QueueTransport, Transport, queue_pair};
pub use wire::{Envelope, InboundPayload, MessageType, ObjectSchema, OutboundPayload};
