//! Liaison Protocols - Envelopes, Transports and the Directory
//!
//! This crate provides the messaging substrate the Liaison agent mesh runs on:
//! typed envelopes, point-to-point transports with request/reply deadlines,
//! and the directory service that maps roles to live endpoints.
//!
//! # Overview
//!
//! ## Envelopes
//!
//! An [`Envelope`] carries a [`Performative`], a sender, receivers and a short
//! string body. Liveness probes are `REQUEST "ping"` answered by
//! `INFORM "pong"`; replies reference their request via `in_reply_to`.
//!
//! ## Transports
//!
//! The [`Transport`] trait has two implementations:
//!
//! - [`LocalBus`] / [`LocalTransport`]: in-process, for tests and single-binary setups
//! - [`TcpTransport`]: one JSON envelope per line over short-lived TCP connections
//!
//! Replies to an outstanding [`Transport::request`] are routed straight to the
//! requester and never reach the agent's [`Mailbox`].
//!
//! ## Directory
//!
//! [`DirectoryClient`] looks up endpoints by role over any [`Directory`]:
//! [`MemoryDirectory`] in-process or [`RemoteDirectory`] against a
//! [`DirectoryServer`].
//!
//! # Example
//!
//! ```rust,ignore
//! use liaison_protocols::{DirectoryClient, EndpointRef, Envelope, LocalBus, MemoryDirectory, Transport};
//!
//! let bus = LocalBus::new();
//! let directory = MemoryDirectory::new();
//! let me = EndpointRef::new("user@mesh", "local");
//! let (transport, _mailbox) = bus.attach(me.clone());
//!
//! let client = DirectoryClient::new(directory);
//! for parser in client.lookup("parser").await? {
//!     transport.send(Envelope::inform(me.clone(), parser, "likes(mary, wine).")).await?;
//! }
//! ```

pub mod bus;
pub mod directory;
pub mod envelope;
pub mod error;
pub mod remote;
pub mod tcp;
pub mod transport;

pub use bus::{LocalBus, LocalTransport};
pub use directory::{Directory, DirectoryClient, MemoryDirectory, ServiceRecord};
pub use envelope::{now_millis, EndpointRef, Envelope, Performative, Selector, PING, PONG};
pub use error::{Error, Result};
pub use remote::{
    DirectoryRequest, DirectoryResponse, DirectoryServer, RemoteDirectory, REQUEST_TIMEOUT,
};
pub use tcp::TcpTransport;
pub use transport::{Mailbox, MailboxSender, ReplyRouter, Transport};
