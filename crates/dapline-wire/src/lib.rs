//! dapline-wire: Debug Adapter Protocol framing and session sequencing.
//!
//! This crate carries DAP messages over any byte stream. It handles the
//! `Content-Length` wire framing, seq allocation, request/response
//! correlation, event fan-out, and adapter-role command dispatch. It never
//! interprets command or event payloads beyond the typed helpers in
//! [`protocol`].

pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod sequencer;
pub mod transport;

// Re-export key types for convenience.
pub use client::DapClient;
pub use codec::{encode, Frame, FrameDecoder, FrameReader};
pub use connection::{ConnectionOptions, DapConnection, PendingReply};
pub use error::DapError;
pub use protocol::*;
pub use sequencer::{RequestOutcome, Sequencer};
pub use transport::{accept_tcp, connect_tcp, spawn_adapter, stdio};
