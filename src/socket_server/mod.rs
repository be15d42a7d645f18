//! Websocket surface of the engine
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Hub (TcpListener accept loop)                                │
//! │    └─► ConnectionState per client                             │
//! │          - inbound commands ──► per-component queue (FIFO)    │
//! │          - outbox            ◄── ack / error (unicast)        │
//! │          - broadcast rx      ◄── components / file_changed    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! See [`protocol`] for the message shapes.

pub mod connection;
pub mod hub;
pub mod protocol;

pub use connection::handle_connection;
pub use hub::Hub;
pub use protocol::{AckPayload, ClientMessage, ServerMessage};
