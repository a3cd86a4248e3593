//! `rdt-over-udp`: reliable-data-transfer protocols over a deliberately
//! unreliable UDP channel.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐  send(payload)   ┌──────────────────────────────┐
//!  │  Application │─────────────────▶│ Endpoint                     │
//!  │  (Receiver)  │◀─────────────────│  Box<dyn Protocol> + worker  │
//!  └──────────────┘  deliver(bytes)  └──────┬───────────────────────┘
//!                                           │ frames (FrameCodec)
//!                                    ┌──────▼──────────────┐
//!                                    │ UnreliableChannel   │ loss / delay /
//!                                    │ (or bare Socket)    │ bit flips
//!                                    └──────┬──────────────┘
//!                                           │ UDP datagrams
//!                                    ┌──────▼──────┐
//!                                    │   Socket    │
//!                                    └─────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`frame`]: wire format and CRC-8 checksum
//! - [`protocol`]: the engine contract and [`ProtocolKind`]
//! - [`rdt10`] … [`rdt30`]: the stop-and-wait family
//! - [`go_back_n`]: pipelined engine with cumulative ACKs
//! - [`gbn_sender`]: GBN outbound window state machine
//! - [`gbn_receiver`]: GBN inbound cumulative-ACK state machine
//! - [`selective_repeat`]: pipelined engine with selective ACKs
//! - [`sr_sender`]: SR outbound per-frame slots
//! - [`sr_receiver`]: SR inbound reordering buffer
//! - [`state`]: stop-and-wait phase and sequence counters
//! - [`sender`]: stop-and-wait outbound frame slot
//! - [`timer`]: retransmission timer
//! - [`simulator`]: fault-injecting channel
//! - [`socket`]: async UDP socket and transport
//! - [`receiver`]: delivery callbacks
//! - [`endpoint`]: engine + transport + receive loop
//! - [`session`]: replaceable endpoint handle
//! - [`config`]: endpoint configuration

pub mod config;
pub mod endpoint;
pub mod frame;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod go_back_n;
pub mod protocol;
pub mod rdt10;
pub mod rdt20;
pub mod rdt21;
pub mod rdt22;
pub mod rdt30;
pub mod receiver;
pub mod selective_repeat;
pub mod sender;
pub mod session;
pub mod simulator;
pub mod socket;
pub mod sr_receiver;
pub mod sr_sender;
pub mod state;
pub mod timer;

pub use config::{ConfigError, EndpointConfig};
pub use endpoint::{Endpoint, EndpointError};
pub use protocol::{Actions, Protocol, ProtocolKind, StateError};
pub use receiver::Receiver;
pub use session::{Session, SessionError};
pub use simulator::{ChannelConfig, FaultModel, UnreliableChannel, Verdict};
pub use socket::{Socket, Transport};
