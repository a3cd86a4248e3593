//! The contract shared by every protocol engine.
//!
//! Engines are sans-I/O state machines: they turn caller payloads and inbound
//! datagrams into [`Actions`] (datagrams to transmit, payloads to deliver)
//! and never touch a socket themselves.  [`crate::endpoint::Endpoint`] owns
//! the socket, the worker task and the delivery callbacks and drives an
//! engine through this trait.
//!
//! | Kind | Engine | Window | Timer |
//! |------|--------|--------|-------|
//! | `1.0` | [`Rdt10`] | - | - |
//! | `2.0` | [`Rdt20`] | 1 | - |
//! | `2.1` | [`Rdt21`] | 1 | - |
//! | `2.2` | [`Rdt22`] | 1 | - |
//! | `3.0` | [`Rdt30`] | 1 | per engine |
//! | `gobackn` | [`GoBackN`] | W − 1 | per frame |
//! | `selectiverepeat` | [`SelectiveRepeat`] | W − 1 | per frame |

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::go_back_n::GoBackN;
use crate::rdt10::Rdt10;
use crate::rdt20::Rdt20;
use crate::rdt21::Rdt21;
use crate::rdt22::Rdt22;
use crate::rdt30::Rdt30;
use crate::selective_repeat::SelectiveRepeat;

// ---------------------------------------------------------------------------
// Protocol trait
// ---------------------------------------------------------------------------

/// Side effects requested by an engine after handling one event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Actions {
    /// Encoded datagrams to send to the peer, in order.
    pub transmit: Vec<Vec<u8>>,
    /// Application payloads to hand to the delivery callbacks, in order.
    pub deliver: Vec<Vec<u8>>,
}

impl Actions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn transmit(datagram: Vec<u8>) -> Self {
        Self {
            transmit: vec![datagram],
            deliver: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transmit.is_empty() && self.deliver.is_empty()
    }
}

/// One reliable-data-transfer engine.
///
/// Implementations hold all per-engine state (phase, sequence counters,
/// windows, timers).  Every method runs under the endpoint's lock, so they
/// must not block.
pub trait Protocol: Send {
    fn kind(&self) -> ProtocolKind;

    /// Accept an application payload and return the datagram to transmit.
    ///
    /// Fails fast with a [`StateError`] instead of queueing.
    fn send(&mut self, payload: &[u8], now: Instant) -> Result<Vec<u8>, StateError>;

    /// Handle one inbound datagram.
    fn on_datagram(&mut self, datagram: &[u8], now: Instant) -> Actions;

    /// Retransmission sweep, run after every iteration of the receive loop.
    /// Returns the datagrams to resend.
    fn on_tick(&mut self, now: Instant) -> Vec<Vec<u8>>;
}

/// Errors surfaced synchronously by [`Protocol::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// A stop-and-wait exchange is still outstanding.
    #[error("cannot send while waiting for an acknowledgement")]
    AwaitingAck,
    /// Every slot of the sliding window is in flight.
    #[error("send window is full ({outstanding} frames outstanding)")]
    WindowFull { outstanding: usize },
}

// ---------------------------------------------------------------------------
// ProtocolKind
// ---------------------------------------------------------------------------

/// Selector for the seven engine variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    Rdt10,
    Rdt20,
    Rdt21,
    Rdt22,
    Rdt30,
    GoBackN,
    SelectiveRepeat,
}

impl ProtocolKind {
    pub const ALL: [Self; 7] = [
        Self::Rdt10,
        Self::Rdt20,
        Self::Rdt21,
        Self::Rdt22,
        Self::Rdt30,
        Self::GoBackN,
        Self::SelectiveRepeat,
    ];

    /// Canonical name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Rdt10 => "1.0",
            Self::Rdt20 => "2.0",
            Self::Rdt21 => "2.1",
            Self::Rdt22 => "2.2",
            Self::Rdt30 => "3.0",
            Self::GoBackN => "gobackn",
            Self::SelectiveRepeat => "selectiverepeat",
        }
    }

    /// `true` for the sliding-window variants.
    pub fn is_pipelined(self) -> bool {
        matches!(self, Self::GoBackN | Self::SelectiveRepeat)
    }

    /// How long one receive waits before the loop ticks.
    pub fn default_poll_interval(self) -> Duration {
        match self {
            Self::Rdt10 | Self::Rdt20 | Self::Rdt21 | Self::Rdt22 => Duration::from_millis(1000),
            Self::Rdt30 | Self::GoBackN | Self::SelectiveRepeat => Duration::from_millis(100),
        }
    }

    /// Retransmission timeout for the variants that have a timer.
    pub fn default_retransmit_timeout(self) -> Duration {
        if self.is_pipelined() {
            Duration::from_millis(10_000)
        } else {
            Duration::from_millis(3_000)
        }
    }

    /// Construct a fresh engine of this kind.
    ///
    /// `window_size` is only used by the pipelined variants and
    /// `retransmit_timeout` only by 3.0 and the pipelined variants; the
    /// caller is expected to have validated both (see
    /// [`crate::config::EndpointConfig::validate`]).
    pub fn build(
        self,
        window_size: usize,
        retransmit_timeout: Duration,
        now: Instant,
    ) -> Box<dyn Protocol> {
        match self {
            Self::Rdt10 => Box::new(Rdt10::new()),
            Self::Rdt20 => Box::new(Rdt20::new()),
            Self::Rdt21 => Box::new(Rdt21::new()),
            Self::Rdt22 => Box::new(Rdt22::new()),
            Self::Rdt30 => Box::new(Rdt30::new(retransmit_timeout, now)),
            Self::GoBackN => Box::new(GoBackN::new(window_size, retransmit_timeout)),
            Self::SelectiveRepeat => {
                Box::new(SelectiveRepeat::new(window_size, retransmit_timeout))
            }
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown protocol name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown protocol `{0}` (expected 1.0, 2.0, 2.1, 2.2, 3.0, gobackn or selectiverepeat)")]
pub struct ParseProtocolError(pub String);

impl FromStr for ProtocolKind {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1.0" => Ok(Self::Rdt10),
            "2.0" => Ok(Self::Rdt20),
            "2.1" => Ok(Self::Rdt21),
            "2.2" => Ok(Self::Rdt22),
            "3.0" => Ok(Self::Rdt30),
            "gobackn" | "gbn" => Ok(Self::GoBackN),
            "selectiverepeat" | "sr" => Ok(Self::SelectiveRepeat),
            _ => Err(ParseProtocolError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip_through_from_str() {
        for kind in ProtocolKind::ALL {
            assert_eq!(kind.name().parse::<ProtocolKind>(), Ok(kind));
        }
    }

    #[test]
    fn parsing_is_case_insensitive_and_accepts_aliases() {
        assert_eq!("GoBackN".parse(), Ok(ProtocolKind::GoBackN));
        assert_eq!(" sr ".parse(), Ok(ProtocolKind::SelectiveRepeat));
        assert!("4.0".parse::<ProtocolKind>().is_err());
    }

    #[test]
    fn built_engine_reports_its_kind() {
        let now = Instant::now();
        for kind in ProtocolKind::ALL {
            let engine = kind.build(4, Duration::from_millis(50), now);
            assert_eq!(engine.kind(), kind);
        }
    }

    #[test]
    fn timed_variants_poll_faster() {
        assert!(ProtocolKind::Rdt30.default_poll_interval() < ProtocolKind::Rdt22.default_poll_interval());
        assert_eq!(
            ProtocolKind::GoBackN.default_retransmit_timeout(),
            Duration::from_secs(10)
        );
    }
}
