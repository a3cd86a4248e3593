//! Fault-injecting channel.
//!
//! Real loopback links do not drop or damage datagrams.  To exercise the
//! reliability mechanisms, [`UnreliableChannel`] wraps a
//! [`crate::socket::Socket`] and intercepts every physical receive, asking a
//! [`FaultModel`] what to do with it:
//!
//! | Fault      | Description                                            |
//! |------------|--------------------------------------------------------|
//! | Loss       | Drop the datagram and keep receiving.                  |
//! | Delay      | Sleep up to `max_delay` before returning the datagram. |
//! | Corruption | Flip one bit of one byte.                              |
//!
//! The three decisions are independent.  Sends pass through untouched; a
//! pair of endpoints each wrapping their own socket still sees faults in
//! both directions.
//!
//! [`RandomFaults`] is the default model.  Give it a `seed` for a
//! reproducible fault sequence.

use std::io;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;

use crate::config::ConfigError;
use crate::socket::Socket;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Parameters of the random fault model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Probability that a datagram is silently dropped.
    pub loss_probability: f64,
    /// Probability that a datagram is returned without added delay.
    pub in_time_probability: f64,
    /// Probability that a datagram is returned undamaged.
    pub correct_probability: f64,
    /// Upper bound of the uniformly random delay.
    pub max_delay: Duration,
    /// Fixed RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        // Half of all datagrams are damaged: every engine's error path runs.
        Self {
            loss_probability: 0.0,
            in_time_probability: 1.0,
            correct_probability: 0.5,
            max_delay: Duration::from_millis(1000),
            seed: None,
        }
    }
}

impl ChannelConfig {
    /// A channel that never loses, delays or damages anything.
    pub fn perfect() -> Self {
        Self {
            correct_probability: 1.0,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("loss_probability", self.loss_probability),
            ("in_time_probability", self.in_time_probability),
            ("correct_probability", self.correct_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Probability { name, value });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fault model
// ---------------------------------------------------------------------------

/// What to do with one received datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verdict {
    pub lost: bool,
    pub delay: Option<Duration>,
    /// `(byte index, bit index)` to flip.
    pub flip: Option<(usize, u8)>,
}

impl Verdict {
    /// Deliver untouched.
    pub fn pass() -> Self {
        Self::default()
    }

    /// Flip the bit in place, if any.  Out-of-range indices are ignored.
    pub fn apply(&self, datagram: &mut [u8]) {
        if let Some((byte, bit)) = self.flip {
            if let Some(b) = datagram.get_mut(byte) {
                *b ^= 1 << (bit % 8);
            }
        }
    }
}

/// Decides the fate of each datagram arriving through an
/// [`UnreliableChannel`].
pub trait FaultModel: Send {
    /// Called once per physical receive with the datagram length.
    fn judge(&mut self, len: usize) -> Verdict;
}

/// Independent loss, delay and single-bit corruption drawn from a
/// [`StdRng`].
#[derive(Debug)]
pub struct RandomFaults {
    config: ChannelConfig,
    rng: StdRng,
}

impl RandomFaults {
    pub fn new(config: ChannelConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng }
    }
}

impl FaultModel for RandomFaults {
    fn judge(&mut self, len: usize) -> Verdict {
        let lost = self.rng.random::<f64>() < self.config.loss_probability;
        let delayed = self.rng.random::<f64>() >= self.config.in_time_probability;
        let damaged = self.rng.random::<f64>() >= self.config.correct_probability;

        let max_ms = self.config.max_delay.as_millis() as u64;
        let delay = delayed.then(|| Duration::from_millis(self.rng.random_range(0..=max_ms)));
        let flip = (damaged && len > 0)
            .then(|| (self.rng.random_range(0..len), self.rng.random_range(0..8u8)));

        Verdict { lost, delay, flip }
    }
}

// ---------------------------------------------------------------------------
// UnreliableChannel
// ---------------------------------------------------------------------------

/// A fault-injecting wrapper around the socket layer.
pub struct UnreliableChannel {
    socket: Socket,
    faults: Mutex<Box<dyn FaultModel>>,
}

impl std::fmt::Debug for UnreliableChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnreliableChannel")
            .field("socket", &self.socket)
            .finish_non_exhaustive()
    }
}

impl UnreliableChannel {
    /// Wrap `socket` with the random fault model described by `config`.
    pub fn new(socket: Socket, config: ChannelConfig) -> Self {
        Self::with_model(socket, RandomFaults::new(config))
    }

    pub fn with_model(socket: Socket, model: impl FaultModel + 'static) -> Self {
        Self {
            socket,
            faults: Mutex::new(Box::new(model)),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// Sends are never faulted.
    pub async fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        self.socket.send(datagram).await
    }

    /// Receive one datagram that survived the fault model.
    ///
    /// Lost datagrams are skipped until `wait` runs out, so the caller only
    /// sees added latency.  An injected delay is slept inside this call and
    /// may extend past `wait`.  Returns `Ok(None)` on timeout.
    pub async fn recv_timeout(&self, buf: &mut [u8], wait: Duration) -> io::Result<Option<usize>> {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let Some(n) = self.socket.recv_timeout(buf, remaining).await? else {
                return Ok(None);
            };

            let verdict = self
                .faults
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .judge(n);

            if verdict.lost {
                log::warn!("[channel] dropped {n}-byte datagram");
                continue;
            }
            if let Some(delay) = verdict.delay {
                log::warn!("[channel] delaying {n}-byte datagram by {delay:?}");
                tokio::time::sleep(delay).await;
            }
            if let Some((byte, bit)) = verdict.flip {
                log::warn!("[channel] flipping bit {bit} of byte {byte} in {n}-byte datagram");
                verdict.apply(&mut buf[..n]);
            }
            return Ok(Some(n));
        }
    }
}
