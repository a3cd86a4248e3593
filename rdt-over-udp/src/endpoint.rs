//! One protocol engine bound to one transport, plus its receive loop.
//!
//! # Architecture
//!
//! ```text
//!  Application
//!      │  send(payload)                       receive loop (tokio task)
//!      ▼                                    ┌──────────────────────────┐
//!  Endpoint ────────────────────────────┐   │ recv_timeout(poll)       │
//!    ├── Mutex<Box<dyn Protocol>> ◀─────┼───│   → on_datagram → replies│
//!    ├── Mutex<Option<Arc<Transport>>> ◀┼───│   → Receivers::notify    │
//!    ├── Receivers                      │   │ on_tick → resend expired │
//!    └── AtomicBool listening ──────────┘   └──────────────────────────┘
//! ```
//!
//! The caller's `send` and the worker both take the engine lock, but only
//! for the synchronous state-machine step; all socket I/O happens after the
//! guard is released.  `send` never waits for an acknowledgement: it either
//! transmits or fails fast with [`StateError`].
//!
//! # Shutdown
//!
//! [`Endpoint::stop_listening`] flips the flag and drops every delivery
//! registration; the loop notices within one poll interval and exits.
//! The transport slot is emptied whenever the loop ends, including when the
//! worker task unwinds, so the socket closes as soon as any in-flight `send`
//! finishes.  [`Endpoint::join`] waits for the exit.  Dropping an `Endpoint`
//! also stops its loop, but without waiting.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::config::{ConfigError, EndpointConfig};
use crate::protocol::{Protocol, ProtocolKind, StateError};
use crate::receiver::{Receiver, Receivers};
use crate::simulator::UnreliableChannel;
use crate::socket::{Socket, Transport, MAX_DATAGRAM};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Failures while opening an endpoint.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("cannot bind {host}:{port}")]
    Bind {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("cannot connect to {host}:{port}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("invalid endpoint configuration")]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared between the caller-facing handle and the receive loop.
struct Shared {
    kind: ProtocolKind,
    local_addr: SocketAddr,
    /// `None` once the receive loop has exited.
    transport: Mutex<Option<Arc<Transport>>>,
    engine: Mutex<Box<dyn Protocol>>,
    receivers: Receivers,
    listening: AtomicBool,
}

impl Shared {
    fn engine(&self) -> MutexGuard<'_, Box<dyn Protocol>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    fn transport(&self) -> Option<Arc<Transport>> {
        self.transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop listening and give up the shared reference to the transport.
    fn release(&self) {
        self.listening.store(false, Ordering::Release);
        self.transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Put datagrams on the wire.  Failures are logged; the engine's timers
    /// own recovery.
    async fn transmit(&self, transport: &Transport, datagrams: &[Vec<u8>]) {
        for datagram in datagrams {
            if let Err(e) = transport.send(datagram).await {
                log::error!("[{}] send from {} failed: {e}", self.kind, self.local_addr);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// A running protocol engine talking to exactly one peer.
pub struct Endpoint {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("kind", &self.shared.kind)
            .field("local_addr", &self.shared.local_addr)
            .field("listening", &self.shared.is_listening())
            .finish()
    }
}

impl Endpoint {
    /// Bind, connect, build the engine described by `config` and start the
    /// receive loop.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(config: &EndpointConfig) -> Result<Self, EndpointError> {
        config.validate()?;

        let socket = Socket::bind(&config.local_host, config.local_port)
            .await
            .map_err(|source| EndpointError::Bind {
                host: config.local_host.clone(),
                port: config.local_port,
                source,
            })?;
        socket
            .connect((config.remote_host.as_str(), config.remote_port))
            .await
            .map_err(|source| EndpointError::Connect {
                host: config.remote_host.clone(),
                port: config.remote_port,
                source,
            })?;

        let transport = match &config.channel {
            Some(channel) => Transport::from(UnreliableChannel::new(socket, channel.clone())),
            None => Transport::from(socket),
        };
        let engine = config.protocol.build(
            config.window_size,
            config.retransmit_timeout(),
            Instant::now(),
        );
        log::info!(
            "[{}] {}:{} ⇄ {}:{}",
            config.protocol,
            config.local_host,
            config.local_port,
            config.remote_host,
            config.remote_port
        );
        Ok(Self::start(transport, engine, config.poll_interval()))
    }

    /// Start the receive loop over an already-built transport and engine.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(transport: Transport, engine: Box<dyn Protocol>, poll_interval: Duration) -> Self {
        let shared = Arc::new(Shared {
            kind: engine.kind(),
            local_addr: transport.local_addr(),
            transport: Mutex::new(Some(Arc::new(transport))),
            engine: Mutex::new(engine),
            receivers: Receivers::new(),
            listening: AtomicBool::new(true),
        });
        let worker = tokio::spawn(receive_loop(Arc::clone(&shared), poll_interval));
        Self {
            shared,
            worker: Some(worker),
        }
    }

    pub fn kind(&self) -> ProtocolKind {
        self.shared.kind
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    pub fn is_listening(&self) -> bool {
        self.shared.is_listening()
    }

    /// Hand `payload` to the engine and transmit the resulting frame.
    ///
    /// Returns as soon as the frame is on the wire; it does not wait for an
    /// acknowledgement.  A transport failure is logged, not returned.  Once
    /// the receive loop has exited the socket is gone and the frame is
    /// dropped with a warning.
    pub async fn send(&self, payload: &[u8]) -> Result<(), StateError> {
        let datagram = {
            let mut engine = self.shared.engine();
            engine.send(payload, Instant::now())?
        };
        match self.shared.transport() {
            Some(transport) => self.shared.transmit(&transport, &[datagram]).await,
            None => log::warn!(
                "[{}] {} is closed, frame not sent",
                self.shared.kind,
                self.shared.local_addr
            ),
        }
        Ok(())
    }

    /// Register a callback for delivered payloads.
    pub fn add_receiver(&self, receiver: impl Receiver + 'static) {
        self.shared.receivers.add(Arc::new(receiver));
    }

    /// Register an already shared callback.
    pub fn add_shared_receiver(&self, receiver: Arc<dyn Receiver>) {
        self.shared.receivers.add(receiver);
    }

    /// Ask the receive loop to exit and drop all delivery registrations.
    pub fn stop_listening(&self) {
        self.shared.listening.store(false, Ordering::Release);
        self.shared.receivers.clear();
    }

    /// Wait for the receive loop to exit, then release the socket.
    ///
    /// Without a prior [`stop_listening`](Self::stop_listening) this waits
    /// forever.
    pub async fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                log::error!("[{}] receive loop ended abnormally: {e}", self.shared.kind);
            }
        }
    }

    /// [`stop_listening`](Self::stop_listening) followed by
    /// [`join`](Self::join).
    pub async fn shutdown(self) {
        self.stop_listening();
        self.join().await;
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.shared.listening.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Receive loop
// ---------------------------------------------------------------------------

/// Releases the transport when the worker ends, whether it returns or
/// unwinds.
struct ExitGuard(Arc<Shared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.release();
        log::debug!("[{}] {} stopped listening", self.0.kind, self.0.local_addr);
    }
}

async fn receive_loop(shared: Arc<Shared>, poll_interval: Duration) {
    let guard = ExitGuard(Arc::clone(&shared));
    let Some(transport) = shared.transport() else {
        return;
    };
    let local = shared.local_addr;
    log::debug!("[{}] {} listening (poll {:?})", shared.kind, local, poll_interval);
    let mut buf = vec![0u8; MAX_DATAGRAM];

    while shared.is_listening() {
        match transport.recv_timeout(&mut buf, poll_interval).await {
            Ok(Some(n)) => {
                let actions = shared.engine().on_datagram(&buf[..n], Instant::now());
                shared.transmit(&transport, &actions.transmit).await;
                for payload in &actions.deliver {
                    shared.receivers.notify(payload);
                }
            }
            Ok(None) => {}
            Err(e) => log::error!("[{}] receive on {} failed: {e}", shared.kind, local),
        }

        let resend = shared.engine().on_tick(Instant::now());
        shared.transmit(&transport, &resend).await;
    }

    // Drop our reference before the guard empties the slot so the socket
    // closes here unless a `send` is mid-flight.
    drop(transport);
    drop(guard);
}
