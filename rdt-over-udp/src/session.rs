//! Owned, replaceable handle to the active endpoint.
//!
//! A [`Session`] holds at most one running [`Endpoint`].  Changing protocol
//! or addresses is destructive: the old endpoint is stopped and joined
//! (releasing its socket) before the new one binds, and every delivery
//! callback registered on the session is re-attached to the new endpoint.

use std::sync::Arc;

use crate::config::EndpointConfig;
use crate::endpoint::{Endpoint, EndpointError};
use crate::protocol::{ProtocolKind, StateError};
use crate::receiver::Receiver;

/// Errors surfaced by [`Session`] operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no active endpoint")]
    Inactive,
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

pub struct Session {
    config: EndpointConfig,
    active: Option<Endpoint>,
    receivers: Vec<Arc<dyn Receiver>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("active", &self.active)
            .field("receivers", &self.receivers.len())
            .finish()
    }
}

impl Session {
    /// Open an endpoint for `config`.
    pub async fn new(config: EndpointConfig) -> Result<Self, SessionError> {
        let mut session = Self {
            config,
            active: None,
            receivers: Vec::new(),
        };
        session.restart().await?;
        Ok(session)
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.active.as_ref()
    }

    /// Replace the active engine with a fresh one of `kind`.
    pub async fn switch(&mut self, kind: ProtocolKind) -> Result<(), SessionError> {
        self.reconfigure(|config| config.protocol = kind).await
    }

    /// Edit the configuration and restart the endpoint with it.
    ///
    /// On failure the previous configuration is kept but the session is left
    /// without an active endpoint.
    pub async fn reconfigure(
        &mut self,
        edit: impl FnOnce(&mut EndpointConfig),
    ) -> Result<(), SessionError> {
        let mut next = self.config.clone();
        edit(&mut next);
        next.validate().map_err(EndpointError::from)?;
        let previous = std::mem::replace(&mut self.config, next);
        if let Err(e) = self.restart().await {
            self.config = previous;
            return Err(e);
        }
        Ok(())
    }

    async fn restart(&mut self) -> Result<(), SessionError> {
        if let Some(old) = self.active.take() {
            log::debug!("[session] stopping {}", old.kind());
            old.shutdown().await;
        }
        let endpoint = Endpoint::open(&self.config).await?;
        for receiver in &self.receivers {
            endpoint.add_shared_receiver(Arc::clone(receiver));
        }
        log::info!("[session] protocol {} active", endpoint.kind());
        self.active = Some(endpoint);
        Ok(())
    }

    pub async fn send(&self, payload: &[u8]) -> Result<(), SessionError> {
        let endpoint = self.active.as_ref().ok_or(SessionError::Inactive)?;
        endpoint.send(payload).await?;
        Ok(())
    }

    /// Register a callback that survives protocol switches.
    pub fn add_receiver(&mut self, receiver: impl Receiver + 'static) {
        let receiver: Arc<dyn Receiver> = Arc::new(receiver);
        if let Some(endpoint) = &self.active {
            endpoint.add_shared_receiver(Arc::clone(&receiver));
        }
        self.receivers.push(receiver);
    }

    /// Stop and join the active endpoint.
    pub async fn close(&mut self) {
        if let Some(endpoint) = self.active.take() {
            endpoint.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn free_port() -> u16 {
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.local_addr().unwrap().port()
    }

    fn config(local_port: u16, remote_port: u16) -> EndpointConfig {
        EndpointConfig {
            protocol: ProtocolKind::Rdt22,
            local_port,
            remote_port,
            poll_interval: Some(Duration::from_millis(10)),
            channel: None,
            ..EndpointConfig::default()
        }
    }

    #[tokio::test]
    async fn switch_rebinds_and_keeps_receivers() {
        let (pa, pb) = (free_port(), free_port());
        let mut a = Session::new(config(pa, pb)).await.unwrap();
        let mut b = Session::new(config(pb, pa)).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        b.add_receiver(move |payload: &[u8]| {
            let _ = tx.send(payload.to_vec());
        });

        a.switch(ProtocolKind::Rdt30).await.unwrap();
        b.switch(ProtocolKind::Rdt30).await.unwrap();
        assert_eq!(a.endpoint().map(Endpoint::kind), Some(ProtocolKind::Rdt30));

        a.send(b"after switch").await.unwrap();
        let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(got, Some(b"after switch".to_vec()));

        a.close().await;
        b.close().await;
    }

    #[tokio::test]
    async fn closed_session_is_inactive() {
        let (pa, pb) = (free_port(), free_port());
        let mut session = Session::new(config(pa, pb)).await.unwrap();
        session.close().await;
        assert!(matches!(
            session.send(b"x").await,
            Err(SessionError::Inactive)
        ));
    }

    #[tokio::test]
    async fn invalid_reconfigure_keeps_current_endpoint() {
        let (pa, pb) = (free_port(), free_port());
        let mut session = Session::new(config(pa, pb)).await.unwrap();
        let err = session
            .reconfigure(|c| {
                c.protocol = ProtocolKind::GoBackN;
                c.window_size = 1;
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Endpoint(EndpointError::Config(_))));
        assert_eq!(session.config().protocol, ProtocolKind::Rdt22);
        assert!(session.endpoint().is_some());
        session.close().await;
    }

    #[tokio::test]
    async fn busy_stop_and_wait_send_is_reported() {
        let (pa, pb) = (free_port(), free_port());
        let session = Session::new(config(pa, pb)).await.unwrap();
        session.send(b"first").await.unwrap();
        assert!(matches!(
            session.send(b"second").await,
            Err(SessionError::State(StateError::AwaitingAck))
        ));
    }
}
