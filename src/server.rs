//! Loopback listener that captures a single authorization redirect.
//!
//! The listener runs the axum server on its own task while the caller awaits
//! the outcome with a deadline. Whatever happens (capture, denial, timeout or
//! the caller dropping the listener) the server task is told to shut down and
//! the socket is released before control returns.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use axum::{Extension, Router, routing::get};
use tokio::{
    net::TcpListener,
    sync::{Mutex, oneshot},
    task::JoinHandle,
    time::{Instant, timeout, timeout_at},
};

use crate::{
    api::{self, CaptureSlot},
    utils::RedirectParams,
};

/// How long a graceful shutdown may take before the server task is aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub enum ListenerOutcome {
    Captured { code: String, state: String },
    /// The service redirected with `error=..` instead of a code.
    Denied { error: String, state: Option<String> },
    TimedOut,
    BindFailed(io::Error),
    /// The server task ended before any redirect was delivered.
    ServerExited,
}

impl From<RedirectParams> for ListenerOutcome {
    fn from(params: RedirectParams) -> Self {
        match params {
            RedirectParams::Code { code, state } => ListenerOutcome::Captured { code, state },
            RedirectParams::Denied { error, state } => ListenerOutcome::Denied { error, state },
        }
    }
}

/// A running loopback server that waits for one authorization redirect.
///
/// Created with [`CallbackListener::bind`]; finished with
/// [`CallbackListener::wait`] or [`CallbackListener::stop`]. Dropping it also
/// shuts the server down.
pub struct CallbackListener {
    addr: SocketAddr,
    capture_rx: oneshot::Receiver<RedirectParams>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl CallbackListener {
    /// Binds `addr` and starts serving `path` on a background task.
    pub async fn bind(addr: SocketAddr, path: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        let (capture_tx, capture_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let slot: CaptureSlot = Arc::new(Mutex::new(Some(capture_tx)));

        let app = Router::new().route(path, get(api::callback).layer(Extension(slot)));

        let server = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::warn!(error = %e, "callback server stopped with an error");
            }
            tracing::debug!("callback server stopped");
        });

        tracing::debug!(%addr, path, "callback listener started");

        Ok(Self {
            addr,
            capture_rx,
            shutdown_tx: Some(shutdown_tx),
            server: Some(server),
        })
    }

    /// Returns the address the listener is bound to.
    ///
    /// When bound to port 0 this is where the OS-assigned port can be read,
    /// which is how tests reach the listener.
    ///
    /// # Example
    ///
    /// ```rust
    /// let listener = CallbackListener::bind(([127, 0, 0, 1], 0).into(), "/callback").await?;
    /// let url = format!("http://{}/callback", listener.local_addr());
    /// ```
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Waits for the first redirect or the deadline, then stops the listener.
    ///
    /// # Arguments
    ///
    /// * `deadline` - When to give up waiting
    ///
    /// # Returns
    ///
    /// - [`ListenerOutcome::Captured`] or [`ListenerOutcome::Denied`] for the
    ///   first valid redirect
    /// - [`ListenerOutcome::TimedOut`] if the deadline passed first
    /// - [`ListenerOutcome::ServerExited`] if the server task was gone before
    ///   a redirect arrived
    ///
    /// The socket is released before this returns in every case.
    pub async fn wait(mut self, deadline: Instant) -> ListenerOutcome {
        let outcome = match timeout_at(deadline, &mut self.capture_rx).await {
            Ok(Ok(params)) => params.into(),
            Ok(Err(_)) => {
                // The sender lives in the router, so it only goes away with
                // the server task.
                tracing::warn!("callback server exited before a redirect arrived");
                ListenerOutcome::ServerExited
            }
            Err(_) => ListenerOutcome::TimedOut,
        };

        self.stop().await;
        outcome
    }

    /// Shuts the server down and waits for the socket to be released.
    /// Calling it again is a no-op.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut server) = self.server.take() {
            if timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
                tracing::warn!("callback server did not stop in time, aborting it");
                server.abort();
                let _ = server.await;
            }
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

/// Binds the loopback interface on `port` and waits for one redirect to
/// `path` until `deadline`.
pub async fn start(port: u16, path: &str, deadline: Instant) -> ListenerOutcome {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    match CallbackListener::bind(addr, path).await {
        Ok(listener) => listener.wait(deadline).await,
        Err(e) => ListenerOutcome::BindFailed(e),
    }
}
