mod listener;

pub use listener::{Incoming, TlsListener};

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::future::BoxFuture;
use log::{debug, error, info, warn};
use tokio::{
    net::TcpStream,
    sync::Notify,
    task::{JoinError, JoinSet},
};
use tokio_rustls::server::TlsStream;

use crate::{config::Config, error::ServerError, tls::PeerIdentity};

const SHUTDOWN_WAIT_PERIOD: u64 = 15; // seconds
const ACCEPT_BACKOFF_BASE_MS: u64 = 50;

/// An established, authenticated connection.
pub struct Connection {
    pub stream: TlsStream<TcpStream>,
    pub peer_addr: SocketAddr,
    /// Identity from the client certificate, when one was presented
    pub peer: Option<PeerIdentity>,
}

/// Called once per established connection, on that connection's task.
pub type ConnectionHandler = Arc<dyn Fn(Connection) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct Server {
    /// The configuration for the server
    config: Arc<Config>,

    /// The shutdown signal for the server
    signal: Arc<Notify>,

    /// Whether to shut down gracefully (default: true)
    graceful_shutdown: bool,

    handler: ConnectionHandler,
}

impl Server {
    /// Create a server that hands every established connection to `handler`.
    pub fn new<F, Fut>(config: Arc<Config>, handler: F) -> Self
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        debug!("Creating a new Tollgate server instance");

        Server {
            config,
            signal: Arc::new(Notify::new()),
            graceful_shutdown: true,
            handler: Arc::new(move |connection| -> BoxFuture<'static, ()> {
                Box::pin(handler(connection))
            }),
        }
    }

    pub fn set_graceful_shutdown(&mut self, graceful: bool) {
        debug!("Setting graceful shutdown to {graceful}");
        self.graceful_shutdown = graceful;
    }

    /// A handle that stops the accept loop when notified.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.signal)
    }

    /// Watch for a shutdown signal (like Ctrl+C) and notify the server to shut down gracefully.
    fn watch_for_shutdown(&self) {
        if !self.graceful_shutdown {
            debug!("Graceful shutdown is disabled, skipping signal watcher");
            return;
        }

        let signal = Arc::clone(&self.signal);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    debug!("Received shutdown signal, shutting down the server...");
                    signal.notify_waiters();
                }
                Err(e) => error!("Failed to install Ctrl+C handler: {e}"),
            }
        });
    }

    /// Bind the listener and accept connections until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TlsListener::bind(self.config.socket_address(), &self.config.tls).await?;
        self.serve(listener).await
    }

    /// Accept connections on an existing listener until shutdown.
    pub async fn serve(&self, listener: TlsListener) -> Result<(), ServerError> {
        self.watch_for_shutdown();

        if let Ok(addr) = listener.local_addr() {
            info!(
                "Listening on {addr} (client auth level `{}`)",
                listener.config().effective_level()
            );
        }

        let mut connections = JoinSet::new();
        let mut accept_failures: u32 = 0;

        loop {
            tokio::select! {
                _ = self.signal.notified() => {
                    drop(listener);
                    debug!("Shutdown signal received, exiting server loop");
                    break;
                }

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    log_join_error(joined);
                }

                incoming = listener.accept() => {
                    match incoming {
                        Ok(incoming) => {
                            accept_failures = 0;
                            connections.spawn(handle_connection(incoming, Arc::clone(&self.handler)));
                        }
                        Err(e) => {
                            accept_failures = accept_failures.saturating_add(1);
                            let delay = accept_backoff(accept_failures);
                            error!("{e}; retrying in {}ms", delay.as_millis());
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        let drain = async {
            while let Some(joined) = connections.join_next().await {
                log_join_error(joined);
            }
        };

        tokio::select! {
            _ = drain => {
                debug!("Closed all connections gracefully");
                Ok(())
            }
            _ = tokio::time::sleep(Duration::from_secs(SHUTDOWN_WAIT_PERIOD)) => {
                error!("Timed out waiting for all connections to close");
                Err(ServerError::TimeoutWaitingForConnections)
            }
        }
    }
}

/// Pause before the next accept after `failures` consecutive failed ones.
fn accept_backoff(failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(4);
    Duration::from_millis(ACCEPT_BACKOFF_BASE_MS << exponent)
}

fn log_join_error(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!("Connection handler panicked: {e}");
        } else {
            debug!("Connection task cancelled: {e}");
        }
    }
}

async fn handle_connection(incoming: Incoming, handler: ConnectionHandler) {
    let peer_addr = incoming.peer_addr();

    let stream = match incoming.handshake().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Rejected connection from {peer_addr}: {e}");
            return;
        }
    };

    let peer = PeerIdentity::from_chain(stream.get_ref().1.peer_certificates());
    match &peer {
        Some(identity) => info!("{peer_addr} authenticated as {}", identity.display_name()),
        None => debug!("{peer_addr} connected without a client certificate"),
    }

    handler(Connection {
        stream,
        peer_addr,
        peer,
    })
    .await;
}
