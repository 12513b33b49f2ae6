use crate::config::Config;
use crate::connection::{ConnectionSettings, handle_connection};
use crate::service::Service;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// TCP front end: one task per accepted connection, all sharing one service.
pub struct Server<S> {
    listener: TcpListener,
    service: Arc<S>,
    settings: ConnectionSettings,
}

impl<S: Service> Server<S> {
    pub fn new(listener: TcpListener, service: Arc<S>, settings: ConnectionSettings) -> Self {
        Server {
            listener,
            service,
            settings,
        }
    }

    pub async fn bind(config: &Config, service: Arc<S>) -> io::Result<Self> {
        let addr = config.addr();
        let listener = TcpListener::bind(&addr).await?;
        let settings = ConnectionSettings {
            read_timeout: config.read_timeout(),
            max_line_bytes: config.max_line_bytes,
        };
        Ok(Server::new(listener, service, settings))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves, then tell every open
    /// connection to stop after its current request and wait for all of them.
    /// When this returns no connection task is touching the service.
    pub async fn run_until<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            listener,
            service,
            settings,
        } = self;
        info!("Listening on {}", listener.local_addr()?);
        tokio::pin!(shutdown);
        let stop = CancellationToken::new();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("No longer accepting connections, draining {}", connections.len());
                    stop.cancel();
                    while connections.join_next().await.is_some() {}
                    return Ok(());
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                result = listener.accept() => {
                    let (stream, peer_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!("Accept failed: {e}");
                            continue;
                        }
                    };
                    debug!("New connection from {peer_addr}");

                    let service = service.clone();
                    let stop = stop.clone();
                    connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, &*service, settings, &stop).await {
                            debug!("Connection error from {peer_addr}: {e}");
                        }
                        debug!("Connection closed: {peer_addr}");
                    });
                }
            }
        }
    }

    pub async fn run_until_ctrl_c(self) -> io::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for ctrl-c: {e}");
            }
        })
        .await
    }
}
