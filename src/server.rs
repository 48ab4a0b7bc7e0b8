use crate::events::EventLogger;
use crate::metadata::{ClientMetadataCollectorLayer, PeerExtractorLayer, RequestInfoExtractorLayer};
use crate::session::SessionRegistry;
use crate::{DripTrapConfig, Tarpit};

use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio::time;
use tower::ServiceBuilder;
use tracing::{debug, info, warn};

/// Pause before accepting again after the listener errors out, e.g. when
/// every file descriptor is held by a trapped client.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not bind to {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("socket error")]
    Socket(#[from] io::Error),
}

pub struct Server {
    config: DripTrapConfig,
    registry: SessionRegistry,
    events: EventLogger,
}

impl Server {
    pub fn new(config: DripTrapConfig, registry: SessionRegistry, events: EventLogger) -> Self {
        Self {
            config,
            registry,
            events,
        }
    }

    /// Claims the listening port. Failing here is the only fatal error of
    /// the server.
    pub async fn bind(self) -> Result<BoundServer, Error> {
        let addr = *self.config.bind_addr();
        info!("Starting tarpit...");
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        info!("Listening on: {}", local_addr);
        self.events.server_online(local_addr.port());
        Ok(BoundServer {
            listener,
            local_addr,
            server: self,
        })
    }

    pub async fn run<F>(self, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        self.bind().await?.serve(shutdown).await;
        Ok(())
    }
}

pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    server: Server,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until `shutdown` completes, then drops every
    /// connection still held.
    pub async fn serve<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Self {
            listener,
            local_addr,
            server,
        } = self;
        let tarpit = Tarpit::new(
            server.config.tarpit_config().clone(),
            server.registry.clone(),
            server.events.clone(),
        );
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accepted = listener.accept() => {
                    let (stream, rmt_addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!("Failed to accept connection: {}", err);
                            time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };
                    debug!("Received connection from: {}", rmt_addr);
                    let io = TokioIo::new(stream);
                    let request_tarpit = tarpit.clone();
                    connections.spawn(async move {
                        let svc = ServiceBuilder::new()
                            .layer(PeerExtractorLayer::new(rmt_addr))
                            .layer(RequestInfoExtractorLayer)
                            .layer(ClientMetadataCollectorLayer)
                            .service(request_tarpit);
                        let svc = TowerToHyperService::new(svc);
                        // A trapped connection only ever ends in an error.
                        if let Err(err) = auto::Builder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            debug!("Connection from {} ended: {:?}", rmt_addr, err);
                        }
                    });
                }
            }
        }

        info!(
            "Shutting down, releasing {} connections",
            server.registry.len()
        );
        connections.shutdown().await;
        server.events.server_offline(local_addr.port());
    }
}
