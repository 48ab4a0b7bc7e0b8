use hyper::Request;
use std::net::SocketAddr;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Remote end of the accepted TCP connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerMetadata {
    addr: SocketAddr,
}

impl PeerMetadata {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[derive(Debug, Clone)]
pub struct PeerExtractor<S> {
    peer: PeerMetadata,
    inner: S,
}

impl<S> PeerExtractor<S> {
    pub fn new(peer: PeerMetadata, inner: S) -> Self {
        Self { peer, inner }
    }
}

impl<S, B> Service<Request<B>> for PeerExtractor<S>
where
    S: Service<Request<B>> + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let mut req = req;
        req.extensions_mut().insert(self.peer);
        self.inner.call(req)
    }
}

/// Tags every request on a connection with the connection's remote address.
#[derive(Debug, Clone)]
pub struct PeerExtractorLayer {
    peer: PeerMetadata,
}

impl PeerExtractorLayer {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            peer: PeerMetadata::new(addr),
        }
    }
}

impl<S> Layer<S> for PeerExtractorLayer {
    type Service = PeerExtractor<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PeerExtractor::new(self.peer, inner)
    }
}
