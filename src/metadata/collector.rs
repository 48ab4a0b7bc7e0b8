use super::{PeerMetadata, RequestInfoMetadata, NO_USER_AGENT};
use crate::session::RequestSummary;
use crate::util::extract_header;
use hyper::{header, Method, Request};
use std::net::SocketAddr;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Everything the tarpit knows about a client and its request.
///
/// The user agent is `None` when the header is missing or not valid UTF-8.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMetadata {
    peer: PeerMetadata,
    user_agent: Option<String>,
    request_info: RequestInfoMetadata,
}

impl ClientMetadata {
    pub fn new(
        peer: PeerMetadata,
        user_agent: Option<String>,
        request_info: RequestInfoMetadata,
    ) -> Self {
        Self {
            peer,
            user_agent,
            request_info,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer.addr()
    }

    pub fn user_agent_string(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| String::from(NO_USER_AGENT))
    }

    pub fn method(&self) -> &Method {
        self.request_info.method()
    }

    pub fn path(&self) -> &str {
        self.request_info.path()
    }

    pub fn summary(&self) -> RequestSummary {
        RequestSummary::new(
            self.method().to_string(),
            self.path().to_owned(),
            self.user_agent_string(),
        )
    }
}

/// Folds the extracted peer and request line into a [`ClientMetadata`],
/// reading the `User-Agent` straight from the headers on the way.
#[derive(Debug, Clone)]
pub struct ClientMetadataCollector<S> {
    inner: S,
}

impl<S> ClientMetadataCollector<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, B> Service<Request<B>> for ClientMetadataCollector<S>
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
        let peer = req.extensions_mut().remove::<PeerMetadata>();
        let request_info = req.extensions_mut().remove::<RequestInfoMetadata>();
        // Without a peer or request line there is nothing to key a session
        // on; the tarpit declines such requests.
        if let (Some(peer), Some(request_info)) = (peer, request_info) {
            let user_agent = extract_header(req.headers(), header::USER_AGENT);
            let metadata = ClientMetadata::new(peer, user_agent, request_info);
            req.extensions_mut().insert(metadata);
        }
        self.inner.call(req)
    }
}

#[derive(Debug, Clone)]
pub struct ClientMetadataCollectorLayer;

impl<S> Layer<S> for ClientMetadataCollectorLayer {
    type Service = ClientMetadataCollector<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientMetadataCollector::new(inner)
    }
}
