use super::{DripFeed, Error, Filler, MethodClass};
use crate::events::EventLogger;
use crate::metadata::ClientMetadata;
use crate::session::SessionRegistry;
use crate::TarpitConfig;
use bytes::Bytes;
use futures::stream;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, StreamBody};
use hyper::body::Frame;
use hyper::header::{self, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::Service;
use tracing::{info, warn};

pub type TrapBody = UnsyncBoxBody<Bytes, Infallible>;

type TrapFuture = Pin<Box<dyn Future<Output = Result<Response<TrapBody>, Error>> + Send>>;

/// Terminal service of the request pipeline: runs one [`DripFeed`] per
/// request.
///
/// Expects a [`ClientMetadata`] in the request extensions.
#[derive(Debug, Clone)]
pub struct Tarpit {
    registry: SessionRegistry,
    events: EventLogger,
    config: TarpitConfig,
    filler: Filler,
}

impl Tarpit {
    pub fn new(config: TarpitConfig, registry: SessionRegistry, events: EventLogger) -> Self {
        let filler = Filler::new(config.content_type(), config.filler_lines());
        Self {
            registry,
            events,
            config,
            filler,
        }
    }

    async fn handle(self, metadata: ClientMetadata) -> Result<Response<TrapBody>, Error> {
        self.events.request(&metadata);
        let mut feed = match DripFeed::open(
            &metadata,
            &self.registry,
            &self.events,
            self.filler.clone(),
            self.config.tick(),
        ) {
            Ok(feed) => feed,
            Err(err) => {
                warn!("Declining {} {}: {}", metadata.peer(), metadata.method(), err);
                return Err(err.into());
            }
        };

        match feed.classify(metadata.method()) {
            MethodClass::Trap => self.trap_response(feed, metadata.method()),
            MethodClass::Probe => {
                feed.hold().await;
                Self::probe_response()
            }
            MethodClass::Reject => {
                info!("Method not recognised: {}", metadata.method());
                self.events.unrecognized_method(&metadata);
                Err(Error::Rejected(metadata.method().to_string()))
            }
        }
    }

    fn trap_response(&self, feed: DripFeed, method: &Method) -> Result<Response<TrapBody>, Error> {
        // hyper never sends the body of a successful CONNECT.
        let status = if *method == Method::CONNECT {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::OK
        };
        let body_stream = stream::unfold(feed, |mut feed| async move {
            feed.next_chunk()
                .await
                .map(|chunk| (Ok::<_, Infallible>(Frame::data(chunk)), feed))
        });
        let resp = Response::builder()
            .status(status)
            .header(header::CONNECTION, HeaderValue::from_static("keep-alive"))
            .header(header::CONTENT_TYPE, self.config.content_type().to_string())
            .body(StreamBody::new(body_stream).boxed_unsync())?;
        Ok(resp)
    }

    fn probe_response() -> Result<Response<TrapBody>, Error> {
        let resp = Response::builder()
            .header(header::CONNECTION, HeaderValue::from_static("keep-alive"))
            .body(Empty::new().boxed_unsync())?;
        Ok(resp)
    }
}

impl<B> Service<Request<B>> for Tarpit
where
    B: Send + 'static,
{
    type Response = Response<TrapBody>;
    type Error = Error;
    type Future = TrapFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let mut req = req;
        let metadata = req.extensions_mut().remove::<ClientMetadata>();
        let tarpit = self.clone();
        Box::pin(async move {
            let metadata = metadata.ok_or(Error::MissingMetadata)?;
            tarpit.handle(metadata).await
        })
    }
}
