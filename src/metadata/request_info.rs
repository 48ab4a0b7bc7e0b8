use hyper::{Method, Request};
use std::task::{Context, Poll};
use tower::{Layer, Service};

#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfoMetadata {
    method: Method,
    /// Path plus query, as the client sent it.
    path: String,
}

impl RequestInfoMetadata {
    pub fn new(method: Method, path: String) -> Self {
        Self { method, path }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug, Clone)]
pub struct RequestInfoExtractor<S> {
    inner: S,
}

impl<S> RequestInfoExtractor<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, B> Service<Request<B>> for RequestInfoExtractor<S>
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
        let method = req.method().to_owned();
        let path = req
            .uri()
            .path_and_query()
            .map(|path| path.as_str())
            .unwrap_or("/")
            .to_owned();
        let mut req = req;
        req.extensions_mut()
            .insert(RequestInfoMetadata::new(method, path));
        self.inner.call(req)
    }
}

#[derive(Debug, Clone)]
pub struct RequestInfoExtractorLayer;

impl<S> Layer<S> for RequestInfoExtractorLayer {
    type Service = RequestInfoExtractor<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestInfoExtractor::new(inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Empty;
    use hyper::Response;
    use tokio_test::assert_ready;
    use tower::ServiceBuilder;
    use tower_test::mock::{self, Spawn};

    #[tokio::test]
    async fn test_extract_request_info() {
        let request = Request::builder()
            .method("PROPFIND")
            .uri("/.well-known/security.txt?lang=en")
            .body(Empty::<Bytes>::default())
            .unwrap();

        let (svc, mut req_handle) = mock::pair::<Request<Empty<Bytes>>, Response<Empty<Bytes>>>();
        let svc = ServiceBuilder::new()
            .layer(RequestInfoExtractorLayer)
            .service(svc);
        let mut svc = Spawn::new(svc);

        assert_ready!(svc.poll_ready()).expect("extractor not ready");

        let res_fut = svc.call(request);
        let (req, res_handle) = req_handle.next_request().await.unwrap();
        let parsed = req
            .extensions()
            .get::<RequestInfoMetadata>()
            .expect("extractor did not parse the request line")
            .clone();

        assert_eq!(parsed.method().as_str(), "PROPFIND");
        assert_eq!(parsed.path(), "/.well-known/security.txt?lang=en");
        res_handle.send_response(Response::builder().body(Empty::<Bytes>::default()).unwrap());
        res_fut.await.expect("failure to run future");
    }
}
