use hyper::header::{HeaderMap, HeaderName};

mod content_type;
mod time;

pub use self::content_type::ContentType;
pub use self::time::{format_duration, megabytes, timestamp};

pub(crate) fn extract_header(headers: &HeaderMap, header: HeaderName) -> Option<String> {
    headers
        .get(header)
        .and_then(|h| h.to_str().ok())
        .map(String::from)
}
