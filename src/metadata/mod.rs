mod collector;
mod peer;
mod request_info;

/// Substituted when the client sends no usable `User-Agent`.
pub const NO_USER_AGENT: &str = "Empty";

pub use self::collector::{ClientMetadata, ClientMetadataCollectorLayer};
pub use self::peer::{PeerExtractorLayer, PeerMetadata};
pub use self::request_info::{RequestInfoExtractorLayer, RequestInfoMetadata};
