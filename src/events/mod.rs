//! Structured facts about the server and its sessions.
//!
//! Every fact becomes one [`EventRecord`], serialized as a single JSON object
//! per line by the configured [`EventSink`]. Emitting is best-effort: a sink
//! that fails only costs the line, never the connection.

use crate::metadata::ClientMetadata;
use crate::session::Session;
use crate::util::{format_duration, megabytes, timestamp};
use chrono::Local;
use serde::Serialize;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use tracing_appender::rolling::InitError;

mod sink;

pub use self::sink::{EventSink, FileSink, MemorySink};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("could not serialize event")]
    Serialize(#[from] serde_json::Error),

    #[error("could not write event")]
    Io(#[from] io::Error),

    #[error("could not open event log")]
    Init(#[from] InitError),

    #[error("event sink is unavailable")]
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "MessageType")]
pub enum EventRecord {
    #[serde(rename_all = "PascalCase")]
    Server {
        timestamp: String,
        status: ServerStatus,
        sport: u16,
    },
    #[serde(rename_all = "PascalCase")]
    Connect {
        timestamp: String,
        src_addr: String,
        sport: u16,
        row: u32,
    },
    #[serde(rename = "Data", rename_all = "PascalCase")]
    Request {
        timestamp: String,
        src_addr: String,
        sport: u16,
        #[serde(rename = "User-Agent")]
        user_agent: String,
        method: String,
        path: String,
    },
    #[serde(rename_all = "PascalCase")]
    UnrecognizedMethod {
        timestamp: String,
        src_addr: String,
        sport: u16,
        method: String,
        path: String,
    },
    #[serde(rename_all = "PascalCase")]
    Disconnect {
        timestamp: String,
        src_addr: String,
        sport: u16,
        #[serde(rename = "TotalMB")]
        total_mb: f64,
        total_bytes: u64,
        duration: String,
        duration_ms: u64,
        summary: String,
    },
}

fn now() -> String {
    timestamp(&Local::now())
}

fn src(peer: SocketAddr) -> (String, u16) {
    (peer.ip().to_string(), peer.port())
}

/// Translates session facts into [`EventRecord`]s for a sink.
#[derive(Debug, Clone)]
pub struct EventLogger {
    sink: Arc<dyn EventSink>,
}

impl EventLogger {
    pub fn new<S: EventSink + 'static>(sink: S) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    pub fn server_online(&self, port: u16) {
        self.emit(EventRecord::Server {
            timestamp: now(),
            status: ServerStatus::Online,
            sport: port,
        });
    }

    pub fn server_offline(&self, port: u16) {
        self.emit(EventRecord::Server {
            timestamp: now(),
            status: ServerStatus::Offline,
            sport: port,
        });
    }

    pub fn connect(&self, session: &Session) {
        let (src_addr, sport) = src(session.peer());
        self.emit(EventRecord::Connect {
            timestamp: timestamp(session.connection_time()),
            src_addr,
            sport,
            row: session.display_row(),
        });
    }

    pub fn request(&self, metadata: &ClientMetadata) {
        let (src_addr, sport) = src(metadata.peer());
        self.emit(EventRecord::Request {
            timestamp: now(),
            src_addr,
            sport,
            user_agent: metadata.user_agent_string(),
            method: metadata.method().to_string(),
            path: metadata.path().to_owned(),
        });
    }

    pub fn unrecognized_method(&self, metadata: &ClientMetadata) {
        let (src_addr, sport) = src(metadata.peer());
        self.emit(EventRecord::UnrecognizedMethod {
            timestamp: now(),
            src_addr,
            sport,
            method: metadata.method().to_string(),
            path: metadata.path().to_owned(),
        });
    }

    /// Final accounting for a session that lost its connection.
    pub fn disconnect(&self, session: &Session, duration: Duration) {
        let (src_addr, sport) = src(session.peer());
        let total_bytes = session.bytes_transferred();
        let total_mb = megabytes(total_bytes);
        let duration_text = format_duration(duration);
        let summary = format!(
            "Client {}:{}. Finished connection. Total Transfer: {:.3} MB, Duration: {}",
            src_addr, sport, total_mb, duration_text
        );
        self.emit(EventRecord::Disconnect {
            timestamp: now(),
            src_addr,
            sport,
            total_mb,
            total_bytes,
            duration: duration_text,
            duration_ms: duration.as_millis() as u64,
            summary,
        });
    }

    pub fn emit(&self, record: EventRecord) {
        if let Err(err) = self.sink.write(&record) {
            debug!("Dropped event {:?}: {}", record, err);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metadata::{PeerMetadata, RequestInfoMetadata};
    use crate::session::{RequestSummary, SessionRegistry};
    use hyper::Method;
    use serde_json::{json, Value};

    #[derive(Debug)]
    struct BrokenSink;

    impl EventSink for BrokenSink {
        fn write(&self, _record: &EventRecord) -> Result<(), SinkError> {
            Err(SinkError::Unavailable)
        }
    }

    fn metadata(user_agent: Option<&str>) -> ClientMetadata {
        ClientMetadata::new(
            PeerMetadata::new("127.0.0.1:59728".parse().unwrap()),
            user_agent.map(String::from),
            RequestInfoMetadata::new(Method::GET, String::from("/robots.txt")),
        )
    }

    fn to_json(record: &EventRecord) -> Value {
        serde_json::to_value(record).unwrap()
    }

    #[test]
    fn test_server_online_fields() {
        let sink = MemorySink::default();
        let logger = EventLogger::new(sink.clone());
        logger.server_online(8800);

        let records = sink.records();
        let value = to_json(&records[0]);
        assert_eq!(value["MessageType"], json!("Server"));
        assert_eq!(value["Status"], json!("online"));
        assert_eq!(value["Sport"], json!(8800));
        assert!(value["Timestamp"].is_string());
    }

    #[test]
    fn test_request_fields() {
        let sink = MemorySink::default();
        let logger = EventLogger::new(sink.clone());
        logger.request(&metadata(Some("curl/7.68.0")));

        let value = to_json(&sink.records()[0]);
        assert_eq!(value["MessageType"], json!("Data"));
        assert_eq!(value["SrcAddr"], json!("127.0.0.1"));
        assert_eq!(value["Sport"], json!(59728));
        assert_eq!(value["User-Agent"], json!("curl/7.68.0"));
        assert_eq!(value["Method"], json!("GET"));
        assert_eq!(value["Path"], json!("/robots.txt"));
        assert_eq!(value.as_object().unwrap().len(), 7);
    }

    #[test]
    fn test_request_without_user_agent() {
        let sink = MemorySink::default();
        let logger = EventLogger::new(sink.clone());
        logger.request(&metadata(None));

        let value = to_json(&sink.records()[0]);
        assert_eq!(value["User-Agent"], json!("Empty"));
    }

    #[test]
    fn test_disconnect_fields() {
        let sink = MemorySink::default();
        let logger = EventLogger::new(sink.clone());
        let registry = SessionRegistry::new();
        let session = registry
            .create(
                "10.0.0.2:40000".parse().unwrap(),
                RequestSummary::new("GET".into(), "/".into(), "Empty".into()),
            )
            .unwrap();
        session.record_transfer(3 * 1024 * 1024);
        logger.disconnect(&session, Duration::from_millis(2500));

        let value = to_json(&sink.records()[0]);
        assert_eq!(value["MessageType"], json!("Disconnect"));
        assert_eq!(value["SrcAddr"], json!("10.0.0.2"));
        assert_eq!(value["Sport"], json!(40000));
        assert_eq!(value["TotalMB"], json!(3.0));
        assert_eq!(value["TotalBytes"], json!(3 * 1024 * 1024));
        assert_eq!(value["Duration"], json!("0:00:02.500000"));
        assert_eq!(value["DurationMs"], json!(2500));
        assert_eq!(
            value["Summary"],
            json!("Client 10.0.0.2:40000. Finished connection. Total Transfer: 3.000 MB, Duration: 0:00:02.500000")
        );
    }

    #[test]
    fn test_broken_sink_is_swallowed() {
        let logger = EventLogger::new(BrokenSink);
        logger.server_online(8800);
        logger.request(&metadata(None));
        logger.unrecognized_method(&metadata(None));
    }
}
