use driptrap::events::{EventLogger, EventRecord, MemorySink, ServerStatus};
use driptrap::session::{SessionRegistry, SessionState};
use driptrap::{
    ContentType, DashboardConfig, DripTrapConfig, DripTrapServer, ServerError, TarpitConfig,
};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

const TICK: Duration = Duration::from_millis(10);
const PATIENCE: Duration = Duration::from_secs(5);

struct Harness {
    addr: SocketAddr,
    registry: SessionRegistry,
    sink: MemorySink,
}

fn config(addr: SocketAddr) -> DripTrapConfig {
    DripTrapConfig::new(
        addr,
        TarpitConfig::new(TICK, 10, ContentType::default()),
        DashboardConfig::default(),
    )
}

async fn start() -> Harness {
    let registry = SessionRegistry::new();
    let sink = MemorySink::default();
    let server = DripTrapServer::new(
        config(SocketAddr::from(([127, 0, 0, 1], 0))),
        registry.clone(),
        EventLogger::new(sink.clone()),
    )
    .bind()
    .await
    .expect("could not bind test server");
    let addr = server.local_addr();
    tokio::spawn(server.serve(std::future::pending()));
    Harness {
        addr,
        registry,
        sink,
    }
}

async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = timeout(PATIENCE, async {
        while !check().await {
            sleep(TICK).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {}", what);
}

async fn send(addr: SocketAddr, method: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{} / HTTP/1.1\r\nHost: localhost\r\nUser-Agent: driptrap-test\r\n\r\n",
        method
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    stream
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .filter(|window| *window == needle)
        .count()
}

#[tokio::test]
async fn test_get_is_drip_fed_until_disconnect() {
    let harness = start().await;
    let mut stream = send(harness.addr, "GET").await;
    let port = stream.local_addr().unwrap().port();

    let mut received = Vec::new();
    let mut buf = [0u8; 8192];
    let read = timeout(PATIENCE, async {
        while count(&received, b"<!DOCTYPE") < 3 {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "server closed a trapped connection");
            received.extend_from_slice(&buf[..n]);
        }
    })
    .await;
    assert!(read.is_ok(), "did not receive three chunks");

    let head = String::from_utf8_lossy(&received).to_lowercase();
    assert!(head.starts_with("http/1.1 200 ok"));
    assert!(head.contains("connection: keep-alive"));
    assert!(head.contains("transfer-encoding: chunked"));

    let session = harness.registry.snapshot().pop().expect("no live session");
    assert_eq!(session.peer().port(), port);
    assert_eq!(session.state(), SessionState::Trapping);
    assert!(session.bytes_transferred() > 0);

    drop(stream);
    let registry = harness.registry.clone();
    eventually("session removal", || {
        let registry = registry.clone();
        async move { registry.is_empty() }
    })
    .await;

    let records = harness.sink.records();
    assert!(records.iter().any(|record| matches!(
        record,
        EventRecord::Disconnect { sport, total_bytes, .. } if *sport == port && *total_bytes > 0
    )));
    assert!(records.iter().any(|record| matches!(
        record,
        EventRecord::Request { user_agent, method, .. }
            if user_agent == "driptrap-test" && method == "GET"
    )));
}

#[tokio::test]
async fn test_unrecognized_method_is_dropped() {
    let harness = start().await;
    let mut stream = send(harness.addr, "DELETE").await;

    let mut received = Vec::new();
    let read = timeout(PATIENCE, stream.read_to_end(&mut received)).await;
    assert!(read.is_ok(), "connection was not closed");
    assert!(received.is_empty());

    let registry = harness.registry.clone();
    eventually("session removal", || {
        let registry = registry.clone();
        async move { registry.is_empty() }
    })
    .await;
    let records = harness.sink.records();
    assert!(records.iter().any(|record| matches!(
        record,
        EventRecord::UnrecognizedMethod { method, .. } if method == "DELETE"
    )));
    assert!(records.iter().any(|record| matches!(
        record,
        EventRecord::Disconnect { total_bytes: 0, .. }
    )));
}

#[tokio::test]
async fn test_head_is_held_without_data() {
    let harness = start().await;
    let mut stream = send(harness.addr, "HEAD").await;

    let registry = harness.registry.clone();
    eventually("probe session", || {
        let registry = registry.clone();
        async move {
            registry
                .snapshot()
                .first()
                .map_or(false, |session| session.state() == SessionState::Probing)
        }
    })
    .await;

    let mut buf = [0u8; 1024];
    let read = timeout(TICK * 30, stream.read(&mut buf)).await;
    assert!(read.is_err(), "probe received data");
    let session = harness.registry.snapshot().pop().expect("probe was released");
    assert_eq!(session.bytes_transferred(), 0);
    assert_eq!(session.state(), SessionState::Probing);

    drop(stream);
    let registry = harness.registry.clone();
    eventually("session removal", || {
        let registry = registry.clone();
        async move { registry.is_empty() }
    })
    .await;
}

#[tokio::test]
async fn test_connections_get_their_own_rows() {
    let harness = start().await;
    let first = send(harness.addr, "GET").await;
    let registry = harness.registry.clone();
    eventually("first session", || {
        let registry = registry.clone();
        async move { registry.len() == 1 }
    })
    .await;
    let second = send(harness.addr, "POST").await;
    eventually("second session", || {
        let registry = registry.clone();
        async move { registry.len() == 2 }
    })
    .await;

    let first_port = first.local_addr().unwrap().port();
    let second_port = second.local_addr().unwrap().port();
    eventually("both sessions fed", || {
        let registry = registry.clone();
        async move {
            registry
                .snapshot()
                .iter()
                .all(|session| session.bytes_transferred() > 0)
        }
    })
    .await;

    let sessions = harness.registry.snapshot();
    assert_eq!(sessions[0].peer().port(), first_port);
    assert_eq!(sessions[1].peer().port(), second_port);
    assert!(sessions[0].display_row() < sessions[1].display_row());
    assert_eq!(sessions[1].request().method(), "POST");

    drop(first);
    eventually("first session removal", || {
        let registry = registry.clone();
        async move { registry.len() == 1 }
    })
    .await;
    let remaining = harness.registry.snapshot().pop().unwrap();
    assert_eq!(remaining.peer().port(), second_port);
    assert_eq!(remaining.state(), SessionState::Trapping);
}

#[tokio::test]
async fn test_server_online_is_reported() {
    let harness = start().await;
    assert!(harness.sink.records().iter().any(|record| matches!(
        record,
        EventRecord::Server { sport, .. } if *sport == harness.addr.port()
    )));
}

#[tokio::test]
async fn test_port_in_use_is_fatal() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap();
    let result = DripTrapServer::new(
        config(addr),
        SessionRegistry::new(),
        EventLogger::new(MemorySink::default()),
    )
    .run(std::future::pending())
    .await;
    assert!(matches!(result, Err(ServerError::Bind { addr: failed, .. }) if failed == addr));
}

#[tokio::test]
async fn test_shutdown_releases_sessions() {
    let registry = SessionRegistry::new();
    let sink = MemorySink::default();
    let server = DripTrapServer::new(
        config(SocketAddr::from(([127, 0, 0, 1], 0))),
        registry.clone(),
        EventLogger::new(sink.clone()),
    )
    .bind()
    .await
    .expect("could not bind test server");
    let addr = server.local_addr();
    let (stop, stopped) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve(async move {
        let _ = stopped.await;
    }));

    let _trapped = send(addr, "GET").await;
    let _held = send(addr, "HEAD").await;
    let watched = registry.clone();
    eventually("both sessions classified", || {
        let registry = watched.clone();
        async move {
            let sessions = registry.snapshot();
            sessions.len() == 2
                && sessions.iter().any(|s| s.state() == SessionState::Trapping)
                && sessions.iter().any(|s| s.state() == SessionState::Probing)
        }
    })
    .await;

    stop.send(()).unwrap();
    timeout(PATIENCE, serving)
        .await
        .expect("server did not shut down")
        .unwrap();

    assert!(registry.is_empty());
    let records = sink.records();
    let offline = records
        .iter()
        .position(|record| {
            matches!(
                record,
                EventRecord::Server {
                    status: ServerStatus::Offline,
                    ..
                }
            )
        })
        .expect("server offline not reported");
    assert_eq!(offline, records.len() - 1);
    let disconnects: Vec<_> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| matches!(record, EventRecord::Disconnect { .. }))
        .map(|(at, _)| at)
        .collect();
    assert_eq!(disconnects.len(), 2);
    assert!(disconnects.iter().all(|at| *at < offline));
}
