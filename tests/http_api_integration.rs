//! Integration tests for the geo lookup HTTP API
//!
//! Runs the real server on a loopback port over in-memory backends and
//! talks plain HTTP/1.1 to it.

use geoserve::{
    AccessLogger, ApiServer, ApiState, AsyncLogSink, CapabilityRegistry, DatabaseMetadata,
    GeoBackend, GeoRecord, LookupError, LookupService, QueryKind, ShutdownController,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// In-memory database answering a fixed table of addresses.
struct TableBackend {
    database_type: &'static str,
    kinds: Vec<QueryKind>,
    rows: Vec<(IpAddr, GeoRecord)>,
}

impl GeoBackend for TableBackend {
    fn lookup(&self, kind: QueryKind, ip: Option<IpAddr>) -> Result<GeoRecord, LookupError> {
        if !self.kinds.contains(&kind) {
            return Err(LookupError::UnsupportedKind(kind));
        }
        let ip = ip.ok_or(LookupError::InvalidAddress)?;
        self.rows
            .iter()
            .find(|(addr, _)| *addr == ip)
            .map(|(_, record)| record.clone())
            .ok_or(LookupError::AddressNotFound(ip))
    }

    fn metadata(&self) -> DatabaseMetadata {
        DatabaseMetadata::new(self.database_type)
    }
}

fn city_backend() -> Arc<dyn GeoBackend> {
    Arc::new(TableBackend {
        database_type: "GeoIP2-City",
        kinds: vec![QueryKind::City, QueryKind::Country],
        rows: vec![
            (
                "203.0.113.5".parse().unwrap(),
                serde_json::json!({ "country": "Example" }),
            ),
            (
                "2001:db8::5".parse().unwrap(),
                serde_json::json!({ "country": "Example v6" }),
            ),
        ],
    })
}

fn isp_backend() -> Arc<dyn GeoBackend> {
    Arc::new(TableBackend {
        database_type: "GeoIP2-ISP",
        kinds: vec![QueryKind::Isp],
        rows: vec![(
            "203.0.113.5".parse().unwrap(),
            serde_json::json!({ "isp": "Example Transit", "autonomous_system_number": 64496 }),
        )],
    })
}

struct TestServer {
    addr: SocketAddr,
    shutdown: ShutdownController,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start(registry: CapabilityRegistry, access_log: AccessLogger) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownController::new();
        let state = ApiState::new(
            LookupService::new(Arc::new(registry)),
            access_log,
            shutdown.clone(),
        );
        let server = ApiServer::new(addr.to_string(), state);
        let handle = tokio::spawn(async move { server.serve(listener).await });

        Self {
            addr,
            shutdown,
            handle,
        }
    }

    async fn stop(self) {
        self.shutdown.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(2), self.handle)
            .await
            .expect("server did not stop");
        result.unwrap().unwrap();
    }
}

struct RawResponse {
    status: u16,
    headers: String,
    body: Vec<u8>,
}

/// Minimal HTTP/1.1 GET over a fresh connection.
async fn http_get(addr: SocketAddr, path: &str) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();

    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no header terminator");
    let head = String::from_utf8(raw[..split].to_vec()).unwrap();
    let body = raw[split + 4..].to_vec();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("no status code");

    RawResponse {
        status,
        headers: head.to_lowercase(),
        body,
    }
}

/// City lookup through the real server returns the record verbatim
#[tokio::test]
async fn test_city_lookup_end_to_end() {
    let registry = CapabilityRegistry::build(&[city_backend(), isp_backend()]);
    let server = TestServer::start(registry, AccessLogger::stdout()).await;

    let resp = http_get(server.addr, "/v1/geo/city/203.0.113.5").await;

    assert_eq!(resp.status, 200);
    assert!(resp.headers.contains("content-type: application/json"));
    let json: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(json, serde_json::json!({ "country": "Example" }));

    server.stop().await;
}

/// IPv6 literals are accepted in the path
#[tokio::test]
async fn test_ipv6_lookup_end_to_end() {
    let registry = CapabilityRegistry::build(&[city_backend()]);
    let server = TestServer::start(registry, AccessLogger::stdout()).await;

    let resp = http_get(server.addr, "/v1/geo/country/2001:db8::5").await;

    assert_eq!(resp.status, 200);
    let json: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(json["country"], "Example v6");

    server.stop().await;
}

/// Records from the merged second database are reachable
#[tokio::test]
async fn test_isp_lookup_from_second_backend() {
    let registry = CapabilityRegistry::build(&[city_backend(), isp_backend()]);
    let server = TestServer::start(registry, AccessLogger::stdout()).await;

    let resp = http_get(server.addr, "/v1/geo/isp/203.0.113.5").await;

    assert_eq!(resp.status, 200);
    let json: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(json["autonomous_system_number"], 64496);

    server.stop().await;
}

/// Status codes for every failure class, all with empty bodies
#[tokio::test]
async fn test_error_statuses_end_to_end() {
    let registry = CapabilityRegistry::build(&[city_backend(), isp_backend()]);
    let server = TestServer::start(registry, AccessLogger::stdout()).await;

    let cases = [
        ("/v1/geo/bogus/203.0.113.5", 404),
        ("/v1/geo/domain/203.0.113.5", 501),
        ("/v1/geo/anonymousip/203.0.113.5", 501),
        ("/v1/geo/city/not-an-ip", 400),
        ("/v1/geo/city/198.51.100.1", 400),
    ];

    for (path, expected) in cases {
        let resp = http_get(server.addr, path).await;
        assert_eq!(resp.status, expected, "path: {}", path);
        assert!(resp.body.is_empty(), "path: {}", path);
    }

    server.stop().await;
}

/// Single-backend mode reports unsupported kinds at request time
#[tokio::test]
async fn test_single_mode_end_to_end() {
    let registry = CapabilityRegistry::universal(city_backend());
    let server = TestServer::start(registry, AccessLogger::stdout()).await;

    assert_eq!(http_get(server.addr, "/v1/geo/city/203.0.113.5").await.status, 200);
    assert_eq!(http_get(server.addr, "/v1/geo/isp/203.0.113.5").await.status, 501);

    let resp = http_get(server.addr, "/v1/metadata").await;
    assert_eq!(resp.status, 200);
    let json: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(json["database_type"], "GeoIP2-City");

    server.stop().await;
}

/// Metadata in probed mode is keyed by kind
#[tokio::test]
async fn test_metadata_end_to_end() {
    let registry = CapabilityRegistry::build(&[city_backend(), isp_backend()]);
    let server = TestServer::start(registry, AccessLogger::stdout()).await;

    let resp = http_get(server.addr, "/v1/metadata").await;

    assert_eq!(resp.status, 200);
    assert!(resp.headers.contains("content-type: application/json"));
    let json: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["city", "country", "isp"]);

    server.stop().await;
}

/// Access log lines land in the file with the client address
#[tokio::test]
async fn test_access_log_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    let logger = AccessLogger::open_file(path.to_str().unwrap(), 100).unwrap();

    let registry = CapabilityRegistry::build(&[city_backend()]);
    let server = TestServer::start(registry, logger.clone()).await;

    http_get(server.addr, "/v1/geo/city/203.0.113.5").await;
    http_get(server.addr, "/v1/geo/isp/203.0.113.5").await;
    server.stop().await;

    tokio::task::spawn_blocking(move || logger.close())
        .await
        .unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("127.0.0.1 - - ["));
    assert!(lines[0].ends_with("\"GET /v1/geo/city/203.0.113.5 HTTP/1.1\" 200 21"));
    assert!(lines[1].ends_with("\"GET /v1/geo/isp/203.0.113.5 HTTP/1.1\" 501 0"));
}

/// A saturated access log never turns into a failed request
#[tokio::test]
async fn test_saturated_access_log_does_not_affect_responses() {
    struct StalledWriter;
    impl std::io::Write for StalledWriter {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(500));
            Err(std::io::Error::new(std::io::ErrorKind::Other, "slow disk"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let sink = AsyncLogSink::new(StalledWriter, 1).unwrap();
    let logger = AccessLogger::with_sink(sink.clone());
    let registry = CapabilityRegistry::build(&[city_backend()]);
    let server = TestServer::start(registry, logger).await;

    for _ in 0..5 {
        let resp = http_get(server.addr, "/v1/geo/city/203.0.113.5").await;
        assert_eq!(resp.status, 200);
    }
    assert!(sink.dropped() >= 1);

    server.stop().await;
}

/// Database that takes `delay` to answer every lookup.
struct SlowBackend {
    delay: Duration,
}

impl GeoBackend for SlowBackend {
    fn lookup(&self, kind: QueryKind, ip: Option<IpAddr>) -> Result<GeoRecord, LookupError> {
        if kind != QueryKind::City {
            return Err(LookupError::UnsupportedKind(kind));
        }
        let ip = ip.ok_or(LookupError::InvalidAddress)?;
        std::thread::sleep(self.delay);
        Ok(serde_json::json!({ "ip": ip.to_string() }))
    }

    fn metadata(&self) -> DatabaseMetadata {
        DatabaseMetadata::new("Slow-City")
    }
}

/// Serve over a slow backend with a drain deadline; returns the address,
/// the controller and the server's drained flag.
async fn start_draining(
    delay: Duration,
    drain_timeout: Duration,
) -> (
    SocketAddr,
    ShutdownController,
    tokio::task::JoinHandle<anyhow::Result<bool>>,
) {
    let backend: Arc<dyn GeoBackend> = Arc::new(SlowBackend { delay });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownController::new();
    let state = ApiState::new(
        LookupService::new(Arc::new(CapabilityRegistry::universal(backend))),
        AccessLogger::stdout(),
        shutdown.clone(),
    );
    let server = ApiServer::new(addr.to_string(), state);
    let handle =
        tokio::spawn(async move { server.serve_until_drained(listener, drain_timeout).await });
    (addr, shutdown, handle)
}

/// A request in progress at shutdown still gets its full response
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_drains_in_flight_request() {
    let (addr, shutdown, handle) =
        start_draining(Duration::from_millis(300), Duration::from_secs(5)).await;

    let client = tokio::spawn(async move { http_get(addr, "/v1/geo/city/203.0.113.5").await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.shutdown();

    let resp = client.await.unwrap();
    assert_eq!(resp.status, 200);
    let json: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(json["ip"], "203.0.113.5");

    let drained = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    assert!(drained);
    assert_eq!(shutdown.in_flight(), 0);
}

/// A request outliving the drain deadline does not hold the server up
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_gives_up_after_drain_timeout() {
    let (addr, shutdown, handle) =
        start_draining(Duration::from_millis(1500), Duration::from_millis(100)).await;

    let _client = tokio::spawn(async move { http_get(addr, "/v1/geo/city/203.0.113.5").await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.shutdown();

    let drained = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("drain timeout was not honoured")
        .unwrap()
        .unwrap();
    assert!(!drained);
}
