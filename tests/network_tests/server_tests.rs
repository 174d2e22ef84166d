//! Server Tests
//!
//! These tests verify, over real loopback sockets:
//! - Request/response exchanges through the listener and pool
//! - Silent close on truncated frames (no hang, no response)
//! - Concurrent uploads under both pool strategies
//! - Cooperative shutdown
//! - Process pool recovery from dying workers (unix)

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use filewire::config::{Config, PoolStrategy};
use filewire::network::{Server, ShutdownHandle};
use filewire::protocol::{encode_content, read_frame, write_frame, Response};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct RunningServer {
    addr: SocketAddr,
    handle: ShutdownHandle,
    thread: Option<JoinHandle<filewire::Result<()>>>,
    dir: TempDir,
}

impl RunningServer {
    fn start(strategy: PoolStrategy, workers: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let mut builder = Config::builder()
            .service_dir(dir.path())
            .listen_addr("127.0.0.1:0")
            .workers(workers)
            .pool_strategy(strategy)
            .accept_poll_interval_ms(10)
            .read_timeout_ms(5_000)
            .write_timeout_ms(5_000);
        if strategy == PoolStrategy::Process {
            builder = builder.worker_program(env!("CARGO_BIN_EXE_filewire-server"));
        }

        Self::start_with(builder.build(), dir)
    }

    fn start_with(config: Config, dir: TempDir) -> Self {
        let mut server = Server::new(config);
        let addr = server.bind().unwrap();
        let handle = server.shutdown_handle();
        let thread = thread::spawn(move || server.run());

        Self {
            addr,
            handle,
            thread: Some(thread),
            dir,
        }
    }

    fn request(&self, text: &str) -> Response {
        let mut stream = TcpStream::connect(self.addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        write_frame(&mut stream, text.as_bytes()).unwrap();
        let payload = read_frame(&mut stream).unwrap();
        Response::from_json(&payload).unwrap()
    }

    fn stop(mut self) {
        self.handle.shutdown();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap().unwrap();
        }
    }
}

fn upload_text(name: &str, content: &[u8]) -> String {
    format!("UPLOAD {} {}", name, encode_content(content))
}

fn concurrent_distinct_uploads(server: &RunningServer, clients: usize) {
    thread::scope(|scope| {
        for i in 0..clients {
            scope.spawn(move || {
                let content = vec![i as u8; 50_000 + i];
                let response = server.request(&upload_text(&format!("f{i}.bin"), &content));
                assert!(response.is_ok(), "upload {i} failed: {response:?}");
            });
        }
    });

    for i in 0..clients {
        let content = vec![i as u8; 50_000 + i];
        assert_eq!(
            server.request(&format!("GET f{i}.bin")),
            Response::file(format!("f{i}.bin"), &content)
        );
    }
}

fn concurrent_same_name_uploads(server: &RunningServer, clients: usize) {
    const SIZE: usize = 200_000;
    thread::scope(|scope| {
        for fill in 0..clients {
            scope.spawn(move || {
                let response = server.request(&upload_text("same.bin", &vec![fill as u8; SIZE]));
                assert!(response.is_ok(), "upload failed: {response:?}");
            });
        }
    });

    let content = std::fs::read(server.dir.path().join("same.bin")).unwrap();
    assert_eq!(content.len(), SIZE);
    assert!(content.iter().all(|&b| b == content[0]), "content is torn");
}

// =============================================================================
// Thread Pool Tests
// =============================================================================

#[test]
fn test_basic_exchanges() {
    let server = RunningServer::start(PoolStrategy::Thread, 2);

    assert_eq!(server.request("LIST"), Response::listing(vec![]));
    assert_eq!(
        server.request("FOOBAR"),
        Response::error("Unknown command: foobar")
    );
    assert_eq!(
        server.request("GET missing.txt"),
        Response::error("File missing.txt does not exist")
    );
    assert!(server.request(&upload_text("a.txt", b"hello")).is_ok());
    assert_eq!(
        server.request("LIST"),
        Response::listing(vec!["a.txt".to_string()])
    );

    server.stop();
}

#[test]
fn test_truncated_frame_closes_without_response() {
    let server = RunningServer::start(PoolStrategy::Thread, 1);

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    stream.write_all(&100u32.to_be_bytes()).unwrap();
    stream.write_all(b"LIST").unwrap();
    stream.shutdown(Shutdown::Write).unwrap();

    let started = Instant::now();
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty(), "server must not answer a truncated frame");
    assert!(started.elapsed() < Duration::from_secs(5));

    // One bad connection does not affect the next
    assert_eq!(server.request("LIST"), Response::listing(vec![]));
    server.stop();
}

#[test]
fn test_stalled_client_is_dropped_after_timeout() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .service_dir(dir.path())
        .listen_addr("127.0.0.1:0")
        .workers(1)
        .accept_poll_interval_ms(10)
        .read_timeout_ms(200)
        .build();
    let server = RunningServer::start_with(config, dir);

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    stream.write_all(&[0x00, 0x00]).unwrap();

    let started = Instant::now();
    let mut rest = Vec::new();
    let _ = stream.read_to_end(&mut rest);
    assert!(rest.is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));

    // The single worker is free again
    assert_eq!(server.request("LIST"), Response::listing(vec![]));
    server.stop();
}

#[test]
fn test_thread_pool_concurrent_distinct_uploads() {
    let server = RunningServer::start(PoolStrategy::Thread, 4);
    concurrent_distinct_uploads(&server, 12);
    server.stop();
}

#[test]
fn test_thread_pool_concurrent_same_name_uploads() {
    let server = RunningServer::start(PoolStrategy::Thread, 4);
    concurrent_same_name_uploads(&server, 8);
    server.stop();
}

#[test]
fn test_shutdown_waits_for_queued_connections() {
    let server = RunningServer::start(PoolStrategy::Thread, 1);

    // Open several connections, then request shutdown before sending
    let mut streams: Vec<TcpStream> = (0..3)
        .map(|_| TcpStream::connect(server.addr).unwrap())
        .collect();
    thread::sleep(Duration::from_millis(300));

    let handle = server.handle.clone();
    handle.shutdown();

    for stream in &mut streams {
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        write_frame(stream, b"LIST").unwrap();
        let payload = read_frame(stream).unwrap();
        assert_eq!(Response::from_json(&payload).unwrap(), Response::listing(vec![]));
    }

    server.stop();
}

#[test]
fn test_zero_workers_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .service_dir(dir.path())
        .listen_addr("127.0.0.1:0")
        .workers(0)
        .build();

    let mut server = Server::new(config);
    assert!(server.run().is_err());
}

// =============================================================================
// Process Pool Tests
// =============================================================================

#[cfg(unix)]
#[test]
fn test_process_pool_basic_exchanges() {
    let server = RunningServer::start(PoolStrategy::Process, 2);

    assert_eq!(server.request("LIST"), Response::listing(vec![]));
    assert!(server.request(&upload_text("p.txt", b"from a worker")).is_ok());
    assert_eq!(
        server.request("GET p.txt"),
        Response::file("p.txt", b"from a worker")
    );

    server.stop();
}

#[cfg(unix)]
#[test]
fn test_process_pool_concurrent_distinct_uploads() {
    let server = RunningServer::start(PoolStrategy::Process, 4);
    concurrent_distinct_uploads(&server, 12);
    server.stop();
}

#[cfg(unix)]
#[test]
fn test_process_pool_concurrent_same_name_uploads() {
    let server = RunningServer::start(PoolStrategy::Process, 4);
    concurrent_same_name_uploads(&server, 8);
    server.stop();
}

#[cfg(unix)]
#[test]
fn test_process_pool_survives_dying_workers() {
    use filewire::config::Timeouts;
    use filewire::network::{WorkerPool, WorkerSpawner};
    use std::net::TcpListener;

    // `true` ignores its arguments and exits at once, like a crashing worker
    let dir = TempDir::new().unwrap();
    let timeouts = Timeouts {
        read: Some(Duration::from_secs(5)),
        write: Some(Duration::from_secs(5)),
    };
    let spawner = WorkerSpawner::new("true", dir.path(), timeouts);
    let pool = WorkerPool::processes(1, 4, spawner).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    for _ in 0..3 {
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        let (accepted, _) = listener.accept().unwrap();
        pool.submit(accepted).unwrap();

        // The connection is lost with its worker: the client sees it close
        let mut rest = Vec::new();
        let _ = client.read_to_end(&mut rest);
        assert!(rest.is_empty());
    }

    // Still accepting work and shuts down cleanly
    assert_eq!(pool.worker_count(), 1);
    pool.shutdown();
}
