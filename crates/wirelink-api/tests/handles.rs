//! End-to-end tests of the handle surface.

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use wirelink_api::{
    cpu_platform, default_cipher_suites, new_io_host, new_tcp_forward_host, new_wss_host,
    release_io_host, release_tcp_forward_host, set_protect_hook, ProtectTarget,
    TcpForwardLinkConfig, WssLinkConfig,
};

const WAIT: Duration = Duration::from_secs(10);

fn localhost() -> IpAddr {
    "127.0.0.1".parse().unwrap()
}

fn free_port() -> i32 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port() as i32
}

fn forward_config(local_port: i32, remote_port: i32) -> TcpForwardLinkConfig {
    TcpForwardLinkConfig {
        local_host: localhost(),
        local_port,
        local_nagle: false,
        remote_host: localhost(),
        remote_port,
        remote_nagle: false,
    }
}

#[test]
fn unknown_handles_are_rejected() {
    assert!(!release_io_host(0));
    assert!(!release_tcp_forward_host(9_999_999));
    assert!(!set_protect_hook(9_999_999, None));
}

#[test]
fn out_of_range_ports_produce_no_handle() {
    let io = new_io_host(1).unwrap();
    for port in [0, -1, 65536, 100_000] {
        assert!(new_tcp_forward_host(io, &forward_config(port, 80)).is_none());
        assert!(new_tcp_forward_host(io, &forward_config(8080, port)).is_none());
    }
    assert!(release_io_host(io));
}

#[test]
fn listener_against_a_released_host_fails() {
    let io = new_io_host(1).unwrap();
    assert!(release_io_host(io));
    assert!(new_tcp_forward_host(io, &forward_config(free_port(), 80)).is_none());
}

#[test]
fn wss_listener_requires_certificate_files() {
    let io = new_io_host(1).unwrap();
    let config = WssLinkConfig {
        local_host: localhost(),
        local_port: free_port(),
        local_nagle: false,
        remote_host: localhost(),
        remote_port: 80,
        remote_nagle: false,
        host_sni: String::new(),
        path: "/".to_string(),
        ssl_cert_file: String::new(),
        ssl_key_file: String::new(),
        ssl_key_pass: String::new(),
        ssl_method: 1,
        ssl_cipher_suites: String::new(),
    };
    assert!(new_wss_host(io, &config).is_none());
    assert!(release_io_host(io));
}

#[tokio::test(flavor = "multi_thread")]
async fn forward_listener_relays_through_the_handle_surface() {
    let io = new_io_host(2).unwrap();

    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_port = backend.local_addr().unwrap().port() as i32;
    let listen_port = free_port();

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    assert!(set_protect_hook(
        io,
        Some(Arc::new(move |_target: &ProtectTarget| {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        })),
    ));

    let listener = new_tcp_forward_host(io, &forward_config(listen_port, backend_port)).unwrap();

    let mut client = TcpStream::connect(("127.0.0.1", listen_port as u16))
        .await
        .unwrap();
    let (mut server, _) = timeout(WAIT, backend.accept()).await.unwrap().unwrap();

    client.write_all(b"through the api").await.unwrap();
    let mut buf = [0u8; 15];
    timeout(WAIT, server.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"through the api");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Double release: only the first succeeds.
    assert!(release_tcp_forward_host(listener));
    assert!(!release_tcp_forward_host(listener));
    assert!(release_io_host(io));
    assert!(!release_io_host(io));
}

#[test]
fn platform_helpers_answer() {
    assert!(cpu_platform() >= 1);
    assert!(!default_cipher_suites().is_empty());
}
