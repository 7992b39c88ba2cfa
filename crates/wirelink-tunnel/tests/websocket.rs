//! End-to-end tests for the WebSocket variants.

mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use wirelink_link::{TlsClientLink, TlsMethod, WsClientLink, WsLink, WssClientLink, WssLink};
use wirelink_tunnel::{WsClientHost, WsHost, WssClientHost, WssHost};

use common::{free_port, init_tracing, local_addr, started_host};

const WAIT: Duration = Duration::from_secs(10);

#[tokio::test(flavor = "multi_thread")]
async fn ws_host_relays_frames_to_the_backend() {
    init_tracing();
    let io = started_host(2);

    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_port = backend.local_addr().unwrap().port();
    let listen_port = free_port();

    let host = WsHost::new(
        io.clone(),
        WsLink {
            local: local_addr(listen_port),
            remote: local_addr(backend_port),
            path: "/relay".to_string(),
        },
    )
    .unwrap();
    host.run().unwrap();

    let url = format!("ws://127.0.0.1:{}/relay/v1?token=abc", listen_port);
    let stream = TcpStream::connect(("127.0.0.1", listen_port)).await.unwrap();
    let (mut ws, _) = timeout(WAIT, tokio_tungstenite::client_async(url, stream))
        .await
        .unwrap()
        .unwrap();
    let (mut server, _) = timeout(WAIT, backend.accept()).await.unwrap().unwrap();

    ws.send(Message::Binary(b"frame in".to_vec())).await.unwrap();
    let mut buf = [0u8; 8];
    timeout(WAIT, server.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"frame in");

    server.write_all(b"bytes back").await.unwrap();
    let reply = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(reply.into_data(), b"bytes back".to_vec());

    host.close();
    io.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn ws_host_rejects_a_mismatched_path() {
    init_tracing();
    let io = started_host(2);

    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_port = backend.local_addr().unwrap().port();
    let listen_port = free_port();

    let host = WsHost::new(
        io.clone(),
        WsLink {
            local: local_addr(listen_port),
            remote: local_addr(backend_port),
            path: "/relay".to_string(),
        },
    )
    .unwrap();
    host.run().unwrap();

    let url = format!("ws://127.0.0.1:{}/relayv2", listen_port);
    let stream = TcpStream::connect(("127.0.0.1", listen_port)).await.unwrap();
    let result = timeout(WAIT, tokio_tungstenite::client_async(url, stream))
        .await
        .unwrap();
    assert!(result.is_err(), "handshake must not complete");

    // If the outbound connect won the race it must have been torn down
    // again without carrying any bytes.
    if let Ok(Ok((mut server, _))) = timeout(Duration::from_secs(2), backend.accept()).await {
        let mut buf = Vec::new();
        let n = timeout(WAIT, server.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    host.close();
    io.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn ws_client_host_frames_raw_bytes() {
    init_tracing();
    let io = started_host(2);

    // Test-side WebSocket server standing in for the remote peer.
    let ws_server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_port = ws_server.local_addr().unwrap().port();
    let listen_port = free_port();

    let server_task = tokio::spawn(async move {
        let (stream, _) = ws_server.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let msg = ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data(), b"raw request".to_vec());
        ws.send(Message::Binary(b"framed reply".to_vec()))
            .await
            .unwrap();
        ws
    });

    let host = WsClientHost::new(
        io.clone(),
        WsClientLink {
            local: local_addr(listen_port),
            remote: local_addr(ws_port),
            path: "  ".to_string(), // normalizes to "/"
            sni: String::new(),
        },
    )
    .unwrap();
    host.run().unwrap();

    let mut client = TcpStream::connect(("127.0.0.1", listen_port)).await.unwrap();
    client.write_all(b"raw request").await.unwrap();

    let mut buf = [0u8; 12];
    timeout(WAIT, client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"framed reply");

    timeout(WAIT, server_task).await.unwrap().unwrap();
    host.close();
    io.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn wss_host_relays_over_tls() {
    init_tracing();
    let io = started_host(2);

    let (cert_path, key_path) = self_signed_files("wss-host");
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_port = backend.local_addr().unwrap().port();
    let listen_port = free_port();

    let host = WssHost::new(
        io.clone(),
        WssLink {
            local: local_addr(listen_port),
            remote: local_addr(backend_port),
            sni: String::new(),
            path: "/secure".to_string(),
            cert_file: cert_path,
            key_file: key_path,
            key_pass: String::new(),
            method: TlsMethod::Tls,
            cipher_suites: String::new(),
        },
    )
    .unwrap();
    host.run().unwrap();

    // Client side: TLS without verification (self-signed server), then the
    // upgrade over the established stream.
    let connector = tokio_rustls::TlsConnector::from(Arc::new(insecure_client_config()));
    let stream = TcpStream::connect(("127.0.0.1", listen_port)).await.unwrap();
    let tls = timeout(
        WAIT,
        connector.connect("localhost".try_into().unwrap(), stream),
    )
    .await
    .unwrap()
    .unwrap();

    let url = format!("wss://localhost:{}/secure", listen_port);
    let (mut ws, _) = timeout(WAIT, tokio_tungstenite::client_async(url, tls))
        .await
        .unwrap()
        .unwrap();
    let (mut server, _) = timeout(WAIT, backend.accept()).await.unwrap().unwrap();

    ws.send(Message::Binary(b"over tls".to_vec())).await.unwrap();
    let mut buf = [0u8; 8];
    timeout(WAIT, server.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"over tls");

    server.write_all(b"and back").await.unwrap();
    let reply = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(reply.into_data(), b"and back".to_vec());

    host.close();
    io.close();
}

fn wss_client_link(listen_port: u16, remote_port: u16, sni: &str) -> WssClientLink {
    WssClientLink {
        tls: TlsClientLink {
            local: local_addr(listen_port),
            remote: local_addr(remote_port),
            sni: sni.to_string(),
            method: TlsMethod::default(),
            cipher_suites: String::new(),
        },
        path: "/relay".to_string(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn wss_client_failed_tls_handshake_relays_nothing() {
    init_tracing();
    let io = started_host(2);

    // A backend that is not a TLS server: the outbound handshake fails
    // before any upgrade request and the inbound connection is closed with
    // zero bytes delivered.
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_port = backend.local_addr().unwrap().port();
    let listen_port = free_port();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = backend.accept().await {
            let _ = socket.write_all(b"plain text, not a server hello").await;
        }
    });

    let host = WssClientHost::new(
        io.clone(),
        wss_client_link(listen_port, backend_port, "localhost"),
    )
    .unwrap();
    host.run().unwrap();

    let mut client = TcpStream::connect(("127.0.0.1", listen_port)).await.unwrap();
    client.write_all(b"hello?").await.unwrap();
    let mut buf = Vec::new();
    let n = timeout(WAIT, client.read_to_end(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0, "no bytes may cross a tunnel that never established");

    host.close();
    io.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn wss_client_refuses_an_untrusted_server_certificate() {
    init_tracing();
    let io = started_host(2);

    // A real TLS server, but self-signed: certificate verification fails,
    // so the handshake must abort before a websocket request is ever sent.
    let (cert_path, key_path) = self_signed_files("wss-client");
    let config =
        wirelink_tls::server_config(TlsMethod::Tls, &cert_path, &key_path, "", "").unwrap();
    let acceptor = tokio_rustls::TlsAcceptor::from(config);

    let tls_server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_port = tls_server.local_addr().unwrap().port();
    let listen_port = free_port();

    let server_task = tokio::spawn(async move {
        let (stream, _) = tls_server.accept().await.unwrap();
        acceptor.accept(stream).await
    });

    let host = WssClientHost::new(
        io.clone(),
        wss_client_link(listen_port, server_port, "localhost"),
    )
    .unwrap();
    host.run().unwrap();

    let mut client = TcpStream::connect(("127.0.0.1", listen_port)).await.unwrap();
    client.write_all(b"hello?").await.unwrap();
    let mut buf = Vec::new();
    let n = timeout(WAIT, client.read_to_end(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);

    let handshake = timeout(WAIT, server_task).await.unwrap().unwrap();
    assert!(handshake.is_err(), "server must see the handshake abort");

    host.close();
    io.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn wss_client_host_rejects_invalid_sni() {
    init_tracing();
    let io = started_host(1);

    let result = WssClientHost::new(
        io.clone(),
        wss_client_link(free_port(), 443, "not a host name"),
    );
    assert!(result.is_err());

    io.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn wss_host_requires_certificate_files() {
    init_tracing();
    let io = started_host(1);

    let result = WssHost::new(
        io.clone(),
        WssLink {
            local: local_addr(free_port()),
            remote: local_addr(80),
            sni: String::new(),
            path: "/".to_string(),
            cert_file: String::new(),
            key_file: String::new(),
            key_pass: String::new(),
            method: TlsMethod::default(),
            cipher_suites: String::new(),
        },
    );
    assert!(result.is_err());

    io.close();
}

fn self_signed_files(tag: &str) -> (String, String) {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let dir = std::env::temp_dir();
    let cert_path = dir.join(format!("wirelink-test-{}-{}.crt", tag, std::process::id()));
    let key_path = dir.join(format!("wirelink-test-{}-{}.key", tag, std::process::id()));
    std::fs::File::create(&cert_path)
        .unwrap()
        .write_all(cert.cert.pem().as_bytes())
        .unwrap();
    std::fs::File::create(&key_path)
        .unwrap()
        .write_all(cert.key_pair.serialize_pem().as_bytes())
        .unwrap();
    (
        cert_path.to_string_lossy().into_owned(),
        key_path.to_string_lossy().into_owned(),
    )
}

fn insecure_client_config() -> rustls::ClientConfig {
    let _ = rustls::crypto::ring::default_provider().install_default();
    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(SkipVerification))
        .with_no_client_auth()
}

#[derive(Debug)]
struct SkipVerification;

impl rustls::client::danger::ServerCertVerifier for SkipVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        use rustls::SignatureScheme;
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}
