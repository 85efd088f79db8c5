// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration coverage for the CONNECT-tunnel + TLS fingerprint path, driven
//! against loopback mock servers rather than a real proxy or origin.

use std::sync::{Arc, Once};

use pinfetch::{Client, Outcome};
use rcgen::{generate_simple_self_signed, CertifiedKey};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

static LOGGER_INIT: Once = Once::new();

/// Every test wants the connect/tunnel/handshake lifecycle logged, same as
/// the teacher's own binary wires `simple_logger` up at `main()` entry.
fn init_logging() {
    LOGGER_INIT.call_once(|| {
        let _ = simple_logger::init();
    });
}

fn fingerprint(der: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(der);
    hasher.finalize().into()
}

/// A mock proxy that accepts one CONNECT request, replies 200, then relays
/// raw bytes to a TLS-terminating origin it runs in-process.
async fn spawn_mock_proxy_and_origin(
    cert_der: Vec<u8>,
    key_der: Vec<u8>,
) -> (std::net::SocketAddr, String) {
    let origin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin_addr = origin_listener.local_addr().unwrap();

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_der));
    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![CertificateDer::from(cert_der)], key)
        .unwrap();
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server_config));

    tokio::spawn(async move {
        let (socket, _) = origin_listener.accept().await.unwrap();
        let mut tls = acceptor.accept(socket).await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = tls.read(&mut buf).await;
        let _ = tls
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello")
            .await;
    });

    let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = proxy_listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut client_socket, _) = proxy_listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let n = client_socket.read(&mut buf).await.unwrap();
        let request = String::from_utf8_lossy(&buf[..n]);
        assert!(request.starts_with("CONNECT "));

        client_socket
            .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
            .await
            .unwrap();

        let mut origin_socket = tokio::net::TcpStream::connect(origin_addr).await.unwrap();
        let _ = tokio::io::copy_bidirectional(&mut client_socket, &mut origin_socket).await;
    });

    (proxy_addr, format!("localhost:{}", origin_addr.port()))
}

#[tokio::test]
async fn connect_tunnel_then_tls_with_matching_fingerprint() {
    init_logging();
    let CertifiedKey { cert, signing_key } =
        generate_simple_self_signed(["localhost".to_string()]).unwrap();
    let cert_der = cert.der().to_vec();
    let key_der = signing_key.serialize_der();
    let fp = fingerprint(&cert_der);

    let (proxy_addr, origin_host_port) = spawn_mock_proxy_and_origin(cert_der, key_der).await;

    let mut client = Client::new();
    client.set_url(&format!("https://{origin_host_port}/"));
    client.set_proxy(&format!("http://{proxy_addr}/"));
    client.set_fingerprint(fp);

    let (outcome, body) = client.fetch_buf().await;
    assert_eq!(outcome, Outcome::Ok);
    assert_eq!(body, b"hello");
}

#[tokio::test]
async fn connect_tunnel_then_tls_with_mismatched_fingerprint() {
    init_logging();
    let CertifiedKey { cert, signing_key } =
        generate_simple_self_signed(["localhost".to_string()]).unwrap();
    let cert_der = cert.der().to_vec();
    let key_der = signing_key.serialize_der();

    let (proxy_addr, origin_host_port) = spawn_mock_proxy_and_origin(cert_der, key_der).await;

    let mut client = Client::new();
    client.set_url(&format!("https://{origin_host_port}/"));
    client.set_proxy(&format!("http://{proxy_addr}/"));
    client.set_fingerprint([0xAA; 20]);

    let (outcome, body) = client.fetch_buf().await;
    assert_eq!(outcome, Outcome::TlsFingerprintMismatch);
    assert!(body.is_empty());
}
