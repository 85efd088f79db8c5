// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TLS transport: handshake plus SHA-1 fingerprint pinning.
//!
//! The only trust decision this client makes is "does the leaf certificate's
//! SHA-1 fingerprint match the pinned value?" — no chain, expiry, or hostname
//! validation. That's expressed as a custom [`rustls::client::danger::ServerCertVerifier`]
//! installed via `ClientConfig::dangerous()`, the same hook a loopback TLS
//! fingerprint probe in this codebase's lineage uses to skip validation
//! entirely; ours differs only in that it still enforces equality against one
//! pinned hash rather than accepting unconditionally.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use sha1::{Digest, Sha1};
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::error::Outcome;

/// 20-byte SHA-1 fingerprint, the sole trust anchor.
pub type Fingerprint = [u8; 20];

#[derive(Debug)]
struct FingerprintVerifier {
    pinned: Fingerprint,
}

impl ServerCertVerifier for FingerprintVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let mut hasher = Sha1::new();
        hasher.update(end_entity.as_ref());
        let digest: [u8; 20] = hasher.finalize().into();
        if digest == self.pinned {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::General(
                "certificate fingerprint does not match pinned value".into(),
            ))
        }
    }

    // The fingerprint pin is the only trust decision this client makes; it
    // does not re-verify the signature chain above the pinned leaf.
    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

fn client_config(pinned: Fingerprint) -> Arc<ClientConfig> {
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(FingerprintVerifier { pinned }))
        .with_no_client_auth();
    Arc::new(config)
}

/// Perform the TLS handshake over `stream` for `host`, then verify the peer
/// leaf certificate's SHA-1 fingerprint against `pinned`. `host` is only used
/// as the SNI name; it plays no role in the trust decision.
pub async fn handshake(
    stream: TcpStream,
    host: &str,
    pinned: Fingerprint,
) -> Result<TlsStream<TcpStream>, Outcome> {
    let connector = TlsConnector::from(client_config(pinned));
    let server_name = ServerName::try_from(host.to_string()).map_err(|_| Outcome::TlsHandshakeErr)?;

    // A fingerprint mismatch surfaces as a handshake failure here: the custom
    // verifier returns `Err` from inside the handshake itself, so rustls never
    // completes it. We distinguish the two causes by re-deriving the mismatch
    // from the error message rather than threading a side channel through rustls.
    match connector.connect(server_name, stream).await {
        Ok(stream) => Ok(stream),
        Err(e) => {
            if e.to_string().contains("fingerprint") {
                Err(Outcome::TlsFingerprintMismatch)
            } else {
                Err(Outcome::TlsHandshakeErr)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{generate_simple_self_signed, CertifiedKey};
    use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
    use rustls::ServerConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn leaf_fingerprint(der: &[u8]) -> Fingerprint {
        let mut hasher = Sha1::new();
        hasher.update(der);
        hasher.finalize().into()
    }

    async fn spawn_tls_echo_server(cert_der: Vec<u8>, key_der: Vec<u8>) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_der));
        let server_config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![CertificateDer::from(cert_der)], key)
            .unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server_config));

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut tls = acceptor.accept(socket).await.unwrap();
            let mut buf = [0u8; 5];
            let _ = tls.read_exact(&mut buf).await;
            let _ = tls.write_all(b"world").await;
        });

        addr
    }

    #[tokio::test]
    async fn handshake_succeeds_with_matching_fingerprint() {
        let CertifiedKey { cert, signing_key } =
            generate_simple_self_signed(["localhost".to_string()]).unwrap();
        let cert_der = cert.der().to_vec();
        let key_der = signing_key.serialize_der();
        let fp = leaf_fingerprint(&cert_der);

        let addr = spawn_tls_echo_server(cert_der, key_der).await;
        let tcp = TcpStream::connect(addr).await.unwrap();
        let mut tls = handshake(tcp, "localhost", fp).await.unwrap();

        tls.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        tls.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"world");
    }

    #[tokio::test]
    async fn handshake_fails_on_fingerprint_mismatch() {
        let CertifiedKey { cert, signing_key } =
            generate_simple_self_signed(["localhost".to_string()]).unwrap();
        let cert_der = cert.der().to_vec();
        let key_der = signing_key.serialize_der();

        let addr = spawn_tls_echo_server(cert_der, key_der).await;
        let tcp = TcpStream::connect(addr).await.unwrap();
        let wrong_fp = [0xAAu8; 20];
        let err = handshake(tcp, "localhost", wrong_fp).await.unwrap_err();
        assert_eq!(err, Outcome::TlsFingerprintMismatch);
    }
}
