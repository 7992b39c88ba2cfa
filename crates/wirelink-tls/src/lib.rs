//! TLS provisioning for tunnel listeners and dialers.
//!
//! Builds rustls server configs from certificate/key files and client
//! configs against the webpki root store, with OpenSSL-style cipher-suite
//! strings mapped onto the ring provider.

use std::fs::File;
use std::io::BufReader;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, ServerConfig, SupportedCipherSuite, SupportedProtocolVersion};
use thiserror::Error;

use wirelink_link::TlsMethod;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("certificate or private key path is empty")]
    MissingCertOrKey,
    #[error("invalid certificate: {0}")]
    InvalidCert(String),
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("invalid server name: {0}")]
    InvalidServerName(String),
    #[error("TLS configuration error: {0}")]
    Config(String),
}

/// CPU platform identifier: 1 x86, 2 x86_64, 3 arm, 4 aarch64/ppc64,
/// pointer width for everything else.
pub fn cpu_platform() -> i32 {
    if cfg!(target_arch = "x86") {
        1
    } else if cfg!(target_arch = "x86_64") {
        2
    } else if cfg!(target_arch = "arm") {
        3
    } else if cfg!(any(target_arch = "aarch64", target_arch = "powerpc64")) {
        4
    } else if cfg!(target_pointer_width = "64") {
        2
    } else {
        1
    }
}

/// Default TLS 1.3 suite ordering for this platform. 32-bit ARM lacks AES
/// acceleration, so ChaCha20 leads there.
pub fn default_cipher_suites() -> &'static str {
    if cpu_platform() == 3 {
        "TLS_CHACHA20_POLY1305_SHA256:TLS_AES_128_GCM_SHA256:TLS_AES_256_GCM_SHA384"
    } else {
        "TLS_AES_256_GCM_SHA384:TLS_CHACHA20_POLY1305_SHA256:TLS_AES_128_GCM_SHA256"
    }
}

fn protocol_versions(method: TlsMethod) -> &'static [&'static SupportedProtocolVersion] {
    static TLS13_ONLY: [&SupportedProtocolVersion; 1] = [&rustls::version::TLS13];
    static TLS12_ONLY: [&SupportedProtocolVersion; 1] = [&rustls::version::TLS12];
    match method {
        TlsMethod::TlsV13 => &TLS13_ONLY,
        // rustls has no TLS 1.1; the closest version it can negotiate.
        TlsMethod::TlsV12 | TlsMethod::TlsV11 => &TLS12_ONLY,
        // Generic and legacy SSL methods negotiate anything available.
        TlsMethod::Tls | TlsMethod::SslV23 | TlsMethod::SslV3 | TlsMethod::SslV2 | TlsMethod::Ssl => {
            rustls::ALL_VERSIONS
        }
    }
}

/// Maps a colon-separated TLS 1.3 suite string onto the ring provider, in
/// the requested order. The provider's TLS 1.2 suites are kept unchanged,
/// matching the scope of an OpenSSL ciphersuites string. Unknown names are
/// skipped; an empty or fully-unknown list keeps the provider default.
fn provider_with_suites(suites: &str) -> CryptoProvider {
    use rustls::crypto::ring;

    let base = ring::default_provider();
    let mut selected: Vec<SupportedCipherSuite> = Vec::new();
    for name in suites.split(':') {
        let suite = match name.trim() {
            "TLS_AES_256_GCM_SHA384" => Some(ring::cipher_suite::TLS13_AES_256_GCM_SHA384),
            "TLS_AES_128_GCM_SHA256" => Some(ring::cipher_suite::TLS13_AES_128_GCM_SHA256),
            "TLS_CHACHA20_POLY1305_SHA256" => {
                Some(ring::cipher_suite::TLS13_CHACHA20_POLY1305_SHA256)
            }
            _ => None,
        };
        if let Some(suite) = suite {
            if !selected.iter().any(|s| s.suite() == suite.suite()) {
                selected.push(suite);
            }
        }
    }
    if selected.is_empty() {
        return base;
    }
    for suite in base.cipher_suites.iter() {
        if matches!(suite, SupportedCipherSuite::Tls12(_)) {
            selected.push(*suite);
        }
    }
    CryptoProvider {
        cipher_suites: selected,
        ..base
    }
}

/// Server config for a TLS-terminating listener.
pub fn server_config(
    method: TlsMethod,
    cert_file: &str,
    key_file: &str,
    key_pass: &str,
    cipher_suites: &str,
) -> Result<Arc<ServerConfig>, TlsError> {
    if cert_file.is_empty() || key_file.is_empty() {
        return Err(TlsError::MissingCertOrKey);
    }
    ensure_crypto_provider();

    let certs = load_certs(Path::new(cert_file))?;
    let key = load_private_key(Path::new(key_file), key_pass)?;

    let config = ServerConfig::builder_with_provider(Arc::new(provider_with_suites(cipher_suites)))
        .with_protocol_versions(protocol_versions(method))
        .map_err(|e| TlsError::Config(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| TlsError::InvalidCert(e.to_string()))?;
    Ok(Arc::new(config))
}

/// Client config verifying against the webpki root store.
pub fn client_config(
    method: TlsMethod,
    cipher_suites: &str,
) -> Result<Arc<ClientConfig>, TlsError> {
    ensure_crypto_provider();

    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder_with_provider(Arc::new(provider_with_suites(cipher_suites)))
        .with_protocol_versions(protocol_versions(method))
        .map_err(|e| TlsError::Config(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Server name for the client handshake: the configured SNI when non-empty,
/// the remote IP otherwise.
pub fn server_name(sni: &str, fallback: IpAddr) -> Result<ServerName<'static>, TlsError> {
    if sni.is_empty() {
        return Ok(ServerName::IpAddress(fallback.into()));
    }
    ServerName::try_from(sni.to_string())
        .map_err(|e| TlsError::InvalidServerName(format!("{}: {}", sni, e)))
}

// Initialize rustls crypto provider
static CRYPTO_PROVIDER_INIT: std::sync::Once = std::sync::Once::new();

fn ensure_crypto_provider() {
    CRYPTO_PROVIDER_INIT.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            tracing::debug!("Rustls crypto provider already installed");
        }
    });
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path)
        .map_err(|e| TlsError::InvalidCert(format!("failed to open cert file: {}", e)))?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::InvalidCert(format!("failed to parse certs: {}", e)))?;
    if certs.is_empty() {
        return Err(TlsError::InvalidCert("no certificate found".to_string()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path, _key_pass: &str) -> Result<PrivateKeyDer<'static>, TlsError> {
    let data = std::fs::read(path)
        .map_err(|e| TlsError::InvalidKey(format!("failed to open key file: {}", e)))?;
    // PEM encryption is not supported; the passphrase field exists for
    // config carriage only.
    if data.windows(9).any(|w| w == b"ENCRYPTED") {
        return Err(TlsError::InvalidKey(
            "passphrase-protected keys are not supported".to_string(),
        ));
    }
    let mut reader = BufReader::new(&data[..]);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| TlsError::InvalidKey(format!("failed to parse key: {}", e)))?
        .ok_or_else(|| TlsError::InvalidKey("no private key found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("wirelink-tls-{}-{}", std::process::id(), name));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn self_signed() -> (std::path::PathBuf, std::path::PathBuf) {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_path = write_temp("cert.pem", &cert.cert.pem());
        let key_path = write_temp("key.pem", &cert.key_pair.serialize_pem());
        (cert_path, key_path)
    }

    #[test]
    fn platform_identifier_is_positive() {
        assert!(cpu_platform() >= 1);
    }

    #[test]
    fn default_suites_cover_all_tls13_suites() {
        let suites = default_cipher_suites();
        assert!(suites.contains("TLS_AES_256_GCM_SHA384"));
        assert!(suites.contains("TLS_AES_128_GCM_SHA256"));
        assert!(suites.contains("TLS_CHACHA20_POLY1305_SHA256"));
    }

    #[test]
    fn suite_string_orders_provider_suites() {
        let provider = provider_with_suites("TLS_CHACHA20_POLY1305_SHA256:TLS_AES_256_GCM_SHA384");
        assert_eq!(
            provider.cipher_suites[0].suite(),
            rustls::crypto::ring::cipher_suite::TLS13_CHACHA20_POLY1305_SHA256.suite()
        );
        assert_eq!(
            provider.cipher_suites[1].suite(),
            rustls::crypto::ring::cipher_suite::TLS13_AES_256_GCM_SHA384.suite()
        );
    }

    #[test]
    fn unknown_suite_names_are_skipped() {
        let provider = provider_with_suites("NOT_A_SUITE:TLS_AES_128_GCM_SHA256");
        assert_eq!(
            provider.cipher_suites[0].suite(),
            rustls::crypto::ring::cipher_suite::TLS13_AES_128_GCM_SHA256.suite()
        );
    }

    #[test]
    fn empty_suite_string_keeps_provider_default() {
        let provider = provider_with_suites("");
        let base = rustls::crypto::ring::default_provider();
        assert_eq!(provider.cipher_suites.len(), base.cipher_suites.len());
    }

    #[test]
    fn server_config_requires_paths() {
        assert!(matches!(
            server_config(TlsMethod::default(), "", "key.pem", "", ""),
            Err(TlsError::MissingCertOrKey)
        ));
        assert!(matches!(
            server_config(TlsMethod::default(), "cert.pem", "", "", ""),
            Err(TlsError::MissingCertOrKey)
        ));
    }

    #[test]
    fn server_config_from_self_signed_files() {
        let (cert_path, key_path) = self_signed();
        let config = server_config(
            TlsMethod::default(),
            cert_path.to_str().unwrap(),
            key_path.to_str().unwrap(),
            "",
            default_cipher_suites(),
        );
        assert!(config.is_ok());
    }

    #[test]
    fn client_config_builds_for_every_method() {
        for raw in 0..=8 {
            let method = TlsMethod::from_raw(raw);
            assert!(client_config(method, "").is_ok(), "method {:?}", method);
        }
    }

    #[test]
    fn server_name_falls_back_to_ip() {
        let name = server_name("", "10.0.0.1".parse().unwrap()).unwrap();
        assert!(matches!(name, ServerName::IpAddress(_)));

        let name = server_name("example.com", "10.0.0.1".parse().unwrap()).unwrap();
        assert!(matches!(name, ServerName::DnsName(_)));

        assert!(server_name("not a name", "10.0.0.1".parse().unwrap()).is_err());
    }
}
