#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Common test utilities: generated PKI, PKCS#12 stores and a blocking mTLS
//! server.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use p12_keystore::{
    Certificate, EncryptionAlgorithm, KeyStore, KeyStoreEntry, MacAlgorithm, PrivateKeyChain,
};
use rcgen::{
    CertificateParams, CertifiedIssuer, DistinguishedName, DnType, ExtendedKeyUsagePurpose,
    KeyPair,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};

pub type Ca = CertifiedIssuer<'static, KeyPair>;

static CRYPTO_PROVIDER_INIT: Once = Once::new();

pub fn ensure_crypto_provider() {
    CRYPTO_PROVIDER_INIT.call_once(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

// ============================================================================
// Certificate generation
// ============================================================================

pub fn generate_ca(common_name: &str) -> Ca {
    let mut params = CertificateParams::default();
    params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    dn.push(DnType::OrganizationName, "ModKit mTLS Test");
    params.distinguished_name = dn;

    CertifiedIssuer::self_signed(params, KeyPair::generate().unwrap()).unwrap()
}

pub fn ca_der(ca: &Ca) -> CertificateDer<'static> {
    CertificateDer::from(ca.as_ref().der().to_vec())
}

/// Server certificate valid only for `dns_name`
pub fn generate_server_cert(ca: &Ca, dns_name: &str) -> (rcgen::Certificate, KeyPair) {
    let mut params = CertificateParams::new(vec![dns_name.to_owned()]).unwrap();
    params.distinguished_name.push(DnType::CommonName, dns_name);
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

    let key_pair = KeyPair::generate().unwrap();
    let cert = params.signed_by(&key_pair, ca).unwrap();
    (cert, key_pair)
}

pub fn generate_client_cert(ca: &Ca) -> (rcgen::Certificate, KeyPair) {
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, "mtls-test-client");
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];

    let key_pair = KeyPair::generate().unwrap();
    let cert = params.signed_by(&key_pair, ca).unwrap();
    (cert, key_pair)
}

// ============================================================================
// PKCS#12 stores
// ============================================================================

/// Keystore holding one certificate and its private key, written with PBES2
/// AES-256 bags and an HMAC-SHA256 MAC (the OpenSSL 3 and JDK 17 default).
pub fn write_keystore(
    dir: &Path,
    file: &str,
    cert: &rcgen::Certificate,
    key: &KeyPair,
    passphrase: &str,
) -> PathBuf {
    let chain = PrivateKeyChain::new(
        key.serialize_der().as_slice(),
        b"client-key-id".as_slice(),
        vec![Certificate::from_der(cert.der()).unwrap()],
    );
    let mut keystore = KeyStore::new();
    keystore.add_entry("client", KeyStoreEntry::PrivateKeyChain(chain));
    write_file(dir, file, &seal(&keystore, passphrase))
}

/// Same content as [`write_keystore`] in the SHA-1/3DES legacy encoding.
pub fn write_legacy_keystore(
    dir: &Path,
    file: &str,
    cert: &rcgen::Certificate,
    key: &KeyPair,
    passphrase: &str,
) -> PathBuf {
    let der = p12::PFX::new(cert.der(), &key.serialize_der(), None, passphrase, file)
        .unwrap()
        .to_der();
    write_file(dir, file, &der)
}

/// Certificate-only trust store holding `anchor`
pub fn write_truststore(
    dir: &Path,
    file: &str,
    anchor: &CertificateDer<'_>,
    passphrase: &str,
) -> PathBuf {
    let mut keystore = KeyStore::new();
    keystore.add_entry(
        "partner-root",
        KeyStoreEntry::Certificate(Certificate::from_der(anchor.as_ref()).unwrap()),
    );
    write_file(dir, file, &seal(&keystore, passphrase))
}

fn seal(keystore: &KeyStore, passphrase: &str) -> Vec<u8> {
    keystore
        .writer(passphrase)
        .encryption_algorithm(EncryptionAlgorithm::PbeWithHmacSha256AndAes256)
        .mac_algorithm(MacAlgorithm::HmacSha256)
        .write()
        .unwrap()
}

fn write_file(dir: &Path, file: &str, der: &[u8]) -> PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, der).unwrap();
    path
}

// ============================================================================
// mTLS test server
// ============================================================================

/// Blocking HTTPS server that requires client certificates signed by a given CA
/// and answers every request with `200 OK`.
pub struct MtlsServer {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    served: Arc<AtomicUsize>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MtlsServer {
    pub fn start(
        client_ca: CertificateDer<'static>,
        server_cert: CertificateDer<'static>,
        server_key: Vec<u8>,
    ) -> std::io::Result<Self> {
        ensure_crypto_provider();

        let mut client_roots = RootCertStore::empty();
        client_roots.add(client_ca).expect("Failed to add client CA");
        let client_verifier = WebPkiClientVerifier::builder(Arc::new(client_roots))
            .build()
            .expect("Failed to build client verifier");

        let config = ServerConfig::builder()
            .with_client_cert_verifier(client_verifier)
            .with_single_cert(
                vec![server_cert],
                PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(server_key)),
            )
            .expect("Failed to build server config");
        let config = Arc::new(config);

        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let served = Arc::new(AtomicUsize::new(0));

        let shutdown_flag = shutdown.clone();
        let served_count = served.clone();

        let handle = thread::spawn(move || {
            while !shutdown_flag.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((mut stream, _peer)) => {
                        stream.set_nonblocking(false).ok();
                        stream.set_read_timeout(Some(Duration::from_secs(5))).ok();
                        stream.set_write_timeout(Some(Duration::from_secs(5))).ok();

                        let Ok(mut conn) = rustls::ServerConnection::new(config.clone()) else {
                            continue;
                        };
                        let mut tls = rustls::Stream::new(&mut conn, &mut stream);

                        // Handshake failures surface here and are dropped
                        let mut buf = [0u8; 4096];
                        if let Ok(n) = tls.read(&mut buf)
                            && n > 0
                        {
                            served_count.fetch_add(1, Ordering::SeqCst);
                            let response = "HTTP/1.1 200 OK\r\n\
                                            content-length: 2\r\n\
                                            connection: close\r\n\r\nok";
                            if tls.write_all(response.as_bytes()).is_ok() {
                                let _ = tls.flush();
                            }
                            tls.conn.send_close_notify();
                            let _ = tls.flush();
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            addr,
            shutdown,
            served,
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Requests received over a completed mutual TLS handshake
    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }
}

impl Drop for MtlsServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
