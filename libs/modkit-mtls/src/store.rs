//! PKCS#12 container access shared by the trust store and keystore loaders.
//!
//! Both loaders go through [`read_store_file`] and [`open_container`] and map
//! [`StoreError`] into their own error variants. Legacy (PBES1, SHA-1 MAC) and
//! current (PBES2 with AES, SHA-2 MAC) containers are both accepted.

use crate::secret::Passphrase;
use p12_keystore::{KeyStore, KeyStoreEntry};
use std::io::Read;
use std::path::Path;
use zeroize::Zeroizing;

/// Failure to unlock a container, before mapping to a loader-specific error
#[derive(Debug)]
pub enum StoreError {
    /// Bytes are not a PKCS#12 structure, use an unsupported algorithm, or a
    /// bag could not be decoded
    Format(String),
    /// MAC verification failed for the supplied passphrase
    Auth,
}

/// Read the whole file at `path`.
///
/// The handle lives only inside this function and is closed on every exit
/// path, including read errors.
pub fn read_store_file(path: &Path) -> std::io::Result<Zeroizing<Vec<u8>>> {
    let mut file = std::fs::File::open(path)?;
    let mut bytes = Zeroizing::new(Vec::new());
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Private key entry with the certificates bound to it
pub struct KeyChain {
    pub alias: String,
    /// PKCS#8 DER, zeroed on drop
    pub private_key: Zeroizing<Vec<u8>>,
    /// DER certificates, end-entity first
    pub certificates: Vec<Vec<u8>>,
}

/// Contents of an unlocked container. Entries are ordered by alias.
pub struct UnlockedContainer {
    /// Certificates stored without a key (trusted certificate entries)
    pub trusted_certificates: Vec<Vec<u8>>,
    pub key_chains: Vec<KeyChain>,
}

impl UnlockedContainer {
    /// Every certificate in the container, trusted entries first
    pub fn into_all_certificates(self) -> Vec<Vec<u8>> {
        let mut all = self.trusted_certificates;
        for chain in self.key_chains {
            all.extend(chain.certificates);
        }
        all
    }
}

/// Parse `bytes` as PKCS#12 and unlock it with `passphrase`.
///
/// # Errors
///
/// `StoreError::Format` when the structure or a bag cannot be decoded or an
/// algorithm is not supported, `StoreError::Auth` when the integrity MAC does
/// not match the passphrase.
pub fn open_container(
    bytes: &[u8],
    passphrase: &Passphrase,
) -> Result<UnlockedContainer, StoreError> {
    let keystore = KeyStore::from_pkcs12(bytes, passphrase.expose()).map_err(|e| match e {
        p12_keystore::error::Error::MacError(_) => StoreError::Auth,
        other => StoreError::Format(other.to_string()),
    })?;

    let mut entries: Vec<(String, &KeyStoreEntry)> = keystore
        .entries()
        .map(|(alias, entry)| (alias.to_string(), entry))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut trusted_certificates = Vec::new();
    let mut key_chains = Vec::new();
    for (alias, entry) in entries {
        match entry {
            KeyStoreEntry::Certificate(cert) => trusted_certificates.push(cert.as_der().to_vec()),
            KeyStoreEntry::PrivateKeyChain(chain) => key_chains.push(KeyChain {
                alias,
                private_key: Zeroizing::new(chain.key().to_vec()),
                certificates: chain.chain().iter().map(|c| c.as_der().to_vec()).collect(),
            }),
        }
    }

    Ok(UnlockedContainer {
        trusted_certificates,
        key_chains,
    })
}


#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::fixtures::{ContainerFormat, keystore_der, self_signed, truststore_der};
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_store_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_store_file(&dir.path().join("absent.p12")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_read_store_file_returns_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"pkcs12-bytes").unwrap();

        let bytes = read_store_file(file.path()).unwrap();
        assert_eq!(bytes.as_slice(), b"pkcs12-bytes");
    }

    #[test]
    fn test_open_container_extracts_key_chain() {
        for format in [ContainerFormat::Modern, ContainerFormat::Legacy] {
            let (cert, key) = self_signed("sample.test");
            let der = keystore_der(&cert, &key, "pw", format);

            let unlocked = open_container(&der, &Passphrase::new("pw")).unwrap();
            assert_eq!(unlocked.key_chains.len(), 1, "{format:?}");
            assert_eq!(unlocked.key_chains[0].certificates, vec![cert], "{format:?}");
            assert!(!unlocked.key_chains[0].private_key.is_empty());
        }
    }

    #[test]
    fn test_open_container_wrong_passphrase() {
        for format in [ContainerFormat::Modern, ContainerFormat::Legacy] {
            let (cert, key) = self_signed("sample.test");
            let der = keystore_der(&cert, &key, "pw", format);

            let result = open_container(&der, &Passphrase::new("not-pw"));
            assert!(matches!(result, Err(StoreError::Auth)), "{format:?}");
        }
    }

    #[test]
    fn test_open_certificate_only_store() {
        let (first, _) = self_signed("first.test");
        let (second, _) = self_signed("second.test");
        let der = truststore_der(&[&first, &second], "trust-pw");

        let unlocked = open_container(&der, &Passphrase::new("trust-pw")).unwrap();
        assert!(unlocked.key_chains.is_empty());
        let all = unlocked.into_all_certificates();
        assert_eq!(all.len(), 2);
        assert!(all.contains(&first) && all.contains(&second));
    }

    #[test]
    fn test_open_certificate_only_store_wrong_passphrase() {
        let (anchor, _) = self_signed("anchor.test");
        let der = truststore_der(&[&anchor], "trust-pw");

        let result = open_container(&der, &Passphrase::new("changeit"));
        assert!(matches!(result, Err(StoreError::Auth)));
    }

    #[test]
    fn test_open_container_garbage() {
        let result = open_container(b"definitely not der", &Passphrase::new("pw"));
        assert!(matches!(result, Err(StoreError::Format(_))));
    }
}
