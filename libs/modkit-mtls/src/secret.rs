use std::fmt;

use serde::de::{self, Deserialize, Deserializer, Visitor};
use zeroize::Zeroizing;

/// Store passphrase.
///
/// `Debug` and `Display` print `[REDACTED]`. The backing buffer is zeroed on
/// drop. Use [`expose`](Self::expose) only at the point where a container is
/// unlocked.
///
/// Deserializes from a string or an integer, since layered configuration
/// sources type unquoted numeric values (`MTLS__KEYSTORE_PW=123456`) as
/// numbers. Integers keep their decimal text.
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Callers must not log, store, or otherwise persist the returned slice.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

struct PassphraseVisitor;

impl Visitor<'_> for PassphraseVisitor {
    type Value = Passphrase;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a passphrase string or integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Passphrase, E> {
        Ok(Passphrase::new(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Passphrase, E> {
        Ok(Passphrase::new(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Passphrase, E> {
        Ok(Passphrase::new(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Passphrase, E> {
        Ok(Passphrase::new(v.to_string()))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<Passphrase, E> {
        Ok(Passphrase::new(v.to_string()))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Passphrase, E> {
        Ok(Passphrase::new(v.to_string()))
    }
}

impl<'de> Deserialize<'de> for Passphrase {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        d.deserialize_any(PassphraseVisitor)
    }
}
