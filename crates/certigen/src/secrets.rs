//! Key material resolution.
//!
//! Both keys are fixed for the lifetime of the process. They are resolved once
//! at startup through a [`SecretProvider`] so no key ever lives in a constant.

use crate::error::SecretError;

/// Length in bytes of both the cipher key and the signing key.
pub const KEY_LEN: usize = 32;

/// Environment variable holding the hex-encoded AES-256 key.
pub const CIPHER_KEY_ENV: &str = "CERTIGEN_CIPHER_KEY";

/// Environment variable holding the hex-encoded HMAC key.
pub const SIGNING_KEY_ENV: &str = "CERTIGEN_SIGNING_KEY";

/// A 32-byte secret. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Decodes a 64-character hex string.
    pub fn from_hex(name: &'static str, value: &str) -> Result<Self, SecretError> {
        let malformed = || SecretError::Malformed {
            name,
            expected: KEY_LEN,
        };
        let raw = hex::decode(value.trim()).map_err(|_| malformed())?;
        let bytes: [u8; KEY_LEN] = raw.try_into().map_err(|_| malformed())?;
        Ok(Self(bytes))
    }

    pub fn expose(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl core::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Source of the process-wide keys.
pub trait SecretProvider {
    /// Key used by [`crate::cipher::PiiCipher`].
    fn cipher_key(&self) -> Result<SecretKey, SecretError>;

    /// Key used by [`crate::signer::IntegritySigner`].
    fn signing_key(&self) -> Result<SecretKey, SecretError>;
}

/// Keys handed over directly, e.g. from a test or an embedding application.
#[derive(Debug, Clone)]
pub struct StaticSecrets {
    cipher: SecretKey,
    signing: SecretKey,
}

impl StaticSecrets {
    pub const fn new(cipher: SecretKey, signing: SecretKey) -> Self {
        Self { cipher, signing }
    }
}

impl SecretProvider for StaticSecrets {
    fn cipher_key(&self) -> Result<SecretKey, SecretError> {
        Ok(self.cipher.clone())
    }

    fn signing_key(&self) -> Result<SecretKey, SecretError> {
        Ok(self.signing.clone())
    }
}

/// Reads hex keys from [`CIPHER_KEY_ENV`] and [`SIGNING_KEY_ENV`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl EnvSecrets {
    fn read(name: &'static str) -> Result<SecretKey, SecretError> {
        let value = std::env::var(name).map_err(|_| SecretError::Missing { name })?;
        SecretKey::from_hex(name, &value)
    }
}

impl SecretProvider for EnvSecrets {
    fn cipher_key(&self) -> Result<SecretKey, SecretError> {
        Self::read(CIPHER_KEY_ENV)
    }

    fn signing_key(&self) -> Result<SecretKey, SecretError> {
        Self::read(SIGNING_KEY_ENV)
    }
}
