use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::RngCore;

use crate::error::CryptoError;
use crate::secrets::SecretKey;

const NONCE_LEN: usize = 12;

/// AES-256-GCM encryption of protected identifiers at rest.
///
/// Ciphertexts are hex strings of `nonce || ciphertext || tag`, so a stored
/// value can be decrypted without any side data. Every call to
/// [`encrypt`](Self::encrypt) draws a fresh nonce, which makes the output
/// differ even for identical plaintexts.
#[derive(Clone)]
pub struct PiiCipher {
    aead: Aes256Gcm,
}

impl PiiCipher {
    pub fn new(key: &SecretKey) -> Self {
        Self {
            aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.expose())),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce = [0_u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);

        let sealed = self
            .aead
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(hex::encode(out))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let raw = hex::decode(ciphertext).map_err(|_| CryptoError::Encoding {
            reason: "not hex",
        })?;
        if raw.len() < NONCE_LEN {
            return Err(CryptoError::Encoding {
                reason: "shorter than nonce",
            });
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);

        let plaintext = self
            .aead
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::Integrity)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Encoding {
            reason: "plaintext is not utf-8",
        })
    }
}

impl core::fmt::Debug for PiiCipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PiiCipher")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::KEY_LEN;

    fn cipher() -> PiiCipher {
        PiiCipher::new(&SecretKey::from_bytes([7; KEY_LEN]))
    }

    #[test]
    fn round_trips_identifiers() {
        let cipher = cipher();
        let long = "9".repeat(512);
        for id in ["11111111111", "", "ção-ü", "a;b", long.as_str()] {
            let sealed = cipher.encrypt(id).unwrap();
            assert_eq!(cipher.decrypt(&sealed).unwrap(), id);
        }
    }

    #[test]
    fn encryption_is_not_deterministic() {
        let cipher = cipher();
        let a = cipher.encrypt("22222222222").unwrap();
        let b = cipher.encrypt("22222222222").unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).unwrap(), cipher.decrypt(&b).unwrap());
    }

    #[test]
    fn flipping_any_byte_fails_authentication() {
        let cipher = cipher();
        let sealed = hex::decode(cipher.encrypt("33333333333").unwrap()).unwrap();

        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x01;
            assert_eq!(
                cipher.decrypt(&hex::encode(&tampered)),
                Err(CryptoError::Integrity),
                "byte {i} flip went undetected"
            );
        }
    }

    #[test]
    fn truncation_fails() {
        let cipher = cipher();
        let sealed = cipher.encrypt("33333333333").unwrap();

        // Drop one byte of the tag.
        let truncated = &sealed[..sealed.len() - 2];
        assert_eq!(cipher.decrypt(truncated), Err(CryptoError::Integrity));

        // Not even a full nonce.
        assert!(matches!(
            cipher.decrypt(&sealed[..10]),
            Err(CryptoError::Encoding { .. })
        ));
    }

    #[test]
    fn malformed_hex_is_an_encoding_error() {
        assert!(matches!(
            cipher().decrypt("not-hex-at-all"),
            Err(CryptoError::Encoding { .. })
        ));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let sealed = cipher().encrypt("11111111111").unwrap();
        let other = PiiCipher::new(&SecretKey::from_bytes([8; KEY_LEN]));
        assert_eq!(other.decrypt(&sealed), Err(CryptoError::Integrity));
    }
}
