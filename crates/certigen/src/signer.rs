//! Keyed signatures for the verification token embedded in each QR code.
//!
//! The token travels as ASCII text:
//!
//! ```text
//! certificateId;plaintextIdentifier;expirationEpoch;hexSignature
//! ```
//!
//! where the signature is HMAC-SHA256 over the first three fields joined by
//! `;`. [`IntegritySigner`] only signs and checks bytes; deciding whether a
//! token is still valid is done by [`verify_token`].

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::TokenError;
use crate::secrets::SecretKey;

type HmacSha256 = Hmac<Sha256>;

const DELIMITER: char = ';';

/// Deterministic HMAC-SHA256 signer.
#[derive(Clone)]
pub struct IntegritySigner {
    key: SecretKey,
}

impl IntegritySigner {
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        <HmacSha256 as Mac>::new_from_slice(self.key.expose())
            .unwrap_or_else(|_| unreachable!("hmac accepts any key length"))
    }

    /// Signs the exact bytes of `payload` and returns lowercase hex.
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Recomputes the signature and compares it in constant time.
    ///
    /// Returns `false` for signatures that are not valid hex.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(payload);
        let expected = mac.finalize().into_bytes();
        expected.as_slice().ct_eq(provided.as_slice()).into()
    }
}

impl core::fmt::Debug for IntegritySigner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("IntegritySigner")
    }
}

/// The signed content of a certificate's QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrToken {
    pub certificate_id: String,
    pub identifier: String,
    pub expires_at: i64,
    pub signature: String,
}

impl QrToken {
    /// Builds and signs a token.
    pub fn issue(
        signer: &IntegritySigner,
        certificate_id: impl Into<String>,
        identifier: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        let mut token = Self {
            certificate_id: certificate_id.into(),
            identifier: identifier.into(),
            expires_at,
            signature: String::new(),
        };
        token.signature = signer.sign(token.payload().as_bytes());
        token
    }

    /// The signed portion: `certificateId;identifier;expiration`.
    pub fn payload(&self) -> String {
        format!(
            "{}{DELIMITER}{}{DELIMITER}{}",
            self.certificate_id, self.identifier, self.expires_at
        )
    }

    /// The full wire form embedded in the QR image.
    pub fn encode(&self) -> String {
        format!("{}{DELIMITER}{}", self.payload(), self.signature)
    }

    /// Splits a scanned token into its four fields.
    ///
    /// This does not check the signature.
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let fields: Vec<&str> = raw.trim().split(DELIMITER).collect();
        let [certificate_id, identifier, expires_at, signature] = fields.as_slice() else {
            return Err(TokenError::Malformed {
                reason: "expected 4 fields",
            });
        };
        if certificate_id.is_empty() || identifier.is_empty() || signature.is_empty() {
            return Err(TokenError::Malformed {
                reason: "empty field",
            });
        }
        let expires_at = expires_at.parse().map_err(|_| TokenError::Malformed {
            reason: "expiration is not an integer",
        })?;
        Ok(Self {
            certificate_id: (*certificate_id).to_owned(),
            identifier: (*identifier).to_owned(),
            expires_at,
            signature: (*signature).to_owned(),
        })
    }
}

/// Downstream check of a scanned token: signature first, then expiration.
pub fn verify_token(
    signer: &IntegritySigner,
    raw: &str,
    now_epoch: i64,
) -> Result<QrToken, TokenError> {
    let token = QrToken::parse(raw)?;
    if !signer.verify(token.payload().as_bytes(), &token.signature) {
        return Err(TokenError::BadSignature);
    }
    if now_epoch > token.expires_at {
        return Err(TokenError::Expired {
            expires_at: token.expires_at,
        });
    }
    Ok(token)
}
