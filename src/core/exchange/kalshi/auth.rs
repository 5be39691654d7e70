//! RSA-PSS request signing.
//!
//! Authenticated requests carry three headers: the access key id, a
//! millisecond timestamp, and a base64 signature of `timestamp || METHOD ||
//! path` where the path excludes any query string. The PSS salt length
//! equals the SHA-256 digest length.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::Pss;
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Header names attached to every authenticated request.
pub const HEADER_KEY: &str = "KALSHI-ACCESS-KEY";
pub const HEADER_TIMESTAMP: &str = "KALSHI-ACCESS-TIMESTAMP";
pub const HEADER_SIGNATURE: &str = "KALSHI-ACCESS-SIGNATURE";

/// Holds the access key id and private key for request signing.
pub struct RequestSigner {
    key_id: String,
    key: RsaPrivateKey,
}

impl RequestSigner {
    #[must_use]
    pub fn new(key_id: impl Into<String>, key: RsaPrivateKey) -> Self {
        Self {
            key_id: key_id.into(),
            key,
        }
    }

    /// Load a PEM private key (PKCS#8 or PKCS#1) from disk.
    pub fn from_pem_file(key_id: impl Into<String>, path: &str) -> Result<Self> {
        let pem = std::fs::read_to_string(path)?;
        let key = Self::decode_pem(&pem)?;
        Ok(Self::new(key_id, key))
    }

    /// Load a base64-encoded PEM private key from an environment value.
    pub fn from_base64(key_id: impl Into<String>, b64: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(b64.trim())
            .map_err(|e| Error::Parse(format!("private key base64: {e}")))?;
        let pem = String::from_utf8(bytes)
            .map_err(|e| Error::Parse(format!("private key is not UTF-8 PEM: {e}")))?;
        let key = Self::decode_pem(&pem)?;
        Ok(Self::new(key_id, key))
    }

    fn decode_pem(pem: &str) -> Result<RsaPrivateKey> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| Error::Parse(format!("unable to decode RSA private key: {e}")))
    }

    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// The exact string covered by the signature.
    #[must_use]
    pub fn signing_input(timestamp_ms: i64, method: &str, path: &str) -> String {
        debug_assert!(!path.contains('?'), "signing path must exclude the query");
        format!("{timestamp_ms}{method}{path}")
    }

    /// Sign `timestamp || METHOD || path`, returning the base64 signature.
    pub fn sign(&self, timestamp_ms: i64, method: &str, path: &str) -> Result<String> {
        let input = Self::signing_input(timestamp_ms, method, path);
        let digest = Sha256::digest(input.as_bytes());

        let signature = self
            .key
            .sign_with_rng(&mut rand::rngs::OsRng, Pss::new::<Sha256>(), &digest)
            .map_err(|e| Error::Auth {
                status: 0,
                message: format!("signing failed: {e}"),
            })?;

        Ok(BASE64.encode(signature))
    }

    /// Produce the three auth headers for a request.
    pub fn headers(
        &self,
        timestamp_ms: i64,
        method: &str,
        path: &str,
    ) -> Result<[(&'static str, String); 3]> {
        let signature = self.sign(timestamp_ms, method, path)?;
        Ok([
            (HEADER_KEY, self.key_id.clone()),
            (HEADER_TIMESTAMP, timestamp_ms.to_string()),
            (HEADER_SIGNATURE, signature),
        ])
    }
}
