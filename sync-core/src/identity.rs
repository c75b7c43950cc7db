//! Stateless signed identity tokens.
//!
//! A token binds an identity string to a shared secret:
//!
//! ```text
//! base64(identity) "." base64(HMAC-SHA256(secret, identity))
//! ```
//!
//! Both halves use the standard, padded base64 alphabet. Verification needs
//! only the secret, never a lookup.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Domain label used when comparing bearer secrets.
const BEARER_LABEL: &[u8] = b"confsync-bearer-v1";

/// Errors from token issuance and verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Identity to sign was empty.
    #[error("identity is empty")]
    EmptyIdentity,

    /// Signing secret was empty.
    #[error("secret is empty")]
    EmptySecret,

    /// Token is not two base64 parts separated by a dot.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Registration hashing failed.
    #[error("hashing failed: {0}")]
    Hashing(String),
}

/// Result of checking a well-formed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Signature matches; carries the embedded identity.
    Valid(String),
    /// Signature does not match the secret.
    Invalid,
}

impl Verification {
    /// Whether the signature matched.
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid(_))
    }

    /// The identity, if the signature matched.
    pub fn identity(&self) -> Option<&str> {
        match self {
            Verification::Valid(id) => Some(id),
            Verification::Invalid => None,
        }
    }
}

/// A shared secret held in memory.
///
/// Wiped on drop and redacted from debug output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    /// Wrap raw secret bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the secret has no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare a presented bearer value against this secret in constant time.
    ///
    /// Both sides are reduced to an HMAC tag first so the comparison does
    /// not leak the secret's length or content through timing.
    pub fn matches(&self, presented: &[u8]) -> bool {
        if self.0.is_empty() {
            return false;
        }
        let Ok(mut expected) = HmacSha256::new_from_slice(&self.0) else {
            return false;
        };
        expected.update(BEARER_LABEL);
        let expected = expected.finalize().into_bytes();

        let Ok(mut candidate) = HmacSha256::new_from_slice(presented) else {
            return false;
        };
        candidate.update(BEARER_LABEL);
        candidate.verify_slice(&expected).is_ok()
    }
}

impl From<&str> for SharedSecret {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<String> for SharedSecret {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

// Don't leak secret in debug output
impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedSecret([REDACTED])")
    }
}

/// Issue a signed token for `identity`.
pub fn issue(identity: &str, secret: &SharedSecret) -> Result<String, IdentityError> {
    if identity.is_empty() {
        return Err(IdentityError::EmptyIdentity);
    }
    if secret.is_empty() {
        return Err(IdentityError::EmptySecret);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| IdentityError::Hashing(e.to_string()))?;
    mac.update(identity.as_bytes());
    let signature = mac.finalize().into_bytes();

    Ok(format!(
        "{}.{}",
        STANDARD.encode(identity.as_bytes()),
        STANDARD.encode(signature)
    ))
}

/// Verify a token against `secret`.
///
/// A well-formed token with a wrong signature yields
/// [`Verification::Invalid`], not an error.
pub fn verify(token: &str, secret: &SharedSecret) -> Result<Verification, IdentityError> {
    if secret.is_empty() {
        return Err(IdentityError::EmptySecret);
    }

    let parts: Vec<&str> = token.split('.').collect();
    let [encoded_identity, encoded_signature] = parts.as_slice() else {
        return Err(IdentityError::Malformed(format!(
            "expected 2 parts, got {}",
            parts.len()
        )));
    };

    let identity_bytes = STANDARD
        .decode(encoded_identity)
        .map_err(|e| IdentityError::Malformed(format!("identity: {e}")))?;
    let signature = STANDARD
        .decode(encoded_signature)
        .map_err(|e| IdentityError::Malformed(format!("signature: {e}")))?;
    let identity = String::from_utf8(identity_bytes)
        .map_err(|_| IdentityError::Malformed("identity is not UTF-8".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| IdentityError::Hashing(e.to_string()))?;
    mac.update(identity.as_bytes());

    // verify_slice compares in constant time
    match mac.verify_slice(&signature) {
        Ok(()) => Ok(Verification::Valid(identity)),
        Err(_) => Ok(Verification::Invalid),
    }
}
