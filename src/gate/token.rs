//! Signed session tokens.
//!
//! Compact `header.payload.signature` tokens: three dot-joined base64url
//! segments (unpadded), signed with HMAC-SHA256 over the first two. The
//! payload carries issued-at and expiry epoch seconds. Verification never
//! reports *why* a token was rejected — malformed, forged and expired all
//! come back as `None`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::Clock;

/// Constant token header: HMAC-SHA256, JWT framing.
const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Claims carried by a freshly issued session token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionClaims {
    pub iat: u64,
    pub exp: u64,
}

/// Signs and verifies session tokens with a process-lifetime secret.
///
/// The secret is independent of the password and regenerated at every
/// process start, which invalidates all outstanding sessions on restart.
pub struct TokenCodec {
    secret: [u8; 32],
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(secret: [u8; 32], clock: Arc<dyn Clock>) -> Self {
        Self { secret, clock }
    }

    /// Build a signed token. Pure computation; cannot fail.
    pub fn sign(&self, claims: &SessionClaims) -> String {
        let header = URL_SAFE_NO_PAD.encode(HEADER_JSON);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::json!({"iat": claims.iat, "exp": claims.exp}).to_string(),
        );
        let signature = URL_SAFE_NO_PAD.encode(self.signature_over(&header, &payload));
        format!("{header}.{payload}.{signature}")
    }

    /// Verify a token and return its payload, or `None` for malformed
    /// structure, signature mismatch, or expired `exp`.
    pub fn verify(&self, token: &str) -> Option<Value> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return None;
        }
        let (header, payload, signature) = (parts[0], parts[1], parts[2]);

        let expected = self.signature_over(header, payload);
        let given = URL_SAFE_NO_PAD.decode(signature).ok()?;
        // Wrong length is an immediate reject; the constant-time compare
        // only ever runs over equal-length buffers.
        if given.len() != expected.len() {
            return None;
        }
        if !bool::from(expected.as_slice().ct_eq(&given)) {
            return None;
        }

        let payload_bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let claims: Value = serde_json::from_slice(&payload_bytes).ok()?;
        if let Some(exp) = claims.get("exp").and_then(Value::as_u64) {
            if self.clock.now_epoch_secs() > exp {
                return None;
            }
        }
        Some(claims)
    }

    fn signature_over(&self, header: &str, payload: &str) -> [u8; 32] {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret)
            .expect("HMAC-SHA256 accepts keys of any length");
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().into()
    }
}
