//! Single-password auth gate.
//!
//! Owns the process-lifetime auth state: the scrypt-derived key for the
//! configured password, the random token-signing secret, and the per-address
//! attempt tracker. Constructed once at boot via [`AuthGate::setup`] and
//! injected into every handler that needs it; there is no global state.
//!
//! The signing secret is regenerated on every setup, so all outstanding
//! sessions are invalidated by a process restart. That is an invariant, not
//! a defect: sessions live only for the process lifetime.

pub mod attempts;
pub mod cookie;
pub mod kdf;
pub mod token;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::GateError;
use attempts::{AttemptTracker, MAX_ATTEMPTS, WINDOW_SECS};
use token::{SessionClaims, TokenCodec};

/// Default session lifetime (24h).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

const SALT_LEN: usize = 16;
/// 18 random bytes encode to a 24-character url-safe password.
const GENERATED_PASSWORD_BYTES: usize = 18;

/// Wall-clock seam so expiry and throttling are testable without sleeping.
pub trait Clock: Send + Sync {
    fn now_epoch_secs(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }
}

/// Boot options, supplied by the host once.
#[derive(Clone, Debug, Default)]
pub struct AuthOptions {
    /// Run with the gate wide open (no password required anywhere).
    pub disabled: bool,
    /// Caller-supplied password; a random one is generated when absent.
    pub password: Option<String>,
    /// Session lifetime override in seconds.
    pub session_ttl_secs: Option<u64>,
}

/// What setup hands back to the host.
///
/// `generated_password` is populated only when no password was supplied;
/// this is the single place the plaintext is observable after setup, so the
/// host can surface it to an operator. It is never logged or persisted.
#[derive(Clone, Debug)]
pub struct SetupOutcome {
    pub enabled: bool,
    pub generated_password: Option<String>,
}

/// Process-wide auth state and the operations over it.
pub struct AuthGate {
    enabled: bool,
    salt: [u8; SALT_LEN],
    derived_key: Zeroizing<Vec<u8>>,
    params: kdf::KdfParams,
    codec: TokenCodec,
    session_ttl_secs: u64,
    attempts: AttemptTracker,
    clock: Arc<dyn Clock>,
}

impl AuthGate {
    /// One-time boot setup: generate a fresh salt and signing secret, derive
    /// the key for the configured (or generated) password.
    pub async fn setup(options: AuthOptions) -> Result<(Self, SetupOutcome), GateError> {
        Self::setup_with_clock(options, Arc::new(SystemClock)).await
    }

    /// [`setup`](Self::setup) with an injected clock.
    pub async fn setup_with_clock(
        options: AuthOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, SetupOutcome), GateError> {
        let enabled = !options.disabled;
        let session_ttl_secs = options
            .session_ttl_secs
            .unwrap_or(DEFAULT_SESSION_TTL_SECS);
        let params = kdf::KdfParams::default();

        let mut salt = [0u8; SALT_LEN];
        let mut derived_key = Zeroizing::new(Vec::new());
        let mut generated_password = None;

        if enabled {
            rand::rng().fill_bytes(&mut salt);
            let password = match options.password {
                Some(password) if !password.is_empty() => Zeroizing::new(password),
                _ => {
                    let password = generate_password();
                    generated_password = Some(password.clone());
                    Zeroizing::new(password)
                }
            };
            derived_key =
                tokio::task::spawn_blocking(move || kdf::derive(&password, &salt, &params))
                    .await
                    .map_err(|join| GateError::Internal(join.into()))??;
        }

        let mut signing_secret = [0u8; 32];
        rand::rng().fill_bytes(&mut signing_secret);

        let gate = Self {
            enabled,
            salt,
            derived_key,
            params,
            codec: TokenCodec::new(signing_secret, Arc::clone(&clock)),
            session_ttl_secs,
            attempts: AttemptTracker::new(MAX_ATTEMPTS, WINDOW_SECS, Arc::clone(&clock)),
            clock,
        };
        Ok((
            gate,
            SetupOutcome {
                enabled,
                generated_password,
            },
        ))
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn session_ttl_secs(&self) -> u64 {
        self.session_ttl_secs
    }

    /// The guard: does this `Cookie` header carry a valid session?
    ///
    /// Always `true` when the gate is disabled. Missing and invalid tokens
    /// are indistinguishable to the caller.
    pub fn is_authenticated(&self, cookie_header: Option<&str>) -> bool {
        if !self.enabled {
            return true;
        }
        let cookies = cookie::parse_cookies(cookie_header);
        cookies
            .get(cookie::SESSION_COOKIE)
            .is_some_and(|token| self.codec.verify(token).is_some())
    }

    /// Evaluate one login attempt; on success returns a signed session token.
    ///
    /// Order matters: the cap is checked before derivation, and the attempt
    /// is counted after the candidate was evaluated, so a successful login
    /// still consumes quota.
    pub async fn attempt_login(
        &self,
        client_addr: &str,
        candidate: &str,
    ) -> Result<String, GateError> {
        if !self.attempts.check(client_addr) {
            tracing::warn!(client_addr, "login attempt throttled");
            return Err(GateError::RateLimited);
        }

        let candidate = Zeroizing::new(candidate.to_owned());
        let salt = self.salt;
        let params = self.params;
        let derived = tokio::task::spawn_blocking(move || kdf::derive(&candidate, &salt, &params))
            .await
            .map_err(|join| GateError::Internal(join.into()))??;

        let matches = bool::from(derived.as_slice().ct_eq(self.derived_key.as_slice()));
        self.attempts.record(client_addr);
        if !matches {
            tracing::warn!(client_addr, "login rejected");
            return Err(GateError::Authentication);
        }

        let iat = self.clock.now_epoch_secs();
        let claims = SessionClaims {
            iat,
            exp: iat + self.session_ttl_secs,
        };
        Ok(self.codec.sign(&claims))
    }

    /// Evict stale attempt-tracker entries (see the server's sweep task).
    pub fn sweep_attempts(&self) {
        self.attempts.sweep_stale();
    }

    #[cfg(test)]
    pub(crate) fn saturate_attempts(&self, addr: &str) {
        for _ in 0..MAX_ATTEMPTS {
            self.attempts.record(addr);
        }
    }
}

fn generate_password() -> String {
    let mut buf = [0u8; GENERATED_PASSWORD_BYTES];
    rand::rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn session_cookie_header(token: &str) -> String {
        format!("{}={token}", cookie::SESSION_COOKIE)
    }

    #[tokio::test]
    async fn login_round_trip_with_supplied_password() {
        let (gate, outcome) = AuthGate::setup(AuthOptions {
            password: Some("correct-horse".into()),
            ..AuthOptions::default()
        })
        .await
        .unwrap();
        assert!(outcome.enabled);
        assert!(outcome.generated_password.is_none());

        let err = gate.attempt_login("10.0.0.1", "wrong").await.unwrap_err();
        assert!(matches!(err, GateError::Authentication));

        let token = gate.attempt_login("10.0.0.1", "correct-horse").await.unwrap();
        assert!(gate.is_authenticated(Some(&session_cookie_header(&token))));
        assert!(!gate.is_authenticated(None));
        assert!(!gate.is_authenticated(Some("mw_session=garbage")));
    }

    #[tokio::test]
    async fn generated_password_authenticates_immediately() {
        let (gate, outcome) = AuthGate::setup(AuthOptions::default()).await.unwrap();
        let password = outcome.generated_password.expect("password should be generated");
        assert_eq!(password.len(), 24);
        assert!(
            password
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );

        let token = gate.attempt_login("10.0.0.1", &password).await.unwrap();
        assert!(gate.is_authenticated(Some(&session_cookie_header(&token))));
    }

    #[tokio::test]
    async fn empty_supplied_password_falls_back_to_generated() {
        let (_gate, outcome) = AuthGate::setup(AuthOptions {
            password: Some(String::new()),
            ..AuthOptions::default()
        })
        .await
        .unwrap();
        assert!(outcome.generated_password.is_some());
    }

    #[tokio::test]
    async fn disabled_gate_is_wide_open() {
        let (gate, outcome) = AuthGate::setup(AuthOptions {
            disabled: true,
            ..AuthOptions::default()
        })
        .await
        .unwrap();
        assert!(!outcome.enabled);
        assert!(outcome.generated_password.is_none());
        assert!(gate.is_authenticated(None));
        assert!(gate.is_authenticated(Some("mw_session=anything")));
    }

    #[tokio::test]
    async fn exhausted_window_rejects_before_derivation() {
        let (gate, _outcome) = AuthGate::setup(AuthOptions {
            password: Some("correct-horse".into()),
            ..AuthOptions::default()
        })
        .await
        .unwrap();
        gate.saturate_attempts("10.0.0.9");
        let err = gate
            .attempt_login("10.0.0.9", "correct-horse")
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::RateLimited));

        // Other addresses are judged on the password, not on that window.
        assert!(gate.attempt_login("10.0.0.10", "correct-horse").await.is_ok());
    }

    #[tokio::test]
    async fn successful_login_consumes_quota() {
        let (gate, _outcome) = AuthGate::setup(AuthOptions {
            password: Some("correct-horse".into()),
            ..AuthOptions::default()
        })
        .await
        .unwrap();
        for _ in 0..attempts::MAX_ATTEMPTS - 1 {
            gate.attempts.record("10.0.0.1");
        }
        // 19 used; the 20th is the successful login, which still counts.
        gate.attempt_login("10.0.0.1", "correct-horse").await.unwrap();
        let err = gate
            .attempt_login("10.0.0.1", "correct-horse")
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::RateLimited));
    }

    #[tokio::test]
    async fn session_ttl_override_is_applied() {
        let (gate, _outcome) = AuthGate::setup(AuthOptions {
            password: Some("pw".into()),
            session_ttl_secs: Some(60),
            ..AuthOptions::default()
        })
        .await
        .unwrap();
        assert_eq!(gate.session_ttl_secs(), 60);
    }
}
