//! Password key derivation.
//!
//! Wraps scrypt with the gate's fixed cost profile and a working-memory
//! precheck. Derivation is CPU-bound; async callers must dispatch it to the
//! blocking pool (`AuthGate` does).

use thiserror::Error;
use zeroize::Zeroizing;

/// log2 of the scrypt CPU/memory cost (N = 2^15 = 32768).
pub const DEFAULT_LOG_N: u8 = 15;
/// scrypt block size.
pub const DEFAULT_R: u32 = 8;
/// scrypt parallelism.
pub const DEFAULT_P: u32 = 1;
/// Derived key length in bytes.
pub const DEFAULT_KEY_LEN: usize = 32;

/// Floor for the working-memory budget (64 MiB), matching the smallest
/// allowance the original deployment granted the KDF.
const MEMORY_FLOOR_BYTES: usize = 64 * 1024 * 1024;
/// Hard ceiling on the working-memory budget. Derivation fails loudly when
/// the parameters would need more than this.
const MEMORY_CEILING_BYTES: usize = 256 * 1024 * 1024;

/// scrypt cost knobs. Defaults keep one verification in the
/// hundreds-of-milliseconds range while resisting offline brute force.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
    pub key_len: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            log_n: DEFAULT_LOG_N,
            r: DEFAULT_R,
            p: DEFAULT_P,
            key_len: DEFAULT_KEY_LEN,
        }
    }
}

impl KdfParams {
    /// Working memory scrypt needs for these parameters, plus the in/out
    /// buffers: `128 * N * r + key_len + salt_len` bytes.
    fn required_memory(&self, salt_len: usize) -> usize {
        let n = 1usize << self.log_n;
        (128usize)
            .saturating_mul(n)
            .saturating_mul(self.r as usize)
            .saturating_add(self.key_len)
            .saturating_add(salt_len)
    }
}

#[derive(Debug, Error)]
pub enum KdfError {
    #[error("invalid scrypt parameters")]
    InvalidParams,

    #[error("scrypt would need {required} bytes of working memory (budget {budget})")]
    MemoryLimit { required: usize, budget: usize },

    #[error("invalid derived key length")]
    OutputLen,
}

/// Derive a fixed-length key from `password` and `salt`.
///
/// Deterministic for fixed inputs. The output buffer is zeroized on drop.
pub fn derive(
    password: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<Vec<u8>>, KdfError> {
    // Budget the requirement doubled for headroom, never below the floor;
    // refuse rather than let the platform swap or truncate.
    let required = params.required_memory(salt.len());
    let budget = required.saturating_mul(2).max(MEMORY_FLOOR_BYTES);
    if budget > MEMORY_CEILING_BYTES {
        return Err(KdfError::MemoryLimit {
            required,
            budget: MEMORY_CEILING_BYTES,
        });
    }

    let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, params.key_len)
        .map_err(|_| KdfError::InvalidParams)?;

    let mut key = Zeroizing::new(vec![0u8; params.key_len]);
    scrypt::scrypt(password.as_bytes(), salt, &scrypt_params, &mut key)
        .map_err(|_| KdfError::OutputLen)?;
    Ok(key)
}
