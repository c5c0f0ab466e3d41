//! Password hashing with bcrypt.
//!
//! Digests are self-describing (`$2b$<cost>$<salt><hash>`), so the salt
//! travels with the digest and needs no separate storage.

use bcrypt::{DEFAULT_COST, hash, verify};
use thiserror::Error;

/// Work factor used for every stored password.
pub const PASSWORD_HASH_COST: u32 = DEFAULT_COST;

/// bcrypt ignores everything past this many bytes of input.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Error)]
pub enum HashingError {
    #[error("password exceeds {MAX_PASSWORD_BYTES} bytes")]
    TooLong,
    #[error("password hashing failed: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// Stateless bcrypt hasher. Safe to share across requests without locking.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self {
            cost: PASSWORD_HASH_COST,
        }
    }

    /// Hasher with a custom work factor. Only tests should go below the default.
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    /// Hashes `password` with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, HashingError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(HashingError::TooLong);
        }
        Ok(hash(password, self.cost)?)
    }

    /// Checks `password` against `digest`.
    ///
    /// Returns `false` on mismatch and on a malformed digest; the comparison
    /// inside bcrypt is constant-time.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        if password.len() > MAX_PASSWORD_BYTES {
            return false;
        }
        verify(password, digest).unwrap_or(false)
    }
}
