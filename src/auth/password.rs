use std::fmt;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use serde::Deserialize;
use thiserror::Error;
use tracing::error;
use zeroize::Zeroizing;

use crate::config::HashConfig;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid argon2 parameters: {0}")]
    Params(argon2::Error),
    #[error("argon2 failure: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("hashing task aborted")]
    Task(#[from] tokio::task::JoinError),
}

/// Plaintext password held only for the duration of a request; wiped on drop.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Password(Zeroizing<String>);

impl Password {
    #[cfg(test)]
    pub fn new(plain: impl Into<String>) -> Self {
        Self(Zeroizing::new(plain.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Argon2id hasher with configurable cost.
#[derive(Clone)]
pub struct Hasher {
    argon2: Argon2<'static>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl Hasher {
    pub fn from_config(cfg: &HashConfig) -> Result<Self, PasswordError> {
        if cfg.memory_kib.is_none() && cfg.iterations.is_none() {
            return Ok(Self::default());
        }
        let params = Params::new(
            cfg.memory_kib.unwrap_or(Params::DEFAULT_M_COST),
            cfg.iterations.unwrap_or(Params::DEFAULT_T_COST),
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(PasswordError::Params)?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, password: &Password) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.expose().as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                PasswordError::Hash(e)
            })?
            .to_string();
        Ok(hash)
    }

    pub fn verify(&self, password: &Password, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            PasswordError::Hash(e)
        })?;
        Ok(self
            .argon2
            .verify_password(password.expose().as_bytes(), &parsed)
            .is_ok())
    }

    /// Hashes on the blocking pool; the password is wiped when the task ends.
    pub async fn hash_blocking(&self, password: Password) -> Result<String, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password)).await?
    }

    pub async fn verify_blocking(
        &self,
        password: Password,
        hash: String,
    ) -> Result<bool, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await?
    }
}
