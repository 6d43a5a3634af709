use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

const GENERATED_TOKEN_LEN: usize = 48;

/// Decides whether a bearer credential belongs to an administrator.
pub trait AdminVerifier: Send + Sync {
    fn is_admin(&self, bearer_token: &str) -> bool;
}

/// A single shared admin token, held only as its SHA-256 digest.
#[derive(Clone)]
pub struct AdminToken {
    digest: [u8; 32],
}

impl AdminToken {
    pub fn from_plain(token: &str) -> Self {
        Self {
            digest: sha256(token),
        }
    }

    /// Accepts the URL-safe, unpadded base64 digest produced by [`token_digest`].
    pub fn from_digest(encoded: &str) -> AppResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|err| AppError::InvalidConfig {
                key: "ADMIN_TOKEN_SHA256",
                message: err.to_string(),
            })?;
        let digest: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| AppError::InvalidConfig {
            key: "ADMIN_TOKEN_SHA256",
            message: format!("expected a 32-byte digest, got {} bytes", bytes.len()),
        })?;
        Ok(Self { digest })
    }
}

impl AdminVerifier for AdminToken {
    fn is_admin(&self, bearer_token: &str) -> bool {
        let candidate = sha256(bearer_token);
        // constant-time compare
        candidate
            .iter()
            .zip(self.digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminToken(..)")
    }
}

/// Digest form of a token, suitable for `ADMIN_TOKEN_SHA256`.
pub fn token_digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

pub fn generate_admin_token() -> String {
    random_string(GENERATED_TOKEN_LEN)
}

/// Extracts the credential from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

fn sha256(value: &str) -> [u8; 32] {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&Sha256::digest(value.as_bytes()));
    digest
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
