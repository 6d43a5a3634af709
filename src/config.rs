use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::auth::{generate_admin_token, AdminToken};
use crate::error::{AppError, AppResult};

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Where the admin credential came from.
#[derive(Clone)]
pub enum AdminCredential {
    Token(AdminToken),
    /// No credential was configured; this token was generated for this run.
    Generated { token: AdminToken, plain: String },
}

impl AdminCredential {
    pub fn token(&self) -> &AdminToken {
        match self {
            AdminCredential::Token(token) => token,
            AdminCredential::Generated { token, .. } => token,
        }
    }
}

impl std::fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminCredential::Token(_) => f.write_str("Token(..)"),
            AdminCredential::Generated { .. } => f.write_str("Generated(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub admin: AdminCredential,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = value("READING_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let raw_addr = value("READING_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .parse::<SocketAddr>()
            .map_err(|err| AppError::InvalidConfig {
                key: "READING_BIND_ADDR",
                message: format!("'{raw_addr}': {err}"),
            })?;

        let admin = match (value("ADMIN_TOKEN"), value("ADMIN_TOKEN_SHA256")) {
            (Some(_), Some(_)) => {
                return Err(AppError::InvalidConfig {
                    key: "ADMIN_TOKEN",
                    message: "set either ADMIN_TOKEN or ADMIN_TOKEN_SHA256, not both".into(),
                })
            }
            (Some(plain), None) => AdminCredential::Token(AdminToken::from_plain(&plain)),
            (None, Some(digest)) => AdminCredential::Token(AdminToken::from_digest(&digest)?),
            (None, None) => {
                let plain = generate_admin_token();
                AdminCredential::Generated {
                    token: AdminToken::from_plain(&plain),
                    plain,
                }
            }
        };

        Ok(Self {
            data_dir,
            bind_addr,
            admin,
        })
    }
}
