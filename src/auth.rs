use crate::error::DomainError;
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
}

/// Email + password exchange. No tokens, no refresh, no expiry.
pub trait IdentityProvider {
    fn sign_in(&self, email: &str, password: &str) -> Result<Identity, DomainError>;
    fn sign_up(&self, email: &str, password: &str) -> Result<Identity, DomainError>;
}

/// Credentials kept in the workspace's `users` table as salted SHA-256.
pub struct LocalIdentity<'a> {
    conn: &'a Connection,
}

impl<'a> LocalIdentity<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        LocalIdentity { conn }
    }
}

impl IdentityProvider for LocalIdentity<'_> {
    fn sign_in(&self, email: &str, password: &str) -> Result<Identity, DomainError> {
        let email = normalize_email(email);
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT salt, password_hash FROM users WHERE email = ?",
                [&email],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let Some((salt, expected)) = row else {
            return Err(DomainError::AuthFailed);
        };
        if hash_password(&salt, password) != expected {
            return Err(DomainError::AuthFailed);
        }
        Ok(Identity { email })
    }

    fn sign_up(&self, email: &str, password: &str) -> Result<Identity, DomainError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(DomainError::EmptyField("email"));
        }
        if !email.contains('@') {
            return Err(DomainError::Invalid {
                field: "email",
                message: "must contain @".to_string(),
            });
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::Invalid {
                field: "password",
                message: format!("must have at least {} characters", MIN_PASSWORD_LEN),
            });
        }
        let exists: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM users WHERE email = ?", [&email], |r| r.get(0))
            .optional()?;
        if exists.is_some() {
            return Err(DomainError::AlreadyExists(format!("user {}", email)));
        }
        let salt = Uuid::new_v4().simple().to_string();
        self.conn.execute(
            "INSERT INTO users(email, salt, password_hash, created_at) VALUES(?, ?, ?, ?)",
            (&email, &salt, hash_password(&salt, password), chrono::Utc::now().to_rfc3339()),
        )?;
        Ok(Identity { email })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}
