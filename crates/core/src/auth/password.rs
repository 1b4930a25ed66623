//! Argon2id password hashing.

use anyhow::Context;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::OnceLock;

pub const MIN_PASSWORD_LEN: usize = 8;

static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

/// PHC-format Argon2id hash with a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// `Ok(false)` on mismatch. Errors only when the stored hash itself is unusable.
pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("stored password hash is not a valid PHC string")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("password verification failed: {e}")),
    }
}

/// Burns one Argon2 verification for a login whose email matched nobody, so
/// unknown and known accounts take the same time to reject. Always `false`.
pub fn verify_unknown_user(password: &str) -> bool {
    let dummy = DUMMY_HASH.get_or_init(|| match hash_password("stratify-unknown-user") {
        Ok(hash) => Some(hash),
        Err(e) => {
            tracing::warn!(error = %e, "dummy password hash unavailable");
            None
        }
    });
    if let Some(hash) = dummy {
        let _ = verify_password(password, hash);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn salts_differ_per_hash() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_user_never_verifies() {
        assert!(!verify_unknown_user("stratify-unknown-user"));
        assert!(!verify_unknown_user("anything else"));
        assert!(DUMMY_HASH.get().unwrap().as_deref().unwrap().starts_with("$argon2id$"));
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(verify_password("x", "not-a-hash").is_err());
    }
}
