//! Password hashing and generated agent credentials.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::{Rng, distributions::Alphanumeric, rngs::OsRng};
use std::sync::LazyLock;

use crate::error::AppError;

/// Length of the initial secret issued to a new agent.
pub const AGENT_SECRET_LEN: usize = 24;

/// Hash a plaintext password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Returns `Ok(false)` on mismatch and an error only if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(format!("verify error: {e}"))),
    }
}

/// Stand-in hash for usernames that do not exist, so a failed lookup costs
/// the same Argon2 work as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no-such-user-placeholder").ok());

/// Runs a full verification against the stand-in hash and always rejects.
pub fn reject_unknown_user(password: &str) -> bool {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
    false
}

/// Initial login secret for a new agent, drawn from the OS RNG. It is only
/// ever stored hashed and reaches the agent through the invitation mail.
pub fn generate_agent_secret() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(AGENT_SECRET_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(verify_password("hunter2hunter2", &hash).unwrap());
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn unknown_user_is_rejected_after_real_verification() {
        assert!(DUMMY_HASH.as_deref().is_some_and(|h| h.starts_with("$argon2id$")));
        assert!(!reject_unknown_user("no-such-user-placeholder"));
        assert!(!reject_unknown_user("anything"));
    }

    #[test]
    fn agent_secret_is_long_and_alphanumeric() {
        let secret = generate_agent_secret();
        assert_eq!(secret.len(), AGENT_SECRET_LEN);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn agent_secrets_differ() {
        assert_ne!(generate_agent_secret(), generate_agent_secret());
    }
}
