use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// PHC-encoded Argon2id hash. Each call draws a fresh salt, so equal
/// passwords never share a stored hash.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    match Argon2::default().hash_password(plain.as_bytes(), &salt) {
        Ok(phc) => Ok(phc.to_string()),
        Err(e) => {
            error!(error = %e, "password hashing failed");
            Err(anyhow!("password hashing failed: {e}"))
        }
    }
}

/// A mismatch is `Ok(false)`. An unparsable stored hash is the only error.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let phc = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is corrupt");
        anyhow!("stored password hash is corrupt: {e}")
    })?;
    let matches = Argon2::default()
        .verify_password(plain.as_bytes(), &phc)
        .is_ok();
    Ok(matches)
}
