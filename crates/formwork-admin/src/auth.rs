//! Password hashing and operator authentication.

use anyhow::{Context as _, bail};
use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use formwork_core::store::FormStore;
use rand_core::OsRng;

/// Hash `password` into an argon2 PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string(),
  )
}

/// Check `password` against a stored PHC string. Malformed hashes never
/// verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(hash) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

/// Confirm that `username` is an active user whose stored hash matches
/// `password`.
pub async fn authenticate<S>(store: &S, username: &str, password: &str) -> anyhow::Result<()>
where
  S: FormStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let user = store
    .find_user(username)
    .await
    .context("failed to look up user")?;
  match user {
    Some(user) if verify_password(password, &user.password_hash) => Ok(()),
    _ => bail!("invalid credentials for `{username}`"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_verifies_only_its_password() {
    let hash = hash_password("hunter2").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("hunter2", &hash));
    assert!(!verify_password("hunter3", &hash));
  }

  #[test]
  fn malformed_hash_is_rejected() {
    assert!(!verify_password("anything", "not-a-phc-string"));
    assert!(!verify_password("", ""));
  }

  #[test]
  fn salts_differ_between_hashes() {
    let a = hash_password("same").unwrap();
    let b = hash_password("same").unwrap();
    assert_ne!(a, b);
  }
}
