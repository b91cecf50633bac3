// Password hashing
//
// PBKDF2-HMAC-SHA256 with a random per-password salt. Stored form:
//   pbkdf2-sha256$<iterations>$<salt b64>$<hash b64>

use anyhow::{bail, Context, Result};
use base64::Engine;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_BYTES: usize = 16;
const HASH_BYTES: usize = 32;

pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// One-way credential hashing.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> Result<String>;

    /// False for any malformed or foreign hash.
    fn verify(&self, plain: &str, hashed: &str) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct Pbkdf2Hasher {
    iterations: NonZeroU32,
}

impl Pbkdf2Hasher {
    pub fn new(iterations: u32) -> Result<Self> {
        let iterations =
            NonZeroU32::new(iterations).context("Password hash iterations must be at least 1")?;
        Ok(Self { iterations })
    }
}

impl Default for Pbkdf2Hasher {
    fn default() -> Self {
        Self {
            iterations: NonZeroU32::MIN.saturating_add(DEFAULT_ITERATIONS - 1),
        }
    }
}

impl PasswordHasher for Pbkdf2Hasher {
    fn hash(&self, plain: &str) -> Result<String> {
        let mut salt = [0u8; SALT_BYTES];
        SystemRandom::new()
            .fill(&mut salt)
            .map_err(|_| anyhow::anyhow!("Failed to generate password salt"))?;

        let mut out = [0u8; HASH_BYTES];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            &salt,
            plain.as_bytes(),
            &mut out,
        );

        let b64 = base64::engine::general_purpose::STANDARD;
        Ok(format!(
            "{}${}${}${}",
            SCHEME,
            self.iterations,
            b64.encode(salt),
            b64.encode(out)
        ))
    }

    fn verify(&self, plain: &str, hashed: &str) -> bool {
        verify_encoded(plain, hashed).unwrap_or(false)
    }
}

fn verify_encoded(plain: &str, hashed: &str) -> Result<bool> {
    let parts: Vec<&str> = hashed.split('$').collect();
    if parts.len() != 4 || parts[0] != SCHEME {
        bail!("Unrecognised password hash format");
    }

    let iterations: u32 = parts[1].parse().context("Invalid iteration count")?;
    let iterations = NonZeroU32::new(iterations).context("Iteration count is zero")?;
    let b64 = base64::engine::general_purpose::STANDARD;
    let salt = b64.decode(parts[2]).context("Invalid salt encoding")?;
    let expected = b64.decode(parts[3]).context("Invalid hash encoding")?;

    Ok(pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        plain.as_bytes(),
        &expected,
    )
    .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> Pbkdf2Hasher {
        Pbkdf2Hasher::new(1_000).unwrap()
    }

    #[test]
    fn hash_is_not_plaintext_and_verifies() {
        let hasher = fast();
        let hashed = hasher.hash("abcdef").unwrap();
        assert_ne!(hashed, "abcdef");
        assert!(hashed.starts_with("pbkdf2-sha256$1000$"));
        assert!(hasher.verify("abcdef", &hashed));
        assert!(!hasher.verify("abcdeg", &hashed));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let hasher = fast();
        let a = hasher.hash("same-password").unwrap();
        let b = hasher.hash("same-password").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("same-password", &a));
        assert!(hasher.verify("same-password", &b));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        let hasher = fast();
        assert!(!hasher.verify("x", ""));
        assert!(!hasher.verify("x", "md5$abc"));
        assert!(!hasher.verify("x", "pbkdf2-sha256$0$AAAA$AAAA"));
        assert!(!hasher.verify("x", "pbkdf2-sha256$10$not base64$AAAA"));
    }

    #[test]
    fn zero_iterations_rejected() {
        assert!(Pbkdf2Hasher::new(0).is_err());
        assert!(Pbkdf2Hasher::new(1).is_ok());
    }

    #[test]
    fn default_uses_default_iterations() {
        let hashed = Pbkdf2Hasher::default().hash("abcdef").unwrap();
        assert!(hashed.starts_with(&format!("pbkdf2-sha256${}$", DEFAULT_ITERATIONS)));
    }
}
