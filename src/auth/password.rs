/// Password Hashing and Verification
///
/// bcrypt with a per-hash random salt. Verification fails closed: any
/// mismatch or unreadable hash is simply `false`.

use bcrypt::{hash, verify};

use crate::error::AppError;

/// bcrypt reads at most this many bytes of input; anything longer would be
/// silently truncated, so it is refused instead
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Plaintext used to build the decoy hash; never matches a real login
const DECOY_PASSWORD: &str = "decoy-password-for-unknown-accounts";

#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    decoy_hash: String,
}

impl PasswordHasher {
    /// Prepares a hasher with the given bcrypt cost (4..=31)
    ///
    /// # Errors
    /// Returns error if bcrypt rejects the cost
    pub fn new(cost: u32) -> Result<Self, AppError> {
        let decoy_hash = hash(DECOY_PASSWORD, cost)
            .map_err(|e| AppError::Internal(format!("Password hasher setup failed: {}", e)))?;
        Ok(Self { cost, decoy_hash })
    }

    /// Hash a password
    ///
    /// # Errors
    /// Returns error if bcrypt fails or the input exceeds its 72-byte limit
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::Internal("Password exceeds bcrypt input limit".to_string()));
        }
        hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against its stored hash
    ///
    /// Over-long input never matches, even if its first 72 bytes do.
    pub fn verify(&self, password: &str, password_hash: &str) -> bool {
        if password.len() > MAX_PASSWORD_BYTES {
            self.verify_decoy(password);
            return false;
        }
        match verify(password, password_hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!("Stored password hash could not be read: {}", e);
                false
            }
        }
    }

    /// Spends one verification worth of time for an account that does not
    /// exist, so response latency does not reveal which emails are registered.
    pub fn verify_decoy(&self, password: &str) {
        let prefix = truncate_to_limit(password);
        let _ = verify(prefix, &self.decoy_hash);
    }
}

/// Longest prefix within the bcrypt limit that ends on a char boundary
fn truncate_to_limit(password: &str) -> &str {
    if password.len() <= MAX_PASSWORD_BYTES {
        return password;
    }
    let mut end = MAX_PASSWORD_BYTES;
    while !password.is_char_boundary(end) {
        end -= 1;
    }
    &password[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4).expect("Failed to build hasher")
    }

    #[test]
    fn test_hash_password() {
        let password = "ValidPassword123";
        let hash = hasher().hash(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let hasher = hasher();
        let first = hasher.hash("ValidPassword123").unwrap();
        let second = hasher.hash("ValidPassword123").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("ValidPassword123", &first));
        assert!(hasher.verify("ValidPassword123", &second));
    }

    #[test]
    fn test_verify_wrong_password() {
        let hasher = hasher();
        let hash = hasher.hash("ValidPassword123").unwrap();

        assert!(!hasher.verify("WrongPassword123", &hash));
    }

    #[test]
    fn test_malformed_hash_fails_closed() {
        let hasher = hasher();

        assert!(!hasher.verify("ValidPassword123", "not-a-bcrypt-hash"));
        assert!(!hasher.verify("ValidPassword123", ""));
    }

    #[test]
    fn test_long_password_sharing_the_first_72_bytes_is_rejected() {
        let hasher = hasher();
        let stored = format!("Aa1{}", "x".repeat(69));
        assert_eq!(stored.len(), MAX_PASSWORD_BYTES);
        let hash = hasher.hash(&stored).unwrap();

        assert!(hasher.verify(&stored, &hash));
        let longer = format!("{}TOTALLY-DIFFERENT-SUFFIX", stored);
        assert!(!hasher.verify(&longer, &hash));
    }

    #[test]
    fn test_over_long_password_is_not_hashed() {
        let too_long = "A1".repeat(40);
        assert!(hasher().hash(&too_long).is_err());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let password = "é".repeat(40);
        let prefix = truncate_to_limit(&password);
        assert!(prefix.len() <= MAX_PASSWORD_BYTES);
        assert_eq!(truncate_to_limit("short"), "short");
    }

    #[test]
    fn test_invalid_cost_is_rejected() {
        assert!(PasswordHasher::new(2).is_err());
    }
}
