/// Argon2id password hashing and the account password policy
///
/// Hashes are stored in PHC string format, so parameters travel with the hash
/// and can be raised later without invalidating existing accounts.
///
/// # Example
///
/// ```
/// use hearth_shared::auth::password::{hash_password, verify_password, validate_password_strength};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// validate_password_strength("Tr3at!Time")?;
///
/// let hash = hash_password("Tr3at!Time")?;
/// assert!(verify_password("Tr3at!Time", &hash)?);
/// assert!(!verify_password("tr3at!time", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Characters that satisfy the "special character" rule
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*";

/// Minimum password length in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// A password that does not meet the account policy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least 8 characters long")]
    TooShort,

    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,

    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,

    #[error("Password must contain at least one digit")]
    MissingDigit,

    #[error("Password must contain at least one special character (!@#$%^&*)")]
    MissingSpecial,

    #[error("Password must not contain spaces")]
    ContainsWhitespace,
}

/// Hashes a password with Argon2id (19 MiB, 2 passes, 1 lane)
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(19_456)
        .t_cost(2)
        .p_cost(1)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// Returns `Ok(false)` on mismatch and an error only when the stored hash
/// itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks the account password policy
///
/// Rules are checked in a fixed order and the first violation is returned.
pub fn validate_password_strength(password: &str) -> Result<(), PasswordPolicyError> {
    if password.chars().any(char::is_whitespace) {
        return Err(PasswordPolicyError::ContainsWhitespace);
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordPolicyError::TooShort);
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(PasswordPolicyError::MissingLowercase);
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(PasswordPolicyError::MissingUppercase);
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordPolicyError::MissingDigit);
    }

    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return Err(PasswordPolicyError::MissingSpecial);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_format() {
        let hash = hash_password("Feed-the-c4t!").expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=19456"));
    }

    #[test]
    fn test_hash_password_produces_different_salts() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct_password").unwrap();

        assert!(verify_password("correct_password", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "invalid_hash").is_err());
        assert!(verify_password("password", "$argon2id$invalid").is_err());
    }

    #[test]
    fn test_policy_accepts_strong_passwords() {
        for password in ["MyP@ssw0rd", "Walk#Dog5", "C0mpl3x*Pwd"] {
            assert!(
                validate_password_strength(password).is_ok(),
                "Password '{}' should be valid",
                password
            );
        }
    }

    #[test]
    fn test_policy_violations() {
        assert_eq!(validate_password_strength("Sh0r!"), Err(PasswordPolicyError::TooShort));
        assert_eq!(
            validate_password_strength("UPPERCASE1!"),
            Err(PasswordPolicyError::MissingLowercase)
        );
        assert_eq!(
            validate_password_strength("lowercase1!"),
            Err(PasswordPolicyError::MissingUppercase)
        );
        assert_eq!(
            validate_password_strength("NoDigits!!"),
            Err(PasswordPolicyError::MissingDigit)
        );
        assert_eq!(
            validate_password_strength("NoSpecial123"),
            Err(PasswordPolicyError::MissingSpecial)
        );
        assert_eq!(
            validate_password_strength("Has Space1!"),
            Err(PasswordPolicyError::ContainsWhitespace)
        );
    }

    #[test]
    fn test_policy_special_set_is_restricted() {
        // '?' and '-' are not part of the accepted set
        assert_eq!(
            validate_password_strength("Question1?"),
            Err(PasswordPolicyError::MissingSpecial)
        );
        assert!(validate_password_strength("Question1?&").is_ok());
    }
}
