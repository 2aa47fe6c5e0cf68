/// Authentication and authorization
///
/// - [`password`]: Argon2id hashing and the account password policy
/// - [`jwt`]: access/refresh token issuance and validation
/// - [`api_key`]: static client key verification
/// - [`middleware`]: API key guard and the per-request [`middleware::AuthContext`]
/// - [`authorization`]: house, parent and admin checks
///
/// # Example
///
/// ```
/// use hearth_shared::auth::password::{hash_password, verify_password};
/// use hearth_shared::auth::jwt::{issue_token_pair, validate_access_token};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Tr3at!Time")?;
/// assert!(verify_password("Tr3at!Time", &hash)?);
///
/// let secret = "a-secret-key-that-is-long-enough!!";
/// let pair = issue_token_pair(Uuid::new_v4(), secret)?;
/// validate_access_token(&pair.access_token, secret)?;
/// # Ok(())
/// # }
/// ```

pub mod api_key;
pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
