/// Configuration for the API server
///
/// Loaded from environment variables, with a `.env` file honoured in
/// development.
///
/// # Environment Variables
///
/// - `API_HOST`: bind host (default: 0.0.0.0)
/// - `API_PORT`: bind port (default: 8000)
/// - `API_URL`: public base URL used in media links (default: http://localhost:8000)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for any (default: *)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `JWT_SECRET`: token signing key, at least 32 characters (required)
/// - `API_KEY`: static client key expected in `x-api-key` (required)
/// - `CRYPTO_SECRET`: field encryption secret, at least 32 characters (required)
/// - `FILES_PATH`: upload directory (default: ./files)
/// - `MAX_UPLOAD_BYTES`: upload size limit (default: 10 MiB)
/// - `ADMIN_EMAIL` / `ADMIN_PASSWORD`: bootstrap administrator (optional)
///
/// # Example
///
/// ```no_run
/// use hearth_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const MIN_SECRET_LENGTH: usize = 32;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    /// Administrator created at startup if missing
    pub admin: Option<AdminBootstrap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Base URL clients reach the API at, without trailing slash
    pub public_url: String,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Generate with `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Expected value of the `x-api-key` header
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Field encryption secret
    #[serde(skip_serializing)]
    pub crypto_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub files_path: PathBuf,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminBootstrap {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl Config {
    /// Loads configuration from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
        };

        let port = var("API_PORT", "8000")
            .parse::<u16>()
            .context("API_PORT must be a valid port number")?;

        let max_connections = var("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(v) => v.parse::<usize>().context("MAX_UPLOAD_BYTES must be a byte count")?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < MIN_SECRET_LENGTH {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_SECRET_LENGTH);
        }

        let crypto_secret = required("CRYPTO_SECRET")?;
        if crypto_secret.len() < MIN_SECRET_LENGTH {
            anyhow::bail!("CRYPTO_SECRET must be at least {} characters long", MIN_SECRET_LENGTH);
        }

        let cors_origins = var("CORS_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let admin = match (lookup("ADMIN_EMAIL"), lookup("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(AdminBootstrap { email, password })
            }
            _ => None,
        };

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST", "0.0.0.0"),
                port,
                public_url: var("API_URL", "http://localhost:8000")
                    .trim_end_matches('/')
                    .to_string(),
                cors_origins,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            security: SecurityConfig {
                api_key: required("API_KEY")?,
                crypto_secret,
            },
            storage: StorageConfig {
                files_path: PathBuf::from(var("FILES_PATH", "./files")),
                max_upload_bytes,
            },
            admin,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("DATABASE_URL", "postgresql://localhost/hearth_test".to_string()),
            ("JWT_SECRET", "j".repeat(32)),
            ("CRYPTO_SECRET", "c".repeat(40)),
            ("API_KEY", "client-key".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> anyhow::Result<Config> {
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.api.public_url, "http://localhost:8000");
        assert!(config.allows_any_origin());
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.storage.files_path, PathBuf::from("./files"));
        assert_eq!(config.storage.max_upload_bytes, 10 * 1024 * 1024);
        assert!(config.admin.is_none());
    }

    #[test]
    fn test_overrides() {
        let mut env = base_env();
        env.insert("API_PORT", "9001".to_string());
        env.insert("API_URL", "https://hearth.example/".to_string());
        env.insert("CORS_ORIGINS", "https://a.example, https://b.example".to_string());
        env.insert("ADMIN_EMAIL", "root@hearth.example".to_string());
        env.insert("ADMIN_PASSWORD", "R00t!pass".to_string());

        let config = load(&env).unwrap();

        assert_eq!(config.api.port, 9001);
        assert_eq!(config.api.public_url, "https://hearth.example");
        assert_eq!(config.api.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert!(!config.allows_any_origin());
        assert_eq!(config.admin.map(|a| a.email).as_deref(), Some("root@hearth.example"));
    }

    #[test]
    fn test_missing_required_values() {
        for key in ["DATABASE_URL", "JWT_SECRET", "CRYPTO_SECRET", "API_KEY"] {
            let mut env = base_env();
            env.remove(key);
            let err = load(&env).unwrap_err().to_string();
            assert!(err.contains(key), "{} should be reported, got {}", key, err);
        }
    }

    #[test]
    fn test_short_secrets_are_rejected() {
        let mut env = base_env();
        env.insert("JWT_SECRET", "short".to_string());
        assert!(load(&env).is_err());

        let mut env = base_env();
        env.insert("CRYPTO_SECRET", "short".to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_invalid_port() {
        let mut env = base_env();
        env.insert("API_PORT", "eighty".to_string());
        assert!(load(&env).is_err());
    }
}
