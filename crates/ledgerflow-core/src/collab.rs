//! Collaborators of the relational path
//!
//! Object storage supplies the transaction file and a secret store supplies
//! database credentials. Both are traits so the driver can be exercised
//! without cloud access.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::CollaboratorError;

/// Read-only object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full body of `bucket/key`
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, CollaboratorError>;
}

/// Secret lookup by identifier
#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Resolve the secret string stored under `secret_id`
    async fn resolve(&self, secret_id: &str) -> Result<SecretString, CollaboratorError>;
}

/// Database login parsed from a secret payload
#[derive(Clone)]
pub struct DbCredentials {
    /// Database host
    pub host: String,
    /// Login user
    pub username: String,
    /// Login password
    pub password: SecretString,
}

impl std::fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbCredentials")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Deserialize)]
struct RawCredentials {
    host: String,
    username: String,
    password: String,
}

impl DbCredentials {
    /// Parse a `{"host", "username", "password"}` JSON secret
    pub fn from_secret(secret: &SecretString) -> Result<Self, CollaboratorError> {
        let raw: RawCredentials = serde_json::from_str(secret.expose_secret())
            .map_err(|e| CollaboratorError::InvalidPayload(format!("database secret: {}", e)))?;

        Ok(Self {
            host: raw.host,
            username: raw.username,
            password: SecretString::from(raw.password),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_credentials() {
        let secret = SecretString::from(
            r#"{"host":"db.internal","username":"ledger","password":"pw","port":5432}"#.to_string(),
        );
        let creds = DbCredentials::from_secret(&secret).unwrap();
        assert_eq!(creds.host, "db.internal");
        assert_eq!(creds.username, "ledger");
        assert_eq!(creds.password.expose_secret(), "pw");
        assert!(format!("{:?}", creds).contains("***"));
    }

    #[test]
    fn test_missing_field() {
        let secret = SecretString::from(r#"{"host":"db"}"#.to_string());
        assert!(matches!(
            DbCredentials::from_secret(&secret),
            Err(CollaboratorError::InvalidPayload(_))
        ));
    }
}
