// UserStore - account lookup and provisioning
//
// The handshake path only ever reads (find_user); writes come from the
// provisioning CLI. Salt and verifier are produced by the SRP engine
// inside the store, so callers never handle password material beyond
// the add_user argument.

use std::sync::Arc;

use async_trait::async_trait;
use subtle::ConstantTimeEq;
use thiserror::Error;

use styx_shared::auth::SrpEngine;
use styx_shared::database::{Database, FieldExt};

use crate::auth_codes::MAX_STRING_BYTES;

/// Longest username the wire format can carry (terminator excluded)
pub const MAX_USERNAME_BYTES: usize = MAX_STRING_BYTES - 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("username or email already registered")]
    Duplicate,
    #[error("password check failed")]
    AuthFailed,
    #[error("invalid account data: {0}")]
    Invalid(&'static str),
    #[error("store backend: {0}")]
    Backend(#[from] anyhow::Error),
}

/// One account row as the handshake needs it
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    pub salt: Vec<u8>,
    pub verifier: Vec<u8>,
}

/// Contract between the negotiate handler / provisioning CLI and the
/// persistent store. Lookup is case-insensitive; the returned username
/// is the canonical form as registered.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<UserRecord, StoreError>;

    async fn add_user(&self, username: &str, email: &str, password: &str)
        -> Result<(), StoreError>;

    /// Provisioning-side password check; recomputes the verifier from
    /// the stored salt. Not used during handshakes.
    async fn login_user(&self, username: &str, password: &str) -> Result<(), StoreError>;
}

fn validate_new_user(username: &str, email: &str, password: &str) -> Result<(), StoreError> {
    if username.is_empty() || username.len() > MAX_USERNAME_BYTES {
        return Err(StoreError::Invalid("username length out of range"));
    }
    if username.contains('\0') || email.contains('\0') {
        return Err(StoreError::Invalid("embedded NUL"));
    }
    if email.is_empty() {
        return Err(StoreError::Invalid("empty email"));
    }
    if password.is_empty() {
        return Err(StoreError::Invalid("empty password"));
    }
    Ok(())
}

fn check_password(
    engine: &SrpEngine,
    record: &UserRecord,
    password: &str,
) -> Result<(), StoreError> {
    let derived = engine.verifier_with_salt(&record.username, password, &record.salt);
    if derived.len() == record.verifier.len() && bool::from(derived.ct_eq(&record.verifier)) {
        Ok(())
    } else {
        Err(StoreError::AuthFailed)
    }
}

/// SQL-backed store; one `users` row per account, salt and verifier
/// hex-encoded.
pub struct SqlUserStore {
    db: Database,
    engine: Arc<SrpEngine>,
}

impl SqlUserStore {
    pub fn new(db: Database, engine: Arc<SrpEngine>) -> Self {
        SqlUserStore { db, engine }
    }

    /// Create the users table on first run
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.db
            .execute(
                "CREATE TABLE IF NOT EXISTS users ( \
                 username TEXT NOT NULL UNIQUE, \
                 email TEXT NOT NULL UNIQUE, \
                 salt TEXT NOT NULL, \
                 verifier TEXT NOT NULL)",
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for SqlUserStore {
    async fn find_user(&self, username: &str) -> Result<UserRecord, StoreError> {
        let sql = format!(
            "SELECT username, email, salt, verifier FROM users \
             WHERE LOWER(username) = LOWER('{}')",
            Database::escape_string(username)
        );
        let row = self.db.query_one(&sql).await?.ok_or(StoreError::NotFound)?;

        let salt = hex::decode(row.get_string(2))
            .map_err(|_| StoreError::Invalid("stored salt is not hex"))?;
        let verifier = hex::decode(row.get_string(3))
            .map_err(|_| StoreError::Invalid("stored verifier is not hex"))?;

        Ok(UserRecord {
            username: row.get_string(0),
            email: row.get_string(1),
            salt,
            verifier,
        })
    }

    async fn add_user(&self, username: &str, email: &str, password: &str)
        -> Result<(), StoreError> {
        validate_new_user(username, email, password)?;

        let sql = format!(
            "SELECT username FROM users \
             WHERE LOWER(username) = LOWER('{}') OR LOWER(email) = LOWER('{}')",
            Database::escape_string(username),
            Database::escape_string(email)
        );
        if self.db.query_one(&sql).await?.is_some() {
            return Err(StoreError::Duplicate);
        }

        let (salt, verifier) = self.engine.compute_verifier(username, password);
        let sql = format!(
            "INSERT INTO users (username, email, salt, verifier) \
             VALUES ('{}', '{}', '{}', '{}')",
            Database::escape_string(username),
            Database::escape_string(email),
            hex::encode(&salt),
            hex::encode(&verifier)
        );
        self.db.execute(&sql).await?;
        Ok(())
    }

    async fn login_user(&self, username: &str, password: &str) -> Result<(), StoreError> {
        let record = self.find_user(username).await?;
        check_password(&self.engine, &record, password)
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(Arc::new(SrpEngine::new("rfc5054.2048").unwrap()))
    }

    #[tokio::test]
    async fn test_add_and_find() {
        let store = store();
        store
            .add_user("TestUser", "testuser@example.com", "VsGnJghDUW6C")
            .await
            .unwrap();

        let record = store.find_user("TestUser").await.unwrap();
        assert_eq!(record.username, "TestUser");
        assert_eq!(record.email, "testuser@example.com");
        assert_eq!(record.salt.len(), styx_shared::auth::SALT_LEN);
        assert_eq!(record.verifier.len(), 256);

        // Lookup is case-insensitive, canonical form comes back
        let record = store.find_user("TESTUSER").await.unwrap();
        assert_eq!(record.username, "TestUser");
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let store = store();
        store
            .add_user("TestUser", "testuser@example.com", "VsGnJghDUW6C")
            .await
            .unwrap();

        let before = store.find_user("TestUser").await.unwrap();

        assert!(matches!(
            store
                .add_user("testuser", "other@example.com", "pw")
                .await,
            Err(StoreError::Duplicate)
        ));
        assert!(matches!(
            store
                .add_user("OtherUser", "TESTUSER@example.com", "pw")
                .await,
            Err(StoreError::Duplicate)
        ));

        // Existing row unchanged
        let after = store.find_user("TestUser").await.unwrap();
        assert_eq!(after.salt, before.salt);
        assert_eq!(after.verifier, before.verifier);
    }

    #[tokio::test]
    async fn test_login() {
        let store = store();
        store
            .add_user("TestUser", "testuser@example.com", "VsGnJghDUW6C")
            .await
            .unwrap();

        store.login_user("TestUser", "VsGnJghDUW6C").await.unwrap();
        assert!(matches!(
            store.login_user("TestUser", "wrong").await,
            Err(StoreError::AuthFailed)
        ));
        assert!(matches!(
            store.login_user("NoSuchUser", "VsGnJghDUW6C").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_validation() {
        let store = store();
        assert!(matches!(
            store.add_user("", "a@example.com", "pw").await,
            Err(StoreError::Invalid(_))
        ));
        assert!(matches!(
            store
                .add_user(&"x".repeat(MAX_USERNAME_BYTES + 1), "a@example.com", "pw")
                .await,
            Err(StoreError::Invalid(_))
        ));
        assert!(matches!(
            store.add_user("User", "a@example.com", "").await,
            Err(StoreError::Invalid(_))
        ));
    }
}
