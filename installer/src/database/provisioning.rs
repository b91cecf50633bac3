// Administrator provisioning
//
// Validates the requested identity and writes one privileged account into the user table.
// No "already provisioned" check: each successful call adds an account.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::catalog::USER_TABLE;
use crate::database::storage::AccountStore;
use crate::error::InstallError;
use crate::security::password::PasswordHasher;
use crate::utils::validation;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Guest,
    User,
    Administrator,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Guest => "GUEST",
            UserRole::User => "USER",
            UserRole::Administrator => "ADMINISTRATOR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserGender {
    Male,
    Female,
    Unknown,
}

impl UserGender {
    pub fn as_str(self) -> &'static str {
        match self {
            UserGender::Male => "MALE",
            UserGender::Female => "FEMALE",
            UserGender::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Ok,
    Disabled,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Ok => "OK",
            UserStatus::Disabled => "DISABLED",
        }
    }
}

/// Requested administrator identity, as typed by the operator.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminIdentity")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Row written to the user table. `password` is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub uuid: String,
    /// Provisioning instant in epoch milliseconds
    pub sort: i64,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub last_time: DateTime<Utc>,
    pub role: UserRole,
    pub username: String,
    pub password: String,
    pub email: String,
    pub phone: String,
    pub gender: UserGender,
    /// -1 means unlimited
    pub size_limit: i64,
    pub status: UserStatus,
}

// =============================================================================
// Provisioner
// =============================================================================

pub struct AdminProvisioner {
    hasher: Arc<dyn PasswordHasher>,
    user_table: String,
}

impl AdminProvisioner {
    pub fn new(hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            hasher,
            user_table: USER_TABLE.to_string(),
        }
    }

    /// Check identity fields in order, stopping at the first problem.
    pub fn validate(&self, identity: &AdminIdentity) -> Result<(), InstallError> {
        validation::validate_admin_username(&identity.username)?;
        validation::validate_admin_password(&identity.password)?;
        validation::validate_admin_email(&identity.email)?;
        Ok(())
    }

    /// Build the account row for a validated identity at instant `now`.
    pub fn build_account(
        &self,
        identity: &AdminIdentity,
        now: DateTime<Utc>,
    ) -> Result<AdminAccount, InstallError> {
        let password = self
            .hasher
            .hash(&identity.password)
            .map_err(|e| InstallError::persistence(format!("Failed to hash password: {:#}", e)))?;

        Ok(AdminAccount {
            uuid: Uuid::new_v4().to_string(),
            sort: now.timestamp_millis(),
            create_time: now,
            update_time: now,
            last_time: now,
            role: UserRole::Administrator,
            username: identity.username.clone(),
            password,
            email: identity.email.clone(),
            phone: String::new(),
            gender: UserGender::Unknown,
            size_limit: -1,
            status: UserStatus::Ok,
        })
    }

    pub async fn provision<S>(
        &self,
        store: &S,
        identity: &AdminIdentity,
    ) -> Result<AdminAccount, InstallError>
    where
        S: AccountStore + ?Sized,
    {
        self.validate(identity)?;

        let account = self.build_account(identity, Utc::now())?;
        store
            .insert_account(&self.user_table, &account)
            .await
            .map_err(|e| InstallError::persistence(format!("{:#}", e)))?;

        info!(
            "[PHASE: provision] [STEP: admin] Administrator {} created ({})",
            account.username, account.uuid
        );
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::error::ErrorKind;
    use crate::security::password::Pbkdf2Hasher;

    fn provisioner() -> AdminProvisioner {
        AdminProvisioner::new(Arc::new(Pbkdf2Hasher::new(1_000).unwrap()))
    }

    fn identity(username: &str, password: &str, email: &str) -> AdminIdentity {
        AdminIdentity {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn rejects_bad_identities() {
        let p = provisioner();
        for bad in [
            identity("admin!", "abcdef", "a@b.com"),
            identity("", "abcdef", "a@b.com"),
            identity("admin_1", "abc12", "a@b.com"),
            identity("admin_1", "abcdef", ""),
        ] {
            let err = p.validate(&bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{:?}", bad);
        }
    }

    #[test]
    fn validation_short_circuits_in_order() {
        // Username and password both bad: the username message wins.
        let err = provisioner()
            .validate(&identity("bad name", "x", ""))
            .unwrap_err();
        assert!(err.to_string().contains("username"), "{}", err);
    }

    #[test]
    fn built_account_has_administrator_defaults() {
        let p = provisioner();
        let now = Utc::now();
        let account = p
            .build_account(&identity("admin_1", "abcdef", "a@b.com"), now)
            .unwrap();

        assert_eq!(account.role, UserRole::Administrator);
        assert_eq!(account.status, UserStatus::Ok);
        assert_eq!(account.gender, UserGender::Unknown);
        assert_eq!(account.size_limit, -1);
        assert_eq!(account.sort, now.timestamp_millis());
        assert_eq!(account.create_time, now);
        assert_eq!(account.last_time, now);
        assert!(account.phone.is_empty());
        assert_eq!(Uuid::parse_str(&account.uuid).unwrap().get_version_num(), 4);
        assert_ne!(account.password, "abcdef");
        assert!(p.hasher.verify("abcdef", &account.password));
    }

    #[tokio::test]
    async fn provision_persists_into_user_table() {
        let store = MemoryStore::new();
        let account = provisioner()
            .provision(&store, &identity("admin_1", "abcdef", "a@b.com"))
            .await
            .unwrap();

        let stored = store.accounts(USER_TABLE);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].uuid, account.uuid);
        assert_eq!(stored[0].role, UserRole::Administrator);
    }

    #[tokio::test]
    async fn invalid_identity_writes_nothing() {
        let store = MemoryStore::new();
        let err = provisioner()
            .provision(&store, &identity("admin!", "abcdef", "a@b.com"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(store.accounts(USER_TABLE).is_empty());
    }

    #[tokio::test]
    async fn repeated_provisioning_adds_accounts() {
        let store = MemoryStore::new();
        let p = provisioner();
        p.provision(&store, &identity("admin_1", "abcdef", "a@b.com"))
            .await
            .unwrap();
        p.provision(&store, &identity("admin_1", "abcdef", "a@b.com"))
            .await
            .unwrap();
        assert_eq!(store.accounts(USER_TABLE).len(), 2);
    }

    #[tokio::test]
    async fn insert_failure_is_persistence_error() {
        let store = MemoryStore::new();
        store.fail_inserts();
        let err = provisioner()
            .provision(&store, &identity("admin_1", "abcdef", "a@b.com"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PersistenceError);
    }

    #[test]
    fn debug_masks_plain_password() {
        let debug = format!("{:?}", identity("admin_1", "s3cret!", "a@b.com"));
        assert!(!debug.contains("s3cret!"));
    }
}
