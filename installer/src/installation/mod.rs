// Bootstrap orchestration
//
// Sequences the connector, differ, migrator and provisioner into the four install
// operations. Every operation opens its own session and closes it on every exit path.
//
// IMPORTANT:
// - Never log connection parameters unmasked.
// - Operations are independent; the stages describe intent, not an enforced order.

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::database::catalog::Catalog;
use crate::database::connection::{
    ConnectError, ConnectionParameters, DatabaseEngine, DbConnector, RealDbConnector,
};
use crate::database::differ::{SchemaDiff, SchemaDiffer};
use crate::database::migrator::Migrator;
use crate::database::provisioning::{AdminAccount, AdminIdentity, AdminProvisioner, UserRole};
use crate::error::InstallError;
use crate::models::settings::InstallerSettings;
use crate::security::password::Pbkdf2Hasher;

/// Where a fresh installation starts is `InstallStage::default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallStage {
    #[default]
    Uninitialized,
    Verified,
    Inspected,
    Migrated,
    Provisioned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Verify,
    Inspect,
    Migrate,
    Provision,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Verify,
        Operation::Inspect,
        Operation::Migrate,
        Operation::Provision,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Operation::Verify => "/api/install/verify",
            Operation::Inspect => "/api/install/table/info/list",
            Operation::Migrate => "/api/install/create/table",
            Operation::Provision => "/api/install/create/admin",
        }
    }

    /// Stage the installation is in once this operation succeeds.
    pub fn target_stage(self) -> InstallStage {
        match self {
            Operation::Verify => InstallStage::Verified,
            Operation::Inspect => InstallStage::Inspected,
            Operation::Migrate => InstallStage::Migrated,
            Operation::Provision => InstallStage::Provisioned,
        }
    }

    /// Installation runs before any account exists, so every operation is open to guests.
    pub fn required_role(self) -> UserRole {
        UserRole::Guest
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Verify => "verify",
            Operation::Inspect => "inspect",
            Operation::Migrate => "migrate",
            Operation::Provision => "provision",
        }
    }
}

pub struct Installer {
    catalog: Catalog,
    connector: Arc<dyn DbConnector>,
    differ: SchemaDiffer,
    migrator: Migrator,
    provisioner: AdminProvisioner,
    default_engine: DatabaseEngine,
}

impl Installer {
    pub fn new(
        catalog: Catalog,
        connector: Arc<dyn DbConnector>,
        differ: SchemaDiffer,
        migrator: Migrator,
        provisioner: AdminProvisioner,
    ) -> Self {
        Self {
            catalog,
            connector,
            differ,
            migrator,
            provisioner,
            default_engine: DatabaseEngine::default(),
        }
    }

    /// Production wiring from loaded settings.
    pub fn from_settings(settings: &InstallerSettings) -> Result<Self> {
        let hasher = Pbkdf2Hasher::new(settings.password_hash_iterations)?;
        let differ = SchemaDiffer::new();
        Ok(Self::new(
            Catalog::standard(),
            Arc::new(RealDbConnector::new(settings.connect_timeout())),
            differ,
            Migrator::new(differ),
            AdminProvisioner::new(Arc::new(hasher)),
        )
        .with_default_engine(settings.default_engine))
    }

    pub fn with_default_engine(mut self, engine: DatabaseEngine) -> Self {
        self.default_engine = engine;
        self
    }

    /// Engine used when a request does not name one.
    pub fn default_engine(&self) -> DatabaseEngine {
        self.default_engine
    }

    /// Open, run a liveness round trip, close.
    pub async fn verify(&self, params: &ConnectionParameters) -> Result<InstallStage, InstallError> {
        let session = self.connector.open(params).await?;

        let result = session.ping().await.map_err(|e| {
            InstallError::Connection(ConnectError {
                user_message: "Connected, but the database did not answer a test query."
                    .to_string(),
                internal_details: format!("{:#}", e),
            })
        });

        self.connector.close(session).await;
        self.finish(
            Operation::Verify,
            result.map(|()| Operation::Verify.target_stage()),
        )
    }

    /// Open, diff every catalog entity, close.
    pub async fn inspect(
        &self,
        params: &ConnectionParameters,
    ) -> Result<Vec<SchemaDiff>, InstallError> {
        let session = self.connector.open(params).await?;
        let result = self.differ.diff_all(&*session, &self.catalog).await;
        self.connector.close(session).await;
        self.finish(Operation::Inspect, result)
    }

    /// Open, migrate every catalog entity in order, close.
    pub async fn migrate(
        &self,
        params: &ConnectionParameters,
    ) -> Result<Vec<SchemaDiff>, InstallError> {
        let session = self.connector.open(params).await?;
        let result = self.migrator.migrate_all(&*session, &self.catalog).await;
        self.connector.close(session).await;
        self.finish(Operation::Migrate, result)
    }

    /// Open, write one administrator, close.
    pub async fn provision(
        &self,
        params: &ConnectionParameters,
        identity: &AdminIdentity,
    ) -> Result<AdminAccount, InstallError> {
        let session = self.connector.open(params).await?;
        let result = self.provisioner.provision(&*session, identity).await;
        self.connector.close(session).await;
        self.finish(Operation::Provision, result)
    }

    fn finish<T>(
        &self,
        op: Operation,
        result: Result<T, InstallError>,
    ) -> Result<T, InstallError> {
        match &result {
            Ok(_) => info!(
                "[PHASE: install] [STEP: {}] Reached stage {:?}",
                op.as_str(),
                op.target_stage()
            ),
            Err(e) => warn!(
                "[PHASE: install] [STEP: {}] Failed ({:?}): {}",
                op.as_str(),
                e.kind(),
                e
            ),
        }
        result
    }
}
