// Installer error taxonomy
// Every failure an install operation can surface to its caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::connection::ConnectError;
use crate::database::migrator::MigrationFailure;

/// Machine-distinguishable failure kind carried in every failure envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidInput,
    ConnectionError,
    SchemaInspectionError,
    MigrationError,
    PersistenceError,
}

impl ErrorKind {
    /// Client faults are fixed by correcting the request; everything else is server-side.
    pub fn is_client_fault(self) -> bool {
        matches!(self, ErrorKind::InvalidInput)
    }

    /// Status the role-gated router should answer with.
    pub fn status_code(self) -> u16 {
        if self.is_client_fault() {
            400
        } else {
            500
        }
    }

    /// Process exit code used by the command-line entry point.
    pub fn exit_code(self) -> u8 {
        if self.is_client_fault() {
            2
        } else {
            1
        }
    }
}

/// Main error type for install operations.
#[derive(Error, Debug)]
pub enum InstallError {
    /// Malformed port, invalid administrator identity, unknown engine, ...
    #[error("{0}")]
    InvalidInput(String),

    /// Unreachable database, bad credentials, unknown schema, failed liveness check
    #[error("{0}")]
    Connection(#[from] ConnectError),

    /// A metadata query failed; the whole inspection pass is aborted
    #[error("Schema inspection failed for table {entity}: {message}")]
    SchemaInspection { entity: String, message: String },

    /// Migration stopped at `failed`; entities in `completed` stay migrated
    #[error("{0}")]
    Migration(#[from] MigrationFailure),

    /// Writing the administrator account failed
    #[error("{0}")]
    Persistence(String),
}

impl InstallError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        InstallError::InvalidInput(message.into())
    }

    pub fn schema_inspection(entity: impl Into<String>, message: impl Into<String>) -> Self {
        InstallError::SchemaInspection {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        InstallError::Persistence(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            InstallError::InvalidInput(_) => ErrorKind::InvalidInput,
            InstallError::Connection(_) => ErrorKind::ConnectionError,
            InstallError::SchemaInspection { .. } => ErrorKind::SchemaInspectionError,
            InstallError::Migration(_) => ErrorKind::MigrationError,
            InstallError::Persistence(_) => ErrorKind::PersistenceError,
        }
    }

    /// Name of the entity the failure is attributed to, if any.
    pub fn entity(&self) -> Option<&str> {
        match self {
            InstallError::SchemaInspection { entity, .. } => Some(entity),
            InstallError::Migration(failure) => Some(&failure.failed),
            _ => None,
        }
    }
}
