// Migrator
// Brings live tables in line with the catalog: creates absent tables, adds absent columns.
// Each statement stands alone; a failure stops the pass and nothing is rolled back.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::database::catalog::{Catalog, EntityDefinition};
use crate::database::differ::{SchemaDiff, SchemaDiffer};
use crate::database::storage::SchemaStore;
use crate::error::InstallError;

/// Partial result of an aborted migration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationFailure {
    /// Entities migrated before the failure, in catalog order
    pub completed: Vec<String>,
    pub failed: String,
    pub error: String,
}

impl fmt::Display for MigrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Migration failed for table {}: {}", self.failed, self.error)
    }
}

impl std::error::Error for MigrationFailure {}

#[derive(Debug, Clone, Copy, Default)]
pub struct Migrator {
    differ: SchemaDiffer,
}

impl Migrator {
    pub fn new(differ: SchemaDiffer) -> Self {
        Migrator { differ }
    }

    /// Migrate one entity and return its post-migration diff.
    ///
    /// Failures carry only the entity name; `migrate_all` fills in the completed list.
    pub async fn migrate<S>(
        &self,
        store: &S,
        entity: &EntityDefinition,
    ) -> Result<SchemaDiff, InstallError>
    where
        S: SchemaStore + ?Sized,
    {
        let fail = |message: String| {
            InstallError::Migration(MigrationFailure {
                completed: Vec::new(),
                failed: entity.name.clone(),
                error: message,
            })
        };

        let before = self
            .differ
            .diff(store, entity)
            .await
            .map_err(|e| fail(e.to_string()))?;

        if !before.table_exists {
            info!(
                "[PHASE: migrate] [STEP: create_table] Creating {} ({} columns)",
                entity.name,
                before.all_fields.len()
            );
            store
                .ensure_table(entity)
                .await
                .map_err(|e| fail(format!("{:#}", e)))?;
        } else {
            for field in &before.missing_fields {
                info!(
                    "[PHASE: migrate] [STEP: add_column] Adding {}.{}",
                    entity.name, field.db_name
                );
                store
                    .ensure_column(&entity.name, field)
                    .await
                    .map_err(|e| fail(format!("{:#}", e)))?;
            }
        }

        let after = self
            .differ
            .diff(store, entity)
            .await
            .map_err(|e| fail(e.to_string()))?;

        if !after.is_converged() {
            warn!(
                "[PHASE: migrate] [STEP: verify] {} still missing {:?} after migration",
                entity.name,
                after.missing_columns()
            );
        }
        Ok(after)
    }

    /// Migrate every catalog entity in order, stopping at the first failure.
    pub async fn migrate_all<S>(
        &self,
        store: &S,
        catalog: &Catalog,
    ) -> Result<Vec<SchemaDiff>, InstallError>
    where
        S: SchemaStore + ?Sized,
    {
        let mut diffs = Vec::with_capacity(catalog.list_entities().len());

        for entity in catalog.list_entities() {
            match self.migrate(store, entity).await {
                Ok(diff) => diffs.push(diff),
                Err(InstallError::Migration(mut failure)) => {
                    failure.completed = diffs.iter().map(|d| d.name.clone()).collect();
                    error!(
                        "[PHASE: migrate] [STEP: migrate_all] {} (completed: {:?})",
                        failure, failure.completed
                    );
                    return Err(InstallError::Migration(failure));
                }
                Err(other) => return Err(other),
            }
        }

        info!(
            "[PHASE: migrate] [STEP: migrate_all] Migrated {} tables",
            diffs.len()
        );
        Ok(diffs)
    }
}
