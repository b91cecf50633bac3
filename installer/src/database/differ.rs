// Schema differ
// Compares an entity definition with the live schema and reports what is missing.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::database::catalog::{Catalog, EntityDefinition, FieldDescriptor};
use crate::database::storage::SchemaStore;
use crate::error::InstallError;

/// Expected vs live shape of one entity.
///
/// `all_fields` holds the physical fields only, so an absent table always reports
/// `missing_fields == all_fields`. Virtual attributes are listed separately and never
/// counted as missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDiff {
    pub name: String,
    pub table_exists: bool,
    pub all_fields: Vec<FieldDescriptor>,
    pub missing_fields: Vec<FieldDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub virtual_fields: Vec<FieldDescriptor>,
}

impl SchemaDiff {
    /// Table present and every physical column in place.
    pub fn is_converged(&self) -> bool {
        self.table_exists && self.missing_fields.is_empty()
    }

    pub fn missing_columns(&self) -> Vec<&str> {
        self.missing_fields.iter().map(|f| f.db_name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaDiffer;

impl SchemaDiffer {
    pub fn new() -> Self {
        SchemaDiffer
    }

    /// Diff a single entity. Read-only.
    pub async fn diff<S>(
        &self,
        store: &S,
        entity: &EntityDefinition,
    ) -> Result<SchemaDiff, InstallError>
    where
        S: SchemaStore + ?Sized,
    {
        let all_fields: Vec<FieldDescriptor> = entity.physical_fields().cloned().collect();
        let virtual_fields: Vec<FieldDescriptor> = entity.virtual_fields().cloned().collect();

        let table_exists = store
            .has_table(&entity.name)
            .await
            .map_err(|e| InstallError::schema_inspection(&entity.name, format!("{:#}", e)))?;

        if !table_exists {
            debug!(
                "[PHASE: inspect] [STEP: diff] Table {} is absent",
                entity.name
            );
            return Ok(SchemaDiff {
                name: entity.name.clone(),
                table_exists,
                missing_fields: all_fields.clone(),
                all_fields,
                virtual_fields,
            });
        }

        let mut missing_fields = Vec::new();
        for field in &all_fields {
            let present = store
                .has_column(&entity.name, &field.db_name)
                .await
                .map_err(|e| InstallError::schema_inspection(&entity.name, format!("{:#}", e)))?;
            if !present {
                missing_fields.push(field.clone());
            }
        }

        debug!(
            "[PHASE: inspect] [STEP: diff] Table {} present, {} missing column(s)",
            entity.name,
            missing_fields.len()
        );

        Ok(SchemaDiff {
            name: entity.name.clone(),
            table_exists,
            all_fields,
            missing_fields,
            virtual_fields,
        })
    }

    /// Diff every catalog entity in order. The first metadata failure aborts the pass.
    pub async fn diff_all<S>(
        &self,
        store: &S,
        catalog: &Catalog,
    ) -> Result<Vec<SchemaDiff>, InstallError>
    where
        S: SchemaStore + ?Sized,
    {
        let mut diffs = Vec::with_capacity(catalog.list_entities().len());
        for entity in catalog.list_entities() {
            diffs.push(self.diff(store, entity).await?);
        }

        let converged = diffs.iter().filter(|d| d.is_converged()).count();
        info!(
            "[PHASE: inspect] [STEP: diff_all] {} of {} tables converged",
            converged,
            diffs.len()
        );
        Ok(diffs)
    }
}
