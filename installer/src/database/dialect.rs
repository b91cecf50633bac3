// SQL dialects
// Identifier quoting, type mapping and DDL/metadata statements per engine.
//
// Key design decisions:
// - Identifiers are always quoted with the engine's own quoting (backticks, double quotes,
//   brackets) and embedded quote characters are doubled
// - Values are always bound as parameters; only identifiers are interpolated
// - Non-null columns carry a type default so they can be added to tables that already hold rows

use crate::database::catalog::{EntityDefinition, FieldDescriptor, FieldType};
use crate::database::connection::DatabaseEngine;

// =============================================================================
// Quoting
// =============================================================================

pub fn quote_ident(engine: DatabaseEngine, name: &str) -> String {
    match engine {
        DatabaseEngine::MySql => format!("`{}`", name.replace('`', "``")),
        DatabaseEngine::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        DatabaseEngine::SqlServer => format!("[{}]", name.replace(']', "]]")),
    }
}

/// N-string literal for SQL Server metadata functions (OBJECT_ID, COL_LENGTH).
fn sql_server_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

/// Positional bind marker (1-based).
pub fn placeholder(engine: DatabaseEngine, index: usize) -> String {
    match engine {
        DatabaseEngine::MySql => "?".to_string(),
        DatabaseEngine::Postgres => format!("${}", index),
        DatabaseEngine::SqlServer => format!("@P{}", index),
    }
}

// =============================================================================
// Types
// =============================================================================

pub fn column_type(engine: DatabaseEngine, field_type: FieldType) -> String {
    match (engine, field_type) {
        (DatabaseEngine::SqlServer, FieldType::Uuid) => "NCHAR(36)".to_string(),
        (_, FieldType::Uuid) => "CHAR(36)".to_string(),

        (DatabaseEngine::SqlServer, FieldType::Varchar(len)) => format!("NVARCHAR({})", len),
        (_, FieldType::Varchar(len)) => format!("VARCHAR({})", len),

        (DatabaseEngine::SqlServer, FieldType::Text) => "NVARCHAR(MAX)".to_string(),
        (_, FieldType::Text) => "TEXT".to_string(),

        (DatabaseEngine::MySql, FieldType::Bool) => "TINYINT(1)".to_string(),
        (DatabaseEngine::Postgres, FieldType::Bool) => "BOOLEAN".to_string(),
        (DatabaseEngine::SqlServer, FieldType::Bool) => "BIT".to_string(),

        (DatabaseEngine::Postgres, FieldType::Int) => "INTEGER".to_string(),
        (_, FieldType::Int) => "INT".to_string(),

        (_, FieldType::BigInt) => "BIGINT".to_string(),

        (DatabaseEngine::MySql, FieldType::DateTime) => "DATETIME".to_string(),
        (DatabaseEngine::Postgres, FieldType::DateTime) => "TIMESTAMP".to_string(),
        (DatabaseEngine::SqlServer, FieldType::DateTime) => "DATETIME2".to_string(),

        // References never reach DDL; mapped like the key they point at.
        (_, FieldType::Reference) => column_type(engine, FieldType::Uuid),
    }
}

/// Default used for non-null, non-key columns. MySQL cannot default TEXT columns.
pub fn default_literal(engine: DatabaseEngine, field_type: FieldType) -> Option<&'static str> {
    match (engine, field_type) {
        (DatabaseEngine::MySql, FieldType::Text) => None,
        (_, FieldType::Uuid | FieldType::Varchar(_) | FieldType::Text) => Some("''"),
        (_, FieldType::Int | FieldType::BigInt) => Some("0"),
        (DatabaseEngine::Postgres, FieldType::Bool) => Some("FALSE"),
        (_, FieldType::Bool) => Some("0"),
        (DatabaseEngine::SqlServer, FieldType::DateTime) => Some("SYSUTCDATETIME()"),
        (_, FieldType::DateTime) => Some("CURRENT_TIMESTAMP"),
        (_, FieldType::Reference) => None,
    }
}

pub fn column_definition(engine: DatabaseEngine, field: &FieldDescriptor) -> String {
    let mut def = format!(
        "{} {}",
        quote_ident(engine, &field.db_name),
        column_type(engine, field.field_type)
    );

    if field.nullable && !field.primary_key {
        def.push_str(" NULL");
        return def;
    }

    def.push_str(" NOT NULL");
    if !field.primary_key {
        if let Some(default) = default_literal(engine, field.field_type) {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
    }
    def
}

// =============================================================================
// DDL
// =============================================================================

/// CREATE TABLE for every physical field of the entity; no-op if the table exists.
pub fn create_table_stmt(engine: DatabaseEngine, entity: &EntityDefinition) -> String {
    let mut parts: Vec<String> = entity
        .physical_fields()
        .map(|f| column_definition(engine, f))
        .collect();

    let pk = entity.primary_key_columns();
    if !pk.is_empty() {
        let cols: Vec<String> = pk.iter().map(|c| quote_ident(engine, c)).collect();
        parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
    }

    let table = quote_ident(engine, &entity.name);
    let body = parts.join(",\n    ");

    match engine {
        DatabaseEngine::MySql => format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            table, body
        ),
        DatabaseEngine::Postgres => {
            format!("CREATE TABLE IF NOT EXISTS {} (\n    {}\n)", table, body)
        }
        DatabaseEngine::SqlServer => format!(
            "IF OBJECT_ID({}, N'U') IS NULL\nCREATE TABLE {} (\n    {}\n)",
            sql_server_literal(&entity.name),
            table,
            body
        ),
    }
}

/// ALTER TABLE ... ADD for one column.
///
/// Postgres and SQL Server guard against an existing column in the statement itself; MySQL
/// has no such guard, so the storage adapter checks the column first.
pub fn add_column_stmt(engine: DatabaseEngine, table: &str, field: &FieldDescriptor) -> String {
    let def = column_definition(engine, field);
    let quoted = quote_ident(engine, table);

    match engine {
        DatabaseEngine::MySql => format!("ALTER TABLE {} ADD COLUMN {}", quoted, def),
        DatabaseEngine::Postgres => {
            format!("ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}", quoted, def)
        }
        DatabaseEngine::SqlServer => format!(
            "IF COL_LENGTH({}, {}) IS NULL\nALTER TABLE {} ADD {}",
            sql_server_literal(table),
            sql_server_literal(&field.db_name),
            quoted,
            def
        ),
    }
}

// =============================================================================
// Metadata + DML
// =============================================================================

/// Counts (or tests) tables with the bound name in the connection's current schema.
pub fn table_exists_query(engine: DatabaseEngine) -> &'static str {
    match engine {
        DatabaseEngine::MySql => {
            r#"
            SELECT COUNT(*)
            FROM information_schema.tables
            WHERE table_schema = DATABASE()
              AND table_name = ?
            "#
        }
        DatabaseEngine::Postgres => {
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM information_schema.tables
                WHERE table_schema = current_schema()
                  AND table_name = $1
            )
            "#
        }
        DatabaseEngine::SqlServer => {
            r#"
            SELECT COUNT(*)
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = SCHEMA_NAME()
              AND TABLE_NAME = @P1
            "#
        }
    }
}

/// Counts (or tests) columns with the bound table and column names.
pub fn column_exists_query(engine: DatabaseEngine) -> &'static str {
    match engine {
        DatabaseEngine::MySql => {
            r#"
            SELECT COUNT(*)
            FROM information_schema.columns
            WHERE table_schema = DATABASE()
              AND table_name = ?
              AND column_name = ?
            "#
        }
        DatabaseEngine::Postgres => {
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM information_schema.columns
                WHERE table_schema = current_schema()
                  AND table_name = $1
                  AND column_name = $2
            )
            "#
        }
        DatabaseEngine::SqlServer => {
            r#"
            SELECT COUNT(*)
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = SCHEMA_NAME()
              AND TABLE_NAME = @P1
              AND COLUMN_NAME = @P2
            "#
        }
    }
}

pub fn insert_stmt(engine: DatabaseEngine, table: &str, columns: &[&str]) -> String {
    let cols: Vec<String> = columns.iter().map(|c| quote_ident(engine, c)).collect();
    let marks: Vec<String> = (1..=columns.len()).map(|i| placeholder(engine, i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(engine, table),
        cols.join(", "),
        marks.join(", ")
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
