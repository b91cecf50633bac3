// Storage engine adapter
// Capability traits the installer core talks to, and their implementation over a live
// connection. The core only decides *what* to request; the statements come from `dialect`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use log::{debug, info};
use tiberius::{Query, QueryItem};

use crate::database::catalog::{EntityDefinition, FieldDescriptor};
use crate::database::connection::{DatabaseConnection, DatabaseEngine};
use crate::database::dialect;
use crate::database::provisioning::AdminAccount;

/// Live schema metadata plus structural changes.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// No-op round trip.
    async fn ping(&self) -> Result<()>;

    async fn has_table(&self, table: &str) -> Result<bool>;

    async fn has_column(&self, table: &str, column: &str) -> Result<bool>;

    /// Create the table with every physical field if it does not exist.
    async fn ensure_table(&self, entity: &EntityDefinition) -> Result<()>;

    /// Add one column to an existing table if it is not there yet.
    async fn ensure_column(&self, table: &str, field: &FieldDescriptor) -> Result<()>;
}

/// Persistence of the privileged account.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert_account(&self, table: &str, account: &AdminAccount) -> Result<()>;
}

/// An open database session as handed out by a `DbConnector`.
#[async_trait]
pub trait Session: SchemaStore + AccountStore {
    async fn close(&self) -> Result<()>;
}

/// Column order used when inserting an administrator.
const ACCOUNT_COLUMNS: [&str; 13] = [
    "uuid",
    "sort",
    "update_time",
    "create_time",
    "role",
    "username",
    "password",
    "email",
    "phone",
    "gender",
    "last_time",
    "size_limit",
    "status",
];

// =============================================================================
// SchemaStore over a live connection
// =============================================================================

#[async_trait]
impl SchemaStore for DatabaseConnection {
    async fn ping(&self) -> Result<()> {
        debug!("[PHASE: database] [STEP: ping] Pinging database");
        match self {
            DatabaseConnection::MySql(pool) => {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .context("Ping failed (MySQL)")?;
            }
            DatabaseConnection::Postgres(pool) => {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .context("Ping failed (PostgreSQL)")?;
            }
            DatabaseConnection::SqlServer(_) => {
                self.sql_server_execute("SELECT 1", &[])
                    .await
                    .context("Ping failed (SQL Server)")?;
            }
        }
        Ok(())
    }

    async fn has_table(&self, table: &str) -> Result<bool> {
        let sql = dialect::table_exists_query(self.engine());
        match self {
            DatabaseConnection::MySql(pool) => {
                let count: i64 = sqlx::query_scalar(sql)
                    .bind(table)
                    .fetch_one(pool)
                    .await
                    .with_context(|| format!("Failed to check table {} (MySQL)", table))?;
                Ok(count > 0)
            }
            DatabaseConnection::Postgres(pool) => {
                let exists: bool = sqlx::query_scalar(sql)
                    .bind(table)
                    .fetch_one(pool)
                    .await
                    .with_context(|| format!("Failed to check table {} (PostgreSQL)", table))?;
                Ok(exists)
            }
            DatabaseConnection::SqlServer(_) => {
                let count = self
                    .sql_server_count(sql, &[table])
                    .await
                    .with_context(|| format!("Failed to check table {} (SQL Server)", table))?;
                Ok(count > 0)
            }
        }
    }

    async fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let sql = dialect::column_exists_query(self.engine());
        match self {
            DatabaseConnection::MySql(pool) => {
                let count: i64 = sqlx::query_scalar(sql)
                    .bind(table)
                    .bind(column)
                    .fetch_one(pool)
                    .await
                    .with_context(|| format!("Failed to verify column {}.{}", table, column))?;
                Ok(count > 0)
            }
            DatabaseConnection::Postgres(pool) => {
                let exists: bool = sqlx::query_scalar(sql)
                    .bind(table)
                    .bind(column)
                    .fetch_one(pool)
                    .await
                    .with_context(|| format!("Failed to verify column {}.{}", table, column))?;
                Ok(exists)
            }
            DatabaseConnection::SqlServer(_) => {
                let count = self
                    .sql_server_count(sql, &[table, column])
                    .await
                    .with_context(|| format!("Failed to verify column {}.{}", table, column))?;
                Ok(count > 0)
            }
        }
    }

    async fn ensure_table(&self, entity: &EntityDefinition) -> Result<()> {
        let stmt = dialect::create_table_stmt(self.engine(), entity);
        info!(
            "[PHASE: database] [STEP: ensure_table] Creating table {} if absent",
            entity.name
        );
        self.execute_ddl(&stmt)
            .await
            .with_context(|| format!("Failed to create table {}", entity.name))
    }

    async fn ensure_column(&self, table: &str, field: &FieldDescriptor) -> Result<()> {
        // MySQL has no ADD COLUMN IF NOT EXISTS.
        if self.engine() == DatabaseEngine::MySql && self.has_column(table, &field.db_name).await? {
            debug!(
                "[PHASE: database] [STEP: ensure_column] Column {}.{} already present",
                table, field.db_name
            );
            return Ok(());
        }

        let stmt = dialect::add_column_stmt(self.engine(), table, field);
        info!(
            "[PHASE: database] [STEP: ensure_column] Adding column {}.{}",
            table, field.db_name
        );
        self.execute_ddl(&stmt)
            .await
            .with_context(|| format!("Failed to add column {}.{}", table, field.db_name))
    }
}

// =============================================================================
// AccountStore over a live connection
// =============================================================================

/// Binds the account in `ACCOUNT_COLUMNS` order onto an sqlx query.
macro_rules! bind_account {
    ($query:expr, $account:expr) => {
        $query
            .bind(&$account.uuid)
            .bind($account.sort)
            .bind($account.update_time.naive_utc())
            .bind($account.create_time.naive_utc())
            .bind($account.role.as_str())
            .bind(&$account.username)
            .bind(&$account.password)
            .bind(&$account.email)
            .bind(&$account.phone)
            .bind($account.gender.as_str())
            .bind($account.last_time.naive_utc())
            .bind($account.size_limit)
            .bind($account.status.as_str())
    };
}

#[async_trait]
impl AccountStore for DatabaseConnection {
    async fn insert_account(&self, table: &str, account: &AdminAccount) -> Result<()> {
        let sql = dialect::insert_stmt(self.engine(), table, &ACCOUNT_COLUMNS);
        info!(
            "[PHASE: database] [STEP: insert_account] Inserting account {} into {}",
            account.username, table
        );

        let result = match self {
            DatabaseConnection::MySql(pool) => bind_account!(sqlx::query(&sql), account)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(anyhow::Error::from),
            DatabaseConnection::Postgres(pool) => bind_account!(sqlx::query(&sql), account)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(anyhow::Error::from),
            DatabaseConnection::SqlServer(_) => self.insert_account_sql_server(&sql, account).await,
        };
        result.with_context(|| format!("Failed to insert account into {}", table))
    }
}

// =============================================================================
// Session
// =============================================================================

#[async_trait]
impl Session for DatabaseConnection {
    async fn close(&self) -> Result<()> {
        debug!(
            "[PHASE: database] [STEP: close] Closing {} connection",
            self.engine()
        );
        match self {
            DatabaseConnection::MySql(pool) => pool.close().await,
            DatabaseConnection::Postgres(pool) => pool.close().await,
            DatabaseConnection::SqlServer(conn) => {
                let client = conn.client().lock().await.take();
                if let Some(client) = client {
                    client
                        .close()
                        .await
                        .context("Failed to close SQL Server connection")?;
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

impl DatabaseConnection {
    async fn execute_ddl(&self, stmt: &str) -> Result<()> {
        match self {
            DatabaseConnection::MySql(pool) => {
                sqlx::query(stmt).execute(pool).await?;
            }
            DatabaseConnection::Postgres(pool) => {
                sqlx::query(stmt).execute(pool).await?;
            }
            DatabaseConnection::SqlServer(_) => {
                self.sql_server_execute(stmt, &[]).await?;
            }
        }
        Ok(())
    }

    /// Run a statement and drain its result stream.
    async fn sql_server_execute(&self, sql: &str, binds: &[&str]) -> Result<()> {
        let client_arc = self
            .as_sql_server()
            .ok_or_else(|| anyhow::anyhow!("Not a SQL Server connection"))?;
        let mut guard = client_arc.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("SQL Server connection is closed"))?;

        let mut query = Query::new(sql);
        for value in binds {
            query.bind(*value);
        }
        let mut stream = query.query(client).await?;
        while stream.try_next().await?.is_some() {}
        Ok(())
    }

    /// Run a `SELECT COUNT(*)` and return the first column of the first row.
    async fn sql_server_count(&self, sql: &str, binds: &[&str]) -> Result<i32> {
        let client_arc = self
            .as_sql_server()
            .ok_or_else(|| anyhow::anyhow!("Not a SQL Server connection"))?;
        let mut guard = client_arc.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("SQL Server connection is closed"))?;

        let mut query = Query::new(sql);
        for value in binds {
            query.bind(*value);
        }
        let mut stream = query.query(client).await?;

        let mut count = 0;
        while let Some(item) = stream.try_next().await? {
            if let QueryItem::Row(row) = item {
                count = row
                    .get::<i32, _>(0)
                    .ok_or_else(|| anyhow::anyhow!("COUNT(*) is null"))?;
                break;
            }
        }
        Ok(count)
    }

    async fn insert_account_sql_server(&self, sql: &str, account: &AdminAccount) -> Result<()> {
        let client_arc = self
            .as_sql_server()
            .ok_or_else(|| anyhow::anyhow!("Not a SQL Server connection"))?;
        let mut guard = client_arc.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("SQL Server connection is closed"))?;

        let mut query = Query::new(sql);
        query.bind(account.uuid.as_str());
        query.bind(account.sort);
        query.bind(account.update_time.naive_utc());
        query.bind(account.create_time.naive_utc());
        query.bind(account.role.as_str());
        query.bind(account.username.as_str());
        query.bind(account.password.as_str());
        query.bind(account.email.as_str());
        query.bind(account.phone.as_str());
        query.bind(account.gender.as_str());
        query.bind(account.last_time.naive_utc());
        query.bind(account.size_limit);
        query.bind(account.status.as_str());

        let mut stream = query.query(client).await?;
        while stream.try_next().await?.is_some() {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::catalog::{Catalog, USER_TABLE};

    #[test]
    fn account_columns_exist_in_user_entity() {
        let catalog = Catalog::standard();
        let user = catalog.find(USER_TABLE).unwrap();
        for column in ACCOUNT_COLUMNS {
            assert!(
                user.field_by_column(column).is_some(),
                "user entity has no column {}",
                column
            );
        }
    }

    #[test]
    fn account_insert_binds_one_marker_per_column() {
        let sql = dialect::insert_stmt(DatabaseEngine::SqlServer, USER_TABLE, &ACCOUNT_COLUMNS);
        assert!(sql.contains("@P13"));
        assert!(!sql.contains("@P14"));
    }
}
