// Database connection management
// Builds a session from operator-supplied parameters, checks it, and releases it.
//
// DbConnector is the seam the installer talks to, so connection failure paths can be
// exercised deterministically without a real database.

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::{MySql, Pool, Postgres};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use url::Url;

use crate::database::storage::Session;
use crate::error::InstallError;
use crate::utils::logging::mask_connection_string;

// =============================================================================
// Engine + parameters
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    #[default]
    MySql,
    Postgres,
    SqlServer,
}

impl DatabaseEngine {
    pub fn default_port(self) -> u16 {
        match self {
            DatabaseEngine::MySql => 3306,
            DatabaseEngine::Postgres => 5432,
            DatabaseEngine::SqlServer => 1433,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseEngine::MySql => "mysql",
            DatabaseEngine::Postgres => "postgres",
            DatabaseEngine::SqlServer => "sqlserver",
        }
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseEngine {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DatabaseEngine::MySql),
            "postgres" | "postgresql" | "pg" => Ok(DatabaseEngine::Postgres),
            "sqlserver" | "mssql" => Ok(DatabaseEngine::SqlServer),
            other => Err(InstallError::invalid_input(format!(
                "Unsupported database engine '{}'. Use mysql, postgres or sqlserver.",
                other
            ))),
        }
    }
}

/// Per-request connection parameters. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub engine: DatabaseEngine,
    pub host: String,
    /// None means the engine's default port
    pub port: Option<u16>,
    pub schema: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("schema", &self.schema)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl ConnectionParameters {
    /// Build parameters from raw form values. A supplied port must be an integer.
    pub fn from_raw(
        engine: DatabaseEngine,
        host: &str,
        port: Option<&str>,
        schema: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, InstallError> {
        let port = match port.map(str::trim).filter(|p| !p.is_empty()) {
            Some(raw) => Some(crate::utils::validation::parse_port(raw)?),
            None => None,
        };

        Ok(ConnectionParameters {
            engine,
            host: host.trim().to_string(),
            port,
            schema: schema.trim().to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.engine.default_port())
    }

    /// URL for the sqlx-backed engines, or an ADO-style description for SQL Server.
    /// Credentials are percent-encoded; callers must mask before logging.
    pub fn connection_string(&self) -> Result<String, InstallError> {
        if self.host.is_empty() {
            return Err(InstallError::invalid_input("Database host is required."));
        }

        let scheme = match self.engine {
            DatabaseEngine::MySql => "mysql",
            DatabaseEngine::Postgres => "postgres",
            DatabaseEngine::SqlServer => {
                return Ok(format!(
                    "Server=tcp:{},{};Database={};User Id={};Password={};TrustServerCertificate=true",
                    self.host,
                    self.effective_port(),
                    self.schema,
                    self.username,
                    self.password
                ));
            }
        };

        let invalid = |what: &str| {
            InstallError::invalid_input(format!("Database {} is not valid in a connection URL.", what))
        };

        let mut url = Url::parse(&format!("{}://localhost", scheme)).map_err(|_| invalid("scheme"))?;
        url.set_host(Some(&self.host)).map_err(|_| invalid("host"))?;
        url.set_port(Some(self.effective_port()))
            .map_err(|_| invalid("port"))?;
        if !self.username.is_empty() {
            url.set_username(&self.username)
                .map_err(|_| invalid("username"))?;
        }
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| invalid("password"))?;
        }
        url.set_path(&format!("/{}", self.schema));

        Ok(url.to_string())
    }
}

// =============================================================================
// DbConnector trait
// =============================================================================

/// Error returned by connection attempts.
/// Keeps user-friendly messages separate from internal details.
#[derive(Debug, Clone)]
pub struct ConnectError {
    /// User-friendly message (safe to show in UI)
    pub user_message: String,
    /// Internal details for logging (never contains the password)
    pub internal_details: String,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message)
    }
}

impl std::error::Error for ConnectError {}

/// Opens and releases database sessions.
/// Production code uses RealDbConnector; tests use an in-memory connector.
#[async_trait]
pub trait DbConnector: Send + Sync {
    /// Single attempt; no retries.
    async fn open(&self, params: &ConnectionParameters) -> Result<Box<dyn Session>, InstallError>;

    /// Best-effort release: failures are logged, never propagated.
    async fn close(&self, session: Box<dyn Session>) {
        if let Err(e) = session.close().await {
            warn!(
                "[PHASE: database] [STEP: close] Failed to close database connection: {:#}",
                e
            );
        }
    }
}

/// Production connector that actually connects to databases.
pub struct RealDbConnector {
    connect_timeout: Duration,
}

impl RealDbConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        RealDbConnector { connect_timeout }
    }
}

#[async_trait]
impl DbConnector for RealDbConnector {
    async fn open(&self, params: &ConnectionParameters) -> Result<Box<dyn Session>, InstallError> {
        let connection_string = params.connection_string()?;
        info!(
            "[PHASE: database] [STEP: open] Connecting to {} {}",
            params.engine,
            mask_connection_string(&connection_string)
        );

        let result = match params.engine {
            DatabaseEngine::MySql => {
                DatabaseConnection::mysql(&connection_string, self.connect_timeout).await
            }
            DatabaseEngine::Postgres => {
                DatabaseConnection::postgres(&connection_string, self.connect_timeout).await
            }
            DatabaseEngine::SqlServer => {
                DatabaseConnection::sql_server(params, self.connect_timeout).await
            }
        };

        match result {
            Ok(conn) => Ok(Box::new(conn) as Box<dyn Session>),
            Err(e) => {
                let details = redact(&format!("{:#}", e), &params.password);
                warn!(
                    "[PHASE: database] [STEP: open] Connection attempt failed: {}",
                    details
                );
                Err(InstallError::Connection(ConnectError {
                    user_message: if details.to_ascii_lowercase().contains("timed out") {
                        "Connection timed out. Check network connectivity and firewall.".to_string()
                    } else {
                        "Unable to connect. Verify host, credentials, schema and network access."
                            .to_string()
                    },
                    internal_details: details,
                }))
            }
        }
    }
}

fn redact(details: &str, password: &str) -> String {
    if password.is_empty() {
        details.to_string()
    } else {
        details.replace(password, "***")
    }
}

// =============================================================================
// Live connections
// =============================================================================

/// SQL Server connection wrapper.
/// The client sits behind a mutex so the session can be shared by reference; `None` once closed.
pub struct SqlServerConnection {
    client: Arc<Mutex<Option<Client<Compat<TcpStream>>>>>,
}

impl Clone for SqlServerConnection {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl SqlServerConnection {
    pub fn client(&self) -> Arc<Mutex<Option<Client<Compat<TcpStream>>>>> {
        Arc::clone(&self.client)
    }
}

/// Database connection enum covering every supported engine
#[derive(Clone)]
pub enum DatabaseConnection {
    MySql(Pool<MySql>),
    Postgres(Pool<Postgres>),
    SqlServer(SqlServerConnection),
}

impl DatabaseConnection {
    pub async fn mysql(connection_string: &str, connect_timeout: Duration) -> anyhow::Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(connect_timeout)
            .connect(connection_string)
            .await?;
        Ok(DatabaseConnection::MySql(pool))
    }

    pub async fn postgres(
        connection_string: &str,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(connect_timeout)
            .connect(connection_string)
            .await?;
        Ok(DatabaseConnection::Postgres(pool))
    }

    /// Create a SQL Server connection.
    /// Configured field by field so credentials never need ADO escaping.
    pub async fn sql_server(
        params: &ConnectionParameters,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut config = Config::new();
        config.host(&params.host);
        config.port(params.effective_port());
        if !params.schema.is_empty() {
            config.database(&params.schema);
        }
        config.authentication(AuthMethod::sql_server(&params.username, &params.password));
        config.trust_cert();

        let connect = async {
            let tcp = TcpStream::connect(config.get_addr()).await?;
            tcp.set_nodelay(true)?;
            // tiberius expects a futures::io::AsyncWrite, so we use compat_write
            let client = Client::connect(config, tcp.compat_write()).await?;
            Ok::<_, anyhow::Error>(client)
        };

        let client = timeout(connect_timeout, connect)
            .await
            .map_err(|_| anyhow::anyhow!("SQL Server connection attempt timed out"))??;

        Ok(DatabaseConnection::SqlServer(SqlServerConnection {
            client: Arc::new(Mutex::new(Some(client))),
        }))
    }

    pub fn engine(&self) -> DatabaseEngine {
        match self {
            DatabaseConnection::MySql(_) => DatabaseEngine::MySql,
            DatabaseConnection::Postgres(_) => DatabaseEngine::Postgres,
            DatabaseConnection::SqlServer(_) => DatabaseEngine::SqlServer,
        }
    }

    pub fn as_sql_server(&self) -> Option<Arc<Mutex<Option<Client<Compat<TcpStream>>>>>> {
        match self {
            DatabaseConnection::SqlServer(conn) => Some(conn.client()),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
