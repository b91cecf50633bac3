// Command-line arguments
// `tank-installer <verify|inspect|migrate|create-admin> [OPTIONS]`

use clap::{Args, Parser, Subcommand};
use std::fmt;
use std::path::PathBuf;

use crate::error::InstallError;
use crate::installation::Operation;
use crate::models::requests::{CreateAdminRequest, InstallConnectionRequest};

pub const DB_PASSWORD_ENV: &str = "TANK_INSTALLER_DB_PASSWORD";
pub const ADMIN_PASSWORD_ENV: &str = "TANK_INSTALLER_ADMIN_PASSWORD";

#[derive(Debug, Parser)]
#[command(name = "tank-installer")]
#[command(about = "Tank first-run installer: schema bootstrap and administrator provisioning")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML settings file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Do not echo log lines to the console
    #[arg(long, global = true)]
    pub no_stdout_log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Check that the database is reachable
    Verify(ConnectionArgs),

    /// Report missing tables and columns
    Inspect(ConnectionArgs),

    /// Create missing tables and columns
    Migrate(ConnectionArgs),

    /// Create an administrator account
    CreateAdmin(CreateAdminArgs),
}

/// Connection flags shared by every command.
#[derive(Clone, PartialEq, Eq, Args)]
pub struct ConnectionArgs {
    /// mysql, postgres or sqlserver; defaults to the configured engine
    #[arg(long)]
    pub engine: Option<String>,

    #[arg(long, default_value = "")]
    pub host: String,

    /// Kept as text so a malformed value is reported as invalid input
    #[arg(long)]
    pub port: Option<String>,

    #[arg(long, default_value = "")]
    pub schema: String,

    #[arg(long, default_value = "")]
    pub username: String,

    #[arg(long, env = DB_PASSWORD_ENV, default_value = "", hide_env_values = true)]
    pub password: String,
}

#[derive(Clone, PartialEq, Eq, Args)]
pub struct CreateAdminArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[arg(long, default_value = "")]
    pub admin_username: String,

    #[arg(long, default_value = "")]
    pub admin_email: String,

    #[arg(long, env = ADMIN_PASSWORD_ENV, default_value = "", hide_env_values = true)]
    pub admin_password: String,
}

impl fmt::Debug for ConnectionArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_request().fmt(f)
    }
}

impl fmt::Debug for CreateAdminArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_request().fmt(f)
    }
}

/// Outcome of argument parsing that is not a runnable command.
#[derive(Debug)]
pub enum CliExit {
    /// `--help` or `--version`; the text goes to stdout and the exit code is 0
    Info(String),
    Usage(InstallError),
}

impl Cli {
    /// Parse arguments, program name excluded.
    pub fn parse_args(args: &[String]) -> Result<Self, CliExit> {
        let argv = std::iter::once("tank-installer").chain(args.iter().map(String::as_str));
        Cli::try_parse_from(argv).map_err(|e| match e.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                CliExit::Info(e.to_string())
            }
            _ => CliExit::Usage(InstallError::invalid_input(e.to_string())),
        })
    }
}

impl Command {
    pub fn operation(&self) -> Operation {
        match self {
            Command::Verify(_) => Operation::Verify,
            Command::Inspect(_) => Operation::Inspect,
            Command::Migrate(_) => Operation::Migrate,
            Command::CreateAdmin(_) => Operation::Provision,
        }
    }

    pub fn connection(&self) -> &ConnectionArgs {
        match self {
            Command::Verify(c) | Command::Inspect(c) | Command::Migrate(c) => c,
            Command::CreateAdmin(a) => &a.connection,
        }
    }
}

impl ConnectionArgs {
    pub fn to_request(&self) -> InstallConnectionRequest {
        InstallConnectionRequest {
            engine: self.engine.clone(),
            host: self.host.clone(),
            port: self.port.clone(),
            schema: self.schema.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl CreateAdminArgs {
    pub fn to_request(&self) -> CreateAdminRequest {
        CreateAdminRequest {
            connection: self.connection.to_request(),
            admin_username: self.admin_username.clone(),
            admin_email: self.admin_email.clone(),
            admin_password: self.admin_password.clone(),
        }
    }
}
