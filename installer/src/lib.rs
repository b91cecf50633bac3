// Tank schema installer
// Library entry point

pub mod api;
pub mod cli;
pub mod database;
pub mod error;
pub mod installation;
pub mod models;
pub mod security;
pub mod utils;

use log::{error, info, LevelFilter};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::cli::{Cli, CliExit, Command};
use crate::installation::Installer;
use crate::models::responses::ApiResponse;
use crate::models::settings::InstallerSettings;

/// Initialize logging with dual file output (JSON + human-readable) and optional stdout.
pub fn init_logging(
    level: LevelFilter,
    log_dir: Option<&std::path::Path>,
    with_stdout: bool,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let log_dir = utils::path_resolver::resolve_log_folder(log_dir)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");
    let json_log_file = log_dir.join(format!("tank-installer-{}.log", timestamp));
    let txt_log_file = log_dir.join(format!("tank-installer-{}.txt", timestamp));

    let mut dispatch = fern::Dispatch::new().level(level);

    // stdout carries the JSON envelope; human log lines go to stderr.
    if with_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!("{}", human_line(&message.to_string(), record)))
                })
                .chain(std::io::stderr()),
        );
    }

    dispatch
        .chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    let (phase, step, cleaned) =
                        utils::logging::parse_log_metadata(&message.to_string());
                    let line = utils::logging::format_json_log(
                        &chrono::Utc::now().to_rfc3339(),
                        record.level(),
                        record.target(),
                        &cleaned,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}", line))
                })
                .chain(fern::log_file(json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!("{}", human_line(&message.to_string(), record)))
                })
                .chain(fern::log_file(txt_log_file)?),
        )
        .apply()?;

    info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(log_dir)
}

fn human_line(message: &str, record: &log::Record) -> String {
    let (phase, step, cleaned) = utils::logging::parse_log_metadata(message);
    utils::logging::format_human_readable_log(
        &chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        record.level(),
        record.target(),
        &cleaned,
        phase.as_deref(),
        step.as_deref(),
    )
}

/// Run the command line: parse, configure, execute one operation, print the envelope.
/// Exit code 0 on success, 2 for invalid input, 1 for any other failure.
pub fn run_cli(args: &[String]) -> ExitCode {
    ExitCode::from(run(args))
}

fn run(args: &[String]) -> u8 {
    let cli = match Cli::parse_args(args) {
        Ok(cli) => cli,
        Err(CliExit::Info(text)) => {
            print!("{}", text);
            return 0;
        }
        Err(CliExit::Usage(e)) => return emit(&ApiResponse::<()>::from_error(&e)),
    };

    let settings = match InstallerSettings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load settings: {:#}", e);
            return 1;
        }
    };

    if let Err(e) = init_logging(
        settings.level_filter(),
        settings.log_dir.as_deref(),
        settings.log_to_stdout && !cli.no_stdout_log,
    ) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let installer = match Installer::from_settings(&settings) {
        Ok(i) => i,
        Err(e) => {
            error!("[PHASE: initialization] Invalid installer settings: {:#}", e);
            eprintln!("Invalid installer settings: {:#}", e);
            return 1;
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("[PHASE: initialization] Failed to create async runtime: {}", e);
            eprintln!("Failed to create async runtime: {}", e);
            return 1;
        }
    };

    info!(
        "[PHASE: initialization] Running {}",
        cli.command.operation().as_str()
    );
    match &cli.command {
        Command::Verify(conn) => {
            emit(&rt.block_on(api::install::verify(&installer, &conn.to_request())))
        }
        Command::Inspect(conn) => emit(&rt.block_on(api::install::table_info_list(
            &installer,
            &conn.to_request(),
        ))),
        Command::Migrate(conn) => emit(&rt.block_on(api::install::create_table(
            &installer,
            &conn.to_request(),
        ))),
        Command::CreateAdmin(admin) => emit(&rt.block_on(api::install::create_admin(
            &installer,
            &admin.to_request(),
        ))),
    }
}

fn emit<T: Serialize>(response: &ApiResponse<T>) -> u8 {
    match serde_json::to_string_pretty(response) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize response: {}", e),
    }
    exit_code(response)
}

fn exit_code<T>(response: &ApiResponse<T>) -> u8 {
    match response.error_kind {
        None if response.success => 0,
        Some(kind) => kind.exit_code(),
        None => 1,
    }
}
