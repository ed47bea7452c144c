//! Recipe Service (recipesrv)
//!
//! Command-line front end: send a recipe file to the controller, receive the
//! controller's recipe into a file, check a file offline, or print the
//! register layout derived from the configuration.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};

use common::logging::{init_with_config, LogConfig};
use depo_comlink::ModbusTcpTransport;
use errors::DepoErrorTrait;
use recipesrv::{RecipeContext, RecipeSrvConfig, RecipeSrvError, DEFAULT_CONFIG_PATH};

/// Command-line arguments for recipesrv
#[derive(Parser, Clone)]
#[command(
    name = "recipesrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Deposition Recipe Service",
    long_about = None
)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, env = "RECIPESRV_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Write a recipe file to the controller and verify it
    Send {
        /// Recipe file to send
        file: PathBuf,
    },
    /// Read the controller's recipe and save it to a file
    Receive {
        /// Destination file
        file: PathBuf,
    },
    /// Validate a recipe file and print its timing
    Check {
        /// Recipe file to check
        file: PathBuf,
    },
    /// Print the register layout and controller capacity
    Layout,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let config = RecipeSrvConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let level_name = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let level = level_name.parse::<Level>().unwrap_or_else(|_| {
        eprintln!("Unknown log level '{}', using info", level_name);
        Level::INFO
    });
    init_with_config(LogConfig {
        service_name: "recipesrv".to_string(),
        log_dir: config.logging.dir.clone(),
        level,
        enable_json: config.logging.json,
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let ctx = config.build_context()?;
    info!(
        "Configuration loaded: {} columns, {} actions, {} targets",
        ctx.schema.len(),
        ctx.catalog.len(),
        ctx.targets.len()
    );

    let cancel = CancellationToken::new();
    let signal_task = common::cancel_on_shutdown(cancel.clone());

    let result = run(&ctx, args.command, &cancel).await;
    signal_task.abort();

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            report(&err);
            Ok(ExitCode::FAILURE)
        },
    }
}

async fn run(
    ctx: &RecipeContext,
    command: Command,
    cancel: &CancellationToken,
) -> recipesrv::Result<()> {
    match command {
        Command::Send { file } => {
            let loaded = ctx.file_store().load(&file)?;
            let mut service = ctx.sync_service(ModbusTcpTransport::new(ctx.plc.link_config()))?;
            let report = service.send(&loaded.recipe, cancel).await?;
            println!(
                "Sent {} rows ({} int + {} float registers), verified",
                report.rows, report.int_registers, report.float_registers
            );
        },
        Command::Receive { file } => {
            let mut service = ctx.sync_service(ModbusTcpTransport::new(ctx.plc.link_config()))?;
            let recipe = service.receive(cancel).await?;
            ctx.file_store().save(&file, &recipe)?;
            println!("Received {} rows into {}", recipe.len(), file.display());
        },
        Command::Check { file } => {
            let loaded = ctx.file_store().load(&file)?;
            let footprint = ctx.capacity().check(&loaded.recipe)?;
            let timing = ctx.analyzer().calculate(&loaded.recipe)?;

            println!("{}: {} rows", file.display(), footprint.rows);
            println!(
                "  registers: {} int, {} float",
                footprint.int_registers, footprint.float_registers
            );
            println!("  total duration: {:.3} s", timing.total_seconds);
            for (row, start) in timing.start_times.iter().enumerate() {
                println!("  {:>5}  {:>12.3} s", row, start);
            }
        },
        Command::Layout => {
            let layout = &ctx.layout;
            println!(
                "Per row: {} int registers, {} float registers",
                layout.int_columns(),
                layout.float_registers_per_row()
            );
            for slot in layout.slots() {
                println!(
                    "  {:<16} {:<8} {:<6} index {}",
                    slot.key.as_str(),
                    slot.kind.as_str(),
                    slot.area.as_str(),
                    slot.index
                );
            }
            println!("Controller capacity: {} rows", ctx.capacity().max_rows());
        },
    }
    Ok(())
}

fn report(err: &RecipeSrvError) {
    let info = err.to_error_info();
    let level = err.log_level();
    if level == Level::ERROR {
        error!("[{}] {}", info.code, info.message);
    } else if level == Level::WARN {
        warn!("[{}] {}", info.code, info.message);
    } else {
        info!("[{}] {}", info.code, info.message);
    }
    for (group, messages) in &info.field_errors {
        for message in messages {
            warn!("  {}: {}", group, message);
        }
    }
    if err.is_retryable() {
        info!("The operation can be retried");
    }
}
