//! ztpflow CLI
//!
//! Runs staged switch-fabric provisioning workflows

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use eyre::WrapErr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ztpflow_actions::CommandActionExecutor;
use ztpflow_core::{AbortHandle, Orchestrator, Workflow};
use ztpflow_exec::Credentials;
use ztpflow_inventory::Inventory;

mod config;
mod factory;
mod sink;

use config::{Config, LoggingConfig};
use factory::InventoryTransports;
use sink::OutputFormat;

#[derive(Parser)]
#[command(name = "ztpflow")]
#[command(about = "Staged switch-fabric provisioning", long_about = None)]
struct Cli {
    /// Config file (defaults: $ZTPFLOW_CONFIG, ./ztpflow.toml, /etc/ztpflow/ztpflow.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow against the fabric
    #[command(name = "run")]
    Run {
        #[arg(short, long)]
        workflow: PathBuf,
        #[arg(short, long)]
        inventory: PathBuf,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Resolve every stage's targets without touching a switch
    #[command(name = "plan")]
    Plan {
        #[arg(short, long)]
        workflow: PathBuf,
        #[arg(short, long)]
        inventory: PathBuf,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Check a workflow file
    #[command(name = "validate")]
    Validate {
        #[arg(short, long)]
        workflow: PathBuf,
        /// Also resolve targets against an inventory
        #[arg(short, long)]
        inventory: Option<PathBuf>,
    },
    /// List inventory groups and hosts
    #[command(name = "hosts")]
    Hosts {
        #[arg(short, long)]
        inventory: PathBuf,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
}

fn init_tracing(logging: &LoggingConfig, force_json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if logging.json || force_json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

/// Orchestrator over the workflow's command actions and the inventory
fn build_orchestrator(
    config: &Config,
    workflow: &Workflow,
    inventory: Arc<Inventory>,
    credentials: Arc<Credentials>,
) -> Result<Orchestrator> {
    let transports = Arc::new(InventoryTransports::new(
        Arc::clone(&inventory),
        Arc::clone(&credentials),
        config.transport.default_user.clone(),
    ));
    let executor = CommandActionExecutor::new(workflow.actions.clone(), transports, credentials)
        .with_command_timeout(Duration::from_secs(config.transport.command_timeout_secs));
    executor.validate()?;

    Ok(Orchestrator::new(Arc::new(executor), inventory, config.engine.clone()))
}

fn load_inputs(workflow: &Path, inventory: &Path) -> Result<(Workflow, Arc<Inventory>)> {
    let workflow = Workflow::load(workflow)?;
    workflow.validate()?;
    let inventory = Arc::new(Inventory::load(inventory)?);
    Ok((workflow, inventory))
}

/// Exit status after a second Ctrl-C, as for SIGINT
const INTERRUPTED: i32 = 130;

/// First interrupt aborts the run between stages. Returns `true` on a
/// second interrupt, when the caller should quit without waiting.
async fn watch_interrupts<F, Fut>(handle: AbortHandle, mut interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    warn!("interrupt received, stopping after the current stage (Ctrl-C again to quit now)");
    handle.abort();

    if interrupt().await.is_err() {
        return false;
    }
    warn!("second interrupt, exiting without waiting for the current stage");
    true
}

async fn run(
    config: &Config,
    workflow: &Path,
    inventory: &Path,
    format: OutputFormat,
) -> Result<u8> {
    let (workflow, inventory) = load_inputs(workflow, inventory)?;
    let (handle, signal) = AbortHandle::pair();
    let credentials = Arc::new(
        config
            .credentials
            .resolve()
            .wrap_err("failed to load switch credentials")?,
    );
    let orchestrator =
        build_orchestrator(config, &workflow, inventory, credentials)?.with_abort_signal(signal);

    tokio::spawn(async move {
        if watch_interrupts(handle, tokio::signal::ctrl_c).await {
            std::process::exit(INTERRUPTED);
        }
    });

    let progress = (format == OutputFormat::Text)
        .then(|| tokio::spawn(sink::follow_progress(orchestrator.subscribe())));

    info!(workflow = workflow.name.as_deref().unwrap_or("-"), "starting workflow");
    let report = orchestrator.run(&workflow.stages).await?;

    if let Some(progress) = progress {
        let _ = progress.await;
    }
    print!("{}", sink::render_report(&report, format)?);
    Ok(report.verdict().exit_code())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = Config::resolve(cli.config.as_deref())?;
    init_tracing(&config.logging, cli.log_json);

    match cli.command {
        Commands::Run {
            workflow,
            inventory,
            format,
        } => {
            let code = run(&config, &workflow, &inventory, format).await?;
            return Ok(ExitCode::from(code));
        }
        Commands::Plan {
            workflow,
            inventory,
            format,
        } => {
            let (workflow, inventory) = load_inputs(&workflow, &inventory)?;
            // planning never logs in, so no secrets are loaded
            let anonymous = Arc::new(Credentials::anonymous());
            let plan = build_orchestrator(&config, &workflow, inventory, anonymous)?
                .plan(&workflow.stages)?;
            print!("{}", sink::render_plan(&plan, format)?);
        }
        Commands::Validate { workflow, inventory } => {
            let path = workflow;
            let workflow = Workflow::load(&path)?;
            workflow.validate()?;
            if let Some(inventory) = inventory {
                let inventory = Arc::new(Inventory::load(&inventory)?);
                let anonymous = Arc::new(Credentials::anonymous());
                build_orchestrator(&config, &workflow, inventory, anonymous)?
                    .plan(&workflow.stages)?;
            }
            println!(
                "{}: {} stages, {} actions, ok",
                path.display(),
                workflow.stages.len(),
                workflow.actions.len()
            );
        }
        Commands::Hosts { inventory, format } => {
            let inventory = Inventory::load(&inventory)?;
            print!("{}", sink::render_hosts(&inventory, format)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}
