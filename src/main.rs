//! osac CLI entrypoint.
//!
//! This is the main entrypoint for the osac command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use osac_provision::cli::{
    Cli, Commands, GetTarget, KindArg, OutputFormatter, ResourceArg, StateCommands,
};
use osac_provision::config::{
    find_config_file, ConfigHasher, ConfigParser, ConfigValidator, OsacConfig,
};
use osac_provision::error::{OsacError, PlanError, Result};
use osac_provision::fulfillment::{ClientConfig, FulfillmentClient, ResourceService};
use osac_provision::planner::{DiffEngine, PlanExecutor, ProvisioningPlan};
use osac_provision::provision::{CancelHandle, CancelSignal};
use osac_provision::resources::{
    CatalogReader, Cluster, ComputeInstance, Host, HostPool, ResourceKind, ResourceReconciler,
    ResourceType,
};
use osac_provision::state::{
    with_lock, HistoryEntry, LocalStateStore, ProvisioningState, StateOperation, StateStore,
    LOCK_REFRESH_INTERVAL, STATE_DIR,
};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Cancels in-flight work on Ctrl-C.
fn spawn_interrupt_handler() -> CancelSignal {
    let handle = CancelHandle::new();
    let signal = handle.signal();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            handle.cancel();
        }
    });

    signal
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(config_path, warnings, &formatter),
        Commands::Plan { detailed } => cmd_plan(config_path, detailed, &formatter).await,
        Commands::Apply {
            yes,
            continue_on_error,
        } => cmd_apply(config_path, yes, continue_on_error, &formatter).await,
        Commands::Get { kind, id } => cmd_get(config_path, kind, &id, &formatter).await,
        Commands::Delete { kind, id, yes } => {
            cmd_delete(config_path, kind, &id, yes, &formatter).await
        }
        Commands::Destroy { yes } => cmd_destroy(config_path, yes, &formatter).await,
        Commands::State { command } => cmd_state(config_path, command, &formatter).await,
    }
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let config = parse_config(&config_file)?;

    let validator = ConfigValidator::new();
    let findings = validator.check(&config);
    for error in &findings.errors {
        eprintln!("{}", formatter.error(&format!("{}: {}", error.field, error.message)));
    }

    let result = validator.validate(&config)?;
    println!("{}", formatter.format_validation(&result, &config, show_warnings));

    Ok(())
}

/// Show the plan.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, state_store) = load_config_and_state(config_path)?;
    let state = state_store.load().await?;

    let plan = compute_plan(&config, state.as_ref());
    println!("{}", formatter.format_plan(&plan, detailed));

    Ok(())
}

/// Apply the plan.
async fn cmd_apply(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    continue_on_error: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, state_store) = load_config_and_state(config_path)?;

    let work = apply_locked(
        &config,
        &state_store,
        auto_approve,
        continue_on_error,
        formatter,
    );
    with_lock(&state_store, LOCK_REFRESH_INTERVAL, work).await
}

async fn apply_locked(
    config: &OsacConfig,
    state_store: &impl StateStore,
    auto_approve: bool,
    continue_on_error: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut state = state_store.load().await?.unwrap_or_default();

    let plan = compute_plan(config, Some(&state));
    println!("{}", formatter.format_plan(&plan, false));
    if plan.is_empty() {
        return Ok(());
    }

    if !auto_approve && !confirm("Do you want to apply this plan? [y/N]: ", "y")? {
        eprintln!("Apply cancelled.");
        return Ok(());
    }

    let client = create_client(config)?;
    let executor = PlanExecutor::new(&client, config)
        .with_cancel(spawn_interrupt_handler())
        .with_continue_on_error(continue_on_error);

    let result = executor.execute(&plan, &mut state).await;
    // Resources created before a failure are recorded either way.
    state_store.save(&state).await?;
    let result = result?;

    println!("{}", formatter.format_execution(&result));

    if result.success {
        Ok(())
    } else {
        Err(PlanError::ActionsFailed {
            failed: result.failed + result.skipped,
            total: plan.action_count(),
        }
        .into())
    }
}

/// Read a resource or catalog entry.
async fn cmd_get(
    config_path: Option<&PathBuf>,
    kind: KindArg,
    id: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    let config = load_config(&config_file)?;
    let client = create_client(&config)?;
    let cancel = spawn_interrupt_handler();

    let output = match kind.target() {
        GetTarget::Resource(resource_type) => {
            let view = match resource_type {
                ResourceType::Cluster => read_view::<Cluster>(&client, id, cancel).await?,
                ResourceType::ComputeInstance => {
                    read_view::<ComputeInstance>(&client, id, cancel).await?
                }
                ResourceType::Host => read_view::<Host>(&client, id, cancel).await?,
                ResourceType::HostPool => read_view::<HostPool>(&client, id, cancel).await?,
            };
            formatter.format_object(resource_type.as_str(), &view)
        }
        GetTarget::Catalog(catalog_kind) => {
            let entry = CatalogReader::new(&client)
                .with_cancel(cancel)
                .lookup(catalog_kind, id)
                .await?;
            formatter.format_catalog_entry(catalog_kind, &entry)
        }
    };

    println!("{output}");
    Ok(())
}

/// Delete a single resource by ID.
async fn cmd_delete(
    config_path: Option<&PathBuf>,
    kind: ResourceArg,
    id: &str,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, state_store) = load_config_and_state(config_path)?;
    let resource_type = ResourceType::from(kind);

    if !auto_approve && !confirm(&format!("Delete {resource_type} {id}? [y/N]: "), "y")? {
        eprintln!("Delete cancelled.");
        return Ok(());
    }

    let client = create_client(&config)?;
    let cancel = spawn_interrupt_handler();

    let deleted = match resource_type {
        ResourceType::Cluster => delete_remote::<Cluster>(&client, id, cancel).await,
        ResourceType::ComputeInstance => {
            delete_remote::<ComputeInstance>(&client, id, cancel).await
        }
        ResourceType::Host => delete_remote::<Host>(&client, id, cancel).await,
        ResourceType::HostPool => delete_remote::<HostPool>(&client, id, cancel).await,
    };

    match deleted {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            eprintln!("{}", formatter.warning(&format!("{resource_type} {id} does not exist")));
        }
        Err(e) => return Err(e),
    }

    let forget = forget_record(&state_store, resource_type, id);
    if let Some(address) = with_lock(&state_store, LOCK_REFRESH_INTERVAL, forget).await? {
        info!("Removed {address} from state");
    }

    println!(
        "{}",
        formatter.success(&format!("Deletion of {resource_type} {id} requested"))
    );
    Ok(())
}

/// Removes the record holding `id`, if any, and returns its address.
async fn forget_record(
    state_store: &impl StateStore,
    resource_type: ResourceType,
    id: &str,
) -> Result<Option<String>> {
    let Some(mut state) = state_store.load().await? else {
        return Ok(None);
    };
    let Some(address) = state.find_by_id(resource_type, id).map(str::to_string) else {
        return Ok(None);
    };

    state.remove(&address);
    let config_hash = state.config_hash.clone();
    state.add_history(HistoryEntry::new(
        StateOperation::Delete,
        &config_hash,
        vec![address.clone()],
    ));
    state_store.save(&state).await?;

    Ok(Some(address))
}

/// Destroy every recorded resource.
async fn cmd_destroy(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, state_store) = load_config_and_state(config_path)?;

    let work = destroy_locked(&config, &state_store, auto_approve, formatter);
    with_lock(&state_store, LOCK_REFRESH_INTERVAL, work).await
}

async fn destroy_locked(
    config: &OsacConfig,
    state_store: &impl StateStore,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let Some(mut state) = state_store.load().await? else {
        eprintln!("No state found, nothing to destroy.");
        return Ok(());
    };

    let plan = ProvisioningPlan::destroy(&state);
    if plan.is_empty() {
        eprintln!("No resources to destroy.");
        return Ok(());
    }

    println!("{}", formatter.format_plan(&plan, false));

    if !auto_approve
        && !confirm(
            "\nThis action is IRREVERSIBLE. Type 'destroy' to confirm: ",
            "destroy",
        )?
    {
        eprintln!("Destruction cancelled.");
        return Ok(());
    }

    let client = create_client(config)?;
    let executor = PlanExecutor::new(&client, config)
        .with_cancel(spawn_interrupt_handler())
        .with_continue_on_error(true);

    let result = executor.execute(&plan, &mut state).await;
    state_store.save(&state).await?;
    let result = result?;

    println!("{}", formatter.format_execution(&result));

    if result.success {
        Ok(())
    } else {
        Err(PlanError::ActionsFailed {
            failed: result.failed,
            total: plan.action_count(),
        }
        .into())
    }
}

/// State management commands.
async fn cmd_state(
    config_path: Option<&PathBuf>,
    command: StateCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (_config, state_store) = load_config_and_state(config_path)?;

    match command {
        StateCommands::Show => {
            if let Some(state) = state_store.load().await? {
                let lock = state_store.get_lock_info().await?;
                let lock = lock.filter(|l| !l.is_expired());
                println!("{}", formatter.format_state(&state, lock.as_ref()));
            } else {
                eprintln!("No state found at {}.", state_store.location());
            }
        }
        StateCommands::Unlock { lock_id, force } => {
            if force {
                state_store.force_unlock().await?;
                eprintln!("{}", formatter.success("State forcefully unlocked."));
            } else if let Some(id) = lock_id {
                state_store.release_lock(&id).await?;
                eprintln!("{}", formatter.success("State unlocked."));
            } else {
                eprintln!("Please provide --lock-id or use --force");
            }
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Directory holding the configuration file.
fn config_dir(config_file: &Path) -> &Path {
    config_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Loads `.env`, then the configuration with environment overrides.
fn parse_config(config_file: &Path) -> Result<OsacConfig> {
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_dir(config_file));
    parser.load_dotenv()?;
    parser.load_with_env(config_file)
}

/// Loads and validates the configuration.
fn load_config(config_file: &Path) -> Result<OsacConfig> {
    let config = parse_config(config_file)?;
    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    Ok(config)
}

/// Loads configuration and creates the state store.
fn load_config_and_state(
    config_path: Option<&PathBuf>,
) -> Result<(OsacConfig, Box<dyn StateStore>)> {
    let config_file = resolve_config_path(config_path)?;
    let config = load_config(&config_file)?;

    let base = config_dir(&config_file);
    let state_store: Box<dyn StateStore> = match config.state.path.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let path = if path.is_relative() {
                base.join(path)
            } else {
                path.to_path_buf()
            };
            Box::new(LocalStateStore::with_state_path(path))
        }
        None => Box::new(LocalStateStore::with_base_dir(base.join(STATE_DIR))),
    };
    debug!("Using state at: {}", state_store.location());

    Ok((config, state_store))
}

/// Diffs the configuration against the state and builds a plan.
fn compute_plan(config: &OsacConfig, state: Option<&ProvisioningState>) -> ProvisioningPlan {
    let config_hash = ConfigHasher::new().hash_config(config);
    let diff = DiffEngine::new().compute_diff(config, state);
    ProvisioningPlan::from_diff(&diff, &config_hash)
}

/// Creates a fulfillment API client.
fn create_client(config: &OsacConfig) -> Result<FulfillmentClient> {
    let client_config = ClientConfig::new(config.provider.endpoint.clone())
        .with_token(ConfigParser::get_token())
        .with_insecure(config.provider.insecure)
        .with_request_timeout(Duration::from_secs(config.provider.request_timeout_secs));
    FulfillmentClient::new(client_config)
}

/// Reads a resource and returns its view as JSON.
async fn read_view<K>(
    client: &FulfillmentClient,
    id: &str,
    cancel: CancelSignal,
) -> Result<serde_json::Value>
where
    K: ResourceKind,
    FulfillmentClient: ResourceService<K>,
{
    let object = ResourceReconciler::<K, FulfillmentClient>::new(client)
        .with_cancel(cancel)
        .read(id)
        .await?;
    let view = K::view(&object)?;

    serde_json::to_value(view)
        .map_err(|e| OsacError::internal(format!("Failed to serialize {}: {e}", K::NAME)))
}

/// Requests deletion of a resource.
async fn delete_remote<K>(client: &FulfillmentClient, id: &str, cancel: CancelSignal) -> Result<()>
where
    K: ResourceKind,
    FulfillmentClient: ResourceService<K>,
{
    ResourceReconciler::<K, FulfillmentClient>::new(client)
        .with_cancel(cancel)
        .delete(id)
        .await
}

/// Prompts on stderr and compares the answer.
fn confirm(prompt: &str, expected: &str) -> Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case(expected))
}
