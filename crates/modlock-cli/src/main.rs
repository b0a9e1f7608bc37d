use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use modlock_core::config::{CliOverrides, ResolverConfig, CONFIG_FILE_NAME};
use modlock_core::diff::lockfile_diff;
use modlock_core::lockfile::{Lockfile, LockfileStore};
use modlock_core::{Container, DiagnosticHandler, LockfileMode};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// modlock - inspect and maintain module extension lockfiles
#[derive(Parser, Debug)]
#[command(name = "modlock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a modlock.json or modlock.yaml configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Lockfile to operate on (default: MODULE.lock in the workspace)
    #[arg(long, value_name = "FILE", global = true)]
    lockfile: Option<PathBuf>,

    /// Lockfile mode (update, error, off)
    #[arg(long, value_name = "MODE", global = true)]
    lockfile_mode: Option<String>,

    /// Workspace root
    #[arg(short, long, value_name = "DIR", global = true, default_value = ".")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the module extensions recorded in the lockfile
    Show {
        /// Print the entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check the lockfile format and every entry's imports
    Check,
    /// Explain how NEW differs from OLD
    Diff {
        #[arg(value_name = "OLD")]
        old: PathBuf,
        #[arg(value_name = "NEW")]
        new: PathBuf,
    },
    /// Drop entries for extensions no module uses anymore
    Prune {
        /// Report what would be removed without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Write a default configuration file
    Init,
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for detailed logs
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Init = cli.command {
        return init_config(&cli.workspace);
    }

    let config = load_config(&cli)?;
    info!("Lockfile mode: {}", config.resolver_options.lockfile_mode);
    let container = Container::new(config);

    match &cli.command {
        Command::Show { json } => show(&container, &cli.workspace, *json),
        Command::Check => check(&container, &cli.workspace),
        Command::Diff { old, new } => diff(old, new),
        Command::Prune { dry_run } => prune(&container, &cli.workspace, *dry_run),
        Command::Init => Ok(()),
    }
}

fn init_config(workspace: &Path) -> anyhow::Result<()> {
    let path = workspace.join(CONFIG_FILE_NAME);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    ResolverConfig::init_file(&path).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Created {}", CONFIG_FILE_NAME);
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<ResolverConfig> {
    let mut config = if let Some(ref path) = cli.config {
        ResolverConfig::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config file: {}", e))?
    } else {
        let default_path = cli.workspace.join(CONFIG_FILE_NAME);
        if default_path.exists() {
            ResolverConfig::from_file(&default_path)
                .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", CONFIG_FILE_NAME, e))?
        } else {
            ResolverConfig::default()
        }
    };

    let mut overrides = CliOverrides::default();
    if let Some(ref mode) = cli.lockfile_mode {
        overrides.lockfile_mode = Some(mode.parse()?);
    }
    if let Some(ref lockfile) = cli.lockfile {
        overrides.lockfile_name = Some(lockfile.to_string_lossy().to_string());
    }
    config.merge(&overrides)?;

    debug!("Resolved configuration: {:?}", config);
    Ok(config)
}

/// Load the workspace lockfile, failing when there is none
fn load_lockfile(store: &LockfileStore) -> anyhow::Result<Lockfile> {
    match store.load()? {
        Some(lockfile) => Ok(lockfile),
        None => bail!("No lockfile found at {}", store.path().display()),
    }
}

fn show(container: &Container, workspace: &Path, json: bool) -> anyhow::Result<()> {
    let lockfile = load_lockfile(&container.lockfile_store(workspace))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&lockfile.module_extensions)?);
        return Ok(());
    }

    if lockfile.module_extensions.is_empty() {
        println!("No module extensions recorded");
        return Ok(());
    }
    for (id, entry) in &lockfile.module_extensions {
        println!(
            "{} (digest {}, {} repositories)",
            id,
            entry.transitive_digest.short(),
            entry.generated_repo_specs.len()
        );
        for (name, spec) in &entry.generated_repo_specs {
            println!("    {} -> {}", name, spec.rule_class_name);
        }
    }
    Ok(())
}

fn check(container: &Container, workspace: &Path) -> anyhow::Result<()> {
    if container.config().resolver_options.lockfile_mode == LockfileMode::Off {
        println!("Lockfile is disabled; nothing to check");
        return Ok(());
    }

    let store = container.lockfile_store(workspace);
    let lockfile = load_lockfile(&store)?;
    let used = lockfile.used_extension_ids()?;
    for id in lockfile.module_extensions.keys().filter(|id| !used.contains(*id)) {
        container
            .diagnostic_handler()
            .warning(&format!("entry for module extension '{}' is not used by any module", id));
    }

    println!(
        "{} is valid: {} module extensions, {} warnings",
        store.path().display(),
        lockfile.module_extensions.len(),
        container.warning_count()
    );
    Ok(())
}

fn diff(old: &Path, new: &Path) -> anyhow::Result<()> {
    let old = load_lockfile(&LockfileStore::new(old))?;
    let new = load_lockfile(&LockfileStore::new(new))?;

    let reasons = lockfile_diff(&old, &new)?;
    if reasons.is_empty() {
        println!("Lockfiles are equivalent");
    }
    for reason in reasons {
        println!("- {}", reason);
    }
    Ok(())
}

fn prune(container: &Container, workspace: &Path, dry_run: bool) -> anyhow::Result<()> {
    match container.config().resolver_options.lockfile_mode {
        LockfileMode::Update => {}
        mode => bail!("Lockfile mode '{}' does not allow writing the lockfile", mode),
    }

    let store = container.lockfile_store(workspace);
    let mut lockfile = load_lockfile(&store)?;
    let removed = lockfile.retain_used_extensions()?;
    if removed.is_empty() {
        println!("Nothing to prune");
        return Ok(());
    }

    for id in &removed {
        println!("Removed {}", id);
    }
    if dry_run {
        println!("Dry run: {} not modified", store.path().display());
    } else {
        store.save(&lockfile)?;
    }
    Ok(())
}
