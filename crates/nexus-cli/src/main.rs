//! Nexus - deployment core tooling
//!
//! Usage:
//!   nexus package inspect <ARCHIVE>        # Print the package metadata
//!   nexus package stability <VERSION>      # Check whether a version is stable
//!   nexus constraint <CONSTRAINT> <VERSION>
//!   nexus target simulate <SCENARIO>       # Replay a deploy target scenario
//!   nexus config show

mod scenario;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nexus_core::archive::{ArchiveLoader, ZipArchiveHandle};
use nexus_core::config::{ConfigStore, NexusConfig};
use nexus_core::package::{
    ArchivePackage, BuildIdAware, ConstraintBuilder, export_package, is_stable_version,
};
use nexus_core::target::DeployTarget;

use crate::scenario::Scenario;

#[derive(Parser)]
#[command(name = "nexus")]
#[command(about = "Application deployment core tooling", long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user nexus.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect package archives and versions
    Package(PackageArgs),

    /// Check a version against a constraint (exit code 1 if it does not match)
    Constraint {
        /// Constraint, e.g. ">=7.4 <8.3 || ^8.3"
        constraint: String,
        /// Version to check
        version: String,
    },

    /// Work with deploy targets
    Target(TargetArgs),

    /// Show configuration
    Config(ConfigArgs),
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

#[derive(Args)]
struct PackageArgs {
    #[command(subcommand)]
    command: PackageSubcommand,
}

#[derive(Subcommand)]
enum PackageSubcommand {
    /// Read the package from a composer or ZPK archive
    Inspect {
        /// Archive path, or a file name inside the download directory
        archive: PathBuf,

        /// Build id appended to the package version
        #[arg(long)]
        build_id: Option<String>,
    },

    /// Check whether a version string denotes a stable release
    Stability {
        version: String,
    },
}

#[derive(Args)]
struct TargetArgs {
    #[command(subcommand)]
    command: TargetSubcommand,
}

#[derive(Subcommand)]
enum TargetSubcommand {
    /// Build a deploy target from a scenario file and refresh it
    Simulate {
        /// Scenario file (TOML)
        scenario: PathBuf,

        /// Number of refresh rounds
        #[arg(long, short, default_value_t = 1)]
        rounds: usize,

        /// Sync the target after the last round
        #[arg(long)]
        sync: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let store = match &cli.config {
        Some(path) => ConfigStore::from_path(path),
        None => ConfigStore::new()?,
    };
    let config = store
        .load()
        .with_context(|| format!("Failed to load {}", store.config_path().display()))?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Package(args) => run_package(args, &config),
        Commands::Constraint {
            constraint,
            version,
        } => run_constraint(&constraint, &version),
        Commands::Target(args) => run_target(args, &config),
        Commands::Config(args) => run_config(args, &store, &config),
    }
}

fn run_package(args: PackageArgs, config: &NexusConfig) -> Result<()> {
    match args.command {
        PackageSubcommand::Inspect { archive, build_id } => {
            let loader = ArchiveLoader::with_default_loaders(config.download_dir());
            let path = loader.ensure_local_archive_file(&archive)?;

            let mut handle = ZipArchiveHandle::open(&path)
                .with_context(|| format!("Failed to open archive {}", path.display()))?;
            let mut package = loader.get_package(&mut handle)?;

            if let Some(build_id) = build_id {
                package.set_build_id(&build_id)?;
            }

            let export = export_package(package.as_package());
            println!("{}", serde_json::to_string_pretty(&export)?);
        }
        PackageSubcommand::Stability { version } => {
            if is_stable_version(&version) {
                println!("{} is stable", version);
            } else {
                println!("{} is not stable", version);
            }
        }
    }
    Ok(())
}

fn run_constraint(constraint: &str, version: &str) -> Result<()> {
    let parsed = ConstraintBuilder::new()
        .create_constraint(constraint)
        .with_context(|| format!("Invalid constraint '{}'", constraint))?;

    if parsed.matches(version) {
        println!("✓ {} satisfies {}", version, constraint);
        Ok(())
    } else {
        println!("✗ {} does not satisfy {}", version, constraint);
        std::process::exit(1);
    }
}

fn run_target(args: TargetArgs, config: &NexusConfig) -> Result<()> {
    match args.command {
        TargetSubcommand::Simulate {
            scenario,
            rounds,
            sync,
            format,
        } => {
            let base_dir = scenario.parent().unwrap_or(Path::new(".")).to_path_buf();
            let mut target = Scenario::from_path(&scenario)?.build(&base_dir, config)?;

            for round in 1..=rounds {
                let state = target.refresh_status()?;
                if matches!(format, OutputFormat::Text) {
                    println!("Round {}: target {}", round, state);
                    print_instances(&target);
                }
            }

            if sync {
                target.sync()?;
            }

            match format {
                OutputFormat::Text => print_summary(&target),
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&target.export()?)?);
                }
            }
        }
    }
    Ok(())
}

fn print_instances(target: &DeployTarget) {
    if target.applications().is_empty() {
        println!("  (no application instances)");
        return;
    }

    for instance in target.applications() {
        let removed = if instance.is_removed() { " (removing)" } else { "" };
        println!(
            "  {:<20} {:<14} {}{}",
            instance.id(),
            instance.state().as_str(),
            instance.path(),
            removed
        );
    }
}

fn print_summary(target: &DeployTarget) {
    println!();
    println!("Deploy target: {} ({})", target.name(), target.id());
    println!("State: {}", target.state());
    println!(
        "Nodes: {}  VHosts: {}  Instances: {}",
        target.nodes().len(),
        target.vhosts().len(),
        target.applications().len()
    );

    for node in target.nodes() {
        println!(
            "  {:<20} {:<10} {}",
            node.name().unwrap_or(node.id()),
            node.node_type(),
            node.state()
        );
    }
}

fn run_config(args: ConfigArgs, store: &ConfigStore, config: &NexusConfig) -> Result<()> {
    match args.command {
        ConfigSubcommand::Show => {
            print!("{}", config.to_toml_string()?);
            println!("# download directory: {}", config.download_dir().display());
        }
        ConfigSubcommand::Path => {
            println!("{}", store.config_path().display());
        }
    }
    Ok(())
}
