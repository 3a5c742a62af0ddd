//! Civitas - host and tooling for the identity registry.
//!
//! Ties the registry and governor together behind a serialized service
//! and exposes census tooling and scenario replay on the command line.

pub mod census;
pub mod config;
pub mod scenario;
pub mod service;
pub mod telemetry;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use civitas_crypto::{decode_proof, verify_whitelist, whitelist_leaf};
use civitas_types::{Address, Hash, IdentityId};
use tracing::info;

use crate::census::{build_census, CensusEntry, CensusFile};
use crate::config::CivitasConfig;
use crate::service::CivitasService;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "civitas")]
#[command(about = "Civitas - identity-bound, delegation-weighted voting")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, value_name = "FILE", env = "CIVITAS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level, overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default configuration file
    Init {
        /// Output path
        #[arg(default_value = "civitas.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the census leaf for an (address, id) pair
    Leaf {
        /// Address (hex or bech32)
        address: String,
        /// Identity id
        id: u64,
    },
    /// Check an inclusion proof against a census root
    Verify {
        /// Address (hex or bech32)
        address: String,
        /// Identity id
        id: u64,
        /// Census root (hex)
        root: String,
        /// Proof siblings, leaf to root (hex)
        proof: Vec<String>,
    },
    /// Census tooling
    #[command(subcommand)]
    Census(CensusCommand),
    /// Replay a scenario against a fresh service
    Run {
        /// Scenario file (JSON list of steps)
        scenario: PathBuf,
        /// Census file used to look up omitted proofs
        #[arg(long)]
        census: Option<PathBuf>,
        /// Stop at the first rejected step
        #[arg(long)]
        fail_fast: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CensusCommand {
    /// Build a census from a JSON allow-list of {address, id}
    Build {
        /// Allow-list file
        input: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CivitasConfig::from_file(path)?,
        None => CivitasConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.validate()?;
    telemetry::init_telemetry(&config.logging)?;

    match cli.command {
        Command::Init { path, force } => init(&config, &path, force),
        Command::Leaf { address, id } => leaf(&address, id),
        Command::Verify {
            address,
            id,
            root,
            proof,
        } => verify(&address, id, &root, &proof),
        Command::Census(CensusCommand::Build { input, output }) => census_build(&input, output.as_deref()),
        Command::Run {
            scenario,
            census,
            fail_fast,
        } => run(&config, &scenario, census.as_deref(), fail_fast),
    }
}

fn init(config: &CivitasConfig, path: &std::path::Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("'{}' already exists (use --force to overwrite)", path.display());
    }
    config.to_file(path)?;
    info!(path = %path.display(), "configuration written");
    Ok(())
}

fn leaf(address: &str, id: u64) -> anyhow::Result<()> {
    let address: Address = address
        .parse()
        .with_context(|| format!("Invalid address '{}'", address))?;
    println!("{}", whitelist_leaf(&address, IdentityId::new(id)));
    Ok(())
}

fn verify(address: &str, id: u64, root: &str, proof: &[String]) -> anyhow::Result<()> {
    let address: Address = address
        .parse()
        .with_context(|| format!("Invalid address '{}'", address))?;
    let root: Hash = root.parse().with_context(|| format!("Invalid root '{}'", root))?;
    let proof = decode_proof(proof)?;

    let included = verify_whitelist(&address, IdentityId::new(id), &proof, &root);
    println!("{}", included);
    if !included {
        anyhow::bail!("({}, {}) is not included under {}", address, id, root);
    }
    Ok(())
}

fn census_build(input: &std::path::Path, output: Option<&std::path::Path>) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read allow-list '{}'", input.display()))?;
    let entries: Vec<CensusEntry> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse allow-list '{}'", input.display()))?;

    let census = build_census(&entries)?;
    let json = serde_json::to_string_pretty(&census)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write census '{}'", path.display()))?;
            info!(root = %census.root, members = census.members.len(), "census written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn run(
    config: &CivitasConfig,
    scenario_path: &std::path::Path,
    census_path: Option<&std::path::Path>,
    fail_fast: bool,
) -> anyhow::Result<()> {
    let census: Option<CensusFile> = census_path
        .map(|path| -> anyhow::Result<CensusFile> {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read census '{}'", path.display()))?;
            Ok(serde_json::from_str(&text)?)
        })
        .transpose()?;

    let mut registry = config.registry_settings()?;
    if let Some(census) = &census {
        if census.root != registry.census_root {
            info!(root = %census.root, "census root taken from census file");
            registry.census_root = census.root;
        }
    }
    let service = CivitasService::new(registry, config.governor_settings()?)?;

    let text = std::fs::read_to_string(scenario_path)
        .with_context(|| format!("Failed to read scenario '{}'", scenario_path.display()))?;
    let steps = scenario::parse_scenario(&text)?;
    info!(steps = steps.len(), "replaying scenario");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let report = scenario::replay(&service, &steps, census.as_ref(), fail_fast, &mut out)?;
    out.flush()?;

    info!(
        applied = report.applied,
        rejected = report.rejected,
        height = service.height(),
        supply = service.get_total_supply(),
        "replay complete"
    );
    Ok(())
}
