//! Service configuration.
//!
//! Handles loading and validation of the registry, governance and
//! logging sections from a TOML file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use civitas_governance::GovernorSettings;
use civitas_identity::RegistrySettings;
use civitas_types::{Address, Hash};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CivitasConfig {
    pub registry: RegistryConfig,
    pub governance: GovernanceConfig,
    pub logging: LoggingConfig,
}

impl CivitasConfig {
    /// Load configuration from file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config: CivitasConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file '{}'", path.display()))?;
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.registry_settings()?;
        self.governor_settings()?;
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            anyhow::bail!("Unknown log format '{}' (expected pretty or json)", self.logging.format);
        }
        Ok(())
    }

    /// Typed registry settings.
    pub fn registry_settings(&self) -> anyhow::Result<RegistrySettings> {
        let admin: Address = self
            .registry
            .admin
            .parse()
            .with_context(|| format!("Invalid admin address '{}'", self.registry.admin))?;
        let census_root: Hash = self
            .registry
            .census_root
            .parse()
            .with_context(|| format!("Invalid census root '{}'", self.registry.census_root))?;

        Ok(RegistrySettings {
            name: self.registry.name.clone(),
            symbol: self.registry.symbol.clone(),
            admin,
            census_root,
            metadata_pointer: self.registry.metadata_pointer.clone(),
        })
    }

    /// Typed governor settings.
    pub fn governor_settings(&self) -> anyhow::Result<GovernorSettings> {
        let settings = GovernorSettings {
            voting_delay: self.governance.voting_delay,
            voting_period: self.governance.voting_period,
            quorum_percentage: self.governance.quorum_percentage,
            proposal_threshold: self.governance.proposal_threshold,
            grace_period: self.governance.grace_period,
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Collection name
    pub name: String,
    /// Collection symbol
    pub symbol: String,
    /// Census admin, hex or bech32
    pub admin: String,
    /// Initial census root (hex)
    pub census_root: String,
    /// Pointer to the published census data
    pub metadata_pointer: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: "The Gov ZK Protocol".to_string(),
            symbol: "GOV".to_string(),
            admin: format!("{:x}", Address::ZERO),
            census_root: Hash::ZERO.to_string(),
            metadata_pointer: "QmNxC3pms2ZtNicUjhKgGVzvcqETGEZX92jB8qK9ynzcuf".to_string(),
        }
    }
}

/// Governance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Steps between proposal and voting start
    pub voting_delay: u64,
    /// Voting window length in steps
    pub voting_period: u64,
    /// Quorum percentage of snapshot supply
    pub quorum_percentage: u64,
    /// Minimum proposer weight
    pub proposal_threshold: u64,
    /// Finalization window after voting ends
    pub grace_period: Option<u64>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        let defaults = GovernorSettings::default();
        Self {
            voting_delay: defaults.voting_delay,
            voting_period: defaults.voting_period,
            quorum_percentage: defaults.quorum_percentage,
            proposal_threshold: defaults.proposal_threshold,
            grace_period: defaults.grace_period,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive
    pub level: String,
    /// Log to file
    pub log_file: Option<PathBuf>,
    /// Log format (json|pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
            format: "pretty".to_string(),
        }
    }
}
