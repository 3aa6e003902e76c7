//! The configuration file.
//!
//! The file is read once at startup. [`Config::build`] turns every configured
//! rule set into a [`MonitoredTable`], validating rules and tables on the way,
//! so nothing downstream has to deal with invalid input.
mod error;

use std::io::Read;
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

pub use error::{Error, Result};

use crate::fsutil;
use crate::netfilter::{ChainRuleBuilder, Family};
use crate::rrd::{RrdCreateParams, RrdFileNamer, RrdToolConfig};
use crate::rules::{RuleRegistry, RuleSet, RuleSpec};

/// Used when neither `-c` nor `TEUCRIUM_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/teucrium/teucrium.json";

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_commit_interval() -> u32 {
    12
}

fn default_table() -> String {
    "filter".to_owned()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Seconds between two dumps.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Number of polls buffered before the samples are written.
    #[serde(default = "default_commit_interval")]
    pub commit_interval: u32,
    #[serde(default)]
    pub rrdtool: RrdToolConfig,
    pub rule_sets: Vec<RuleSetConfig>,
}

/// One monitored table of one address family.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSetConfig {
    #[serde(default)]
    pub family: Family,
    #[serde(default = "default_table")]
    pub table: String,
    pub interfaces: Vec<String>,
    /// Prefix of every database path, usually a directory ending in `/`.
    pub rrd_base: String,
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub rrd: RrdCreateParams,
}

/// A validated rule set with everything needed to install and poll it.
#[derive(Debug)]
pub struct MonitoredTable {
    pub family: Family,
    pub builder: ChainRuleBuilder,
    pub rule_set: RuleSet,
    pub namer: RrdFileNamer,
    pub rrd: RrdCreateParams,
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or is not a valid configuration.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = fsutil::open_file_reader(path)?;
        let config = Self::from_reader(reader, path)?;
        log::info!(
            "loaded configuration from `{}` with {} rule sets",
            path.display(),
            config.rule_sets.len()
        );
        Ok(config)
    }

    fn from_reader(reader: impl Read, path: &Path) -> Result<Self> {
        let config: Config = serde_json::from_reader(reader).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::ZeroPollInterval);
        }
        if self.commit_interval == 0 {
            return Err(Error::ZeroCommitInterval);
        }
        if self.rule_sets.is_empty() {
            return Err(Error::NoRuleSets);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn commit_interval(&self) -> NonZeroU32 {
        NonZeroU32::new(self.commit_interval).unwrap_or(NonZeroU32::MIN)
    }

    /// Registers the rules of every rule set.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error, tagged with the index of the
    /// offending rule set.
    pub fn build(&self) -> Result<Vec<MonitoredTable>> {
        self.rule_sets
            .iter()
            .enumerate()
            .map(|(index, rule_set)| rule_set.build(index))
            .collect()
    }
}

impl RuleSetConfig {
    fn build(&self, index: usize) -> Result<MonitoredTable> {
        let builder = ChainRuleBuilder::new(self.family, &self.table)
            .map_err(|source| Error::Netfilter { index, source })?;
        let mut registry =
            RuleRegistry::new(&self.interfaces).map_err(|source| Error::Rules { index, source })?;
        for spec in &self.rules {
            let id = registry
                .add_rule(spec.clone())
                .map_err(|source| Error::Rules { index, source })?;
            log::debug!("datasource `{}` is counted by rule `{id}`", spec.datasource);
        }
        if self.rules.is_empty() {
            log::warn!("rule set {index} ({} {}) has no rules", self.family, self.table);
        }

        Ok(MonitoredTable {
            family: self.family,
            builder,
            rule_set: registry.freeze(),
            namer: RrdFileNamer::new(self.rrd_base.clone()),
            rrd: self.rrd.clone(),
        })
    }
}
