//! Netfilter conventions shared by the install path and the polling path.
//!
//! Everything that has to agree between the rules we install and the dump we
//! read back lives here: the chain naming templates, the rule identifier
//! template, the supported tables and the hook chains they splice into.
//!
//! # Key Components
//!
//! - [`Direction`] and [`ChainKey`]: identify one generated per-interface chain.
//! - [`Family`] and [`Table`]: select the xtables binaries and the hook chains.
//! - [`ChainRuleBuilder`]: generates the idempotent install sequence.
//! - [`XtCommand`]: one command of that sequence, renderable and executable.
mod builder;
mod command;
mod error;
mod shell;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use builder::ChainRuleBuilder;
pub use command::{XtCommand, execute_all};
pub use error::{Error, Result};
pub use shell::{quote_word, split_words};

/// Prefix shared by every chain we generate.
pub const CHAIN_PREFIX: &str = "teuc_";

/// Prefix for auto-assigned rule identifiers (`teuc_0`, `teuc_1`, ...).
pub const RULE_ID_PREFIX: &str = "teuc_";

/// Longest chain name the kernel accepts.
pub const MAX_CHAIN_NAME_LEN: usize = 28;

/// Traffic direction relative to the monitored interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Iteration order used everywhere a sequence depends on direction.
    pub const ALL: [Direction; 2] = [Direction::In, Direction::Out];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    /// The xtables option matching the interface for this direction.
    pub fn interface_flag(self) -> &'static str {
        match self {
            Direction::In => "-i",
            Direction::Out => "-o",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one generated per-interface chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainKey {
    pub interface: Arc<str>,
    pub direction: Direction,
}

impl ChainKey {
    pub fn new(interface: impl Into<Arc<str>>, direction: Direction) -> Self {
        Self {
            interface: interface.into(),
            direction,
        }
    }

    pub fn chain_name(&self) -> String {
        interface_chain_name(&self.interface, self.direction)
    }
}

/// Name of the per-direction chain that fans out into the interface chains.
pub fn aggregation_chain_name(direction: Direction) -> String {
    format!("{CHAIN_PREFIX}{direction}")
}

/// Name of the chain holding the counting rules for one interface and direction.
pub fn interface_chain_name(interface: &str, direction: Direction) -> String {
    format!("{CHAIN_PREFIX}{interface}_{direction}")
}

pub fn rule_id(counter: u64) -> String {
    format!("{RULE_ID_PREFIX}{counter}")
}

/// Address family, which decides the xtables binaries to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    #[default]
    Ipv4,
    Ipv6,
}

impl Family {
    pub fn xt_binary(self) -> &'static str {
        match self {
            Family::Ipv4 => "iptables",
            Family::Ipv6 => "ip6tables",
        }
    }

    pub fn save_binary(self) -> &'static str {
        match self {
            Family::Ipv4 => "iptables-save",
            Family::Ipv6 => "ip6tables-save",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Family::Ipv4 => "ipv4",
            Family::Ipv6 => "ipv6",
        })
    }
}

/// Tables we know how to hook into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Filter,
    Mangle,
    Nat,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Filter => "filter",
            Table::Mangle => "mangle",
            Table::Nat => "nat",
        }
    }

    /// Built-in chains the aggregation chain for `direction` is spliced into.
    pub fn hook_chains(self, direction: Direction) -> &'static [&'static str] {
        match (self, direction) {
            (Table::Filter, Direction::In) => &["INPUT", "FORWARD"],
            (Table::Filter, Direction::Out) => &["OUTPUT", "FORWARD"],
            (Table::Mangle | Table::Nat, Direction::In) => &["PREROUTING"],
            (Table::Mangle | Table::Nat, Direction::Out) => &["POSTROUTING"],
        }
    }
}

impl FromStr for Table {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "filter" => Ok(Table::Filter),
            "mangle" => Ok(Table::Mangle),
            "nat" => Ok(Table::Nat),
            other => Err(Error::UnsupportedTable(other.to_owned())),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
