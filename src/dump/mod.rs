//! Reading counters back out of the kernel.
//!
//! A dump is an ordered list of [`DumpEntry`] values for one table. The dump
//! source inserts a boundary sentinel (target `ERROR`) at the head of every
//! chain; [`DumpStateMachine`] uses those sentinels to group counters per
//! chain and maps each counting rule back to its datasource.
//!
//! The dump is treated as untrusted: chains we did not create, rules without
//! our comment and rules racing with reconfiguration are skipped, never fatal.
mod error;
mod parser;
mod source;
mod state;

pub use error::{Anomaly, Error, Result};
pub use parser::{ParseError, parse_rule_line, parse_save_output};
pub use source::{DumpSource, XtablesSaveSource};
pub use state::{ChainCounters, DumpStateMachine};

/// Target string of the chain boundary sentinel.
pub const BOUNDARY_TARGET: &str = "ERROR";

/// Match name of the comment match carrying the rule identifier.
pub const COMMENT_MATCH: &str = "comment";

/// One match of a dumped rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpMatch {
    pub name: String,
    /// Match payload; for comment matches this is the comment text.
    pub data: String,
}

impl DumpMatch {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self::new(COMMENT_MATCH, text)
    }
}

/// One rule entry of a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpEntry {
    pub chain_name: String,
    pub target: String,
    pub matches: Vec<DumpMatch>,
    pub bytes: u64,
    pub packets: u64,
}

impl DumpEntry {
    /// The sentinel starting chain `chain_name`.
    pub fn boundary(chain_name: impl Into<String>) -> Self {
        Self {
            chain_name: chain_name.into(),
            target: BOUNDARY_TARGET.to_owned(),
            matches: Vec::new(),
            bytes: 0,
            packets: 0,
        }
    }

    pub fn is_boundary(&self) -> bool {
        self.target == BOUNDARY_TARGET
    }
}
