//! Logical monitoring rules and the identifiers that tie them to counters.
//!
//! Rules are collected in a [`RuleRegistry`], which validates them and assigns
//! stable identifiers. Once every rule is added the registry is frozen into a
//! [`RuleSet`], whose [`RuleLookup`] maps the identifiers found in a dump back
//! to datasources and chain names back to interface/direction pairs.
mod error;
mod matches;
mod registry;

pub use error::{Error, Result};
pub use matches::{MatchSpec, PortMatch, PortPosition, Ports, RenderMatch};
pub use registry::{MonitoringRule, Predicates, RuleLookup, RuleRegistry, RuleSet, RuleSpec};
