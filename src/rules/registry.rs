use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;

use super::{Error, MatchSpec, Result};
use crate::netfilter::{self, ChainKey, Direction, MAX_CHAIN_NAME_LEN};
use crate::rrd;

/// The match list of a rule as it was supplied by the caller.
///
/// A bare string is accepted here so that it can be rejected with a useful
/// message instead of a generic type error.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Predicates {
    Sequence(Vec<MatchSpec>),
    Scalar(String),
}

impl From<Vec<MatchSpec>> for Predicates {
    fn from(matches: Vec<MatchSpec>) -> Self {
        Predicates::Sequence(matches)
    }
}

/// Description of a rule before it is registered.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub datasource: String,
    pub matches: Predicates,
    #[serde(default)]
    pub id: Option<String>,
    /// Graphing metadata. Only validated; nothing here renders graphs.
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub legend: Option<String>,
}

impl RuleSpec {
    pub fn new(datasource: impl Into<String>, matches: impl Into<Predicates>) -> Self {
        Self {
            datasource: datasource.into(),
            matches: matches.into(),
            id: None,
            color: None,
            target: None,
            legend: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// A registered, immutable monitoring rule.
#[derive(Debug, Clone)]
pub struct MonitoringRule {
    datasource: Arc<str>,
    id: String,
    matches: Vec<MatchSpec>,
    target: Option<String>,
}

impl MonitoringRule {
    pub fn datasource(&self) -> &Arc<str> {
        &self.datasource
    }

    /// Identifier stored in the rule's comment match.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn matches(&self) -> &[MatchSpec] {
        &self.matches
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

/// Collects rules for one set of interfaces and assigns their identifiers.
#[derive(Debug)]
pub struct RuleRegistry {
    interfaces: Vec<Arc<str>>,
    rules: Vec<MonitoringRule>,
    rule_ids: HashSet<String>,
    datasources: HashSet<Arc<str>>,
    next_id: u64,
}

impl RuleRegistry {
    /// Creates an empty registry for the given interface specifications.
    ///
    /// # Errors
    ///
    /// Fails if the list is empty, contains duplicates or blank entries, or if
    /// a derived chain name would exceed [`MAX_CHAIN_NAME_LEN`].
    pub fn new<I, S>(interfaces: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut validated = Vec::new();
        for interface in interfaces {
            let interface = interface.as_ref();
            if interface.is_empty() || interface.chars().any(char::is_whitespace) {
                return Err(Error::InvalidInterface(interface.to_owned()));
            }
            if !seen.insert(interface.to_owned()) {
                return Err(Error::DuplicateInterface(interface.to_owned()));
            }
            for direction in Direction::ALL {
                let chain = netfilter::interface_chain_name(interface, direction);
                if chain.len() > MAX_CHAIN_NAME_LEN {
                    return Err(Error::ChainNameTooLong {
                        chain,
                        max: MAX_CHAIN_NAME_LEN,
                    });
                }
            }
            validated.push(Arc::from(interface));
        }
        if validated.is_empty() {
            return Err(Error::NoInterfaces);
        }

        Ok(Self {
            interfaces: validated,
            rules: Vec::new(),
            rule_ids: HashSet::new(),
            datasources: HashSet::new(),
            next_id: 0,
        })
    }

    /// Registers a rule and returns the identifier it was assigned.
    ///
    /// # Errors
    ///
    /// - [`Error::ScalarMatches`] if the matches are a single string.
    /// - [`Error::InvalidColor`] if a non-empty color is not `#RRGGBB`.
    /// - [`Error::UnquotableDatasource`] if the name cannot be sent to rrdtool.
    /// - [`Error::InvalidLiteral`] if a literal match has unbalanced quoting.
    /// - [`Error::DuplicateDatasource`] / [`Error::DuplicateRuleId`] on collisions.
    pub fn add_rule(&mut self, spec: RuleSpec) -> Result<&str> {
        let RuleSpec {
            datasource,
            matches,
            id,
            color,
            target,
            legend: _,
        } = spec;

        let matches = match matches {
            Predicates::Sequence(matches) => matches,
            Predicates::Scalar(value) => {
                return Err(Error::ScalarMatches { datasource, value });
            }
        };
        let color = color.filter(|c| !c.is_empty());
        if let Some(color) = &color {
            if !is_valid_color(color) {
                return Err(Error::InvalidColor {
                    datasource,
                    color: color.clone(),
                });
            }
        }
        if datasource.is_empty() {
            return Err(Error::EmptyDatasource);
        }
        if rrd::quote_argument(&datasource).is_err() {
            return Err(Error::UnquotableDatasource(datasource));
        }
        if let Some(literal) = matches.iter().find_map(|spec| match spec {
            MatchSpec::Literal(literal) if netfilter::split_words(literal).is_none() => {
                Some(literal.clone())
            }
            _ => None,
        }) {
            return Err(Error::InvalidLiteral {
                datasource,
                literal,
            });
        }
        if self.datasources.contains(datasource.as_str()) {
            return Err(Error::DuplicateDatasource(datasource));
        }

        let id = match id {
            Some(id) if id.is_empty() || id.chars().any(char::is_whitespace) => {
                return Err(Error::InvalidRuleId(id));
            }
            Some(id) if self.rule_ids.contains(&id) => return Err(Error::DuplicateRuleId(id)),
            Some(id) => id,
            None => self.next_rule_id(),
        };

        let datasource: Arc<str> = Arc::from(datasource);
        self.datasources.insert(Arc::clone(&datasource));
        self.rule_ids.insert(id.clone());
        log::debug!("registered rule `{id}` for datasource `{datasource}`");
        self.rules.push(MonitoringRule {
            datasource,
            id,
            matches,
            target: target.filter(|t| !t.is_empty()),
        });

        Ok(self.rules[self.rules.len() - 1].id())
    }

    /// Returns the next free identifier, skipping any already in use.
    fn next_rule_id(&mut self) -> String {
        let mut id = netfilter::rule_id(self.next_id);
        while self.rule_ids.contains(&id) {
            self.next_id += 1;
            id = netfilter::rule_id(self.next_id);
        }
        self.next_id += 1;
        id
    }

    /// Freezes the registry and builds the lookup tables used while polling.
    pub fn freeze(self) -> RuleSet {
        let rule_datasources = self
            .rules
            .iter()
            .map(|rule| (rule.id.clone(), Arc::clone(&rule.datasource)))
            .collect();
        let chains = self
            .interfaces
            .iter()
            .flat_map(|interface| {
                Direction::ALL.into_iter().map(move |direction| {
                    let key = ChainKey::new(Arc::clone(interface), direction);
                    (key.chain_name(), key)
                })
            })
            .collect();

        RuleSet {
            interfaces: self.interfaces,
            rules: self.rules,
            lookup: RuleLookup {
                rule_datasources,
                chains,
            },
        }
    }
}

fn is_valid_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// An immutable rule set together with its lookup tables.
#[derive(Debug)]
pub struct RuleSet {
    interfaces: Vec<Arc<str>>,
    rules: Vec<MonitoringRule>,
    lookup: RuleLookup,
}

impl RuleSet {
    pub fn interfaces(&self) -> &[Arc<str>] {
        &self.interfaces
    }

    /// Rules in the order they were added.
    pub fn rules(&self) -> &[MonitoringRule] {
        &self.rules
    }

    pub fn datasources(&self) -> impl Iterator<Item = &Arc<str>> {
        self.rules.iter().map(MonitoringRule::datasource)
    }

    pub fn lookup(&self) -> &RuleLookup {
        &self.lookup
    }
}

/// Maps dump identifiers back to logical datasources.
#[derive(Debug, Default)]
pub struct RuleLookup {
    rule_datasources: HashMap<String, Arc<str>>,
    chains: HashMap<String, ChainKey>,
}

impl RuleLookup {
    /// Resolves a rule identifier (comment payload) to its datasource.
    pub fn datasource(&self, rule_id: &str) -> Option<&Arc<str>> {
        self.rule_datasources.get(rule_id)
    }

    /// Resolves a chain name to the interface and direction it counts.
    pub fn chain(&self, chain_name: &str) -> Option<&ChainKey> {
        self.chains.get(chain_name)
    }
}
