use std::collections::HashSet;
use std::sync::Arc;

use super::{Anomaly, COMMENT_MATCH, DumpEntry};
use crate::netfilter::{ChainKey, Direction};
use crate::rules::RuleLookup;

/// Counters collected from one chain, index-aligned per accepted rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCounters {
    key: ChainKey,
    datasources: Vec<Arc<str>>,
    bytes: Vec<u64>,
    packets: Vec<u64>,
}

impl ChainCounters {
    pub fn new(key: ChainKey) -> Self {
        Self {
            key,
            datasources: Vec::new(),
            bytes: Vec::new(),
            packets: Vec::new(),
        }
    }

    pub fn push(&mut self, datasource: Arc<str>, bytes: u64, packets: u64) {
        self.datasources.push(datasource);
        self.bytes.push(bytes);
        self.packets.push(packets);
    }

    pub fn key(&self) -> &ChainKey {
        &self.key
    }

    pub fn interface(&self) -> &Arc<str> {
        &self.key.interface
    }

    pub fn direction(&self) -> Direction {
        self.key.direction
    }

    pub fn datasources(&self) -> &[Arc<str>] {
        &self.datasources
    }

    pub fn bytes(&self) -> &[u64] {
        &self.bytes
    }

    pub fn packets(&self) -> &[u64] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.datasources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasources.is_empty()
    }

    /// `(datasource, bytes, packets)` per accepted rule.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, u64, u64)> {
        self.datasources
            .iter()
            .zip(self.bytes.iter().copied())
            .zip(self.packets.iter().copied())
            .map(|((ds, bytes), packets)| (ds, bytes, packets))
    }
}

/// Per-dump parser state. `pending` is `Some` while inside a monitored chain.
#[derive(Debug, Default)]
struct ParserState {
    pending: Option<ChainCounters>,
    seen_chains: HashSet<String>,
}

impl ParserState {
    fn finish_chain(&mut self, out: &mut Vec<ChainCounters>) {
        if let Some(counters) = self.pending.take() {
            if counters.is_empty() {
                log::trace!("chain `{}` had no counting rules", counters.key.chain_name());
            } else {
                out.push(counters);
            }
        }
    }

    fn enter_chain(&mut self, chain_name: &str, lookup: &RuleLookup) {
        if !self.seen_chains.insert(chain_name.to_owned()) {
            log::debug!("chain `{chain_name}` appears twice in one dump; skipping");
            return;
        }
        match lookup.chain(chain_name) {
            Some(key) => self.pending = Some(ChainCounters::new(key.clone())),
            None => log::trace!("skipping foreign chain `{chain_name}`"),
        }
    }
}

/// Turns a dump into per-chain counter batches.
#[derive(Debug, Default)]
pub struct DumpStateMachine {
    state: ParserState,
}

impl DumpStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes one complete dump in a single pass.
    ///
    /// Returns one [`ChainCounters`] per monitored chain that contained at
    /// least one valid counting rule, in dump order. Entries that cannot be
    /// attributed are skipped individually.
    pub fn process<'a, I>(&mut self, entries: I, lookup: &RuleLookup) -> Vec<ChainCounters>
    where
        I: IntoIterator<Item = &'a DumpEntry>,
    {
        self.state = ParserState::default();
        let mut out = Vec::new();

        for entry in entries {
            if entry.is_boundary() {
                self.state.finish_chain(&mut out);
                self.state.enter_chain(&entry.chain_name, lookup);
                continue;
            }

            let Some(pending) = self.state.pending.as_mut() else {
                continue;
            };
            match resolve_datasource(entry, lookup) {
                Ok(datasource) => {
                    pending.push(Arc::clone(datasource), entry.bytes, entry.packets)
                }
                Err(anomaly) => log::debug!(
                    "skipping entry in chain `{}`: {}",
                    entry.chain_name,
                    anomaly
                ),
            }
        }

        // no trailing sentinel after the last chain
        self.state.finish_chain(&mut out);
        out
    }
}

fn resolve_datasource<'l>(
    entry: &DumpEntry,
    lookup: &'l RuleLookup,
) -> Result<&'l Arc<str>, Anomaly> {
    let first = entry.matches.first().ok_or(Anomaly::NoMatches)?;
    if first.name != COMMENT_MATCH {
        return Err(Anomaly::NotAComment(first.name.clone()));
    }
    lookup
        .datasource(&first.data)
        .ok_or_else(|| Anomaly::UnknownRuleId(first.data.clone()))
}
