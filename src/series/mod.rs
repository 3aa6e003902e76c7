//! Buffering of counter samples between database commits.
//!
//! Every poll adds one sample per counting rule and counter kind. Samples are
//! kept per [`SeriesKey`] and handed to a [`SampleSink`] every
//! `commit_interval` polls, and once more on shutdown.
mod batcher;

use std::fmt;
use std::sync::Arc;

pub use batcher::{SampleSink, TimeSeriesBatcher};

use crate::netfilter::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    Bytes,
    Packets,
}

impl CounterKind {
    pub const ALL: [CounterKind; 2] = [CounterKind::Bytes, CounterKind::Packets];

    pub fn as_str(self) -> &'static str {
        match self {
            CounterKind::Bytes => "bytes",
            CounterKind::Packets => "packets",
        }
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one buffered series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub interface: Arc<str>,
    pub direction: Direction,
    pub datasource: Arc<str>,
    pub kind: CounterKind,
}

/// A counter value observed at `timestamp` (UNIX epoch seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub timestamp: u64,
    pub value: u64,
}

impl Sample {
    pub fn new(timestamp: u64, value: u64) -> Self {
        Self { timestamp, value }
    }
}

#[cfg(test)]
pub(crate) use batcher::tests::RecordingSink;
