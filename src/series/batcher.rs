use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;

use super::{CounterKind, Sample, SeriesKey};
use crate::dump::ChainCounters;
use crate::rrd::{RRD_DS_RAW, RrdFileNamer};

/// Receives committed series.
pub trait SampleSink {
    /// Delivers all buffered samples of one series, oldest first.
    ///
    /// Delivery failures are handled by the sink; the batcher never retries.
    fn flush(
        &mut self,
        target: &Path,
        datasource_field: &str,
        samples: &[Sample],
    ) -> impl Future<Output = ()>;
}

/// Aggregates per-chain counters into per-series buffers.
#[derive(Debug)]
pub struct TimeSeriesBatcher {
    namer: RrdFileNamer,
    commit_interval: NonZeroU32,
    cycle: u32,
    buffers: HashMap<SeriesKey, Vec<Sample>>,
}

impl TimeSeriesBatcher {
    pub fn new(namer: RrdFileNamer, commit_interval: NonZeroU32) -> Self {
        Self {
            namer,
            commit_interval,
            cycle: 0,
            buffers: HashMap::new(),
        }
    }

    /// Buffers the bytes and packets samples of every rule in `counters`.
    pub fn ingest(&mut self, counters: &ChainCounters, timestamp: u64) {
        for (datasource, bytes, packets) in counters.iter() {
            for (kind, value) in [(CounterKind::Bytes, bytes), (CounterKind::Packets, packets)] {
                let key = SeriesKey {
                    interface: Arc::clone(counters.interface()),
                    direction: counters.direction(),
                    datasource: Arc::clone(datasource),
                    kind,
                };
                self.buffers
                    .entry(key)
                    .or_default()
                    .push(Sample::new(timestamp, value));
            }
        }
    }

    /// Advances the cycle counter and commits when it wraps to zero.
    ///
    /// Returns whether a commit happened.
    pub async fn tick<S: SampleSink>(&mut self, sink: &mut S) -> bool {
        self.cycle = (self.cycle + 1) % self.commit_interval.get();
        if self.cycle != 0 {
            return false;
        }
        self.commit_all(sink).await;
        true
    }

    /// Hands every non-empty buffer to `sink` and empties the buffers.
    ///
    /// Returns the number of series flushed.
    pub async fn commit_all<S: SampleSink>(&mut self, sink: &mut S) -> usize {
        let buffers = std::mem::take(&mut self.buffers);
        let mut flushed = 0;
        for (key, samples) in buffers {
            if samples.is_empty() {
                continue;
            }
            let target = self
                .namer
                .path(&key.interface, key.direction, key.kind, &key.datasource);
            sink.flush(&target, RRD_DS_RAW, &samples).await;
            flushed += 1;
        }
        log::debug!("committed {flushed} series");
        flushed
    }

    pub fn samples(&self, key: &SeriesKey) -> Option<&[Sample]> {
        self.buffers.get(key).map(Vec::as_slice)
    }

    /// Number of series currently buffered.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
