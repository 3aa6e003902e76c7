//! The polling loop.
//!
//! A single task multiplexes three event sources: the poll interval, output
//! of the rrdtool session and the shutdown signal. Every tick dumps each
//! monitored table, turns the dump into per-chain counters and buffers them;
//! every `commit_interval` ticks the buffers are written through the rrdtool
//! session. On shutdown everything still buffered is written before the
//! session is closed.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::MissedTickBehavior;

use crate::dump::{self, DumpSource, DumpStateMachine};
use crate::error::ResultOkLogExt;
use crate::rrd::RrdCommandChannel;
use crate::rules::RuleSet;
use crate::series::{SampleSink, TimeSeriesBatcher};

/// Dump source, rule set and sample buffers of one monitored table.
#[derive(Debug)]
pub struct Pipeline<S> {
    name: String,
    source: S,
    rule_set: RuleSet,
    machine: DumpStateMachine,
    batcher: TimeSeriesBatcher,
}

impl<S: DumpSource> Pipeline<S> {
    pub fn new(
        name: impl Into<String>,
        source: S,
        rule_set: RuleSet,
        batcher: TimeSeriesBatcher,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            rule_set,
            machine: DumpStateMachine::new(),
            batcher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn check_access(&mut self) -> dump::Result<()> {
        self.source.check_access().await
    }

    /// Takes one dump and buffers its counters under `timestamp`.
    ///
    /// Returns the number of monitored chains found in the dump.
    pub async fn poll_once(&mut self, timestamp: u64) -> dump::Result<usize> {
        let entries = self.source.poll().await?;
        let chains = self.machine.process(&entries, self.rule_set.lookup());
        for counters in &chains {
            self.batcher.ingest(counters, timestamp);
        }
        log::debug!(
            "{}: {} dump entries, {} monitored chains",
            self.name,
            entries.len(),
            chains.len()
        );
        Ok(chains.len())
    }

    pub async fn tick<K: SampleSink>(&mut self, sink: &mut K) -> bool {
        self.batcher.tick(sink).await
    }

    pub async fn commit_all<K: SampleSink>(&mut self, sink: &mut K) -> usize {
        self.batcher.commit_all(sink).await
    }
}

pub struct Daemon<S> {
    pipelines: Vec<Pipeline<S>>,
    channel: RrdCommandChannel,
    poll_interval: Duration,
}

impl<S: DumpSource> Daemon<S> {
    /// Verifies that every table can be dumped.
    ///
    /// # Errors
    ///
    /// Returns the first access failure; no daemon is created in that case.
    pub async fn start(
        mut pipelines: Vec<Pipeline<S>>,
        channel: RrdCommandChannel,
        poll_interval: Duration,
    ) -> dump::Result<Self> {
        for pipeline in &mut pipelines {
            pipeline.check_access().await?;
            log::debug!("{}: table is accessible", pipeline.name());
        }
        Ok(Self::new(pipelines, channel, poll_interval))
    }

    fn new(
        pipelines: Vec<Pipeline<S>>,
        channel: RrdCommandChannel,
        poll_interval: Duration,
    ) -> Self {
        Self {
            pipelines,
            channel,
            poll_interval,
        }
    }

    /// Runs until `shutdown` completes, then flushes and closes the session.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!(
            "polling {} tables every {:?}",
            self.pipelines.len(),
            self.poll_interval
        );

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    log::info!("shutdown requested");
                    break;
                }
                Some(event) = self.channel.next_event() => {
                    self.channel.handle_event(event);
                }
                _ = interval.tick() => {
                    self.poll_all().await;
                }
            }
        }

        self.drain().await;
    }

    async fn poll_all(&mut self) {
        let Some(timestamp) = unix_timestamp() else {
            return;
        };
        log::trace!("polling @{timestamp}");
        for pipeline in &mut self.pipelines {
            // a failed dump only loses this tick's samples
            pipeline
                .poll_once(timestamp)
                .await
                .ok_log_with(log::Level::Error, pipeline.name());
            pipeline.tick(&mut self.channel).await;
        }
    }

    async fn drain(&mut self) {
        for pipeline in &mut self.pipelines {
            let flushed = pipeline.commit_all(&mut self.channel).await;
            log::info!("{}: flushed {flushed} series on shutdown", pipeline.name());
        }
        self.channel.close().await;
    }
}

fn unix_timestamp() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .ok_log()
}

/// Completes on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                log::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                log::error!("failed to listen for SIGINT: {err}");
                std::future::pending::<()>().await;
            }
        }
        () = terminate => {}
    }
}
