//! Teucrium: per-interface traffic accounting with netfilter counters.
//!
//! Logical monitoring rules are installed as counting rules in generated
//! per-interface chains. A daemon periodically dumps the table, maps the
//! counters back to their datasources and writes them to round-robin
//! databases through a long-lived `rrdtool -` process.
//!
//! The binary exposes three commands: [`rrdcreate`] creates the databases,
//! [`xtsetup`] installs the chains and rules and [`run_daemon`] polls.
pub mod config;
pub mod daemon;
pub mod dump;
pub mod error;
pub mod fsutil;
pub mod netfilter;
pub mod rrd;
pub mod rules;
pub mod series;

use config::Config;
use daemon::{Daemon, Pipeline};
use dump::XtablesSaveSource;
use rrd::{RrdCommandChannel, RrdCreator};
use series::TimeSeriesBatcher;

/// Creates every database the configured rule sets write to.
///
/// Existing databases are left alone.
///
/// # Errors
///
/// Fails on the first invalid rule set or the first database that cannot be
/// created.
pub async fn rrdcreate(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    for table in config.build()? {
        let interfaces = table.rule_set.interfaces().iter().map(|s| &**s);
        let datasources: Vec<&str> = table.rule_set.datasources().map(|s| &**s).collect();
        let paths = table
            .namer
            .all_paths(interfaces, datasources.iter().copied());

        let creator = RrdCreator::new(config.rrdtool.binary.clone(), table.rrd.clone());
        let created = creator.create_all(&paths).await?;
        log::info!(
            "{} {}: created {created} of {} databases",
            table.family,
            table.builder.table(),
            paths.len()
        );
    }
    Ok(())
}

/// Installs the chains and counting rules of every rule set.
///
/// With `dry_run` the commands are printed instead of executed.
///
/// # Errors
///
/// Fails on the first invalid rule set or the first command that fails
/// without being marked as error tolerant.
pub async fn xtsetup(config: &Config, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    for table in config.build()? {
        let commands = table.builder.commands(&table.rule_set);
        if dry_run {
            for command in &commands {
                println!("{command}");
            }
        } else {
            netfilter::execute_all(&commands).await?;
            log::info!(
                "{} {}: installed {} rules",
                table.family,
                table.builder.table(),
                table.rule_set.rules().len()
            );
        }
    }
    Ok(())
}

/// Polls the configured tables until SIGINT or SIGTERM.
///
/// # Errors
///
/// Fails if the configuration is invalid or a table cannot be dumped at
/// startup. Errors after startup are logged and never end the loop.
pub async fn run_daemon(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut pipelines = Vec::new();
    for table in config.build()? {
        let name = format!("{} {}", table.family, table.builder.table());
        let source = XtablesSaveSource::new(table.family, table.builder.table());
        let batcher = TimeSeriesBatcher::new(table.namer, config.commit_interval());
        pipelines.push(Pipeline::new(name, source, table.rule_set, batcher));
    }

    let channel = RrdCommandChannel::new(config.rrdtool.clone());
    Daemon::start(pipelines, channel, config.poll_interval())
        .await?
        .run(daemon::shutdown_signal())
        .await;
    log::info!("stopped");
    Ok(())
}
