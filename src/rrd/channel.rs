use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Error, Response, ResponseParser, Result, update_command};
use crate::series::{Sample, SampleSink};

const READ_BUFFER_SIZE: usize = 4096;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// How to start the rrdtool pipe process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RrdToolConfig {
    pub binary: String,
    pub args: Vec<String>,
}

impl Default for RrdToolConfig {
    fn default() -> Self {
        Self {
            binary: "rrdtool".to_owned(),
            args: vec!["-".to_owned()],
        }
    }
}

/// Something observed on a session's stdout.
#[derive(Debug)]
pub enum SessionEventKind {
    Output(Vec<u8>),
    ReadFailed(io::Error),
    Exited(io::Result<ExitStatus>),
}

#[derive(Debug)]
pub struct SessionEvent {
    pub session: u64,
    pub kind: SessionEventKind,
}

/// A response together with the database it was attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// `None` for banners and for responses nobody was waiting for.
    pub target: Option<String>,
    pub response: Response,
}

#[derive(Debug)]
struct Session {
    id: u64,
    stdin: Option<ChildStdin>,
    parser: ResponseParser,
    pending: VecDeque<String>,
    reader: JoinHandle<()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        // the reader owns the child, which is killed when the task is dropped
        self.reader.abort();
    }
}

/// Long-lived `rrdtool -` process fed with `update` commands.
///
/// The process is started on the first write and restarted on the first
/// write after it died. Output is read by a background task and delivered
/// through [`next_event`](Self::next_event); the owner passes every event
/// back into [`handle_event`](Self::handle_event), which attributes
/// responses to the oldest unanswered command.
#[derive(Debug)]
pub struct RrdCommandChannel {
    config: RrdToolConfig,
    session: Option<Session>,
    next_session_id: u64,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl RrdCommandChannel {
    pub fn new(config: RrdToolConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            session: None,
            next_session_id: 0,
            events_tx,
            events_rx,
        }
    }

    /// Id of the running session, if any.
    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Number of commands written but not yet answered.
    pub fn pending_commands(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.pending.len())
    }

    /// Waits for the next event of any session.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Processes one event and returns the responses it completed.
    ///
    /// Events of sessions that were already torn down are dropped.
    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<CommandOutcome> {
        let Some(session) = self.session.as_mut().filter(|s| s.id == event.session) else {
            log::trace!("dropping event of stale rrdtool session {}", event.session);
            return Vec::new();
        };

        match event.kind {
            SessionEventKind::Output(bytes) => {
                let mut outcomes = Vec::new();
                for response in session.parser.feed(&bytes) {
                    let target = match response {
                        Response::SyntaxHint(_) => None,
                        _ => session.pending.pop_front(),
                    };
                    log_response(&response, target.as_deref());
                    outcomes.push(CommandOutcome { target, response });
                }
                outcomes
            }
            SessionEventKind::ReadFailed(err) => {
                log::error!("failed to read from rrdtool session {}: {err}", event.session);
                self.teardown();
                Vec::new()
            }
            SessionEventKind::Exited(status) => {
                match status {
                    Ok(status) if status.success() => {
                        log::info!("rrdtool session {} exited", event.session)
                    }
                    Ok(status) => {
                        log::warn!("rrdtool session {} exited with {status}", event.session)
                    }
                    Err(err) => log::error!(
                        "failed to wait for rrdtool session {}: {err}",
                        event.session
                    ),
                }
                self.teardown();
                Vec::new()
            }
        }
    }

    /// Closes stdin and waits for the running session to exit.
    pub async fn close(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        log::info!(
            "closing rrdtool session {} with {} unanswered commands",
            session.id,
            session.pending.len()
        );
        session.stdin = None;

        let drain = async {
            while self.session.is_some() {
                let Some(event) = self.events_rx.recv().await else {
                    break;
                };
                self.handle_event(event);
            }
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, drain).await.is_err() {
            log::warn!("rrdtool did not exit within {CLOSE_TIMEOUT:?}, killing it");
            self.teardown();
        }
    }

    fn teardown(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if !session.pending.is_empty() {
            log::warn!(
                "rrdtool session {} ended with {} unanswered commands",
                session.id,
                session.pending.len()
            );
        }
        let cached = session.parser.cached_lines();
        if !cached.is_empty() || session.parser.has_partial_line() {
            log::debug!(
                "discarding unattributed rrdtool output of session {}: {}",
                session.id,
                cached.join(" | ")
            );
        }
    }

    fn spawn_session(&mut self) -> Result<Session> {
        let binary = &self.config.binary;
        let mut child = Command::new(binary)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                binary: binary.clone(),
                source,
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::MissingPipe(binary.clone()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::MissingPipe(binary.clone()))?;

        let id = self.next_session_id;
        self.next_session_id += 1;
        let reader = tokio::spawn(read_session(id, child, stdout, self.events_tx.clone()));
        log::info!("started rrdtool session {id} (`{binary}`)");

        Ok(Session {
            id,
            stdin: Some(stdin),
            parser: ResponseParser::new(),
            pending: VecDeque::new(),
            reader,
        })
    }

    async fn send(&mut self, target: &Path, line: &str) -> Result<()> {
        let session = match self.session.take() {
            Some(session) => session,
            None => self.spawn_session()?,
        };
        let session = self.session.insert(session);
        let stdin = session
            .stdin
            .as_mut()
            .ok_or_else(|| Error::MissingPipe(self.config.binary.clone()))?;
        stdin.write_all(line.as_bytes()).await.map_err(Error::Write)?;
        stdin.flush().await.map_err(Error::Write)?;
        session.pending.push_back(target.display().to_string());
        log::trace!("rrdtool session {}: {}", session.id, line.trim_end());
        Ok(())
    }
}

impl SampleSink for RrdCommandChannel {
    async fn flush(&mut self, target: &Path, datasource_field: &str, samples: &[Sample]) {
        let line = match update_command(target, datasource_field, samples) {
            Ok(line) => line,
            Err(err) => {
                log::error!("skipping update of `{}`: {err}", target.display());
                return;
            }
        };
        if let Err(err) = self.send(target, &line).await {
            log::error!("{err}");
            self.teardown();
        }
    }
}

fn log_response(response: &Response, target: Option<&str>) {
    let target = target.unwrap_or("<unknown>");
    match response {
        Response::Ok(line) => log::info!("rrdtool: {target}: {line}"),
        Response::Error { context, .. } => {
            log::error!("rrdtool: {target}: {}", context.join(" | "))
        }
        Response::SyntaxHint(line) => log::warn!("rrdtool did not understand a command: {line}"),
    }
}

async fn read_session(
    session: u64,
    mut child: Child,
    mut stdout: ChildStdout,
    tx: mpsc::UnboundedSender<SessionEvent>,
) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let kind = match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => SessionEventKind::Output(buf[..n].to_vec()),
            Err(err) => {
                let _ = tx.send(SessionEvent {
                    session,
                    kind: SessionEventKind::ReadFailed(err),
                });
                let _ = child.start_kill();
                break;
            }
        };
        if tx.send(SessionEvent { session, kind }).is_err() {
            return;
        }
    }
    let status = child.wait().await;
    let _ = tx.send(SessionEvent {
        session,
        kind: SessionEventKind::Exited(status),
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    fn shell(script: &str) -> RrdToolConfig {
        RrdToolConfig {
            binary: "sh".to_owned(),
            args: vec!["-c".to_owned(), script.to_owned()],
        }
    }

    async fn collect(channel: &mut RrdCommandChannel, count: usize) -> Vec<CommandOutcome> {
        let mut outcomes = Vec::new();
        while outcomes.len() < count {
            let event = timeout(Duration::from_secs(5), channel.next_event())
                .await
                .expect("timed out waiting for rrdtool output")
                .expect("event channel closed");
            outcomes.extend(channel.handle_event(event));
        }
        outcomes
    }

    async fn wait_for_exit(channel: &mut RrdCommandChannel) {
        while channel.session_id().is_some() {
            let event = timeout(Duration::from_secs(5), channel.next_event())
                .await
                .expect("timed out waiting for exit")
                .expect("event channel closed");
            channel.handle_event(event);
        }
    }

    #[test]
    fn test_default_config() {
        let config = RrdToolConfig::default();
        assert_eq!(config.binary, "rrdtool");
        assert_eq!(config.args, ["-"]);
    }

    #[tokio::test]
    async fn test_responses_are_attributed_in_order() {
        let mut channel = RrdCommandChannel::new(shell(
            r#"while read -r line; do case "$line" in *bad*) echo "illegal attempt"; echo "ERROR: bad" ;; *) echo OK ;; esac; done"#,
        ));
        assert_eq!(channel.session_id(), None);

        channel
            .flush(Path::new("rrd/good.rrd"), "data", &[Sample::new(1, 2)])
            .await;
        channel
            .flush(Path::new("rrd/bad.rrd"), "data", &[Sample::new(1, 2)])
            .await;
        channel
            .flush(Path::new("rrd/good2.rrd"), "data", &[Sample::new(1, 2)])
            .await;
        assert_eq!(channel.session_id(), Some(0));

        let outcomes = collect(&mut channel, 3).await;
        assert_eq!(outcomes[0].target.as_deref(), Some("rrd/good.rrd"));
        assert_eq!(outcomes[0].response, Response::Ok("OK".into()));
        assert_eq!(outcomes[1].target.as_deref(), Some("rrd/bad.rrd"));
        assert_eq!(
            outcomes[1].response,
            Response::Error {
                line: "ERROR: bad".into(),
                context: vec!["illegal attempt".into(), "ERROR: bad".into()],
            }
        );
        assert_eq!(outcomes[2].target.as_deref(), Some("rrd/good2.rrd"));
        assert_eq!(channel.pending_commands(), 0);

        channel.close().await;
        assert_eq!(channel.session_id(), None);
    }

    #[tokio::test]
    async fn test_session_is_respawned_after_exit() {
        let mut channel = RrdCommandChannel::new(shell("read -r line; echo OK"));

        channel.flush(Path::new("a.rrd"), "data", &[Sample::new(1, 1)]).await;
        assert_eq!(channel.session_id(), Some(0));
        let outcomes = collect(&mut channel, 1).await;
        assert_eq!(outcomes[0].target.as_deref(), Some("a.rrd"));

        wait_for_exit(&mut channel).await;
        assert_eq!(channel.session_id(), None);

        channel.flush(Path::new("b.rrd"), "data", &[Sample::new(2, 2)]).await;
        assert_eq!(channel.session_id(), Some(1));
        let outcomes = collect(&mut channel, 1).await;
        assert_eq!(outcomes[0].target.as_deref(), Some("b.rrd"));
        channel.close().await;
    }

    #[tokio::test]
    async fn test_stale_session_events_are_ignored() {
        let mut channel = RrdCommandChannel::new(shell("while read -r line; do echo OK; done"));
        channel.flush(Path::new("a.rrd"), "data", &[Sample::new(1, 1)]).await;

        let outcomes = channel.handle_event(SessionEvent {
            session: 99,
            kind: SessionEventKind::Output(b"OK\n".to_vec()),
        });
        assert!(outcomes.is_empty());
        assert_eq!(channel.pending_commands(), 1);

        collect(&mut channel, 1).await;
        channel.close().await;
    }

    #[tokio::test]
    async fn test_exit_discards_unattributed_output() {
        let mut channel = RrdCommandChannel::new(shell(r#"read -r line; printf 'detail\nOK'"#));
        channel.flush(Path::new("a.rrd"), "data", &[Sample::new(1, 1)]).await;

        let mut outcomes = Vec::new();
        while channel.session_id().is_some() {
            let event = timeout(Duration::from_secs(5), channel.next_event())
                .await
                .expect("timed out waiting for exit")
                .expect("event channel closed");
            outcomes.extend(channel.handle_event(event));
        }
        // the unterminated `OK` never completes a response
        assert!(outcomes.is_empty());
        assert_eq!(channel.pending_commands(), 0);

        channel.flush(Path::new("b.rrd"), "data", &[Sample::new(2, 2)]).await;
        assert_eq!(channel.session_id(), Some(1));
        channel.close().await;
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_no_session() {
        let mut channel = RrdCommandChannel::new(RrdToolConfig {
            binary: "/definitely/not/rrdtool".to_owned(),
            args: Vec::new(),
        });
        channel.flush(Path::new("a.rrd"), "data", &[Sample::new(1, 1)]).await;
        assert_eq!(channel.session_id(), None);
        assert_eq!(channel.pending_commands(), 0);
    }

    #[tokio::test]
    async fn test_empty_flush_writes_nothing() {
        let mut channel = RrdCommandChannel::new(shell("while read -r line; do echo OK; done"));
        channel.flush(Path::new("a.rrd"), "data", &[]).await;
        assert_eq!(channel.session_id(), None);
    }
}
