use std::future::Future;
use std::process::Stdio;

use super::{DumpEntry, Error, Result, parse_save_output};
use crate::netfilter::{Family, Table};

/// Produces one dump of the monitored table per poll.
pub trait DumpSource {
    /// Verifies the table can be queried at all. Called once before polling starts.
    fn check_access(&mut self) -> impl Future<Output = Result<()>>;

    fn poll(&mut self) -> impl Future<Output = Result<Vec<DumpEntry>>>;
}

/// Dumps a table by running `iptables-save -c` (or `ip6tables-save -c`).
#[derive(Debug, Clone)]
pub struct XtablesSaveSource {
    binary: String,
    table: Table,
}

impl XtablesSaveSource {
    pub fn new(family: Family, table: Table) -> Self {
        Self::with_binary(family.save_binary(), table)
    }

    /// Uses `binary` in place of the family's default save tool.
    pub fn with_binary(binary: impl Into<String>, table: Table) -> Self {
        Self {
            binary: binary.into(),
            table,
        }
    }

    async fn dump_text(&self) -> Result<String> {
        let binary = self.binary.as_str();
        let output = tokio::process::Command::new(binary)
            .args(["-c", "-t", self.table.as_str()])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| Error::Spawn {
                binary: binary.to_owned(),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::Exit {
                binary: binary.to_owned(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl DumpSource for XtablesSaveSource {
    async fn check_access(&mut self) -> Result<()> {
        self.dump_text()
            .await
            .map(|_| ())
            .map_err(|source| Error::Unavailable {
                table: self.table.to_string(),
                binary: self.binary.clone(),
                source: Box::new(source),
            })
    }

    async fn poll(&mut self) -> Result<Vec<DumpEntry>> {
        let text = self.dump_text().await?;
        let entries = parse_save_output(&text);
        log::trace!(
            "{} -t {}: {} dump entries",
            self.binary,
            self.table,
            entries.len()
        );
        Ok(entries)
    }
}
