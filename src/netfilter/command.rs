use std::fmt;
use std::process::Stdio;

use super::{Error, Result, Table, quote_word};

/// One xtables invocation of an install sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XtCommand {
    binary: &'static str,
    table: Table,
    args: Vec<String>,
    errors_ignore: bool,
}

impl XtCommand {
    pub fn new(binary: &'static str, table: Table, args: Vec<String>, errors_ignore: bool) -> Self {
        Self {
            binary,
            table,
            args,
            errors_ignore,
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Whether a non-zero exit status is expected and harmless.
    pub fn errors_ignore(&self) -> bool {
        self.errors_ignore
    }

    /// Runs the command directly (no shell) and waits for it to exit.
    ///
    /// # Errors
    ///
    /// - [`Error::Spawn`] if the binary cannot be started.
    /// - [`Error::Failed`] if it exits unsuccessfully and is not error tolerant.
    pub async fn execute(&self) -> Result<()> {
        let stderr = if self.errors_ignore {
            Stdio::null()
        } else {
            Stdio::inherit()
        };
        let status = tokio::process::Command::new(self.binary)
            .arg("-t")
            .arg(self.table.as_str())
            .args(&self.args)
            .stdin(Stdio::null())
            .stderr(stderr)
            .status()
            .await
            .map_err(|source| Error::Spawn {
                command: self.to_string(),
                source,
            })?;

        if status.success() {
            return Ok(());
        }
        if self.errors_ignore {
            log::debug!("ignoring failure of `{self}`: {status}");
            return Ok(());
        }
        Err(Error::Failed {
            command: self.to_string(),
            status,
        })
    }
}

impl fmt::Display for XtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -t {}", self.binary, self.table)?;
        for arg in &self.args {
            write!(f, " {}", quote_word(arg))?;
        }
        if self.errors_ignore {
            f.write_str(" 2>/dev/null")?;
        }
        Ok(())
    }
}

/// Executes `commands` in order, stopping at the first fatal failure.
pub async fn execute_all(commands: &[XtCommand]) -> Result<()> {
    for command in commands {
        log::info!("Executing `{command}`");
        command.execute().await?;
    }
    Ok(())
}
