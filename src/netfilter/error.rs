use std::process::ExitStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported table `{0}` (expected one of: filter, mangle, nat)")]
    UnsupportedTable(String),
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` failed: {status}")]
    Failed { command: String, status: ExitStatus },
}

pub type Result<T> = std::result::Result<T, Error>;
