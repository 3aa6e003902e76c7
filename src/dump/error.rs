use std::process::ExitStatus;

/// Failures of the dump collaborator itself.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to execute `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{binary}` failed with {status}: {stderr}")]
    Exit {
        binary: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error(
        "accessing table `{table}` using `{binary}` failed: {source}\ncheck that the table exists and that the process has CAP_NET_ADMIN"
    )]
    Unavailable {
        table: String,
        binary: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single dump entry was not attributed to a datasource.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Anomaly {
    #[error("entry has no matches")]
    NoMatches,
    #[error("first match is `{0}`, not a comment")]
    NotAComment(String),
    #[error("unknown rule id `{0}`")]
    UnknownRuleId(String),
}
