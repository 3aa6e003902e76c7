use std::path::PathBuf;

use crate::fsutil::FileOpenError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Open(#[from] FileOpenError),
    #[error("failed to parse configuration `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("`poll_interval_secs` must be at least 1")]
    ZeroPollInterval,
    #[error("`commit_interval` must be at least 1")]
    ZeroCommitInterval,
    #[error("no rule sets configured")]
    NoRuleSets,
    #[error("rule set {index}: {source}")]
    Rules {
        index: usize,
        #[source]
        source: crate::rules::Error,
    },
    #[error("rule set {index}: {source}")]
    Netfilter {
        index: usize,
        #[source]
        source: crate::netfilter::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
