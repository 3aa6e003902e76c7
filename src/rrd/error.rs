use std::path::PathBuf;
use std::process::ExitStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to spawn `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{0}` was spawned without piped stdin/stdout")]
    MissingPipe(String),
    #[error("cannot quote argument `{0}` for the rrdtool pipe protocol")]
    Unquotable(String),
    #[error("no samples to write to `{0}`")]
    NoSamples(PathBuf),
    #[error("failed to write to rrdtool: {0}")]
    Write(#[source] std::io::Error),
    #[error(transparent)]
    CreateDir(#[from] crate::fsutil::CreateDirError),
    #[error("`{binary} create {path}` failed: {status}")]
    CreateFailed {
        binary: String,
        path: PathBuf,
        status: ExitStatus,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
