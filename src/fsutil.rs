use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// A file could not be opened for reading.
#[derive(Debug, thiserror::Error)]
#[error("cannot open `{path}`: {source}")]
pub struct FileOpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Error that occurs when creating a directory fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to create directory `{path}`: {source}")]
pub struct CreateDirError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Buffered reader over the file at `path`, used for the configuration file.
pub fn open_file_reader(path: impl AsRef<Path>) -> Result<BufReader<File>, FileOpenError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FileOpenError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Creates the parent directory of `path` and all of its ancestors.
///
/// Does nothing for paths without a parent component.
pub fn ensure_parent_dir(path: impl AsRef<Path>) -> Result<(), CreateDirError> {
    let Some(parent) = path.as_ref().parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|source| CreateDirError {
        path: parent.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    #[test]
    fn test_open_file_reader_reads_contents() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"{\"rule_sets\": []}\n").unwrap();
        let mut contents = String::new();
        open_file_reader(tmp.path())
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "{\"rule_sets\": []}\n");
    }

    #[test]
    fn test_open_file_reader_reports_path() {
        let err = open_file_reader("/etc/teucrium/missing.json").unwrap_err();
        assert_eq!(err.path, PathBuf::from("/etc/teucrium/missing.json"));
        assert_eq!(err.source.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().starts_with("cannot open `/etc/teucrium/missing.json`"));
    }

    #[test]
    fn test_ensure_parent_dir_creates_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a/b/c.rrd");
        ensure_parent_dir(&file).unwrap();
        assert!(dir.path().join("a/b").is_dir());
        // already there
        ensure_parent_dir(&file).unwrap();
    }

    #[test]
    fn test_ensure_parent_dir_without_parent() {
        ensure_parent_dir("c.rrd").unwrap();
    }

    #[test]
    fn test_ensure_parent_dir_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let err = ensure_parent_dir(tmp.path().join("sub/c.rrd")).unwrap_err();
        assert_eq!(err.path, tmp.path().join("sub"));
    }
}
