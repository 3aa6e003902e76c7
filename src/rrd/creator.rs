use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::{Error, RRD_DS_RAW, Result};
use crate::fsutil;

/// One round-robin archive of a database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RraSpec {
    /// Consolidation function, e.g. `AVERAGE` or `MAX`.
    pub cf: String,
    pub xff: f64,
    pub steps: u32,
    pub rows: u32,
}

impl RraSpec {
    pub fn new(cf: impl Into<String>, xff: f64, steps: u32, rows: u32) -> Self {
        Self {
            cf: cf.into(),
            xff,
            steps,
            rows,
        }
    }

    pub fn to_arg(&self) -> String {
        format!("RRA:{}:{}:{}:{}", self.cf, self.xff, self.steps, self.rows)
    }
}

/// Layout of the databases created for a rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RrdCreateParams {
    /// Base interval in seconds.
    pub step: u32,
    pub heartbeat: u32,
    /// Upper bound of the rate, `U` for unbounded.
    pub max: String,
    pub rras: Vec<RraSpec>,
}

impl Default for RrdCreateParams {
    fn default() -> Self {
        // 2 days of 5 minute averages, 2 weeks of 30 minute averages,
        // 2 months of 2 hour averages, 2 years of daily averages
        Self {
            step: 300,
            heartbeat: 600,
            max: "U".to_owned(),
            rras: vec![
                RraSpec::new("AVERAGE", 0.5, 1, 600),
                RraSpec::new("AVERAGE", 0.5, 6, 700),
                RraSpec::new("AVERAGE", 0.5, 24, 775),
                RraSpec::new("AVERAGE", 0.5, 288, 797),
            ],
        }
    }
}

/// Creates empty databases with `rrdtool create`.
#[derive(Debug, Clone)]
pub struct RrdCreator {
    binary: String,
    params: RrdCreateParams,
}

impl RrdCreator {
    pub fn new(binary: impl Into<String>, params: RrdCreateParams) -> Self {
        Self {
            binary: binary.into(),
            params,
        }
    }

    pub fn create_args(&self, path: &Path) -> Vec<String> {
        let mut args = vec![
            "create".to_owned(),
            path.to_string_lossy().into_owned(),
            "-s".to_owned(),
            self.params.step.to_string(),
            format!(
                "DS:{RRD_DS_RAW}:DERIVE:{}:0:{}",
                self.params.heartbeat, self.params.max
            ),
        ];
        args.extend(self.params.rras.iter().map(RraSpec::to_arg));
        args
    }

    /// Creates every database in `paths` that does not exist yet.
    ///
    /// Returns the number of databases created. Stops at the first failure.
    pub async fn create_all(&self, paths: &[PathBuf]) -> Result<usize> {
        let mut created = 0;
        for path in paths {
            if path.exists() {
                log::info!("`{}` already exists, skipping", path.display());
                continue;
            }
            fsutil::ensure_parent_dir(path)?;

            let args = self.create_args(path);
            log::info!("running `{} {}`", self.binary, args.join(" "));
            let status = Command::new(&self.binary)
                .args(&args)
                .status()
                .await
                .map_err(|source| Error::Spawn {
                    binary: self.binary.clone(),
                    source,
                })?;
            if !status.success() {
                return Err(Error::CreateFailed {
                    binary: self.binary.clone(),
                    path: path.clone(),
                    status,
                });
            }
            created += 1;
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_args() {
        let creator = RrdCreator::new(
            "rrdtool",
            RrdCreateParams {
                step: 60,
                heartbeat: 120,
                max: "125000000".to_owned(),
                rras: vec![RraSpec::new("AVERAGE", 0.5, 1, 1440), RraSpec::new("MAX", 0.5, 60, 24)],
            },
        );
        assert_eq!(
            creator.create_args(Path::new("rrd/eth0_in_bytes/httpd.rrd")),
            [
                "create",
                "rrd/eth0_in_bytes/httpd.rrd",
                "-s",
                "60",
                "DS:data:DERIVE:120:0:125000000",
                "RRA:AVERAGE:0.5:1:1440",
                "RRA:MAX:0.5:60:24",
            ]
        );
    }

    #[test]
    fn test_default_params() {
        let params = RrdCreateParams::default();
        assert_eq!(params.step, 300);
        assert_eq!(params.heartbeat, 600);
        assert_eq!(params.max, "U");
        assert_eq!(params.rras.len(), 4);
        assert_eq!(params.rras[0].to_arg(), "RRA:AVERAGE:0.5:1:600");
    }

    #[test]
    fn test_params_deserialize_with_defaults() {
        let params: RrdCreateParams = serde_json::from_str(r#"{"step": 60}"#).unwrap();
        assert_eq!(params.step, 60);
        assert_eq!(params.heartbeat, 600);
        assert_eq!(params.rras, RrdCreateParams::default().rras);
    }

    #[tokio::test]
    async fn test_create_all_makes_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            dir.path().join("eth0_in_bytes/httpd.rrd"),
            dir.path().join("eth0_out_packets/httpd.rrd"),
        ];
        let creator = RrdCreator::new("true", RrdCreateParams::default());
        assert_eq!(creator.create_all(&paths).await.unwrap(), 2);
        assert!(dir.path().join("eth0_in_bytes").is_dir());
        assert!(dir.path().join("eth0_out_packets").is_dir());
    }

    #[tokio::test]
    async fn test_create_all_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("existing.rrd");
        std::fs::write(&existing, b"").unwrap();
        let creator = RrdCreator::new("false", RrdCreateParams::default());
        assert_eq!(creator.create_all(&[existing]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_all_fails_on_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let creator = RrdCreator::new("false", RrdCreateParams::default());
        let err = creator
            .create_all(&[dir.path().join("a/b.rrd")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CreateFailed { .. }));
    }

    #[tokio::test]
    async fn test_create_all_reports_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let creator = RrdCreator::new("/definitely/not/rrdtool", RrdCreateParams::default());
        let err = creator
            .create_all(&[dir.path().join("a.rrd")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }
}
