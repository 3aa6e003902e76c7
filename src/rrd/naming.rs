use std::path::PathBuf;

use crate::netfilter::Direction;
use crate::series::CounterKind;

/// Name of the single data source inside every database file.
pub const RRD_DS_RAW: &str = "data";

/// Maps series to database files: `<base><iface>_<dir>_<kind>/<datasource>.rrd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrdFileNamer {
    base: String,
}

impl RrdFileNamer {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn path(
        &self,
        interface: &str,
        direction: Direction,
        kind: CounterKind,
        datasource: &str,
    ) -> PathBuf {
        PathBuf::from(format!(
            "{}{interface}_{direction}_{kind}/{datasource}.rrd",
            self.base
        ))
    }

    /// Every file a rule set writes to, interface-major.
    pub fn all_paths<'a, I, D>(&'a self, interfaces: I, datasources: D) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = &'a str>,
        D: IntoIterator<Item = &'a str> + Clone,
    {
        let mut paths = Vec::new();
        for interface in interfaces {
            for direction in Direction::ALL {
                for kind in CounterKind::ALL {
                    for datasource in datasources.clone() {
                        paths.push(self.path(interface, direction, kind, datasource));
                    }
                }
            }
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_template() {
        let namer = RrdFileNamer::new("/var/lib/teucrium/");
        assert_eq!(
            namer.path("eth+", Direction::Out, CounterKind::Packets, "dns_client"),
            PathBuf::from("/var/lib/teucrium/eth+_out_packets/dns_client.rrd")
        );
    }

    #[test]
    fn test_base_is_a_plain_prefix() {
        let namer = RrdFileNamer::new("rrd/host1_");
        assert_eq!(
            namer.path("eth0", Direction::In, CounterKind::Bytes, "httpd"),
            PathBuf::from("rrd/host1_eth0_in_bytes/httpd.rrd")
        );
    }

    #[test]
    fn test_all_paths() {
        let namer = RrdFileNamer::new("");
        let paths = namer.all_paths(["eth0"], ["a", "b"]);
        assert_eq!(paths.len(), 8);
        assert_eq!(paths[0], PathBuf::from("eth0_in_bytes/a.rrd"));
        assert_eq!(paths[1], PathBuf::from("eth0_in_bytes/b.rrd"));
        assert_eq!(paths[7], PathBuf::from("eth0_out_packets/b.rrd"));
    }
}
