//! Match specifications for counting rules.
//!
//! A match either renders the same way for both directions (a literal
//! xtables fragment such as `-p tcp`) or depends on the direction, as port
//! matches do: a port on this host is the destination port for incoming
//! traffic and the source port for outgoing traffic.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::Error;
use crate::netfilter::Direction;

/// Renders a match into the xtables fragment for one direction.
pub trait RenderMatch {
    fn render_for_direction(&self, direction: Direction) -> Cow<'_, str>;
}

/// Which end of the connection a port belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPosition {
    Local,
    Remote,
}

const SOURCE_PORT: &str = "--sport";
const DESTINATION_PORT: &str = "--dport";

/// Indexed by `[position][direction]`.
const PORT_FLAGS: [[&str; 2]; 2] = [
    [DESTINATION_PORT, SOURCE_PORT],
    [SOURCE_PORT, DESTINATION_PORT],
];

impl PortPosition {
    pub fn flag(self, direction: Direction) -> &'static str {
        PORT_FLAGS[self as usize][direction as usize]
    }
}

/// A single port or an inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPorts")]
pub enum Ports {
    Single(u16),
    Range(u16, u16),
}

impl fmt::Display for Ports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ports::Single(port) => write!(f, "{port}"),
            Ports::Range(low, high) => write!(f, "{low}:{high}"),
        }
    }
}

impl FromStr for Ports {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || Error::InvalidPorts(s.to_owned());
        match s.split_once(':') {
            Some((low, high)) => {
                let low: u16 = low.trim().parse().map_err(|_| invalid())?;
                let high: u16 = high.trim().parse().map_err(|_| invalid())?;
                if low > high {
                    return Err(invalid());
                }
                Ok(Ports::Range(low, high))
            }
            None => s.trim().parse().map(Ports::Single).map_err(|_| invalid()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPorts {
    Number(u16),
    Text(String),
}

impl TryFrom<RawPorts> for Ports {
    type Error = Error;

    fn try_from(raw: RawPorts) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawPorts::Number(port) => Ok(Ports::Single(port)),
            RawPorts::Text(text) => text.parse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMatch {
    pub position: PortPosition,
    pub ports: Ports,
}

impl RenderMatch for PortMatch {
    fn render_for_direction(&self, direction: Direction) -> Cow<'_, str> {
        Cow::Owned(format!("{} {}", self.position.flag(direction), self.ports))
    }
}

/// One element of a rule's ordered match list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawMatchSpec")]
pub enum MatchSpec {
    /// Rendered verbatim for both directions.
    Literal(String),
    Port(PortMatch),
}

impl MatchSpec {
    pub fn literal(spec: impl Into<String>) -> Self {
        MatchSpec::Literal(spec.into())
    }

    pub fn local_port(ports: Ports) -> Self {
        MatchSpec::Port(PortMatch {
            position: PortPosition::Local,
            ports,
        })
    }

    pub fn remote_port(ports: Ports) -> Self {
        MatchSpec::Port(PortMatch {
            position: PortPosition::Remote,
            ports,
        })
    }
}

impl RenderMatch for MatchSpec {
    fn render_for_direction(&self, direction: Direction) -> Cow<'_, str> {
        match self {
            MatchSpec::Literal(spec) => Cow::Borrowed(spec),
            MatchSpec::Port(port) => port.render_for_direction(direction),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMatchSpec {
    Literal(String),
    Local { local_port: Ports },
    Remote { remote_port: Ports },
}

impl From<RawMatchSpec> for MatchSpec {
    fn from(raw: RawMatchSpec) -> Self {
        match raw {
            RawMatchSpec::Literal(spec) => MatchSpec::Literal(spec),
            RawMatchSpec::Local { local_port } => MatchSpec::local_port(local_port),
            RawMatchSpec::Remote { remote_port } => MatchSpec::remote_port(remote_port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_flag_table() {
        assert_eq!(PortPosition::Local.flag(Direction::In), "--dport");
        assert_eq!(PortPosition::Local.flag(Direction::Out), "--sport");
        assert_eq!(PortPosition::Remote.flag(Direction::In), "--sport");
        assert_eq!(PortPosition::Remote.flag(Direction::Out), "--dport");
    }

    #[test]
    fn test_render_local_and_remote_ports() {
        let httpd = MatchSpec::local_port(Ports::Single(80));
        assert_eq!(httpd.render_for_direction(Direction::In), "--dport 80");
        assert_eq!(httpd.render_for_direction(Direction::Out), "--sport 80");

        let client = MatchSpec::remote_port(Ports::Range(1024, 65535));
        assert_eq!(
            client.render_for_direction(Direction::In),
            "--sport 1024:65535"
        );
        assert_eq!(
            client.render_for_direction(Direction::Out),
            "--dport 1024:65535"
        );
    }

    #[test]
    fn test_literal_renders_verbatim() {
        let spec = MatchSpec::literal("-p tcp");
        assert_eq!(spec.render_for_direction(Direction::In), "-p tcp");
        assert_eq!(spec.render_for_direction(Direction::Out), "-p tcp");
    }

    #[test]
    fn test_ports_from_str() {
        assert_eq!("53".parse::<Ports>().unwrap(), Ports::Single(53));
        assert_eq!("6000:6010".parse::<Ports>().unwrap(), Ports::Range(6000, 6010));
        assert!(matches!(
            "10:5".parse::<Ports>(),
            Err(Error::InvalidPorts(_))
        ));
        assert!("http".parse::<Ports>().is_err());
        assert!("70000".parse::<Ports>().is_err());
    }

    #[test]
    fn test_deserialize_match_list() {
        let specs: Vec<MatchSpec> =
            serde_json::from_str(r#"["-p tcp", {"local_port": 80}, {"remote_port": "20:21"}]"#)
                .unwrap();
        assert_eq!(
            specs,
            vec![
                MatchSpec::literal("-p tcp"),
                MatchSpec::local_port(Ports::Single(80)),
                MatchSpec::remote_port(Ports::Range(20, 21)),
            ]
        );
    }
}
