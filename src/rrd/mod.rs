//! Round-robin database access through a long-lived `rrdtool -` process.
//!
//! # Key Components
//!
//! - [`RrdFileNamer`]: maps a series to its database file.
//! - [`ResponseParser`]: line-buffered classifier for the pipe protocol.
//! - [`RrdCommandChannel`]: owns the subprocess session, writes `update`
//!   commands and attributes responses to them.
//! - [`RrdCreator`]: builds empty databases for a rule set.
mod channel;
mod creator;
mod error;
mod naming;
mod protocol;

pub use channel::{CommandOutcome, RrdCommandChannel, RrdToolConfig, SessionEvent, SessionEventKind};
pub use creator::{RraSpec, RrdCreateParams, RrdCreator};
pub use error::{Error, Result};
pub use naming::{RRD_DS_RAW, RrdFileNamer};
pub use protocol::{Response, ResponseParser, quote_argument, update_command};
