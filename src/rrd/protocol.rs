//! The `rrdtool -` pipe protocol.
//!
//! Requests are single lines. Every request is answered by zero or more
//! detail lines followed by a line starting with `OK` or `ERROR`. Output may
//! arrive split at arbitrary byte boundaries, so the parser keeps the
//! incomplete tail of each read until the rest of the line arrives.

use std::path::Path;

use super::{Error, Result};
use crate::series::Sample;

/// Lines rrdtool prints when it could not make sense of a command.
const SYNTAX_HINT_PREFIXES: [&str; 2] = ["RRDtool ", "Usage: rrdtool"];

/// Quotes an argument for rrdtool's pipe-mode argument splitter.
///
/// rrdtool understands single and double quotes but no escapes, so an
/// argument containing both quote characters (or a line break) cannot be sent.
pub fn quote_argument(arg: &str) -> Result<String> {
    if arg.contains(['\n', '\r']) {
        return Err(Error::Unquotable(arg.to_owned()));
    }
    if !arg.contains('\'') {
        Ok(format!("'{arg}'"))
    } else if !arg.contains('"') {
        Ok(format!("\"{arg}\""))
    } else {
        Err(Error::Unquotable(arg.to_owned()))
    }
}

/// Serializes one `update` request, including the trailing newline.
///
/// # Errors
///
/// - [`Error::NoSamples`] if `samples` is empty.
/// - [`Error::Unquotable`] if the target or field cannot be quoted.
pub fn update_command(target: &Path, datasource_field: &str, samples: &[Sample]) -> Result<String> {
    if samples.is_empty() {
        return Err(Error::NoSamples(target.to_path_buf()));
    }
    let target_str = target
        .to_str()
        .ok_or_else(|| Error::Unquotable(target.to_string_lossy().into_owned()))?;

    let mut line = format!(
        "update {} -t {}",
        quote_argument(target_str)?,
        quote_argument(datasource_field)?
    );
    for sample in samples {
        line.push_str(&format!(" {}:{}", sample.timestamp, sample.value));
    }
    line.push('\n');
    Ok(line)
}

/// A classified response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The oldest outstanding command succeeded.
    Ok(String),
    /// The oldest outstanding command failed. `context` holds the detail lines
    /// received since the previous `OK`/`ERROR`, ending with `line`.
    Error { line: String, context: Vec<String> },
    /// A usage banner; informational only.
    SyntaxHint(String),
}

/// Incremental parser for the rrdtool response stream.
#[derive(Debug, Default)]
pub struct ResponseParser {
    partial_line: Vec<u8>,
    error_cache: Vec<String>,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one chunk of output and returns the responses it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Response> {
        self.partial_line.extend_from_slice(chunk);

        let mut out = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.partial_line[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let line = String::from_utf8_lossy(&self.partial_line[start..end])
                .trim_end_matches('\r')
                .to_owned();
            start = end + 1;
            if let Some(response) = self.classify(line) {
                out.push(response);
            }
        }
        self.partial_line.drain(..start);
        out
    }

    fn classify(&mut self, line: String) -> Option<Response> {
        if line.starts_with("OK") {
            self.error_cache.clear();
            return Some(Response::Ok(line));
        }
        if line.starts_with("ERROR") {
            let mut context = std::mem::take(&mut self.error_cache);
            context.push(line.clone());
            return Some(Response::Error { line, context });
        }
        if SYNTAX_HINT_PREFIXES.iter().any(|p| line.starts_with(p)) {
            return Some(Response::SyntaxHint(line));
        }
        if !line.is_empty() {
            self.error_cache.push(line);
        }
        None
    }

    /// Detail lines not yet attributed to a response.
    pub fn cached_lines(&self) -> &[String] {
        &self.error_cache
    }

    /// Whether an incomplete line is buffered.
    pub fn has_partial_line(&self) -> bool {
        !self.partial_line.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_argument() {
        assert_eq!(quote_argument("rrd/eth0_in_bytes/httpd.rrd").unwrap(), "'rrd/eth0_in_bytes/httpd.rrd'");
        assert_eq!(quote_argument("it's").unwrap(), "\"it's\"");
        assert!(matches!(quote_argument("a'b\"c"), Err(Error::Unquotable(_))));
        assert!(matches!(quote_argument("a\nb"), Err(Error::Unquotable(_))));
    }

    #[test]
    fn test_update_command() {
        let line = update_command(
            Path::new("rrd/eth0 in/httpd.rrd"),
            "data",
            &[Sample::new(1000, 100), Sample::new(1005, 250)],
        )
        .unwrap();
        assert_eq!(line, "update 'rrd/eth0 in/httpd.rrd' -t 'data' 1000:100 1005:250\n");
    }

    #[test]
    fn test_update_command_requires_samples() {
        let err = update_command(Path::new("x.rrd"), "data", &[]).unwrap_err();
        assert!(matches!(err, Error::NoSamples(_)));
    }

    #[test]
    fn test_classification() {
        let mut parser = ResponseParser::new();
        let responses = parser.feed(
            b"OK u:0.01 s:0.00 r:0.01\nillegal attempt to update\nERROR: bad\nRRDtool 1.7.2  Copyright\n",
        );
        assert_eq!(
            responses,
            vec![
                Response::Ok("OK u:0.01 s:0.00 r:0.01".into()),
                Response::Error {
                    line: "ERROR: bad".into(),
                    context: vec!["illegal attempt to update".into(), "ERROR: bad".into()],
                },
                Response::SyntaxHint("RRDtool 1.7.2  Copyright".into()),
            ]
        );
        assert!(parser.cached_lines().is_empty());
    }

    #[test]
    fn test_ok_clears_cached_detail() {
        let mut parser = ResponseParser::new();
        parser.feed(b"some detail\n");
        assert_eq!(parser.cached_lines(), &["some detail".to_owned()]);
        parser.feed(b"OK\n");
        assert!(parser.cached_lines().is_empty());
        let responses = parser.feed(b"ERROR: x\n");
        assert_eq!(
            responses,
            vec![Response::Error {
                line: "ERROR: x".into(),
                context: vec!["ERROR: x".into()],
            }]
        );
    }

    #[test]
    fn test_partial_line_is_carried_over() {
        let mut parser = ResponseParser::new();
        assert!(parser.feed(b"O").is_empty());
        assert!(parser.has_partial_line());
        assert_eq!(parser.feed(b"K\r\nERR"), vec![Response::Ok("OK".into())]);
        assert_eq!(
            parser.feed(b"ORbadcmd\n"),
            vec![Response::Error {
                line: "ERRORbadcmd".into(),
                context: vec!["ERRORbadcmd".into()],
            }]
        );
        assert!(!parser.has_partial_line());
    }

    #[test]
    fn test_split_at_any_two_boundaries_matches_unsplit() {
        let stream: &[u8] =
            b"OK u:0.00\ndetail one\ndetail two\nERROR: illegal update\nUsage: rrdtool [options]\nOK\n";
        let expected = ResponseParser::new().feed(stream);
        assert_eq!(expected.len(), 4);

        for first in 0..=stream.len() {
            for second in first..=stream.len() {
                let mut parser = ResponseParser::new();
                let mut responses = parser.feed(&stream[..first]);
                responses.extend(parser.feed(&stream[first..second]));
                responses.extend(parser.feed(&stream[second..]));
                assert_eq!(responses, expected, "split at {first}/{second}");
            }
        }
    }
}
