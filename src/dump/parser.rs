//! Converter for `iptables-save -c` output.
//!
//! The save format lists the chains of a table (`:NAME POLICY [p:b]`) and then
//! every rule as `[packets:bytes] -A CHAIN <options>`. This module turns that
//! into the dump representation: a boundary sentinel per declared chain, in
//! declaration order, followed by the chain's rules in order.

use std::collections::HashMap;

use super::{COMMENT_MATCH, DumpEntry, DumpMatch};

/// Errors that may occur when parsing a single rule line.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed counters in line: `{0}`")]
    Counters(String),
    #[error("unterminated quote in line: `{0}`")]
    UnterminatedQuote(String),
    #[error("missing `-A <chain>` in line: `{0}`")]
    MissingChain(String),
    #[error("option `{option}` without argument in line: `{line}`")]
    MissingArgument { option: String, line: String },
}

/// Parses a complete save dump for one table.
///
/// Lines that cannot be parsed are logged and skipped.
pub fn parse_save_output(text: &str) -> Vec<DumpEntry> {
    let mut chains: Vec<String> = Vec::new();
    let mut rules: HashMap<String, Vec<DumpEntry>> = HashMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('*') || line == "COMMIT" {
            continue;
        }

        if let Some(declaration) = line.strip_prefix(':') {
            if let Some(chain) = declaration.split_whitespace().next() {
                declare(&mut chains, &mut rules, chain);
            }
            continue;
        }

        match parse_rule_line(line) {
            Ok(entry) => {
                declare(&mut chains, &mut rules, &entry.chain_name);
                if let Some(chain_rules) = rules.get_mut(&entry.chain_name) {
                    chain_rules.push(entry);
                }
            }
            Err(err) => log::debug!("skipping unparsable dump line: {err}"),
        }
    }

    let mut out = Vec::with_capacity(chains.len() + rules.values().map(Vec::len).sum::<usize>());
    for chain in chains {
        let chain_rules = rules.remove(&chain).unwrap_or_default();
        out.push(DumpEntry::boundary(chain));
        out.extend(chain_rules);
    }
    out
}

fn declare(chains: &mut Vec<String>, rules: &mut HashMap<String, Vec<DumpEntry>>, chain: &str) {
    if !rules.contains_key(chain) {
        chains.push(chain.to_owned());
        rules.insert(chain.to_owned(), Vec::new());
    }
}

/// Parses one `[packets:bytes] -A CHAIN ...` line.
///
/// The counter prefix is optional; without it both counters are zero.
pub fn parse_rule_line(line: &str) -> Result<DumpEntry, ParseError> {
    let (packets, bytes, rest) = match line.strip_prefix('[') {
        Some(counted) => {
            let (counters, rest) = counted
                .split_once(']')
                .ok_or_else(|| ParseError::Counters(line.to_owned()))?;
            let (packets, bytes) = counters
                .split_once(':')
                .ok_or_else(|| ParseError::Counters(line.to_owned()))?;
            let packets = packets
                .parse::<u64>()
                .map_err(|_| ParseError::Counters(line.to_owned()))?;
            let bytes = bytes
                .parse::<u64>()
                .map_err(|_| ParseError::Counters(line.to_owned()))?;
            (packets, bytes, rest)
        }
        None => (0, 0, line),
    };

    let tokens = tokenize(rest).ok_or_else(|| ParseError::UnterminatedQuote(line.to_owned()))?;
    let mut tokens = tokens.into_iter();
    let chain_name = match (tokens.next().as_deref(), tokens.next()) {
        (Some("-A"), Some(chain)) => chain,
        _ => return Err(ParseError::MissingChain(line.to_owned())),
    };

    let mut matches = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;
    let mut target = String::new();
    while let Some(token) = tokens.next() {
        match token.as_str() {
            "-m" | "--match" | "-j" | "--jump" | "-g" | "--goto" => {
                let argument = tokens.next().ok_or_else(|| ParseError::MissingArgument {
                    option: token.clone(),
                    line: line.to_owned(),
                })?;
                if let Some((name, args)) = current.take() {
                    matches.push(dump_match(name, args));
                }
                if token == "-m" || token == "--match" {
                    current = Some((argument, Vec::new()));
                } else {
                    // target options follow; they never carry counters or matches
                    target = argument;
                    break;
                }
            }
            _ => {
                if let Some((_, args)) = current.as_mut() {
                    args.push(token);
                }
            }
        }
    }
    if let Some((name, args)) = current.take() {
        matches.push(dump_match(name, args));
    }

    Ok(DumpEntry {
        chain_name,
        target,
        matches,
        bytes,
        packets,
    })
}

fn dump_match(name: String, args: Vec<String>) -> DumpMatch {
    if name == COMMENT_MATCH {
        if let Some(("--comment", text)) = args.split_first().map(|(o, t)| (o.as_str(), t)) {
            return DumpMatch::new(name, text.join(" "));
        }
    }
    DumpMatch::new(name, args.join(" "))
}

/// Splits on whitespace, honouring double quotes and backslash escapes.
///
/// Returns `None` on an unterminated quote.
fn tokenize(input: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            '\\' if quoted => {
                current.push(chars.next()?);
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if quoted {
        return None;
    }
    if in_token {
        tokens.push(current);
    }
    Some(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAVE_OUTPUT: &str = "\
# Generated by iptables-save v1.8.9 on Sat Oct 18 12:00:00 2026
*filter
:INPUT ACCEPT [1000:200000]
:FORWARD ACCEPT [0:0]
:OUTPUT ACCEPT [900:150000]
:teuc_eth0_in - [0:0]
:teuc_in - [0:0]
[1000:200000] -A INPUT -j teuc_in
[2:100] -A teuc_eth0_in -p tcp -m comment --comment \"teuc_0\" -m tcp --dport 80
[1:50] -A teuc_eth0_in -m comment --comment teuc_1
[3:150] -A teuc_in -i eth0 -j teuc_eth0_in
COMMIT
# Completed on Sat Oct 18 12:00:00 2026
";

    #[test]
    fn test_parse_rule_with_comment_first() {
        let entry =
            parse_rule_line("[2:100] -A teuc_eth0_in -p tcp -m comment --comment \"teuc_0\" -m tcp --dport 80")
                .unwrap();
        assert_eq!(entry.chain_name, "teuc_eth0_in");
        assert_eq!(entry.packets, 2);
        assert_eq!(entry.bytes, 100);
        assert_eq!(entry.target, "");
        assert_eq!(
            entry.matches,
            vec![
                DumpMatch::comment("teuc_0"),
                DumpMatch::new("tcp", "--dport 80"),
            ]
        );
    }

    #[test]
    fn test_parse_rule_target_stops_match_parsing() {
        let entry =
            parse_rule_line("[0:0] -A INPUT -m state --state NEW -j REJECT --reject-with icmp-port-unreachable")
                .unwrap();
        assert_eq!(entry.target, "REJECT");
        assert_eq!(entry.matches, vec![DumpMatch::new("state", "--state NEW")]);
    }

    #[test]
    fn test_parse_rule_without_counters() {
        let entry = parse_rule_line("-A teuc_in -o ppp0 -j teuc_ppp0_in").unwrap();
        assert_eq!((entry.packets, entry.bytes), (0, 0));
        assert_eq!(entry.target, "teuc_ppp0_in");
        assert!(entry.matches.is_empty());
    }

    #[test]
    fn test_parse_rule_quoted_comment_with_spaces() {
        let entry = parse_rule_line(r#"[0:0] -A X -m comment --comment "a \"b\" c""#).unwrap();
        assert_eq!(entry.matches, vec![DumpMatch::comment(r#"a "b" c"#)]);
    }

    #[test]
    fn test_parse_rule_errors() {
        assert!(matches!(
            parse_rule_line("[1:x] -A X"),
            Err(ParseError::Counters(_))
        ));
        assert!(matches!(
            parse_rule_line("[1:1 -A X"),
            Err(ParseError::Counters(_))
        ));
        assert!(matches!(
            parse_rule_line("[1:1] -I X"),
            Err(ParseError::MissingChain(_))
        ));
        assert!(matches!(
            parse_rule_line("[1:1] -A X -m comment --comment \"open"),
            Err(ParseError::UnterminatedQuote(_))
        ));
        assert!(matches!(
            parse_rule_line("[1:1] -A X -m"),
            Err(ParseError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_parse_save_output_inserts_boundaries() {
        let entries = parse_save_output(SAVE_OUTPUT);
        let summary: Vec<(&str, &str)> = entries
            .iter()
            .map(|e| (e.chain_name.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("INPUT", "ERROR"),
                ("INPUT", "teuc_in"),
                ("FORWARD", "ERROR"),
                ("OUTPUT", "ERROR"),
                ("teuc_eth0_in", "ERROR"),
                ("teuc_eth0_in", ""),
                ("teuc_eth0_in", ""),
                ("teuc_in", "ERROR"),
                ("teuc_in", "teuc_eth0_in"),
            ]
        );
    }

    #[test]
    fn test_parse_save_output_skips_garbage() {
        let entries = parse_save_output("*filter\n:X - [0:0]\n[garbage\n[1:2] -A X -m comment --comment teuc_0\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].bytes, 2);
    }

    #[test]
    fn test_parse_save_output_undeclared_chain() {
        let entries = parse_save_output("[1:2] -A Y -j ACCEPT\n");
        assert_eq!(entries, vec![
            DumpEntry::boundary("Y"),
            DumpEntry {
                chain_name: "Y".to_owned(),
                target: "ACCEPT".to_owned(),
                matches: Vec::new(),
                bytes: 2,
                packets: 1,
            },
        ]);
    }
}
