use super::{
    Direction, Family, Result, Table, XtCommand, aggregation_chain_name, interface_chain_name,
    split_words,
};
use crate::rules::{MonitoringRule, RenderMatch, RuleSet};

/// Generates the chain topology and counting rules for a rule set.
///
/// The produced sequence can be applied any number of times: chains are
/// created with errors ignored and flushed, and every appended or inserted
/// rule is preceded by an error tolerant delete of the same rule.
#[derive(Debug, Clone, Copy)]
pub struct ChainRuleBuilder {
    family: Family,
    table: Table,
}

impl ChainRuleBuilder {
    /// # Errors
    ///
    /// Returns [`super::Error::UnsupportedTable`] for tables outside filter, mangle and nat.
    pub fn new(family: Family, table: &str) -> Result<Self> {
        Ok(Self {
            family,
            table: table.parse()?,
        })
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn commands(&self, rule_set: &RuleSet) -> Vec<XtCommand> {
        let mut out = Vec::new();

        for direction in Direction::ALL {
            self.make_chain(&mut out, &aggregation_chain_name(direction));
        }

        for interface in rule_set.interfaces() {
            for direction in Direction::ALL {
                let chain = interface_chain_name(interface, direction);
                self.make_chain(&mut out, &chain);
                self.replace_rule(
                    &mut out,
                    "-A",
                    vec![
                        aggregation_chain_name(direction),
                        direction.interface_flag().to_owned(),
                        interface.to_string(),
                        "-j".to_owned(),
                        chain.clone(),
                    ],
                );
                for rule in rule_set.rules() {
                    self.replace_rule(&mut out, "-A", counting_rule_args(&chain, rule, direction));
                }
            }
        }

        for direction in Direction::ALL {
            let aggregation = aggregation_chain_name(direction);
            for hook in self.table.hook_chains(direction) {
                self.replace_rule(
                    &mut out,
                    "-I",
                    vec![(*hook).to_owned(), "-j".to_owned(), aggregation.clone()],
                );
            }
        }

        out
    }

    fn command(&self, args: Vec<String>, errors_ignore: bool) -> XtCommand {
        XtCommand::new(self.family.xt_binary(), self.table, args, errors_ignore)
    }

    fn make_chain(&self, out: &mut Vec<XtCommand>, chain: &str) {
        out.push(self.command(vec!["-N".to_owned(), chain.to_owned()], true));
        out.push(self.command(vec!["-F".to_owned(), chain.to_owned()], false));
    }

    /// Emits a tolerant delete of `rule` followed by adding it with `op`.
    ///
    /// `rule` starts with the chain name. `-I` inserts at the head of the chain.
    fn replace_rule(&self, out: &mut Vec<XtCommand>, op: &str, rule: Vec<String>) {
        let mut delete = Vec::with_capacity(rule.len() + 1);
        delete.push("-D".to_owned());
        delete.extend(rule.iter().cloned());
        out.push(self.command(delete, true));

        let mut add = Vec::with_capacity(rule.len() + 2);
        add.push(op.to_owned());
        let mut rule = rule.into_iter();
        add.extend(rule.next());
        if op == "-I" {
            add.push("1".to_owned());
        }
        add.extend(rule);
        out.push(self.command(add, false));
    }
}

/// `<chain> -m comment --comment <id> <matches...> [-j <target>]`
fn counting_rule_args(chain: &str, rule: &MonitoringRule, direction: Direction) -> Vec<String> {
    let mut args = vec![
        chain.to_owned(),
        "-m".to_owned(),
        "comment".to_owned(),
        "--comment".to_owned(),
        rule.id().to_owned(),
    ];
    for spec in rule.matches() {
        let rendered = spec.render_for_direction(direction);
        // literals were checked for balanced quoting when the rule was registered
        match split_words(&rendered) {
            Some(words) => args.extend(words),
            None => args.push(rendered.into_owned()),
        }
    }
    if let Some(target) = rule.target() {
        args.push("-j".to_owned());
        args.push(target.to_owned());
    }
    args
}
