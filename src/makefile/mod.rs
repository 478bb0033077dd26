//! In-memory makefile model and its GNU make rendering
//!
//! A [`Makefile`] owns a base-directory variable and an ordered list of
//! items. Rendering is a pure function of the model.

mod rule;
mod variable;


pub use rule::{render_path, Phony, Rule};
pub use variable::{
    import_make_database, is_interesting, AssignOp, Variable, VariableValue, UNINTERESTING_VARS,
};

use regex::Regex;
use std::sync::LazyLock;

pub(crate) const NL: &str = "\n";
pub(crate) const SP: &str = " ";
pub(crate) const TAB: &str = "\t";
pub(crate) const CONT: &str = " \\\n";
pub(crate) const INDENT: &str = "  ";

static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank-run pattern"));

/// One element of a makefile, rendered in insertion order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// Raw text such as comments, emitted verbatim
    Text(String),
    Variable(Variable),
    Rule(Rule),
    Phony(Phony),
}

impl From<Variable> for Item {
    fn from(v: Variable) -> Self {
        Item::Variable(v)
    }
}

impl From<Rule> for Item {
    fn from(r: Rule) -> Self {
        Item::Rule(r)
    }
}

impl From<Phony> for Item {
    fn from(p: Phony) -> Self {
        Item::Phony(p)
    }
}

impl From<String> for Item {
    fn from(s: String) -> Self {
        Item::Text(s)
    }
}

impl From<&str> for Item {
    fn from(s: &str) -> Self {
        Item::Text(s.to_string())
    }
}

/// A generated makefile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Makefile {
    base: Variable,
    items: Vec<Item>,
}

impl Makefile {
    /// A makefile whose paths under `base_dir` render through `$(base_name)`
    pub fn new(base_dir: impl Into<String>, base_name: impl Into<String>) -> Self {
        Self {
            base: Variable::new(base_name, base_dir),
            items: Vec::new(),
        }
    }

    pub fn base_variable(&self) -> &Variable {
        &self.base
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn append(&mut self, item: impl Into<Item>) {
        self.items.push(item.into());
    }

    /// Rules in insertion order
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.items.iter().filter_map(|item| match item {
            Item::Rule(rule) => Some(rule),
            _ => None,
        })
    }

    /// Render the whole makefile
    ///
    /// The base variable comes first, then every item separated by a
    /// blank line. Runs of blank lines collapse to one and the text ends
    /// with exactly one newline.
    pub fn render(&self) -> String {
        let base = Some(&self.base);
        let mut out = self.base.render();
        out.push_str(NL);
        out.push_str(NL);
        for item in &self.items {
            match item {
                Item::Text(text) => out.push_str(text),
                Item::Variable(var) => out.push_str(&var.render()),
                Item::Rule(rule) => out.push_str(&rule.render(base)),
                Item::Phony(phony) => out.push_str(&phony.render(base)),
            }
            out.push_str(NL);
        }
        let collapsed = BLANK_RUN.replace_all(&out, "\n\n");
        let mut text = collapsed.trim_end().to_string();
        text.push_str(NL);
        text
    }
}
