// Explicit and phony rules

use super::variable::Variable;
use super::{CONT, INDENT, NL, SP, TAB};
use crate::quoting::quote;

/// Render a path for a rule line, folding the base directory into the
/// base variable when the path lives under it
///
/// Literal `$` in the path is doubled so make does not expand it.
pub fn render_path(path: &str, base: Option<&Variable>) -> String {
    let prefix = base
        .and_then(Variable::scalar_value)
        .map(|v| v.trim_end_matches('/'))
        .filter(|v| !v.is_empty());
    if let (Some(var), Some(prefix)) = (base, prefix) {
        if path == prefix {
            return var.expand();
        }
        if let Some(rest) = path.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
            return format!("{}/{}", var.expand(), escape_dollars(&quote(rest)));
        }
    }
    escape_dollars(&quote(path))
}

fn escape_dollars(text: &str) -> String {
    text.replace('$', "$$")
}

/// Targets that all share the same prerequisites and recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub targets: Vec<String>,
    pub prerequisites: Vec<String>,
    /// Already normalized; rendered after a tab
    pub recipe: Option<String>,
}

impl Rule {
    pub fn new(targets: Vec<String>, prerequisites: Vec<String>, recipe: Option<String>) -> Self {
        Self {
            targets,
            prerequisites,
            recipe,
        }
    }

    /// Render the rule
    ///
    /// With a recipe each target gets its own stanza so that make runs the
    /// recipe once per target. Without one, all targets share a single
    /// dependency line.
    pub fn render(&self, base: Option<&Variable>) -> String {
        let targets: Vec<String> = self.targets.iter().map(|t| render_path(t, base)).collect();
        let prerequisites = self.prerequisite_block(base);
        let mut out = String::new();
        match &self.recipe {
            Some(recipe) => {
                for target in &targets {
                    out.push_str(target);
                    out.push(':');
                    out.push_str(&prerequisites);
                    out.push_str(TAB);
                    out.push_str(recipe);
                    out.push_str(NL);
                }
            }
            None => {
                out.push_str(&targets.join(&format!("{CONT}{INDENT}{INDENT}")));
                out.push(':');
                out.push_str(&prerequisites);
            }
        }
        out
    }

    /// Continuation-joined prerequisite lines, starting right after the colon
    fn prerequisite_block(&self, base: Option<&Variable>) -> String {
        if self.prerequisites.is_empty() {
            return NL.to_string();
        }
        let last = self.prerequisites.len() - 1;
        let mut out = CONT.to_string();
        for (i, prereq) in self.prerequisites.iter().enumerate() {
            out.push_str(INDENT);
            out.push_str(&render_path(prereq, base));
            out.push_str(if i == last { NL } else { CONT });
        }
        out
    }
}

/// A target that names no file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phony {
    pub name: String,
    pub prerequisites: Vec<String>,
    pub recipe: Option<String>,
}

impl Phony {
    pub fn new(
        name: impl Into<String>,
        prerequisites: Vec<String>,
        recipe: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            prerequisites,
            recipe,
        }
    }

    pub fn render(&self, base: Option<&Variable>) -> String {
        let mut out = format!(".PHONY:{SP}{0}{NL}{0}:", self.name);
        if !self.prerequisites.is_empty() {
            let prereqs: Vec<String> =
                self.prerequisites.iter().map(|p| render_path(p, base)).collect();
            out.push_str(SP);
            out.push_str(&prereqs.join(SP));
        }
        if let Some(recipe) = &self.recipe {
            out.push_str(NL);
            out.push_str(TAB);
            out.push_str(recipe);
            out.push_str(NL);
        }
        out.push_str(NL);
        out
    }
}
