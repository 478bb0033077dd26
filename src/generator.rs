//! Trace-to-makefile generation
//!
//! Turns grouped [`CommandRecord`]s into a [`Makefile`]: one rule per
//! command that produced something, an `all` target naming every primary
//! target, and optionally a `clean` target. A command whose recipe cannot
//! be normalized loses its rule; the error is returned alongside the
//! makefile and the remaining commands are still processed.

use crate::classify::{classify, Dependencies};
use crate::deshell::{translate_newlines, RecipeNormalizer, ShellRunner};
use crate::error::{Result, TraceError};
use crate::makefile::{render_path, Makefile, Phony, Rule, Variable};
use crate::quoting::substitute_variables;
use crate::trace_record::CommandRecord;
use std::collections::BTreeSet;

/// Settings for one generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Directory that member paths are relative to
    pub base_dir: String,
    /// Name of the variable holding `base_dir`
    pub base_var: String,
    /// Known variables, substituted into recipes in this order
    pub variables: Vec<Variable>,
    /// Strip redundant `sh -c` wrappers from recipes
    pub deshell: bool,
    /// Only list prerequisites that live under `base_dir`
    pub members_only: bool,
    /// Emit a `clean` target removing every produced file
    pub clean_target: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_dir: ".".to_string(),
            base_var: "BASE".to_string(),
            variables: Vec::new(),
            deshell: true,
            members_only: false,
            clean_target: false,
        }
    }
}

/// A generated makefile and the commands that could not become rules
#[derive(Debug)]
pub struct Generation {
    pub makefile: Makefile,
    /// One error per command whose rule was left out
    pub failures: Vec<TraceError>,
}

impl Generation {
    /// True when every command was processed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Builds makefiles from traced commands
pub struct Generator<R: ShellRunner> {
    config: GeneratorConfig,
    normalizer: RecipeNormalizer<R>,
}

impl<R: ShellRunner> Generator<R> {
    pub fn new(config: GeneratorConfig, normalizer: RecipeNormalizer<R>) -> Self {
        Self { config, normalizer }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Make-ready recipe text for a command
    pub fn recipe_for(&self, command: &CommandRecord) -> Result<String> {
        let raw = &command.command_line;
        let recipe = if self.config.deshell {
            self.normalizer.prepare(raw)?
        } else {
            translate_newlines(raw)
        };
        Ok(substitute_variables(&recipe, &self.config.variables))
    }

    /// Prerequisite paths as they appear in the command's rule
    pub fn prerequisites_for(&self, deps: &Dependencies<'_>) -> Vec<String> {
        deps.prerequisite_paths()
            .into_iter()
            .filter(|p| !self.config.members_only || is_under(p, &self.config.base_dir))
            .map(String::from)
            .collect()
    }

    /// The rule for one command, or None if it produced nothing
    pub fn rule_for(&self, command: &CommandRecord) -> Result<Option<Rule>> {
        let deps = classify(command);
        let targets: Vec<String> = deps.target_paths().into_iter().map(String::from).collect();
        if targets.is_empty() {
            tracing::debug!(command = %command, "no targets, skipping");
            return Ok(None);
        }

        let prerequisites = self.prerequisites_for(&deps);
        let recipe = self.recipe_for(command)?;
        Ok(Some(Rule::new(targets, prerequisites, Some(recipe))))
    }

    /// Generate the whole makefile
    ///
    /// A failing command is skipped and its error collected; it never
    /// stops the others.
    pub fn generate(&self, commands: &[CommandRecord]) -> Generation {
        let mut makefile = Makefile::new(&self.config.base_dir, &self.config.base_var);
        makefile.append(format!(
            "# Generated by tracemake from {} traced command(s).",
            commands.len()
        ));
        for var in &self.config.variables {
            makefile.append(var.clone());
        }

        let mut rules = Vec::new();
        let mut failures = Vec::new();
        let mut produced: BTreeSet<String> = BTreeSet::new();
        for command in commands {
            let rule = match self.rule_for(command) {
                Ok(Some(rule)) => rule,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(command = %command, "rule left out: {}", e);
                    failures.push(e);
                    continue;
                }
            };
            for target in &rule.targets {
                if !produced.insert(target.clone()) {
                    tracing::warn!(target = %target, "target produced by more than one command");
                }
            }
            rules.push(rule);
        }

        let primaries: Vec<String> = distinct(rules.iter().filter_map(|r| r.targets.first()));
        makefile.append(Phony::new("all", primaries, None));

        for rule in &rules {
            makefile.append(rule.clone());
        }

        if self.config.clean_target {
            if let Some(clean) = self.clean_rule(commands, makefile.base_variable()) {
                makefile.append(clean);
            }
        }

        tracing::debug!(
            rules = rules.len(),
            failures = failures.len(),
            "makefile generated"
        );
        Generation { makefile, failures }
    }

    /// `clean` removes every produced regular file
    fn clean_rule(&self, commands: &[CommandRecord], base: &Variable) -> Option<Phony> {
        let files: BTreeSet<&str> = commands
            .iter()
            .flat_map(|c| c.accesses())
            .filter(|a| a.is_target() && !a.is_directory())
            .map(|a| a.path.as_str())
            .collect();
        if files.is_empty() {
            return None;
        }
        let args: Vec<String> = files.iter().map(|p| render_path(p, Some(base))).collect();
        Some(Phony::new("clean", Vec::new(), Some(format!("rm -f {}", args.join(" ")))))
    }
}

fn is_under(path: &str, base_dir: &str) -> bool {
    let base = base_dir.trim_end_matches('/');
    path == base
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn distinct<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items
        .filter(|item| seen.insert(item.as_str()))
        .cloned()
        .collect()
}
