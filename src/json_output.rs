//! JSON output format for the classified dependency graph
//!
//! `--format json` emits this instead of a makefile so other tools can
//! consume the graph without parsing make syntax.

use crate::classify::classify;
use crate::deshell::ShellRunner;
use crate::error::TraceError;
use crate::generator::Generator;
use crate::trace_record::CommandRecord;
use serde::{Deserialize, Serialize};

/// One traced command with its classified accesses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonCommand {
    /// Command line as recorded
    pub command: String,
    /// Directory the command ran in
    pub run_directory: String,
    /// Executed program
    pub program: String,
    /// Heuristic principal output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_target: Option<String>,
    /// Produced paths in primary order
    pub targets: Vec<String>,
    /// Consumed paths, sorted
    pub prerequisites: Vec<String>,
    /// Normalized recipe (only for commands rendered as a rule)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe: Option<String>,
}

/// Summary statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonSummary {
    pub total_commands: usize,
    /// Commands rendered as a rule
    pub total_rules: usize,
    pub total_accesses: usize,
    /// Commands whose recipe could not be normalized
    pub failed_commands: usize,
}

/// Root JSON document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    pub base_dir: String,
    pub base_var: String,
    pub commands: Vec<JsonCommand>,
    pub summary: JsonSummary,
}

impl JsonOutput {
    pub fn new(base_dir: impl Into<String>, base_var: impl Into<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "tracemake-json-v1".to_string(),
            base_dir: base_dir.into(),
            base_var: base_var.into(),
            commands: Vec::new(),
            summary: JsonSummary::default(),
        }
    }

    /// Build the document for every command, filtering prerequisites and
    /// normalizing recipes through `generator` exactly as makefile output
    /// would
    ///
    /// A command whose recipe fails is still listed, without a recipe, and
    /// its error is returned with the document.
    pub fn from_commands<R: ShellRunner>(
        generator: &Generator<R>,
        commands: &[CommandRecord],
    ) -> (Self, Vec<TraceError>) {
        let config = generator.config();
        let mut output = Self::new(&config.base_dir, &config.base_var);
        let mut failures = Vec::new();
        for command in commands {
            let deps = classify(command);
            let prerequisites = generator.prerequisites_for(&deps);
            let recipe = if deps.targets.is_empty() {
                None
            } else {
                match generator.recipe_for(command) {
                    Ok(recipe) => Some(recipe),
                    Err(e) => {
                        tracing::debug!(command = %command, "recipe left out: {}", e);
                        output.summary.failed_commands += 1;
                        failures.push(e);
                        None
                    }
                }
            };
            output.add_command(command, prerequisites, recipe);
        }
        (output, failures)
    }

    /// Add one command with its already filtered prerequisites
    pub fn add_command(
        &mut self,
        command: &CommandRecord,
        prerequisites: Vec<String>,
        recipe: Option<String>,
    ) {
        let targets: Vec<String> = classify(command)
            .target_paths()
            .into_iter()
            .map(String::from)
            .collect();

        self.summary.total_commands += 1;
        self.summary.total_accesses += command.access_count();
        if recipe.is_some() {
            self.summary.total_rules += 1;
        }

        self.commands.push(JsonCommand {
            command: command.command_line.clone(),
            run_directory: command.run_directory.clone(),
            program: command.program_path.clone(),
            primary_target: targets.first().cloned(),
            targets,
            prerequisites,
            recipe,
        });
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deshell::RecipeNormalizer;
    use crate::generator::GeneratorConfig;
    use crate::trace_record::{FileAccess, Operation};
    use std::io;

    struct NoShell;

    impl ShellRunner for NoShell {
        fn run(&self, _argv: &[String]) -> io::Result<String> {
            Err(io::Error::other("not available"))
        }
    }

    fn fa(op: Operation, path: &str) -> FileAccess {
        FileAccess {
            operation: op,
            device_code: String::new(),
            path: path.to_string(),
            secondary_path: None,
            is_member: false,
        }
    }

    fn compile() -> CommandRecord {
        let mut cmd = CommandRecord::new("/usr/bin/cc", "/src", "cc -c a.c");
        cmd.add(fa(Operation::Read, "/src/a.c"));
        cmd.add(fa(Operation::Create, "/src/a.o"));
        cmd
    }

    fn generator(config: GeneratorConfig) -> Generator<NoShell> {
        Generator::new(config, RecipeNormalizer::with_dash_check(NoShell, false))
    }

    fn src_config() -> GeneratorConfig {
        GeneratorConfig {
            base_dir: "/src".to_string(),
            base_var: "SRC".to_string(),
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn test_json_output_new() {
        let output = JsonOutput::new("/src", "SRC");
        assert_eq!(output.format, "tracemake-json-v1");
        assert!(output.commands.is_empty());
        assert_eq!(output.summary.total_commands, 0);
    }

    #[test]
    fn test_add_command() {
        let mut output = JsonOutput::new("/src", "SRC");
        let prerequisites = vec!["/src/a.c".to_string()];
        output.add_command(&compile(), prerequisites.clone(), Some("cc -c a.c".to_string()));

        let mut reader = CommandRecord::new("/bin/cat", "/src", "cat a.c");
        reader.add(fa(Operation::Read, "/src/a.c"));
        output.add_command(&reader, prerequisites, None);

        assert_eq!(output.summary.total_commands, 2);
        assert_eq!(output.summary.total_rules, 1);
        assert_eq!(output.summary.total_accesses, 3);
        assert_eq!(output.commands[0].primary_target.as_deref(), Some("/src/a.o"));
        assert_eq!(output.commands[0].prerequisites, vec!["/src/a.c"]);
        assert!(output.commands[1].primary_target.is_none());
    }

    #[test]
    fn test_to_json() {
        let mut output = JsonOutput::new("/src", "SRC");
        output.add_command(&compile(), Vec::new(), None);
        let json = output.to_json().unwrap();
        assert!(json.contains("\"format\": \"tracemake-json-v1\""));
        assert!(json.contains("\"primary_target\": \"/src/a.o\""));
        // Absent recipes are omitted.
        assert!(!json.contains("\"recipe\""));
    }

    #[test]
    fn test_from_commands_uses_generator_recipes() {
        let (output, failures) = JsonOutput::from_commands(&generator(src_config()), &[compile()]);
        assert!(failures.is_empty());
        assert_eq!(output.base_var, "SRC");
        assert_eq!(output.commands[0].recipe.as_deref(), Some("cc -c a.c"));

        let parsed: serde_json::Value = serde_json::from_str(&output.to_json().unwrap()).unwrap();
        assert_eq!(parsed["summary"]["total_rules"], 1);
        assert_eq!(parsed["summary"]["failed_commands"], 0);
    }

    #[test]
    fn test_members_only_filters_prerequisites() {
        let mut cmd = compile();
        cmd.add(fa(Operation::Read, "/usr/include/stdio.h"));
        cmd.add(fa(Operation::Exec, "/usr/bin/cc"));
        let members = GeneratorConfig {
            members_only: true,
            ..src_config()
        };

        let (output, _) = JsonOutput::from_commands(&generator(members), &[cmd.clone()]);
        assert_eq!(output.commands[0].prerequisites, vec!["/src/a.c"]);

        let (output, _) = JsonOutput::from_commands(&generator(src_config()), &[cmd]);
        assert_eq!(
            output.commands[0].prerequisites,
            vec!["/src/a.c", "/usr/bin/cc", "/usr/include/stdio.h"]
        );
    }

    #[test]
    fn test_failed_recipe_listed_without_rule() {
        let mut wrapped = CommandRecord::new("/bin/sh", "/src", "sh -c 'touch b.o'");
        wrapped.add(fa(Operation::Create, "/src/b.o"));

        let (output, failures) =
            JsonOutput::from_commands(&generator(src_config()), &[wrapped, compile()]);
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], TraceError::ShellNormalization { .. }));
        assert_eq!(output.commands.len(), 2);
        assert_eq!(output.commands[0].primary_target.as_deref(), Some("/src/b.o"));
        assert!(output.commands[0].recipe.is_none());
        assert_eq!(output.commands[1].recipe.as_deref(), Some("cc -c a.c"));
        assert_eq!(output.summary.total_rules, 1);
        assert_eq!(output.summary.failed_commands, 1);
    }
}
