//! TOML configuration
//!
//! # Example
//!
//! ```toml
//! base_var = "SRC"
//! base_dir = "/src"
//! deshell = true
//! clean_target = true
//!
//! [[variable]]
//! name = "CFLAGS"
//! value = "-O2 -Wall"
//! ```

use crate::error::TraceError;
use crate::generator::GeneratorConfig;
use crate::makefile::{Variable, VariableValue};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A known variable declared in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    pub value: String,
    /// Assignment operator, `:=` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
}

impl VariableSpec {
    pub fn to_variable(&self) -> Result<Variable, TraceError> {
        let mut var = Variable::new(&self.name, &self.value);
        if let Some(op) = &self.op {
            var.assign(&self.name, op, VariableValue::Scalar(self.value.clone()))?;
        }
        Ok(var)
    }
}

/// Generation settings, loadable from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the base-directory variable
    pub base_var: String,
    /// Base directory; the working directory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<String>,
    pub deshell: bool,
    pub members_only: bool,
    pub clean_target: bool,
    /// Log each shell invocation
    pub xtrace: bool,
    #[serde(rename = "variable", skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VariableSpec>,
}

fn default_base_var() -> String {
    "BASE".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_var: default_base_var(),
            base_dir: None,
            deshell: true,
            members_only: false,
            clean_target: false,
            xtrace: false,
            variables: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !is_make_name(&self.base_var) {
            return Err(format!(
                "base_var must be a make variable name, got '{}'",
                self.base_var
            ));
        }

        if self.base_dir.as_deref().is_some_and(str::is_empty) {
            return Err("base_dir must not be empty".to_string());
        }

        for spec in &self.variables {
            if !is_make_name(&spec.name) {
                return Err(format!("variable name '{}' is not valid", spec.name));
            }
            if spec.name == self.base_var {
                return Err(format!("variable '{}' shadows base_var", spec.name));
            }
        }

        Ok(())
    }

    /// Resolve into generator settings
    ///
    /// Configured variables come first, then `imported` ones, which is the
    /// order substitution tries them in.
    pub fn generator_config(
        &self,
        default_base_dir: &str,
        imported: Vec<Variable>,
    ) -> Result<GeneratorConfig, TraceError> {
        self.validate().map_err(TraceError::Config)?;

        let mut variables = self
            .variables
            .iter()
            .map(VariableSpec::to_variable)
            .collect::<Result<Vec<_>, _>>()?;
        variables.extend(
            imported
                .into_iter()
                .filter(|v| v.name() != self.base_var),
        );

        Ok(GeneratorConfig {
            base_dir: self
                .base_dir
                .clone()
                .unwrap_or_else(|| default_base_dir.to_string()),
            base_var: self.base_var.clone(),
            variables,
            deshell: self.deshell,
            members_only: self.members_only,
            clean_target: self.clean_target,
        })
    }
}

fn is_make_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
