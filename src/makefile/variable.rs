// Make variables: declaration, rendering and import from `make -p` dumps

use crate::error::{Result, TraceError};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::{CONT, INDENT, NL, SP};

/// `NAME <op> value` as printed by `make -p`
static VARIABLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)\s+([^=]*=)\s*(.*?)\s*$").expect("valid variable pattern")
});

/// Generated or rarely useful variables that `make -p` always prints
pub const UNINTERESTING_VARS: &[&str] = &[
    "AS",
    "CO",
    "COFLAGS",
    "CTANGLE",
    "CURDIR",
    "CWEAVE",
    "F77",
    "F77FLAGS",
    "GET",
    "M2C",
    "MAKEFILES",
    "MAKEFILE_LIST",
    "MAKEFLAGS",
    "MAKE_VERSION",
    "OBJC",
    "OUTPUT_OPTION",
    "PC",
    "SUFFIXES",
    "TANGLE",
    "WEAVE",
];

/// GNU make assignment flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignOp {
    /// `=` expanded on use
    Recursive,
    /// `:=` expanded once, at assignment
    #[default]
    Simple,
    /// `::=` POSIX spelling of `:=`
    PosixSimple,
    /// `?=` only if not already set
    Conditional,
    /// `+=` append
    Append,
    /// `!=` shell assignment
    Shell,
}

impl AssignOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignOp::Recursive => "=",
            AssignOp::Simple => ":=",
            AssignOp::PosixSimple => "::=",
            AssignOp::Conditional => "?=",
            AssignOp::Append => "+=",
            AssignOp::Shell => "!=",
        }
    }
}

impl FromStr for AssignOp {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(AssignOp::Recursive),
            ":=" => Ok(AssignOp::Simple),
            "::=" => Ok(AssignOp::PosixSimple),
            "?=" => Ok(AssignOp::Conditional),
            "+=" => Ok(AssignOp::Append),
            "!=" => Ok(AssignOp::Shell),
            other => Err(TraceError::InvalidAssignment(other.to_string())),
        }
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a make variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableValue {
    Scalar(String),
    /// Rendered one entry per continuation line
    Lines(Vec<String>),
}

/// A make variable declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    name: String,
    op: AssignOp,
    value: VariableValue,
}

impl Variable {
    /// A simply-expanded (`:=`) scalar variable
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: AssignOp::default(),
            value: VariableValue::Scalar(value.into()),
        }
    }

    /// A simply-expanded variable whose value spans several lines
    pub fn with_lines(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            op: AssignOp::default(),
            value: VariableValue::Lines(lines),
        }
    }

    pub fn with_op(mut self, op: AssignOp) -> Self {
        self.op = op;
        self
    }

    /// Parse a `NAME op value` line; None if the line is not an assignment
    pub fn parse_line(line: &str) -> Option<Self> {
        let caps = VARIABLE_LINE.captures(line)?;
        let op = caps[2].parse::<AssignOp>().ok()?;
        Some(Self {
            name: caps[1].to_string(),
            op,
            value: VariableValue::Scalar(caps[3].to_string()),
        })
    }

    /// Replace name, operator and value together
    ///
    /// The operator is validated before anything changes.
    pub fn assign(
        &mut self,
        name: impl Into<String>,
        op: &str,
        value: VariableValue,
    ) -> Result<&mut Self> {
        let op = op.parse::<AssignOp>()?;
        self.name = name.into();
        self.op = op;
        self.value = value;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op(&self) -> AssignOp {
        self.op
    }

    pub fn value(&self) -> &VariableValue {
        &self.value
    }

    /// The value when it is a single string
    pub fn scalar_value(&self) -> Option<&str> {
        match &self.value {
            VariableValue::Scalar(s) => Some(s),
            VariableValue::Lines(_) => None,
        }
    }

    /// The variable in make expansion syntax
    pub fn expand(&self) -> String {
        format!("$({})", self.name)
    }

    /// Render as a makefile declaration
    pub fn render(&self) -> String {
        let mut out = format!("{}{SP}{}", self.name, self.op);
        match &self.value {
            VariableValue::Scalar(v) if v.is_empty() => {}
            VariableValue::Lines(lines) if lines.is_empty() => {}
            VariableValue::Scalar(v) => {
                out.push_str(SP);
                out.push_str(v);
            }
            VariableValue::Lines(lines) => {
                let between = format!("{CONT}{INDENT}");
                out.push_str(&between);
                out.push_str(&lines.join(&between));
                out.push_str(NL);
            }
        }
        out
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// True unless `name` is one of the built-ins listed in [`UNINTERESTING_VARS`]
pub fn is_interesting(name: &str) -> bool {
    !UNINTERESTING_VARS.contains(&name)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Collect the useful variable assignments from a `make -p` dump
///
/// Comments, recipe lines and `define` blocks are skipped, as are special
/// variables (`.FEATURES`, `<D` and the like) and variables with empty
/// values, which could never be substituted.
pub fn import_make_database(text: &str) -> Vec<Variable> {
    let mut vars = Vec::new();
    let mut in_define = false;
    for line in text.lines() {
        if in_define {
            in_define = !line.starts_with("endef");
            continue;
        }
        if line.starts_with("define ") {
            in_define = true;
            continue;
        }
        if line.starts_with('#') || line.starts_with('\t') || line.trim().is_empty() {
            continue;
        }
        let Some(var) = Variable::parse_line(line) else {
            continue;
        };
        if !is_identifier(var.name())
            || !is_interesting(var.name())
            || var.scalar_value().is_some_and(str::is_empty)
        {
            continue;
        }
        tracing::debug!(name = var.name(), "imported make variable");
        vars.push(var);
    }
    vars
}
