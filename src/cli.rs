//! CLI argument parsing for tracemake

use crate::config::Config;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the generated dependency graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// GNU make makefile (default)
    Make,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "tracemake")]
#[command(version)]
#[command(about = "Generate a makefile from a file-access and command trace", long_about = None)]
pub struct Cli {
    /// Trace file to read (`-` for stdin)
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,

    /// Write output to FILE instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory member paths are relative to (default: current directory)
    #[arg(short = 'b', long = "base-dir", value_name = "DIR")]
    pub base_dir: Option<String>,

    /// Name of the base directory variable
    #[arg(long = "base-var", value_name = "NAME")]
    pub base_var: Option<String>,

    /// `make -p` output whose variables are substituted into recipes
    #[arg(long = "make-vars", value_name = "FILE")]
    pub make_vars: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (make or json)
    #[arg(long = "format", value_enum, default_value = "make")]
    pub format: OutputFormat,

    /// Add a `clean` target
    #[arg(long = "clean")]
    pub clean: bool,

    /// Keep `sh -c` wrappers in recipes
    #[arg(long = "no-deshell")]
    pub no_deshell: bool,

    /// Only list prerequisites under the base directory
    #[arg(long = "members-only")]
    pub members_only: bool,

    /// Log each shell invocation
    #[arg(short = 'x', long = "xtrace")]
    pub xtrace: bool,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Reads from stdin when the trace argument is `-`
    pub fn reads_stdin(&self) -> bool {
        self.trace.as_os_str() == "-"
    }

    /// Apply command-line overrides on top of file configuration
    ///
    /// Flags only ever switch behaviour on; absent options leave the file
    /// value alone.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(dir) = &self.base_dir {
            config.base_dir = Some(dir.clone());
        }
        if let Some(var) = &self.base_var {
            config.base_var = var.clone();
        }
        if self.no_deshell {
            config.deshell = false;
        }
        config.clean_target |= self.clean;
        config.members_only |= self.members_only;
        config.xtrace |= self.xtrace;
    }
}
