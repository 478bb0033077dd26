//! Recipe normalization: dropping a redundant `sh -c` level
//!
//! When make runs a recipe it hands it to `/bin/sh -c`, so a traced
//! command of the form `/bin/sh -c "stuff"` should go into the makefile as
//! just `stuff`. Rather than re-implementing shell quoting rules, the shell
//! itself is asked to echo the command in verbose, no-execute mode.
//!
//! Dash, used as `/bin/sh` on Debian-derived systems, does not handle
//! `-nv` the way other shells do, so bash is used instead when `/bin/sh`
//! turns out to be dash.

use crate::error::{Result, TraceError};
use std::borrow::Cow;
use std::io;
use std::process::Command;

/// Token the auditor substitutes for newlines inside a command line
pub const NEWLINE_TOKEN: &str = "^J";

const SYSTEM_SH: &str = "/bin/sh";
const DASH: &str = "/bin/dash";
const BASH: &str = "/bin/bash";

/// Runs an argument vector and captures its output
pub trait ShellRunner {
    /// Run `argv`, returning stdout and stderr combined; non-zero exit is an error
    fn run(&self, argv: &[String]) -> io::Result<String>;
}

/// [`ShellRunner`] backed by real processes
#[derive(Debug, Clone, Default)]
pub struct SystemShell {
    /// Log each command as `+ argv` before running it
    pub xtrace: bool,
}

impl SystemShell {
    pub fn new(xtrace: bool) -> Self {
        Self { xtrace }
    }
}

impl ShellRunner for SystemShell {
    fn run(&self, argv: &[String]) -> io::Result<String> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

        if self.xtrace {
            tracing::info!("+ {}", argv.join(" "));
        }

        let output = Command::new(program).args(args).output()?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(io::Error::other(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                combined.trim_end()
            )));
        }
        Ok(combined)
    }
}

/// The parts of a `<shell> -c <text>` command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellWrapper<'a> {
    pub shell: &'a str,
    pub flags: &'a str,
    pub text: &'a str,
}

/// Recognize `<path ending in sh> -…c <text>`
pub fn detect_wrapper(line: &str) -> Option<ShellWrapper<'_>> {
    let (shell, rest) = split_word(line)?;
    let (flags, text) = split_word(rest)?;
    if text.is_empty() {
        return None;
    }
    if shell.ends_with("sh") && flags.starts_with('-') && flags.ends_with('c') {
        Some(ShellWrapper { shell, flags, text })
    } else {
        None
    }
}

/// Split off the first whitespace-delimited word; the rest keeps its
/// interior whitespace
fn split_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(idx) => Some((&s[..idx], s[idx..].trim_start())),
        None => Some((s, "")),
    }
}

/// True when `/bin/sh` and `/bin/dash` are the same file
pub fn system_sh_is_dash() -> bool {
    use nix::sys::stat::stat;
    match (stat(SYSTEM_SH), stat(DASH)) {
        (Ok(sh), Ok(dash)) => sh.st_dev == dash.st_dev && sh.st_ino == dash.st_ino,
        _ => false,
    }
}

/// Translate newline tokens into make's newline+tab recipe continuation
pub fn translate_newlines(raw: &str) -> String {
    raw.trim().split(NEWLINE_TOKEN).collect::<Vec<_>>().join("\n\t")
}

/// Strips redundant shell wrappers from recipe lines
#[derive(Debug, Clone)]
pub struct RecipeNormalizer<R: ShellRunner> {
    runner: R,
    sh_is_dash: bool,
}

impl<R: ShellRunner> RecipeNormalizer<R> {
    /// Create a normalizer, probing whether `/bin/sh` is dash
    pub fn new(runner: R) -> Self {
        Self::with_dash_check(runner, system_sh_is_dash())
    }

    /// Create a normalizer with an explicit answer to the dash probe
    pub fn with_dash_check(runner: R, sh_is_dash: bool) -> Self {
        Self { runner, sh_is_dash }
    }

    /// Translate newline tokens and drop a wrapping `sh -c` if present
    pub fn prepare(&self, raw: &str) -> Result<String> {
        self.normalize(&translate_newlines(raw))
    }

    /// Argument vector used to have the shell echo `wrapper.text` back
    pub fn shell_argv(&self, wrapper: &ShellWrapper<'_>) -> Vec<String> {
        let text = strip_outer_quotes(wrapper.text).into_owned();
        let mut argv: Vec<String> = if self.sh_is_dash {
            vec![BASH.into(), "--norc".into(), "--noprofile".into()]
        } else {
            vec![SYSTEM_SH.into()]
        };
        argv.push("-nv".into());
        argv.push(wrapper.flags.to_string());
        argv.push(text);
        argv
    }

    /// Reduce `<shell> -c <text>` to `<text>`; other lines pass unchanged
    pub fn normalize(&self, line: &str) -> Result<String> {
        let Some(wrapper) = detect_wrapper(line) else {
            return Ok(line.to_string());
        };

        let argv = self.shell_argv(&wrapper);
        let attempted = argv.join(" ");
        let failure = |reason: String| TraceError::ShellNormalization {
            line: line.to_string(),
            attempted: attempted.clone(),
            reason,
        };

        let output = self.runner.run(&argv).map_err(|e| failure(e.to_string()))?;
        let echoed = output.trim_end();
        if echoed.is_empty() {
            return Err(failure("shell echoed nothing".to_string()));
        }

        tracing::debug!(from = line, to = echoed, "stripped shell wrapper");
        Ok(echoed.to_string())
    }
}

/// Remove one enclosing pair of quotes from a single shell word
///
/// Text that is not exactly one quoted word is returned as is.
fn strip_outer_quotes(text: &str) -> Cow<'_, str> {
    if text.len() < 2 {
        return Cow::Borrowed(text);
    }
    let inner = &text[1..text.len() - 1];
    if text.starts_with('\'') && text.ends_with('\'') && !inner.contains('\'') {
        return Cow::Borrowed(inner);
    }
    if text.starts_with('"') && text.ends_with('"') {
        if let Some(unescaped) = unescape_double_quoted(inner) {
            return Cow::Owned(unescaped);
        }
    }
    Cow::Borrowed(text)
}

/// Undo the backslash escapes that are special inside double quotes.
/// Returns None if an unescaped quote shows this is not one word.
fn unescape_double_quoted(inner: &str) -> Option<String> {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(&next) if matches!(next, '"' | '\\' | '$' | '`') => {
                    out.push(next);
                    chars.next();
                }
                Some('\n') => {
                    chars.next();
                }
                // A lone trailing backslash escapes the closing quote.
                None => return None,
                _ => out.push('\\'),
            },
            '"' => return None,
            other => out.push(other),
        }
    }
    Some(out)
}
