//! Trace record parsing
//!
//! The auditor writes two kinds of comma-separated lines:
//!
//! - file-access lines: `op,call,time,pid,depth,ppid,tid,pccode,ccode,`
//!   followed by the path state `type,fsname,mtime,size,mode,dcode,link,path`
//! - command lines: `...,prog,rwd,pccode,ccode,pathcode,cmdline`
//!
//! Both formats put free text last so that the final field may itself
//! contain commas.

use crate::error::{Result, TraceError};
use percent_encoding::percent_decode_str;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Field separator used by the auditor
pub const SEP: char = ',';

/// Maximum number of splits for a file-access line
pub const ACCESS_SPLITS: usize = 16;

/// Maximum number of splits for a command line
pub const COMMAND_SPLITS: usize = 13;

const DEVICE_CODE_FIELD: usize = 14;
const PROGRAM_FIELD: usize = 8;
const RUN_DIRECTORY_FIELD: usize = 9;

/// Kind of file-system operation recorded for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    /// File opened for reading (R)
    Read,
    /// File executed (X)
    Exec,
    /// File created or truncated for writing (W)
    Create,
    /// File opened for append (A)
    Append,
    /// Symlink created (S)
    Symlink,
    /// Hard link created (L)
    Link,
    /// File removed (U)
    Unlink,
    /// Directory created (D)
    Mkdir,
    /// Any other op code the auditor may emit
    Other(char),
}

impl Operation {
    /// Map a single-letter op code to an operation
    pub fn from_code(code: char) -> Self {
        match code {
            'R' => Operation::Read,
            'X' => Operation::Exec,
            'W' => Operation::Create,
            'A' => Operation::Append,
            'S' => Operation::Symlink,
            'L' => Operation::Link,
            'U' => Operation::Unlink,
            'D' => Operation::Mkdir,
            other => Operation::Other(other),
        }
    }

    /// The single-letter op code for this operation
    pub fn code(&self) -> char {
        match self {
            Operation::Read => 'R',
            Operation::Exec => 'X',
            Operation::Create => 'W',
            Operation::Append => 'A',
            Operation::Symlink => 'S',
            Operation::Link => 'L',
            Operation::Unlink => 'U',
            Operation::Mkdir => 'D',
            Operation::Other(c) => *c,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One file-system touch observed while a command ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAccess {
    pub operation: Operation,
    pub device_code: String,
    pub path: String,
    /// Link target, present only when the auditor filled the slot
    pub secondary_path: Option<String>,
    /// True when the trace recorded the path relative to the base directory
    pub is_member: bool,
}

/// Set-membership key for file accesses: one entry per (operation, path)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccessKey {
    pub operation: Operation,
    pub path: String,
}

impl FileAccess {
    /// Parse a file-access line, resolving member paths against `base_dir`
    pub fn parse(line: &str, base_dir: &str) -> Result<Self> {
        let line = line.trim_end();
        let fields: Vec<&str> = line.splitn(ACCESS_SPLITS + 1, SEP).collect();
        if fields.len() < ACCESS_SPLITS + 1 {
            return Err(TraceError::malformed(
                line,
                format!(
                    "expected {} fields, found {}",
                    ACCESS_SPLITS + 1,
                    fields.len()
                ),
            ));
        }

        let mut op_chars = fields[0].chars();
        let operation = match (op_chars.next(), op_chars.next()) {
            (Some(c), None) => Operation::from_code(c),
            _ => {
                return Err(TraceError::malformed(
                    line,
                    format!("bad op code '{}'", fields[0]),
                ))
            }
        };

        let raw_path = fields[ACCESS_SPLITS];
        if raw_path.is_empty() {
            return Err(TraceError::malformed(line, "missing path field"));
        }
        let is_member = !raw_path.starts_with('/');
        let path = if is_member {
            join_path(base_dir, raw_path)
        } else {
            raw_path.to_string()
        };

        // The link slot is %XX-encoded because it may contain commas.
        let raw_secondary = fields[ACCESS_SPLITS - 1];
        let secondary_path = if raw_secondary.is_empty() {
            None
        } else {
            let decoded = percent_decode_str(raw_secondary)
                .decode_utf8()
                .map_err(|e| TraceError::malformed(line, format!("bad link target: {}", e)))?;
            Some(resolve_link_target(&path, &decoded))
        };

        Ok(Self {
            operation,
            device_code: fields[DEVICE_CODE_FIELD].to_string(),
            path,
            secondary_path,
            is_member,
        })
    }

    /// Key used for deduplication within a command
    pub fn key(&self) -> AccessKey {
        AccessKey {
            operation: self.operation,
            path: self.path.clone(),
        }
    }

    /// Path relative to `base_dir`, if it lies underneath it
    pub fn relative_to(&self, base_dir: &str) -> Option<&str> {
        let base = base_dir.trim_end_matches('/');
        self.path
            .strip_prefix(base)
            .and_then(|rest| rest.strip_prefix('/'))
    }

    /// Read-like access: the path is an upstream dependency
    pub fn is_prerequisite(&self) -> bool {
        matches!(self.operation, Operation::Read | Operation::Exec)
    }

    /// Anything that is neither a read nor a removal produces the path
    pub fn is_target(&self) -> bool {
        !matches!(
            self.operation,
            Operation::Read | Operation::Exec | Operation::Unlink
        )
    }

    pub fn is_append(&self) -> bool {
        self.operation == Operation::Append
    }

    pub fn is_symlink(&self) -> bool {
        self.operation == Operation::Symlink
    }

    pub fn is_unlink(&self) -> bool {
        self.operation == Operation::Unlink
    }

    pub fn is_directory(&self) -> bool {
        self.operation == Operation::Mkdir
    }
}

impl fmt::Display for FileAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation, self.path)
    }
}

/// One executed command and the file accesses attributed to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub program_path: String,
    pub run_directory: String,
    pub command_line: String,
    accesses: BTreeMap<AccessKey, FileAccess>,
}

impl CommandRecord {
    /// Parse a command line record
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end();
        let fields: Vec<&str> = line.splitn(COMMAND_SPLITS + 1, SEP).collect();
        if fields.len() <= RUN_DIRECTORY_FIELD + 1 {
            return Err(TraceError::malformed(
                line,
                format!(
                    "expected at least {} fields, found {}",
                    RUN_DIRECTORY_FIELD + 2,
                    fields.len()
                ),
            ));
        }

        Ok(Self::new(
            fields[PROGRAM_FIELD],
            fields[RUN_DIRECTORY_FIELD],
            fields[fields.len() - 1],
        ))
    }

    /// Build a record directly from its descriptive fields
    pub fn new(
        program_path: impl Into<String>,
        run_directory: impl Into<String>,
        command_line: impl Into<String>,
    ) -> Self {
        Self {
            program_path: program_path.into(),
            run_directory: run_directory.into(),
            command_line: command_line.into(),
            accesses: BTreeMap::new(),
        }
    }

    /// Attach a file access; a repeated (operation, path) pair is ignored
    pub fn add(&mut self, access: FileAccess) {
        self.accesses.entry(access.key()).or_insert(access);
    }

    /// All distinct accesses, ordered by (operation, path)
    pub fn accesses(&self) -> impl Iterator<Item = &FileAccess> {
        self.accesses.values()
    }

    pub fn access_count(&self) -> usize {
        self.accesses.len()
    }

    /// Distinct paths touched by this command
    pub fn paths(&self) -> BTreeSet<&str> {
        self.accesses.values().map(|a| a.path.as_str()).collect()
    }
}

impl fmt::Display for CommandRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.run_directory, self.command_line)
    }
}

/// A parsed trace line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceRecord {
    Access(FileAccess),
    Command(CommandRecord),
}

impl TraceRecord {
    /// Parse either kind of line; file-access lines begin with a one-letter op
    pub fn parse(line: &str, base_dir: &str) -> Result<Self> {
        if is_access_line(line) {
            FileAccess::parse(line, base_dir).map(TraceRecord::Access)
        } else {
            CommandRecord::parse(line).map(TraceRecord::Command)
        }
    }
}

fn is_access_line(line: &str) -> bool {
    let first = line.split(SEP).next().unwrap_or("");
    let mut chars = first.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
}

/// Join a relative path onto a base directory
pub fn join_path(base: &str, rel: &str) -> String {
    if rel.starts_with('/') || base.is_empty() {
        rel.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, rel)
    } else {
        format!("{}/{}", base, rel)
    }
}

/// Directory portion of a path (everything before the last slash)
fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Resolve a link target against the link's own directory, lexically only
///
/// Never consults the filesystem: following a chain of links would hide
/// the intermediate link from make.
pub fn resolve_link_target(link_path: &str, target: &str) -> String {
    if target.starts_with('/') {
        normalize_path(target)
    } else {
        normalize_path(&join_path(dirname(link_path), target))
    }
}

/// Lexically normalize a path: collapse `//`, `.` and `dir/..`
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access_line(op: &str, link: &str, path: &str) -> String {
        format!(
            "{},open,1700000000.000000,101,2,100,101,pc1,cc1,f,ext4,1700000000.000000,512,644,dev42,{},{}",
            op, link, path
        )
    }

    fn command_line(cmd: &str) -> String {
        format!(
            "7,101,2,100,1700000000.000000,12,host1,,/usr/bin/cc,/src/obj,pc1,cc1,pathcode,{}",
            cmd
        )
    }

    #[test]
    fn test_operation_codes_round_trip() {
        for code in ['R', 'X', 'W', 'A', 'S', 'L', 'U', 'D', 'Q'] {
            assert_eq!(Operation::from_code(code).code(), code);
        }
        assert_eq!(Operation::from_code('Q'), Operation::Other('Q'));
    }

    #[test]
    fn test_parse_absolute_access() {
        let fa = FileAccess::parse(&access_line("R", "", "/usr/include/stdio.h"), "/src").unwrap();
        assert_eq!(fa.operation, Operation::Read);
        assert_eq!(fa.path, "/usr/include/stdio.h");
        assert_eq!(fa.device_code, "dev42");
        assert!(!fa.is_member);
        assert!(fa.secondary_path.is_none());
    }

    #[test]
    fn test_parse_member_access_joins_base() {
        let fa = FileAccess::parse(&access_line("W", "", "obj/out.o"), "/src").unwrap();
        assert!(fa.is_member);
        assert_eq!(fa.path, "/src/obj/out.o");
        assert_eq!(fa.relative_to("/src"), Some("obj/out.o"));
        assert_eq!(join_path("/src", fa.relative_to("/src").unwrap()), fa.path);
    }

    #[test]
    fn test_path_may_contain_commas() {
        let fa = FileAccess::parse(&access_line("R", "", "/src/a,b,c.txt"), "/src").unwrap();
        assert_eq!(fa.path, "/src/a,b,c.txt");
    }

    #[test]
    fn test_trailing_newline_stripped() {
        let line = access_line("R", "", "/src/a.c") + "\n";
        let fa = FileAccess::parse(&line, "/src").unwrap();
        assert_eq!(fa.path, "/src/a.c");
    }

    #[test]
    fn test_missing_path_field_is_malformed() {
        let err = FileAccess::parse("R,open,1700000000.0,101,2", "/src").unwrap_err();
        match err {
            TraceError::MalformedRecord { line, .. } => assert!(line.starts_with("R,open")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_path_is_malformed() {
        let err = FileAccess::parse(&access_line("R", "", ""), "/src").unwrap_err();
        assert!(matches!(err, TraceError::MalformedRecord { .. }));
    }

    #[test]
    fn test_multi_char_op_is_malformed() {
        let err = FileAccess::parse(&access_line("RW", "", "/a"), "/src").unwrap_err();
        assert!(matches!(err, TraceError::MalformedRecord { .. }));
    }

    #[test]
    fn test_symlink_target_relative_to_link_dir() {
        let line = access_line("S", "../lib/libz.so.1", "lib64/libz.so");
        let fa = FileAccess::parse(&line, "/src").unwrap();
        assert!(fa.is_symlink());
        assert_eq!(fa.path, "/src/lib64/libz.so");
        assert_eq!(fa.secondary_path.as_deref(), Some("/src/lib/libz.so.1"));
    }

    #[test]
    fn test_symlink_target_percent_decoded() {
        let fa = FileAccess::parse(&access_line("S", "odd%2Cname", "/src/link"), "/src").unwrap();
        assert_eq!(fa.secondary_path.as_deref(), Some("/src/odd,name"));
    }

    #[test]
    fn test_symlink_chain_keeps_intermediate_link() {
        // A -> B where B is itself a link to C: only B is recorded for A.
        let fa = FileAccess::parse(&access_line("S", "B", "/tmp/chain/A"), "/src").unwrap();
        assert_eq!(fa.secondary_path.as_deref(), Some("/tmp/chain/B"));
    }

    #[test]
    fn test_predicates() {
        let read = FileAccess::parse(&access_line("R", "", "/a"), "/").unwrap();
        let exec = FileAccess::parse(&access_line("X", "", "/bin/cc"), "/").unwrap();
        let unlink = FileAccess::parse(&access_line("U", "", "/a"), "/").unwrap();
        let mkdir = FileAccess::parse(&access_line("D", "", "/d"), "/").unwrap();
        let append = FileAccess::parse(&access_line("A", "", "/log"), "/").unwrap();

        assert!(read.is_prerequisite() && !read.is_target());
        assert!(exec.is_prerequisite() && !exec.is_target());
        assert!(unlink.is_unlink() && !unlink.is_target() && !unlink.is_prerequisite());
        assert!(mkdir.is_directory() && mkdir.is_target());
        assert!(append.is_append() && append.is_target());
    }

    #[test]
    fn test_parse_command_record() {
        let ca = CommandRecord::parse(&command_line("cc -c a.c -o out.o")).unwrap();
        assert_eq!(ca.program_path, "/usr/bin/cc");
        assert_eq!(ca.run_directory, "/src/obj");
        assert_eq!(ca.command_line, "cc -c a.c -o out.o");
    }

    #[test]
    fn test_command_text_keeps_commas() {
        let ca = CommandRecord::parse(&command_line("echo a,b,c > list")).unwrap();
        assert_eq!(ca.command_line, "echo a,b,c > list");
    }

    #[test]
    fn test_short_command_is_malformed() {
        let err = CommandRecord::parse("1,2,3,4").unwrap_err();
        assert!(matches!(err, TraceError::MalformedRecord { .. }));
    }

    #[test]
    fn test_command_dedups_by_operation_and_path() {
        let mut ca = CommandRecord::new("/bin/cc", "/src", "cc a.c");
        let read = FileAccess::parse(&access_line("R", "", "/src/a.c"), "/src").unwrap();
        let write = FileAccess::parse(&access_line("W", "", "/src/a.c"), "/src").unwrap();
        ca.add(read.clone());
        ca.add(read);
        ca.add(write);
        assert_eq!(ca.access_count(), 2);
        assert_eq!(ca.paths().len(), 1);
    }

    #[test]
    fn test_trace_record_dispatch() {
        let access = TraceRecord::parse(&access_line("R", "", "/a"), "/").unwrap();
        assert!(matches!(access, TraceRecord::Access(_)));
        let command = TraceRecord::parse(&command_line("true"), "/").unwrap();
        assert!(matches!(command, TraceRecord::Command(_)));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a/b/../c"), "/a/c");
        assert_eq!(normalize_path("/a/./b//c/"), "/a/b/c");
        assert_eq!(normalize_path("/../a"), "/a");
        assert_eq!(normalize_path("../a/../../b"), "../../b");
        assert_eq!(normalize_path("a/.."), ".");
        assert_eq!(normalize_path(""), ".");
    }

    #[test]
    fn test_display() {
        let fa = FileAccess::parse(&access_line("A", "", "/var/log/x"), "/").unwrap();
        assert_eq!(fa.to_string(), "A /var/log/x");
        let ca = CommandRecord::new("/bin/true", "/tmp", "true");
        assert_eq!(ca.to_string(), "[/tmp] true");
    }
}
