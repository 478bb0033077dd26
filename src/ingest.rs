//! Trace ingestion
//!
//! Groups a stream of trace lines into [`CommandRecord`]s. Each file-access
//! line belongs to the most recent command line before it.

use crate::error::{Result, TraceError};
use crate::trace_record::{CommandRecord, TraceRecord};
use std::io::BufRead;

/// Incremental grouper for trace lines
#[derive(Debug, Clone)]
pub struct TraceIngest {
    base_dir: String,
    commands: Vec<CommandRecord>,
    lines_seen: usize,
}

impl TraceIngest {
    pub fn new(base_dir: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            commands: Vec::new(),
            lines_seen: 0,
        }
    }

    /// Feed one trace line. Blank lines and `#` comments are ignored.
    pub fn feed(&mut self, line: &str) -> Result<()> {
        self.lines_seen += 1;
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.trim().is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }

        match TraceRecord::parse(trimmed, &self.base_dir)? {
            TraceRecord::Command(cmd) => {
                tracing::debug!(line = self.lines_seen, command = %cmd, "command");
                self.commands.push(cmd);
            }
            TraceRecord::Access(access) => {
                let Some(current) = self.commands.last_mut() else {
                    return Err(TraceError::OrphanAccess {
                        line: trimmed.to_string(),
                    });
                };
                current.add(access);
            }
        }
        Ok(())
    }

    /// Number of commands grouped so far
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn finish(self) -> Vec<CommandRecord> {
        tracing::debug!(
            lines = self.lines_seen,
            commands = self.commands.len(),
            "trace ingested"
        );
        self.commands
    }
}

/// Read and group a whole trace
pub fn read_trace<R: BufRead>(reader: R, base_dir: &str) -> Result<Vec<CommandRecord>> {
    let mut ingest = TraceIngest::new(base_dir);
    for line in reader.lines() {
        ingest.feed(&line?)?;
    }
    Ok(ingest.finish())
}

/// Group an in-memory trace
pub fn parse_trace(text: &str, base_dir: &str) -> Result<Vec<CommandRecord>> {
    let mut ingest = TraceIngest::new(base_dir);
    for line in text.lines() {
        ingest.feed(line)?;
    }
    Ok(ingest.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace_record::Operation;
    use std::io::Cursor;

    fn access(op: char, path: &str) -> String {
        format!(
            "{},open,1700000000.000000,101,2,100,101,pc1,cc1,f,ext4,1700000000.000000,512,644,dev42,,{}",
            op, path
        )
    }

    fn command(cmd: &str) -> String {
        format!(
            "7,101,2,100,1700000000.000000,12,host1,,/usr/bin/cc,/src,pc1,cc1,pathcode,{}",
            cmd
        )
    }

    #[test]
    fn test_accesses_attach_to_latest_command() {
        let trace = [
            command("cc -c a.c"),
            access('R', "a.c"),
            access('W', "a.o"),
            command("ar rc lib.a a.o"),
            access('R', "a.o"),
            access('W', "lib.a"),
        ]
        .join("\n");

        let commands = parse_trace(&trace, "/src").unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].command_line, "cc -c a.c");
        assert_eq!(commands[0].access_count(), 2);
        assert!(commands[1].paths().contains("/src/lib.a"));
    }

    #[test]
    fn test_duplicate_accesses_collapse() {
        let trace = [command("cat a"), access('R', "/src/a"), access('R', "/src/a")].join("\n");
        let commands = parse_trace(&trace, "/src").unwrap();
        assert_eq!(commands[0].access_count(), 1);
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let trace = format!("# header\n\n{}\n   \n{}\n", command("true"), access('X', "/bin/true"));
        let commands = parse_trace(&trace, "/src").unwrap();
        assert_eq!(commands.len(), 1);
        let ops: Vec<Operation> = commands[0].accesses().map(|a| a.operation).collect();
        assert_eq!(ops, vec![Operation::Exec]);
    }

    #[test]
    fn test_orphan_access_is_error() {
        let err = parse_trace(&access('R', "/src/a"), "/src").unwrap_err();
        assert!(matches!(err, TraceError::OrphanAccess { .. }));
    }

    #[test]
    fn test_malformed_line_propagates() {
        let trace = format!("{}\nR,open,short", command("true"));
        let err = parse_trace(&trace, "/src").unwrap_err();
        assert!(matches!(err, TraceError::MalformedRecord { .. }));
    }

    #[test]
    fn test_read_trace_from_reader() {
        let trace = format!("{}\r\n{}\r\n", command("touch x"), access('W', "x"));
        let commands = read_trace(Cursor::new(trace), "/work").unwrap();
        assert_eq!(commands.len(), 1);
        let paths: Vec<&str> = commands[0].paths().into_iter().collect();
        assert_eq!(paths, vec!["/work/x"]);
    }

    #[test]
    fn test_incremental_feed() {
        let mut ingest = TraceIngest::new("/src");
        ingest.feed(&command("true")).unwrap();
        ingest.feed(&command("false")).unwrap();
        assert_eq!(ingest.command_count(), 2);
        assert_eq!(ingest.finish().len(), 2);
    }
}
