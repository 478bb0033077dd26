//! Error types for trace interpretation and makefile generation

use thiserror::Error;

/// Errors raised while turning a trace into a makefile
#[derive(Error, Debug)]
pub enum TraceError {
    /// A trace line is too short or has an unparseable shape
    #[error("Malformed trace record ({reason}): {line}")]
    MalformedRecord { line: String, reason: String },

    /// A file-access line appeared before any command line
    #[error("File access recorded before any command: {line}")]
    OrphanAccess { line: String },

    /// The shell used to strip a `sh -c` wrapper failed or misbehaved
    #[error("Failed to normalize recipe '{line}' via `{attempted}`: {reason}")]
    ShellNormalization {
        line: String,
        attempted: String,
        reason: String,
    },

    /// Unknown make assignment operator
    #[error("Invalid make assignment operator: {0}")]
    InvalidAssignment(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TraceError {
    pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
        TraceError::MalformedRecord {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for tracemake operations
pub type Result<T> = std::result::Result<T, TraceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_record_message_carries_line() {
        let err = TraceError::malformed("R,open", "missing path field");
        let msg = err.to_string();
        assert!(msg.contains("R,open"));
        assert!(msg.contains("missing path field"));
    }

    #[test]
    fn test_shell_normalization_message() {
        let err = TraceError::ShellNormalization {
            line: "/bin/sh -c 'if'".to_string(),
            attempted: "/bin/sh -nv -c if".to_string(),
            reason: "exit status 2".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/bin/sh -c 'if'"));
        assert!(msg.contains("exit status 2"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TraceError = io.into();
        assert!(matches!(err, TraceError::Io(_)));
    }
}
