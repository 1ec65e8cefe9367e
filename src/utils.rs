use std::io::{self, Write};
use thiserror::Error;

/// Custom error types for the grammar generator
#[derive(Error, Debug)]
pub enum GrammarError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Grammar validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Start production not found: {0}")]
    StartSymbolNotFound(String),

    #[error("Bad range: {0}")]
    InvalidRange(String),

    #[error("Bad expression: {0}")]
    MalformedExpression(String),

    #[error("Recursion limit exceeded at depth {0}")]
    RecursionLimitExceeded(usize),

    #[error("Output write failed after {written} bytes: {source}")]
    SinkWrite {
        written: u64,
        #[source]
        source: io::Error,
    },

    #[error("Generation aborted after {written} bytes of output: {source}")]
    Partial {
        written: u64,
        #[source]
        source: Box<GrammarError>,
    },
}

impl GrammarError {
    /// The underlying cause, looking through `Partial`.
    pub fn root(&self) -> &GrammarError {
        match self {
            GrammarError::Partial { source, .. } => source.root(),
            other => other,
        }
    }

    /// Number of bytes that reached the sink before the failure.
    pub fn bytes_written(&self) -> u64 {
        match self {
            GrammarError::Partial { written, .. } | GrammarError::SinkWrite { written, .. } => {
                *written
            }
            _ => 0,
        }
    }

    /// Wrap an error raised mid-traversal once output has been written.
    pub(crate) fn after_output(self, written: u64) -> Self {
        match self {
            err @ (GrammarError::Partial { .. } | GrammarError::SinkWrite { .. }) => err,
            err if written == 0 => err,
            err => GrammarError::Partial {
                written,
                source: Box::new(err),
            },
        }
    }
}

/// Result type for grammar operations
pub type Result<T> = std::result::Result<T, GrammarError>;

/// Write-through sink wrapper that remembers how much output went out.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        CountingWriter { inner, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Write a whole string, mapping failures to `SinkWrite`.
    ///
    /// Every chunk the sink accepts is counted, so the byte count in the
    /// error includes a partially written string.
    pub fn emit(&mut self, s: &str) -> Result<()> {
        let mut buf = s.as_bytes();
        while !buf.is_empty() {
            match self.inner.write(buf) {
                Ok(0) => {
                    return Err(self.sink_error(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    )));
                }
                Ok(n) => {
                    self.written += n as u64;
                    buf = &buf[n..];
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(self.sink_error(err)),
            }
        }
        Ok(())
    }

    pub fn emit_char(&mut self, ch: char) -> Result<()> {
        let mut buf = [0u8; 4];
        self.emit(ch.encode_utf8(&mut buf))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(|source| self.sink_error(source))
    }

    fn sink_error(&self, source: io::Error) -> GrammarError {
        GrammarError::SinkWrite {
            written: self.written,
            source,
        }
    }
}

/// Trait extension for Option<T> to convert to GrammarError
pub trait OptionExt<T> {
    fn ok_or_malformed<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_malformed<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.ok_or_else(|| GrammarError::MalformedExpression(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink {
        budget: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.len() > self.budget {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
            }
            self.budget -= buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_counting_writer_tracks_bytes() {
        let mut out = CountingWriter::new(Vec::new());
        out.emit("abc").unwrap();
        out.emit_char('é').unwrap();
        assert_eq!(out.written(), 5);
    }

    #[test]
    fn test_sink_failure_reports_written_bytes() {
        let mut out = CountingWriter::new(FailingSink { budget: 4 });
        out.emit("abc").unwrap();
        let err = out.emit("def").unwrap_err();
        match err {
            GrammarError::SinkWrite { written, .. } => assert_eq!(written, 3),
            other => panic!("Expected SinkWrite, got {:?}", other),
        }
    }

    /// Accepts bytes up to its budget, then fails.
    struct ShortSink {
        accepted: Vec<u8>,
        budget: usize,
    }

    impl Write for ShortSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
            }
            let n = buf.len().min(self.budget);
            self.accepted.extend_from_slice(&buf[..n]);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_partial_write_is_counted() {
        let mut out = CountingWriter::new(ShortSink {
            accepted: Vec::new(),
            budget: 4,
        });
        let err = out.emit("abcdef").unwrap_err();
        assert_eq!(err.bytes_written(), 4);
        assert_eq!(out.written(), 4);
        assert_eq!(out.inner.accepted, b"abcd");
    }

    #[test]
    fn test_after_output_wraps_only_when_output_exists() {
        let err = GrammarError::InvalidRange("x".into()).after_output(0);
        assert!(matches!(err, GrammarError::InvalidRange(_)));

        let err = GrammarError::InvalidRange("x".into()).after_output(7);
        assert_eq!(err.bytes_written(), 7);
        assert!(matches!(err.root(), GrammarError::InvalidRange(_)));
    }

    #[test]
    fn test_option_ext() {
        let missing: Option<u8> = None;
        let err = missing.ok_or_malformed(|| "nothing here".into()).unwrap_err();
        assert!(format!("{}", err).contains("nothing here"));
    }
}
