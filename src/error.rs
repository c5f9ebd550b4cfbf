//! Pipeline error type shared by all input and output plugins.
//!
//! `PipeError` is the one error that crosses a component boundary: a
//! dispatcher distinguishes a clean end of input from a real I/O failure.
//! Everything else (parse failures, send errors) is handled locally by the
//! component that hit it.

/// Error returned by plugin `read` and `write` operations.
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    /// The input is exhausted; the dispatcher for it terminates cleanly.
    #[error("end of input")]
    Eof,

    /// I/O failure on the underlying file or socket.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The peer side of an internal channel went away.
    #[error("channel disconnected")]
    Disconnected,
}

impl PipeError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            PipeError::Eof => "Eof",
            PipeError::Io(_) => "Io",
            PipeError::Disconnected => "Disconnected",
        }
    }

    /// True for the clean end-of-input case.
    pub fn is_eof(&self) -> bool {
        matches!(self, PipeError::Eof)
    }
}
