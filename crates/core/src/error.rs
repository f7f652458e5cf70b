/// Result alias that carries the custom [`MetronomeError`] type.
pub type Result<T> = std::result::Result<T, MetronomeError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MetronomeError {
    /// A slot index, player count or player id fell outside its valid bounds.
    /// This is always a caller bug and is never clamped away internally.
    #[error("{what} {value} is out of range [{min}, {max}]")]
    OutOfRange {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    /// Wrapper around standard IO errors raised while exporting or importing.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed CSV input. `line` is 1-based and counts the header.
    #[error("line {line}: {reason}")]
    Format { line: usize, reason: String },
    /// Configuration or preset file that could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// State that could not be rendered as JSON.
    #[error("failed to serialize: {0}")]
    Serialize(String),
}

impl MetronomeError {
    pub(crate) fn out_of_range(what: &'static str, value: i64, min: i64, max: i64) -> Self {
        Self::OutOfRange {
            what,
            value,
            min,
            max,
        }
    }

    pub(crate) fn format<T: Into<String>>(line: usize, reason: T) -> Self {
        Self::Format {
            line,
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that indicate a programming mistake rather
    /// than a runtime condition the editor should report and survive.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfRange { .. })
    }
}

/// Parse failures of configuration and preset files.
impl From<serde_json::Error> for MetronomeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}
