//! Shared, read-only parsing context.

/// Formats and switches shared by every reader of a pipeline.
///
/// The context never carries per-row state, so one instance is shared
/// across rows and sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsingContext {
    pub date_format: String,
    /// Tried in order when no column format is given.
    pub datetime_formats: Vec<String>,
    /// Time-of-day pattern; `%.f` also accepts whole seconds.
    pub time_format: String,
    /// Trim surrounding whitespace before parsing non-text kinds.
    pub trim_numbers: bool,
}

impl Default for ParsingContext {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            datetime_formats: vec![
                "%Y-%m-%dT%H:%M:%S%.f".to_string(),
                "%Y-%m-%d %H:%M:%S%.f".to_string(),
            ],
            time_format: "%H:%M:%S%.f".to_string(),
            trim_numbers: true,
        }
    }
}

impl ParsingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format used when writing timestamps without a column format.
    pub fn datetime_output_format(&self) -> &str {
        self.datetime_formats
            .first()
            .map_or("%Y-%m-%dT%H:%M:%S%.f", String::as_str)
    }
}
