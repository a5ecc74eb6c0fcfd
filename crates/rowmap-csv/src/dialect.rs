//! CSV dialect options.

use csv::{QuoteStyle, Terminator};
use serde::{Deserialize, Serialize};

use crate::error::{CsvError, Result};

/// Separator, quoting and header options shared by reader and writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvDialect {
    pub separator: char,
    pub quote: char,
    /// Quote every written cell.
    pub always_escape: bool,
    pub line_terminator: String,
    /// First line holds column names when reading; written when writing.
    pub has_headers: bool,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            separator: ',',
            quote: '"',
            always_escape: false,
            line_terminator: "\n".to_string(),
            has_headers: true,
        }
    }
}

impl CsvDialect {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    #[must_use]
    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    #[must_use]
    pub fn with_always_escape(mut self, always_escape: bool) -> Self {
        self.always_escape = always_escape;
        self
    }

    #[must_use]
    pub fn with_line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = terminator.into();
        self
    }

    #[must_use]
    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    /// Separator as the single byte the tokenizer needs.
    pub fn separator_byte(&self) -> Result<u8> {
        ascii_byte("separator", self.separator)
    }

    pub fn quote_byte(&self) -> Result<u8> {
        ascii_byte("quote", self.quote)
    }

    pub fn quote_style(&self) -> QuoteStyle {
        if self.always_escape {
            QuoteStyle::Always
        } else {
            QuoteStyle::Necessary
        }
    }

    /// Line terminator for writing: `\r\n` or one ASCII byte.
    pub fn terminator(&self) -> Result<Terminator> {
        match self.line_terminator.as_str() {
            "\r\n" => Ok(Terminator::CRLF),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => ascii_byte("line terminator", c).map(Terminator::Any),
                    _ => Err(CsvError::InvalidDialect(format!(
                        "line terminator {other:?} must be \\r\\n or a single character"
                    ))),
                }
            }
        }
    }
}

fn ascii_byte(what: &str, c: char) -> Result<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| CsvError::InvalidDialect(format!("{what} {c:?} is not an ASCII character")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_ascii_separators_are_rejected() {
        assert_eq!(CsvDialect::default().separator_byte().unwrap(), b',');
        assert_eq!(CsvDialect::new().with_separator(';').separator_byte().unwrap(), b';');
        assert!(matches!(
            CsvDialect::new().with_separator('§').separator_byte(),
            Err(CsvError::InvalidDialect(_))
        ));
    }

    #[test]
    fn terminators_map_onto_the_tokenizer() {
        assert!(matches!(CsvDialect::default().terminator(), Ok(Terminator::Any(b'\n'))));
        assert!(matches!(
            CsvDialect::new().with_line_terminator("\r\n").terminator(),
            Ok(Terminator::CRLF)
        ));
        assert!(matches!(
            CsvDialect::new().with_line_terminator("||").terminator(),
            Err(CsvError::InvalidDialect(_))
        ));
    }

    #[test]
    fn dialect_deserializes_with_defaults() {
        let dialect: CsvDialect = serde_json::from_str(r#"{"separator": "\t"}"#).unwrap();
        assert_eq!(dialect.separator, '\t');
        assert!(dialect.has_headers);
        assert_eq!(dialect.line_terminator, "\n");
    }
}
