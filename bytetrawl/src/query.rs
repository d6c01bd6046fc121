//! Models search queries and how they resolve to content bytes.

use crate::error::{Error, Result};

/// How the text of a query is encoded into content bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// The text bytes as-is.
    Utf8,
    /// UTF-16 code units, least significant byte first.
    Utf16Le,
    /// UTF-16 code units, most significant byte first.
    Utf16Be,
}

/// The pattern of a query.
#[derive(Debug, Clone)]
pub enum QueryPattern {
    /// Literal bytes.
    Bytes(Vec<u8>),
    /// Text searched as its encoded byte rendition.
    Text {
        /// The text to search for.
        text: String,
        /// The encoding interpreting the text as content bytes.
        encoding: TextEncoding,
    },
    /// Hex pairs, whitespace-tolerant; a pair containing `?` is a one-byte wildcard.
    Hex(String),
    /// A regular expression over the content bytes.
    Regex(String),
}

/// A search query.
///
/// Immutable once a session starts; compiled into a [`Matcher`](crate::matcher::Matcher)
/// before any scanning happens.
#[derive(Debug, Clone)]
pub struct Query {
    /// The pattern to search for.
    pub pattern: QueryPattern,
    /// Whether matching distinguishes case.
    pub case_sensitive: bool,
    /// Whether to also search the UTF-16 renditions of a textual pattern.
    pub include_utf16: bool,
}

impl Query {
    /// Creates a query for literal bytes.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Query {
        Query::of(QueryPattern::Bytes(bytes.into()))
    }

    /// Creates a query for encoded text.
    pub fn text(text: impl Into<String>, encoding: TextEncoding) -> Query {
        Query::of(QueryPattern::Text {
            text: text.into(),
            encoding,
        })
    }

    /// Creates a query for a hex pattern such as `"AB ?? CD"`.
    pub fn hex(pattern: impl Into<String>) -> Query {
        Query::of(QueryPattern::Hex(pattern.into()))
    }

    /// Creates a query for a regular expression.
    pub fn regex(pattern: impl Into<String>) -> Query {
        Query::of(QueryPattern::Regex(pattern.into()))
    }

    /// Makes the query match without regard to ASCII case.
    pub fn case_insensitive(mut self) -> Query {
        self.case_sensitive = false;
        self
    }

    /// Makes the query also search the UTF-16 renditions of a textual pattern.
    pub fn with_utf16_variants(mut self) -> Query {
        self.include_utf16 = true;
        self
    }

    /// Creates a case-sensitive query for the given pattern.
    fn of(pattern: QueryPattern) -> Query {
        Query {
            pattern,
            case_sensitive: true,
            include_utf16: false,
        }
    }

    /// Resolves a byte or text pattern to the literal needles searched in one pass.
    ///
    /// Returns `None` for patterns that are not plain needle searches (regular
    /// expressions and wildcarded hex patterns).
    pub(crate) fn literal_needles(&self) -> Result<Option<Vec<Vec<u8>>>> {
        let mut needles = match &self.pattern {
            QueryPattern::Bytes(bytes) => vec![bytes.clone()],
            QueryPattern::Text { text, encoding } => vec![encode_text(text, *encoding)],
            QueryPattern::Hex(_) | QueryPattern::Regex(_) => return Ok(None),
        };

        if needles[0].is_empty() {
            return Err(Error::EmptyQuery);
        }

        if self.include_utf16
            && let Some(text) = self.utf8_text()
        {
            needles.push(encode_text(text, TextEncoding::Utf16Le));
            needles.push(encode_text(text, TextEncoding::Utf16Be));
        }

        Ok(Some(needles))
    }

    /// The pattern as text, if it is textual and not already searched as UTF-16.
    fn utf8_text(&self) -> Option<&str> {
        match &self.pattern {
            QueryPattern::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            QueryPattern::Text {
                text,
                encoding: TextEncoding::Utf8,
            } => Some(text),
            _ => None,
        }
    }
}

/// Encodes the text into the byte rendition searched in the content.
pub(crate) fn encode_text(text: &str, encoding: TextEncoding) -> Vec<u8> {
    match encoding {
        TextEncoding::Utf8 => text.as_bytes().to_vec(),
        TextEncoding::Utf16Le => {
            let mut bytes = Vec::new();
            for code_unit in text.encode_utf16() {
                bytes.extend_from_slice(&code_unit.to_le_bytes());
            }
            bytes
        }
        TextEncoding::Utf16Be => {
            let mut bytes = Vec::new();
            for code_unit in text.encode_utf16() {
                bytes.extend_from_slice(&code_unit.to_be_bytes());
            }
            bytes
        }
    }
}

/// Parses a hex pattern into bytes, where `None` is a one-byte wildcard.
///
/// Whitespace is ignored; the remaining digits are consumed in pairs. A pair
/// containing `?` (or the `..` placeholder) is a wildcard.
pub(crate) fn parse_hex_pattern(pattern: &str) -> Result<Vec<Option<u8>>> {
    let compact: String = pattern.chars().filter(|c| !c.is_whitespace()).collect();

    if compact.is_empty() {
        return Err(Error::EmptyQuery);
    }
    if !compact.len().is_multiple_of(2) {
        return Err(Error::InvalidPattern(format!(
            "hex pattern has an odd number of digits: {pattern:?}"
        )));
    }

    let mut bytes = Vec::with_capacity(compact.len() / 2);
    let digits = compact.as_bytes();
    for pair in digits.chunks_exact(2) {
        if pair.contains(&b'?') || pair == b".." {
            bytes.push(None);
        } else {
            let pair = std::str::from_utf8(pair).map_err(|_| {
                Error::InvalidPattern(format!("invalid characters in hex pattern: {pattern:?}"))
            })?;
            let value = u8::from_str_radix(pair, 16).map_err(|_| {
                Error::InvalidPattern(format!("invalid hex pair {pair:?} in pattern: {pattern:?}"))
            })?;
            bytes.push(Some(value));
        }
    }

    Ok(bytes)
}
