//! Error types for XML parsing.

use thiserror::Error;

/// Result type alias for webpp-xml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing an XML document.
#[derive(Debug, Error)]
pub enum Error {
    /// Low-level syntax error reported by quick-xml.
    #[error("XML syntax error: {message} at byte {position}")]
    Syntax { message: String, position: u64 },

    /// The input ended before the document was complete.
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    /// A closing tag did not match the open element.
    #[error("Mismatched end tag: expected </{expected}>, found </{found}> at line {line}")]
    MismatchedEndTag {
        expected: String,
        found: String,
        line: u32,
    },

    /// A closing tag appeared with no element open.
    #[error("Unexpected closing tag </{found}> at line {line}")]
    UnexpectedEndTag { found: String, line: u32 },

    /// A namespace prefix was used without a matching xmlns declaration.
    #[error("Unbound namespace prefix '{prefix}' at line {line}")]
    UnboundPrefix { prefix: String, line: u32 },

    /// The document contains no root element.
    #[error("Empty XML document: no root element found")]
    EmptyDocument,

    /// More than one element at the top level.
    #[error("Invalid XML: multiple root elements at line {line}")]
    MultipleRoots { line: u32 },

    /// Non-whitespace text outside the root element.
    #[error("Invalid XML: text content outside the root element at line {line}")]
    TextOutsideRoot { line: u32 },

    /// The template file could not be read.
    #[error("Could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
