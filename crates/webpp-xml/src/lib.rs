//! Namespace-aware XML parsing for the webpp template engine.
//!
//! This crate wraps [`quick-xml`] to provide a small DOM suited to
//! template processing: every element and attribute carries its resolved
//! namespace URI, its source prefix and the line it starts on, and all
//! text (including whitespace) is preserved verbatim. Comments before and
//! after the root element are kept so a renderer can reproduce them.
//!
//! # Example
//!
//! ```rust
//! let doc = webpp_xml::parse_str(
//!     r#"<root xmlns="webpp://xml" xmlns:f="webpp://format">
//!   <a f:href="/users/#{user.name}"/>
//! </root>"#,
//! )
//! .unwrap();
//!
//! assert_eq!(doc.root.local_name, "root");
//! assert_eq!(doc.root.namespace.as_deref(), Some("webpp://xml"));
//!
//! let a = doc.root.child_elements().next().unwrap();
//! assert_eq!(a.attributes[0].namespace.as_deref(), Some("webpp://format"));
//! ```
//!
//! Entity substitution beyond the five predefined entities is not
//! performed, and no validation is attempted; templates are trusted
//! input.

pub mod error;
pub mod parser;
pub mod types;

pub use error::{Error, Result};
pub use parser::{parse_file, parse_str};
pub use types::{Attribute, Document, Element, Misc, Node, XML_NAMESPACE};
