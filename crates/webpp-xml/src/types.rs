//! Core types for namespace-aware XML documents.

/// The built-in namespace bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A parsed XML document.
///
/// Comments that appear before or after the root element are kept in
/// source order; the rendering engine copies them into its output.
#[derive(Debug, Clone)]
pub struct Document {
    /// Miscellaneous nodes (comments) preceding the root element.
    pub leading: Vec<Misc>,

    /// The root element.
    pub root: Element,

    /// Miscellaneous nodes (comments) following the root element.
    pub trailing: Vec<Misc>,
}

/// A node outside the root element.
#[derive(Debug, Clone)]
pub enum Misc {
    /// A comment, without the `<!--`/`-->` delimiters.
    Comment(String),
}

/// An XML element with resolved namespace and line number.
#[derive(Debug, Clone)]
pub struct Element {
    /// Local name, without any prefix.
    pub local_name: String,

    /// Namespace prefix as written in the source, if any.
    pub prefix: Option<String>,

    /// Resolved namespace URI. `None` when no namespace is in scope.
    pub namespace: Option<String>,

    /// Attributes in source order. `xmlns` declarations are consumed
    /// during parsing and do not appear here.
    pub attributes: Vec<Attribute>,

    /// Child nodes in source order, text and whitespace preserved.
    pub children: Vec<Node>,

    /// 1-based line of the element's start tag.
    pub line: u32,
}

/// An attribute with resolved namespace.
///
/// Attributes without a prefix never receive the default namespace;
/// their `namespace` is always `None`.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Local name, without any prefix.
    pub local_name: String,

    /// Namespace prefix as written in the source, if any.
    pub prefix: Option<String>,

    /// Resolved namespace URI.
    pub namespace: Option<String>,

    /// Unescaped attribute value.
    pub value: String,

    /// 1-based line of the owning start tag.
    pub line: u32,
}

/// A child node of an element.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    CData(String),
}

impl Document {
    /// Create a document with no surrounding comments.
    pub fn new(root: Element) -> Self {
        Self {
            leading: Vec::new(),
            root,
            trailing: Vec::new(),
        }
    }
}

impl Element {
    /// Get the value of an attribute with no namespace.
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Get the value of an attribute in a specific namespace.
    pub fn attribute_ns(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Iterate over element children, skipping text and comments.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Concatenated text content of direct text and CDATA children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Text(t) | Node::CData(t) => out.push_str(t),
                _ => {}
            }
        }
        out
    }
}
