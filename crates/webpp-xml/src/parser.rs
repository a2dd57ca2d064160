//! XML parser building [`Document`] trees with resolved namespaces.

use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::types::{Attribute, Document, Element, Misc, Node, XML_NAMESPACE};

/// Parse an XML document from a string.
///
/// # Example
///
/// ```rust
/// let doc = webpp_xml::parse_str("<root><child/></root>").unwrap();
/// assert_eq!(doc.root.local_name, "root");
/// ```
///
/// # Errors
///
/// Returns an error if the XML is malformed or uses an unbound
/// namespace prefix.
pub fn parse_str(content: &str) -> Result<Document> {
    let mut parser = XmlParser::new(content);
    parser.parse()
}

/// Parse an XML document from a file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_str(&content)
}

/// Internal parser state.
struct XmlParser<'a> {
    reader: Reader<&'a [u8]>,

    /// Byte offsets of line starts, for offset-to-line conversion.
    line_starts: Vec<usize>,

    /// Namespace declaration scopes, innermost last. Each entry maps a
    /// prefix (`None` for the default namespace) to a URI (`None` when
    /// the binding was unset with an empty declaration).
    scopes: Vec<Vec<(Option<String>, Option<String>)>>,

    /// Stack of elements being built.
    stack: Vec<BuildNode>,

    root: Option<Element>,
    leading: Vec<Misc>,
    trailing: Vec<Misc>,
}

struct BuildNode {
    local_name: String,
    prefix: Option<String>,
    namespace: Option<String>,
    attributes: Vec<Attribute>,
    line: u32,
    children: Vec<Node>,
}

impl<'a> XmlParser<'a> {
    fn new(source: &'a str) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }

        Self {
            reader,
            line_starts,
            scopes: Vec::new(),
            stack: Vec::new(),
            root: None,
            leading: Vec::new(),
            trailing: Vec::new(),
        }
    }

    fn line_of(&self, offset: usize) -> u32 {
        self.line_starts.partition_point(|&start| start <= offset) as u32
    }

    fn parse(&mut self) -> Result<Document> {
        loop {
            let event_start = self.reader.buffer_position() as usize;

            match self.reader.read_event() {
                Ok(Event::Start(e)) => self.handle_start(e, event_start)?,
                Ok(Event::End(e)) => {
                    let element = self.handle_end(e, event_start)?;
                    self.finish_element(element, event_start)?;
                }
                Ok(Event::Empty(e)) => {
                    let element = self.handle_empty(e, event_start)?;
                    self.finish_element(element, event_start)?;
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|err| Error::Syntax {
                        message: format!("invalid text content: {}", err),
                        position: event_start as u64,
                    })?;
                    self.handle_text(text.into_owned(), event_start)?;
                }
                Ok(Event::CData(e)) => {
                    let content = String::from_utf8_lossy(e.as_ref()).into_owned();
                    match self.stack.last_mut() {
                        Some(node) => node.children.push(Node::CData(content)),
                        None => {
                            return Err(Error::TextOutsideRoot {
                                line: self.line_of(event_start),
                            })
                        }
                    }
                }
                Ok(Event::Comment(e)) => {
                    let content = String::from_utf8_lossy(e.as_ref()).into_owned();
                    match self.stack.last_mut() {
                        Some(node) => node.children.push(Node::Comment(content)),
                        None if self.root.is_none() => self.leading.push(Misc::Comment(content)),
                        None => self.trailing.push(Misc::Comment(content)),
                    }
                }
                Ok(Event::Eof) => break,
                // XML declarations, doctype and processing instructions
                // have no meaning for templates.
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::Syntax {
                        message: e.to_string(),
                        position: self.reader.error_position(),
                    })
                }
            }
        }

        if let Some(node) = self.stack.last() {
            return Err(Error::UnexpectedEof {
                expected: format!("closing tag </{}>", node.local_name),
            });
        }

        let root = self.root.take().ok_or(Error::EmptyDocument)?;

        Ok(Document {
            leading: std::mem::take(&mut self.leading),
            root,
            trailing: std::mem::take(&mut self.trailing),
        })
    }

    fn finish_element(&mut self, element: Element, event_start: usize) -> Result<()> {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(Node::Element(element));
        } else if self.root.is_some() {
            return Err(Error::MultipleRoots {
                line: self.line_of(event_start),
            });
        } else {
            self.root = Some(element);
        }
        Ok(())
    }

    fn handle_start(&mut self, e: BytesStart<'_>, event_start: usize) -> Result<()> {
        let line = self.line_of(event_start);
        let (local_name, prefix, attributes) = self.open_scope(&e, line)?;
        let namespace = self.resolve(prefix.as_deref(), line)?;

        self.stack.push(BuildNode {
            local_name,
            prefix,
            namespace,
            attributes,
            line,
            children: Vec::new(),
        });

        Ok(())
    }

    fn handle_empty(&mut self, e: BytesStart<'_>, event_start: usize) -> Result<Element> {
        let line = self.line_of(event_start);
        let (local_name, prefix, attributes) = self.open_scope(&e, line)?;
        let namespace = self.resolve(prefix.as_deref(), line)?;
        self.scopes.pop();

        Ok(Element {
            local_name,
            prefix,
            namespace,
            attributes,
            children: Vec::new(),
            line,
        })
    }

    fn handle_end(&mut self, e: BytesEnd<'_>, event_start: usize) -> Result<Element> {
        let line = self.line_of(event_start);
        let full_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let (end_local, _) = split_name(&full_name);

        let node = self.stack.pop().ok_or(Error::UnexpectedEndTag {
            found: full_name.clone(),
            line,
        })?;

        if node.local_name != end_local {
            return Err(Error::MismatchedEndTag {
                expected: node.local_name,
                found: end_local.to_string(),
                line,
            });
        }

        self.scopes.pop();

        Ok(Element {
            local_name: node.local_name,
            prefix: node.prefix,
            namespace: node.namespace,
            attributes: node.attributes,
            children: node.children,
            line: node.line,
        })
    }

    fn handle_text(&mut self, text: String, event_start: usize) -> Result<()> {
        match self.stack.last_mut() {
            Some(node) => {
                node.children.push(Node::Text(text));
                Ok(())
            }
            // Whitespace around the root element carries no content.
            None if text.trim().is_empty() => Ok(()),
            None => Err(Error::TextOutsideRoot {
                line: self.line_of(event_start),
            }),
        }
    }

    /// Read the tag name and attributes, pushing a namespace scope for
    /// any `xmlns` declarations found on the tag.
    fn open_scope(
        &mut self,
        e: &BytesStart<'_>,
        line: u32,
    ) -> Result<(String, Option<String>, Vec<Attribute>)> {
        let full_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let (local_name, prefix) = split_name(&full_name);

        let mut scope = Vec::new();
        let mut raw_attributes = Vec::new();

        for attr in e.attributes() {
            let attr = attr.map_err(|err| Error::Syntax {
                message: format!("attribute error: {}", err),
                position: self.reader.buffer_position(),
            })?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| Error::Syntax {
                    message: format!("invalid attribute value: {}", err),
                    position: self.reader.buffer_position(),
                })?
                .into_owned();

            if key == "xmlns" {
                let uri = if value.is_empty() { None } else { Some(value) };
                scope.push((None, uri));
            } else if let Some(declared) = key.strip_prefix("xmlns:") {
                let uri = if value.is_empty() { None } else { Some(value) };
                scope.push((Some(declared.to_string()), uri));
            } else {
                raw_attributes.push((key, value));
            }
        }

        self.scopes.push(scope);

        let mut attributes = Vec::with_capacity(raw_attributes.len());
        for (key, value) in raw_attributes {
            let (attr_local, attr_prefix) = split_name(&key);
            // Attributes never take the default namespace.
            let namespace = match attr_prefix.as_deref() {
                Some(p) => self.resolve(Some(p), line)?,
                None => None,
            };
            attributes.push(Attribute {
                local_name: attr_local.to_string(),
                prefix: attr_prefix,
                namespace,
                value,
                line,
            });
        }

        Ok((local_name.to_string(), prefix, attributes))
    }

    fn resolve(&self, prefix: Option<&str>, line: u32) -> Result<Option<String>> {
        if prefix == Some("xml") {
            return Ok(Some(XML_NAMESPACE.to_string()));
        }

        for scope in self.scopes.iter().rev() {
            for (declared, uri) in scope.iter().rev() {
                if declared.as_deref() == prefix {
                    return Ok(uri.clone());
                }
            }
        }

        match prefix {
            Some(p) => Err(Error::UnboundPrefix {
                prefix: p.to_string(),
                line,
            }),
            None => Ok(None),
        }
    }
}

fn split_name(full: &str) -> (&str, Option<String>) {
    match full.find(':') {
        Some(pos) => (&full[pos + 1..], Some(full[..pos].to_string())),
        None => (full, None),
    }
}
