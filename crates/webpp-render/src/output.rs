//! The output document and its post-processing.
//!
//! Rendering builds an [`OutputDocument`], a small arena tree that
//! supports the mutations the walker needs: renaming a destination
//! element, removing an invisible one, appending repeated siblings.
//! [`FragmentOutput`] wraps the finished document and applies the
//! XHTML5 output fixes before serialisation.

use std::fmt;

use quick_xml::escape::{escape, partial_escape};

/// XHTML5 post-processing flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Xhtml5(u32);

bitflags::bitflags! {
    impl Xhtml5: u32 {
        /// Add the `<!DOCTYPE html>` internal subset.
        const DOCTYPE = 1;
        /// Strip the `<?xml …?>` declaration on serialisation.
        const REMOVE_XML_DECLARATION = 2;
        /// Recursively remove every comment node.
        const REMOVE_COMMENTS = 4;
    }
}

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Identifies a node inside an [`OutputDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

/// A mutable XML tree under construction.
#[derive(Debug)]
pub struct OutputDocument {
    nodes: Vec<OutputNode>,
    root: Option<NodeId>,
    /// Comments serialised before the root element.
    leading: Vec<String>,
    /// Comments serialised after the root element.
    trailing: Vec<String>,
    /// Namespace declarations emitted on the root element, in
    /// declaration order. The prefix is `None` for the default
    /// namespace.
    root_declarations: Vec<(Option<String>, String)>,
    internal_subset: Option<String>,
}

#[derive(Debug)]
struct OutputNode {
    parent: Option<NodeId>,
    kind: OutputKind,
}

#[derive(Debug)]
enum OutputKind {
    Element {
        name: String,
        prefix: Option<String>,
        attributes: Vec<(String, String)>,
        children: Vec<NodeId>,
    },
    Text(String),
    Comment(String),
    CData(String),
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDocument {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            leading: Vec::new(),
            trailing: Vec::new(),
            root_declarations: Vec::new(),
            internal_subset: None,
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Create the root element. Any previous root is replaced.
    pub fn create_root(&mut self, name: &str) -> NodeId {
        let id = self.push(None, OutputKind::element(name));
        self.root = Some(id);
        id
    }

    /// Append a child element and return its id.
    pub fn add_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.push(Some(parent), OutputKind::element(name));
        self.attach(parent, id);
        id
    }

    pub fn add_text(&mut self, parent: NodeId, text: &str) {
        let id = self.push(Some(parent), OutputKind::Text(text.to_string()));
        self.attach(parent, id);
    }

    pub fn add_comment(&mut self, parent: NodeId, text: &str) {
        let id = self.push(Some(parent), OutputKind::Comment(text.to_string()));
        self.attach(parent, id);
    }

    pub fn add_cdata(&mut self, parent: NodeId, text: &str) {
        let id = self.push(Some(parent), OutputKind::CData(text.to_string()));
        self.attach(parent, id);
    }

    pub fn add_leading_comment(&mut self, text: &str) {
        self.leading.push(text.to_string());
    }

    pub fn add_trailing_comment(&mut self, text: &str) {
        self.trailing.push(text.to_string());
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Detach `id` from its parent. Returns `false` when the node has
    /// no parent (it is the root).
    pub fn remove(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.nodes[id.0].parent else {
            return false;
        };
        if let OutputKind::Element { children, .. } = &mut self.nodes[parent.0].kind {
            children.retain(|&child| child != id);
        }
        self.nodes[id.0].parent = None;
        true
    }

    pub fn set_name(&mut self, id: NodeId, new_name: &str) {
        if let OutputKind::Element { name, .. } = &mut self.nodes[id.0].kind {
            *name = new_name.to_string();
        }
    }

    pub fn set_prefix(&mut self, id: NodeId, new_prefix: Option<&str>) {
        if let OutputKind::Element { prefix, .. } = &mut self.nodes[id.0].kind {
            *prefix = new_prefix.map(str::to_string);
        }
    }

    /// Set an attribute, replacing any previous value in place.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let OutputKind::Element { attributes, .. } = &mut self.nodes[id.0].kind {
            if let Some(entry) = attributes.iter_mut().find(|(k, _)| k == name) {
                entry.1 = value.to_string();
            } else {
                attributes.push((name.to_string(), value.to_string()));
            }
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            OutputKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Declare a namespace on the root element. A later declaration for
    /// the same prefix replaces the earlier URI.
    pub fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str) {
        match self
            .root_declarations
            .iter_mut()
            .find(|(p, _)| p.as_deref() == prefix)
        {
            Some(entry) => entry.1 = uri.to_string(),
            None => self
                .root_declarations
                .push((prefix.map(str::to_string), uri.to_string())),
        }
    }

    pub fn set_internal_subset(&mut self, name: &str) {
        self.internal_subset = Some(name.to_string());
    }

    /// Recursively delete every comment node, including the pre- and
    /// post-root ones.
    pub fn remove_comments(&mut self) {
        self.leading.clear();
        self.trailing.clear();
        if let Some(root) = self.root {
            self.remove_comments_below(root);
        }
    }

    fn remove_comments_below(&mut self, id: NodeId) {
        let child_ids: Vec<NodeId> = match &self.nodes[id.0].kind {
            OutputKind::Element { children, .. } => children.clone(),
            _ => return,
        };
        for child in child_ids {
            if matches!(self.nodes[child.0].kind, OutputKind::Comment(_)) {
                self.remove(child);
            } else {
                self.remove_comments_below(child);
            }
        }
    }

    /// Serialise as UTF-8 XML with declaration.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str(XML_DECLARATION);
        if let Some(subset) = &self.internal_subset {
            out.push_str("<!DOCTYPE ");
            out.push_str(subset);
            out.push_str(">\n");
        }
        for comment in &self.leading {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->\n");
        }
        if let Some(root) = self.root {
            self.write_node(root, &mut out);
            out.push('\n');
        }
        for comment in &self.trailing {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->\n");
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            OutputKind::Element {
                name,
                prefix,
                attributes,
                children,
            } => {
                out.push('<');
                let qualified = match prefix {
                    Some(p) => format!("{}:{}", p, name),
                    None => name.clone(),
                };
                out.push_str(&qualified);
                if Some(id) == self.root {
                    for (declared_prefix, uri) in &self.root_declarations {
                        match declared_prefix {
                            Some(p) => {
                                out.push_str(&format!(" xmlns:{}=\"{}\"", p, escape(uri.as_str())))
                            }
                            None => out.push_str(&format!(" xmlns=\"{}\"", escape(uri.as_str()))),
                        }
                    }
                }
                for (key, value) in attributes {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape(value.as_str()));
                    out.push('"');
                }
                if children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for &child in children {
                        self.write_node(child, out);
                    }
                    out.push_str("</");
                    out.push_str(&qualified);
                    out.push('>');
                }
            }
            OutputKind::Text(text) => out.push_str(&partial_escape(text.as_str())),
            OutputKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            OutputKind::CData(text) => {
                out.push_str("<![CDATA[");
                out.push_str(text);
                out.push_str("]]>");
            }
        }
    }

    fn push(&mut self, parent: Option<NodeId>, kind: OutputKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(OutputNode { parent, kind });
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let OutputKind::Element { children, .. } = &mut self.nodes[parent.0].kind {
            children.push(child);
        }
    }
}

impl OutputKind {
    fn element(name: &str) -> Self {
        OutputKind::Element {
            name: name.to_string(),
            prefix: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// A rendered fragment, ready for output shaping and serialisation.
#[derive(Debug)]
pub struct FragmentOutput {
    name: String,
    document: OutputDocument,
    remove_xml_declaration: bool,
}

impl FragmentOutput {
    pub(crate) fn from_document(name: impl Into<String>, document: OutputDocument) -> Self {
        Self {
            name: name.into(),
            document,
            remove_xml_declaration: false,
        }
    }

    /// The fragment this output was rendered from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &OutputDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut OutputDocument {
        &mut self.document
    }

    /// The output is already valid XML; nothing to do.
    pub fn xml(&mut self) -> &mut Self {
        self
    }

    /// Apply XHTML5 output fixes.
    pub fn xhtml5(&mut self, flags: Xhtml5) -> &mut Self {
        if flags.contains(Xhtml5::DOCTYPE) {
            self.document.set_internal_subset("html");
        }
        if flags.contains(Xhtml5::REMOVE_XML_DECLARATION) {
            self.remove_xml_declaration = true;
        }
        if flags.contains(Xhtml5::REMOVE_COMMENTS) {
            self.document.remove_comments();
        }
        self
    }
}

impl fmt::Display for FragmentOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let serialized = self.document.to_xml();
        if self.remove_xml_declaration {
            f.write_str(serialized.strip_prefix(XML_DECLARATION).unwrap_or(&serialized))
        } else {
            f.write_str(&serialized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_root_serializes_self_closing() {
        let mut doc = OutputDocument::new();
        doc.create_root("rootnode");
        assert_eq!(
            doc.to_xml(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rootnode/>\n"
        );
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let mut doc = OutputDocument::new();
        let root = doc.create_root("r");
        let b = doc.add_element(root, "b");
        doc.add_text(b, "abuser<>");
        doc.set_attribute(b, "title", "a\"b");

        assert_eq!(
            doc.to_xml(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<r><b title=\"a&quot;b\">abuser&lt;&gt;</b></r>\n"
        );
    }

    #[test]
    fn comments_and_cdata_round_trip() {
        let mut doc = OutputDocument::new();
        let root = doc.create_root("r");
        doc.add_comment(root, " note ");
        doc.add_cdata(root, "1 < 2");
        assert_eq!(
            doc.to_xml(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<r><!-- note --><![CDATA[1 < 2]]></r>\n"
        );
    }

    #[test]
    fn removing_a_child_detaches_it() {
        let mut doc = OutputDocument::new();
        let root = doc.create_root("r");
        let child = doc.add_element(root, "gone");
        assert!(doc.remove(child));
        assert_eq!(
            doc.to_xml(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<r/>\n"
        );
    }

    #[test]
    fn removing_the_root_is_refused() {
        let mut doc = OutputDocument::new();
        let root = doc.create_root("r");
        assert!(!doc.remove(root));
    }

    #[test]
    fn namespace_declarations_appear_on_root() {
        let mut doc = OutputDocument::new();
        let root = doc.create_root("html");
        doc.declare_namespace(None, "http://www.w3.org/1999/xhtml");
        doc.declare_namespace(Some("o"), "uri:other");
        let child = doc.add_element(root, "span");
        doc.set_prefix(child, Some("o"));

        assert_eq!(
            doc.to_xml(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:o=\"uri:other\"><o:span/></html>\n"
        );
    }

    #[test]
    fn set_attribute_replaces_in_place() {
        let mut doc = OutputDocument::new();
        let root = doc.create_root("r");
        doc.set_attribute(root, "a", "1");
        doc.set_attribute(root, "b", "2");
        doc.set_attribute(root, "a", "3");
        assert_eq!(
            doc.to_xml(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<r a=\"3\" b=\"2\"/>\n"
        );
    }

    #[test]
    fn xhtml5_doctype_and_declaration_stripping() {
        let mut doc = OutputDocument::new();
        doc.create_root("html");
        let mut output = FragmentOutput::from_document("page", doc);
        output.xhtml5(Xhtml5::DOCTYPE | Xhtml5::REMOVE_XML_DECLARATION);

        assert_eq!(output.to_string(), "<!DOCTYPE html>\n<html/>\n");
    }

    #[test]
    fn xhtml5_comment_stripping_reaches_every_depth() {
        let mut doc = OutputDocument::new();
        let root = doc.create_root("html");
        doc.add_leading_comment(" pre ");
        doc.add_trailing_comment(" post ");
        doc.add_comment(root, " top ");
        let div = doc.add_element(root, "div");
        doc.add_comment(div, " deep ");
        doc.add_text(div, "keep");

        let mut output = FragmentOutput::from_document("page", doc);
        output.xhtml5(Xhtml5::REMOVE_COMMENTS);

        assert_eq!(
            output.to_string(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<html><div>keep</div></html>\n"
        );
    }

    #[test]
    fn surrounding_comments_serialize_in_order() {
        let mut doc = OutputDocument::new();
        doc.create_root("r");
        doc.add_leading_comment(" first ");
        doc.add_trailing_comment(" last ");
        assert_eq!(
            doc.to_xml(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- first -->\n<r/>\n<!-- last -->\n"
        );
    }
}
