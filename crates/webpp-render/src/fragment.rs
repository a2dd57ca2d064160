//! Named fragments and the store that owns them.
//!
//! A [`Fragment`] is an immutable parsed XML document. The [`Context`]
//! loads fragments lazily from a library directory (or from memory),
//! applies any registered stylesheet hooks, and owns the tag and
//! namespace handler registries consulted during rendering.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;
use webpp_xml::Document;

use crate::error::{Error, Result, ResultExt};
use crate::renderer::PreparedFragment;
use crate::taglib::{Tag, TagMap, Taglib, Xmlns, XmlnsMap};

/// A stylesheet application hook.
///
/// The engine does not process XSLT itself; callers provide the
/// transformation. Returning `None` signals that the stylesheet could
/// not be applied.
pub trait Stylesheet {
    fn apply(&self, document: &Document) -> Option<Document>;
}

/// Loader turning a stylesheet file into an application hook,
/// configured once at engine construction.
pub type XsltLoader = Box<dyn Fn(&Path) -> Result<Rc<dyn Stylesheet>>>;

/// A named, immutable parsed XML document.
pub struct Fragment {
    name: String,
    document: Document,
}

impl Fragment {
    fn from_file(name: &str, path: &Path, stylesheets: &[Rc<dyn Stylesheet>]) -> Result<Self> {
        let result = webpp_xml::parse_file(path)
            .map_err(Error::from)
            .and_then(|document| apply_stylesheets(document, stylesheets))
            .map(|document| Self {
                name: name.to_string(),
                document,
            });
        result.frame(|| format!("parsing file '{}'", path.display()))
    }

    fn from_buffer(name: &str, data: &str, stylesheets: &[Rc<dyn Stylesheet>]) -> Result<Self> {
        let result = webpp_xml::parse_str(data)
            .map_err(Error::from)
            .and_then(|document| apply_stylesheets(document, stylesheets))
            .map(|document| Self {
                name: name.to_string(),
                document,
            });
        result.frame(|| format!("parsing memory buffer named '{}'", name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The post-transform document used as rendering input.
    pub fn document(&self) -> &Document {
        &self.document
    }
}

fn apply_stylesheets(
    mut document: Document,
    stylesheets: &[Rc<dyn Stylesheet>],
) -> Result<Document> {
    for stylesheet in stylesheets {
        document = stylesheet
            .apply(&document)
            .ok_or_else(|| Error::new("Could not apply XSL stylesheet"))?;
    }
    Ok(document)
}

/// Container for fragments plus the tag and namespace registries.
///
/// Registration methods take `&mut self`; during rendering the tables
/// are read-only. Fragment loading is lazy, so `load`/`put`/`get` work
/// through interior mutability.
pub struct Context {
    library_directory: PathBuf,
    fragments: RefCell<HashMap<String, Rc<Fragment>>>,
    tags: TagMap,
    xmlnses: XmlnsMap,
    stylesheets: Vec<Rc<dyn Stylesheet>>,
    xslt_loader: Option<XsltLoader>,
}

impl Context {
    /// Create a context with `library_directory` as the root for
    /// fragment files.
    pub fn new(library_directory: impl Into<PathBuf>) -> Self {
        Self {
            library_directory: library_directory.into(),
            fragments: RefCell::new(HashMap::new()),
            tags: TagMap::new(),
            xmlnses: XmlnsMap::new(),
            stylesheets: Vec::new(),
            xslt_loader: None,
        }
    }

    /// Configure the XSLT hook loader. Must be called before
    /// [`attach_xslt`](Self::attach_xslt); configure it once at engine
    /// init.
    pub fn set_xslt_loader(&mut self, loader: XsltLoader) {
        self.xslt_loader = Some(loader);
    }

    /// Queue `<library>/<name>.xsl` as a pre-processor for fragments
    /// loaded after this call.
    pub fn attach_xslt(&mut self, name: &str) -> Result<()> {
        let result = (|| {
            let loader = self
                .xslt_loader
                .as_ref()
                .ok_or_else(|| Error::new("no XSLT engine configured"))?;
            let path = self.library_directory.join(format!("{}.xsl", name));
            let stylesheet = loader(&path)?;
            self.stylesheets.push(stylesheet);
            Ok(())
        })();
        result.frame(|| format!("attaching stylesheet {}", name))
    }

    /// Queue an already-built stylesheet hook.
    pub fn attach_stylesheet(&mut self, stylesheet: Rc<dyn Stylesheet>) {
        self.stylesheets.push(stylesheet);
    }

    /// Load fragment `name` from `<library>/<name>.xml`.
    pub fn load(&self, name: &str) -> Result<()> {
        let result = (|| {
            let path = self.library_directory.join(format!("{}.xml", name));
            debug!(fragment = name, path = %path.display(), "loading fragment");
            let fragment = Fragment::from_file(name, &path, &self.stylesheets)?;
            self.fragments
                .borrow_mut()
                .insert(name.to_string(), Rc::new(fragment));
            Ok(())
        })();
        result.frame(|| format!("loading file {}", name))
    }

    /// Register fragment `name` from an in-memory string, replacing any
    /// previous fragment of that name.
    pub fn put(&self, name: &str, data: &str) -> Result<()> {
        let result = (|| {
            let fragment = Fragment::from_buffer(name, data, &self.stylesheets)?;
            self.fragments
                .borrow_mut()
                .insert(name.to_string(), Rc::new(fragment));
            Ok(())
        })();
        result.frame(|| format!("loading memory buffer {}", name))
    }

    /// Find fragment `name`, loading it from the library when missing.
    pub fn get(&self, name: &str) -> Result<PreparedFragment<'_>> {
        let result = (|| {
            if !self.fragments.borrow().contains_key(name) {
                self.load(name)?;
            }
            let fragment = self
                .fragments
                .borrow()
                .get(name)
                .cloned()
                .ok_or_else(|| Error::new(format!("required fragment '{}' not found", name)))?;
            Ok(PreparedFragment::new(fragment, self))
        })();
        result.frame(|| format!("fragment name {}", name))
    }

    /// Register every handler of a tag library bundle.
    pub fn load_taglib<T: Taglib>(&mut self) {
        T::process(&mut self.tags, &mut self.xmlnses);
    }

    /// Register a tag handler under `(namespace, name)`.
    pub fn register_tag(&mut self, namespace: &str, name: &str, tag: Box<dyn Tag>) {
        self.tags
            .insert((namespace.to_string(), name.to_string()), tag);
    }

    /// Register a namespace handler for every name in `namespace`.
    pub fn register_xmlns(&mut self, namespace: &str, handler: Box<dyn Xmlns>) {
        self.xmlnses.insert(namespace.to_string(), handler);
    }

    pub fn find_tag(&self, namespace: &str, name: &str) -> Option<&dyn Tag> {
        self.tags
            .get(&(namespace.to_string(), name.to_string()))
            .map(Box::as_ref)
    }

    pub fn find_xmlns(&self, namespace: &str) -> Option<&dyn Xmlns> {
        self.xmlnses.get(namespace).map(Box::as_ref)
    }
}
