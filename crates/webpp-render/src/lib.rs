//! XML template rendering engine.
//!
//! Templates are XML documents in which `webpp://`-namespaced tags,
//! attributes and namespaces carry directives: variable interpolation,
//! conditional visibility, array repetition and sub-view insertion.
//! Rendering evaluates those directives against a [`RenderContext`] of
//! named values, lazy values and arrays of sub-trees, and produces a
//! new XML (or XHTML5) document.
//!
//! # Example
//!
//! ```rust
//! use webpp_render::{Basic, Context, RenderContext};
//!
//! let mut ctx = Context::new(".");
//! ctx.load_taglib::<Basic>();
//! ctx.put(
//!     "greeting",
//!     r#"<root xmlns="webpp://xml" xmlns:f="webpp://format"><f:b>hello #{user.name}</f:b></root>"#,
//! )
//! .unwrap();
//!
//! let mut rnd = RenderContext::new();
//! rnd.create_value("user.name", "asdf");
//!
//! let output = ctx.get("greeting").unwrap().render(&mut rnd).unwrap();
//! assert_eq!(
//!     output.to_string(),
//!     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root><b>hello asdf</b></root>\n"
//! );
//! ```
//!
//! Directive vocabulary lives in four reserved namespaces:
//!
//! | URI | Meaning |
//! |-----|---------|
//! | `webpp://xml` | pass-through, no output namespace |
//! | `webpp://html5` | pass-through, retargeted to XHTML |
//! | `webpp://control` | `repeat`, `visible-if`, …, and the `insert` tag |
//! | `webpp://format` | `#{path}` / `#{path\|fmt}` interpolation |
//!
//! Every failure surfaces as a single stacked [`Error`] whose frames
//! record the fragment, node and attribute the failure crossed.

pub mod context;
pub mod error;
pub mod expr;
pub mod fragment;
pub mod output;
pub mod renderer;
pub mod taglib;
pub mod tree;
pub mod value;
pub mod values;

/// Pass-through namespace with no output namespace.
pub const NS_XML: &str = "webpp://xml";
/// Pass-through namespace retargeted to XHTML.
pub const NS_HTML5: &str = "webpp://html5";
/// Directive attributes and the `insert` tag.
pub const NS_CONTROL: &str = "webpp://control";
/// Interpolation tag/attribute namespace.
pub const NS_FORMAT: &str = "webpp://format";
/// The built-in tag bundle namespace.
pub const NS_BASIC: &str = "webpp://basic";
/// The XHTML namespace declared on `webpp://html5` output roots.
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

pub use context::RenderContext;
pub use error::{Error, Frame, Result, ResultExt};
pub use fragment::{Context, Fragment, Stylesheet, XsltLoader};
pub use output::{FragmentOutput, NodeId, OutputDocument, Xhtml5};
pub use renderer::PreparedFragment;
pub use taglib::{Basic, Tag, TagMap, Taglib, Xmlns, XmlnsMap};
pub use tree::{Array, ArrayBase, TreeElement};
pub use value::{Lazy, Value};
pub use values::load_render_values;
