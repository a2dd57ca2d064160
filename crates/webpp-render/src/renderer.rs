//! The render walker.
//!
//! [`PreparedFragment`] binds a fragment to the store it came from plus
//! a table of per-id sub-view insertions, and walks the source tree
//! depth-first: control attributes decide visibility and repetition,
//! pass-through elements are copied, custom tags dispatch to handlers,
//! and `webpp://control:insert` splices other fragments in. Every
//! failure on the way out is decorated with the node it crossed.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;
use webpp_xml::{Element, Misc, Node};

use crate::context::RenderContext;
use crate::error::{Error, Result, ResultExt};
use crate::expr;
use crate::fragment::{Context, Fragment};
use crate::output::{FragmentOutput, NodeId, OutputDocument};
use crate::{NS_CONTROL, NS_HTML5, NS_XML, XHTML_NAMESPACE};

/// A caller-supplied binding from a DOM id to a sub-fragment.
#[derive(Debug, Clone)]
struct ViewInsertion {
    view_name: String,
    value_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repeat {
    None,
    Inner,
    Outer,
}

/// A renderable fragment with its view-insertion table.
pub struct PreparedFragment<'ctx> {
    fragment: Rc<Fragment>,
    context: &'ctx Context,
    view_insertions: BTreeMap<String, ViewInsertion>,
}

impl<'ctx> std::fmt::Debug for PreparedFragment<'ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedFragment")
            .field("view_insertions", &self.view_insertions)
            .finish()
    }
}

impl<'ctx> PreparedFragment<'ctx> {
    pub(crate) fn new(fragment: Rc<Fragment>, context: &'ctx Context) -> Self {
        Self {
            fragment,
            context,
            view_insertions: BTreeMap::new(),
        }
    }

    /// Insert view `view_name` at the element with `id="id"`, scoping
    /// its context lookups under `value_prefix`.
    pub fn insert(&mut self, id: &str, view_name: &str, value_prefix: &str) -> &mut Self {
        self.view_insertions.insert(
            id.to_string(),
            ViewInsertion {
                view_name: view_name.to_string(),
                value_prefix: value_prefix.to_string(),
            },
        );
        self
    }

    pub fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    /// Render this fragment against `rnd`, producing a new document.
    pub fn render(&self, rnd: &mut RenderContext) -> Result<FragmentOutput> {
        let result = (|| {
            debug!(fragment = self.fragment.name(), "rendering fragment");
            let document = self.fragment.document();
            let mut out = OutputDocument::new();

            for misc in &document.leading {
                let Misc::Comment(text) = misc;
                out.add_leading_comment(text);
            }
            for misc in &document.trailing {
                let Misc::Comment(text) = misc;
                out.add_trailing_comment(text);
            }

            let dst = out.create_root(&document.root.local_name);
            self.process_node(&document.root, &mut out, dst, rnd, false, true)?;

            Ok(FragmentOutput::from_document(self.fragment.name(), out))
        })();
        result.frame(|| format!("fragment '{}'", self.fragment.name()))
    }

    fn process_node(
        &self,
        src: &Element,
        out: &mut OutputDocument,
        dst: NodeId,
        rnd: &mut RenderContext,
        outer_active: bool,
        src_is_root: bool,
    ) -> Result<()> {
        let result = self.process_node_inner(src, out, dst, rnd, outer_active, src_is_root);
        result.frame(|| {
            format!(
                "node {}:{} at line {}",
                src.namespace.as_deref().unwrap_or(""),
                src.local_name,
                src.line
            )
        })
    }

    fn process_node_inner(
        &self,
        src: &Element,
        out: &mut OutputDocument,
        dst: NodeId,
        rnd: &mut RenderContext,
        outer_active: bool,
        src_is_root: bool,
    ) -> Result<()> {
        let mut repeat = Repeat::None;
        let mut repeat_array = String::new();
        let mut repeat_variable = String::new();
        let mut visible = true;

        for attr in &src.attributes {
            if attr.namespace.as_deref() != Some(NS_CONTROL) {
                continue;
            }
            match attr.local_name.as_str() {
                "repeat" => {
                    repeat = match attr.value.as_str() {
                        "inner" => Repeat::Inner,
                        "outer" => Repeat::Outer,
                        other => {
                            return Err(Error::new(format!(
                                "repeat must be one of (inner,outer), not '{}' in line '{}', tag '{}'",
                                other, src.line, src.local_name
                            )))
                        }
                    }
                }
                "repeat-array" => repeat_array = attr.value.clone(),
                "repeat-variable" => repeat_variable = attr.value.clone(),
                "if-exists" => visible &= !rnd.get(&attr.value).empty(),
                "if-not-exists" => visible &= rnd.get(&attr.value).empty(),
                "if-true" | "if-not-true" => {
                    let slot = rnd.get(&attr.value);
                    if slot.empty() {
                        return Err(Error::new(format!(
                            "variable '{}' required from <{}> at line {}, attribute {}, is missing",
                            attr.value, src.local_name, src.line, attr.local_name
                        )));
                    }
                    let truth = slot.value_is_true()?;
                    visible &= if attr.local_name == "if-true" {
                        truth
                    } else {
                        !truth
                    };
                }
                "visible-if" => visible &= expr::evaluate(&attr.value, rnd)?,
                other => {
                    return Err(Error::new(format!(
                        "webpp://control atribute {} is not implemented",
                        other
                    )))
                }
            }
        }

        // the caller is already iterating this element
        if outer_active && repeat == Repeat::Outer {
            repeat = Repeat::None;
        }

        if !visible {
            if !out.remove(dst) {
                return Err(Error::new("response resulted in empty document"));
            }
            return Ok(());
        }

        if repeat == Repeat::Outer {
            return self.process_outer_repeat(
                src,
                out,
                dst,
                rnd,
                src_is_root,
                &repeat_variable,
                &repeat_array,
            );
        }

        let insertion = src
            .attribute("id")
            .and_then(|id| self.view_insertions.get(id))
            .cloned();

        let namespace = src.namespace.as_deref().unwrap_or("");
        let passthrough =
            namespace == NS_HTML5 || namespace == NS_XML || !namespace.starts_with("webpp://");

        let mut handled_children = false;
        if insertion.is_none() && passthrough {
            if namespace == NS_HTML5 {
                out.declare_namespace(None, XHTML_NAMESPACE);
            } else if namespace != NS_XML && !namespace.is_empty() {
                out.declare_namespace(src.prefix.as_deref(), namespace);
                out.set_prefix(dst, src.prefix.as_deref());
            }

            for attr in &src.attributes {
                match attr.namespace.as_deref() {
                    // XML never applies the default namespace to
                    // attributes; copy them verbatim.
                    None => out.set_attribute(dst, &attr.local_name, &attr.value),
                    Some(NS_CONTROL) => {}
                    Some(other) => {
                        let handler = self.context.find_xmlns(other).ok_or_else(|| {
                            Error::new(format!("unknown attribute namespace {}", other))
                        })?;
                        handler.attribute(out, dst, attr, rnd)?;
                    }
                }
            }
        } else {
            // custom tags and inserted views handle their own children
            handled_children = true;
            if namespace == NS_CONTROL && src.local_name == "insert" {
                self.process_insert(src, out, dst, rnd)?;
            } else if let Some(insertion) = insertion {
                rnd.push_prefix(&insertion.value_prefix);
                let mut sub = self.context.get(&insertion.view_name)?;
                sub.view_insertions = self.view_insertions.clone();
                sub.process_node(&sub.fragment.document().root, out, dst, rnd, false, true)?;
                if let Some(id) = src.attribute("id") {
                    out.set_attribute(dst, "id", id);
                }
                rnd.pop_prefix();
            } else if namespace == NS_CONTROL {
                return Err(Error::new(format!(
                    "unknown webpp://control tag: {}",
                    src.local_name
                )));
            } else {
                match self.context.find_tag(namespace, &src.local_name) {
                    Some(tag) => tag.render(out, dst, src, rnd)?,
                    None => {
                        let handler = self.context.find_xmlns(namespace).ok_or_else(|| {
                            Error::new(format!(
                                "required custom tag {} in ns {} (or namespace handler) not found",
                                src.local_name, namespace
                            ))
                        })?;
                        handler.tag(out, dst, src, rnd)?;
                    }
                }
            }
        }

        match repeat {
            Repeat::None => {
                if !handled_children {
                    self.process_children(src, out, dst, rnd)?;
                }
            }
            _ => {
                if repeat_variable.is_empty() || repeat_array.is_empty() {
                    return Err(Error::new(
                        "repeat attribute set, but repeat_variable or repeat_array is not set",
                    ));
                }
                let slot = rnd.get(&repeat_array);
                slot.array_reset()?;
                while let Some(element) = slot.array_next()? {
                    rnd.import_subtree(&repeat_variable, &element);
                    self.process_children(src, out, dst, rnd)?;
                }
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_outer_repeat(
        &self,
        src: &Element,
        out: &mut OutputDocument,
        dst: NodeId,
        rnd: &mut RenderContext,
        src_is_root: bool,
        repeat_variable: &str,
        repeat_array: &str,
    ) -> Result<()> {
        if src_is_root {
            return Err(Error::new("outer repeat on root element is not possible"));
        }
        if repeat_variable.is_empty() || repeat_array.is_empty() {
            return Err(Error::new(
                "repeat attribute set, but repeat_variable or repeat_array is not set",
            ));
        }

        let slot = rnd.get(repeat_array);
        if slot.array_empty()? {
            out.remove(dst);
            return Ok(());
        }

        let mut current = dst;
        slot.array_reset()?;
        while let Some(element) = slot.array_next()? {
            rnd.import_subtree(repeat_variable, &element);
            self.process_node(src, out, current, rnd, true, false)?;
            if slot.array_has_next()? {
                let parent = out
                    .parent(current)
                    .ok_or_else(|| Error::new("outer repeat on root element is not possible"))?;
                current = out.add_element(parent, &src.local_name);
            }
        }
        Ok(())
    }

    fn process_insert(
        &self,
        src: &Element,
        out: &mut OutputDocument,
        dst: NodeId,
        rnd: &mut RenderContext,
    ) -> Result<()> {
        let view = src.attribute("name").ok_or_else(|| {
            Error::new("webpp://control:insert requires attribute name (inserted view name)")
        })?;
        let prefix = src.attribute("value-prefix").ok_or_else(|| {
            Error::new(
                "webpp://control:insert requires attribute value-prefix (prefix for render context variables)",
            )
        })?;

        rnd.push_prefix(prefix);
        let sub = self.context.get(view)?;
        sub.process_node(&sub.fragment.document().root, out, dst, rnd, false, true)?;
        rnd.pop_prefix();
        Ok(())
    }

    fn process_children(
        &self,
        src: &Element,
        out: &mut OutputDocument,
        dst: NodeId,
        rnd: &mut RenderContext,
    ) -> Result<()> {
        for child in &src.children {
            match child {
                Node::Element(element) => {
                    let child_dst = out.add_element(dst, &element.local_name);
                    self.process_node(element, out, child_dst, rnd, false, false)?;
                }
                Node::Text(text) => out.add_text(dst, text),
                Node::Comment(text) => out.add_comment(dst, text),
                Node::CData(text) => out.add_cdata(dst, text),
            }
        }
        Ok(())
    }
}
