//! Tag and namespace handlers, and the built-in `basic` bundle.
//!
//! A [`Tag`] rewrites one destination element from one source element
//! and is responsible for its own children; the renderer does not
//! recurse into elements a tag handled. An [`Xmlns`] handles every tag
//! and attribute of one namespace URI. [`Basic`] registers the
//! `webpp://format` interpolation namespace and the
//! `webpp://basic:render` tag.

use std::collections::HashMap;

use webpp_xml::{Attribute, Element, Node};

use crate::context::RenderContext;
use crate::error::{Error, Result};
use crate::output::{NodeId, OutputDocument};
use crate::{NS_BASIC, NS_CONTROL, NS_FORMAT, NS_HTML5, NS_XML};

/// Handler for one custom XML tag.
pub trait Tag {
    /// Rewrite `dst` from `src`, reading values from `rnd`.
    fn render(
        &self,
        out: &mut OutputDocument,
        dst: NodeId,
        src: &Element,
        rnd: &mut RenderContext,
    ) -> Result<()>;
}

/// Handler for every tag and attribute in one namespace.
pub trait Xmlns {
    /// Process element `src` into `dst`.
    fn tag(
        &self,
        out: &mut OutputDocument,
        dst: NodeId,
        src: &Element,
        rnd: &mut RenderContext,
    ) -> Result<()>;

    /// Process attribute `src`, placing results inside `dst`.
    fn attribute(
        &self,
        out: &mut OutputDocument,
        dst: NodeId,
        src: &Attribute,
        rnd: &mut RenderContext,
    ) -> Result<()>;
}

pub type TagMap = HashMap<(String, String), Box<dyn Tag>>;
pub type XmlnsMap = HashMap<String, Box<dyn Xmlns>>;

/// A loadable bundle of handlers.
pub trait Taglib {
    fn process(tags: &mut TagMap, xmlnses: &mut XmlnsMap);
}

/// The built-in bundle: `webpp://format` and `webpp://basic:render`.
pub struct Basic;

impl Taglib for Basic {
    fn process(tags: &mut TagMap, xmlnses: &mut XmlnsMap) {
        tags.insert(
            (NS_BASIC.to_string(), "render".to_string()),
            Box::new(RenderTag),
        );
        xmlnses.insert(NS_FORMAT.to_string(), Box::new(FormatXmlns));
    }
}

/// Replace `#{path}` and `#{path|format}` tokens with context values.
pub(crate) fn interpolate(source: &str, rnd: &RenderContext) -> Result<String> {
    let mut result = String::new();
    let mut last = 0;

    while let Some(found) = source[last..].find("#{") {
        let start = last + found;
        result.push_str(&source[last..start]);

        let after = start + 2;
        let end = after
            + source[after..]
                .find('}')
                .ok_or_else(|| Error::new("#{ not terminated by }"))?;

        match source[after..end].find('|') {
            Some(offset) => {
                let pipe = after + offset;
                let variable = &source[after..pipe];
                let format = &source[pipe + 1..end];
                if format.is_empty() {
                    return Err(Error::new("empty format string"));
                }
                let slot = rnd.get(variable);
                if !slot.is_value() {
                    return Err(Error::new(format!(
                        "format: required variable '{}' not found in render context",
                        variable
                    )));
                }
                result.push_str(&slot.value_format(format)?);
            }
            None => {
                let variable = &source[after..end];
                let slot = rnd.get(variable);
                if !slot.is_value() {
                    return Err(Error::new(format!(
                        "output: required variable '{}' not found in render context",
                        variable
                    )));
                }
                result.push_str(&slot.value_output()?);
            }
        }

        last = end + 1;
    }

    result.push_str(&source[last..]);
    Ok(result)
}

/// The `webpp://format` namespace: interpolation in attribute values
/// and in the text content of format-namespaced elements.
pub struct FormatXmlns;

impl FormatXmlns {
    fn emit_child(
        &self,
        out: &mut OutputDocument,
        target: NodeId,
        child: &Node,
        rnd: &RenderContext,
    ) -> Result<()> {
        match child {
            Node::Text(text) => {
                let rendered = interpolate(text, rnd)?;
                out.add_text(target, &rendered);
            }
            Node::Comment(text) => {
                let rendered = interpolate(text, rnd)?;
                out.add_comment(target, &rendered);
            }
            Node::CData(text) => {
                let rendered = interpolate(text, rnd)?;
                out.add_cdata(target, &rendered);
            }
            Node::Element(_) => {
                return Err(Error::new(
                    "webpp://format rendered tag can contain only text, comment or cdata nodes",
                ))
            }
        }
        Ok(())
    }
}

impl Xmlns for FormatXmlns {
    fn tag(
        &self,
        out: &mut OutputDocument,
        dst: NodeId,
        src: &Element,
        rnd: &mut RenderContext,
    ) -> Result<()> {
        // <f:text> is transparent: its content lands in the parent.
        if src.local_name == "text" {
            let parent = out
                .parent(dst)
                .ok_or_else(|| Error::new("response resulted in empty document"))?;
            for child in &src.children {
                self.emit_child(out, parent, child, rnd)?;
            }
            out.remove(dst);
            return Ok(());
        }

        out.set_name(dst, &src.local_name);
        for attr in &src.attributes {
            match attr.namespace.as_deref() {
                None | Some(NS_XML) | Some(NS_HTML5) => {
                    out.set_attribute(dst, &attr.local_name, &attr.value)
                }
                Some(NS_FORMAT) => {
                    let rendered = interpolate(&attr.value, rnd)?;
                    out.set_attribute(dst, &attr.local_name, &rendered);
                }
                // control attributes were consumed by the walker
                Some(NS_CONTROL) => {}
                Some(other) => {
                    return Err(Error::new(format!("unknown attribute namespace {}", other)))
                }
            }
        }
        for child in &src.children {
            self.emit_child(out, dst, child, rnd)?;
        }
        Ok(())
    }

    fn attribute(
        &self,
        out: &mut OutputDocument,
        dst: NodeId,
        src: &Attribute,
        rnd: &mut RenderContext,
    ) -> Result<()> {
        let rendered = interpolate(&src.value, rnd)?;
        out.set_attribute(dst, &src.local_name, &rendered);
        Ok(())
    }
}

/// `<b:render value="…" [format="…"] [required="true|false"]
/// [default="…"]/>` — emits one context value as text into the parent
/// element.
pub struct RenderTag;

impl Tag for RenderTag {
    fn render(
        &self,
        out: &mut OutputDocument,
        dst: NodeId,
        src: &Element,
        rnd: &mut RenderContext,
    ) -> Result<()> {
        let value_name = src.attribute("value").ok_or_else(|| {
            Error::new(format!(
                "<render> at line {} requires value attribute",
                src.line
            ))
        })?;
        let format = src.attribute("format");
        let default = src.attribute("default").unwrap_or("");
        let required = match src.attribute("required") {
            None | Some("true") => true,
            Some("false") => false,
            Some(other) => {
                return Err(Error::new(format!(
                    "<render> at line {}: required=\"true|false\", not '{}'",
                    src.line, other
                )))
            }
        };

        let parent = out
            .parent(dst)
            .ok_or_else(|| Error::new("response resulted in empty document"))?;

        let slot = rnd.get(value_name);
        if slot.is_value() {
            let text = match format {
                Some(fmt) => slot.value_format(fmt)?,
                None => slot.value_output()?,
            };
            out.add_text(parent, &text);
        } else if !default.is_empty() {
            out.add_text(parent, default);
        } else if required {
            return Err(Error::new(format!(
                "<render> at line {} requires value '{}' in render context",
                src.line, value_name
            )));
        }

        out.remove(dst);
        Ok(())
    }
}
