//! The render context: a root slot tree plus a prefix stack.
//!
//! Sub-view insertion pushes a prefix so that every lookup made while
//! rendering the inserted view is transparently namespaced under the
//! caller-chosen path.

use crate::error::Result;
use crate::tree::{ArrayBase, TreeElement};
use crate::value::Value;

/// Named values, lazy values and arrays consulted during rendering.
#[derive(Default)]
pub struct RenderContext {
    root: TreeElement,
    prefixes: Vec<String>,
    current_prefix: String,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The root slot, unaffected by the prefix stack.
    pub fn root(&self) -> &TreeElement {
        &self.root
    }

    /// Get the slot under `name`, with the joined prefix stack
    /// prepended. Missing slots are created.
    pub fn get(&self, name: &str) -> TreeElement {
        if self.current_prefix.is_empty() {
            self.root.find(name)
        } else {
            let mut key = String::with_capacity(self.current_prefix.len() + name.len());
            key.push_str(&self.current_prefix);
            key.push_str(name);
            self.root.find(&key)
        }
    }

    /// Store a value (copied) under `key`.
    pub fn create_value(&self, key: &str, value: impl Into<Value>) {
        self.get(key).create_value(value);
    }

    /// Store a lazily evaluated value under `key`. Captures must stay
    /// valid for the duration of rendering.
    pub fn create_lazy(&self, key: &str, thunk: impl Fn() -> Result<Value> + 'static) {
        self.get(key).create_lazy(thunk);
    }

    /// Store an array under `key`.
    pub fn create_array(&self, key: &str, array: impl ArrayBase + 'static) {
        self.get(key).create_array(array);
    }

    /// Link `key` to a foreign sub-tree. Ownership stays with the
    /// caller; the link is weak and replaces any previous link. The key
    /// addresses the root tree directly, bypassing the prefix stack.
    pub fn import_subtree(&self, key: &str, target: &TreeElement) {
        let slot = self.root.find(key);
        slot.remove_link();
        slot.create_link(target);
    }

    /// Link `key` to a freshly constructed sub-tree, which the slot
    /// takes ownership of. Bypasses the prefix stack.
    pub fn link_dynamic_subtree(&self, key: &str, subtree: TreeElement) {
        let slot = self.root.find(key);
        slot.remove_link();
        slot.create_permanent_link(subtree);
    }

    /// All lookups after this call prepend this (and previously pushed)
    /// prefixes, joined by `.`.
    pub fn push_prefix(&mut self, prefix: &str) {
        self.prefixes.push(prefix.to_string());
        if !prefix.is_empty() {
            self.current_prefix.push_str(prefix);
            self.current_prefix.push('.');
        }
    }

    /// Pop the most recently pushed prefix.
    pub fn pop_prefix(&mut self) {
        self.prefixes.pop();
        self.current_prefix.clear();
        for prefix in &self.prefixes {
            if !prefix.is_empty() {
                self.current_prefix.push_str(prefix);
                self.current_prefix.push('.');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Array;

    #[test]
    fn get_is_idempotent() {
        let ctx = RenderContext::new();
        ctx.get("a.b").create_value(1);
        assert_eq!(ctx.get("a.b").value_output().unwrap(), "1");
        assert_eq!(ctx.get("a.b").value_output().unwrap(), "1");
    }

    #[test]
    fn empty_key_is_the_root() {
        let ctx = RenderContext::new();
        ctx.get("").create_value(3);
        assert_eq!(ctx.root().value_output().unwrap(), "3");
    }

    #[test]
    fn prefixes_apply_to_lookups() {
        let mut ctx = RenderContext::new();
        ctx.create_value("p.n", 42);

        ctx.push_prefix("p");
        assert_eq!(ctx.get("n").value_output().unwrap(), "42");

        ctx.push_prefix("");
        assert_eq!(ctx.get("n").value_output().unwrap(), "42");

        ctx.pop_prefix();
        ctx.pop_prefix();
        assert!(ctx.get("n").empty());
    }

    #[test]
    fn nested_prefixes_join_with_dots() {
        let mut ctx = RenderContext::new();
        ctx.create_value("a.b.c", "x");

        ctx.push_prefix("a");
        ctx.push_prefix("b");
        assert_eq!(ctx.get("c").value_output().unwrap(), "x");
        ctx.pop_prefix();
        assert!(ctx.get("c").empty());
    }

    #[test]
    fn import_subtree_links_and_relinks() {
        let ctx = RenderContext::new();

        let mut array = Array::new();
        let first = array.add();
        first.find("name").create_value("asdf");
        let second = array.add();
        second.find("name").create_value("abuser");
        ctx.create_array("xs", array);

        ctx.import_subtree("x", &first);
        assert_eq!(ctx.get("x.name").value_output().unwrap(), "asdf");

        ctx.import_subtree("x", &second);
        assert_eq!(ctx.get("x.name").value_output().unwrap(), "abuser");
    }

    #[test]
    fn import_subtree_bypasses_prefix() {
        let mut ctx = RenderContext::new();
        let target = TreeElement::new();
        target.find("n").create_value(1);

        ctx.push_prefix("p");
        ctx.import_subtree("x", &target);
        ctx.pop_prefix();

        assert_eq!(ctx.get("x.n").value_output().unwrap(), "1");
    }

    #[test]
    fn link_dynamic_subtree_owns_target() {
        let ctx = RenderContext::new();
        {
            let subtree = TreeElement::new();
            subtree.find("k").create_value("v");
            ctx.link_dynamic_subtree("dyn", subtree);
        }
        assert_eq!(ctx.get("dyn.k").value_output().unwrap(), "v");
    }
}
