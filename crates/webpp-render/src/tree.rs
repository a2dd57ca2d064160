//! The render-context slot tree.
//!
//! A [`TreeElement`] is a cheaply clonable handle to one slot: an
//! optional value, an optional array of sub-trees, named children
//! (created lazily on lookup) and an optional link to another slot.
//! Links are weak so that loop variables rebinding the same name never
//! form ownership cycles; [`TreeElement::create_permanent_link`] keeps a
//! strong reference in addition, for injected sub-trees that must
//! outlive the link itself.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};
use crate::value::{Lazy, Value};

/// Iteration interface over an array of sub-trees.
///
/// The handle returned by [`next`](ArrayBase::next) is only guaranteed
/// to point at the current element until the next call; lazily generated
/// arrays may reuse a single element.
pub trait ArrayBase {
    fn reset(&mut self);
    fn has_next(&self) -> bool;
    fn next(&mut self) -> Option<TreeElement>;
    fn empty(&self) -> bool;
    fn size(&self) -> usize;
}

/// The default in-memory array: an ordered list of owned sub-trees.
#[derive(Default)]
pub struct Array {
    elements: Vec<TreeElement>,
    cursor: usize,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fresh empty element and return a handle to it.
    pub fn add(&mut self) -> TreeElement {
        let element = TreeElement::new();
        self.elements.push(element.clone());
        element
    }

    /// Append an existing element.
    pub fn push(&mut self, element: TreeElement) {
        self.elements.push(element);
    }
}

impl ArrayBase for Array {
    fn reset(&mut self) {
        self.cursor = 0;
    }

    fn has_next(&self) -> bool {
        self.cursor < self.elements.len()
    }

    fn next(&mut self) -> Option<TreeElement> {
        let element = self.elements.get(self.cursor).cloned();
        if element.is_some() {
            self.cursor += 1;
        }
        element
    }

    fn empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn size(&self) -> usize {
        self.elements.len()
    }
}

/// A handle to one slot in the context tree.
#[derive(Clone)]
pub struct TreeElement {
    inner: Rc<RefCell<Slot>>,
}

#[derive(Default)]
struct Slot {
    value: Option<Value>,
    array: Option<Box<dyn ArrayBase>>,
    children: HashMap<String, TreeElement>,
    link: Option<Weak<RefCell<Slot>>>,
    permalink: Option<TreeElement>,
}

impl Default for TreeElement {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeElement {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Slot::default())),
        }
    }

    /// Follow the chain of live links. A dead link falls back to the
    /// slot itself.
    fn resolve(&self) -> TreeElement {
        let start = Rc::clone(&self.inner);
        let mut current = Rc::clone(&self.inner);
        loop {
            let next = current
                .borrow()
                .link
                .as_ref()
                .and_then(Weak::upgrade)
                .filter(|target| !Rc::ptr_eq(target, &current) && !Rc::ptr_eq(target, &start));
            match next {
                Some(target) => current = target,
                None => return TreeElement { inner: current },
            }
        }
    }

    /// Find the slot under `key`, creating missing intermediate slots.
    ///
    /// The key splits on every `.`; empty segments (consecutive or
    /// trailing dots) name real, empty-keyed children, so `"a..b"` is a
    /// different slot from `"a.b"`. An empty key returns the receiver.
    pub fn find(&self, key: &str) -> TreeElement {
        if key.is_empty() {
            return self.clone();
        }

        let target = self.resolve();
        let (head, rest) = match key.find('.') {
            Some(position) => (&key[..position], Some(&key[position + 1..])),
            None => (key, None),
        };

        let child = target
            .inner
            .borrow_mut()
            .children
            .entry(head.to_string())
            .or_insert_with(TreeElement::new)
            .clone();

        match rest {
            Some(rest) => child.find(rest),
            None => child,
        }
    }

    pub fn is_value(&self) -> bool {
        self.resolve().inner.borrow().value.is_some()
    }

    pub fn is_array(&self) -> bool {
        self.resolve().inner.borrow().array.is_some()
    }

    pub fn empty(&self) -> bool {
        !self.is_value() && !self.is_array()
    }

    /// Store a value here, clearing any array.
    pub fn create_value(&self, value: impl Into<Value>) {
        let target = self.resolve();
        let mut slot = target.inner.borrow_mut();
        slot.value = Some(value.into());
        slot.array = None;
    }

    /// Store a lazily evaluated value here, clearing any array.
    pub fn create_lazy(&self, thunk: impl Fn() -> Result<Value> + 'static) {
        let target = self.resolve();
        let mut slot = target.inner.borrow_mut();
        slot.value = Some(Value::Lazy(Lazy::new(thunk)));
        slot.array = None;
    }

    /// Store an array here, clearing any value.
    pub fn create_array(&self, array: impl ArrayBase + 'static) {
        let target = self.resolve();
        let mut slot = target.inner.borrow_mut();
        slot.value = None;
        slot.array = Some(Box::new(array));
    }

    /// Remove the link on this slot. Acts on the slot itself, never on
    /// a link target.
    pub fn remove_link(&self) {
        self.inner.borrow_mut().link = None;
    }

    /// Make every operation on this slot act on `target` instead. The
    /// reference is weak; callers keep `target` alive.
    pub fn create_link(&self, target: &TreeElement) {
        self.inner.borrow_mut().link = Some(Rc::downgrade(&target.inner));
    }

    /// Like [`create_link`](Self::create_link), but also takes
    /// ownership of the target.
    pub fn create_permanent_link(&self, target: TreeElement) {
        let mut slot = self.inner.borrow_mut();
        slot.link = Some(Rc::downgrade(&target.inner));
        slot.permalink = Some(target);
    }

    /// Run `f` against the value stored here.
    pub fn with_value<R>(&self, f: impl FnOnce(&Value) -> Result<R>) -> Result<R> {
        let target = self.resolve();
        let slot = target.inner.borrow();
        match slot.value.as_ref() {
            Some(value) => f(value),
            None => Err(Error::new("no value in this node")),
        }
    }

    pub fn value_output(&self) -> Result<String> {
        self.with_value(|value| value.output())
    }

    pub fn value_format(&self, fmt: &str) -> Result<String> {
        self.with_value(|value| value.format(fmt))
    }

    pub fn value_is_true(&self) -> Result<bool> {
        self.with_value(|value| value.is_true())
    }

    /// Run `f` against the array stored here.
    pub fn with_array<R>(&self, f: impl FnOnce(&mut dyn ArrayBase) -> R) -> Result<R> {
        let target = self.resolve();
        let mut slot = target.inner.borrow_mut();
        match slot.array.as_mut() {
            Some(array) => Ok(f(array.as_mut())),
            None => Err(Error::new("no array in this node")),
        }
    }

    pub fn array_reset(&self) -> Result<()> {
        self.with_array(|array| array.reset())
    }

    pub fn array_has_next(&self) -> Result<bool> {
        self.with_array(|array| array.has_next())
    }

    pub fn array_next(&self) -> Result<Option<TreeElement>> {
        self.with_array(|array| array.next())
    }

    pub fn array_empty(&self) -> Result<bool> {
        self.with_array(|array| array.empty())
    }

    pub fn array_size(&self) -> Result<usize> {
        self.with_array(|array| array.size())
    }
}
