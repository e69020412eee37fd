use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::value::Value;

/// A lexical scope or an instance's field table: variable name to handle.
pub type Closure = HashMap<String, ObjectHandle>;

/// Reference-counted handle to a runtime value.
///
/// The empty handle stands for the language's `None` and is never
/// dereferenced; accessors return `Option` so callers decide how emptiness
/// behaves. `share` hands out another owner of the same allocation: it is
/// how `self` enters a method closure and how a freshly built instance is
/// returned. A program that stores `self` into one of its own fields
/// therefore builds a reference cycle and that instance is never freed; the
/// language offers no way to break such a cycle.
#[derive(Debug, Clone, Default)]
pub struct ObjectHandle {
    data: Option<Rc<RefCell<Value>>>,
}

impl ObjectHandle {
    /// The empty handle.
    pub fn none() -> Self {
        Self { data: None }
    }

    /// A new allocation holding `value`.
    pub fn own(value: Value) -> Self {
        Self {
            data: Some(Rc::new(RefCell::new(value))),
        }
    }

    /// Another handle to the same allocation.
    pub fn share(&self) -> Self {
        self.clone()
    }

    pub fn is_none(&self) -> bool {
        self.data.is_none()
    }

    pub fn get(&self) -> Option<Ref<'_, Value>> {
        self.data.as_ref().map(|cell| cell.borrow())
    }

    pub fn get_mut(&self) -> Option<RefMut<'_, Value>> {
        self.data.as_ref().map(|cell| cell.borrow_mut())
    }

    /// Truthiness of the held value; the empty handle is falsy.
    pub fn is_true(&self) -> bool {
        self.get().map(|value| value.is_truthy()).unwrap_or(false)
    }

    /// Whether both handles point at the same allocation. Two empty handles
    /// compare identical.
    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        match (&self.data, &other.data) {
            (Some(lhs), Some(rhs)) => Rc::ptr_eq(lhs, rhs),
            (None, None) => true,
            _ => false,
        }
    }

    pub(crate) fn address(&self) -> usize {
        self.data
            .as_ref()
            .map(|cell| Rc::as_ptr(cell) as usize)
            .unwrap_or(0)
    }
}
