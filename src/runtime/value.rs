use std::rc::Rc;

use crate::runtime::class;
use crate::runtime::class::{Class, ClassInstance};
use crate::runtime::context::Context;
use crate::runtime::error::RuntimeError;
use crate::runtime::object::ObjectHandle;

const STR_METHOD: &str = "__str__";

/// Runtime values. Numbers are 32-bit signed integers; strings are immutable
/// byte sequences carried through from the lexer untouched.
#[derive(Debug)]
pub enum Value {
    Number(i32),
    String(String),
    Bool(bool),
    Instance(ClassInstance),
    Class(Rc<Class>),
    None,
}

impl Value {
    /// Non-zero numbers, non-empty strings and `True` are truthy; every
    /// other value is falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(flag) => *flag,
            Value::Number(number) => *number != 0,
            Value::String(text) => !text.is_empty(),
            _ => false,
        }
    }
}

/// Renders the held value the way `print` shows it. An instance whose class
/// answers `__str__` with no arguments delegates to it; any other instance
/// renders as an opaque identity marker. The empty handle renders as `None`.
pub fn render(handle: &ObjectHandle, context: &mut dyn Context) -> Result<String, RuntimeError> {
    let has_str_method = matches!(
        handle.get().as_deref(),
        Some(Value::Instance(instance)) if instance.has_method(STR_METHOD, 0)
    );
    if has_str_method {
        let result = class::call_method(handle, STR_METHOD, &[], context)?;
        return render(&result, context);
    }

    let Some(value) = handle.get() else {
        return Ok("None".to_string());
    };
    let text = match &*value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::None => "None".to_string(),
        Value::Class(class) => format!("Class {}", class.name()),
        Value::Instance(instance) => {
            format!("<{} object at {:#x}>", instance.class_name(), handle.address())
        }
    };
    Ok(text)
}
