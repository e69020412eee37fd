use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::{ExecFlow, Statement};
use crate::runtime::context::Context;
use crate::runtime::error::RuntimeError;
use crate::runtime::object::{Closure, ObjectHandle};
use crate::runtime::value::Value;

/// A named method: formal parameter list plus the statement the parser
/// built for its body (wrapped in `Statement::MethodBody` so `return`
/// stops there). `formal_params` excludes the receiver; `self` is bound
/// implicitly on every call, and arity counts explicit arguments only.
pub struct Method {
    pub name: String,
    pub formal_params: Vec<String>,
    pub body: Statement,
}

/// A user-defined class. The method table is fixed at construction; lookup
/// falls back along the single-inheritance parent chain.
pub struct Class {
    name: String,
    methods: Vec<Method>,
    index: HashMap<String, usize>,
    parent: Option<Rc<Class>>,
}

impl Class {
    pub fn new(name: String, methods: Vec<Method>, parent: Option<Rc<Class>>) -> Self {
        let index = methods
            .iter()
            .enumerate()
            .map(|(position, method)| (method.name.clone(), position))
            .collect();
        Self {
            name,
            methods,
            index,
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// First method of this name on the class or any ancestor.
    pub fn get_method(&self, name: &str) -> Option<&Method> {
        match self.index.get(name) {
            Some(&position) => Some(&self.methods[position]),
            None => self.parent.as_deref().and_then(|parent| parent.get_method(name)),
        }
    }
}

// Method bodies can mention their own class, so the derived representation
// would recurse; show the shallow shape only.
impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field(
                "methods",
                &self.methods.iter().map(|m| &m.name).collect::<Vec<_>>(),
            )
            .field("parent", &self.parent.as_deref().map(Class::name))
            .finish()
    }
}

/// An object built from a class: a shared reference to the class plus this
/// instance's own field table.
#[derive(Debug)]
pub struct ClassInstance {
    class: Rc<Class>,
    fields: Closure,
}

impl ClassInstance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: Closure::new(),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn fields(&self) -> &Closure {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Closure {
        &mut self.fields
    }

    /// Whether `name` resolves on this instance's class with exactly
    /// `arity` formal parameters.
    pub fn has_method(&self, name: &str, arity: usize) -> bool {
        self.class
            .get_method(name)
            .is_some_and(|method| method.formal_params.len() == arity)
    }
}

/// Invokes `method` on the instance held by `receiver`.
///
/// The method body runs in a fresh closure holding `self` and the formal
/// parameters only; the caller's locals are not visible. Resolution failure
/// is a runtime error naming the class, the method and the arity.
pub fn call_method(
    receiver: &ObjectHandle,
    method: &str,
    args: &[ObjectHandle],
    context: &mut dyn Context,
) -> Result<ObjectHandle, RuntimeError> {
    let class = match receiver.get().as_deref() {
        Some(Value::Instance(instance)) => Rc::clone(instance.class()),
        _ => return Err(RuntimeError::NotAnInstance),
    };
    let resolved = class
        .get_method(method)
        .filter(|resolved| resolved.formal_params.len() == args.len())
        .ok_or_else(|| RuntimeError::UnknownMethod {
            method: method.to_string(),
            arity: args.len(),
            class: class.name().to_string(),
        })?;

    let mut method_closure = Closure::new();
    method_closure.insert("self".to_string(), receiver.share());
    for (param, arg) in resolved.formal_params.iter().zip(args) {
        method_closure.insert(param.clone(), arg.clone());
    }

    match resolved.body.execute(&mut method_closure, context)? {
        ExecFlow::Value(handle) | ExecFlow::Return(handle) => Ok(handle),
    }
}
