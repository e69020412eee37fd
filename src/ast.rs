use std::rc::Rc;

use crate::runtime::class::{self, Class, ClassInstance};
use crate::runtime::compare::Comparator;
use crate::runtime::context::Context;
use crate::runtime::error::RuntimeError;
use crate::runtime::object::{Closure, ObjectHandle};
use crate::runtime::value::{self, Value};

const ADD_METHOD: &str = "__add__";
const INIT_METHOD: &str = "__init__";

/// Result of executing one AST node: an ordinary value, or a `return`
/// travelling up to the nearest enclosing `MethodBody`.
#[derive(Debug)]
pub enum ExecFlow {
    Value(ObjectHandle),
    Return(ObjectHandle),
}

/// The statement/expression family. Every node owns its children; the only
/// shared pieces are the `Rc<Class>` objects a `ClassDefinition` introduces
/// and every `NewInstance` of that class reuses read-only.
#[derive(Debug)]
pub enum Statement {
    NumberLiteral(i32),
    StringLiteral(String),
    BoolLiteral(bool),
    NoneLiteral,
    Assignment {
        var: String,
        rv: Box<Statement>,
    },
    VariableValue {
        dotted_ids: Vec<String>,
    },
    FieldAssignment {
        object: Box<Statement>,
        field: String,
        rv: Box<Statement>,
    },
    Print {
        args: Vec<Statement>,
    },
    MethodCall {
        object: Box<Statement>,
        method: String,
        args: Vec<Statement>,
    },
    NewInstance {
        class: Rc<Class>,
        args: Vec<Statement>,
    },
    Stringify {
        argument: Box<Statement>,
    },
    Add {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Sub {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Mult {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Div {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Or {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    And {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Not {
        argument: Box<Statement>,
    },
    Comparison {
        comparator: Comparator,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    IfElse {
        condition: Box<Statement>,
        if_body: Box<Statement>,
        else_body: Option<Box<Statement>>,
    },
    Return {
        statement: Box<Statement>,
    },
    Compound {
        statements: Vec<Statement>,
    },
    ClassDefinition {
        class: Rc<Class>,
    },
    MethodBody {
        body: Box<Statement>,
    },
}

/// Evaluates a child node, forwarding a `return` in flight to the caller.
macro_rules! eval {
    ($node:expr, $closure:expr, $context:expr) => {
        match $node.execute($closure, $context)? {
            ExecFlow::Value(handle) => handle,
            flow @ ExecFlow::Return(_) => return Ok(flow),
        }
    };
}

impl Statement {
    /// Read of a single variable.
    pub fn variable(name: &str) -> Statement {
        Statement::VariableValue {
            dotted_ids: vec![name.to_string()],
        }
    }

    /// `print` of a single variable, a shape the parser emits often.
    pub fn print_variable(name: &str) -> Statement {
        Statement::Print {
            args: vec![Statement::variable(name)],
        }
    }

    pub fn execute(
        &self,
        closure: &mut Closure,
        context: &mut dyn Context,
    ) -> Result<ExecFlow, RuntimeError> {
        match self {
            Statement::NumberLiteral(number) => {
                Ok(ExecFlow::Value(ObjectHandle::own(Value::Number(*number))))
            }
            Statement::StringLiteral(text) => Ok(ExecFlow::Value(ObjectHandle::own(
                Value::String(text.clone()),
            ))),
            Statement::BoolLiteral(flag) => {
                Ok(ExecFlow::Value(ObjectHandle::own(Value::Bool(*flag))))
            }
            Statement::NoneLiteral => Ok(ExecFlow::Value(ObjectHandle::none())),
            Statement::Assignment { var, rv } => {
                let result = eval!(rv, closure, context);
                closure.insert(var.clone(), result.share());
                Ok(ExecFlow::Value(result))
            }
            Statement::VariableValue { dotted_ids } => {
                // Walk the dotted path. The lookup scope starts at the
                // closure and switches to an instance's field table each
                // time the fetched value is a class instance.
                let mut scope: Option<ObjectHandle> = None;
                let mut result = ObjectHandle::none();
                for id in dotted_ids {
                    let fetched = match &scope {
                        None => closure.get(id).map(ObjectHandle::share),
                        Some(owner) => match owner.get().as_deref() {
                            Some(Value::Instance(instance)) => {
                                instance.fields().get(id).map(ObjectHandle::share)
                            }
                            _ => None,
                        },
                    };
                    let Some(fetched) = fetched else {
                        return Err(RuntimeError::UnknownName {
                            path: dotted_ids.join("."),
                        });
                    };
                    if holds_instance(&fetched) {
                        scope = Some(fetched.share());
                    }
                    result = fetched;
                }
                Ok(ExecFlow::Value(result))
            }
            Statement::FieldAssignment { object, field, rv } => {
                let target = eval!(object, closure, context);
                if !holds_instance(&target) {
                    return Err(RuntimeError::NotAnInstance);
                }
                let result = eval!(rv, closure, context);
                if let Some(mut target_value) = target.get_mut()
                    && let Value::Instance(instance) = &mut *target_value
                {
                    instance.fields_mut().insert(field.clone(), result.share());
                }
                Ok(ExecFlow::Value(result))
            }
            Statement::Print { args } => {
                for (position, arg) in args.iter().enumerate() {
                    let handle = eval!(arg, closure, context);
                    let text = value::render(&handle, context)?;
                    let output = context.output_stream();
                    if position > 0 {
                        write!(output, " ").map_err(output_error)?;
                    }
                    write!(output, "{text}").map_err(output_error)?;
                }
                writeln!(context.output_stream()).map_err(output_error)?;
                Ok(ExecFlow::Value(ObjectHandle::none()))
            }
            Statement::MethodCall {
                object,
                method,
                args,
            } => {
                let receiver = eval!(object, closure, context);
                let callable = matches!(
                    receiver.get().as_deref(),
                    Some(Value::Instance(instance)) if instance.has_method(method, args.len())
                );
                // A receiver without such a method, or no receiver at all,
                // makes the whole call a no-op.
                if !callable {
                    return Ok(ExecFlow::Value(ObjectHandle::none()));
                }
                let mut actual = Vec::with_capacity(args.len());
                for arg in args {
                    actual.push(eval!(arg, closure, context));
                }
                let result = class::call_method(&receiver, method, &actual, context)?;
                Ok(ExecFlow::Value(result))
            }
            Statement::NewInstance { class, args } => {
                let instance =
                    ObjectHandle::own(Value::Instance(ClassInstance::new(Rc::clone(class))));
                let has_init = class
                    .get_method(INIT_METHOD)
                    .is_some_and(|init| init.formal_params.len() == args.len());
                if has_init {
                    let mut actual = Vec::with_capacity(args.len());
                    for arg in args {
                        actual.push(eval!(arg, closure, context));
                    }
                    class::call_method(&instance, INIT_METHOD, &actual, context)?;
                }
                Ok(ExecFlow::Value(instance.share()))
            }
            Statement::Stringify { argument } => {
                let handle = eval!(argument, closure, context);
                let text = value::render(&handle, context)?;
                Ok(ExecFlow::Value(ObjectHandle::own(Value::String(text))))
            }
            Statement::Add { lhs, rhs } => {
                let lhs = eval!(lhs, closure, context);
                let rhs = eval!(rhs, closure, context);
                if let Some((a, b)) = numeric_pair(&lhs, &rhs) {
                    let Some(sum) = a.checked_add(b) else {
                        return Err(RuntimeError::UnsupportedOperation { operation: "Add" });
                    };
                    return Ok(ExecFlow::Value(ObjectHandle::own(Value::Number(sum))));
                }
                if let Some((a, b)) = string_pair(&lhs, &rhs) {
                    return Ok(ExecFlow::Value(ObjectHandle::own(Value::String(a + &b))));
                }
                if holds_instance(&lhs) {
                    let result =
                        class::call_method(&lhs, ADD_METHOD, std::slice::from_ref(&rhs), context)?;
                    return Ok(ExecFlow::Value(result));
                }
                Err(RuntimeError::UnsupportedOperation { operation: "Add" })
            }
            Statement::Sub { lhs, rhs } => {
                let lhs = eval!(lhs, closure, context);
                let rhs = eval!(rhs, closure, context);
                numeric_operation("Sub", i32::checked_sub, &lhs, &rhs)
            }
            Statement::Mult { lhs, rhs } => {
                let lhs = eval!(lhs, closure, context);
                let rhs = eval!(rhs, closure, context);
                numeric_operation("Mult", i32::checked_mul, &lhs, &rhs)
            }
            Statement::Div { lhs, rhs } => {
                let lhs = eval!(lhs, closure, context);
                let rhs = eval!(rhs, closure, context);
                if matches!(numeric_pair(&lhs, &rhs), Some((_, 0))) {
                    return Err(RuntimeError::DivisionByZero);
                }
                numeric_operation("Div", i32::checked_div, &lhs, &rhs)
            }
            Statement::Or { lhs, rhs } => {
                // Both operands are always evaluated; `or` does not
                // short-circuit.
                let lhs = eval!(lhs, closure, context);
                let rhs = eval!(rhs, closure, context);
                if lhs.is_none() || rhs.is_none() {
                    return Err(RuntimeError::InvalidLogicalOperand);
                }
                Ok(ExecFlow::Value(ObjectHandle::own(Value::Bool(
                    lhs.is_true() || rhs.is_true(),
                ))))
            }
            Statement::And { lhs, rhs } => {
                let lhs = eval!(lhs, closure, context);
                let rhs = eval!(rhs, closure, context);
                if lhs.is_none() || rhs.is_none() {
                    return Err(RuntimeError::InvalidLogicalOperand);
                }
                Ok(ExecFlow::Value(ObjectHandle::own(Value::Bool(
                    lhs.is_true() && rhs.is_true(),
                ))))
            }
            Statement::Not { argument } => {
                let argument = eval!(argument, closure, context);
                if argument.is_none() {
                    return Err(RuntimeError::InvalidLogicalOperand);
                }
                Ok(ExecFlow::Value(ObjectHandle::own(Value::Bool(
                    !argument.is_true(),
                ))))
            }
            Statement::Comparison {
                comparator,
                lhs,
                rhs,
            } => {
                let lhs = eval!(lhs, closure, context);
                let rhs = eval!(rhs, closure, context);
                let result = comparator.apply(&lhs, &rhs, context)?;
                Ok(ExecFlow::Value(ObjectHandle::own(Value::Bool(result))))
            }
            Statement::IfElse {
                condition,
                if_body,
                else_body,
            } => {
                let condition = eval!(condition, closure, context);
                if condition.is_true() {
                    if_body.execute(closure, context)
                } else if let Some(else_body) = else_body {
                    else_body.execute(closure, context)
                } else {
                    Ok(ExecFlow::Value(ObjectHandle::none()))
                }
            }
            Statement::Return { statement } => {
                let result = eval!(statement, closure, context);
                Ok(ExecFlow::Return(result))
            }
            Statement::Compound { statements } => {
                for statement in statements {
                    if let flow @ ExecFlow::Return(_) = statement.execute(closure, context)? {
                        return Ok(flow);
                    }
                }
                Ok(ExecFlow::Value(ObjectHandle::none()))
            }
            Statement::ClassDefinition { class } => {
                closure.insert(
                    class.name().to_string(),
                    ObjectHandle::own(Value::Class(Rc::clone(class))),
                );
                Ok(ExecFlow::Value(ObjectHandle::none()))
            }
            Statement::MethodBody { body } => match body.execute(closure, context)? {
                ExecFlow::Return(result) => Ok(ExecFlow::Value(result)),
                ExecFlow::Value(_) => Ok(ExecFlow::Value(ObjectHandle::none())),
            },
        }
    }
}

fn output_error(error: std::io::Error) -> RuntimeError {
    RuntimeError::Output(error.to_string())
}

fn numeric_pair(lhs: &ObjectHandle, rhs: &ObjectHandle) -> Option<(i32, i32)> {
    match (lhs.get().as_deref(), rhs.get().as_deref()) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => Some((*a, *b)),
        _ => None,
    }
}

fn string_pair(lhs: &ObjectHandle, rhs: &ObjectHandle) -> Option<(String, String)> {
    match (lhs.get().as_deref(), rhs.get().as_deref()) {
        (Some(Value::String(a)), Some(Value::String(b))) => Some((a.clone(), b.clone())),
        _ => None,
    }
}

fn holds_instance(handle: &ObjectHandle) -> bool {
    matches!(handle.get().as_deref(), Some(Value::Instance(_)))
}

/// Numeric-only binary operation; a non-numeric operand or an overflowing
/// result is the named operation failure.
fn numeric_operation(
    operation: &'static str,
    apply: fn(i32, i32) -> Option<i32>,
    lhs: &ObjectHandle,
    rhs: &ObjectHandle,
) -> Result<ExecFlow, RuntimeError> {
    let Some((a, b)) = numeric_pair(lhs, rhs) else {
        return Err(RuntimeError::UnsupportedOperation { operation });
    };
    let Some(result) = apply(a, b) else {
        return Err(RuntimeError::UnsupportedOperation { operation });
    };
    Ok(ExecFlow::Value(ObjectHandle::own(Value::Number(result))))
}
