use std::cmp::Ordering;

use crate::runtime::class;
use crate::runtime::context::Context;
use crate::runtime::error::RuntimeError;
use crate::runtime::object::ObjectHandle;
use crate::runtime::value::Value;

const EQUAL_METHOD: &str = "__eq__";
const LESS_METHOD: &str = "__lt__";

/// Comparator selector carried by `Statement::Comparison`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    NotEq,
    Less,
    LessOrEq,
    Greater,
    GreaterOrEq,
}

impl Comparator {
    pub fn apply(
        self,
        lhs: &ObjectHandle,
        rhs: &ObjectHandle,
        context: &mut dyn Context,
    ) -> Result<bool, RuntimeError> {
        match self {
            Comparator::Eq => equal(lhs, rhs, context),
            Comparator::NotEq => not_equal(lhs, rhs, context),
            Comparator::Less => less(lhs, rhs, context),
            Comparator::LessOrEq => less_or_equal(lhs, rhs, context),
            Comparator::Greater => greater(lhs, rhs, context),
            Comparator::GreaterOrEq => greater_or_equal(lhs, rhs, context),
        }
    }
}

/// Natural ordering when both operands hold the same primitive type.
fn primitive_ordering(lhs: &ObjectHandle, rhs: &ObjectHandle) -> Option<Ordering> {
    match (lhs.get().as_deref(), rhs.get().as_deref()) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => Some(a.cmp(b)),
        (Some(Value::String(a)), Some(Value::String(b))) => Some(a.cmp(b)),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Calls a unary comparison dunder on `lhs` when its class defines one,
/// insisting on a `Bool` result. `Ok(None)` means the dunder path does not
/// apply.
fn call_dunder(
    lhs: &ObjectHandle,
    rhs: &ObjectHandle,
    method: &str,
    context: &mut dyn Context,
) -> Result<Option<bool>, RuntimeError> {
    let applicable = matches!(
        lhs.get().as_deref(),
        Some(Value::Instance(instance)) if instance.has_method(method, 1)
    );
    if !applicable {
        return Ok(None);
    }
    let result = class::call_method(lhs, method, std::slice::from_ref(rhs), context)?;
    match result.get().as_deref() {
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        _ => Err(RuntimeError::ComparisonNotBool {
            method: method.to_string(),
        }),
    }
}

fn is_none(handle: &ObjectHandle) -> bool {
    matches!(handle.get().as_deref(), None | Some(Value::None))
}

pub fn equal(
    lhs: &ObjectHandle,
    rhs: &ObjectHandle,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    if let Some(ordering) = primitive_ordering(lhs, rhs) {
        return Ok(ordering == Ordering::Equal);
    }
    if let Some(flag) = call_dunder(lhs, rhs, EQUAL_METHOD, context)? {
        return Ok(flag);
    }
    if is_none(lhs) && is_none(rhs) {
        return Ok(true);
    }
    Err(RuntimeError::Incomparable {
        comparison: "equality",
    })
}

pub fn less(
    lhs: &ObjectHandle,
    rhs: &ObjectHandle,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    if let Some(ordering) = primitive_ordering(lhs, rhs) {
        return Ok(ordering == Ordering::Less);
    }
    if let Some(flag) = call_dunder(lhs, rhs, LESS_METHOD, context)? {
        return Ok(flag);
    }
    Err(RuntimeError::Incomparable { comparison: "less" })
}

pub fn not_equal(
    lhs: &ObjectHandle,
    rhs: &ObjectHandle,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!equal(lhs, rhs, context)?)
}

pub fn greater(
    lhs: &ObjectHandle,
    rhs: &ObjectHandle,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!(less(lhs, rhs, context)? || equal(lhs, rhs, context)?))
}

pub fn less_or_equal(
    lhs: &ObjectHandle,
    rhs: &ObjectHandle,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!greater(lhs, rhs, context)?)
}

pub fn greater_or_equal(
    lhs: &ObjectHandle,
    rhs: &ObjectHandle,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!less(lhs, rhs, context)?)
}
