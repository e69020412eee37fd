//! Runtime object model used by the AST evaluator.
//!
//! This module contains the value and handle types, class/method tables,
//! comparison dispatch, the output context consumed by `print`, and the
//! runtime error taxonomy.
pub mod class;
pub mod compare;
pub mod context;
pub mod error;
pub mod object;
pub mod value;
