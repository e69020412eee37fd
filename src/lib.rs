//! `minipy` library crate.
//!
//! High-level layout:
//! - frontend: `lexer` turns a source byte stream into the token stream
//!   defined by `token`; an external recursive-descent parser consumes it
//! - runtime object/value model: `runtime`
//! - AST statement family and tree-walking evaluation: `ast`
pub mod ast;
pub mod lexer;
pub mod runtime;
pub mod token;
