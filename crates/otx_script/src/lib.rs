//! Clause language for smart-contract bylaws.
//!
//! Clause bodies are small imperative scripts: `var` declarations,
//! assignments, `if`/`else`, `while`, `return` and calls into functions the
//! host registers. [`parse_script`] turns source text into a [`Script`] whose
//! statements carry source spans for runtime diagnostics.

mod ast;
mod errors;
mod lexer;
mod parser;
mod span;
mod tokens;


pub use ast::*;
pub use errors::ParseError;
pub use parser::parse_script;
pub use span::Span;
