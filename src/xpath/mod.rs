//! XPath 1.0: expression parsing and evaluation over the source tree.

pub mod ast;
pub mod axes;
pub mod engine;
pub mod functions;
pub mod parser;

pub use ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, NodeTypeTest, Step};
pub use engine::{evaluate, EvalContext, XPathValue};
pub use parser::parse_expression;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum XPathError {
    #[error("XPath parse error in '{0}': {1}")]
    Parse(String, String),

    #[error("function '{function}' error: {message}")]
    Function { function: String, message: String },

    #[error("type error: {0}")]
    Type(String),
}
