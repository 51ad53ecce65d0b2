//! 语法分析模块
//!
//! 将 Token 流转换为抽象语法树（AST）

pub mod ast;
pub mod parser;

pub use ast::*;
pub use parser::{ParseError, ParseErrorKind, Parser};
