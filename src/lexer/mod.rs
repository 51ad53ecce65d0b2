//! 词法分析模块
//!
//! 将源代码转换为 Token 流：
//! 模式表 → NFA → DFA（构建一次，可跨多次编译复用）→ 扫描器

pub mod token;
pub mod pattern;
pub mod dfa;
pub mod lexicon;
pub mod scanner;

pub use token::{LiteralValue, Span, Token, TokenKind};
pub use pattern::{BuildError, CharSet, Nfa, Pattern};
pub use dfa::{compile, Dfa, StateId};
pub use lexicon::ReservedWords;
pub use scanner::{LexError, LexErrorKind, Scanner};
