//! 前端入口
//!
//! 把词法规则表编译成 DFA（一次构建，跨编译复用），对外提供
//! "源码进、AST 出"的单一入口。保留字表和内置名集合由调用方
//! 注入；内置名前端不消费，只透传给下游语义阶段。

use hashbrown::HashSet;
use thiserror::Error;

use crate::lexer::{self, BuildError, Dfa, LexError, ReservedWords, Scanner, Token};
use crate::parser::{ParseError, Parser, Program};

/// 前端错误：构建期、词法、语法三类，全部致命
#[derive(Debug, Clone, Error)]
pub enum FrontendError {
    /// 词法规则表编译失败（构建期）
    #[error("pattern table error: {0}")]
    Build(#[from] BuildError),
    /// 词法错误
    #[error(transparent)]
    Lex(#[from] LexError),
    /// 语法错误
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// NanoCalc 前端
///
/// DFA 在构造时生成一次，之后不可变；parse/tokenize 每次调用
/// 都新建扫描器，同一个前端可以安全地连续编译多份源码
pub struct Frontend {
    dfa: Dfa,
    reserved: ReservedWords,
    builtins: HashSet<String>,
}

impl Frontend {
    /// 用缺省保留字表和内置名集合创建前端
    pub fn new() -> Result<Self, FrontendError> {
        Self::with_tables(
            lexer::lexicon::default_reserved_words(),
            lexer::lexicon::default_builtins(),
        )
    }

    /// 用外部注入的保留字表和内置名集合创建前端
    pub fn with_tables(
        reserved: ReservedWords,
        builtins: HashSet<String>,
    ) -> Result<Self, FrontendError> {
        let rules = lexer::lexicon::rules(&reserved);
        let dfa = lexer::dfa::compile(&rules)?;
        Ok(Self { dfa, reserved, builtins })
    }

    /// 解析源码为 AST；第一个错误即中止，不返回部分结果
    pub fn parse(&self, source: &str) -> Result<Program, FrontendError> {
        let scanner = Scanner::new(&self.dfa, &self.reserved, source);
        Parser::new(scanner)?.parse()
    }

    /// 只做词法分析，返回完整 Token 流（以 Eof 结尾）
    pub fn tokenize(&self, source: &str) -> Result<Vec<Token>, FrontendError> {
        let mut scanner = Scanner::new(&self.dfa, &self.reserved, source);
        Ok(scanner.scan_tokens()?)
    }

    /// 内置名集合（透传给语义阶段）
    pub fn builtins(&self) -> &HashSet<String> {
        &self.builtins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokenKind;
    use crate::parser::Stmt;

    #[test]
    fn test_parse_complete_program() {
        let frontend = Frontend::new().unwrap();
        let source = "\
# 数值积分示例
fn square(x) { return x ^ 2 }

let total = 0
for (let i = 0; i < 10; i = i + 1) {
    total = total + square(i)
}

if (total >= 285) {
    print(\"ok\")
} else {
    print(\"bad\")
}
";
        let program = frontend.parse(source).unwrap();
        assert_eq!(program.statements.len(), 4);
        assert!(matches!(program.statements[0], Stmt::FnDecl { .. }));
        assert!(matches!(program.statements[1], Stmt::Let { .. }));
        assert!(matches!(program.statements[2], Stmt::For { .. }));
        assert!(matches!(program.statements[3], Stmt::If { .. }));
    }

    #[test]
    fn test_frontend_reused_across_compilations() {
        let frontend = Frontend::new().unwrap();
        assert!(frontend.parse("let a = 1").is_ok());
        assert!(frontend.parse("while (a < 3) { a = a + 1 }").is_ok());
        assert!(frontend.parse("let = 1").is_err());
        // 前一次失败不影响后续编译
        assert!(frontend.parse("let b = [1, 2]").is_ok());
    }

    #[test]
    fn test_tokenize_ends_with_single_eof() {
        let frontend = Frontend::new().unwrap();
        let tokens = frontend.tokenize("let x = 1").unwrap();
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
        assert_eq!(tokens.iter().filter(|t| t.is_eof()).count(), 1);
    }

    #[test]
    fn test_custom_reserved_words() {
        // 注入的表不含 while：它退化为普通标识符
        let mut reserved = crate::lexer::lexicon::default_reserved_words();
        reserved.remove("while");
        let frontend =
            Frontend::with_tables(reserved, crate::lexer::lexicon::default_builtins()).unwrap();

        let tokens = frontend.tokenize("while").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_builtins_passed_through() {
        let frontend = Frontend::new().unwrap();
        assert!(frontend.builtins().contains("sqrt"));
        assert!(!frontend.builtins().contains("quux"));
    }

    #[test]
    fn test_fault_categories() {
        let frontend = Frontend::new().unwrap();
        assert!(matches!(frontend.parse("let x = @"), Err(FrontendError::Lex(_))));
        assert!(matches!(frontend.parse("let x = *"), Err(FrontendError::Parse(_))));
    }

    #[test]
    fn test_fault_messages_use_literal_shape() {
        let frontend = Frontend::new().unwrap();
        let lex = frontend.parse("@").unwrap_err();
        assert!(lex.to_string().starts_with("Lexical error at line 1, column 1:"));
        let parse = frontend.parse("let = 5").unwrap_err();
        assert!(parse.to_string().starts_with("Syntax error at line 1, column 5:"));
    }
}
