//! 词法扫描器
//!
//! 用只读共享的 DFA 在源码缓冲上做最长匹配扫描，产生 Token 流。
//! 扫描器独占游标，不可原地重启；重新扫描请新建实例。

use thiserror::Error;

use super::dfa::Dfa;
use super::lexicon::ReservedWords;
use super::token::{LiteralValue, Span, Token, TokenKind};

/// 词法错误类别
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexErrorKind {
    /// 没有任何模式能接受的字符
    #[error("invalid character '{0}'")]
    InvalidChar(char),
    /// 字符串在闭合引号前遇到换行或输入结束
    #[error("unterminated string")]
    UnterminatedString,
    /// 块注释没有闭合标记
    #[error("unterminated block comment")]
    UnterminatedBlockComment,
    /// 数值词素解码失败或超出表示范围
    #[error("malformed number '{0}'")]
    MalformedNumber(String),
    /// 不认识的转义序列
    #[error("unknown escape sequence '\\{0}'")]
    UnknownEscape(char),
}

/// 词法错误
///
/// 致命且不可恢复：一次编译最多携带一个，按源码顺序取第一个
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Lexical error at line {line}, column {column}: {kind}")]
pub struct LexError {
    /// 错误类别
    pub kind: LexErrorKind,
    /// 行号（从1开始）
    pub line: usize,
    /// 列号（从1开始）
    pub column: usize,
}

impl LexError {
    fn new(kind: LexErrorKind, line: usize, column: usize) -> Self {
        Self { kind, line, column }
    }
}

/// 词法扫描器
pub struct Scanner<'a> {
    /// 共享的确定自动机
    dfa: &'a Dfa,
    /// 保留字表（标识符重分类用）
    reserved: &'a ReservedWords,
    /// 源代码字符
    source: Vec<char>,
    /// 当前位置
    current: usize,
    /// 当前 token 起始位置
    start: usize,
    /// 当前行号
    line: usize,
    /// 当前列号
    column: usize,
    /// token 起始行号
    start_line: usize,
    /// token 起始列号
    start_column: usize,
}

impl<'a> Scanner<'a> {
    /// 创建新的扫描器
    pub fn new(dfa: &'a Dfa, reserved: &'a ReservedWords, source: &str) -> Self {
        Self {
            dfa,
            reserved,
            source: source.chars().collect(),
            current: 0,
            start: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    /// 扫描全部 token（以恰好一个 Eof 结尾）
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// 扫描单个 token
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;

        self.start = self.current;
        self.start_line = self.line;
        self.start_column = self.column;

        if self.is_at_end() {
            let span = Span::new(self.current, self.current, self.line, self.column);
            return Ok(Token::new(TokenKind::Eof, String::new(), span));
        }

        // DFA 最长匹配：每进入一个接受状态就记住当前位置，
        // 失配后回退到最近一次接受的位置
        let mut state = self.dfa.start();
        let mut last_accept: Option<(usize, usize, usize, TokenKind)> = None;

        while !self.is_at_end() {
            let c = self.peek();
            match self.dfa.next(state, c) {
                Some(next) => {
                    state = next;
                    self.advance();
                    if let Some(kind) = self.dfa.accepting(state) {
                        last_accept = Some((self.current, self.line, self.column, kind));
                    }
                }
                None => break,
            }
        }

        match last_accept {
            Some((pos, line, column, kind)) => {
                // 最长匹配规则：回退游标到最近接受位置
                self.current = pos;
                self.line = line;
                self.column = column;

                let lexeme: String = self.source[self.start..self.current].iter().collect();
                let span = Span::new(self.start, self.current, self.start_line, self.start_column);
                self.finish_token(kind, lexeme, span)
            }
            None => {
                let bad = self.source[self.start];
                // 引号开头却没有任何可接受前缀，只能是字符串未闭合
                if bad == '"' || bad == '\'' {
                    Err(LexError::new(
                        LexErrorKind::UnterminatedString,
                        self.start_line,
                        self.start_column,
                    ))
                } else {
                    Err(LexError::new(
                        LexErrorKind::InvalidChar(bad),
                        self.start_line,
                        self.start_column,
                    ))
                }
            }
        }
    }

    /// 后处理：保留字重分类、字面量解码
    fn finish_token(&self, kind: TokenKind, lexeme: String, span: Span) -> Result<Token, LexError> {
        match kind {
            TokenKind::Identifier => {
                // 词素与保留字完全相同时重分类为关键字
                if let Some(&keyword) = self.reserved.get(lexeme.as_str()) {
                    Ok(Token::new(keyword, lexeme, span))
                } else {
                    Ok(Token::new(TokenKind::Identifier, lexeme, span))
                }
            }
            TokenKind::Number => match lexeme.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(Token::with_value(
                    TokenKind::Number,
                    lexeme,
                    span,
                    LiteralValue::Number(value),
                )),
                _ => Err(LexError::new(
                    LexErrorKind::MalformedNumber(lexeme),
                    span.line,
                    span.column,
                )),
            },
            TokenKind::String => {
                let text = self.decode_string(&lexeme, span)?;
                Ok(Token::with_value(
                    TokenKind::String,
                    lexeme,
                    span,
                    LiteralValue::Text(text),
                ))
            }
            _ => Ok(Token::new(kind, lexeme, span)),
        }
    }

    /// 解码字符串词素：去掉首尾引号，展开转义序列
    ///
    /// DFA 已保证词素首尾是同种引号、反斜杠后必有一个非换行字符
    fn decode_string(&self, lexeme: &str, span: Span) -> Result<String, LexError> {
        let chars: Vec<char> = lexeme.chars().collect();
        let end = chars.len() - 1;
        let mut text = String::with_capacity(chars.len());

        let mut i = 1;
        while i < end {
            let c = chars[i];
            if c == '\\' {
                i += 1;
                match chars[i] {
                    'n' => text.push('\n'),
                    'r' => text.push('\r'),
                    't' => text.push('\t'),
                    '\'' => text.push('\''),
                    '"' => text.push('"'),
                    '\\' => text.push('\\'),
                    other => {
                        return Err(LexError::new(
                            LexErrorKind::UnknownEscape(other),
                            span.line,
                            span.column,
                        ))
                    }
                }
            } else {
                text.push(c);
            }
            i += 1;
        }

        Ok(text)
    }

    /// 跳过空白和注释
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            if self.is_at_end() {
                return Ok(());
            }
            match self.peek() {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                // 行注释：# 到行尾
                '#' => {
                    while !self.is_at_end() && self.peek() != '\n' {
                        self.advance();
                    }
                }
                // 块注释：到第一个闭合标记为止，不嵌套
                '/' if self.peek_next() == Some('*') => {
                    let line = self.line;
                    let column = self.column;
                    self.advance();
                    self.advance();
                    loop {
                        if self.is_at_end() {
                            // 错误归于注释的开始位置
                            return Err(LexError::new(
                                LexErrorKind::UnterminatedBlockComment,
                                line,
                                column,
                            ));
                        }
                        if self.peek() == '*' && self.peek_next() == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// 判断是否到达源码末尾
    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    /// 前进一个字符并返回，维护行列号
    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    /// 查看当前字符
    fn peek(&self) -> char {
        self.source[self.current]
    }

    /// 查看下一个字符
    fn peek_next(&self) -> Option<char> {
        self.source.get(self.current + 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{dfa, lexicon};

    fn scan(source: &str) -> Result<Vec<Token>, LexError> {
        let reserved = lexicon::default_reserved_words();
        let dfa = dfa::compile(&lexicon::rules(&reserved)).unwrap();
        let mut scanner = Scanner::new(&dfa, &reserved, source);
        scanner.scan_tokens()
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        scan(source).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_scan_let_declaration() {
        let tokens = scan("let x = 5").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Let);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].lexeme, "x");
        assert_eq!(tokens[2].kind, TokenKind::Equal);
        assert_eq!(tokens[3].kind, TokenKind::Number);
        assert_eq!(tokens[3].number_value(), 5.0);
        assert_eq!(tokens[4].kind, TokenKind::Eof);
        assert_eq!(tokens.len(), 5);
    }

    #[test]
    fn test_keyword_wins_over_identifier() {
        let tokens = scan("let").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Let);
    }

    #[test]
    fn test_keyword_prefix_stays_identifier() {
        let tokens = scan("letx").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].lexeme, "letx");

        let tokens = scan("letting").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_maximal_munch_operators() {
        assert_eq!(
            kinds("<= < >= > == = != !"),
            vec![
                TokenKind::LessEqual,
                TokenKind::Less,
                TokenKind::GreaterEqual,
                TokenKind::Greater,
                TokenKind::EqualEqual,
                TokenKind::Equal,
                TokenKind::BangEqual,
                TokenKind::Bang,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_maximal_munch_backtracks_to_last_accept() {
        // "1.5e+" 中指数不完整，回退到 "1.5"
        let tokens = scan("1.5e+").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].lexeme, "1.5");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].lexeme, "e");
        assert_eq!(tokens[2].kind, TokenKind::Plus);
    }

    #[test]
    fn test_number_forms_decode() {
        let tokens = scan("3. .5 1e-3 6.02e23 42").unwrap();
        assert_eq!(tokens[0].number_value(), 3.0);
        assert_eq!(tokens[1].number_value(), 0.5);
        assert_eq!(tokens[2].number_value(), 1e-3);
        assert_eq!(tokens[3].number_value(), 6.02e23);
        assert_eq!(tokens[4].number_value(), 42.0);
    }

    #[test]
    fn test_adjacent_dots_split_into_two_numbers() {
        // "3.4.5" 不是词法错误：最长匹配切出 "3.4" 和 ".5"
        let tokens = scan("3.4.5").unwrap();
        assert_eq!(tokens[0].lexeme, "3.4");
        assert_eq!(tokens[0].number_value(), 3.4);
        assert_eq!(tokens[1].lexeme, ".5");
        assert_eq!(tokens[1].number_value(), 0.5);
        assert_eq!(tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn test_out_of_range_number_is_malformed() {
        let err = scan("1e999").unwrap_err();
        assert!(matches!(err.kind, LexErrorKind::MalformedNumber(_)));
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 1);
    }

    #[test]
    fn test_string_escapes_decode() {
        let tokens = scan(r#""a\nb\t\"c\\""#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text_value(), "a\nb\t\"c\\");
    }

    #[test]
    fn test_single_quoted_string() {
        let tokens = scan(r"'it\'s'").unwrap();
        assert_eq!(tokens[0].text_value(), "it's");
    }

    #[test]
    fn test_unknown_escape_is_fault() {
        let err = scan(r#""a\qb""#).unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnknownEscape('q'));
    }

    #[test]
    fn test_unterminated_string_fault_at_opening_quote() {
        let err = scan("let x = \"abc").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 9);
    }

    #[test]
    fn test_string_with_raw_newline_is_unterminated() {
        let err = scan("\"ab\ncd\"").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 1);
    }

    #[test]
    fn test_line_comment_skipped() {
        assert_eq!(
            kinds("1 # comment to end of line\n2"),
            vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn test_block_comment_skipped() {
        assert_eq!(
            kinds("1 /* inside\nmultiple lines */ 2"),
            vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn test_block_comment_does_not_nest() {
        // 第一个 */ 就关闭注释
        let tokens = scan("/* a /* b */ 2").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].number_value(), 2.0);
    }

    #[test]
    fn test_unterminated_block_comment_fault_at_opening() {
        let err = scan("let x = 1\n/* unterminated").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedBlockComment);
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 1);
    }

    #[test]
    fn test_invalid_character_fault() {
        let err = scan("let @").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::InvalidChar('@'));
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 5);
    }

    #[test]
    fn test_fault_message_shape() {
        let err = scan("@").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Lexical error at line 1, column 1: invalid character '@'"
        );
    }

    #[test]
    fn test_positions_track_lines_and_columns() {
        let tokens = scan("let\n  x").unwrap();
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[0].span.column, 1);
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[1].span.column, 3);
    }

    #[test]
    fn test_empty_source_yields_single_eof() {
        let tokens = scan("").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[0].span.column, 1);
    }

    #[test]
    fn test_dfa_shared_across_scanners() {
        let reserved = lexicon::default_reserved_words();
        let dfa = dfa::compile(&lexicon::rules(&reserved)).unwrap();

        let mut first = Scanner::new(&dfa, &reserved, "let a = 1");
        let mut second = Scanner::new(&dfa, &reserved, "while (x) { y() }");
        assert!(first.scan_tokens().is_ok());
        assert!(second.scan_tokens().is_ok());
    }

    #[test]
    fn test_delimiters_and_remaining_operators() {
        assert_eq!(
            kinds("( ) [ ] { } , : ; + - * / ^ % && ||"),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Comma,
                TokenKind::Colon,
                TokenKind::Semicolon,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Caret,
                TokenKind::Percent,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::Eof,
            ]
        );
    }
}
