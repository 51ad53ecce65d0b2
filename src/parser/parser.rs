//! 语法解析器
//!
//! 递归下降 + 按优先级分层的表达式解析。解析器独占扫描器，
//! 缓冲一个前瞻 token；标识符开头的语句需要再窥视一个 token
//! 来区分赋值和表达式，窥视结果会回放，不破坏流的顺序。
//!
//! 分层（从外到内）：or → and → equality → comparison → term →
//! factor → unary → power → primary。二元层都是左结合的迭代折叠；
//! 幂运算右结合，且一元运算绑定得比幂运算松：-2^3 解析为 -(2^3)。

use thiserror::Error;

use crate::config::MAX_NESTING_DEPTH;
use crate::frontend::FrontendError;
use crate::lexer::{Scanner, Span, Token, TokenKind};

use super::ast::{BinOp, Expr, Program, Stmt, UnOp};

/// 解析错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// 期望的 token 未出现
    ExpectedToken,
    /// 意外的输入结束
    UnexpectedEof,
    /// 超过嵌套深度上限
    NestingTooDeep,
}

/// 解析错误
///
/// 致命且不可恢复：第一个错误即中止整个解析，不返回部分 AST
#[derive(Debug, Clone, Error)]
#[error("Syntax error at line {line}, column {column}: {message}")]
pub struct ParseError {
    /// 错误消息
    pub message: String,
    /// 错误类型
    pub kind: ParseErrorKind,
    /// 期望的内容（如果有）
    pub expected: Option<String>,
    /// 实际得到的内容
    pub found: Option<String>,
    /// 行号（从1开始）
    pub line: usize,
    /// 列号（从1开始）
    pub column: usize,
}

impl ParseError {
    /// 创建期望 token 错误
    fn expected_token(expected: &str, found: &str, span: Span) -> Self {
        Self {
            message: format!("expected {}, found {}", expected, found),
            kind: ParseErrorKind::ExpectedToken,
            expected: Some(expected.to_string()),
            found: Some(found.to_string()),
            line: span.line,
            column: span.column,
        }
    }

    /// 创建意外输入结束错误
    fn unexpected_eof(context: &str, span: Span) -> Self {
        Self {
            message: format!("unexpected end of input {}", context),
            kind: ParseErrorKind::UnexpectedEof,
            expected: None,
            found: Some("end of input".to_string()),
            line: span.line,
            column: span.column,
        }
    }

    /// 创建嵌套过深错误
    fn nesting_too_deep(span: Span) -> Self {
        Self {
            message: format!("nesting exceeds the limit of {} levels", MAX_NESTING_DEPTH),
            kind: ParseErrorKind::NestingTooDeep,
            expected: None,
            found: None,
            line: span.line,
            column: span.column,
        }
    }
}

/// 解析结果：词法错误和语法错误都会中止解析
type ParseResult<T> = Result<T, FrontendError>;

/// 语法解析器
pub struct Parser<'a> {
    /// 词法扫描器（解析器独占）
    scanner: Scanner<'a>,
    /// 前瞻 token
    lookahead: Token,
    /// 窥视第二个 token 时的暂存槽，advance 优先取它
    pending: Option<Token>,
    /// 最近消费的 token 位置（组装语句范围用）
    last_span: Span,
    /// 当前嵌套深度
    depth: usize,
}

impl<'a> Parser<'a> {
    /// 创建新的解析器并填充前瞻
    pub fn new(mut scanner: Scanner<'a>) -> Result<Self, FrontendError> {
        let lookahead = scanner.next_token()?;
        Ok(Self {
            scanner,
            lookahead,
            pending: None,
            last_span: Span::default(),
            depth: 0,
        })
    }

    /// 解析整个程序
    ///
    /// 成功时 AST 所有权移交调用方；失败时返回第一个错误
    pub fn parse(mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(Program::new(statements))
    }

    // ============ 语句 ============

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.lookahead.kind {
            TokenKind::Let => self.parse_let_statement(),
            TokenKind::Fn => self.parse_fn_declaration(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Identifier => self.parse_identifier_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    /// let 声明：let ID = expr [;]
    fn parse_let_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.lookahead.span;
        self.advance()?; // 消费 'let'

        let name = self.eat(TokenKind::Identifier)?.lexeme;
        self.eat(TokenKind::Equal)?;
        let value = self.parse_expression()?;
        self.accept(TokenKind::Semicolon)?;

        let span = self.span_from(start_span);
        Ok(Stmt::Let { name, value, span })
    }

    /// 函数声明：fn ID ( 参数名列表? ) 块
    fn parse_fn_declaration(&mut self) -> ParseResult<Stmt> {
        let start_span = self.lookahead.span;
        self.advance()?; // 消费 'fn'

        let name = self.eat(TokenKind::Identifier)?.lexeme;
        self.eat(TokenKind::LeftParen)?;

        let mut params = Vec::new();
        if self.check(TokenKind::Identifier) {
            params.push(self.eat(TokenKind::Identifier)?.lexeme);
            while self.accept(TokenKind::Comma)? {
                params.push(self.eat(TokenKind::Identifier)?.lexeme);
            }
        }
        self.eat(TokenKind::RightParen)?;

        let body = Box::new(self.parse_block()?);

        let span = self.span_from(start_span);
        Ok(Stmt::FnDecl { name, params, body, span })
    }

    /// if 语句：if ( expr ) 块 [else 块]
    ///
    /// 分支体必须带花括号，所以 else 归属没有歧义
    fn parse_if_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.lookahead.span;
        self.advance()?; // 消费 'if'

        self.eat(TokenKind::LeftParen)?;
        let condition = self.parse_expression()?;
        self.eat(TokenKind::RightParen)?;

        let then_branch = Box::new(self.parse_block()?);
        let else_branch = if self.accept(TokenKind::Else)? {
            Some(Box::new(self.parse_block()?))
        } else {
            None
        };

        let span = self.span_from(start_span);
        Ok(Stmt::If { condition, then_branch, else_branch, span })
    }

    /// while 循环：while ( expr ) 块
    fn parse_while_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.lookahead.span;
        self.advance()?; // 消费 'while'

        self.eat(TokenKind::LeftParen)?;
        let condition = self.parse_expression()?;
        self.eat(TokenKind::RightParen)?;
        let body = Box::new(self.parse_block()?);

        let span = self.span_from(start_span);
        Ok(Stmt::While { condition, body, span })
    }

    /// C 风格 for 循环：for ( 初始化; 条件; 步进 ) 块
    ///
    /// 初始化是空、let 声明或赋值；步进是空、赋值或表达式
    fn parse_for_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.lookahead.span;
        self.advance()?; // 消费 'for'

        self.eat(TokenKind::LeftParen)?;

        let initializer = if self.check(TokenKind::Semicolon) {
            None
        } else if self.check(TokenKind::Let) {
            Some(Box::new(self.parse_for_let()?))
        } else if self.check(TokenKind::Identifier) {
            Some(Box::new(self.parse_for_assignment()?))
        } else {
            let found = self.lookahead.kind.to_string();
            return Err(ParseError::expected_token(
                "for initializer (empty, let declaration or assignment)",
                &found,
                self.lookahead.span,
            )
            .into());
        };
        self.eat(TokenKind::Semicolon)?;

        let condition = self.parse_expression()?;
        self.eat(TokenKind::Semicolon)?;

        let step = if self.check(TokenKind::RightParen) {
            None
        } else {
            Some(Box::new(self.parse_for_step()?))
        };
        self.eat(TokenKind::RightParen)?;

        let body = Box::new(self.parse_block()?);

        let span = self.span_from(start_span);
        Ok(Stmt::For { initializer, condition, step, body, span })
    }

    /// for 头部的 let 声明（不吃分号）
    fn parse_for_let(&mut self) -> ParseResult<Stmt> {
        let start_span = self.lookahead.span;
        self.advance()?; // 消费 'let'

        let name = self.eat(TokenKind::Identifier)?.lexeme;
        self.eat(TokenKind::Equal)?;
        let value = self.parse_expression()?;

        let span = self.span_from(start_span);
        Ok(Stmt::Let { name, value, span })
    }

    /// for 头部的赋值（不吃分号）
    fn parse_for_assignment(&mut self) -> ParseResult<Stmt> {
        let start_span = self.lookahead.span;
        let name = self.eat(TokenKind::Identifier)?.lexeme;
        self.eat(TokenKind::Equal)?;
        let value = self.parse_expression()?;

        let span = self.span_from(start_span);
        Ok(Stmt::Assign { name, value, span })
    }

    /// for 头部的步进：赋值或表达式
    fn parse_for_step(&mut self) -> ParseResult<Stmt> {
        if self.check(TokenKind::Identifier) && self.peek_second()? == TokenKind::Equal {
            return self.parse_for_assignment();
        }
        let expr = self.parse_expression()?;
        let span = expr.span();
        Ok(Stmt::Expression { expr, span })
    }

    /// return 语句：return [expr] [;]
    fn parse_return_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.lookahead.span;
        self.advance()?; // 消费 'return'

        let value = if self.check(TokenKind::Semicolon)
            || self.check(TokenKind::RightBrace)
            || self.check(TokenKind::Eof)
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.accept(TokenKind::Semicolon)?;

        let span = self.span_from(start_span);
        Ok(Stmt::Return { value, span })
    }

    /// 标识符开头的语句：下一个 token 是 '=' 则是赋值，
    /// 否则整体按表达式语句解析（调用、裸引用、二元链都走这里）
    fn parse_identifier_statement(&mut self) -> ParseResult<Stmt> {
        if self.peek_second()? == TokenKind::Equal {
            let start_span = self.lookahead.span;
            let name = self.eat(TokenKind::Identifier)?.lexeme;
            self.advance()?; // 消费 '='
            let value = self.parse_expression()?;
            self.accept(TokenKind::Semicolon)?;

            let span = self.span_from(start_span);
            return Ok(Stmt::Assign { name, value, span });
        }
        self.parse_expression_statement()
    }

    /// 兜底：表达式语句
    fn parse_expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.parse_expression()?;
        self.accept(TokenKind::Semicolon)?;
        let span = self.span_from(expr.span());
        Ok(Stmt::Expression { expr, span })
    }

    /// 块：{ 语句* }
    fn parse_block(&mut self) -> ParseResult<Stmt> {
        self.enter_nesting()?;
        let start_span = self.lookahead.span;
        self.eat(TokenKind::LeftBrace)?;

        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) {
            if self.check(TokenKind::Eof) {
                return Err(ParseError::unexpected_eof(
                    "in block (expected '}')",
                    self.lookahead.span,
                )
                .into());
            }
            statements.push(self.parse_statement()?);
        }
        self.eat(TokenKind::RightBrace)?;
        self.depth -= 1;

        let span = self.span_from(start_span);
        Ok(Stmt::Block { statements, span })
    }

    // ============ 表达式 ============

    /// 表达式入口：最外层是逻辑或
    fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.enter_nesting()?;
        let expr = self.parse_logical_or();
        self.depth -= 1;
        expr
    }

    /// 逻辑或：左结合折叠
    fn parse_logical_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_logical_and()?;
        while self.check(TokenKind::PipePipe) {
            self.advance()?;
            let right = self.parse_logical_and()?;
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    /// 逻辑与
    fn parse_logical_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.check(TokenKind::AmpAmp) {
            self.advance()?;
            let right = self.parse_equality()?;
            left = binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    /// 相等比较：a == b != c 按左结合折叠为 (a == b) != c
    fn parse_equality(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.lookahead.kind {
                TokenKind::EqualEqual => BinOp::Eq,
                TokenKind::BangEqual => BinOp::Ne,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// 大小比较：与相等层一样左结合，a < b < c 即 (a < b) < c
    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.lookahead.kind {
                TokenKind::Less => BinOp::Lt,
                TokenKind::LessEqual => BinOp::Le,
                TokenKind::Greater => BinOp::Gt,
                TokenKind::GreaterEqual => BinOp::Ge,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// 加减
    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.lookahead.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_factor()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// 乘除模
    fn parse_factor(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.lookahead.kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// 一元前缀：绑定幂运算层的完整结果，-2^3 解析为 -(2^3)
    fn parse_unary(&mut self) -> ParseResult<Expr> {
        self.enter_nesting()?;
        let expr = if matches!(self.lookahead.kind, TokenKind::Minus | TokenKind::Bang) {
            let op_token = self.advance()?;
            let op = if op_token.kind == TokenKind::Minus { UnOp::Neg } else { UnOp::Not };
            let operand = self.parse_unary()?;
            let span = join_spans(op_token.span, operand.span());
            Ok(Expr::Unary { op, operand: Box::new(operand), span })
        } else {
            self.parse_power()
        };
        self.depth -= 1;
        expr
    }

    /// 幂运算：右操作数回到一元层，天然右结合且允许 2^-3
    fn parse_power(&mut self) -> ParseResult<Expr> {
        let left = self.parse_primary()?;
        if self.check(TokenKind::Caret) {
            self.advance()?;
            let right = self.parse_unary()?;
            return Ok(binary(BinOp::Pow, left, right));
        }
        Ok(left)
    }

    /// 基本表达式
    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.lookahead.kind {
            TokenKind::Number => {
                let token = self.advance()?;
                Ok(Expr::Number { value: token.number_value(), span: token.span })
            }
            TokenKind::String => {
                let token = self.advance()?;
                Ok(Expr::String { value: token.text_value(), span: token.span })
            }
            TokenKind::True => {
                let token = self.advance()?;
                Ok(Expr::Bool { value: true, span: token.span })
            }
            TokenKind::False => {
                let token = self.advance()?;
                Ok(Expr::Bool { value: false, span: token.span })
            }
            TokenKind::Identifier => {
                let token = self.advance()?;
                if self.check(TokenKind::LeftParen) {
                    self.parse_call_suffix(token.lexeme, token.span)
                } else {
                    Ok(Expr::Identifier { name: token.lexeme, span: token.span })
                }
            }
            // 括号分组：不产生节点，直接返回内层表达式
            TokenKind::LeftParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.eat(TokenKind::RightParen)?;
                Ok(expr)
            }
            TokenKind::LeftBracket => self.parse_bracket_literal(),
            _ => {
                let found = self.lookahead.kind.to_string();
                Err(ParseError::expected_token("expression", &found, self.lookahead.span).into())
            }
        }
    }

    /// 调用后缀：( 实参列表? )
    fn parse_call_suffix(&mut self, callee: String, start_span: Span) -> ParseResult<Expr> {
        self.eat(TokenKind::LeftParen)?;

        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            args.push(self.parse_expression()?);
            while self.accept(TokenKind::Comma)? {
                args.push(self.parse_expression()?);
            }
        }
        let close = self.eat(TokenKind::RightParen)?;

        let span = join_spans(start_span, close.span);
        Ok(Expr::Call { callee, args, span })
    }

    /// 方括号字面量：元素全是列表时识别为矩阵，否则是普通列表
    fn parse_bracket_literal(&mut self) -> ParseResult<Expr> {
        let start_span = self.lookahead.span;
        self.eat(TokenKind::LeftBracket)?;

        let mut elements = Vec::new();
        if !self.check(TokenKind::RightBracket) {
            elements.push(self.parse_expression()?);
            while self.accept(TokenKind::Comma)? {
                elements.push(self.parse_expression()?);
            }
        }
        let close = self.eat(TokenKind::RightBracket)?;
        let span = join_spans(start_span, close.span);

        let all_lists =
            !elements.is_empty() && elements.iter().all(|e| matches!(e, Expr::List { .. }));
        if all_lists {
            let mut rows = Vec::with_capacity(elements.len());
            for element in elements {
                if let Expr::List { elements: row, .. } = element {
                    rows.push(row);
                }
            }
            Ok(Expr::Matrix { rows, span })
        } else {
            Ok(Expr::List { elements, span })
        }
    }

    // ============ 工具方法 ============

    /// 判断前瞻是否是指定类型
    fn check(&self, kind: TokenKind) -> bool {
        self.lookahead.kind == kind
    }

    /// 消费前瞻并返回，补充下一个 token
    fn advance(&mut self) -> ParseResult<Token> {
        let next = match self.pending.take() {
            Some(token) => token,
            None => self.scanner.next_token()?,
        };
        let consumed = std::mem::replace(&mut self.lookahead, next);
        self.last_span = consumed.span;
        Ok(consumed)
    }

    /// 期望指定类型的 token，否则报语法错误
    fn eat(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            return self.advance();
        }
        let expected = kind.to_string();
        let found = self.lookahead.kind.to_string();
        Err(ParseError::expected_token(&expected, &found, self.lookahead.span).into())
    }

    /// 前瞻匹配则消费，返回是否消费
    fn accept(&mut self, kind: TokenKind) -> ParseResult<bool> {
        if self.check(kind) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// 窥视前瞻之后的一个 token 的类型
    ///
    /// 取出的 token 暂存在 pending 槽里，由下一次 advance 回放
    fn peek_second(&mut self) -> ParseResult<TokenKind> {
        if self.pending.is_none() {
            self.pending = Some(self.scanner.next_token()?);
        }
        match &self.pending {
            Some(token) => Ok(token.kind),
            None => Ok(TokenKind::Eof),
        }
    }

    /// 嵌套深度防护
    fn enter_nesting(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::nesting_too_deep(self.lookahead.span).into());
        }
        self.depth += 1;
        Ok(())
    }

    /// 从起始位置到最近消费 token 的范围
    fn span_from(&self, start: Span) -> Span {
        Span::new(start.start, self.last_span.end, start.line, start.column)
    }
}

/// 组装二元节点，范围覆盖两个操作数
fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    let span = join_spans(left.span(), right.span());
    Expr::Binary { op, left: Box::new(left), right: Box::new(right), span }
}

/// 合并两个范围：起点取左、终点取右
fn join_spans(left: Span, right: Span) -> Span {
    Span::new(left.start, right.end, left.line, left.column)
}
