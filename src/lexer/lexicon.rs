//! 词法规则表
//!
//! NanoCalc 的有序 (模式, Token 类型) 规则表，以及保留字表和
//! 内置名集合。规则次序即优先级：关键字和双字符运算符必须排在
//! 会匹配其前缀的标识符/单字符运算符之前。

use hashbrown::{HashMap, HashSet};

use super::pattern::{CharSet, Pattern};
use super::token::TokenKind;

/// 保留字表：标识符词素 → 关键字类型
///
/// 由调用方注入，扫描器用它做标识符重分类
pub type ReservedWords = HashMap<String, TokenKind>;

/// 缺省保留字表
pub fn default_reserved_words() -> ReservedWords {
    let mut words = ReservedWords::new();
    words.insert("let".to_string(), TokenKind::Let);
    words.insert("fn".to_string(), TokenKind::Fn);
    words.insert("return".to_string(), TokenKind::Return);
    words.insert("if".to_string(), TokenKind::If);
    words.insert("else".to_string(), TokenKind::Else);
    words.insert("for".to_string(), TokenKind::For);
    words.insert("while".to_string(), TokenKind::While);
    words.insert("in".to_string(), TokenKind::In);
    words.insert("true".to_string(), TokenKind::True);
    words.insert("false".to_string(), TokenKind::False);
    words
}

/// 缺省内置名集合
///
/// 前端只负责透传给语义阶段，本模块不消费
pub fn default_builtins() -> HashSet<String> {
    ["print", "sin", "cos", "tan", "sqrt", "abs", "exp", "log", "pow", "min", "max"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// 构建有序规则表
///
/// 保留字作为字面量模式领先于标识符模式，歧义由优先级下标消解；
/// 扫描器的重分类对注入的保留字表再兜底一次
pub fn rules(reserved: &ReservedWords) -> Vec<(Pattern, TokenKind)> {
    let mut rules: Vec<(Pattern, TokenKind)> = Vec::new();

    // 关键字（排序保证构建结果稳定）
    let mut keywords: Vec<(&String, &TokenKind)> = reserved.iter().collect();
    keywords.sort_by(|a, b| a.0.cmp(b.0));
    for (word, kind) in keywords {
        rules.push((Pattern::Literal(word.clone()), *kind));
    }

    // 双字符运算符
    rules.push((Pattern::Literal("==".to_string()), TokenKind::EqualEqual));
    rules.push((Pattern::Literal("!=".to_string()), TokenKind::BangEqual));
    rules.push((Pattern::Literal("<=".to_string()), TokenKind::LessEqual));
    rules.push((Pattern::Literal(">=".to_string()), TokenKind::GreaterEqual));
    rules.push((Pattern::Literal("&&".to_string()), TokenKind::AmpAmp));
    rules.push((Pattern::Literal("||".to_string()), TokenKind::PipePipe));

    // 单字符运算符
    rules.push((Pattern::Literal("+".to_string()), TokenKind::Plus));
    rules.push((Pattern::Literal("-".to_string()), TokenKind::Minus));
    rules.push((Pattern::Literal("*".to_string()), TokenKind::Star));
    rules.push((Pattern::Literal("/".to_string()), TokenKind::Slash));
    rules.push((Pattern::Literal("^".to_string()), TokenKind::Caret));
    rules.push((Pattern::Literal("%".to_string()), TokenKind::Percent));
    rules.push((Pattern::Literal("=".to_string()), TokenKind::Equal));
    rules.push((Pattern::Literal("<".to_string()), TokenKind::Less));
    rules.push((Pattern::Literal(">".to_string()), TokenKind::Greater));
    rules.push((Pattern::Literal("!".to_string()), TokenKind::Bang));

    // 分隔符
    rules.push((Pattern::Literal("(".to_string()), TokenKind::LeftParen));
    rules.push((Pattern::Literal(")".to_string()), TokenKind::RightParen));
    rules.push((Pattern::Literal("[".to_string()), TokenKind::LeftBracket));
    rules.push((Pattern::Literal("]".to_string()), TokenKind::RightBracket));
    rules.push((Pattern::Literal("{".to_string()), TokenKind::LeftBrace));
    rules.push((Pattern::Literal("}".to_string()), TokenKind::RightBrace));
    rules.push((Pattern::Literal(",".to_string()), TokenKind::Comma));
    rules.push((Pattern::Literal(":".to_string()), TokenKind::Colon));
    rules.push((Pattern::Literal(";".to_string()), TokenKind::Semicolon));

    // 字面量与标识符
    rules.push((number_pattern(), TokenKind::Number));
    rules.push((string_pattern(), TokenKind::String));
    rules.push((identifier_pattern(), TokenKind::Identifier));

    rules
}

fn digit() -> Pattern {
    Pattern::Class(CharSet::new(vec![('0', '9')]))
}

/// 至少一位数字
fn digits1() -> Pattern {
    Pattern::Repeat { pattern: Box::new(digit()), min: 1 }
}

/// 零位或多位数字
fn digits0() -> Pattern {
    Pattern::Repeat { pattern: Box::new(digit()), min: 0 }
}

/// 数值字面量：INT | INT '.' DIGIT* | '.' INT | 尾数 [eE] [+-]? INT
///
/// "3." 和 ".5" 都是合法数，单独的 "." 不是
fn number_pattern() -> Pattern {
    // 指数形式的尾数：整数（可带小数部分）或纯小数
    let mantissa = Pattern::Alt(vec![
        Pattern::Seq(vec![
            digits1(),
            Pattern::Opt(Box::new(Pattern::Seq(vec![
                Pattern::Literal(".".to_string()),
                digits0(),
            ]))),
        ]),
        Pattern::Seq(vec![Pattern::Literal(".".to_string()), digits1()]),
    ]);

    let exponent = Pattern::Seq(vec![
        mantissa,
        Pattern::Class(CharSet::new(vec![('e', 'e'), ('E', 'E')])),
        Pattern::Opt(Box::new(Pattern::Class(CharSet::new(vec![
            ('+', '+'),
            ('-', '-'),
        ])))),
        digits1(),
    ]);

    let decimal = Pattern::Alt(vec![
        Pattern::Seq(vec![digits1(), Pattern::Literal(".".to_string()), digits0()]),
        Pattern::Seq(vec![Pattern::Literal(".".to_string()), digits1()]),
    ]);

    Pattern::Alt(vec![exponent, decimal, digits1()])
}

/// 字符串字面量：单引号或双引号包围，不允许字面换行
///
/// 转义序列在模式层面放行反斜杠加任意非换行字符，
/// 具体哪些转义合法由扫描器解码时裁决
fn string_pattern() -> Pattern {
    let quoted = |quote: char| {
        let body = Pattern::Alt(vec![
            Pattern::Class(CharSet::except(&[quote, '\\', '\n'])),
            Pattern::Seq(vec![
                Pattern::Literal("\\".to_string()),
                Pattern::Class(CharSet::except(&['\n'])),
            ]),
        ]);
        Pattern::Seq(vec![
            Pattern::Literal(quote.to_string()),
            Pattern::Repeat { pattern: Box::new(body), min: 0 },
            Pattern::Literal(quote.to_string()),
        ])
    };
    Pattern::Alt(vec![quoted('"'), quoted('\'')])
}

/// 标识符：[A-Za-z_][A-Za-z0-9_]*
fn identifier_pattern() -> Pattern {
    Pattern::Seq(vec![
        Pattern::Class(CharSet::new(vec![('A', 'Z'), ('a', 'z'), ('_', '_')])),
        Pattern::Repeat {
            pattern: Box::new(Pattern::Class(CharSet::new(vec![
                ('0', '9'),
                ('A', 'Z'),
                ('a', 'z'),
                ('_', '_'),
            ]))),
            min: 0,
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_words_cover_all_keywords() {
        let words = default_reserved_words();
        assert_eq!(words.len(), 10);
        assert_eq!(words.get("let"), Some(&TokenKind::Let));
        assert_eq!(words.get("false"), Some(&TokenKind::False));
        assert_eq!(words.get("letting"), None);
    }

    #[test]
    fn test_keywords_precede_identifier_pattern() {
        let rules = rules(&default_reserved_words());
        let ident_pos = rules
            .iter()
            .position(|(_, kind)| *kind == TokenKind::Identifier)
            .unwrap();
        let let_pos = rules
            .iter()
            .position(|(_, kind)| *kind == TokenKind::Let)
            .unwrap();
        assert!(let_pos < ident_pos);
        // 标识符是最后一条规则
        assert_eq!(ident_pos, rules.len() - 1);
    }

    #[test]
    fn test_two_char_operators_precede_one_char() {
        let rules = rules(&default_reserved_words());
        let le = rules.iter().position(|(_, k)| *k == TokenKind::LessEqual).unwrap();
        let lt = rules.iter().position(|(_, k)| *k == TokenKind::Less).unwrap();
        assert!(le < lt);
    }

    #[test]
    fn test_full_table_compiles() {
        let dfa = crate::lexer::dfa::compile(&rules(&default_reserved_words())).unwrap();
        assert!(dfa.state_count() > 1);
    }
}
