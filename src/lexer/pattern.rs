//! 词法模式与 NFA 构建
//!
//! 把有序的 (模式, Token 类型) 规则表编译为一个非确定有限自动机：
//! 每条规则编译为独立的片段，再通过新建起始状态的 epsilon 边合并。
//! 接受状态携带 (Token 类型, 优先级下标)，下标即规则在表中的位置，
//! 构建后不再改变。

use thiserror::Error;

use super::token::TokenKind;

/// 字符区间（闭区间，按 Unicode 码点存储）
///
/// epsilon 边单独存放在状态的 epsilon 列表里，不占用字符区间
pub(crate) type CodeRange = (u32, u32);

/// 模式构建错误（构建期致命，不属于逐 token 的词法错误）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// 空字符串字面量模式
    #[error("empty literal pattern")]
    EmptyLiteral,
    /// 空字符集
    #[error("empty character class")]
    EmptyClass,
    /// 空选择分支
    #[error("empty alternation")]
    EmptyAlternation,
    /// 空连接序列
    #[error("empty sequence")]
    EmptySequence,
    /// 某条规则可以匹配空串（扫描器会产生零长 token，拒绝构建）
    #[error("a pattern accepts the empty string")]
    NullablePattern,
}

/// 字符集：若干闭区间的并
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharSet {
    ranges: Vec<(char, char)>,
}

impl CharSet {
    /// 由区间列表创建
    pub fn new(ranges: Vec<(char, char)>) -> Self {
        Self { ranges }
    }

    /// 全体字符去掉给定字符的补集
    ///
    /// Unicode 代理区 (U+D800..=U+DFFF) 不是合法字符，构造时直接跳过
    pub fn except(excluded: &[char]) -> Self {
        let mut points: Vec<u32> = excluded.iter().map(|&c| c as u32).collect();
        points.sort_unstable();
        points.dedup();

        let mut ranges = Vec::new();
        let mut lo: u32 = 0;
        for p in points {
            if p > lo {
                push_code_range(&mut ranges, lo, p - 1);
            }
            lo = p + 1;
        }
        push_code_range(&mut ranges, lo, char::MAX as u32);
        Self { ranges }
    }

    /// 判断字符是否属于该集合
    pub fn matches(&self, c: char) -> bool {
        self.ranges.iter().any(|&(lo, hi)| c >= lo && c <= hi)
    }

    /// 区间视图
    pub fn ranges(&self) -> &[(char, char)] {
        &self.ranges
    }

    fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// 把 [lo, hi] 码点区间加入列表，必要时绕开代理区
fn push_code_range(ranges: &mut Vec<(char, char)>, lo: u32, hi: u32) {
    const SURROGATE_LO: u32 = 0xD800;
    const SURROGATE_HI: u32 = 0xDFFF;

    if lo > hi {
        return;
    }
    if lo < SURROGATE_LO && hi > SURROGATE_HI {
        push_code_range(ranges, lo, SURROGATE_LO - 1);
        push_code_range(ranges, SURROGATE_HI + 1, hi);
        return;
    }
    // 完全落入代理区的区间没有合法字符
    if lo >= SURROGATE_LO && hi <= SURROGATE_HI {
        return;
    }
    let lo = if (SURROGATE_LO..=SURROGATE_HI).contains(&lo) { SURROGATE_HI + 1 } else { lo };
    let hi = if (SURROGATE_LO..=SURROGATE_HI).contains(&hi) { SURROGATE_LO - 1 } else { hi };
    if lo <= hi {
        if let (Some(l), Some(h)) = (char::from_u32(lo), char::from_u32(hi)) {
            ranges.push((l, h));
        }
    }
}

/// 词法模式
///
/// 足以表达 NanoCalc 的全部 token：字面文本、字符集、连接、选择、
/// 重复（min=0 即 Kleene 星号，min=1 即加号）、可选
#[derive(Debug, Clone)]
pub enum Pattern {
    /// 精确匹配一段文本
    Literal(String),
    /// 匹配字符集中的单个字符
    Class(CharSet),
    /// 顺序连接
    Seq(Vec<Pattern>),
    /// 选择
    Alt(Vec<Pattern>),
    /// 重复至少 min 次，无上限
    Repeat { pattern: Box<Pattern>, min: usize },
    /// 可选（零次或一次）
    Opt(Box<Pattern>),
}

/// NFA 状态
#[derive(Debug, Clone, Default)]
pub(crate) struct NfaState {
    /// 字符区间转移：(区间, 目标状态)，同一 (状态, 字符) 可指向多个目标
    pub(crate) transitions: Vec<(CodeRange, u32)>,
    /// epsilon 转移目标
    pub(crate) epsilon: Vec<u32>,
    /// 接受标记：(Token 类型, 优先级下标)
    pub(crate) accepting: Option<(TokenKind, u32)>,
}

/// 非确定有限自动机
///
/// 由有序规则表构建；只作为子集构造的输入，本身不直接驱动扫描
#[derive(Debug)]
pub struct Nfa {
    pub(crate) states: Vec<NfaState>,
    pub(crate) start: u32,
}

impl Nfa {
    /// 从有序规则表构建 NFA
    ///
    /// 规则次序即优先级：下标越小优先级越高。任何畸形模式在这里
    /// 直接失败，而不是等到扫描某个 token 时才暴露
    pub fn build(rules: &[(Pattern, TokenKind)]) -> Result<Self, BuildError> {
        let mut nfa = Self { states: vec![NfaState::default()], start: 0 };

        for (index, (pattern, kind)) in rules.iter().enumerate() {
            let frag_start = nfa.add_state();
            let frag_end = nfa.add_state();
            nfa.states[nfa.start as usize].epsilon.push(frag_start);
            nfa.compile_fragment(pattern, frag_start, frag_end)?;
            nfa.states[frag_end as usize].accepting = Some((*kind, index as u32));
        }

        Ok(nfa)
    }

    /// 状态总数
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// 起始状态
    pub fn start(&self) -> u32 {
        self.start
    }

    fn add_state(&mut self) -> u32 {
        let id = self.states.len() as u32;
        self.states.push(NfaState::default());
        id
    }

    /// 把单个模式编译为 start..end 之间的片段
    fn compile_fragment(&mut self, pattern: &Pattern, start: u32, end: u32) -> Result<(), BuildError> {
        match pattern {
            Pattern::Literal(text) => {
                if text.is_empty() {
                    return Err(BuildError::EmptyLiteral);
                }
                let chars: Vec<char> = text.chars().collect();
                let mut current = start;
                for (i, &c) in chars.iter().enumerate() {
                    let next = if i == chars.len() - 1 { end } else { self.add_state() };
                    self.states[current as usize].transitions.push(((c as u32, c as u32), next));
                    current = next;
                }
            }
            Pattern::Class(set) => {
                if set.is_empty() {
                    return Err(BuildError::EmptyClass);
                }
                for &(lo, hi) in set.ranges() {
                    self.states[start as usize].transitions.push(((lo as u32, hi as u32), end));
                }
            }
            Pattern::Seq(parts) => {
                if parts.is_empty() {
                    return Err(BuildError::EmptySequence);
                }
                let mut current = start;
                for (i, part) in parts.iter().enumerate() {
                    let next = if i == parts.len() - 1 { end } else { self.add_state() };
                    self.compile_fragment(part, current, next)?;
                    current = next;
                }
            }
            Pattern::Alt(branches) => {
                if branches.is_empty() {
                    return Err(BuildError::EmptyAlternation);
                }
                for branch in branches {
                    let branch_start = self.add_state();
                    let branch_end = self.add_state();
                    self.states[start as usize].epsilon.push(branch_start);
                    self.compile_fragment(branch, branch_start, branch_end)?;
                    self.states[branch_end as usize].epsilon.push(end);
                }
            }
            Pattern::Repeat { pattern, min } => {
                // 先铺 min 个必经副本，再接一个星号循环
                let mut current = start;
                for _ in 0..*min {
                    let next = self.add_state();
                    self.compile_fragment(pattern, current, next)?;
                    current = next;
                }
                let inner_start = self.add_state();
                let inner_end = self.add_state();
                self.states[current as usize].epsilon.push(inner_start);
                self.states[current as usize].epsilon.push(end);
                self.compile_fragment(pattern, inner_start, inner_end)?;
                self.states[inner_end as usize].epsilon.push(inner_start);
                self.states[inner_end as usize].epsilon.push(end);
            }
            Pattern::Opt(inner) => {
                self.states[start as usize].epsilon.push(end);
                self.compile_fragment(inner, start, end)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_chain() {
        let rules = vec![(Pattern::Literal("let".to_string()), TokenKind::Let)];
        let nfa = Nfa::build(&rules).unwrap();
        // 起始 + 片段起止 + 两个中间状态
        assert_eq!(nfa.state_count(), 5);
        // 接受状态携带规则下标 0
        let accepting: Vec<_> = nfa
            .states
            .iter()
            .filter_map(|s| s.accepting)
            .collect();
        assert_eq!(accepting, vec![(TokenKind::Let, 0)]);
    }

    #[test]
    fn test_priority_index_follows_rule_order() {
        let rules = vec![
            (Pattern::Literal("a".to_string()), TokenKind::Identifier),
            (Pattern::Literal("b".to_string()), TokenKind::Number),
            (Pattern::Literal("c".to_string()), TokenKind::String),
        ];
        let nfa = Nfa::build(&rules).unwrap();
        let mut priorities: Vec<u32> = nfa
            .states
            .iter()
            .filter_map(|s| s.accepting.map(|(_, p)| p))
            .collect();
        priorities.sort_unstable();
        assert_eq!(priorities, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_literal_rejected() {
        let rules = vec![(Pattern::Literal(String::new()), TokenKind::Identifier)];
        assert_eq!(Nfa::build(&rules).unwrap_err(), BuildError::EmptyLiteral);
    }

    #[test]
    fn test_empty_class_rejected() {
        let rules = vec![(Pattern::Class(CharSet::new(vec![])), TokenKind::Identifier)];
        assert_eq!(Nfa::build(&rules).unwrap_err(), BuildError::EmptyClass);
    }

    #[test]
    fn test_charset_except() {
        let set = CharSet::except(&['"', '\\', '\n']);
        assert!(set.matches('a'));
        assert!(set.matches('\''));
        assert!(!set.matches('"'));
        assert!(!set.matches('\\'));
        assert!(!set.matches('\n'));
    }

    #[test]
    fn test_charset_except_skips_surrogates() {
        let set = CharSet::except(&[]);
        assert!(set.matches('\u{D7FF}'));
        assert!(set.matches('\u{E000}'));
        assert!(set.matches(char::MAX));
    }
}
