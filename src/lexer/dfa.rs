//! 子集构造：NFA → DFA
//!
//! 通过 epsilon 闭包和子集构造把 NFA 确定化。多个 NFA 接受状态
//! 合并到同一 DFA 状态时，按优先级下标最小（声明最早）的规则解决
//! 歧义，这就是"关键字压过标识符"的形式化表达。
//!
//! 构建完成后 DFA 不可变，可以被任意多个扫描器只读共享。

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use super::pattern::{BuildError, CodeRange, Nfa, Pattern};
use super::token::TokenKind;

/// DFA 状态编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(pub u32);

/// 规范化的 NFA 状态子集（升序、去重），用作子集构造的键
type StateSet = SmallVec<[u32; 8]>;

/// DFA 状态
#[derive(Debug, Clone, Default)]
struct DfaState {
    /// 转移表：(字符区间, 目标状态)，区间互不重叠且按起点升序，
    /// 这两条就是确定性不变量
    transitions: Vec<(CodeRange, StateId)>,
    /// 接受的 Token 类型（已按优先级归一为单一类型）
    accepting: Option<TokenKind>,
}

/// 确定有限自动机
#[derive(Debug)]
pub struct Dfa {
    states: Vec<DfaState>,
    start: StateId,
}

impl Dfa {
    /// 起始状态
    pub fn start(&self) -> StateId {
        self.start
    }

    /// 状态总数（全部由起始状态可达，按构造保证）
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// (状态, 字符) 的转移目标；至多一个
    pub fn next(&self, state: StateId, c: char) -> Option<StateId> {
        let code = c as u32;
        let transitions = &self.states[state.0 as usize].transitions;
        transitions
            .binary_search_by(|&((lo, hi), _)| {
                if code < lo {
                    std::cmp::Ordering::Greater
                } else if code > hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()
            .map(|idx| transitions[idx].1)
    }

    /// 状态接受的 Token 类型
    pub fn accepting(&self, state: StateId) -> Option<TokenKind> {
        self.states[state.0 as usize].accepting
    }

    /// 校验确定性不变量：每个状态的转移区间有序、互不重叠，
    /// 且目标状态都在界内
    fn check_determinism(&self) -> bool {
        self.states.iter().all(|state| {
            let ordered = state.transitions.windows(2).all(|pair| {
                let ((_, prev_hi), _) = pair[0];
                let ((next_lo, _), _) = pair[1];
                prev_hi < next_lo
            });
            let well_formed = state
                .transitions
                .iter()
                .all(|&((lo, hi), target)| lo <= hi && (target.0 as usize) < self.states.len());
            ordered && well_formed
        })
    }
}

/// 一组 NFA 状态的 epsilon 闭包：只走 epsilon 边能到达的全部状态
///
/// 结果升序排列，保证同一子集总是得到同一个键
pub fn epsilon_closure(nfa: &Nfa, states: &[u32]) -> StateSet {
    let mut closure: HashSet<u32> = states.iter().copied().collect();
    let mut stack: Vec<u32> = states.to_vec();

    while let Some(state) = stack.pop() {
        for &next in &nfa.states[state as usize].epsilon {
            if closure.insert(next) {
                stack.push(next);
            }
        }
    }

    let mut sorted: StateSet = closure.into_iter().collect();
    sorted.sort_unstable();
    sorted
}

/// move 运算：子集内所有状态在给定字符上的直接转移目标之并
pub fn move_on(nfa: &Nfa, states: &[u32], c: char) -> StateSet {
    let code = c as u32;
    let mut targets: HashSet<u32> = HashSet::new();
    for &state in states {
        for &((lo, hi), target) in &nfa.states[state as usize].transitions {
            if code >= lo && code <= hi {
                targets.insert(target);
            }
        }
    }
    let mut sorted: StateSet = targets.into_iter().collect();
    sorted.sort_unstable();
    sorted
}

/// 子集构造主循环
///
/// 工作表以 epsilon_closure({start}) 播种；对每个新发现的子集，
/// 把成员状态的转移区间切成互不重叠的基本区间，再对每个基本区间
/// 求 move+闭包，第一次见到的目标子集分配新的 DFA 状态编号。
/// 可达子集数以 2^|NFA 状态| 为上界，必然终止。
pub fn subset_construction(nfa: &Nfa) -> Dfa {
    let mut dfa = Dfa { states: Vec::new(), start: StateId(0) };
    let mut subset_ids: HashMap<StateSet, StateId> = HashMap::new();
    let mut subsets: Vec<StateSet> = Vec::new();
    let mut worklist: Vec<StateId> = Vec::new();

    let start_set = epsilon_closure(nfa, &[nfa.start]);
    dfa.states.push(DfaState::default());
    subset_ids.insert(start_set.clone(), StateId(0));
    subsets.push(start_set);
    worklist.push(StateId(0));

    while let Some(id) = worklist.pop() {
        let members = subsets[id.0 as usize].clone();

        // 收集成员状态的全部出边
        let mut edges: Vec<(CodeRange, u32)> = Vec::new();
        for &state in &members {
            edges.extend(nfa.states[state as usize].transitions.iter().copied());
        }

        // 切分基本区间：所有区间端点把字符空间划成不重叠的片段
        let mut bounds: Vec<u32> = Vec::with_capacity(edges.len() * 2);
        for &((lo, hi), _) in &edges {
            bounds.push(lo);
            bounds.push(hi + 1);
        }
        bounds.sort_unstable();
        bounds.dedup();

        for window in bounds.windows(2) {
            let (lo, hi) = (window[0], window[1] - 1);

            // 基本区间要么被某条边完整覆盖，要么与其无交，
            // 所以对区间起点做一次 move 就代表了整个区间。
            // 起点落在代理区的区间不含合法字符，直接跳过
            let Some(symbol) = char::from_u32(lo) else {
                continue;
            };
            let targets = move_on(nfa, &members, symbol);
            if targets.is_empty() {
                continue;
            }

            let next_set = epsilon_closure(nfa, &targets);

            let target_id = match subset_ids.get(&next_set) {
                Some(&existing) => existing,
                None => {
                    let new_id = StateId(dfa.states.len() as u32);
                    dfa.states.push(DfaState::default());
                    subset_ids.insert(next_set.clone(), new_id);
                    subsets.push(next_set);
                    worklist.push(new_id);
                    new_id
                }
            };

            dfa.states[id.0 as usize].transitions.push(((lo, hi), target_id));
        }

        // 基本区间按升序产生，转移表天然有序；保险起见仍排一次
        dfa.states[id.0 as usize].transitions.sort_unstable_by_key(|&((lo, _), _)| lo);

        // 歧义消解：子集中优先级下标最小的接受状态胜出
        let mut best: Option<(TokenKind, u32)> = None;
        for &state in &members {
            if let Some((kind, priority)) = nfa.states[state as usize].accepting {
                best = match best {
                    Some((_, p)) if p <= priority => best,
                    _ => Some((kind, priority)),
                };
            }
        }
        dfa.states[id.0 as usize].accepting = best.map(|(kind, _)| kind);
    }

    dfa
}

/// 一步到位：规则表 → NFA → DFA，并做构建期检查
pub fn compile(rules: &[(Pattern, TokenKind)]) -> Result<Dfa, BuildError> {
    let nfa = Nfa::build(rules)?;
    let dfa = subset_construction(&nfa);
    debug_assert!(dfa.check_determinism());
    // 起始状态接受意味着某条规则可匹配空串
    if dfa.accepting(dfa.start()).is_some() {
        return Err(BuildError::NullablePattern);
    }
    Ok(dfa)
}
