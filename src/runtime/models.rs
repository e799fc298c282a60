//! Compiled content models and cursors over them
//!
//! A DFA state stands for the set of particle positions that may have just
//! been consumed. Where subset construction exceeded the configured cap, the
//! position automaton itself is kept (NFA) and stepped with bitsets.
//! `xs:all` groups get their own model.

use super::ids::{ElementId, SymbolId, WildcardId};
use super::Schema;

/// Which pool a [`ModelRef`] points into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ModelKind {
    /// No element content
    #[default]
    Empty = 0,
    /// Deterministic automaton
    Dfa = 1,
    /// Position automaton fallback
    Nfa = 2,
    /// xs:all model
    All = 3,
}

/// Reference to a compiled content model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModelRef {
    /// Pool
    pub kind: ModelKind,
    /// Index into the pool
    pub index: u32,
}

/// DFA state record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DfaState {
    /// Whether the state is final
    pub accept: bool,
    /// Offset of the first transition
    pub trans_off: u32,
    /// Transition count
    pub trans_len: u32,
    /// Offset of the first wildcard edge
    pub wild_off: u32,
    /// Wildcard edge count
    pub wild_len: u32,
}

/// Transition on an element symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Element name
    pub sym: SymbolId,
    /// Target state
    pub next: u32,
    /// Element declaration matched
    pub elem: ElementId,
}

/// Transition on a wildcard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WildEdge {
    /// Wildcard rule
    pub rule: WildcardId,
    /// Target state
    pub next: u32,
}

/// Deterministic content model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dfa {
    /// Start state
    pub start: u32,
    /// States
    pub states: Vec<DfaState>,
    /// Transitions, contiguous per state, sorted by symbol id
    pub transitions: Vec<Transition>,
    /// Wildcard edges, contiguous per state, sorted by rule id
    pub wild_edges: Vec<WildEdge>,
}

impl Dfa {
    /// Transitions leaving a state
    pub fn transitions(&self, state: u32) -> &[Transition] {
        match self.states.get(state as usize) {
            Some(s) => {
                let start = s.trans_off as usize;
                &self.transitions[start..start + s.trans_len as usize]
            }
            None => &[],
        }
    }

    /// Wildcard edges leaving a state
    pub fn wild_edges(&self, state: u32) -> &[WildEdge] {
        match self.states.get(state as usize) {
            Some(s) => {
                let start = s.wild_off as usize;
                &self.wild_edges[start..start + s.wild_len as usize]
            }
            None => &[],
        }
    }

    /// Follow the transition on an element symbol
    pub fn step(&self, state: u32, sym: SymbolId) -> Option<(u32, ElementId)> {
        let trans = self.transitions(state);
        trans
            .binary_search_by_key(&sym, |t| t.sym)
            .ok()
            .map(|i| (trans[i].next, trans[i].elem))
    }

    /// Follow a wildcard edge
    pub fn step_wildcard(&self, state: u32, rule: WildcardId) -> Option<u32> {
        let edges = self.wild_edges(state);
        edges
            .binary_search_by_key(&rule, |e| e.rule)
            .ok()
            .map(|i| edges[i].next)
    }

    /// Whether a state is final
    pub fn accept(&self, state: u32) -> bool {
        self.states.get(state as usize).map_or(false, |s| s.accept)
    }
}

/// Slice of an NFA bitset blob, in 64-bit words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitsetRef {
    /// Word offset
    pub off: u32,
    /// Word count
    pub len: u32,
}

/// What a position matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MatcherKind {
    /// One element symbol
    Exact = 0,
    /// Any element allowed by a wildcard rule
    Wildcard = 1,
}

/// Per-position matcher of an NFA
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matcher {
    /// Exact or wildcard
    pub kind: MatcherKind,
    /// Element name (exact)
    pub sym: SymbolId,
    /// Element declaration (exact)
    pub elem: ElementId,
    /// Wildcard rule (wildcard)
    pub rule: WildcardId,
}

/// Position automaton kept when determinization hit the state cap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nfa {
    /// Packed bitsets
    pub bitsets: Vec<u64>,
    /// Positions that may come first
    pub start: BitsetRef,
    /// Positions that may come last
    pub accept: BitsetRef,
    /// Whether the empty sequence is accepted
    pub nullable: bool,
    /// One matcher per position
    pub matchers: Vec<Matcher>,
    /// Follow set per position
    pub follow: Vec<BitsetRef>,
}

impl Nfa {
    /// Words behind a bitset reference
    pub fn bitset(&self, r: BitsetRef) -> &[u64] {
        let start = r.off as usize;
        self.bitsets.get(start..start + r.len as usize).unwrap_or(&[])
    }

    /// Word count of every bitset of this model
    pub fn words(&self) -> usize {
        self.start.len as usize
    }
}

/// Member of an xs:all model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllMember {
    /// Declared element
    pub elem: ElementId,
    /// minOccurs = 0
    pub optional: bool,
    /// Whether substitutes are allowed in place of `elem`
    pub allows_subst: bool,
    /// Offset into the substitution list
    pub subst_off: u32,
    /// Length of the substitution list
    pub subst_len: u32,
}

/// Compiled xs:all group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllModel {
    /// Members in declaration order
    pub members: Vec<AllMember>,
    /// Element ids allowed per member
    pub subst: Vec<ElementId>,
    /// 0 or 1
    pub min_occurs: u8,
    /// Mixed content
    pub mixed: bool,
}

impl AllModel {
    /// Element ids accepted for a member
    pub fn allowed(&self, member: &AllMember) -> &[ElementId] {
        let start = member.subst_off as usize;
        self.subst.get(start..start + member.subst_len as usize).unwrap_or(&[])
    }
}

/// All compiled models of a schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Models {
    /// DFA pool
    pub dfas: Vec<Dfa>,
    /// NFA pool
    pub nfas: Vec<Nfa>,
    /// All-model pool
    pub alls: Vec<AllModel>,
}

impl Models {
    /// Register a DFA
    pub fn push_dfa(&mut self, dfa: Dfa) -> ModelRef {
        self.dfas.push(dfa);
        ModelRef {
            kind: ModelKind::Dfa,
            index: self.dfas.len() as u32 - 1,
        }
    }

    /// Register an NFA
    pub fn push_nfa(&mut self, nfa: Nfa) -> ModelRef {
        self.nfas.push(nfa);
        ModelRef {
            kind: ModelKind::Nfa,
            index: self.nfas.len() as u32 - 1,
        }
    }

    /// Register an all-model
    pub fn push_all(&mut self, all: AllModel) -> ModelRef {
        self.alls.push(all);
        ModelRef {
            kind: ModelKind::All,
            index: self.alls.len() as u32 - 1,
        }
    }
}

/// What matched a child element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matched {
    /// A declared element
    Element(ElementId),
    /// A wildcard rule
    Wildcard(WildcardId),
}

/// Mutable stepping state of a cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// Empty content: nothing may be stepped
    Empty,
    /// Current DFA state
    Dfa(u32),
    /// Consumed positions; `start` until the first step
    Nfa {
        /// Positions just consumed
        current: Vec<u64>,
        /// No element consumed yet
        start: bool,
    },
    /// Members already seen
    All(Vec<bool>),
    /// A step was rejected
    Dead,
}

/// Steps a content model one child element at a time
#[derive(Debug, Clone)]
pub struct ModelCursor<'s> {
    schema: &'s Schema,
    model: ModelRef,
    state: CursorState,
}

impl<'s> ModelCursor<'s> {
    /// Start a cursor at the model's initial state
    pub fn new(schema: &'s Schema, model: ModelRef) -> Self {
        let state = Self::initial(schema, model);
        Self {
            schema,
            model,
            state,
        }
    }

    fn initial(schema: &Schema, model: ModelRef) -> CursorState {
        let models = schema.models();
        match model.kind {
            ModelKind::Empty => CursorState::Empty,
            ModelKind::Dfa => match models.dfas.get(model.index as usize) {
                Some(dfa) => CursorState::Dfa(dfa.start),
                None => CursorState::Dead,
            },
            ModelKind::Nfa => match models.nfas.get(model.index as usize) {
                Some(nfa) => CursorState::Nfa {
                    current: vec![0; nfa.words()],
                    start: true,
                },
                None => CursorState::Dead,
            },
            ModelKind::All => match models.alls.get(model.index as usize) {
                Some(all) => CursorState::All(vec![false; all.members.len()]),
                None => CursorState::Dead,
            },
        }
    }

    /// Current state
    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Restore a previously saved state
    pub fn restore(&mut self, state: CursorState) {
        self.state = state;
    }

    /// Return to the initial state
    pub fn reset(&mut self) {
        self.state = Self::initial(self.schema, self.model);
    }

    fn wildcard_accepts(&self, rule: WildcardId, sym: SymbolId) -> bool {
        match self.schema.symbols().namespace(sym) {
            Some(ns) => self.schema.wildcards().accepts(rule, ns),
            None => false,
        }
    }

    /// Consume one child element. On rejection the cursor becomes dead.
    pub fn step(&mut self, sym: SymbolId) -> Option<Matched> {
        let result = match &self.state {
            CursorState::Empty | CursorState::Dead => None,
            CursorState::Dfa(state) => self.step_dfa(*state, sym),
            CursorState::Nfa { current, start } => self.step_nfa(current, *start, sym),
            CursorState::All(seen) => self.step_all(seen, sym),
        };
        match result {
            Some((matched, next)) => {
                self.state = next;
                Some(matched)
            }
            None => {
                self.state = CursorState::Dead;
                None
            }
        }
    }

    fn step_dfa(&self, state: u32, sym: SymbolId) -> Option<(Matched, CursorState)> {
        let dfa = self.schema.models().dfas.get(self.model.index as usize)?;
        if let Some((next, elem)) = dfa.step(state, sym) {
            return Some((Matched::Element(elem), CursorState::Dfa(next)));
        }
        dfa.wild_edges(state)
            .iter()
            .find(|e| self.wildcard_accepts(e.rule, sym))
            .map(|e| (Matched::Wildcard(e.rule), CursorState::Dfa(e.next)))
    }

    fn step_nfa(
        &self,
        current: &[u64],
        start: bool,
        sym: SymbolId,
    ) -> Option<(Matched, CursorState)> {
        let nfa = self.schema.models().nfas.get(self.model.index as usize)?;
        let mut candidates = vec![0u64; nfa.words()];
        if start {
            candidates.copy_from_slice(nfa.bitset(nfa.start));
        } else {
            for p in iter_bits(current) {
                let follow = nfa.bitset(nfa.follow[p]);
                for (c, f) in candidates.iter_mut().zip(follow) {
                    *c |= f;
                }
            }
        }
        // Same priority as the DFA: an exact symbol wins over wildcards, and
        // among wildcards the lowest accepting rule id is taken.
        let mut exact = None;
        let mut wildcard: Option<WildcardId> = None;
        for p in iter_bits(&candidates) {
            let m = &nfa.matchers[p];
            match m.kind {
                MatcherKind::Exact if m.sym == sym => exact = exact.or(Some(m.elem)),
                MatcherKind::Wildcard if self.wildcard_accepts(m.rule, sym) => {
                    wildcard = Some(wildcard.map_or(m.rule, |r| r.min(m.rule)));
                }
                _ => {}
            }
        }
        let matched = match (exact, wildcard) {
            (Some(elem), _) => Matched::Element(elem),
            (None, Some(rule)) => Matched::Wildcard(rule),
            (None, None) => return None,
        };
        let mut next = vec![0u64; nfa.words()];
        for p in iter_bits(&candidates) {
            let m = &nfa.matchers[p];
            let taken = match matched {
                Matched::Element(_) => m.kind == MatcherKind::Exact && m.sym == sym,
                Matched::Wildcard(rule) => m.kind == MatcherKind::Wildcard && m.rule == rule,
            };
            if taken {
                next[p / 64] |= 1 << (p % 64);
            }
        }
        Some((
            matched,
            CursorState::Nfa {
                current: next,
                start: false,
            },
        ))
    }

    fn step_all(&self, seen: &[bool], sym: SymbolId) -> Option<(Matched, CursorState)> {
        let all = self.schema.models().alls.get(self.model.index as usize)?;
        for (i, member) in all.members.iter().enumerate() {
            let hit = all
                .allowed(member)
                .iter()
                .copied()
                .find(|e| self.schema.element(*e).map(|d| d.name) == Some(sym));
            if let Some(elem) = hit {
                if seen[i] {
                    return None;
                }
                let mut next = seen.to_vec();
                next[i] = true;
                return Some((Matched::Element(elem), CursorState::All(next)));
            }
        }
        None
    }

    /// Whether the children consumed so far form a complete content
    pub fn accepting(&self) -> bool {
        let models = self.schema.models();
        match &self.state {
            CursorState::Empty => true,
            CursorState::Dead => false,
            CursorState::Dfa(state) => models
                .dfas
                .get(self.model.index as usize)
                .map_or(false, |d| d.accept(*state)),
            CursorState::Nfa { current, start } => {
                let Some(nfa) = models.nfas.get(self.model.index as usize) else {
                    return false;
                };
                if *start {
                    return nfa.nullable;
                }
                current
                    .iter()
                    .zip(nfa.bitset(nfa.accept))
                    .any(|(c, a)| c & a != 0)
            }
            CursorState::All(seen) => {
                let Some(all) = models.alls.get(self.model.index as usize) else {
                    return false;
                };
                if all.min_occurs == 0 && !seen.iter().any(|s| *s) {
                    return true;
                }
                all.members
                    .iter()
                    .zip(seen)
                    .all(|(m, s)| *s || m.optional)
            }
        }
    }
}

/// Indices of the set bits of a packed bitset
pub fn iter_bits(words: &[u64]) -> impl Iterator<Item = usize> + '_ {
    words.iter().enumerate().flat_map(|(w, &word)| {
        let mut bits = word;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let b = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(w * 64 + b)
        })
    })
}

/// Reusable LIFO of cursor states with a capacity hint
#[derive(Debug, Clone, Default)]
pub struct StateStack<T> {
    items: Vec<T>,
}

impl<T> StateStack<T> {
    /// Create a stack with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Push a state
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Pop the top state
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Peek at the top state
    pub fn top(&self) -> Option<&T> {
        self.items.last()
    }

    /// Mutable access to the top state
    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }

    /// Depth
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the stack is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Clear the stack, keeping its allocation
    pub fn reset(&mut self) {
        self.items.clear();
    }

    /// Allocated capacity
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }
}
