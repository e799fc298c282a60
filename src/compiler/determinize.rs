//! Subset construction over position automata
//!
//! A DFA state is the set of positions that may have just been consumed;
//! state 0 is the empty set, from which the candidates are `first`. When
//! the number of states exceeds the configured cap the position automaton
//! itself is emitted as an NFA.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::bitset::{word_count, Bitset};
use super::glushkov::{Position, PositionAutomaton};
use crate::error::{Error, Result};
use crate::limits::BuildConfig;
use crate::runtime::ids::{ElementId, SymbolId, WildcardId};
use crate::runtime::models::{
    BitsetRef, Dfa, DfaState, Matcher, MatcherKind, Nfa, Transition, WildEdge,
};

/// Result of compiling one particle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Automaton {
    /// Subset construction stayed under the cap
    Dfa(Dfa),
    /// Fallback
    Nfa(Nfa),
}

#[derive(Default)]
struct Builder {
    sets: Vec<Bitset>,
    ids: HashMap<Vec<u8>, u32>,
}

impl Builder {
    fn intern(&mut self, set: Bitset) -> u32 {
        let key = set.key();
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = self.sets.len() as u32;
        self.ids.insert(key, id);
        self.sets.push(set);
        id
    }
}

/// Determinize `auto`, falling back to an NFA above the state cap
pub fn determinize(auto: &PositionAutomaton, config: &BuildConfig) -> Result<Automaton> {
    check_declarations(auto)?;
    let size = auto.len();
    let mut builder = Builder::default();
    builder.intern(Bitset::new(size));

    let mut dfa = Dfa::default();
    let mut current = 0usize;
    while current < builder.sets.len() {
        let set = builder.sets[current].clone();
        let candidates = if current == 0 {
            auto.first.clone()
        } else {
            let mut c = Bitset::new(size);
            for p in set.iter() {
                c.union_with(&auto.follow[p]);
            }
            c
        };

        let mut by_symbol: BTreeMap<SymbolId, (ElementId, Bitset)> = BTreeMap::new();
        let mut by_rule: BTreeMap<WildcardId, Bitset> = BTreeMap::new();
        for p in candidates.iter() {
            match auto.positions[p] {
                Position::Element { sym, elem } => {
                    by_symbol
                        .entry(sym)
                        .or_insert_with(|| (elem, Bitset::new(size)))
                        .1
                        .insert(p);
                }
                Position::Wildcard(rule) => {
                    by_rule
                        .entry(rule)
                        .or_insert_with(|| Bitset::new(size))
                        .insert(p);
                }
            }
        }

        let trans_off = dfa.transitions.len() as u32;
        for (sym, (elem, target)) in by_symbol {
            let next = builder.intern(target);
            dfa.transitions.push(Transition { sym, next, elem });
        }
        let wild_off = dfa.wild_edges.len() as u32;
        for (rule, target) in by_rule {
            let next = builder.intern(target);
            dfa.wild_edges.push(WildEdge { rule, next });
        }

        if let Err(limit) = config.check_dfa_states(builder.sets.len()) {
            debug!(
                states = builder.sets.len(),
                cap = config.limits.max_dfa_states,
                positions = size,
                "{}; keeping the position automaton",
                limit
            );
            return Ok(Automaton::Nfa(to_nfa(auto)));
        }

        dfa.states.push(DfaState {
            accept: set.intersects(&auto.last) || (current == 0 && auto.nullable),
            trans_off,
            trans_len: dfa.transitions.len() as u32 - trans_off,
            wild_off,
            wild_len: dfa.wild_edges.len() as u32 - wild_off,
        });
        current += 1;
    }
    dfa.start = 0;
    Ok(Automaton::Dfa(dfa))
}

/// Every symbol of a particle must map to a single element declaration,
/// whichever automaton is emitted
fn check_declarations(auto: &PositionAutomaton) -> Result<()> {
    let mut declared: HashMap<SymbolId, ElementId> = HashMap::new();
    for position in &auto.positions {
        if let Position::Element { sym, elem } = *position {
            let first = *declared.entry(sym).or_insert(elem);
            if first != elem {
                return Err(Error::ContentModel(format!(
                    "symbol {} is declared by both {} and {} in the same particle",
                    sym, first, elem
                )));
            }
        }
    }
    Ok(())
}

/// Serialize a position automaton as an NFA
pub fn to_nfa(auto: &PositionAutomaton) -> Nfa {
    let words = word_count(auto.len()) as u32;
    let mut nfa = Nfa {
        nullable: auto.nullable,
        ..Nfa::default()
    };
    let push = |nfa: &mut Nfa, set: &Bitset| {
        let off = nfa.bitsets.len() as u32;
        nfa.bitsets.extend_from_slice(set.words());
        BitsetRef { off, len: words }
    };
    nfa.start = push(&mut nfa, &auto.first);
    nfa.accept = push(&mut nfa, &auto.last);
    for f in &auto.follow {
        let r = push(&mut nfa, f);
        nfa.follow.push(r);
    }
    nfa.matchers = auto
        .positions
        .iter()
        .map(|p| match *p {
            Position::Element { sym, elem } => Matcher {
                kind: MatcherKind::Exact,
                sym,
                elem,
                rule: WildcardId::NONE,
            },
            Position::Wildcard(rule) => Matcher {
                kind: MatcherKind::Wildcard,
                sym: SymbolId::NONE,
                elem: ElementId::NONE,
                rule,
            },
        })
        .collect();
    nfa
}
