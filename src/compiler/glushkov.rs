//! Glushkov position automata
//!
//! Every leaf of a content-model tree is one position. `first`, `last` and
//! `nullable` are computed bottom-up; `follow` is filled while walking
//! sequences and iterations.

use super::bitset::Bitset;
use crate::runtime::ids::{ElementId, SymbolId, WildcardId};

/// What a position matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// A declared element
    Element {
        /// Element name
        sym: SymbolId,
        /// Element declaration
        elem: ElementId,
    },
    /// Any element admitted by a wildcard rule
    Wildcard(WildcardId),
}

/// Content-model tree over positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Matches only the empty sequence
    Empty,
    /// One position
    Leaf(usize),
    /// Children in order
    Seq(Vec<Node>),
    /// One of the children (no children matches nothing)
    Choice(Vec<Node>),
    /// Zero or one
    Opt(Box<Node>),
    /// Zero or more
    Star(Box<Node>),
    /// One or more
    Plus(Box<Node>),
}

/// Position allocator used while building a tree
#[derive(Debug, Clone, Default)]
pub struct PositionTable {
    positions: Vec<Position>,
}

impl PositionTable {
    /// Allocate a position and return its leaf
    pub fn leaf(&mut self, position: Position) -> Node {
        self.positions.push(position);
        Node::Leaf(self.positions.len() - 1)
    }

    /// Number of positions allocated
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether no position was allocated
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Allocated positions
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }
}

/// Position automaton of a content model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionAutomaton {
    /// Matcher of each position
    pub positions: Vec<Position>,
    /// Positions that may come first
    pub first: Bitset,
    /// Positions that may come last
    pub last: Bitset,
    /// Positions that may follow each position
    pub follow: Vec<Bitset>,
    /// Whether the empty sequence is accepted
    pub nullable: bool,
}

struct Summary {
    first: Bitset,
    last: Bitset,
    nullable: bool,
}

impl PositionAutomaton {
    /// Compute the automaton of `root`
    pub fn build(table: PositionTable, root: &Node) -> Self {
        let size = table.len();
        let mut follow = vec![Bitset::new(size); size];
        let summary = summarize(root, size, &mut follow);
        Self {
            positions: table.positions,
            first: summary.first,
            last: summary.last,
            follow,
            nullable: summary.nullable,
        }
    }

    /// Number of positions
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the automaton has no position
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn summarize(node: &Node, size: usize, follow: &mut [Bitset]) -> Summary {
    match node {
        Node::Empty => Summary {
            first: Bitset::new(size),
            last: Bitset::new(size),
            nullable: true,
        },
        Node::Leaf(p) => {
            let mut first = Bitset::new(size);
            first.insert(*p);
            Summary {
                last: first.clone(),
                first,
                nullable: false,
            }
        }
        Node::Seq(children) => {
            let mut acc = Summary {
                first: Bitset::new(size),
                last: Bitset::new(size),
                nullable: true,
            };
            for child in children {
                let s = summarize(child, size, follow);
                for p in acc.last.iter() {
                    follow[p].union_with(&s.first);
                }
                if acc.nullable {
                    acc.first.union_with(&s.first);
                }
                if s.nullable {
                    acc.last.union_with(&s.last);
                } else {
                    acc.last = s.last;
                }
                acc.nullable &= s.nullable;
            }
            acc
        }
        Node::Choice(children) => {
            let mut acc = Summary {
                first: Bitset::new(size),
                last: Bitset::new(size),
                nullable: false,
            };
            for child in children {
                let s = summarize(child, size, follow);
                acc.first.union_with(&s.first);
                acc.last.union_with(&s.last);
                acc.nullable |= s.nullable;
            }
            acc
        }
        Node::Opt(inner) => {
            let mut s = summarize(inner, size, follow);
            s.nullable = true;
            s
        }
        Node::Star(inner) | Node::Plus(inner) => {
            let mut s = summarize(inner, size, follow);
            for p in s.last.iter() {
                follow[p].union_with(&s.first);
            }
            if matches!(node, Node::Star(_)) {
                s.nullable = true;
            }
            s
        }
    }
}
