//! Content-model lowering
//!
//! A particle tree is lowered to a [`Node`] tree over fragment-local
//! positions: group references are expanded, occurrence ranges unrolled
//! and element references replaced by a choice over their substitution
//! closure. The tree is then numbered into a [`PositionTable`], turned into
//! a position automaton and determinized. Top-level `xs:all` groups get
//! their own model instead.

use std::collections::HashSet;

use tracing::trace;

use super::determinize::{determinize, Automaton};
use super::glushkov::{Node, Position, PositionAutomaton, PositionTable};
use super::wildcards::Wildcard;
use super::Compiler;
use crate::ast::{Compositor, ElementParticle, ModelGroup, Particle, Term};
use crate::error::{Error, LimitError, Result};
use crate::namespaces::QName;
use crate::runtime::ids::ElementId;
use crate::runtime::models::{AllMember, AllModel, ModelRef};
use crate::runtime::types::ContentKind;

/// A lowered particle; leaves index `positions`
#[derive(Debug, Clone)]
struct Fragment {
    node: Node,
    positions: Vec<Position>,
}

impl Fragment {
    fn empty() -> Self {
        Self {
            node: Node::Empty,
            positions: Vec::new(),
        }
    }

    /// Copy the positions of `other` into this fragment and return its
    /// node relabelled to the copies
    fn absorb(&mut self, other: &Fragment) -> Node {
        let off = self.positions.len();
        self.positions.extend_from_slice(&other.positions);
        shift(&other.node, off)
    }
}

fn shift(node: &Node, off: usize) -> Node {
    let boxed = |n: &Node| Box::new(shift(n, off));
    match node {
        Node::Empty => Node::Empty,
        Node::Leaf(p) => Node::Leaf(p + off),
        Node::Seq(children) => Node::Seq(children.iter().map(|c| shift(c, off)).collect()),
        Node::Choice(children) => Node::Choice(children.iter().map(|c| shift(c, off)).collect()),
        Node::Opt(inner) => Node::Opt(boxed(inner)),
        Node::Star(inner) => Node::Star(boxed(inner)),
        Node::Plus(inner) => Node::Plus(boxed(inner)),
    }
}

/// Allocate the fragment's positions in `table`
fn instantiate(node: &Node, positions: &[Position], table: &mut PositionTable) -> Node {
    let mut leaves = Vec::with_capacity(positions.len());
    for position in positions {
        leaves.push(table.leaf(*position));
    }
    relabel(node, &leaves)
}

fn relabel(node: &Node, leaves: &[Node]) -> Node {
    match node {
        Node::Leaf(p) => leaves.get(*p).cloned().unwrap_or(Node::Empty),
        Node::Empty => Node::Empty,
        Node::Seq(children) => Node::Seq(children.iter().map(|c| relabel(c, leaves)).collect()),
        Node::Choice(children) => {
            Node::Choice(children.iter().map(|c| relabel(c, leaves)).collect())
        }
        Node::Opt(inner) => Node::Opt(Box::new(relabel(inner, leaves))),
        Node::Star(inner) => Node::Star(Box::new(relabel(inner, leaves))),
        Node::Plus(inner) => Node::Plus(Box::new(relabel(inner, leaves))),
    }
}

/// Unroll `term` to `min..=max` occurrences. Optional copies nest as
/// `(t (t (t)?)?)?` so that each copy can only follow the previous one.
fn repeat(term: Fragment, min: u32, max: Option<u32>) -> Result<Fragment> {
    if min == 1 && max == Some(1) {
        return Ok(term);
    }
    let copies = max.unwrap_or(min.max(1)) as usize;
    let total = term
        .positions
        .len()
        .checked_mul(copies)
        .ok_or(LimitError::OccursOverflow)?;

    let mut out = Fragment {
        node: Node::Empty,
        positions: Vec::with_capacity(total),
    };
    let mut required: Vec<Node> = (0..copies).map(|_| out.absorb(&term)).collect();
    let optional = required.split_off((min as usize).min(copies));

    match max {
        None => {
            let repeated = match (min, required.pop(), optional.into_iter().next()) {
                (0, _, Some(copy)) => Node::Star(Box::new(copy)),
                (_, Some(copy), _) => Node::Plus(Box::new(copy)),
                _ => Node::Empty,
            };
            required.push(repeated);
        }
        Some(_) => {
            let tail = optional.into_iter().rev().fold(None, |tail, copy| {
                let inner = match tail {
                    None => copy,
                    Some(rest) => Node::Seq(vec![copy, rest]),
                };
                Some(Node::Opt(Box::new(inner)))
            });
            required.extend(tail);
        }
    }
    out.node = match required.len() {
        0 => Node::Empty,
        1 => required.pop().unwrap_or(Node::Empty),
        _ => Node::Seq(required),
    };
    Ok(out)
}

impl<'a> Compiler<'a> {
    /// Compile the content model of a complex type
    pub(super) fn content_model(
        &mut self,
        particle: Option<&Particle>,
        mixed: bool,
    ) -> Result<(ContentKind, ModelRef)> {
        let no_elements = if mixed {
            ContentKind::Mixed
        } else {
            ContentKind::Empty
        };
        let Some(particle) = particle else {
            return Ok((no_elements, ModelRef::default()));
        };
        if let Some(group) = self.top_level_all(particle)? {
            let model = self.all_model(particle, group, mixed)?;
            return Ok((ContentKind::All, model));
        }

        let mut stack = Vec::new();
        let fragment = self.lower_particle(particle, &mut stack)?;
        let mut table = PositionTable::default();
        let root = instantiate(&fragment.node, &fragment.positions, &mut table);
        let auto = PositionAutomaton::build(table, &root);
        if auto.is_empty() && auto.nullable {
            return Ok((no_elements, ModelRef::default()));
        }

        let kind = if mixed {
            ContentKind::Mixed
        } else {
            ContentKind::ElementOnly
        };
        let model = match determinize(&auto, self.config)? {
            Automaton::Dfa(dfa) => {
                trace!(states = dfa.states.len(), positions = auto.len(), "content model DFA");
                self.models.push_dfa(dfa)
            }
            Automaton::Nfa(nfa) => self.models.push_nfa(nfa),
        };
        Ok((kind, model))
    }

    /// The `xs:all` group of a particle, directly or through a group reference
    fn top_level_all<'p>(&self, particle: &'p Particle) -> Result<Option<&'p ModelGroup>>
    where
        'a: 'p,
    {
        let group = match &particle.term {
            Term::Group(group) => group,
            Term::GroupRef(name) => self.named_group(name)?,
            _ => return Ok(None),
        };
        Ok((group.compositor == Compositor::All).then_some(group))
    }

    fn named_group(&self, name: &QName) -> Result<&'a ModelGroup> {
        let set = self.set;
        set.groups.get(name).ok_or_else(|| {
            Error::SchemaStructural(format!("reference to unknown model group {}", name))
        })
    }

    fn all_model(
        &mut self,
        particle: &Particle,
        group: &ModelGroup,
        mixed: bool,
    ) -> Result<ModelRef> {
        let occurs = particle.occurs;
        if occurs.min > 1 || occurs.max != Some(1) {
            return Err(Error::ContentModel(format!(
                "an all group must have minOccurs 0 or 1 and maxOccurs 1, found {}..{}",
                occurs.min,
                occurs.max.map_or("unbounded".to_string(), |m| m.to_string())
            )));
        }

        let mut all = AllModel {
            min_occurs: occurs.min as u8,
            mixed,
            ..AllModel::default()
        };
        let mut seen = HashSet::new();
        for member in &group.particles {
            let Term::Element(term) = &member.term else {
                return Err(Error::ContentModel(
                    "an all group may only contain element particles".to_string(),
                ));
            };
            if member.occurs.max.map_or(true, |max| max > 1) || member.occurs.min > 1 {
                return Err(Error::ContentModel(
                    "an element in an all group must occur at most once".to_string(),
                ));
            }
            if member.occurs.max == Some(0) {
                continue;
            }
            let (elem, subst, allows_subst) = match term {
                ElementParticle::Local(index) => {
                    let elem = self.local_element(*index)?;
                    (elem, vec![elem], false)
                }
                ElementParticle::Ref(name) => {
                    let elem = self.global_element(name)?;
                    (elem, self.substitution_closure(elem)?, true)
                }
            };
            let sym = self.elements[elem.index()].name;
            if !seen.insert(sym) {
                return Err(Error::ContentModel(format!(
                    "{} appears twice in an all group",
                    self.element_label(elem)
                )));
            }
            let subst_off = all.subst.len() as u32;
            all.subst.extend_from_slice(&subst);
            all.members.push(AllMember {
                elem,
                optional: member.occurs.min == 0,
                allows_subst,
                subst_off,
                subst_len: subst.len() as u32,
            });
        }
        Ok(self.models.push_all(all))
    }

    fn local_element(&self, index: usize) -> Result<ElementId> {
        self.local_element_ids.get(index).copied().ok_or_else(|| {
            Error::SchemaStructural(format!("reference to unknown local element #{}", index))
        })
    }

    fn global_element(&self, name: &QName) -> Result<ElementId> {
        self.element_ids.get(name).copied().ok_or_else(|| {
            Error::SchemaStructural(format!("reference to unknown element {}", name))
        })
    }

    fn lower_particle(&mut self, particle: &Particle, stack: &mut Vec<QName>) -> Result<Fragment> {
        let occurs = particle.occurs;
        self.config.check_occurs(occurs.min)?;
        if let Some(max) = occurs.max {
            self.config.check_occurs(max)?;
        }
        if !occurs.is_consistent() {
            return Err(Error::ContentModel(format!(
                "minOccurs {} is greater than maxOccurs {}",
                occurs.min,
                occurs.max.unwrap_or_default()
            )));
        }
        if occurs.is_empty() {
            return Ok(Fragment::empty());
        }
        let term = self.lower_term(&particle.term, stack)?;
        repeat(term, occurs.min, occurs.max)
    }

    fn lower_term(&mut self, term: &Term, stack: &mut Vec<QName>) -> Result<Fragment> {
        match term {
            Term::Element(ElementParticle::Local(index)) => {
                let elem = self.local_element(*index)?;
                Ok(self.element_choice(&[elem]))
            }
            Term::Element(ElementParticle::Ref(name)) => {
                let head = self.global_element(name)?;
                let closure = self.substitution_closure(head)?;
                Ok(self.element_choice(&closure))
            }
            Term::Wildcard(def) => {
                let wildcard = Wildcard::from_def(def, self.target_namespace());
                let rule = self.wildcard_rule(&wildcard)?;
                Ok(Fragment {
                    node: Node::Leaf(0),
                    positions: vec![Position::Wildcard(rule)],
                })
            }
            Term::Group(group) => self.lower_group(group, stack),
            Term::GroupRef(name) => {
                if stack.contains(name) {
                    return Err(Error::SchemaStructural(format!(
                        "model group {} refers to itself",
                        name
                    )));
                }
                let group = self.named_group(name)?;
                stack.push(name.clone());
                let fragment = self.lower_group(group, stack);
                stack.pop();
                fragment
            }
        }
    }

    fn lower_group(&mut self, group: &ModelGroup, stack: &mut Vec<QName>) -> Result<Fragment> {
        if group.compositor == Compositor::All {
            return Err(Error::ContentModel(
                "an all group must be the whole content model".to_string(),
            ));
        }
        let mut fragment = Fragment::empty();
        let mut children = Vec::with_capacity(group.particles.len());
        for particle in &group.particles {
            let child = self.lower_particle(particle, stack)?;
            children.push(fragment.absorb(&child));
        }
        fragment.node = match group.compositor {
            Compositor::Choice => Node::Choice(children),
            _ => Node::Seq(children),
        };
        Ok(fragment)
    }

    /// One position per element; an empty list only matches nothing
    fn element_choice(&self, elems: &[ElementId]) -> Fragment {
        let positions: Vec<Position> = elems
            .iter()
            .map(|e| Position::Element {
                sym: self.elements[e.index()].name,
                elem: *e,
            })
            .collect();
        let node = match positions.len() {
            0 => Node::Empty,
            1 => Node::Leaf(0),
            n => Node::Choice((0..n).map(Node::Leaf).collect()),
        };
        Fragment { node, positions }
    }
}
