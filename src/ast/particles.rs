//! Particles and model groups
//!
//! A particle pairs an occurrence range with a term: an element, a
//! wildcard, an inline model group or a reference to a named group.

use super::wildcards::WildcardDef;
use crate::namespaces::QName;

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Check if this particle can be empty (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if this particle is empty (maxOccurs == 0)
    pub fn is_empty(&self) -> bool {
        self.max == Some(0)
    }

    /// Check if particle has maxOccurs == 1
    pub fn is_single(&self) -> bool {
        self.max == Some(1)
    }

    /// Whether min <= max
    pub fn is_consistent(&self) -> bool {
        self.max.map_or(true, |max| self.min <= max)
    }
}

/// Model group compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compositor {
    /// xs:sequence
    Sequence,
    /// xs:choice
    Choice,
    /// xs:all
    All,
}

/// An inline or named model group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelGroup {
    /// Compositor
    pub compositor: Compositor,
    /// Children, in document order
    pub particles: Vec<Particle>,
}

impl ModelGroup {
    /// Create a group
    pub fn new(compositor: Compositor, particles: Vec<Particle>) -> Self {
        Self {
            compositor,
            particles,
        }
    }
}

/// Element term of a particle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementParticle {
    /// Local declaration, by index into `SchemaSet::local_elements`
    Local(usize),
    /// Reference to a global declaration
    Ref(QName),
}

/// What a particle matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// An element declaration
    Element(ElementParticle),
    /// xs:any
    Wildcard(WildcardDef),
    /// Inline model group
    Group(ModelGroup),
    /// Reference to a named model group
    GroupRef(QName),
}

/// A term with its occurrence range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Particle {
    /// Occurrence range
    pub occurs: Occurs,
    /// Term
    pub term: Term,
}

impl Particle {
    /// Particle occurring exactly once
    pub fn new(term: Term) -> Self {
        Self {
            occurs: Occurs::once(),
            term,
        }
    }

    /// Local element particle
    pub fn local(index: usize) -> Self {
        Self::new(Term::Element(ElementParticle::Local(index)))
    }

    /// Global element reference particle
    pub fn element_ref(name: QName) -> Self {
        Self::new(Term::Element(ElementParticle::Ref(name)))
    }

    /// Wildcard particle
    pub fn any(wildcard: WildcardDef) -> Self {
        Self::new(Term::Wildcard(wildcard))
    }

    /// xs:sequence particle
    pub fn sequence(particles: Vec<Particle>) -> Self {
        Self::new(Term::Group(ModelGroup::new(Compositor::Sequence, particles)))
    }

    /// xs:choice particle
    pub fn choice(particles: Vec<Particle>) -> Self {
        Self::new(Term::Group(ModelGroup::new(Compositor::Choice, particles)))
    }

    /// xs:all particle
    pub fn all(particles: Vec<Particle>) -> Self {
        Self::new(Term::Group(ModelGroup::new(Compositor::All, particles)))
    }

    /// Named group reference particle
    pub fn group_ref(name: QName) -> Self {
        Self::new(Term::GroupRef(name))
    }

    /// Set the occurrence range
    pub fn with_occurs(mut self, min: u32, max: Option<u32>) -> Self {
        self.occurs = Occurs::new(min, max);
        self
    }
}
