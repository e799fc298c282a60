//! Simple and complex type definitions

use super::declarations::AttributeUseDef;
use super::particles::Particle;
use super::wildcards::WildcardDef;
use crate::namespaces::QName;
use crate::runtime::types::{DerivationMask, DerivationMethod};
use crate::values::WhiteSpace;

/// Reference to a type definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A global or built-in type by name
    Named(QName),
    /// An anonymous type, by index into `SchemaSet::anonymous_types`
    Anonymous(usize),
    /// A name the semantic layer failed to resolve
    Unresolved(QName),
}

impl TypeRef {
    /// Reference to a built-in type such as `string`
    pub fn builtin(local_name: &str) -> Self {
        TypeRef::Named(QName::xsd(local_name))
    }

    /// Reference to a named type
    pub fn named(name: QName) -> Self {
        TypeRef::Named(name)
    }
}

/// Which bound a range facet sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeBound {
    /// minInclusive
    MinInclusive,
    /// maxInclusive
    MaxInclusive,
    /// minExclusive
    MinExclusive,
    /// maxExclusive
    MaxExclusive,
}

/// A constraining facet of a restriction step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Facet {
    /// xs:pattern (XSD regex syntax)
    Pattern(String),
    /// xs:enumeration (lexical value)
    Enumeration(String),
    /// xs:length
    Length(u32),
    /// xs:minLength
    MinLength(u32),
    /// xs:maxLength
    MaxLength(u32),
    /// xs:totalDigits
    TotalDigits(u32),
    /// xs:fractionDigits
    FractionDigits(u32),
    /// min/max Inclusive/Exclusive (lexical value)
    Range(RangeBound, String),
    /// xs:whiteSpace
    WhiteSpace(WhiteSpace),
}

/// Variety of a user-defined simple type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleVariety {
    /// xs:restriction
    Restriction {
        /// Base type
        base: TypeRef,
        /// Facets of this step
        facets: Vec<Facet>,
    },
    /// xs:list
    List {
        /// Item type
        item: TypeRef,
    },
    /// xs:union
    Union {
        /// Member types, in declaration order
        members: Vec<TypeRef>,
    },
}

/// A user-defined simple type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleTypeDef {
    /// Variety
    pub variety: SimpleVariety,
    /// final mask
    pub final_mask: DerivationMask,
}

impl SimpleTypeDef {
    /// Restriction of `base` by `facets`
    pub fn restriction(base: TypeRef, facets: Vec<Facet>) -> Self {
        Self {
            variety: SimpleVariety::Restriction { base, facets },
            final_mask: DerivationMask::empty(),
        }
    }

    /// List of `item`
    pub fn list(item: TypeRef) -> Self {
        Self {
            variety: SimpleVariety::List { item },
            final_mask: DerivationMask::empty(),
        }
    }

    /// Union of `members`
    pub fn union(members: Vec<TypeRef>) -> Self {
        Self {
            variety: SimpleVariety::Union { members },
            final_mask: DerivationMask::empty(),
        }
    }

    /// Set the final mask
    pub fn with_final(mut self, mask: DerivationMask) -> Self {
        self.final_mask = mask;
        self
    }
}

/// Content of a complex type as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplexContent {
    /// xs:simpleContent; `facets` apply to restrictions
    Simple {
        /// Facets of a simpleContent restriction
        facets: Vec<Facet>,
    },
    /// Element content; `None` for empty content
    Particle(Option<Particle>),
}

/// A complex type
///
/// `content` and `attributes` hold what this definition declares itself;
/// the compiler combines them with the base type's along the derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexTypeDef {
    /// Base type (`None` means a restriction of anyType)
    pub base: Option<TypeRef>,
    /// Extension or restriction
    pub derivation: DerivationMethod,
    /// Content
    pub content: ComplexContent,
    /// Attribute uses declared by this type
    pub attributes: Vec<AttributeUseDef>,
    /// Referenced attribute groups
    pub attribute_groups: Vec<QName>,
    /// xs:anyAttribute
    pub any_attribute: Option<WildcardDef>,
    /// mixed="true"
    pub mixed: bool,
    /// abstract="true"
    pub is_abstract: bool,
    /// block mask
    pub block: DerivationMask,
    /// final mask
    pub final_mask: DerivationMask,
    /// Default value of the character content
    pub text_default: Option<String>,
    /// Fixed value of the character content
    pub text_fixed: Option<String>,
}

impl Default for ComplexTypeDef {
    fn default() -> Self {
        Self {
            base: None,
            derivation: DerivationMethod::Restriction,
            content: ComplexContent::Particle(None),
            attributes: Vec::new(),
            attribute_groups: Vec::new(),
            any_attribute: None,
            mixed: false,
            is_abstract: false,
            block: DerivationMask::empty(),
            final_mask: DerivationMask::empty(),
            text_default: None,
            text_fixed: None,
        }
    }
}

impl ComplexTypeDef {
    /// Empty-content type derived from anyType
    pub fn new() -> Self {
        Self::default()
    }

    /// Element-content type derived from anyType
    pub fn with_particle(particle: Particle) -> Self {
        Self {
            content: ComplexContent::Particle(Some(particle)),
            ..Self::default()
        }
    }

    /// Complex-content extension of `base`
    pub fn extension(base: TypeRef, particle: Option<Particle>) -> Self {
        Self {
            base: Some(base),
            derivation: DerivationMethod::Extension,
            content: ComplexContent::Particle(particle),
            ..Self::default()
        }
    }

    /// Complex-content restriction of `base`
    pub fn restriction(base: TypeRef, particle: Option<Particle>) -> Self {
        Self {
            base: Some(base),
            derivation: DerivationMethod::Restriction,
            content: ComplexContent::Particle(particle),
            ..Self::default()
        }
    }

    /// Simple-content extension of `base`
    pub fn simple_extension(base: TypeRef) -> Self {
        Self {
            base: Some(base),
            derivation: DerivationMethod::Extension,
            content: ComplexContent::Simple { facets: Vec::new() },
            ..Self::default()
        }
    }

    /// Simple-content restriction of `base`
    pub fn simple_restriction(base: TypeRef, facets: Vec<Facet>) -> Self {
        Self {
            base: Some(base),
            derivation: DerivationMethod::Restriction,
            content: ComplexContent::Simple { facets },
            ..Self::default()
        }
    }

    /// Add an attribute use
    pub fn with_attribute(mut self, attribute: AttributeUseDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Set the default of the character content
    pub fn with_text_default(mut self, value: impl Into<String>) -> Self {
        self.text_default = Some(value.into());
        self
    }

    /// Set the fixed value of the character content
    pub fn with_text_fixed(mut self, value: impl Into<String>) -> Self {
        self.text_fixed = Some(value.into());
        self
    }

    /// Add an attribute-group reference
    pub fn with_attribute_group(mut self, name: QName) -> Self {
        self.attribute_groups.push(name);
        self
    }

    /// Set the attribute wildcard
    pub fn with_any_attribute(mut self, wildcard: WildcardDef) -> Self {
        self.any_attribute = Some(wildcard);
        self
    }

    /// Set mixed content
    pub fn with_mixed(mut self, mixed: bool) -> Self {
        self.mixed = mixed;
        self
    }

    /// Set abstract
    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    /// Set the block mask
    pub fn with_block(mut self, mask: DerivationMask) -> Self {
        self.block = mask;
        self
    }

    /// Set the final mask
    pub fn with_final(mut self, mask: DerivationMask) -> Self {
        self.final_mask = mask;
        self
    }

    /// Whether the content is simple
    pub fn has_simple_content(&self) -> bool {
        matches!(self.content, ComplexContent::Simple { .. })
    }
}

/// A simple or complex type definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDef {
    /// Simple type
    Simple(SimpleTypeDef),
    /// Complex type
    Complex(ComplexTypeDef),
}

impl From<SimpleTypeDef> for TypeDef {
    fn from(def: SimpleTypeDef) -> Self {
        TypeDef::Simple(def)
    }
}

impl From<ComplexTypeDef> for TypeDef {
    fn from(def: ComplexTypeDef) -> Self {
        TypeDef::Complex(def)
    }
}
