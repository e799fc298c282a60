//! Type, element and attribute records

use bitflags::bitflags;

use super::ids::{AttributeId, ElementId, SymbolId, TypeId, ValidatorId, WildcardId};
use super::models::ModelRef;
use super::validators::{ValueKeyRef, ValueRef};

bitflags! {
    /// Derivation methods, used for block/final masks and cumulative
    /// ancestor masks
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DerivationMask: u8 {
        /// Derivation by extension
        const EXTENSION = 0b0000_0001;
        /// Derivation by restriction
        const RESTRICTION = 0b0000_0010;
        /// Derivation by list
        const LIST = 0b0000_0100;
        /// Derivation by union
        const UNION = 0b0000_1000;
        /// Substitution group membership (block only)
        const SUBSTITUTION = 0b0001_0000;
    }
}

/// How a type was derived from its base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DerivationMethod {
    /// No base (anyType) or not applicable
    #[default]
    None = 0,
    /// xs:extension
    Extension = 1,
    /// xs:restriction
    Restriction = 2,
    /// xs:list
    List = 3,
    /// xs:union
    Union = 4,
}

impl DerivationMethod {
    /// Mask bit of this method
    pub fn mask(&self) -> DerivationMask {
        match self {
            DerivationMethod::None => DerivationMask::empty(),
            DerivationMethod::Extension => DerivationMask::EXTENSION,
            DerivationMethod::Restriction => DerivationMask::RESTRICTION,
            DerivationMethod::List => DerivationMask::LIST,
            DerivationMethod::Union => DerivationMask::UNION,
        }
    }
}

/// Type record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TypeKind {
    /// Built-in simple type (or anySimpleType)
    #[default]
    Builtin = 1,
    /// User-defined simple type
    Simple = 2,
    /// Complex type, including anyType
    Complex = 3,
}

bitflags! {
    /// Type flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u8 {
        /// Abstract complex type
        const ABSTRACT = 0b0000_0001;
        /// Anonymous type
        const ANONYMOUS = 0b0000_0010;
    }
}

/// One entry of the type table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Type {
    /// Builtin, simple or complex
    pub kind: TypeKind,
    /// Name symbol (`NONE` for anonymous types)
    pub name: SymbolId,
    /// Flags
    pub flags: TypeFlags,
    /// Base type (`NONE` for anyType)
    pub base: TypeId,
    /// Method used to derive from `base`
    pub derivation: DerivationMethod,
    /// Derivations this type forbids
    pub final_mask: DerivationMask,
    /// Substitutions this type blocks
    pub block_mask: DerivationMask,
    /// Offset into the ancestor arrays
    pub anc_off: u32,
    /// Number of ancestors
    pub anc_len: u32,
    /// Value validator (simple types, simple content)
    pub validator: ValidatorId,
    /// Index into the complex-type table (0 when not complex)
    pub complex: u32,
}

impl Type {
    /// Whether the type is abstract
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(TypeFlags::ABSTRACT)
    }

    /// Whether the record is a simple type (builtin or user-defined)
    pub fn is_simple(&self) -> bool {
        self.kind != TypeKind::Complex
    }
}

/// Flat ancestor arrays shared by every type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ancestors {
    /// Ancestor ids, nearest first, per type
    pub ids: Vec<TypeId>,
    /// Cumulative derivation mask up to the matching entry of `ids`
    pub masks: Vec<DerivationMask>,
}

/// Content of a complex type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ContentKind {
    /// No character or element content
    #[default]
    Empty = 0,
    /// Character content checked by a validator
    Simple = 1,
    /// Elements interleaved with character data
    Mixed = 2,
    /// Elements only
    ElementOnly = 3,
    /// xs:all group
    All = 4,
}

/// Shape of a per-type attribute-use index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AttrIndexMode {
    /// Declaration order, scanned linearly
    #[default]
    Linear = 0,
    /// Sorted by symbol id, binary searched
    Sorted = 1,
    /// Open-addressed hash table
    Hash = 2,
}

/// Reference to the attribute uses of one complex type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttrIndexRef {
    /// Offset into the attribute-use pool
    pub off: u32,
    /// Number of uses
    pub len: u32,
    /// Index shape
    pub mode: AttrIndexMode,
    /// Index into the attribute hash-table pool (hash mode only)
    pub hash_table: u32,
}

/// One entry of the complex-type side table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComplexType {
    /// Content kind
    pub content: ContentKind,
    /// Attribute uses
    pub attributes: AttrIndexRef,
    /// Attribute wildcard (`NONE` when absent)
    pub any_attribute: WildcardId,
    /// Validator of simple content
    pub text_validator: ValidatorId,
    /// Default or fixed value of the character content
    pub text_value: ValueConstraint,
    /// Compiled content model
    pub model: ModelRef,
    /// Mixed content flag
    pub mixed: bool,
}

impl ComplexType {
    /// Whether the type has an attribute wildcard
    pub fn has_any_attribute(&self) -> bool {
        self.any_attribute.is_some()
    }
}

/// Whether a value constraint is a default or a fixed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ConstraintMode {
    /// No default or fixed value
    #[default]
    None = 0,
    /// `default="..."`
    Default = 1,
    /// `fixed="..."`
    Fixed = 2,
}

/// A canonicalized default or fixed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValueConstraint {
    /// Default, fixed or none
    pub mode: ConstraintMode,
    /// Canonical lexical form
    pub canonical: ValueRef,
    /// Value key
    pub key: ValueKeyRef,
    /// Union member type that accepted the value (`NONE` otherwise)
    pub member_type: TypeId,
}

impl ValueConstraint {
    /// Whether a value is present
    pub fn is_present(&self) -> bool {
        self.mode != ConstraintMode::None
    }
}

bitflags! {
    /// Element declaration flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ElementFlags: u8 {
        /// nillable="true"
        const NILLABLE = 0b0000_0001;
        /// abstract="true"
        const ABSTRACT = 0b0000_0010;
        /// Top-level declaration
        const GLOBAL = 0b0000_0100;
    }
}

/// One entry of the element table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Element {
    /// Name symbol
    pub name: SymbolId,
    /// Declared (or inherited) type
    pub type_id: TypeId,
    /// Substitution-group head
    pub subst_head: ElementId,
    /// Default or fixed value
    pub value: ValueConstraint,
    /// Flags
    pub flags: ElementFlags,
    /// block mask
    pub block: DerivationMask,
    /// final mask
    pub final_mask: DerivationMask,
    /// Offset into the per-element identity-constraint ids
    pub ic_off: u32,
    /// Number of identity constraints
    pub ic_len: u32,
}

impl Element {
    /// Whether the element is abstract
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(ElementFlags::ABSTRACT)
    }

    /// Whether the element is nillable
    pub fn is_nillable(&self) -> bool {
        self.flags.contains(ElementFlags::NILLABLE)
    }
}

/// One entry of the global attribute table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attribute {
    /// Name symbol
    pub name: SymbolId,
    /// Simple type
    pub type_id: TypeId,
    /// Value validator
    pub validator: ValidatorId,
    /// Default or fixed value
    pub value: ValueConstraint,
}

/// Attribute use mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AttrUseMode {
    /// use="optional"
    #[default]
    Optional = 0,
    /// use="required"
    Required = 1,
    /// use="prohibited"
    Prohibited = 2,
}

/// One attribute use of a complex type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttrUse {
    /// Name symbol
    pub name: SymbolId,
    /// Global declaration the use refers to (`NONE` for local attributes)
    pub decl: AttributeId,
    /// Simple type
    pub type_id: TypeId,
    /// Value validator
    pub validator: ValidatorId,
    /// Use mode
    pub mode: AttrUseMode,
    /// Default or fixed value of the use
    pub value: ValueConstraint,
}

/// Declared notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Notation {
    /// Name symbol
    pub name: SymbolId,
    /// Public identifier
    pub public: ValueRef,
    /// System identifier
    pub system: ValueRef,
}
