//! Element, attribute, identity-constraint and notation declarations

use super::types::TypeRef;
use super::wildcards::WildcardDef;
use crate::namespaces::QName;
use crate::runtime::identity::IcCategory;
use crate::runtime::types::{AttrUseMode, DerivationMask};

/// An element declaration, global or local
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDecl {
    /// Effective name (namespace already decided by form)
    pub name: QName,
    /// Declared type; `None` takes the substitution head's type or anyType
    pub type_ref: Option<TypeRef>,
    /// substitutionGroup head (global elements only)
    pub substitution_group: Option<QName>,
    /// default="..."
    pub default: Option<String>,
    /// fixed="..."
    pub fixed: Option<String>,
    /// nillable="true"
    pub nillable: bool,
    /// abstract="true"
    pub is_abstract: bool,
    /// Effective block mask
    pub block: DerivationMask,
    /// Effective final mask
    pub final_mask: DerivationMask,
    /// unique, key and keyref children
    pub identity_constraints: Vec<IdentityConstraintDef>,
}

impl ElementDecl {
    /// Declaration with no type
    pub fn new(name: QName) -> Self {
        Self {
            name,
            type_ref: None,
            substitution_group: None,
            default: None,
            fixed: None,
            nillable: false,
            is_abstract: false,
            block: DerivationMask::empty(),
            final_mask: DerivationMask::empty(),
            identity_constraints: Vec::new(),
        }
    }

    /// Set the type
    pub fn with_type(mut self, type_ref: TypeRef) -> Self {
        self.type_ref = Some(type_ref);
        self
    }

    /// Join a substitution group
    pub fn with_substitution_group(mut self, head: QName) -> Self {
        self.substitution_group = Some(head);
        self
    }

    /// Set a default value
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set a fixed value
    pub fn with_fixed(mut self, value: impl Into<String>) -> Self {
        self.fixed = Some(value.into());
        self
    }

    /// Set nillable
    pub fn with_nillable(mut self, nillable: bool) -> Self {
        self.nillable = nillable;
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

    /// Attach an identity constraint
    pub fn with_identity_constraint(mut self, ic: IdentityConstraintDef) -> Self {
        self.identity_constraints.push(ic);
        self
    }
}

/// An attribute declaration, global or local
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    /// Effective name
    pub name: QName,
    /// Simple type; `None` means anySimpleType
    pub type_ref: Option<TypeRef>,
    /// default="..."
    pub default: Option<String>,
    /// fixed="..."
    pub fixed: Option<String>,
}

impl AttributeDecl {
    /// Declaration of anySimpleType
    pub fn new(name: QName) -> Self {
        Self {
            name,
            type_ref: None,
            default: None,
            fixed: None,
        }
    }

    /// Set the type
    pub fn with_type(mut self, type_ref: TypeRef) -> Self {
        self.type_ref = Some(type_ref);
        self
    }

    /// Set a default value
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set a fixed value
    pub fn with_fixed(mut self, value: impl Into<String>) -> Self {
        self.fixed = Some(value.into());
        self
    }
}

/// The attribute an attribute use points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeTarget {
    /// Declared in place
    Local(AttributeDecl),
    /// Reference to a global attribute
    Ref(QName),
}

/// An attribute use inside a complex type or attribute group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUseDef {
    /// Declaration
    pub target: AttributeTarget,
    /// use="..."
    pub mode: AttrUseMode,
    /// default="..." on the use
    pub default: Option<String>,
    /// fixed="..." on the use
    pub fixed: Option<String>,
}

impl AttributeUseDef {
    /// Use of a local declaration
    pub fn local(decl: AttributeDecl) -> Self {
        Self {
            target: AttributeTarget::Local(decl),
            mode: AttrUseMode::Optional,
            default: None,
            fixed: None,
        }
    }

    /// Use of a global attribute
    pub fn reference(name: QName) -> Self {
        Self {
            target: AttributeTarget::Ref(name),
            mode: AttrUseMode::Optional,
            default: None,
            fixed: None,
        }
    }

    /// Set the use mode
    pub fn with_mode(mut self, mode: AttrUseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Make the use required
    pub fn required(self) -> Self {
        self.with_mode(AttrUseMode::Required)
    }

    /// Make the use prohibited
    pub fn prohibited(self) -> Self {
        self.with_mode(AttrUseMode::Prohibited)
    }

    /// Set a default value on the use
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set a fixed value on the use
    pub fn with_fixed(mut self, value: impl Into<String>) -> Self {
        self.fixed = Some(value.into());
        self
    }

    /// Name of the attribute
    pub fn name(&self) -> &QName {
        match &self.target {
            AttributeTarget::Local(decl) => &decl.name,
            AttributeTarget::Ref(name) => name,
        }
    }
}

/// A named attribute group
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeGroupDef {
    /// Attribute uses
    pub attributes: Vec<AttributeUseDef>,
    /// Nested attribute-group references
    pub attribute_groups: Vec<QName>,
    /// xs:anyAttribute
    pub any_attribute: Option<WildcardDef>,
}

impl AttributeGroupDef {
    /// Empty group
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute use
    pub fn with_attribute(mut self, attribute: AttributeUseDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add a nested group reference
    pub fn with_attribute_group(mut self, name: QName) -> Self {
        self.attribute_groups.push(name);
        self
    }

    /// Set the attribute wildcard
    pub fn with_any_attribute(mut self, wildcard: WildcardDef) -> Self {
        self.any_attribute = Some(wildcard);
        self
    }
}

/// xs:unique, xs:key or xs:keyref
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConstraintDef {
    /// Name
    pub name: QName,
    /// Category
    pub category: IcCategory,
    /// Selector XPath
    pub selector: String,
    /// Field XPaths
    pub fields: Vec<String>,
    /// Referenced key or unique (keyref only)
    pub refer: Option<QName>,
}

impl IdentityConstraintDef {
    /// Constraint of the given category
    pub fn new(name: QName, category: IcCategory, selector: impl Into<String>) -> Self {
        Self {
            name,
            category,
            selector: selector.into(),
            fields: Vec::new(),
            refer: None,
        }
    }

    /// Add a field
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Set the referenced constraint
    pub fn with_refer(mut self, name: QName) -> Self {
        self.refer = Some(name);
        self
    }
}

/// xs:notation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotationDecl {
    /// public="..."
    pub public: Option<String>,
    /// system="..."
    pub system: Option<String>,
}
