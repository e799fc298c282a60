//! Resolved schema AST
//!
//! The compiler's input: every component of a schema set with references
//! already resolved to names or arena indices. Global components are kept
//! in registry order; local elements and anonymous types live in arenas and
//! are referred to by index.

pub mod declarations;
pub mod particles;
pub mod types;
pub mod wildcards;

use indexmap::IndexMap;

pub use declarations::{
    AttributeDecl, AttributeGroupDef, AttributeTarget, AttributeUseDef, ElementDecl,
    IdentityConstraintDef, NotationDecl,
};
pub use particles::{Compositor, ElementParticle, ModelGroup, Occurs, Particle, Term};
pub use types::{
    ComplexContent, ComplexTypeDef, Facet, RangeBound, SimpleTypeDef, SimpleVariety, TypeDef,
    TypeRef,
};
pub use wildcards::{NamespaceConstraint, NamespaceItem, ProcessContents, WildcardDef};

use crate::namespaces::{NamespaceContext, QName};

/// A resolved schema set
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    /// Target namespace of the main schema document
    pub target_namespace: Option<String>,
    /// Prefix bindings for QName values and XPath expressions
    pub namespaces: NamespaceContext,
    /// Global element declarations
    pub elements: IndexMap<QName, ElementDecl>,
    /// Global attribute declarations
    pub attributes: IndexMap<QName, AttributeDecl>,
    /// Global type definitions
    pub types: IndexMap<QName, TypeDef>,
    /// Named model groups
    pub groups: IndexMap<QName, ModelGroup>,
    /// Named attribute groups
    pub attribute_groups: IndexMap<QName, AttributeGroupDef>,
    /// Notation declarations
    pub notations: IndexMap<QName, NotationDecl>,
    /// Local element declarations
    pub local_elements: Vec<ElementDecl>,
    /// Anonymous type definitions
    pub anonymous_types: Vec<TypeDef>,
}

impl SchemaSet {
    /// Create an empty set
    pub fn new(target_namespace: Option<&str>) -> Self {
        Self {
            target_namespace: target_namespace.map(String::from),
            namespaces: NamespaceContext::new(),
            ..Self::default()
        }
    }

    /// Name in the target namespace
    pub fn qname(&self, local_name: &str) -> QName {
        QName::new(self.target_namespace.clone(), local_name)
    }

    /// Bind a prefix
    pub fn with_prefix(mut self, prefix: &str, namespace: &str) -> Self {
        self.namespaces.add_prefix(prefix, namespace);
        self
    }

    /// Add a global element, returning its name
    pub fn add_element(&mut self, decl: ElementDecl) -> QName {
        let name = decl.name.clone();
        self.elements.insert(name.clone(), decl);
        name
    }

    /// Add a global attribute, returning its name
    pub fn add_attribute(&mut self, decl: AttributeDecl) -> QName {
        let name = decl.name.clone();
        self.attributes.insert(name.clone(), decl);
        name
    }

    /// Add a global type, returning a reference to it
    pub fn add_type(&mut self, name: QName, def: impl Into<TypeDef>) -> TypeRef {
        self.types.insert(name.clone(), def.into());
        TypeRef::Named(name)
    }

    /// Add a named model group
    pub fn add_group(&mut self, name: QName, group: ModelGroup) -> QName {
        self.groups.insert(name.clone(), group);
        name
    }

    /// Add a named attribute group
    pub fn add_attribute_group(&mut self, name: QName, group: AttributeGroupDef) -> QName {
        self.attribute_groups.insert(name.clone(), group);
        name
    }

    /// Add a notation
    pub fn add_notation(&mut self, name: QName, decl: NotationDecl) -> QName {
        self.notations.insert(name.clone(), decl);
        name
    }

    /// Add a local element, returning its index
    pub fn add_local_element(&mut self, decl: ElementDecl) -> usize {
        self.local_elements.push(decl);
        self.local_elements.len() - 1
    }

    /// Add an anonymous type, returning a reference to it
    pub fn add_anonymous_type(&mut self, def: impl Into<TypeDef>) -> TypeRef {
        self.anonymous_types.push(def.into());
        TypeRef::Anonymous(self.anonymous_types.len() - 1)
    }

    /// Type definition behind a non-builtin reference
    pub fn type_def(&self, type_ref: &TypeRef) -> Option<&TypeDef> {
        match type_ref {
            TypeRef::Named(name) => self.types.get(name),
            TypeRef::Anonymous(index) => self.anonymous_types.get(*index),
            TypeRef::Unresolved(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_assign_indices() {
        let mut set = SchemaSet::new(Some("urn:test"));
        let name = set.qname("root");
        assert_eq!(name.namespace.as_deref(), Some("urn:test"));

        let ty = set.add_anonymous_type(ComplexTypeDef::new());
        assert_eq!(ty, TypeRef::Anonymous(0));
        let local = set.add_local_element(ElementDecl::new(QName::local("a")));
        assert_eq!(local, 0);
        set.add_element(ElementDecl::new(name.clone()).with_type(ty.clone()));

        assert!(set.elements.contains_key(&name));
        assert!(matches!(set.type_def(&ty), Some(TypeDef::Complex(_))));
        assert!(set.type_def(&TypeRef::builtin("string")).is_none());
    }
}
