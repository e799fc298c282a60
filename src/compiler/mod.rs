//! Schema compiler
//!
//! Lowers a resolved [`SchemaSet`] into a sealed runtime [`Schema`]. The
//! compiler runs in fixed phases over the whole set:
//!
//! 1. reserve type ids (built-ins first, then globals, then anonymous types)
//! 2. type headers and the ancestor arrays
//! 3. notations and simple-type validators
//! 4. global attributes and element headers
//! 5. complex types: effective content, attribute uses, content models
//! 6. element value constraints and identity constraints
//! 7. global indices, interner sealing and the build fingerprint
//!
//! Every table is dense and addressed by typed ids; slot 0 of each table is
//! a placeholder so that id 0 can mean "none".

mod ancestors;
mod attributes;
pub mod bitset;
pub mod builtins;
mod complex;
mod content;
pub mod determinize;
mod elements;
mod facets;
pub mod glushkov;
mod identity;
pub mod patterns;
mod simple;
mod substitution;
mod values;
pub mod wildcards;

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::ast::{ElementDecl, Particle, SchemaSet, TypeDef, TypeRef};
use crate::error::{Error, Result, TableError};
use crate::hashing::HashIndex;
use crate::limits::BuildConfig;
use crate::namespaces::QName;
use crate::runtime::check::ValueChecker;
use crate::runtime::identity::IdentityTables;
use crate::runtime::ids::{
    AttributeId, ElementId, IcId, NamespaceId, PatternId, SymbolId, TypeId, ValidatorId,
};
use crate::runtime::models::Models;
use crate::runtime::symbols::{NamespaceInterner, PredefinedSymbols, SymbolInterner};
use crate::runtime::types::{
    Ancestors, AttrUse, Attribute, ComplexType, Element, Notation, Type, TypeFlags, TypeKind,
};
use crate::runtime::validators::{
    EnumTable, FacetInstr, FacetProgramRef, PatternTable, ValidatorBundle, ValueBlob,
};
use crate::runtime::wildcards::WildcardTable;
use crate::runtime::{fingerprint, Schema};

use attributes::AttrSet;
use builtins::{BuiltinType, BUILTIN_TYPES, XSD_ANY_SIMPLE_TYPE, XSD_ANY_TYPE};

/// Compile a resolved schema set into a runtime schema
pub fn compile(set: &SchemaSet, config: &BuildConfig) -> Result<Schema> {
    debug!(
        target_namespace = set.target_namespace.as_deref().unwrap_or(""),
        elements = set.elements.len(),
        types = set.types.len(),
        anonymous_types = set.anonymous_types.len(),
        local_elements = set.local_elements.len(),
        "compiling schema set"
    );
    let mut compiler = Compiler::new(set, config)?;
    compiler.run()?;
    let schema = compiler.finish()?;
    debug!(
        types = schema.types().len() - 1,
        elements = schema.elements().len() - 1,
        validators = schema.validators().len() - 1,
        dfas = schema.models().dfas.len(),
        nfas = schema.models().nfas.len(),
        build_hash = schema.build_hash(),
        "schema compiled"
    );
    Ok(schema)
}

/// Where a type id came from
#[derive(Debug, Clone, Copy)]
enum TypeSource<'a> {
    Placeholder,
    Builtin(&'static BuiltinType),
    User(&'a TypeDef),
}

/// Working state of one compilation
pub(crate) struct Compiler<'a> {
    set: &'a SchemaSet,
    config: &'a BuildConfig,
    namespaces: NamespaceInterner,
    symbols: SymbolInterner,
    predefined: PredefinedSymbols,

    types: Vec<Type>,
    sources: Vec<TypeSource<'a>>,
    labels: Vec<String>,
    type_ids: HashMap<QName, TypeId>,
    anon_type_ids: Vec<TypeId>,
    ancestors: Ancestors,
    complex_types: Vec<ComplexType>,
    any_type: TypeId,
    any_simple_type: TypeId,

    elements: Vec<Element>,
    element_decls: Vec<Option<&'a ElementDecl>>,
    element_ids: HashMap<QName, ElementId>,
    local_element_ids: Vec<ElementId>,
    subst_members: HashMap<ElementId, Vec<ElementId>>,
    closures: HashMap<ElementId, Vec<ElementId>>,

    attributes: Vec<Attribute>,
    attribute_ids: HashMap<QName, AttributeId>,
    attr_uses: Vec<AttrUse>,
    attr_tables: Vec<HashIndex>,

    validators: ValidatorBundle,
    facets: Vec<FacetInstr>,
    patterns: PatternTable,
    pattern_cache: HashMap<String, PatternId>,
    enums: EnumTable,
    values: ValueBlob,
    notations: Vec<Notation>,
    models: Models,
    wildcards: WildcardTable,
    identity: IdentityTables,
    ic_ids: HashMap<QName, IcId>,
    pending_keyrefs: Vec<(IcId, QName, QName)>,

    simple_visiting: HashSet<TypeId>,
    complex_visiting: HashSet<TypeId>,
    effective_particles: HashMap<TypeId, Option<Particle>>,
    effective_attributes: HashMap<TypeId, AttrSet>,
}

impl<'a> Compiler<'a> {
    fn new(set: &'a SchemaSet, config: &'a BuildConfig) -> Result<Self> {
        let namespaces = NamespaceInterner::new();
        let mut symbols = SymbolInterner::new();
        let predefined = PredefinedSymbols::intern(&mut symbols)?;
        Ok(Self {
            set,
            config,
            namespaces,
            symbols,
            predefined,
            types: vec![Type::default()],
            sources: vec![TypeSource::Placeholder],
            labels: vec![String::new()],
            type_ids: HashMap::new(),
            anon_type_ids: Vec::new(),
            ancestors: Ancestors::default(),
            complex_types: vec![ComplexType::default()],
            any_type: TypeId::NONE,
            any_simple_type: TypeId::NONE,
            elements: vec![Element::default()],
            element_decls: vec![None],
            element_ids: HashMap::new(),
            local_element_ids: Vec::new(),
            subst_members: HashMap::new(),
            closures: HashMap::new(),
            attributes: vec![Attribute::default()],
            attribute_ids: HashMap::new(),
            attr_uses: Vec::new(),
            attr_tables: vec![HashIndex::default()],
            validators: ValidatorBundle::default(),
            facets: Vec::new(),
            patterns: PatternTable::new(),
            pattern_cache: HashMap::new(),
            enums: EnumTable::new(),
            values: ValueBlob::new(),
            notations: vec![Notation::default()],
            models: Models::default(),
            wildcards: WildcardTable::default(),
            identity: IdentityTables::default(),
            ic_ids: HashMap::new(),
            pending_keyrefs: Vec::new(),
            simple_visiting: HashSet::new(),
            complex_visiting: HashSet::new(),
            effective_particles: HashMap::new(),
            effective_attributes: HashMap::new(),
        })
    }

    fn run(&mut self) -> Result<()> {
        self.reserve_types()?;
        self.type_headers()?;
        self.compute_ancestors()?;
        self.compile_notations()?;

        for index in 1..self.types.len() {
            if self.types[index].is_simple() {
                self.simple_validator(TypeId::from_index(index))?;
            }
        }

        self.compile_global_attributes()?;
        self.reserve_elements()?;
        self.element_types()?;

        for index in 1..self.types.len() {
            if !self.types[index].is_simple() {
                self.complex_type(TypeId::from_index(index))?;
            }
        }

        self.element_constraints()?;
        self.resolve_keyrefs()?;
        Ok(())
    }

    fn reserve_types(&mut self) -> Result<()> {
        for builtin in BUILTIN_TYPES.iter() {
            let name = QName::xsd(builtin.name);
            let sym = self.intern_qname(&name)?;
            let kind = if builtin.name == XSD_ANY_TYPE {
                TypeKind::Complex
            } else {
                TypeKind::Builtin
            };
            let ty = Type {
                kind,
                name: sym,
                ..Type::default()
            };
            let id = self.push_type(ty, TypeSource::Builtin(builtin), format!("type {}", name));
            self.type_ids.insert(name, id);
        }
        self.any_type = self.builtin_id(XSD_ANY_TYPE)?;
        self.any_simple_type = self.builtin_id(XSD_ANY_SIMPLE_TYPE)?;

        let set = self.set;
        for (name, def) in &set.types {
            if self.type_ids.contains_key(name) {
                return Err(Error::SchemaStructural(format!(
                    "type {} redefines a built-in type",
                    name
                )));
            }
            let sym = self.intern_qname(name)?;
            let ty = Self::user_type_record(sym, TypeFlags::empty(), def);
            let id = self.push_type(ty, TypeSource::User(def), format!("type {}", name));
            self.type_ids.insert(name.clone(), id);
        }
        for (index, def) in set.anonymous_types.iter().enumerate() {
            let ty = Self::user_type_record(SymbolId::NONE, TypeFlags::ANONYMOUS, def);
            let id = self.push_type(
                ty,
                TypeSource::User(def),
                format!("anonymous type #{}", index),
            );
            self.anon_type_ids.push(id);
        }
        Ok(())
    }

    fn user_type_record(name: SymbolId, mut flags: TypeFlags, def: &TypeDef) -> Type {
        match def {
            TypeDef::Simple(simple) => Type {
                kind: TypeKind::Simple,
                name,
                flags,
                final_mask: simple.final_mask,
                ..Type::default()
            },
            TypeDef::Complex(complex) => {
                if complex.is_abstract {
                    flags |= TypeFlags::ABSTRACT;
                }
                Type {
                    kind: TypeKind::Complex,
                    name,
                    flags,
                    final_mask: complex.final_mask,
                    block_mask: complex.block,
                    ..Type::default()
                }
            }
        }
    }

    fn push_type(&mut self, ty: Type, source: TypeSource<'a>, label: String) -> TypeId {
        self.types.push(ty);
        self.sources.push(source);
        self.labels.push(label);
        TypeId::from_index(self.types.len() - 1)
    }

    fn builtin_id(&self, local: &str) -> Result<TypeId> {
        self.type_ids.get(&QName::xsd(local)).copied().ok_or_else(|| {
            TableError::MalformedTable(format!("built-in type {} is not registered", local))
                .into()
        })
    }

    /// Diagnostic name of a type
    fn label(&self, id: TypeId) -> &str {
        self.labels.get(id.index()).map_or("type ?", String::as_str)
    }

    /// Type id behind a reference
    fn resolve_type(&self, type_ref: &TypeRef) -> Result<TypeId> {
        match type_ref {
            TypeRef::Named(name) => self.type_ids.get(name).copied().ok_or_else(|| {
                Error::SchemaStructural(format!("reference to unknown type {}", name))
            }),
            TypeRef::Anonymous(index) => {
                self.anon_type_ids.get(*index).copied().ok_or_else(|| {
                    Error::SchemaStructural(format!("reference to unknown anonymous type #{}", index))
                })
            }
            TypeRef::Unresolved(name) => Err(Error::SchemaStructural(format!(
                "unresolved type reference {}",
                name
            ))),
        }
    }

    fn intern_namespace(&mut self, uri: &str) -> Result<NamespaceId> {
        Ok(self.namespaces.intern(uri.as_bytes())?)
    }

    fn intern_qname(&mut self, name: &QName) -> Result<SymbolId> {
        let ns = self.intern_namespace(name.namespace_str())?;
        Ok(self.symbols.intern(ns, name.local_name.as_bytes())?)
    }

    /// Target namespace of the schema set
    fn target_namespace(&self) -> Option<&'a str> {
        self.set.target_namespace.as_deref()
    }

    /// Checker over the tables built so far
    fn checker(&self) -> ValueChecker<'_> {
        ValueChecker::new(
            &self.validators,
            &self.facets,
            &self.patterns,
            &self.enums,
            &self.values,
        )
    }

    fn push_program(&mut self, program: &[FacetInstr]) -> FacetProgramRef {
        let off = self.facets.len() as u32;
        self.facets.extend_from_slice(program);
        FacetProgramRef {
            off,
            len: program.len() as u32,
        }
    }

    fn validator_of(&self, id: TypeId) -> Result<ValidatorId> {
        let ty = self.types[id.index()];
        if !ty.is_simple() {
            return Err(Error::SchemaStructural(format!(
                "{} is not a simple type",
                self.label(id)
            )));
        }
        Ok(ty.validator)
    }

    fn compile_notations(&mut self) -> Result<()> {
        let set = self.set;
        for (name, decl) in &set.notations {
            let sym = self.intern_qname(name)?;
            let public = decl
                .public
                .as_deref()
                .map(|s| self.values.push(s.as_bytes()))
                .unwrap_or_default();
            let system = decl
                .system
                .as_deref()
                .map(|s| self.values.push(s.as_bytes()))
                .unwrap_or_default();
            self.notations.push(Notation {
                name: sym,
                public,
                system,
            });
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Schema> {
        let mut global_types: Vec<(SymbolId, TypeId)> = self
            .types
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, t)| !t.flags.contains(TypeFlags::ANONYMOUS))
            .map(|(i, t)| (t.name, TypeId::from_index(i)))
            .collect();
        global_types.sort();

        let mut global_elements = Vec::with_capacity(self.set.elements.len());
        for name in self.set.elements.keys() {
            if let Some(&id) = self.element_ids.get(name) {
                global_elements.push((self.elements[id.index()].name, id));
            }
        }
        global_elements.sort();

        let mut global_attributes: Vec<(SymbolId, AttributeId)> = self
            .attributes
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, a)| (a.name, AttributeId::from_index(i)))
            .collect();
        global_attributes.sort();

        let namespaces = self.namespaces.seal()?;
        let symbols = self.symbols.seal()?;

        let mut schema = Schema {
            namespaces,
            symbols,
            predefined: self.predefined,
            global_elements,
            global_types,
            global_attributes,
            types: self.types,
            ancestors: self.ancestors,
            complex_types: self.complex_types,
            elements: self.elements,
            attributes: self.attributes,
            attr_uses: self.attr_uses,
            attr_tables: self.attr_tables,
            validators: self.validators,
            facets: self.facets,
            patterns: self.patterns,
            enums: self.enums,
            values: self.values,
            notations: self.notations,
            models: self.models,
            wildcards: self.wildcards,
            identity: self.identity,
            any_type: self.any_type,
            any_simple_type: self.any_simple_type,
            build_hash: 0,
        };
        schema.build_hash = fingerprint::compute(&schema);
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ComplexTypeDef, SimpleTypeDef};
    use crate::error::ErrorKind;

    fn compile_default(set: &SchemaSet) -> Result<Schema> {
        compile(set, &BuildConfig::default())
    }

    #[test]
    fn test_empty_set_has_builtins() {
        let schema = compile_default(&SchemaSet::new(None)).unwrap();
        assert_eq!(schema.types().len(), BUILTIN_TYPES.len() + 1);
        assert_eq!(schema.any_type(), TypeId(1));
        assert_eq!(schema.any_simple_type(), TypeId(2));
        let sym = schema.symbol(crate::namespaces::XSD_NAMESPACE, "int").unwrap();
        let int = schema.lookup_type(sym).unwrap();
        let decimal = schema
            .lookup_type(schema.symbol(crate::namespaces::XSD_NAMESPACE, "decimal").unwrap())
            .unwrap();
        assert!(schema.is_derived_from(int, decimal));
        assert!(schema.is_derived_from(int, schema.any_type()));
    }

    #[test]
    fn test_types_reserved_in_registry_order() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let b = set.qname("b");
        let a = set.qname("a");
        set.add_type(b, SimpleTypeDef::restriction(TypeRef::builtin("string"), vec![]));
        set.add_type(a, ComplexTypeDef::new());
        set.add_anonymous_type(ComplexTypeDef::new());
        let schema = compile_default(&set).unwrap();
        let first_user = BUILTIN_TYPES.len() + 1;
        let types = schema.types();
        assert_eq!(types.len(), first_user + 3);
        assert_eq!(types[first_user].kind, TypeKind::Simple);
        assert_eq!(types[first_user + 1].kind, TypeKind::Complex);
        assert!(types[first_user + 2].flags.contains(TypeFlags::ANONYMOUS));
        assert!(types[first_user + 2].name.is_none());
        assert_eq!(schema.global_types().len(), BUILTIN_TYPES.len() + 2);
    }

    #[test]
    fn test_builtin_redefinition_is_rejected() {
        let mut set = SchemaSet::new(None);
        set.add_type(QName::xsd("string"), ComplexTypeDef::new());
        let err = compile_default(&set).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);
    }

    #[test]
    fn test_unresolved_reference_is_structural() {
        let mut set = SchemaSet::new(None);
        set.add_element(
            ElementDecl::new(QName::local("e")).with_type(TypeRef::Unresolved(QName::local("t"))),
        );
        let err = compile_default(&set).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);
    }

    #[test]
    fn test_build_is_deterministic() {
        let build = || {
            let mut set = SchemaSet::new(Some("urn:t"));
            let leaf = set.add_local_element(
                ElementDecl::new(set.qname("leaf")).with_type(TypeRef::builtin("int")),
            );
            let ty = set.add_anonymous_type(ComplexTypeDef::with_particle(
                Particle::sequence(vec![Particle::local(leaf).with_occurs(0, None)]),
            ));
            set.add_element(ElementDecl::new(set.qname("root")).with_type(ty));
            compile_default(&set).unwrap().build_hash()
        };
        assert_eq!(build(), build());
    }
}
