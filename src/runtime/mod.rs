//! Runtime schema
//!
//! The output of the compiler: dense, immutable tables addressed by typed
//! ids. Every accessor is read-only, so one schema can be shared by any
//! number of concurrent validators.

pub mod check;
pub mod fingerprint;
pub mod identity;
pub mod ids;
pub mod models;
pub mod symbols;
pub mod types;
pub mod validators;
pub mod wildcards;

use crate::hashing::HashIndex;

use check::ValueChecker;
use identity::{IdentityConstraint, IdentityTables};
use ids::{
    AttributeId, ElementId, IcId, NamespaceId, NotationId, SymbolId, TypeId, ValidatorId,
    WildcardId,
};
use models::{ModelCursor, ModelRef, Models};
use symbols::{NamespaceTable, PredefinedSymbols, SymbolTable};
use types::{
    Ancestors, AttrIndexMode, AttrUse, Attribute, ComplexType, DerivationMask, Element, Notation,
    Type,
};
use validators::{EnumTable, FacetInstr, Meta, PatternTable, ValidatorBundle, ValueBlob};
use wildcards::WildcardTable;

use crate::values::ValueKind;

/// A compiled, sealed schema
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) namespaces: NamespaceTable,
    pub(crate) symbols: SymbolTable,
    pub(crate) predefined: PredefinedSymbols,
    pub(crate) global_elements: Vec<(SymbolId, ElementId)>,
    pub(crate) global_types: Vec<(SymbolId, TypeId)>,
    pub(crate) global_attributes: Vec<(SymbolId, AttributeId)>,
    pub(crate) types: Vec<Type>,
    pub(crate) ancestors: Ancestors,
    pub(crate) complex_types: Vec<ComplexType>,
    pub(crate) elements: Vec<Element>,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) attr_uses: Vec<AttrUse>,
    pub(crate) attr_tables: Vec<HashIndex>,
    pub(crate) validators: ValidatorBundle,
    pub(crate) facets: Vec<FacetInstr>,
    pub(crate) patterns: PatternTable,
    pub(crate) enums: EnumTable,
    pub(crate) values: ValueBlob,
    pub(crate) notations: Vec<Notation>,
    pub(crate) models: Models,
    pub(crate) wildcards: WildcardTable,
    pub(crate) identity: IdentityTables,
    pub(crate) any_type: TypeId,
    pub(crate) any_simple_type: TypeId,
    pub(crate) build_hash: u64,
}

fn lookup<T: Copy>(index: &[(SymbolId, T)], sym: SymbolId) -> Option<T> {
    index
        .binary_search_by_key(&sym, |(s, _)| *s)
        .ok()
        .map(|i| index[i].1)
}

impl Schema {
    /// Build fingerprint (never 0)
    pub fn build_hash(&self) -> u64 {
        self.build_hash
    }

    /// Namespace table
    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    /// Symbol table
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Predefined xsi/xml symbols
    pub fn predefined(&self) -> &PredefinedSymbols {
        &self.predefined
    }

    /// Look up a symbol by namespace URI and local name
    pub fn symbol(&self, namespace: &str, local: &str) -> Option<SymbolId> {
        let ns = self.namespaces.lookup(namespace.as_bytes())?;
        self.symbols.lookup(ns, local.as_bytes())
    }

    /// Namespace id of a URI
    pub fn namespace(&self, uri: &str) -> Option<NamespaceId> {
        self.namespaces.lookup(uri.as_bytes())
    }

    /// Global element by name
    pub fn lookup_element(&self, sym: SymbolId) -> Option<ElementId> {
        lookup(&self.global_elements, sym)
    }

    /// Global type by name
    pub fn lookup_type(&self, sym: SymbolId) -> Option<TypeId> {
        lookup(&self.global_types, sym)
    }

    /// Global attribute by name
    pub fn lookup_attribute(&self, sym: SymbolId) -> Option<AttributeId> {
        lookup(&self.global_attributes, sym)
    }

    /// Global element index, sorted by symbol id
    pub fn global_elements(&self) -> &[(SymbolId, ElementId)] {
        &self.global_elements
    }

    /// Global type index, sorted by symbol id
    pub fn global_types(&self) -> &[(SymbolId, TypeId)] {
        &self.global_types
    }

    /// Global attribute index, sorted by symbol id
    pub fn global_attributes(&self) -> &[(SymbolId, AttributeId)] {
        &self.global_attributes
    }

    /// Type record
    pub fn type_def(&self, id: TypeId) -> Option<&Type> {
        if id.is_none() {
            return None;
        }
        self.types.get(id.index())
    }

    /// All type records, index 0 being a placeholder
    pub fn types(&self) -> &[Type] {
        &self.types
    }

    /// The synthetic `xs:anyType`
    pub fn any_type(&self) -> TypeId {
        self.any_type
    }

    /// `xs:anySimpleType`
    pub fn any_simple_type(&self) -> TypeId {
        self.any_simple_type
    }

    /// Complex-type record of a type
    pub fn complex_type(&self, id: TypeId) -> Option<&ComplexType> {
        let t = self.type_def(id)?;
        if t.complex == 0 {
            return None;
        }
        self.complex_types.get(t.complex as usize)
    }

    /// All complex-type records, index 0 being a placeholder
    pub fn complex_types(&self) -> &[ComplexType] {
        &self.complex_types
    }

    /// Ancestors of a type with the cumulative derivation mask to each
    pub fn ancestors(&self, id: TypeId) -> impl Iterator<Item = (TypeId, DerivationMask)> + '_ {
        let range = self
            .type_def(id)
            .map(|t| t.anc_off as usize..(t.anc_off + t.anc_len) as usize)
            .unwrap_or(0..0);
        range.map(move |i| (self.ancestors.ids[i], self.ancestors.masks[i]))
    }

    /// Raw ancestor arrays
    pub fn ancestor_arrays(&self) -> &Ancestors {
        &self.ancestors
    }

    /// Derivation methods used to get from `base` to `derived`, or `None`
    /// when `derived` does not derive from `base`
    pub fn derivation(&self, derived: TypeId, base: TypeId) -> Option<DerivationMask> {
        if derived == base {
            return Some(DerivationMask::empty());
        }
        self.ancestors(derived)
            .find(|(t, _)| *t == base)
            .map(|(_, mask)| mask)
    }

    /// Whether `derived` is `base` or derives from it
    pub fn is_derived_from(&self, derived: TypeId, base: TypeId) -> bool {
        self.derivation(derived, base).is_some()
    }

    /// Element record
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        if id.is_none() {
            return None;
        }
        self.elements.get(id.index())
    }

    /// All element records, index 0 being a placeholder
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Global attribute record
    pub fn attribute(&self, id: AttributeId) -> Option<&Attribute> {
        if id.is_none() {
            return None;
        }
        self.attributes.get(id.index())
    }

    /// All global attribute records, index 0 being a placeholder
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Attribute uses of a complex type
    pub fn attribute_uses(&self, ct: &ComplexType) -> &[AttrUse] {
        let start = ct.attributes.off as usize;
        self.attr_uses
            .get(start..start + ct.attributes.len as usize)
            .unwrap_or(&[])
    }

    /// Attribute use of a complex type by name
    pub fn attribute_use(&self, ct: &ComplexType, sym: SymbolId) -> Option<&AttrUse> {
        let uses = self.attribute_uses(ct);
        match ct.attributes.mode {
            AttrIndexMode::Linear => uses.iter().find(|u| u.name == sym),
            AttrIndexMode::Sorted => uses
                .binary_search_by_key(&sym, |u| u.name)
                .ok()
                .map(|i| &uses[i]),
            AttrIndexMode::Hash => {
                let table = self.attr_tables.get(ct.attributes.hash_table as usize)?;
                table
                    .find(attr_hash(sym), |slot| {
                        uses.get(slot as usize - 1).map(|u| u.name) == Some(sym)
                    })
                    .and_then(|slot| uses.get(slot as usize - 1))
            }
        }
    }

    /// Attribute-use pool
    pub fn attribute_use_pool(&self) -> &[AttrUse] {
        &self.attr_uses
    }

    /// Attribute hash-table pool
    pub fn attribute_tables(&self) -> &[HashIndex] {
        &self.attr_tables
    }

    /// Validator bundle
    pub fn validators(&self) -> &ValidatorBundle {
        &self.validators
    }

    /// Validator meta record
    pub fn validator_meta(&self, id: ValidatorId) -> Option<&Meta> {
        self.validators.meta(id)
    }

    /// Facet program of a validator
    pub fn facet_program(&self, id: ValidatorId) -> &[FacetInstr] {
        match self.validators.meta(id) {
            Some(meta) => {
                let start = meta.facets.off as usize;
                self.facets
                    .get(start..start + meta.facets.len as usize)
                    .unwrap_or(&[])
            }
            None => &[],
        }
    }

    /// Facet instruction pool
    pub fn facets(&self) -> &[FacetInstr] {
        &self.facets
    }

    /// Pattern table
    pub fn patterns(&self) -> &PatternTable {
        &self.patterns
    }

    /// Enumeration table
    pub fn enums(&self) -> &EnumTable {
        &self.enums
    }

    /// Whether `key` of `kind` is a member of an enumeration
    pub fn enum_contains(&self, id: ids::EnumId, kind: ValueKind, key: &[u8]) -> bool {
        self.enums.contains(&self.values, id, kind, key)
    }

    /// Value arena
    pub fn values(&self) -> &ValueBlob {
        &self.values
    }

    /// A checker for lexical values
    pub fn checker(&self) -> ValueChecker<'_> {
        ValueChecker::new(
            &self.validators,
            &self.facets,
            &self.patterns,
            &self.enums,
            &self.values,
        )
    }

    /// Notation records, index 0 being a placeholder
    pub fn notations(&self) -> &[Notation] {
        &self.notations
    }

    /// Notation by name
    pub fn lookup_notation(&self, sym: SymbolId) -> Option<NotationId> {
        self.notations
            .iter()
            .position(|n| n.name == sym && sym.is_some())
            .map(NotationId::from_index)
    }

    /// Content models
    pub fn models(&self) -> &Models {
        &self.models
    }

    /// Cursor at the start of a content model
    pub fn cursor(&self, model: ModelRef) -> ModelCursor<'_> {
        ModelCursor::new(self, model)
    }

    /// Wildcard rules
    pub fn wildcards(&self) -> &WildcardTable {
        &self.wildcards
    }

    /// Whether a wildcard admits a namespace id
    pub fn wildcard_accepts(&self, id: WildcardId, ns: NamespaceId) -> bool {
        self.wildcards.accepts(id, ns)
    }

    /// Whether a wildcard admits a namespace URI
    pub fn wildcard_accepts_uri(&self, id: WildcardId, uri: &[u8]) -> bool {
        self.wildcards.accepts_bytes(&self.namespaces, id, uri)
    }

    /// Identity-constraint tables
    pub fn identity(&self) -> &IdentityTables {
        &self.identity
    }

    /// Identity constraints attached to an element
    pub fn element_constraints(&self, id: ElementId) -> &[IcId] {
        match self.element(id) {
            Some(e) => {
                let start = e.ic_off as usize;
                self.identity
                    .element_ics
                    .get(start..start + e.ic_len as usize)
                    .unwrap_or(&[])
            }
            None => &[],
        }
    }

    /// Identity constraint record
    pub fn constraint(&self, id: IcId) -> Option<&IdentityConstraint> {
        self.identity.constraint(id)
    }
}

/// Hash of an attribute symbol in per-type hash indices
pub fn attr_hash(sym: SymbolId) -> u64 {
    crate::hashing::fnv1a(&sym.0.to_le_bytes())
}
