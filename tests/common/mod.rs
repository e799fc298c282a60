//! Schema fixtures shared by the integration tests.
//!
//! Each builder returns a resolved [`SchemaSet`] in the `urn:test`
//! namespace so tests can look symbols up with [`TNS`].

#![allow(dead_code)]

use xsdc::ast::{ComplexTypeDef, ElementDecl, Facet, Particle, SchemaSet, SimpleTypeDef, TypeRef};
use xsdc::runtime::ids::{ElementId, SymbolId, TypeId};
use xsdc::runtime::models::{Matched, ModelRef};
use xsdc::runtime::Schema;
use xsdc::{compile, BuildConfig};

/// Target namespace of every fixture
pub const TNS: &str = "urn:test";

/// Empty set in the test namespace
pub fn schema_set() -> SchemaSet {
    SchemaSet::new(Some(TNS)).with_prefix("t", TNS)
}

/// Compile with the default configuration
pub fn build(set: &SchemaSet) -> Schema {
    compile(set, &BuildConfig::default()).expect("fixture compiles")
}

/// A single global element of type xs:string
pub fn single_root(name: &str) -> SchemaSet {
    let mut set = schema_set();
    set.add_element(ElementDecl::new(set.qname(name)).with_type(TypeRef::builtin("string")));
    set
}

/// `root` holding the given particle as its anonymous content
pub fn root_with(set: &mut SchemaSet, particle: Particle) {
    let ty = set.add_anonymous_type(ComplexTypeDef::with_particle(particle));
    set.add_element(ElementDecl::new(set.qname("root")).with_type(ty));
}

/// A named restriction of xs:integer with enumeration facets
pub fn integer_enum(set: &mut SchemaSet, name: &str, values: &[&str]) -> TypeRef {
    let facets = values
        .iter()
        .map(|v| Facet::Enumeration(v.to_string()))
        .collect();
    set.add_type(
        set.qname(name),
        SimpleTypeDef::restriction(TypeRef::builtin("integer"), facets),
    )
}

/// Symbol of a name in the test namespace
pub fn sym(schema: &Schema, local: &str) -> SymbolId {
    schema.symbol(TNS, local).expect("symbol is interned")
}

/// Global element by local name
pub fn global_element(schema: &Schema, local: &str) -> ElementId {
    schema
        .lookup_element(sym(schema, local))
        .expect("global element")
}

/// Global type by local name
pub fn global_type(schema: &Schema, local: &str) -> TypeId {
    schema.lookup_type(sym(schema, local)).expect("global type")
}

/// Content model of a global element's complex type
pub fn model_of(schema: &Schema, element: &str) -> ModelRef {
    let elem = schema
        .element(global_element(schema, element))
        .expect("element record");
    schema
        .complex_type(elem.type_id)
        .expect("complex type")
        .model
}

/// Run a sequence of children through a content model
pub fn accepts(schema: &Schema, model: ModelRef, children: &[&str]) -> bool {
    let mut cursor = schema.cursor(model);
    for child in children {
        let Some(sym) = schema.symbol(TNS, child) else {
            return false;
        };
        if cursor.step(sym).is_none() {
            return false;
        }
    }
    cursor.accepting()
}

/// Element declaration matched by the first child of a model
pub fn first_match(schema: &Schema, model: ModelRef, child: &str) -> Option<ElementId> {
    let mut cursor = schema.cursor(model);
    match cursor.step(schema.symbol(TNS, child)?) {
        Some(Matched::Element(elem)) => Some(elem),
        _ => None,
    }
}
