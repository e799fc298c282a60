//! Serializable schema summaries
//!
//! A [`SchemaSummary`] lists the global components of a built schema with
//! their names resolved to `{namespace}local` strings. It is meant for
//! debugging output and JSON snapshots; nothing in the runtime reads it.

use serde::{Deserialize, Serialize};

use crate::runtime::ids::{SymbolId, TypeId};
use crate::runtime::models::ModelKind;
use crate::runtime::types::{AttrUseMode, ContentKind, TypeKind};
use crate::runtime::Schema;

/// Summary of a built schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaSummary {
    /// Build fingerprint, as 16 hex digits
    pub build_hash: String,
    /// Table sizes
    pub counts: TableCounts,
    /// Global elements, sorted by symbol id
    pub elements: Vec<ElementSummary>,
    /// Named user types, sorted by symbol id
    pub types: Vec<TypeSummary>,
    /// Global attribute names
    pub attributes: Vec<String>,
}

/// Number of real entries in each table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableCounts {
    /// Interned namespaces
    pub namespaces: usize,
    /// Interned symbols
    pub symbols: usize,
    /// Types, built-ins included
    pub types: usize,
    /// Complex types, anyType included
    pub complex_types: usize,
    /// Element declarations, local ones included
    pub elements: usize,
    /// Value validators
    pub validators: usize,
    /// Deterministic content models
    pub dfas: usize,
    /// Position-automaton content models
    pub nfas: usize,
    /// xs:all content models
    pub alls: usize,
    /// Wildcard rules
    pub wildcards: usize,
    /// Identity constraints
    pub identity_constraints: usize,
}

/// A global element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElementSummary {
    /// Qualified name
    pub name: String,
    /// Type name, `None` for anonymous types
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    /// Substitution-group head
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substitution_group: Option<String>,
    /// abstract="true"
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
    /// nillable="true"
    pub nillable: bool,
    /// Canonical default or fixed value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A named user type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeSummary {
    /// Qualified name
    pub name: String,
    /// "simple" or "complex"
    pub kind: String,
    /// Base type name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Content kind of complex types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Content model pool of complex types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Attribute uses of complex types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeSummary>,
    /// Default or fixed character content of complex types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,
}

/// One attribute use
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeSummary {
    /// Qualified name
    pub name: String,
    /// optional, required
    #[serde(rename = "use")]
    pub use_mode: String,
    /// Canonical default or fixed value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl SchemaSummary {
    /// Summarize a schema
    pub fn from_schema(schema: &Schema) -> Self {
        let models = schema.models();
        let counts = TableCounts {
            namespaces: schema.namespaces().len().saturating_sub(1),
            symbols: schema.symbols().len().saturating_sub(1),
            types: schema.types().len().saturating_sub(1),
            complex_types: schema.complex_types().len().saturating_sub(1),
            elements: schema.elements().len().saturating_sub(1),
            validators: schema.validators().len().saturating_sub(1),
            dfas: models.dfas.len(),
            nfas: models.nfas.len(),
            alls: models.alls.len(),
            wildcards: schema.wildcards().len().saturating_sub(1),
            identity_constraints: schema.identity().constraints.len().saturating_sub(1),
        };

        let elements = schema
            .global_elements()
            .iter()
            .filter_map(|(sym, id)| {
                let element = schema.element(*id)?;
                let head = element
                    .subst_head
                    .get()
                    .and_then(|h| schema.element(h))
                    .map(|h| symbol_name(schema, h.name));
                Some(ElementSummary {
                    name: symbol_name(schema, *sym),
                    type_name: type_name(schema, element.type_id),
                    substitution_group: head,
                    is_abstract: element.is_abstract(),
                    nillable: element.is_nillable(),
                    value: element
                        .value
                        .is_present()
                        .then(|| schema.values().get_str(element.value.canonical))
                        .flatten()
                        .map(String::from),
                })
            })
            .collect();

        let types = schema
            .global_types()
            .iter()
            .filter_map(|(sym, id)| {
                let ty = schema.type_def(*id)?;
                if ty.kind == TypeKind::Builtin || *id == schema.any_type() {
                    return None;
                }
                Some(type_summary(schema, symbol_name(schema, *sym), *id))
            })
            .collect();

        let attributes = schema
            .global_attributes()
            .iter()
            .map(|(sym, _)| symbol_name(schema, *sym))
            .collect();

        Self {
            build_hash: format!("{:016x}", schema.build_hash()),
            counts,
            elements,
            types,
            attributes,
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn type_summary(schema: &Schema, name: String, id: TypeId) -> TypeSummary {
    let mut summary = TypeSummary {
        name,
        kind: "simple".to_string(),
        base: None,
        content: None,
        model: None,
        attributes: Vec::new(),
        text_value: None,
    };
    let Some(ty) = schema.type_def(id) else {
        return summary;
    };
    summary.base = ty.base.get().and_then(|b| type_name(schema, b));
    let Some(ct) = schema.complex_type(id) else {
        return summary;
    };
    summary.kind = "complex".to_string();
    summary.content = Some(
        match ct.content {
            ContentKind::Empty => "empty",
            ContentKind::Simple => "simple",
            ContentKind::Mixed => "mixed",
            ContentKind::ElementOnly => "element-only",
            ContentKind::All => "all",
        }
        .to_string(),
    );
    summary.model = Some(
        match ct.model.kind {
            ModelKind::Empty => "empty",
            ModelKind::Dfa => "dfa",
            ModelKind::Nfa => "nfa",
            ModelKind::All => "all",
        }
        .to_string(),
    );
    summary.text_value = ct
        .text_value
        .is_present()
        .then(|| schema.values().get_str(ct.text_value.canonical))
        .flatten()
        .map(String::from);
    summary.attributes = schema
        .attribute_uses(ct)
        .iter()
        .map(|u| AttributeSummary {
            name: symbol_name(schema, u.name),
            use_mode: match u.mode {
                AttrUseMode::Required => "required",
                AttrUseMode::Prohibited => "prohibited",
                AttrUseMode::Optional => "optional",
            }
            .to_string(),
            value: u
                .value
                .is_present()
                .then(|| schema.values().get_str(u.value.canonical))
                .flatten()
                .map(String::from),
        })
        .collect();
    summary
}

/// `{namespace}local`, or `local` in no namespace
pub fn symbol_name(schema: &Schema, sym: SymbolId) -> String {
    let local = schema.symbols().local_str(sym).unwrap_or("?");
    let ns = schema
        .symbols()
        .namespace(sym)
        .and_then(|ns| schema.namespaces().get_str(ns))
        .unwrap_or("");
    if ns.is_empty() {
        local.to_string()
    } else {
        format!("{{{}}}{}", ns, local)
    }
}

fn type_name(schema: &Schema, id: TypeId) -> Option<String> {
    let ty = schema.type_def(id)?;
    ty.name.get().map(|sym| symbol_name(schema, sym))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ComplexTypeDef, ElementDecl, Particle, SchemaSet, TypeRef};
    use crate::compiler::compile;
    use crate::limits::BuildConfig;

    #[test]
    fn test_summary_names_and_counts() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let item = set.add_local_element(
            ElementDecl::new(set.qname("item")).with_type(TypeRef::builtin("int")),
        );
        let ty = set.add_type(
            set.qname("Order"),
            ComplexTypeDef::with_particle(Particle::local(item).with_occurs(0, None)),
        );
        set.add_element(ElementDecl::new(set.qname("order")).with_type(ty));
        set.add_element(
            ElementDecl::new(set.qname("note"))
                .with_type(TypeRef::builtin("string"))
                .with_default("none"),
        );
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        let summary = SchemaSummary::from_schema(&schema);

        assert_eq!(summary.counts.elements, 3);
        assert_eq!(summary.counts.complex_types, 2);
        assert_eq!(summary.counts.dfas, 2);
        assert_eq!(summary.build_hash.len(), 16);

        let order = summary
            .elements
            .iter()
            .find(|e| e.name == "{urn:t}order")
            .unwrap();
        assert_eq!(order.type_name.as_deref(), Some("{urn:t}Order"));
        let note = summary
            .elements
            .iter()
            .find(|e| e.name == "{urn:t}note")
            .unwrap();
        assert_eq!(note.value.as_deref(), Some("none"));

        assert_eq!(summary.types.len(), 1);
        assert_eq!(summary.types[0].content.as_deref(), Some("element-only"));
        assert_eq!(summary.types[0].model.as_deref(), Some("dfa"));
    }

    #[test]
    fn test_summary_json() {
        let mut set = SchemaSet::new(None);
        set.add_element(ElementDecl::new(set.qname("root")).with_type(TypeRef::builtin("string")));
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        let summary = SchemaSummary::from_schema(&schema);
        let json = summary.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["elements"][0]["name"], "root");
        assert_eq!(
            value["elements"][0]["type"],
            "{http://www.w3.org/2001/XMLSchema}string"
        );
        assert!(value["elements"][0].get("value").is_none());
        let back: SchemaSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
