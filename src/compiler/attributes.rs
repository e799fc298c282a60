//! Attribute declarations and per-type attribute uses
//!
//! Attribute groups are expanded in place; the attribute wildcard of a
//! type is the intersection of its own wildcard with those of its groups.
//! Extension unions uses and wildcards with the base, restriction narrows
//! them. Prohibited uses take part in merging and are dropped when the
//! final index is emitted.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::trace;

use super::wildcards::Wildcard;
use super::Compiler;
use crate::ast::{AttributeTarget, AttributeUseDef, ComplexTypeDef, WildcardDef};
use crate::error::{Error, Result, ResultExt};
use crate::hashing::HashIndex;
use crate::namespaces::QName;
use crate::runtime::attr_hash;
use crate::runtime::ids::{AttributeId, TypeId};
use crate::runtime::types::{
    AttrIndexMode, AttrIndexRef, AttrUse, AttrUseMode, Attribute, ConstraintMode,
    DerivationMethod,
};

/// Up to this many uses are scanned linearly
const LINEAR_MAX: usize = 8;
/// Up to this many uses are binary searched; more get a hash table
const SORTED_MAX: usize = 64;

/// Effective attribute uses and wildcard of a type
#[derive(Debug, Clone, Default)]
pub(super) struct AttrSet {
    pub(super) uses: IndexMap<QName, AttrUse>,
    pub(super) wildcard: Option<Wildcard>,
}

impl Compiler<'_> {
    /// Compile the global attribute table
    pub(super) fn compile_global_attributes(&mut self) -> Result<()> {
        let set = self.set;
        for (name, decl) in &set.attributes {
            let record = self
                .global_attribute(name, decl)
                .with_context(|| format!("attribute {}", name))?;
            self.attributes.push(record);
            self.attribute_ids
                .insert(name.clone(), AttributeId::from_index(self.attributes.len() - 1));
        }
        Ok(())
    }

    fn global_attribute(
        &mut self,
        name: &QName,
        decl: &crate::ast::AttributeDecl,
    ) -> Result<Attribute> {
        let sym = self.intern_qname(name)?;
        let type_id = match &decl.type_ref {
            Some(r) => self.resolve_type(r)?,
            None => self.any_simple_type,
        };
        let validator = self.validator_of(type_id)?;
        let value = self.value_constraint(validator, decl.default.as_deref(), decl.fixed.as_deref())?;
        Ok(Attribute {
            name: sym,
            type_id,
            validator,
            value,
        })
    }

    /// Lower one attribute use
    fn attribute_use(&mut self, def: &AttributeUseDef) -> Result<(QName, AttrUse)> {
        let name = def.name().clone();
        let result = self.attribute_use_inner(def, &name);
        result.map(|u| (name.clone(), u)).with_context(|| format!("attribute {}", name))
    }

    fn attribute_use_inner(&mut self, def: &AttributeUseDef, name: &QName) -> Result<AttrUse> {
        let sym = self.intern_qname(name)?;
        let (decl, type_id, validator, inherited, default, fixed) = match &def.target {
            AttributeTarget::Local(local) => {
                let type_id = match &local.type_ref {
                    Some(r) => self.resolve_type(r)?,
                    None => self.any_simple_type,
                };
                let validator = self.validator_of(type_id)?;
                let default = def.default.as_deref().or(local.default.as_deref());
                let fixed = def.fixed.as_deref().or(local.fixed.as_deref());
                (AttributeId::NONE, type_id, validator, None, default, fixed)
            }
            AttributeTarget::Ref(target) => {
                let id = *self.attribute_ids.get(target).ok_or_else(|| {
                    Error::SchemaStructural(format!("reference to unknown attribute {}", target))
                })?;
                let global = self.attributes[id.index()];
                (
                    id,
                    global.type_id,
                    global.validator,
                    Some(global.value),
                    def.default.as_deref(),
                    def.fixed.as_deref(),
                )
            }
        };
        if def.mode == AttrUseMode::Required && default.is_some() {
            return Err(Error::SchemaStructural(
                "a required attribute cannot have a default".to_string(),
            ));
        }
        let own = self.value_constraint(validator, default, fixed)?;
        let value = match inherited {
            Some(global) if global.mode == ConstraintMode::Fixed => {
                if own.is_present() && !self.same_value(&own, &global) {
                    return Err(Error::Attributes(
                        "value differs from the fixed value of the declaration".to_string(),
                    ));
                }
                global
            }
            Some(global) if !own.is_present() => global,
            _ => own,
        };
        Ok(AttrUse {
            name: sym,
            decl,
            type_id,
            validator,
            mode: def.mode,
            value,
        })
    }

    /// Uses, groups and wildcard as written, groups expanded
    fn collect_attributes(
        &mut self,
        uses: &[AttributeUseDef],
        groups: &[QName],
        wildcard: Option<&WildcardDef>,
        expanded: &mut HashSet<QName>,
    ) -> Result<AttrSet> {
        let mut out = AttrSet::default();
        for def in uses {
            let (name, u) = self.attribute_use(def)?;
            if out.uses.contains_key(&name) {
                return Err(Error::Attributes(format!("attribute {} is declared twice", name)));
            }
            out.uses.insert(name, u);
        }
        out.wildcard = wildcard.map(|w| Wildcard::from_def(w, self.target_namespace()));

        let set = self.set;
        for group_name in groups {
            let group = set.attribute_groups.get(group_name).ok_or_else(|| {
                Error::Attributes(format!("reference to unknown attribute group {}", group_name))
            })?;
            // A group reached twice, directly or through a cycle, adds nothing new.
            if !expanded.insert(group_name.clone()) {
                trace!(group = %group_name, "attribute group already expanded");
                continue;
            }
            let inner = self
                .collect_attributes(
                    &group.attributes,
                    &group.attribute_groups,
                    group.any_attribute.as_ref(),
                    expanded,
                )
                .with_context(|| format!("attribute group {}", group_name))?;

            for (name, u) in inner.uses {
                out.uses.entry(name).or_insert(u);
            }
            out.wildcard = match (out.wildcard.take(), inner.wildcard) {
                (Some(a), Some(b)) => Some(a.intersection(&b)?),
                (a, b) => a.or(b),
            };
        }
        Ok(out)
    }

    /// Effective attributes of a complex type, merged with its base
    pub(super) fn complex_attributes(
        &mut self,
        base: TypeId,
        derivation: DerivationMethod,
        def: &ComplexTypeDef,
    ) -> Result<AttrSet> {
        let own = self.collect_attributes(
            &def.attributes,
            &def.attribute_groups,
            def.any_attribute.as_ref(),
            &mut HashSet::new(),
        )?;
        let inherited = self.effective_attributes.get(&base).cloned().unwrap_or_default();

        match derivation {
            DerivationMethod::Extension => {
                let mut uses = inherited.uses;
                for (name, u) in own.uses {
                    if uses.get(&name).map_or(false, |b| b.mode != AttrUseMode::Prohibited) {
                        return Err(Error::Attributes(format!(
                            "attribute {} is already declared by the base type",
                            name
                        )));
                    }
                    uses.insert(name, u);
                }
                let wildcard = match (own.wildcard, inherited.wildcard) {
                    (Some(o), Some(b)) => Some(o.union(&b)?),
                    (o, b) => o.or(b),
                };
                Ok(AttrSet { uses, wildcard })
            }
            _ => {
                let mut uses = inherited.uses.clone();
                for (name, u) in own.uses {
                    match inherited.uses.get(&name) {
                        Some(b) if b.mode == AttrUseMode::Required && u.mode != AttrUseMode::Required => {
                            return Err(Error::Derivation(format!(
                                "required attribute {} cannot be made optional or prohibited",
                                name
                            )))
                        }
                        Some(b)
                            if b.value.mode == ConstraintMode::Fixed
                                && u.mode != AttrUseMode::Prohibited
                                && !self.same_value(&b.value, &u.value) =>
                        {
                            return Err(Error::Derivation(format!(
                                "attribute {} must keep the fixed value of the base",
                                name
                            )))
                        }
                        None if u.mode != AttrUseMode::Prohibited
                            && !inherited
                                .wildcard
                                .as_ref()
                                .map_or(false, |w| w.admits(name.namespace_str())) =>
                        {
                            return Err(Error::Derivation(format!(
                                "attribute {} is not allowed by the base type",
                                name
                            )))
                        }
                        _ => {}
                    }
                    uses.insert(name, u);
                }
                let wildcard = match (own.wildcard, inherited.wildcard) {
                    (None, _) => None,
                    (Some(_), None) => {
                        return Err(Error::Derivation(
                            "attribute wildcard is not allowed: the base type has none".to_string(),
                        ))
                    }
                    (Some(o), Some(b)) => {
                        let narrowed = o.intersection(&b)?;
                        if narrowed.is_empty() {
                            return Err(Error::Derivation(
                                "attribute wildcard does not overlap the base wildcard"
                                    .to_string(),
                            ));
                        }
                        Some(narrowed)
                    }
                };
                Ok(AttrSet { uses, wildcard })
            }
        }
    }

    /// Emit the uses of a type into the shared pool
    pub(super) fn attribute_index(&mut self, attrs: &AttrSet) -> AttrIndexRef {
        let mut uses: Vec<AttrUse> = attrs
            .uses
            .values()
            .filter(|u| u.mode != AttrUseMode::Prohibited)
            .copied()
            .collect();
        let len = uses.len();
        let mode = if len <= LINEAR_MAX {
            AttrIndexMode::Linear
        } else if len <= SORTED_MAX {
            AttrIndexMode::Sorted
        } else {
            AttrIndexMode::Hash
        };
        if mode != AttrIndexMode::Linear {
            uses.sort_by_key(|u| u.name);
        }
        let off = self.attr_uses.len() as u32;
        let mut hash_table = 0;
        if mode == AttrIndexMode::Hash {
            let index = HashIndex::build(
                len,
                uses.iter()
                    .enumerate()
                    .map(|(i, u)| (i as u32 + 1, attr_hash(u.name))),
            );
            self.attr_tables.push(index);
            hash_table = self.attr_tables.len() as u32 - 1;
        }
        self.attr_uses.extend(uses);
        trace!(uses = len, mode = ?mode, "attribute index");
        AttrIndexRef {
            off,
            len: len as u32,
            mode,
            hash_table,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{
        AttributeDecl, AttributeGroupDef, AttributeUseDef, ComplexTypeDef, NamespaceConstraint,
        NamespaceItem, SchemaSet, TypeRef, WildcardDef,
    };
    use crate::compiler::compile;
    use crate::error::ErrorKind;
    use crate::limits::BuildConfig;
    use crate::namespaces::QName;
    use crate::runtime::types::{AttrIndexMode, AttrUseMode};
    use crate::runtime::Schema;

    fn complex<'s>(schema: &'s Schema, local: &str) -> &'s crate::runtime::types::ComplexType {
        let ty = schema
            .lookup_type(schema.symbol("urn:t", local).unwrap())
            .unwrap();
        schema.complex_type(ty).unwrap()
    }

    fn local_attr(name: &str) -> AttributeUseDef {
        AttributeUseDef::local(AttributeDecl::new(QName::local(name)).with_type(TypeRef::builtin("string")))
    }

    #[test]
    fn test_group_expansion_and_prohibited_uses() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let group = set.add_attribute_group(
            set.qname("G"),
            AttributeGroupDef::new().with_attribute(local_attr("g")),
        );
        let base = set.add_type(
            set.qname("Base"),
            ComplexTypeDef::new()
                .with_attribute(local_attr("a"))
                .with_attribute(local_attr("b"))
                .with_attribute_group(group),
        );
        set.add_type(
            set.qname("Derived"),
            ComplexTypeDef::restriction(base, None)
                .with_attribute(local_attr("b").prohibited()),
        );
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        let base = complex(&schema, "Base");
        assert_eq!(schema.attribute_uses(base).len(), 3);
        let derived = complex(&schema, "Derived");
        let names: Vec<_> = schema
            .attribute_uses(derived)
            .iter()
            .map(|u| schema.symbols().local_str(u.name).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a", "g"]);
        let a = schema.symbol("", "a").unwrap();
        assert!(schema.attribute_use(derived, a).is_some());
        let b = schema.symbol("", "b").unwrap();
        assert!(schema.attribute_use(derived, b).is_none());
    }

    #[test]
    fn test_required_cannot_be_relaxed() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let base = set.add_type(
            set.qname("Base"),
            ComplexTypeDef::new().with_attribute(local_attr("a").required()),
        );
        set.add_type(
            set.qname("Derived"),
            ComplexTypeDef::restriction(base, None).with_attribute(local_attr("a")),
        );
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Derivation);
    }

    #[test]
    fn test_extension_unions_wildcards() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let list = |uri: &str| {
            WildcardDef::new(
                NamespaceConstraint::List(vec![NamespaceItem::Uri(uri.to_string())]),
                Some("urn:t"),
            )
        };
        let base = set.add_type(
            set.qname("Base"),
            ComplexTypeDef::new().with_any_attribute(list("urn:a")),
        );
        set.add_type(
            set.qname("Ext"),
            ComplexTypeDef::extension(base, None).with_any_attribute(list("urn:b")),
        );
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        let ext = complex(&schema, "Ext");
        assert!(schema.wildcard_accepts_uri(ext.any_attribute, b"urn:a"));
        assert!(schema.wildcard_accepts_uri(ext.any_attribute, b"urn:b"));
        assert!(!schema.wildcard_accepts_uri(ext.any_attribute, b"urn:c"));
    }

    #[test]
    fn test_restriction_wildcard_needs_base_wildcard() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let base = set.add_type(set.qname("Base"), ComplexTypeDef::new());
        set.add_type(
            set.qname("Derived"),
            ComplexTypeDef::restriction(base, None).with_any_attribute(WildcardDef::any()),
        );
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Derivation);
    }

    #[test]
    fn test_index_modes() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let mut many = ComplexTypeDef::new();
        for i in 0..70 {
            many = many.with_attribute(local_attr(&format!("a{}", i)));
        }
        set.add_type(set.qname("Many"), many);
        let mut some = ComplexTypeDef::new();
        for i in 0..20 {
            some = some.with_attribute(local_attr(&format!("a{}", i)));
        }
        set.add_type(set.qname("Some"), some);
        let schema = compile(&set, &BuildConfig::default()).unwrap();

        let many = complex(&schema, "Many");
        assert_eq!(many.attributes.mode, AttrIndexMode::Hash);
        let some = complex(&schema, "Some");
        assert_eq!(some.attributes.mode, AttrIndexMode::Sorted);
        for i in 0..70 {
            let sym = schema.symbol("", &format!("a{}", i)).unwrap();
            let found = schema.attribute_use(many, sym).unwrap();
            assert_eq!(found.name, sym);
            assert_eq!(found.mode, AttrUseMode::Optional);
        }
        let missing = schema.symbol("urn:t", "Many").unwrap();
        assert!(schema.attribute_use(many, missing).is_none());
    }

    #[test]
    fn test_unknown_attribute_reference() {
        let mut set = SchemaSet::new(Some("urn:t"));
        set.add_type(
            set.qname("T"),
            ComplexTypeDef::new().with_attribute(AttributeUseDef::reference(QName::local("nope"))),
        );
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);
    }

    #[test]
    fn test_cyclic_attribute_groups_expand_once() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let g1 = set.qname("G1");
        let g2 = set.qname("G2");
        set.add_attribute_group(
            g1.clone(),
            AttributeGroupDef::new()
                .with_attribute(local_attr("x"))
                .with_attribute_group(g2.clone()),
        );
        set.add_attribute_group(
            g2.clone(),
            AttributeGroupDef::new()
                .with_attribute(local_attr("y"))
                .with_attribute_group(g1.clone()),
        );
        let own = set.qname("Self");
        set.add_attribute_group(
            own.clone(),
            AttributeGroupDef::new()
                .with_attribute(local_attr("z"))
                .with_attribute_group(own.clone()),
        );
        set.add_type(
            set.qname("T"),
            ComplexTypeDef::new()
                .with_attribute_group(g1)
                .with_attribute_group(g2)
                .with_attribute_group(own),
        );
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        let t = complex(&schema, "T");
        assert_eq!(schema.attribute_uses(t).len(), 3);
        for name in ["x", "y", "z"] {
            let sym = schema.symbol("", name).unwrap();
            assert!(schema.attribute_use(t, sym).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn test_unknown_attribute_group() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let missing = set.qname("Missing");
        set.add_type(
            set.qname("T"),
            ComplexTypeDef::new().with_attribute_group(missing),
        );
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Attributes);
    }
}
