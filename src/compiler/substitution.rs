//! Substitution-group closures
//!
//! The closure of a head is every element that may appear in its place:
//! the head itself unless abstract, and every transitive member whose
//! derivation from the head's type is not blocked. Blocking uses the union
//! of the head's `block` and `final`, the head type's `block`, and the
//! `block` of every type on the member's derivation chain.

use std::collections::{HashSet, VecDeque};

use tracing::trace;

use super::Compiler;
use crate::error::{Error, Result};
use crate::runtime::ids::ElementId;
use crate::runtime::types::DerivationMask;

impl Compiler<'_> {
    /// Elements allowed in place of `head`, head first
    pub(super) fn substitution_closure(&mut self, head: ElementId) -> Result<Vec<ElementId>> {
        if let Some(closure) = self.closures.get(&head) {
            return Ok(closure.clone());
        }
        let h = self.elements[head.index()];
        let head_type = h.type_id;
        let blocked = h.block | h.final_mask | self.types[head_type.index()].block_mask;

        let mut closure = Vec::new();
        if !h.is_abstract() {
            closure.push(head);
        }
        if !blocked.contains(DerivationMask::SUBSTITUTION) {
            let mut seen = HashSet::from([head]);
            let mut queue: VecDeque<ElementId> = self
                .subst_members
                .get(&head)
                .cloned()
                .unwrap_or_default()
                .into();
            while let Some(member) = queue.pop_front() {
                if !seen.insert(member) {
                    continue;
                }
                if let Some(next) = self.subst_members.get(&member) {
                    queue.extend(next.iter().copied());
                }
                let m = self.elements[member.index()];
                if m.is_abstract() {
                    continue;
                }
                let Some(mask) = self.derivation(m.type_id, head_type) else {
                    continue;
                };
                if mask.intersects(blocked | self.chain_block(m.type_id, head_type)) {
                    trace!(head = %head, member = %member, "substitution blocked");
                    continue;
                }
                closure.push(member);
            }
        }

        if closure.is_empty() && h.is_abstract() && blocked.contains(DerivationMask::SUBSTITUTION) {
            return Err(Error::SubstitutionGroup(format!(
                "{} is abstract and blocks substitution, so it can never appear",
                self.element_label(head)
            )));
        }
        self.closures.insert(head, closure.clone());
        Ok(closure)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{ComplexTypeDef, ElementDecl, Particle, SchemaSet, TypeRef};
    use crate::compiler::compile;
    use crate::error::ErrorKind;
    use crate::limits::BuildConfig;
    use crate::runtime::models::Matched;
    use crate::runtime::types::DerivationMask;
    use crate::runtime::Schema;

    fn container(set: &mut SchemaSet, head: &str) {
        let head = set.qname(head);
        let ty = set.add_anonymous_type(ComplexTypeDef::with_particle(Particle::element_ref(head)));
        set.add_element(ElementDecl::new(set.qname("root")).with_type(ty));
    }

    fn accepts(schema: &Schema, child: &str) -> bool {
        let root = schema
            .lookup_element(schema.symbol("urn:t", "root").unwrap())
            .unwrap();
        let ty = schema.element(root).unwrap().type_id;
        let ct = schema.complex_type(ty).unwrap();
        let mut cursor = schema.cursor(ct.model);
        let Some(sym) = schema.symbol("urn:t", child) else {
            return false;
        };
        matches!(cursor.step(sym), Some(Matched::Element(_))) && cursor.accepting()
    }

    #[test]
    fn test_abstract_head_admits_members() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let head = set.add_element(
            ElementDecl::new(set.qname("shape"))
                .with_type(TypeRef::builtin("string"))
                .with_abstract(true),
        );
        set.add_element(ElementDecl::new(set.qname("circle")).with_substitution_group(head.clone()));
        let square = set.add_element(
            ElementDecl::new(set.qname("square")).with_substitution_group(head),
        );
        set.add_element(ElementDecl::new(set.qname("tile")).with_substitution_group(square));
        container(&mut set, "shape");
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        assert!(!accepts(&schema, "shape"));
        assert!(accepts(&schema, "circle"));
        assert!(accepts(&schema, "square"));
        assert!(accepts(&schema, "tile"));
    }

    #[test]
    fn test_block_extension_excludes_member() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let base = set.add_type(set.qname("Base"), ComplexTypeDef::new());
        let ext = set.add_type(set.qname("Ext"), ComplexTypeDef::extension(base.clone(), None));
        let res = set.add_type(set.qname("Res"), ComplexTypeDef::restriction(base.clone(), None));
        let head = set.add_element(
            ElementDecl::new(set.qname("head"))
                .with_type(base)
                .with_block(DerivationMask::EXTENSION),
        );
        set.add_element(
            ElementDecl::new(set.qname("ext"))
                .with_type(ext)
                .with_substitution_group(head.clone()),
        );
        set.add_element(
            ElementDecl::new(set.qname("res"))
                .with_type(res)
                .with_substitution_group(head),
        );
        container(&mut set, "head");
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        assert!(accepts(&schema, "head"));
        assert!(!accepts(&schema, "ext"));
        assert!(accepts(&schema, "res"));
    }

    #[test]
    fn test_abstract_head_blocking_substitution_is_an_error() {
        let mut set = SchemaSet::new(Some("urn:t"));
        set.add_element(
            ElementDecl::new(set.qname("head"))
                .with_abstract(true)
                .with_block(DerivationMask::SUBSTITUTION),
        );
        container(&mut set, "head");
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubstitutionGroup);
    }
}
