//! Identity constraints
//!
//! Selector and field expressions use the restricted XPath subset of
//! XSD 1.0: unions of relative child paths, optionally starting with
//! `.//`, with a trailing attribute step allowed in fields. They are
//! compiled to flat [`PathOp`] programs; evaluation is left to the
//! instance validator.

use tracing::trace;

use super::Compiler;
use crate::ast::IdentityConstraintDef;
use crate::error::{Error, Result};
use crate::names::{is_valid_ncname, split_qname};
use crate::runtime::identity::{IcCategory, IdentityConstraint, PathOp, PathOpKind};
use crate::runtime::ids::{IcId, NamespaceId, PathId, SymbolId};

fn syntax_error(expr: &str, reason: &str) -> Error {
    Error::SchemaStructural(format!("invalid path expression '{}': {}", expr, reason))
}

impl Compiler<'_> {
    /// Compile one constraint declared on an element
    pub(super) fn identity_constraint(&mut self, ic: &IdentityConstraintDef) -> Result<IcId> {
        if self.ic_ids.contains_key(&ic.name) {
            return Err(Error::SchemaStructural(format!(
                "identity constraint {} is declared twice",
                ic.name
            )));
        }
        if ic.fields.is_empty() {
            return Err(Error::SchemaStructural(format!(
                "identity constraint {} has no field",
                ic.name
            )));
        }
        let name = self.intern_qname(&ic.name)?;

        let selector = self.compile_path(&ic.selector, false)?;
        let selector_off = self.identity.selectors.len() as u32;
        self.identity.selectors.push(selector);

        let mut fields = Vec::with_capacity(ic.fields.len());
        for field in &ic.fields {
            fields.push(self.compile_path(field, true)?);
        }
        let field_off = self.identity.fields.len() as u32;
        self.identity.fields.extend_from_slice(&fields);

        self.identity.constraints.push(Some(IdentityConstraint {
            name,
            category: ic.category,
            selector_off,
            selector_len: 1,
            field_off,
            field_len: fields.len() as u32,
            referenced: IcId::NONE,
        }));
        let id = IcId::from_index(self.identity.constraints.len() - 1);
        self.ic_ids.insert(ic.name.clone(), id);

        match (ic.category, &ic.refer) {
            (IcCategory::Keyref, Some(refer)) => {
                self.pending_keyrefs.push((id, refer.clone(), ic.name.clone()));
            }
            (IcCategory::Keyref, None) => {
                return Err(Error::SchemaStructural(format!(
                    "keyref {} does not name the key it refers to",
                    ic.name
                )))
            }
            _ => {}
        }
        trace!(constraint = %ic.name, fields = fields.len(), "identity constraint");
        Ok(id)
    }

    /// Point every keyref at its key or unique constraint
    pub(super) fn resolve_keyrefs(&mut self) -> Result<()> {
        for (id, refer, name) in std::mem::take(&mut self.pending_keyrefs) {
            let target = *self.ic_ids.get(&refer).ok_or_else(|| {
                Error::SchemaStructural(format!(
                    "keyref {} refers to unknown constraint {}",
                    name, refer
                ))
            })?;
            let (category, field_len) = match self.identity.constraint(target) {
                Some(t) => (t.category, t.field_len),
                None => continue,
            };
            if category == IcCategory::Keyref {
                return Err(Error::SchemaStructural(format!(
                    "keyref {} refers to keyref {}",
                    name, refer
                )));
            }
            if let Some(Some(ic)) = self.identity.constraints.get_mut(id.index()) {
                if ic.field_len != field_len {
                    return Err(Error::SchemaStructural(format!(
                        "keyref {} has {} fields but {} has {}",
                        name, ic.field_len, refer, field_len
                    )));
                }
                ic.referenced = target;
            }
        }
        Ok(())
    }

    /// Compile a selector (`field == false`) or field expression
    fn compile_path(&mut self, expr: &str, field: bool) -> Result<PathId> {
        let alternatives: Vec<&str> = expr.split('|').map(str::trim).collect();
        let mut ops = Vec::new();
        for alternative in &alternatives {
            if alternatives.len() > 1 {
                ops.push(PathOp::bare(PathOpKind::UnionSplit));
            }
            self.compile_alternative(expr, alternative, field, &mut ops)?;
        }
        Ok(self.identity.push_path(&ops))
    }

    fn compile_alternative(
        &mut self,
        expr: &str,
        path: &str,
        field: bool,
        ops: &mut Vec<PathOp>,
    ) -> Result<()> {
        if path.is_empty() {
            return Err(syntax_error(expr, "empty path"));
        }
        ops.push(PathOp::bare(PathOpKind::RootSelf));
        let rest = match path.strip_prefix(".//") {
            Some(rest) => {
                ops.push(PathOp::bare(PathOpKind::Descend));
                rest
            }
            None => path,
        };
        let steps: Vec<&str> = rest.split('/').map(str::trim).collect();
        for (i, step) in steps.iter().enumerate() {
            let last = i + 1 == steps.len();
            let op = self.compile_step(expr, step, field && last)?;
            ops.push(op);
        }
        Ok(())
    }

    fn compile_step(&mut self, expr: &str, step: &str, attribute_allowed: bool) -> Result<PathOp> {
        if step.is_empty() {
            return Err(syntax_error(expr, "empty step"));
        }
        if step == "." {
            return Ok(PathOp::bare(PathOpKind::SelfStep));
        }
        let (attribute, test) = if let Some(test) = step.strip_prefix('@') {
            (true, test.trim())
        } else if let Some(test) = step.strip_prefix("attribute::") {
            (true, test.trim())
        } else if let Some(test) = step.strip_prefix("child::") {
            (false, test.trim())
        } else {
            (false, step)
        };
        if attribute && !attribute_allowed {
            return Err(syntax_error(expr, "an attribute step may only end a field"));
        }

        let (any, ns_any, name) = if attribute {
            (PathOpKind::AttrAny, PathOpKind::AttrNsAny, PathOpKind::AttrName)
        } else {
            (PathOpKind::ChildAny, PathOpKind::ChildNsAny, PathOpKind::ChildName)
        };
        if test == "*" {
            return Ok(PathOp::bare(any));
        }
        if let Some(prefix) = test.strip_suffix(":*") {
            if !is_valid_ncname(prefix) {
                return Err(syntax_error(expr, "invalid prefix"));
            }
            let ns = self.prefix_namespace(expr, prefix)?;
            return Ok(PathOp {
                op: ns_any,
                sym: SymbolId::NONE,
                ns,
            });
        }

        let (prefix, local) = split_qname(test);
        if !is_valid_ncname(local) || prefix.map_or(false, |p| !is_valid_ncname(p)) {
            return Err(syntax_error(expr, "invalid name test"));
        }
        let ns = match prefix {
            Some(prefix) => self.prefix_namespace(expr, prefix)?,
            None => self.intern_namespace("")?,
        };
        let sym = self.symbols.intern(ns, local.as_bytes())?;
        Ok(PathOp { op: name, sym, ns })
    }

    fn prefix_namespace(&mut self, expr: &str, prefix: &str) -> Result<NamespaceId> {
        let set = self.set;
        let uri = set
            .namespaces
            .get_namespace(prefix)
            .ok_or_else(|| syntax_error(expr, &format!("unknown prefix '{}'", prefix)))?;
        self.intern_namespace(uri)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{ComplexTypeDef, ElementDecl, IdentityConstraintDef, Particle, SchemaSet};
    use crate::compiler::compile;
    use crate::error::ErrorKind;
    use crate::limits::BuildConfig;
    use crate::namespaces::QName;
    use crate::runtime::identity::{IcCategory, PathOpKind};
    use crate::runtime::Schema;

    fn with_constraints(ics: Vec<IdentityConstraintDef>) -> crate::error::Result<Schema> {
        let mut set = SchemaSet::new(Some("urn:t")).with_prefix("t", "urn:t");
        let item = set.add_local_element(ElementDecl::new(set.qname("item")));
        let ty = set.add_anonymous_type(ComplexTypeDef::with_particle(
            Particle::local(item).with_occurs(0, None),
        ));
        let mut root = ElementDecl::new(set.qname("root")).with_type(ty);
        for ic in ics {
            root = root.with_identity_constraint(ic);
        }
        set.add_element(root);
        compile(&set, &BuildConfig::default())
    }

    fn key(name: &str) -> IdentityConstraintDef {
        IdentityConstraintDef::new(QName::local(name), IcCategory::Key, "t:item").with_field("@id")
    }

    fn ops(schema: &Schema, path: crate::runtime::ids::PathId) -> Vec<PathOpKind> {
        schema
            .identity()
            .program(path)
            .iter()
            .map(|op| op.op)
            .collect()
    }

    #[test]
    fn test_key_and_keyref() {
        let keyref = IdentityConstraintDef::new(QName::local("r"), IcCategory::Keyref, ".//t:item")
            .with_field("@ref")
            .with_refer(QName::local("k"));
        let schema = with_constraints(vec![key("k"), keyref]).unwrap();
        let root = schema
            .lookup_element(schema.symbol("urn:t", "root").unwrap())
            .unwrap();
        let ics = schema.element_constraints(root);
        assert_eq!(ics.len(), 2);
        let k = schema.constraint(ics[0]).unwrap();
        let r = schema.constraint(ics[1]).unwrap();
        assert_eq!(k.category, IcCategory::Key);
        assert_eq!(r.referenced, ics[0]);

        let tables = schema.identity();
        assert_eq!(
            ops(&schema, tables.selector(k)[0]),
            vec![PathOpKind::RootSelf, PathOpKind::ChildName]
        );
        assert_eq!(
            ops(&schema, tables.selector(r)[0]),
            vec![PathOpKind::RootSelf, PathOpKind::Descend, PathOpKind::ChildName]
        );
        assert_eq!(
            ops(&schema, tables.fields(k)[0]),
            vec![PathOpKind::RootSelf, PathOpKind::AttrName]
        );
        let step = tables.program(tables.selector(k)[0])[1];
        assert_eq!(Some(step.sym), schema.symbol("urn:t", "item"));
    }

    #[test]
    fn test_union_selector() {
        let ic = IdentityConstraintDef::new(QName::local("u"), IcCategory::Unique, "t:item | ./*")
            .with_field(".");
        let schema = with_constraints(vec![ic]).unwrap();
        let id = schema.identity().constraints.len() - 1;
        let ic = schema
            .constraint(crate::runtime::ids::IcId::from_index(id))
            .unwrap();
        let selector = schema.identity().selector(ic)[0];
        let alternatives = schema.identity().alternatives(selector);
        assert_eq!(alternatives.len(), 2);
        assert_eq!(alternatives[1].len(), 3);
        assert_eq!(alternatives[1][2].op, PathOpKind::ChildAny);
    }

    #[test]
    fn test_invalid_paths() {
        for (selector, field) in [
            ("@id", "."),
            ("t:item", "@id/x"),
            ("u:item", "@id"),
            ("t:item", ""),
            ("t:item//x", "@id"),
        ] {
            let ic = IdentityConstraintDef::new(QName::local("k"), IcCategory::Key, selector)
                .with_field(field);
            let err = with_constraints(vec![ic]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::SchemaStructural, "{} {}", selector, field);
        }
    }

    #[test]
    fn test_keyref_checks() {
        let dangling = IdentityConstraintDef::new(QName::local("r"), IcCategory::Keyref, "t:item")
            .with_field("@ref")
            .with_refer(QName::local("missing"));
        let err = with_constraints(vec![dangling]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);

        let arity = IdentityConstraintDef::new(QName::local("r"), IcCategory::Keyref, "t:item")
            .with_field("@a")
            .with_field("@b")
            .with_refer(QName::local("k"));
        let err = with_constraints(vec![key("k"), arity]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);

        let err = with_constraints(vec![key("k"), key("k")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);
    }
}
