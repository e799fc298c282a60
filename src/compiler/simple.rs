//! Simple-type validators
//!
//! Built-ins get one validator each with their family parameters. User
//! restrictions inherit the base validator's family and extend its facet
//! program; lists and unions get their own family records.

use tracing::trace;

use super::builtins::{BuiltinShape, BuiltinType};
use super::{Compiler, TypeSource};
use crate::ast::{SimpleTypeDef, SimpleVariety};
use crate::error::{Error, Result, ResultExt, TableError};
use crate::runtime::ids::{TypeId, ValidatorId};
use crate::runtime::validators::{
    BinaryFamily, FacetInstr, FacetOp, FacetProgramRef, IntegerFamily, IntegerRange, ListFamily,
    Meta, StringFamily, StringFlavour, TemporalFamily, UnionFamily, ValidatorFlags, ValidatorKind,
};
use crate::values::{Primitive, WhiteSpace};

/// Lists must not be empty
const NON_EMPTY_LIST: FacetInstr = FacetInstr {
    op: FacetOp::MinLength,
    arg0: 1,
    arg1: 0,
};

impl Compiler<'_> {
    /// Validator of a simple type, built on first use
    pub(super) fn simple_validator(&mut self, id: TypeId) -> Result<ValidatorId> {
        let ty = self.types[id.index()];
        if ty.validator.is_some() {
            return Ok(ty.validator);
        }
        if !ty.is_simple() {
            return Err(Error::SchemaStructural(format!(
                "{} is not a simple type",
                self.label(id)
            )));
        }
        if !self.simple_visiting.insert(id) {
            return Err(Error::SchemaStructural(format!(
                "{} is defined in terms of itself",
                self.label(id)
            )));
        }
        let result = match self.sources[id.index()] {
            TypeSource::Builtin(builtin) => self.builtin_validator(builtin),
            TypeSource::User(crate::ast::TypeDef::Simple(def)) => self.user_validator(def),
            _ => Err(TableError::MalformedTable(format!(
                "{} has no simple definition",
                self.label(id)
            ))
            .into()),
        };
        self.simple_visiting.remove(&id);
        let label = self.label(id).to_string();
        let validator = result.with_context(|| label)?;
        self.types[id.index()].validator = validator;
        trace!(type_id = %id, validator = %validator, "simple type validator");
        Ok(validator)
    }

    fn builtin_validator(&mut self, builtin: &BuiltinType) -> Result<ValidatorId> {
        let meta = match builtin.shape {
            BuiltinShape::AnyType => {
                return Err(Error::SchemaStructural(
                    "anyType has no simple validator".to_string(),
                ))
            }
            BuiltinShape::AnySimple => Meta {
                kind: ValidatorKind::AnySimple,
                index: 0,
                white_space: WhiteSpace::Preserve,
                flags: ValidatorFlags::BUILTIN,
                facets: FacetProgramRef::default(),
            },
            BuiltinShape::Atomic {
                primitive,
                white_space,
                flavour,
                range,
            } => {
                let (kind, index) = self.family(primitive, flavour, range);
                Meta {
                    kind,
                    index,
                    white_space,
                    flags: ValidatorFlags::BUILTIN,
                    facets: FacetProgramRef::default(),
                }
            }
            BuiltinShape::List { item } => {
                let item = self.builtin_id(item)?;
                let item = self.simple_validator(item)?;
                let mut meta = self.list_meta(item);
                meta.flags = ValidatorFlags::BUILTIN;
                meta
            }
        };
        Ok(self.validators.push(meta))
    }

    /// Family record of an atomic primitive
    fn family(
        &mut self,
        primitive: Primitive,
        flavour: StringFlavour,
        range: IntegerRange,
    ) -> (ValidatorKind, u32) {
        let v = &mut self.validators;
        match primitive {
            Primitive::String => {
                v.strings.push(StringFamily { flavour });
                (ValidatorKind::String, v.strings.len() as u32 - 1)
            }
            Primitive::Integer => {
                v.integers.push(IntegerFamily { range });
                (ValidatorKind::Integer, v.integers.len() as u32 - 1)
            }
            Primitive::DateTime
            | Primitive::Time
            | Primitive::Date
            | Primitive::GYearMonth
            | Primitive::GYear
            | Primitive::GMonthDay
            | Primitive::GDay
            | Primitive::GMonth => {
                v.temporals.push(TemporalFamily { primitive });
                (ValidatorKind::Temporal, v.temporals.len() as u32 - 1)
            }
            Primitive::HexBinary | Primitive::Base64Binary => {
                v.binaries.push(BinaryFamily { primitive });
                (ValidatorKind::Binary, v.binaries.len() as u32 - 1)
            }
            Primitive::Boolean => (ValidatorKind::Boolean, 0),
            Primitive::Decimal => (ValidatorKind::Decimal, 0),
            Primitive::Float => (ValidatorKind::Float, 0),
            Primitive::Double => (ValidatorKind::Double, 0),
            Primitive::Duration => (ValidatorKind::Duration, 0),
            Primitive::AnyUri => (ValidatorKind::AnyUri, 0),
            Primitive::QName => (ValidatorKind::QName, 0),
            Primitive::Notation => (ValidatorKind::Notation, 0),
        }
    }

    fn list_meta(&mut self, item: ValidatorId) -> Meta {
        self.validators.lists.push(ListFamily { item });
        let index = self.validators.lists.len() as u32 - 1;
        let facets = self.push_program(&[NON_EMPTY_LIST]);
        Meta {
            kind: ValidatorKind::List,
            index,
            white_space: WhiteSpace::Collapse,
            flags: ValidatorFlags::empty(),
            facets,
        }
    }

    fn user_validator(&mut self, def: &SimpleTypeDef) -> Result<ValidatorId> {
        match &def.variety {
            SimpleVariety::Restriction { base, facets } => {
                let base = self.resolve_type(base)?;
                let base = self.simple_validator(base)?;
                self.restrict(base, facets)
            }
            SimpleVariety::List { item } => {
                let item_type = self.resolve_type(item)?;
                let item = self.simple_validator(item_type)?;
                if self.validators.meta(item).map(|m| m.kind) == Some(ValidatorKind::List) {
                    return Err(Error::SchemaStructural(format!(
                        "list item {} is itself a list",
                        self.label(item_type)
                    )));
                }
                let meta = self.list_meta(item);
                Ok(self.validators.push(meta))
            }
            SimpleVariety::Union { members } => {
                if members.is_empty() {
                    return Err(Error::SchemaStructural(
                        "union has no member types".to_string(),
                    ));
                }
                let mut entries = Vec::with_capacity(members.len());
                for member in members {
                    let member_type = self.resolve_type(member)?;
                    let validator = self.simple_validator(member_type)?;
                    let same_ws = self
                        .validators
                        .meta(validator)
                        .map_or(false, |m| m.white_space == WhiteSpace::Collapse);
                    entries.push((validator, member_type, same_ws));
                }
                let v = &mut self.validators;
                let off = v.union_members.len() as u32;
                for (validator, member_type, same_ws) in entries {
                    v.union_members.push(validator);
                    v.union_types.push(member_type);
                    v.union_same_ws.push(same_ws);
                }
                v.unions.push(UnionFamily {
                    off,
                    len: members.len() as u32,
                });
                let index = v.unions.len() as u32 - 1;
                Ok(self.validators.push(Meta {
                    kind: ValidatorKind::Union,
                    index,
                    white_space: WhiteSpace::Collapse,
                    flags: ValidatorFlags::empty(),
                    facets: FacetProgramRef::default(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{SchemaSet, SimpleTypeDef, TypeRef};
    use crate::compiler::compile;
    use crate::error::ErrorKind;
    use crate::limits::BuildConfig;
    use crate::namespaces::{NamespaceContext, XSD_NAMESPACE};
    use crate::runtime::validators::ValidatorKind;
    use crate::runtime::Schema;

    fn validator(schema: &Schema, ns: &str, local: &str) -> crate::runtime::ids::ValidatorId {
        let ty = schema
            .lookup_type(schema.symbol(ns, local).unwrap())
            .unwrap();
        schema.type_def(ty).unwrap().validator
    }

    #[test]
    fn test_builtin_validators() {
        let schema = compile(&SchemaSet::new(None), &BuildConfig::default()).unwrap();
        let ns = NamespaceContext::new();
        let int = validator(&schema, XSD_NAMESPACE, "int");
        assert_eq!(schema.validator_meta(int).unwrap().kind, ValidatorKind::Integer);
        assert!(schema.checker().check(int, " 42 ", &ns).is_ok());
        assert!(schema.checker().check(int, "4294967296", &ns).is_err());

        let tokens = validator(&schema, XSD_NAMESPACE, "NMTOKENS");
        assert_eq!(schema.validator_meta(tokens).unwrap().kind, ValidatorKind::List);
        assert!(schema.checker().check(tokens, "a b c", &ns).is_ok());
        assert!(schema.checker().check(tokens, "   ", &ns).is_err());
    }

    #[test]
    fn test_union_member_type() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let u = set.qname("IntOrDate");
        set.add_type(
            u,
            SimpleTypeDef::union(vec![TypeRef::builtin("int"), TypeRef::builtin("date")]),
        );
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        let ns = NamespaceContext::new();
        let v = validator(&schema, "urn:t", "IntOrDate");
        let checked = schema.checker().check(v, "2024-01-31", &ns).unwrap();
        let date = schema
            .lookup_type(schema.symbol(XSD_NAMESPACE, "date").unwrap())
            .unwrap();
        assert_eq!(checked.member_type, date);
        assert!(schema.checker().check(v, "abc", &ns).is_err());
    }

    #[test]
    fn test_list_of_list_is_rejected() {
        let mut set = SchemaSet::new(None);
        set.add_type(set.qname("L"), SimpleTypeDef::list(TypeRef::builtin("NMTOKENS")));
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);
    }

    #[test]
    fn test_union_cycle_is_rejected() {
        let mut set = SchemaSet::new(None);
        let a = set.qname("a");
        let b = set.qname("b");
        set.add_type(
            a.clone(),
            SimpleTypeDef::union(vec![TypeRef::named(b.clone())]),
        );
        set.add_type(b, SimpleTypeDef::union(vec![TypeRef::named(a)]));
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);
    }
}
