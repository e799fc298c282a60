//! Facet restriction
//!
//! A restriction step copies the base program and then applies its own
//! facets: a facet replaces the base instruction with the same operator,
//! patterns of the step are combined into one instruction, and the
//! enumeration instruction always goes last. Range bounds and enumeration
//! values are parsed by the base validator and stored as value keys.
//! Enumeration values must pass the whole inherited program, so a derived
//! enumeration never leaves the base value space.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::Compiler;
use crate::ast::{Facet, RangeBound};
use crate::error::{Error, Result, ResultExt, TableError};
use crate::namespaces::QName;
use crate::runtime::ids::ValidatorId;
use crate::runtime::validators::{
    FacetInstr, FacetOp, ValidatorFlags, ValidatorKind, ValueRef,
};
use crate::values::{keys, Primitive, ValueKind, WhiteSpace};

fn range_op(bound: RangeBound) -> FacetOp {
    match bound {
        RangeBound::MinInclusive => FacetOp::MinInclusive,
        RangeBound::MaxInclusive => FacetOp::MaxInclusive,
        RangeBound::MinExclusive => FacetOp::MinExclusive,
        RangeBound::MaxExclusive => FacetOp::MaxExclusive,
    }
}

/// Replace the instruction with the same operator, or append
fn set_instr(program: &mut Vec<FacetInstr>, instr: FacetInstr) {
    match program.iter_mut().find(|i| i.op == instr.op) {
        Some(slot) => *slot = instr,
        None => program.push(instr),
    }
}

fn find(program: &[FacetInstr], op: FacetOp) -> Option<FacetInstr> {
    program.iter().find(|i| i.op == op).copied()
}

fn derivation_error(op: FacetOp, detail: impl std::fmt::Display) -> Error {
    Error::Derivation(format!("{} {}", op.name(), detail))
}

impl Compiler<'_> {
    /// Derive a validator from `base` by applying `facets`
    pub(super) fn restrict(&mut self, base: ValidatorId, facets: &[Facet]) -> Result<ValidatorId> {
        let meta = *self.validators.meta(base).ok_or_else(|| {
            TableError::MalformedTable(format!("restriction of unknown validator {}", base))
        })?;
        let primitive = self.validators.primitive(base);
        let mut program = self.checker().program(meta.facets).to_vec();
        let mut white_space = meta.white_space;
        let mut flags = meta.flags - ValidatorFlags::BUILTIN;

        for facet in facets {
            if let Facet::WhiteSpace(ws) = facet {
                if !ws.is_restriction_of(white_space) {
                    return Err(Error::Derivation(format!(
                        "whiteSpace '{}' cannot relax '{}'",
                        ws.as_str(),
                        white_space.as_str()
                    )));
                }
                white_space = *ws;
            }
        }

        let mut patterns = Vec::new();
        let mut enumerations = Vec::new();
        for facet in facets {
            match facet {
                Facet::WhiteSpace(_) => {}
                Facet::Pattern(p) => patterns.push(p.as_str()),
                Facet::Enumeration(v) => enumerations.push(v.as_str()),
                Facet::Length(n) => {
                    self.length_facet(meta.kind, primitive, FacetOp::Length, *n, &mut program)?
                }
                Facet::MinLength(n) => {
                    self.length_facet(meta.kind, primitive, FacetOp::MinLength, *n, &mut program)?
                }
                Facet::MaxLength(n) => {
                    self.length_facet(meta.kind, primitive, FacetOp::MaxLength, *n, &mut program)?
                }
                Facet::TotalDigits(n) => {
                    digits_facet(primitive, FacetOp::TotalDigits, *n, &mut program)?
                }
                Facet::FractionDigits(n) => {
                    digits_facet(primitive, FacetOp::FractionDigits, *n, &mut program)?
                }
                Facet::Range(bound, lexical) => {
                    let op = range_op(*bound);
                    self.range_facet(base, primitive, white_space, op, lexical, &mut program)
                        .with_context(|| format!("{} '{}'", op.name(), lexical))?
                }
            }
        }
        check_length_bounds(&program)?;
        self.check_range_bounds(primitive, &program)?;

        if !patterns.is_empty() {
            let id = self.pattern(&patterns)?;
            program.push(FacetInstr {
                op: FacetOp::Pattern,
                arg0: id.0,
                arg1: 0,
            });
            flags |= ValidatorFlags::HAS_PATTERN;
        }

        if !enumerations.is_empty() {
            let mut seen = HashSet::new();
            let mut members = Vec::with_capacity(enumerations.len());
            for lexical in enumerations {
                let checked = self
                    .checker()
                    .check_with(base, white_space, &program, lexical, &self.set.namespaces)
                    .with_context(|| format!("enumeration value '{}'", lexical))?;
                if primitive == Some(Primitive::Notation) {
                    self.check_notation(&checked.canonical, lexical)?;
                }
                if seen.insert((checked.kind, checked.key.clone())) {
                    let key = self.values.push(&checked.key);
                    members.push((checked.kind, key));
                }
            }
            let id = self.enums.push(&members);
            program.retain(|i| i.op != FacetOp::Enumeration);
            program.push(FacetInstr {
                op: FacetOp::Enumeration,
                arg0: id.0,
                arg1: 0,
            });
            flags |= ValidatorFlags::HAS_ENUM;
        }

        let facets = self.push_program(&program);
        Ok(self.validators.push(crate::runtime::validators::Meta {
            kind: meta.kind,
            index: meta.index,
            white_space,
            flags,
            facets,
        }))
    }

    fn length_facet(
        &self,
        kind: ValidatorKind,
        primitive: Option<Primitive>,
        op: FacetOp,
        value: u32,
        program: &mut Vec<FacetInstr>,
    ) -> Result<()> {
        match (kind, primitive) {
            (ValidatorKind::List | ValidatorKind::AnySimple, _) => {}
            // Length of QName and NOTATION values is not checked
            (_, Some(Primitive::QName | Primitive::Notation)) => return Ok(()),
            (_, Some(p)) if p.has_length() => {}
            _ => {
                return Err(Error::SchemaStructural(format!(
                    "facet {} does not apply to {}",
                    op.name(),
                    primitive.map_or("a union", |p| p.name())
                )))
            }
        }
        if let Some(existing) = find(program, op) {
            let relaxed = match op {
                FacetOp::Length => existing.arg0 != value,
                FacetOp::MinLength => value < existing.arg0,
                _ => value > existing.arg0,
            };
            if relaxed {
                return Err(derivation_error(
                    op,
                    format_args!("{} relaxes the base value {}", value, existing.arg0),
                ));
            }
        }
        set_instr(
            program,
            FacetInstr {
                op,
                arg0: value,
                arg1: 0,
            },
        );
        Ok(())
    }

    fn range_facet(
        &mut self,
        base: ValidatorId,
        primitive: Option<Primitive>,
        white_space: WhiteSpace,
        op: FacetOp,
        lexical: &str,
        program: &mut Vec<FacetInstr>,
    ) -> Result<()> {
        let kind = match primitive.map(|p| p.kind()) {
            Some(kind) if kind.is_ordered() => kind,
            _ => {
                return Err(Error::SchemaStructural(format!(
                    "facet {} needs an ordered type",
                    op.name()
                )))
            }
        };
        let checked =
            self.checker()
                .check_with(base, white_space, &[], lexical, &self.set.namespaces)?;
        if let Some(existing) = find(program, op) {
            let old = self.bound_key(&existing)?;
            let order = keys::compare(kind, &checked.key, &old);
            let widened = match op {
                FacetOp::MinInclusive | FacetOp::MinExclusive => order == Some(Ordering::Less),
                _ => order == Some(Ordering::Greater),
            };
            if widened {
                return Err(derivation_error(op, "is outside the base range"));
            }
        }
        let key = self.values.push(&checked.key);
        set_instr(
            program,
            FacetInstr {
                op,
                arg0: key.off,
                arg1: key.len,
            },
        );
        Ok(())
    }

    fn bound_key(&self, instr: &FacetInstr) -> Result<Vec<u8>> {
        let r = ValueRef {
            off: instr.arg0,
            len: instr.arg1,
            hash: 0,
            present: true,
        };
        self.values.get(r).map(<[u8]>::to_vec).ok_or_else(|| {
            TableError::MalformedTable(format!("{} bound out of range", instr.op.name())).into()
        })
    }

    /// Lower bounds must not exceed upper bounds
    fn check_range_bounds(&self, primitive: Option<Primitive>, program: &[FacetInstr]) -> Result<()> {
        let Some(kind) = primitive.map(|p| p.kind()) else {
            return Ok(());
        };
        for low in [FacetOp::MinInclusive, FacetOp::MinExclusive] {
            for high in [FacetOp::MaxInclusive, FacetOp::MaxExclusive] {
                let (Some(l), Some(h)) = (find(program, low), find(program, high)) else {
                    continue;
                };
                let order = keys::compare(kind, &self.bound_key(&l)?, &self.bound_key(&h)?);
                let empty = match (low, high) {
                    (FacetOp::MinInclusive, FacetOp::MaxInclusive) => {
                        order == Some(Ordering::Greater)
                    }
                    _ => matches!(order, Some(Ordering::Greater | Ordering::Equal)),
                };
                if empty && kind != ValueKind::Duration {
                    return Err(Error::Derivation(format!(
                        "{} is greater than {}",
                        low.name(),
                        high.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// NOTATION enumeration values must name a declared notation
    fn check_notation(&self, canonical: &str, lexical: &str) -> Result<()> {
        let (ns, local) = canonical.split_once('\u{0}').unwrap_or(("", canonical));
        let name = QName::new((!ns.is_empty()).then_some(ns), local);
        if self.set.notations.contains_key(&name) {
            Ok(())
        } else {
            Err(Error::SchemaStructural(format!(
                "enumeration value '{}' does not name a declared notation",
                lexical
            )))
        }
    }
}

fn digits_facet(
    primitive: Option<Primitive>,
    op: FacetOp,
    value: u32,
    program: &mut Vec<FacetInstr>,
) -> Result<()> {
    if !primitive.map_or(false, |p| p.has_digits()) {
        return Err(Error::SchemaStructural(format!(
            "facet {} applies to decimal types only",
            op.name()
        )));
    }
    if op == FacetOp::TotalDigits && value == 0 {
        return Err(Error::SchemaStructural(
            "totalDigits must be positive".to_string(),
        ));
    }
    if let Some(existing) = find(program, op) {
        if value > existing.arg0 {
            return Err(derivation_error(
                op,
                format_args!("{} relaxes the base value {}", value, existing.arg0),
            ));
        }
    }
    set_instr(
        program,
        FacetInstr {
            op,
            arg0: value,
            arg1: 0,
        },
    );
    if let (Some(total), Some(fraction)) = (
        find(program, FacetOp::TotalDigits),
        find(program, FacetOp::FractionDigits),
    ) {
        if fraction.arg0 > total.arg0 {
            return Err(Error::Derivation(
                "fractionDigits is greater than totalDigits".to_string(),
            ));
        }
    }
    Ok(())
}

fn check_length_bounds(program: &[FacetInstr]) -> Result<()> {
    let get = |op| find(program, op).map(|i| i.arg0);
    if let (Some(min), Some(max)) = (get(FacetOp::MinLength), get(FacetOp::MaxLength)) {
        if min > max {
            return Err(Error::Derivation(
                "minLength is greater than maxLength".to_string(),
            ));
        }
    }
    if let Some(len) = get(FacetOp::Length) {
        let outside = get(FacetOp::MinLength).map_or(false, |min| min > len)
            || get(FacetOp::MaxLength).map_or(false, |max| max < len);
        if outside {
            return Err(Error::Derivation(
                "length conflicts with minLength or maxLength".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::ast::{Facet, NotationDecl, RangeBound, SchemaSet, SimpleTypeDef, TypeRef};
    use crate::compiler::compile;
    use crate::error::ErrorKind;
    use crate::limits::BuildConfig;
    use crate::namespaces::{NamespaceContext, QName};
    use crate::runtime::validators::{FacetOp, ValidatorFlags};
    use crate::runtime::Schema;
    use crate::values::WhiteSpace;

    fn build(base: &str, facets: Vec<Facet>) -> crate::error::Result<Schema> {
        let mut set = SchemaSet::new(Some("urn:t"));
        set.add_type(
            set.qname("T"),
            SimpleTypeDef::restriction(TypeRef::builtin(base), facets),
        );
        compile(&set, &BuildConfig::default())
    }

    fn check(schema: &Schema, value: &str) -> bool {
        let ty = schema
            .lookup_type(schema.symbol("urn:t", "T").unwrap())
            .unwrap();
        let v = schema.type_def(ty).unwrap().validator;
        schema
            .checker()
            .check(v, value, &NamespaceContext::new())
            .is_ok()
    }

    #[test]
    fn test_range_facets() {
        let schema = build(
            "int",
            vec![
                Facet::Range(RangeBound::MinInclusive, "1".into()),
                Facet::Range(RangeBound::MaxExclusive, "10".into()),
            ],
        )
        .unwrap();
        assert!(check(&schema, "1"));
        assert!(check(&schema, "9"));
        assert!(!check(&schema, "10"));
        assert!(!check(&schema, "0"));
    }

    #[test]
    fn test_enumeration_goes_last_and_dedupes() {
        let schema = build(
            "decimal",
            vec![
                Facet::Enumeration("1.0".into()),
                Facet::Enumeration("1".into()),
                Facet::Enumeration("2.5".into()),
                Facet::Pattern("[0-9.]+".into()),
            ],
        )
        .unwrap();
        assert!(check(&schema, "1.00"));
        assert!(check(&schema, "2.5"));
        assert!(!check(&schema, "3"));
        let ty = schema
            .lookup_type(schema.symbol("urn:t", "T").unwrap())
            .unwrap();
        let v = schema.type_def(ty).unwrap().validator;
        let program = schema.facet_program(v);
        assert_eq!(program.last().map(|i| i.op), Some(FacetOp::Enumeration));
        let meta = schema.validator_meta(v).unwrap();
        assert!(meta.flags.contains(ValidatorFlags::HAS_ENUM | ValidatorFlags::HAS_PATTERN));
        assert!(!meta.flags.contains(ValidatorFlags::BUILTIN));
        let enum_id = crate::runtime::ids::EnumId(program.last().unwrap().arg0);
        assert_eq!(schema.enums().members(enum_id).len(), 2);
    }

    #[test]
    fn test_enumeration_stays_within_base() {
        let derive = |values: &[&str]| {
            let mut set = SchemaSet::new(Some("urn:t"));
            let letters = set.add_type(
                set.qname("Letters"),
                SimpleTypeDef::restriction(
                    TypeRef::builtin("string"),
                    vec![Facet::Enumeration("a".into()), Facet::Enumeration("b".into())],
                ),
            );
            set.add_type(
                set.qname("T"),
                SimpleTypeDef::restriction(
                    letters,
                    values.iter().map(|v| Facet::Enumeration(v.to_string())).collect(),
                ),
            );
            compile(&set, &BuildConfig::default())
        };

        let err = derive(&["c"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LexicalValue);
        assert_eq!(derive(&["a", "c"]).unwrap_err().kind(), ErrorKind::LexicalValue);

        let schema = derive(&["a"]).unwrap();
        assert!(check(&schema, "a"));
        assert!(!check(&schema, "b"));
        assert!(!check(&schema, "c"));
    }

    #[test]
    fn test_length_facets() {
        let schema = build("string", vec![Facet::MinLength(2), Facet::MaxLength(3)]).unwrap();
        assert!(check(&schema, "ab"));
        assert!(!check(&schema, "a"));
        assert!(!check(&schema, "abcd"));
        let err = build("string", vec![Facet::MinLength(4), Facet::MaxLength(3)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Derivation);
        let err = build("boolean", vec![Facet::Length(1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);
    }

    #[test]
    fn test_invalid_enumeration_value_is_lexical() {
        let err = build("int", vec![Facet::Enumeration("abc".into())]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LexicalValue);
    }

    #[test]
    fn test_whitespace_cannot_relax() {
        let err = build("token", vec![Facet::WhiteSpace(WhiteSpace::Preserve)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Derivation);
        let schema = build("string", vec![Facet::WhiteSpace(WhiteSpace::Collapse)]).unwrap();
        assert!(check(&schema, "  a  b "));
    }

    #[test]
    fn test_restriction_cannot_widen_range() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let small = set.add_type(
            set.qname("Small"),
            SimpleTypeDef::restriction(
                TypeRef::builtin("int"),
                vec![Facet::Range(RangeBound::MaxInclusive, "10".into())],
            ),
        );
        set.add_type(
            set.qname("Wider"),
            SimpleTypeDef::restriction(
                small,
                vec![Facet::Range(RangeBound::MaxInclusive, "20".into())],
            ),
        );
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Derivation);
    }

    #[test]
    fn test_digit_facets() {
        let schema = build("decimal", vec![Facet::TotalDigits(3), Facet::FractionDigits(1)])
            .unwrap();
        assert!(check(&schema, "12.5"));
        assert!(!check(&schema, "1.25"));
        assert!(!check(&schema, "1234"));
        let err = build("string", vec![Facet::TotalDigits(3)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);
    }

    #[test]
    fn test_notation_enumeration() {
        let mut set = SchemaSet::new(None).with_prefix("n", "urn:n");
        set.add_notation(
            QName::namespaced("urn:n", "png"),
            NotationDecl {
                public: Some("image/png".into()),
                system: None,
            },
        );
        set.add_type(
            set.qname("Ok"),
            SimpleTypeDef::restriction(
                TypeRef::builtin("NOTATION"),
                vec![Facet::Enumeration("n:png".into())],
            ),
        );
        assert!(compile(&set, &BuildConfig::default()).is_ok());

        set.add_type(
            set.qname("Bad"),
            SimpleTypeDef::restriction(
                TypeRef::builtin("NOTATION"),
                vec![Facet::Enumeration("n:gif".into())],
            ),
        );
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);
    }
}
