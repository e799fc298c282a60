//! Checking lexical values against validators
//!
//! The checker borrows the value tables only, so the compiler can run it
//! over tables that are still being filled: enumeration members and
//! default/fixed values are checked this way before they are stored.

use std::cmp::Ordering;

use super::ids::{TypeId, ValidatorId};
use super::validators::{
    EnumTable, FacetInstr, FacetOp, FacetProgramRef, PatternTable, StringFlavour,
    ValidatorBundle, ValidatorKind, ValueBlob, ValueRef,
};
use crate::error::LexicalError;
use crate::names;
use crate::namespaces::NsResolver;
use crate::values::keys::{self, DecimalKey};
use crate::values::{self, Primitive, ValueKind, WhiteSpace};

/// Outcome of a successful check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedValue {
    /// Canonical lexical form
    pub canonical: String,
    /// Value key
    pub key: Vec<u8>,
    /// Kind of the key
    pub kind: ValueKind,
    /// Union member validator that accepted the value
    pub member_validator: ValidatorId,
    /// Union member type that accepted the value
    pub member_type: TypeId,
}

/// Read-only view over the value tables
#[derive(Debug, Clone, Copy)]
pub struct ValueChecker<'a> {
    validators: &'a ValidatorBundle,
    facets: &'a [FacetInstr],
    patterns: &'a PatternTable,
    enums: &'a EnumTable,
    values: &'a ValueBlob,
}

impl<'a> ValueChecker<'a> {
    /// Create a checker over borrowed tables
    pub fn new(
        validators: &'a ValidatorBundle,
        facets: &'a [FacetInstr],
        patterns: &'a PatternTable,
        enums: &'a EnumTable,
        values: &'a ValueBlob,
    ) -> Self {
        Self {
            validators,
            facets,
            patterns,
            enums,
            values,
        }
    }

    /// Facet instructions of a program reference
    pub fn program(&self, r: FacetProgramRef) -> &'a [FacetInstr] {
        let start = r.off as usize;
        self.facets.get(start..start + r.len as usize).unwrap_or(&[])
    }

    /// Check a lexical value against a validator
    pub fn check(
        &self,
        id: ValidatorId,
        lexical: &str,
        resolver: &dyn NsResolver,
    ) -> Result<CheckedValue, LexicalError> {
        let meta = self
            .validators
            .meta(id)
            .ok_or_else(|| LexicalError::new("anySimpleType", lexical).with_reason("unknown validator"))?;
        self.check_with(id, meta.white_space, self.program(meta.facets), lexical, resolver)
    }

    /// Check with an explicit whitespace mode and facet program, using the
    /// family parameters of `id`
    pub fn check_with(
        &self,
        id: ValidatorId,
        white_space: WhiteSpace,
        program: &[FacetInstr],
        lexical: &str,
        resolver: &dyn NsResolver,
    ) -> Result<CheckedValue, LexicalError> {
        let meta = self
            .validators
            .meta(id)
            .ok_or_else(|| LexicalError::new("anySimpleType", lexical).with_reason("unknown validator"))?;
        let normalized = white_space.normalize(lexical);
        let (value, length) = match meta.kind {
            ValidatorKind::List => self.check_list(id, &normalized, resolver)?,
            ValidatorKind::Union => (self.check_union(id, lexical, &normalized, resolver)?, None),
            ValidatorKind::AnySimple => {
                let (canonical, key) = values::canonical::string(&normalized);
                (
                    CheckedValue {
                        canonical,
                        key,
                        kind: ValueKind::String,
                        member_validator: ValidatorId::NONE,
                        member_type: TypeId::NONE,
                    },
                    None,
                )
            }
            _ => {
                let primitive = self.validators.primitive(id).ok_or_else(|| {
                    LexicalError::new("anySimpleType", lexical).with_reason("malformed validator")
                })?;
                let value = self.check_atomic(id, primitive, &normalized, resolver)?;
                let length = values::value_length(primitive, &value.canonical, &value.key);
                (value, length)
            }
        };
        self.run_program(program, &normalized, &value, length)?;
        Ok(value)
    }

    fn check_atomic(
        &self,
        id: ValidatorId,
        primitive: Primitive,
        normalized: &str,
        resolver: &dyn NsResolver,
    ) -> Result<CheckedValue, LexicalError> {
        let meta = self.validators.meta(id).copied();
        if let Some(meta) = meta.filter(|m| m.kind == ValidatorKind::String) {
            let flavour = self
                .validators
                .strings
                .get(meta.index as usize)
                .map(|s| s.flavour)
                .unwrap_or_default();
            check_flavour(flavour, normalized)?;
        }
        let (canonical, key) = values::canonicalize(primitive, normalized, resolver)?;
        if let Some(meta) = meta.filter(|m| m.kind == ValidatorKind::Integer) {
            let range = self
                .validators
                .integers
                .get(meta.index as usize)
                .map(|i| i.range)
                .unwrap_or_default();
            if !range.contains(&canonical) {
                return Err(LexicalError::new("integer", normalized)
                    .with_reason("out of range for the built-in type"));
            }
        }
        Ok(CheckedValue {
            canonical,
            key,
            kind: primitive.kind(),
            member_validator: ValidatorId::NONE,
            member_type: TypeId::NONE,
        })
    }

    fn check_list(
        &self,
        id: ValidatorId,
        normalized: &str,
        resolver: &dyn NsResolver,
    ) -> Result<(CheckedValue, Option<usize>), LexicalError> {
        let item = self
            .validators
            .list_item(id)
            .ok_or_else(|| LexicalError::new("list", normalized).with_reason("malformed validator"))?;
        let collapsed = WhiteSpace::Collapse.normalize(normalized);
        let mut items = Vec::new();
        for token in collapsed.split(' ').filter(|t| !t.is_empty()) {
            items.push(self.check(item, token, resolver)?);
        }
        let canonical = items
            .iter()
            .map(|v| v.canonical.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let key = keys::list_key(items.iter().map(|v| (v.kind, v.key.as_slice())));
        let count = items.len();
        Ok((
            CheckedValue {
                canonical,
                key,
                kind: ValueKind::List,
                member_validator: ValidatorId::NONE,
                member_type: TypeId::NONE,
            },
            Some(count),
        ))
    }

    fn check_union(
        &self,
        id: ValidatorId,
        lexical: &str,
        normalized: &str,
        resolver: &dyn NsResolver,
    ) -> Result<CheckedValue, LexicalError> {
        let mut last = None;
        for (member, member_type, same_ws) in self.validators.union_members(id) {
            let input = if same_ws { normalized } else { lexical };
            match self.check(member, input, resolver) {
                Ok(mut value) => {
                    if value.member_validator.is_none() {
                        value.member_validator = member;
                        value.member_type = member_type;
                    }
                    return Ok(value);
                }
                Err(e) => last = Some(e),
            }
        }
        Err(LexicalError::new("union", lexical).with_reason(match last {
            Some(e) => format!("no member type accepts the value; last: {}", e),
            None => "union has no member types".to_string(),
        }))
    }

    fn run_program(
        &self,
        program: &[FacetInstr],
        normalized: &str,
        value: &CheckedValue,
        length: Option<usize>,
    ) -> Result<(), LexicalError> {
        for instr in program {
            if !self.eval(instr, normalized, value, length) {
                return Err(LexicalError::new(instr.op.name(), normalized)
                    .with_reason(format!("{} facet not satisfied", instr.op.name())));
            }
        }
        Ok(())
    }

    fn eval(
        &self,
        instr: &FacetInstr,
        normalized: &str,
        value: &CheckedValue,
        length: Option<usize>,
    ) -> bool {
        let arg = instr.arg0 as usize;
        match instr.op {
            FacetOp::Pattern => self
                .patterns
                .regex(super::ids::PatternId(instr.arg0))
                .map_or(false, |re| re.is_match(normalized)),
            FacetOp::Enumeration => self.enums.contains(
                self.values,
                super::ids::EnumId(instr.arg0),
                value.kind,
                &value.key,
            ),
            FacetOp::MinInclusive
            | FacetOp::MaxInclusive
            | FacetOp::MinExclusive
            | FacetOp::MaxExclusive => {
                let bound = ValueRef {
                    off: instr.arg0,
                    len: instr.arg1,
                    hash: 0,
                    present: true,
                };
                let Some(bound) = self.values.get(bound) else {
                    return false;
                };
                let ord = keys::compare(value.kind, &value.key, bound);
                match (instr.op, ord) {
                    (_, None) => false,
                    (FacetOp::MinInclusive, Some(o)) => o != Ordering::Less,
                    (FacetOp::MaxInclusive, Some(o)) => o != Ordering::Greater,
                    (FacetOp::MinExclusive, Some(o)) => o == Ordering::Greater,
                    (_, Some(o)) => o == Ordering::Less,
                }
            }
            FacetOp::Length => length.map_or(true, |l| l == arg),
            FacetOp::MinLength => length.map_or(true, |l| l >= arg),
            FacetOp::MaxLength => length.map_or(true, |l| l <= arg),
            FacetOp::TotalDigits => {
                DecimalKey::decode(&value.key).map_or(false, |d| d.total_digits() <= arg)
            }
            FacetOp::FractionDigits => {
                DecimalKey::decode(&value.key).map_or(false, |d| d.fraction_digits() <= arg)
            }
        }
    }
}

fn check_flavour(flavour: StringFlavour, value: &str) -> Result<(), LexicalError> {
    let (ok, name) = match flavour {
        StringFlavour::Plain => (true, "string"),
        StringFlavour::Language => (names::is_valid_language(value), "language"),
        StringFlavour::NmToken => (names::is_valid_nmtoken(value), "NMTOKEN"),
        StringFlavour::Name => (names::is_valid_name(value), "Name"),
        StringFlavour::NcName => (names::is_valid_ncname(value), "NCName"),
    };
    if ok {
        Ok(())
    } else {
        Err(LexicalError::new(name, value))
    }
}
