//! Default and fixed values
//!
//! Value constraints are checked against their validator at compile time;
//! the canonical form and the value key are stored in the value arena.

use super::Compiler;
use crate::error::{Error, Result};
use crate::runtime::ids::ValidatorId;
use crate::runtime::types::{ConstraintMode, ValueConstraint};
use crate::runtime::validators::ValueKeyRef;

impl Compiler<'_> {
    /// Canonicalize a `default` or `fixed` value
    pub(super) fn value_constraint(
        &mut self,
        validator: ValidatorId,
        default: Option<&str>,
        fixed: Option<&str>,
    ) -> Result<ValueConstraint> {
        let (mode, lexical) = match (default, fixed) {
            (None, None) => return Ok(ValueConstraint::default()),
            (Some(_), Some(_)) => {
                return Err(Error::SchemaStructural(
                    "default and fixed are mutually exclusive".to_string(),
                ))
            }
            (Some(v), None) => (ConstraintMode::Default, v),
            (None, Some(v)) => (ConstraintMode::Fixed, v),
        };
        let checked = self
            .checker()
            .check(validator, lexical, &self.set.namespaces)?;
        let canonical = self.values.push(checked.canonical.as_bytes());
        let key = self.values.push(&checked.key);
        Ok(ValueConstraint {
            mode,
            canonical,
            key: ValueKeyRef {
                kind: Some(checked.kind),
                value: key,
            },
            member_type: checked.member_type,
        })
    }

    /// Whether two constraints carry the same value
    pub(super) fn same_value(&self, a: &ValueConstraint, b: &ValueConstraint) -> bool {
        a.key.kind == b.key.kind && self.values.get(a.key.value) == self.values.get(b.key.value)
    }
}
