//! Type headers and ancestor arrays
//!
//! Every type records its base and derivation method; the ancestor arrays
//! then list, per type, every ancestor nearest first together with the
//! union of derivation methods along the way. Derivation queries are a
//! scan of one short slice.

use std::collections::HashSet;

use tracing::trace;

use super::builtins::{BuiltinShape, XSD_ANY_TYPE};
use super::{Compiler, TypeSource};
use crate::ast::{SimpleVariety, TypeDef, TypeRef};
use crate::error::{Error, Result, ResultExt};
use crate::runtime::ids::TypeId;
use crate::runtime::types::{DerivationMask, DerivationMethod, TypeKind};

impl Compiler<'_> {
    /// Fill in base and derivation method of every type
    pub(super) fn type_headers(&mut self) -> Result<()> {
        for index in 1..self.types.len() {
            let id = TypeId::from_index(index);
            let (base, derivation) = match self.sources[index] {
                TypeSource::Placeholder => continue,
                TypeSource::Builtin(builtin) => match builtin.shape {
                    BuiltinShape::AnyType => (TypeId::NONE, DerivationMethod::None),
                    BuiltinShape::List { .. } => (self.any_simple_type, DerivationMethod::List),
                    _ => {
                        let base = self.builtin_id(builtin.base_type.unwrap_or(XSD_ANY_TYPE))?;
                        (base, DerivationMethod::Restriction)
                    }
                },
                TypeSource::User(def) => {
                    let label = self.label(id).to_string();
                    self.user_header(def).with_context(|| label)?
                }
            };
            let ty = &mut self.types[index];
            ty.base = base;
            ty.derivation = derivation;
        }
        Ok(())
    }

    fn user_header(&self, def: &TypeDef) -> Result<(TypeId, DerivationMethod)> {
        match def {
            TypeDef::Simple(simple) => match &simple.variety {
                SimpleVariety::Restriction { base, .. } => {
                    let base = self.simple_operand(base, DerivationMethod::Restriction)?;
                    Ok((base, DerivationMethod::Restriction))
                }
                SimpleVariety::List { item } => {
                    self.simple_operand(item, DerivationMethod::List)?;
                    Ok((self.any_simple_type, DerivationMethod::List))
                }
                SimpleVariety::Union { members } => {
                    for member in members {
                        self.simple_operand(member, DerivationMethod::Union)?;
                    }
                    Ok((self.any_simple_type, DerivationMethod::Union))
                }
            },
            TypeDef::Complex(complex) => {
                let (base, derivation) = match &complex.base {
                    Some(base) => (self.resolve_type(base)?, complex.derivation),
                    None => (self.any_type, DerivationMethod::Restriction),
                };
                if derivation == DerivationMethod::None {
                    return Err(Error::Derivation(format!(
                        "no derivation method given for base {}",
                        self.label(base)
                    )));
                }
                if matches!(derivation, DerivationMethod::List | DerivationMethod::Union) {
                    return Err(Error::Derivation(format!(
                        "complex types cannot derive by {:?}",
                        derivation
                    )));
                }
                self.check_final(base, derivation)?;
                Ok((base, derivation))
            }
        }
    }

    /// Resolve the base, item or member type of a simple type
    fn simple_operand(&self, type_ref: &TypeRef, method: DerivationMethod) -> Result<TypeId> {
        let id = self.resolve_type(type_ref)?;
        if self.types[id.index()].kind == TypeKind::Complex {
            return Err(Error::SchemaStructural(format!(
                "simple type cannot be built from complex {}",
                self.label(id)
            )));
        }
        self.check_final(id, method)?;
        Ok(id)
    }

    fn check_final(&self, base: TypeId, method: DerivationMethod) -> Result<()> {
        if self.types[base.index()].final_mask.intersects(method.mask()) {
            return Err(Error::Derivation(format!(
                "{} is final for {:?}",
                self.label(base),
                method
            )));
        }
        Ok(())
    }

    /// Build the ancestor arrays; base chains must be acyclic
    pub(super) fn compute_ancestors(&mut self) -> Result<()> {
        self.ancestors.ids.clear();
        self.ancestors.masks.clear();
        for index in 1..self.types.len() {
            let id = TypeId::from_index(index);
            let off = self.ancestors.ids.len();
            let mut seen = HashSet::from([id]);
            let mut mask = DerivationMask::empty();
            let mut current = self.types[index];
            while current.base.is_some() {
                let base = current.base;
                if !seen.insert(base) {
                    return Err(Error::SchemaStructural(format!(
                        "{} is derived from itself",
                        self.label(id)
                    )));
                }
                mask |= current.derivation.mask();
                self.ancestors.ids.push(base);
                self.ancestors.masks.push(mask);
                current = self.types[base.index()];
            }
            let ty = &mut self.types[index];
            ty.anc_off = off as u32;
            ty.anc_len = (self.ancestors.ids.len() - off) as u32;
        }
        trace!(entries = self.ancestors.ids.len(), "ancestor arrays built");
        Ok(())
    }

    /// Cumulative derivation mask from `derived` up to `base`; empty when
    /// they are the same type, `None` when unrelated
    pub(super) fn derivation(&self, derived: TypeId, base: TypeId) -> Option<DerivationMask> {
        if derived == base {
            return Some(DerivationMask::empty());
        }
        let ty = self.types.get(derived.index())?;
        let start = ty.anc_off as usize;
        let end = start + ty.anc_len as usize;
        self.ancestors.ids[start..end]
            .iter()
            .position(|a| *a == base)
            .map(|i| self.ancestors.masks[start + i])
    }

    /// Union of the `block` masks of the types from `derived` up to, but
    /// excluding, `base`
    pub(super) fn chain_block(&self, derived: TypeId, base: TypeId) -> DerivationMask {
        let mut mask = DerivationMask::empty();
        let mut current = derived;
        while current.is_some() && current != base {
            let ty = self.types[current.index()];
            mask |= ty.block_mask;
            current = ty.base;
        }
        mask
    }
}
