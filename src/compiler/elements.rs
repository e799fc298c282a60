//! Element declarations
//!
//! Elements are reserved in two passes: names, flags, substitution heads
//! and types first, so that content models can refer to any element; value
//! constraints and identity constraints once every type is complete.

use std::collections::HashSet;

use tracing::trace;

use super::Compiler;
use crate::ast::ElementDecl;
use crate::error::{Error, Result, ResultExt, TableError};
use crate::namespaces::QName;
use crate::runtime::ids::{ElementId, TypeId, ValidatorId};
use crate::runtime::types::{ContentKind, Element, ElementFlags, ValueConstraint};

impl<'a> Compiler<'a> {
    /// Reserve ids for global, then local, elements
    pub(super) fn reserve_elements(&mut self) -> Result<()> {
        let set = self.set;
        for (name, decl) in &set.elements {
            let id = self.push_element(name, decl, true)?;
            self.element_ids.insert(name.clone(), id);
        }
        for decl in &set.local_elements {
            let id = self.push_element(&decl.name, decl, false)?;
            self.local_element_ids.push(id);
        }
        Ok(())
    }

    fn push_element(&mut self, name: &QName, decl: &'a ElementDecl, global: bool) -> Result<ElementId> {
        let sym = self.intern_qname(name)?;
        let mut flags = ElementFlags::empty();
        flags.set(ElementFlags::GLOBAL, global);
        flags.set(ElementFlags::NILLABLE, decl.nillable);
        flags.set(ElementFlags::ABSTRACT, decl.is_abstract);
        self.elements.push(Element {
            name: sym,
            flags,
            block: decl.block,
            final_mask: decl.final_mask,
            ..Element::default()
        });
        self.element_decls.push(Some(decl));
        Ok(ElementId::from_index(self.elements.len() - 1))
    }

    pub(super) fn element_label(&self, id: ElementId) -> String {
        let global = self.elements[id.index()].flags.contains(ElementFlags::GLOBAL);
        match self.element_decls.get(id.index()).copied().flatten() {
            Some(decl) if global => format!("element {}", decl.name),
            Some(decl) => format!("local element {}", decl.name),
            None => format!("element {}", id),
        }
    }

    /// Substitution heads and element types
    pub(super) fn element_types(&mut self) -> Result<()> {
        for index in 1..self.elements.len() {
            let id = ElementId::from_index(index);
            let Some(decl) = self.element_decls[index] else {
                continue;
            };
            let Some(head_name) = &decl.substitution_group else {
                continue;
            };
            if !self.elements[index].flags.contains(ElementFlags::GLOBAL) {
                return Err(Error::SchemaStructural(format!(
                    "{} is local and cannot join a substitution group",
                    self.element_label(id)
                )));
            }
            let head = *self.element_ids.get(head_name).ok_or_else(|| {
                Error::SchemaStructural(format!(
                    "{} names unknown substitution group head {}",
                    self.element_label(id),
                    head_name
                ))
            })?;
            self.elements[index].subst_head = head;
            self.subst_members.entry(head).or_default().push(id);
        }

        for index in 1..self.elements.len() {
            let id = ElementId::from_index(index);
            let mut seen = HashSet::from([id]);
            let mut head = self.elements[index].subst_head;
            while head.is_some() {
                if !seen.insert(head) {
                    return Err(Error::SubstitutionGroup(format!(
                        "substitution group of {} is circular",
                        self.element_label(id)
                    )));
                }
                head = self.elements[head.index()].subst_head;
            }
        }

        for index in 1..self.elements.len() {
            let id = ElementId::from_index(index);
            let label = self.element_label(id);
            self.element_type(id).with_context(|| label)?;
        }

        for index in 1..self.elements.len() {
            let element = self.elements[index];
            if element.subst_head.is_none() {
                continue;
            }
            let head_type = self.elements[element.subst_head.index()].type_id;
            if self.derivation(element.type_id, head_type).is_none() {
                return Err(Error::SubstitutionGroup(format!(
                    "type of {} is not derived from the type of its head {}",
                    self.element_label(ElementId::from_index(index)),
                    self.element_label(element.subst_head)
                )));
            }
        }
        Ok(())
    }

    /// Declared type, else the head's type, else anyType
    fn element_type(&mut self, id: ElementId) -> Result<TypeId> {
        let element = self.elements[id.index()];
        if element.type_id.is_some() {
            return Ok(element.type_id);
        }
        let decl = self.element_decls[id.index()].ok_or_else(|| {
            TableError::MalformedTable(format!("{} has no declaration", id))
        })?;
        let type_id = match &decl.type_ref {
            Some(r) => self.resolve_type(r)?,
            None if element.subst_head.is_some() => self.element_type(element.subst_head)?,
            None => self.any_type,
        };
        self.elements[id.index()].type_id = type_id;
        Ok(type_id)
    }

    /// Value constraints and identity constraints of every element
    pub(super) fn element_constraints(&mut self) -> Result<()> {
        for index in 1..self.elements.len() {
            let Some(decl) = self.element_decls[index] else {
                continue;
            };
            let id = ElementId::from_index(index);
            let label = self.element_label(id);

            let value = self
                .element_value(id, decl)
                .with_context(|| format!("{} value", label))?;
            self.elements[index].value = value;

            let ic_off = self.identity.element_ics.len();
            for ic in &decl.identity_constraints {
                let ic_id = self
                    .identity_constraint(ic)
                    .with_context(|| format!("{} identity constraint {}", label, ic.name))?;
                self.identity.element_ics.push(ic_id);
            }
            let element = &mut self.elements[index];
            element.ic_off = ic_off as u32;
            element.ic_len = (self.identity.element_ics.len() - ic_off) as u32;
        }
        trace!(
            elements = self.elements.len() - 1,
            constraints = self.identity.constraints.len() - 1,
            "element constraints compiled"
        );
        Ok(())
    }

    fn element_value(&mut self, id: ElementId, decl: &ElementDecl) -> Result<ValueConstraint> {
        if decl.default.is_none() && decl.fixed.is_none() {
            return Ok(ValueConstraint::default());
        }
        let validator = self.text_validator(self.elements[id.index()].type_id)?;
        self.value_constraint(validator, decl.default.as_deref(), decl.fixed.as_deref())
    }

    /// Validator for the character content of a type
    fn text_validator(&self, type_id: TypeId) -> Result<ValidatorId> {
        let ty = self.types[type_id.index()];
        if ty.is_simple() {
            return Ok(ty.validator);
        }
        let ct = self.complex_types[ty.complex as usize];
        match ct.content {
            ContentKind::Simple => Ok(ct.text_validator),
            _ if ct.mixed => Ok(self.types[self.any_simple_type.index()].validator),
            _ => Err(Error::SchemaStructural(format!(
                "a value constraint needs simple or mixed content, {} has neither",
                self.label(type_id)
            ))),
        }
    }
}
