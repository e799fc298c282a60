//! Build fingerprint
//!
//! Walks every table in a fixed order and hashes a canonical byte stream:
//! integers little-endian, slices as a `u32` length followed by their
//! elements, byte blobs as length plus bytes.

use super::identity::PathOp;
use super::models::{BitsetRef, Dfa, Matcher};
use super::types::{AttrUse, ValueConstraint};
use super::validators::{FacetProgramRef, IntegerRange, ValueRef};
use super::Schema;
use crate::hashing::{nonzero, Fnv64, HashIndex};

struct Stream(Fnv64);

impl Stream {
    fn u8(&mut self, v: u8) {
        self.0.write_u8(v);
    }

    fn bool(&mut self, v: bool) {
        self.0.write_u8(u8::from(v));
    }

    fn u32(&mut self, v: u32) {
        self.0.write_u32(v);
    }

    fn u64(&mut self, v: u64) {
        self.0.write_u64(v);
    }

    fn len(&mut self, n: usize) {
        self.u32(n as u32);
    }

    fn bytes(&mut self, b: &[u8]) {
        self.len(b.len());
        self.0.write(b);
    }

    fn u32s(&mut self, items: impl ExactSizeIterator<Item = u32>) {
        self.len(items.len());
        for v in items {
            self.u32(v);
        }
    }

    fn value_ref(&mut self, r: &ValueRef) {
        self.bool(r.present);
        self.u32(r.off);
        self.u32(r.len);
        self.u64(r.hash);
    }

    fn constraint(&mut self, c: &ValueConstraint) {
        self.u8(c.mode as u8);
        self.value_ref(&c.canonical);
        self.u8(c.key.kind.map_or(0, |k| k as u8));
        self.value_ref(&c.key.value);
        self.u32(c.member_type.0);
    }

    fn index(&mut self, index: &HashIndex) {
        self.u32s(index.slots().iter().copied());
        self.len(index.hashes().len());
        for h in index.hashes() {
            self.u64(*h);
        }
    }

    fn program(&mut self, r: &FacetProgramRef) {
        self.u32(r.off);
        self.u32(r.len);
    }

    fn bitset_ref(&mut self, r: &BitsetRef) {
        self.u32(r.off);
        self.u32(r.len);
    }

    fn attr_use(&mut self, u: &AttrUse) {
        self.u32(u.name.0);
        self.u32(u.decl.0);
        self.u32(u.type_id.0);
        self.u32(u.validator.0);
        self.u8(u.mode as u8);
        self.constraint(&u.value);
    }

    fn dfa(&mut self, dfa: &Dfa) {
        self.u32(dfa.start);
        self.len(dfa.states.len());
        for s in &dfa.states {
            self.bool(s.accept);
            self.u32(s.trans_off);
            self.u32(s.trans_len);
            self.u32(s.wild_off);
            self.u32(s.wild_len);
        }
        self.len(dfa.transitions.len());
        for t in &dfa.transitions {
            self.u32(t.sym.0);
            self.u32(t.next);
            self.u32(t.elem.0);
        }
        self.len(dfa.wild_edges.len());
        for e in &dfa.wild_edges {
            self.u32(e.rule.0);
            self.u32(e.next);
        }
    }

    fn matcher(&mut self, m: &Matcher) {
        self.u8(m.kind as u8);
        self.u32(m.sym.0);
        self.u32(m.elem.0);
        self.u32(m.rule.0);
    }

    fn path_op(&mut self, op: &PathOp) {
        self.u8(op.op as u8);
        self.u32(op.sym.0);
        self.u32(op.ns.0);
    }
}

/// Compute the fingerprint of a schema (never 0)
pub fn compute(schema: &Schema) -> u64 {
    let mut s = Stream(Fnv64::new());

    // namespaces
    let (blob, offsets, lengths) = schema.namespaces.raw();
    s.bytes(blob);
    s.u32s(offsets.iter().copied());
    s.u32s(lengths.iter().copied());

    // symbols
    let (namespaces, locals, offsets, lengths) = schema.symbols.raw();
    s.u32s(namespaces.iter().map(|n| n.0));
    s.bytes(locals);
    s.u32s(offsets.iter().copied());
    s.u32s(lengths.iter().copied());

    // predefined ids
    s.u32s(schema.predefined.as_array().iter().map(|p| p.0));

    // global indices
    for index in [
        schema.global_elements.iter().map(|(a, b)| (a.0, b.0)).collect::<Vec<_>>(),
        schema.global_types.iter().map(|(a, b)| (a.0, b.0)).collect(),
        schema.global_attributes.iter().map(|(a, b)| (a.0, b.0)).collect(),
    ] {
        s.len(index.len());
        for (sym, id) in index {
            s.u32(sym);
            s.u32(id);
        }
    }

    // types
    s.len(schema.types.len());
    for t in &schema.types {
        s.u8(t.kind as u8);
        s.u32(t.name.0);
        s.u8(t.flags.bits());
        s.u32(t.base.0);
        s.u8(t.derivation as u8);
        s.u8(t.final_mask.bits());
        s.u8(t.block_mask.bits());
        s.u32(t.anc_off);
        s.u32(t.anc_len);
        s.u32(t.validator.0);
        s.u32(t.complex);
    }
    s.u32(schema.any_type.0);
    s.u32(schema.any_simple_type.0);

    // ancestors
    s.u32s(schema.ancestors.ids.iter().map(|t| t.0));
    s.len(schema.ancestors.masks.len());
    for m in &schema.ancestors.masks {
        s.u8(m.bits());
    }

    // complex types
    s.len(schema.complex_types.len());
    for ct in &schema.complex_types {
        s.u8(ct.content as u8);
        s.u32(ct.attributes.off);
        s.u32(ct.attributes.len);
        s.u8(ct.attributes.mode as u8);
        s.u32(ct.attributes.hash_table);
        s.u32(ct.any_attribute.0);
        s.u32(ct.text_validator.0);
        s.constraint(&ct.text_value);
        s.u8(ct.model.kind as u8);
        s.u32(ct.model.index);
        s.bool(ct.mixed);
    }

    // elements
    s.len(schema.elements.len());
    for e in &schema.elements {
        s.u32(e.name.0);
        s.u32(e.type_id.0);
        s.u32(e.subst_head.0);
        s.constraint(&e.value);
        s.u8(e.flags.bits());
        s.u8(e.block.bits());
        s.u8(e.final_mask.bits());
        s.u32(e.ic_off);
        s.u32(e.ic_len);
    }

    // attributes
    s.len(schema.attributes.len());
    for a in &schema.attributes {
        s.u32(a.name.0);
        s.u32(a.type_id.0);
        s.u32(a.validator.0);
        s.constraint(&a.value);
    }

    // attribute index
    s.len(schema.attr_uses.len());
    for u in &schema.attr_uses {
        s.attr_use(u);
    }
    s.len(schema.attr_tables.len());
    for t in &schema.attr_tables {
        s.index(t);
    }

    // validators
    let v = &schema.validators;
    s.len(v.meta.len());
    for m in &v.meta {
        s.u8(m.kind as u8);
        s.u32(m.index);
        s.u8(m.white_space as u8);
        s.u8(m.flags.bits());
        s.program(&m.facets);
    }
    s.len(v.strings.len());
    for f in &v.strings {
        s.u8(f.flavour as u8);
    }
    s.len(v.integers.len());
    for f in &v.integers {
        let (tag, a, b) = match f.range {
            IntegerRange::Unbounded => (0u8, 0i128, 0i128),
            IntegerRange::Bounded { min, max } => (1, min, max),
            IntegerRange::AtLeast(min) => (2, min, 0),
            IntegerRange::AtMost(max) => (3, 0, max),
        };
        s.u8(tag);
        s.0.write(&a.to_le_bytes());
        s.0.write(&b.to_le_bytes());
    }
    s.len(v.temporals.len());
    for f in &v.temporals {
        s.u8(f.primitive as u8);
    }
    s.len(v.binaries.len());
    for f in &v.binaries {
        s.u8(f.primitive as u8);
    }
    s.u32s(v.lists.iter().map(|l| l.item.0));
    s.len(v.unions.len());
    for u in &v.unions {
        s.u32(u.off);
        s.u32(u.len);
    }
    s.u32s(v.union_members.iter().map(|m| m.0));
    s.u32s(v.union_types.iter().map(|t| t.0));
    s.len(v.union_same_ws.len());
    for b in &v.union_same_ws {
        s.bool(*b);
    }

    // facets
    s.len(schema.facets.len());
    for f in &schema.facets {
        s.u8(f.op as u8);
        s.u32(f.arg0);
        s.u32(f.arg1);
    }

    // patterns, by source
    s.len(schema.patterns.sources().len());
    for src in schema.patterns.sources() {
        s.bytes(src.as_bytes());
    }

    // enums
    s.len(schema.enums.records.len());
    for r in &schema.enums.records {
        match r {
            Some(r) => {
                s.u8(r.kind.map_or(0, |k| k as u8));
                s.u32(r.keys_off);
                s.u32(r.keys_len);
            }
            None => s.u8(0),
        }
    }
    s.len(schema.enums.keys.len());
    for k in &schema.enums.keys {
        s.value_ref(k);
    }
    s.len(schema.enums.kinds.len());
    for k in &schema.enums.kinds {
        s.u8(*k as u8);
    }
    s.len(schema.enums.tables.len());
    for t in &schema.enums.tables {
        s.index(t);
    }

    // values
    s.bytes(schema.values.as_bytes());

    // notations
    s.len(schema.notations.len());
    for n in &schema.notations {
        s.u32(n.name.0);
        s.value_ref(&n.public);
        s.value_ref(&n.system);
    }

    // models
    s.len(schema.models.dfas.len());
    for d in &schema.models.dfas {
        s.dfa(d);
    }
    s.len(schema.models.nfas.len());
    for n in &schema.models.nfas {
        s.len(n.bitsets.len());
        for w in &n.bitsets {
            s.u64(*w);
        }
        s.bitset_ref(&n.start);
        s.bitset_ref(&n.accept);
        s.bool(n.nullable);
        s.len(n.matchers.len());
        for m in &n.matchers {
            s.matcher(m);
        }
        s.len(n.follow.len());
        for f in &n.follow {
            s.bitset_ref(f);
        }
    }
    s.len(schema.models.alls.len());
    for a in &schema.models.alls {
        s.len(a.members.len());
        for m in &a.members {
            s.u32(m.elem.0);
            s.bool(m.optional);
            s.bool(m.allows_subst);
            s.u32(m.subst_off);
            s.u32(m.subst_len);
        }
        s.u32s(a.subst.iter().map(|e| e.0));
        s.u8(a.min_occurs);
        s.bool(a.mixed);
    }

    // wildcards
    s.len(schema.wildcards.rules.len());
    for r in &schema.wildcards.rules {
        match r {
            Some(r) => {
                s.u8(r.kind as u8);
                s.bool(r.has_target);
                s.bool(r.has_local);
                s.u32(r.off);
                s.u32(r.len);
                s.u8(r.process as u8);
                s.u32(r.target.0);
            }
            None => s.u8(0),
        }
    }
    s.u32s(schema.wildcards.namespaces.iter().map(|n| n.0));

    // identity constraints
    let ic = &schema.identity;
    s.len(ic.constraints.len());
    for c in &ic.constraints {
        match c {
            Some(c) => {
                s.u32(c.name.0);
                s.u8(c.category as u8);
                s.u32(c.selector_off);
                s.u32(c.selector_len);
                s.u32(c.field_off);
                s.u32(c.field_len);
                s.u32(c.referenced.0);
            }
            None => s.u8(0),
        }
    }
    s.u32s(ic.selectors.iter().map(|p| p.0));
    s.u32s(ic.fields.iter().map(|p| p.0));
    s.u32s(ic.element_ics.iter().map(|i| i.0));

    // paths
    s.len(ic.paths.len());
    for p in &ic.paths {
        s.u32(p.off);
        s.u32(p.len);
    }
    s.len(ic.ops.len());
    for op in &ic.ops {
        s.path_op(op);
    }

    nonzero(s.0.finish())
}
