//! Identity constraints and their path programs

use super::ids::{IcId, NamespaceId, PathId, SymbolId};

/// unique, key or keyref
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IcCategory {
    /// xs:unique
    Unique = 1,
    /// xs:key
    Key = 2,
    /// xs:keyref
    Keyref = 3,
}

/// One identity constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityConstraint {
    /// Name symbol
    pub name: SymbolId,
    /// Category
    pub category: IcCategory,
    /// Offset into the selector pool
    pub selector_off: u32,
    /// Selector path count
    pub selector_len: u32,
    /// Offset into the field pool
    pub field_off: u32,
    /// Field path count
    pub field_len: u32,
    /// Referenced key or unique (keyref only)
    pub referenced: IcId,
}

/// Path opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PathOpKind {
    /// Start at the constraint's element
    RootSelf = 1,
    /// `.` step
    SelfStep = 2,
    /// `.//`: any number of intermediate descendants
    Descend = 3,
    /// Named child step
    ChildName = 4,
    /// `*` child step
    ChildAny = 5,
    /// `prefix:*` child step
    ChildNsAny = 6,
    /// `@name`
    AttrName = 7,
    /// `@*`
    AttrAny = 8,
    /// `@prefix:*`
    AttrNsAny = 9,
    /// Starts one alternative of a `|` union
    UnionSplit = 10,
}

/// One path instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathOp {
    /// Opcode
    pub op: PathOpKind,
    /// Name (ChildName, AttrName)
    pub sym: SymbolId,
    /// Namespace (ChildNsAny, AttrNsAny)
    pub ns: NamespaceId,
}

impl PathOp {
    /// An op with no operands
    pub fn bare(op: PathOpKind) -> Self {
        Self {
            op,
            sym: SymbolId::NONE,
            ns: NamespaceId::NONE,
        }
    }
}

/// Slice of the op pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathProgram {
    /// Offset of the first op
    pub off: u32,
    /// Op count
    pub len: u32,
}

/// Identity-constraint tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityTables {
    /// Indexed by [`IcId`]; entry 0 is unused
    pub constraints: Vec<Option<IdentityConstraint>>,
    /// Selector path ids
    pub selectors: Vec<PathId>,
    /// Field path ids
    pub fields: Vec<PathId>,
    /// Indexed by [`PathId`]; entry 0 is empty
    pub paths: Vec<PathProgram>,
    /// Op pool
    pub ops: Vec<PathOp>,
    /// Per-element constraint ids (sliced by `Element::ic_off/ic_len`)
    pub element_ics: Vec<IcId>,
}

impl Default for IdentityTables {
    fn default() -> Self {
        Self {
            constraints: vec![None],
            selectors: Vec::new(),
            fields: Vec::new(),
            paths: vec![PathProgram::default()],
            ops: Vec::new(),
            element_ics: Vec::new(),
        }
    }
}

impl IdentityTables {
    /// Intern a path program
    pub fn push_path(&mut self, ops: &[PathOp]) -> PathId {
        let off = self.ops.len() as u32;
        self.ops.extend_from_slice(ops);
        self.paths.push(PathProgram {
            off,
            len: ops.len() as u32,
        });
        PathId::from_index(self.paths.len() - 1)
    }

    /// Ops of a path program
    pub fn program(&self, id: PathId) -> &[PathOp] {
        match self.paths.get(id.index()) {
            Some(p) if id.is_some() => {
                let start = p.off as usize;
                self.ops.get(start..start + p.len as usize).unwrap_or(&[])
            }
            _ => &[],
        }
    }

    /// Constraint record
    pub fn constraint(&self, id: IcId) -> Option<&IdentityConstraint> {
        self.constraints.get(id.index()).and_then(Option::as_ref)
    }

    /// Selector paths of a constraint
    pub fn selector(&self, ic: &IdentityConstraint) -> &[PathId] {
        let start = ic.selector_off as usize;
        self.selectors
            .get(start..start + ic.selector_len as usize)
            .unwrap_or(&[])
    }

    /// Field paths of a constraint
    pub fn fields(&self, ic: &IdentityConstraint) -> &[PathId] {
        let start = ic.field_off as usize;
        self.fields
            .get(start..start + ic.field_len as usize)
            .unwrap_or(&[])
    }

    /// Split a program at its `UnionSplit` ops into alternatives
    pub fn alternatives(&self, id: PathId) -> Vec<&[PathOp]> {
        let program = self.program(id);
        if program.first().map(|op| op.op) != Some(PathOpKind::UnionSplit) {
            return vec![program];
        }
        program
            .split(|op| op.op == PathOpKind::UnionSplit)
            .skip(1)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternatives() {
        let mut tables = IdentityTables::default();
        let single = tables.push_path(&[
            PathOp::bare(PathOpKind::RootSelf),
            PathOp::bare(PathOpKind::ChildAny),
        ]);
        assert_eq!(tables.alternatives(single).len(), 1);

        let union = tables.push_path(&[
            PathOp::bare(PathOpKind::UnionSplit),
            PathOp::bare(PathOpKind::RootSelf),
            PathOp::bare(PathOpKind::ChildAny),
            PathOp::bare(PathOpKind::UnionSplit),
            PathOp::bare(PathOpKind::RootSelf),
            PathOp::bare(PathOpKind::Descend),
            PathOp::bare(PathOpKind::ChildAny),
        ]);
        let alts = tables.alternatives(union);
        assert_eq!(alts.len(), 2);
        assert_eq!(alts[1].len(), 3);
        assert!(tables.program(PathId::NONE).is_empty());
    }
}
