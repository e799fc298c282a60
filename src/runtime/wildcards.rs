//! Wildcard namespace rules

use super::ids::{NamespaceId, WildcardId};
use super::symbols::{NamespaceTable, NS_EMPTY};

/// Namespace constraint kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NsConstraintKind {
    /// ##any
    Any = 1,
    /// ##other: neither the target namespace nor absent
    Other = 2,
    /// Explicit list, with `##targetNamespace` / `##local` as flags
    Enumeration = 3,
    /// Any namespace except absent
    NotAbsent = 4,
}

/// processContents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ProcessContents {
    /// Must be declared and valid
    #[default]
    Strict = 1,
    /// Validate if declared
    Lax = 2,
    /// No validation
    Skip = 3,
}

/// One wildcard rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WildcardRule {
    /// Constraint kind
    pub kind: NsConstraintKind,
    /// `##targetNamespace` is listed (enumeration)
    pub has_target: bool,
    /// `##local` is listed (enumeration)
    pub has_local: bool,
    /// Offset into the namespace list
    pub off: u32,
    /// Length of the namespace list
    pub len: u32,
    /// processContents
    pub process: ProcessContents,
    /// Target namespace of the declaring schema
    pub target: NamespaceId,
}

/// All wildcard rules of a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardTable {
    /// Indexed by [`WildcardId`]; entry 0 is unused
    pub rules: Vec<Option<WildcardRule>>,
    /// Namespace ids referenced by enumeration rules
    pub namespaces: Vec<NamespaceId>,
}

impl Default for WildcardTable {
    fn default() -> Self {
        Self {
            rules: vec![None],
            namespaces: Vec::new(),
        }
    }
}

impl WildcardTable {
    /// Add a rule, copying its namespace list
    pub fn push(&mut self, mut rule: WildcardRule, namespaces: &[NamespaceId]) -> WildcardId {
        rule.off = self.namespaces.len() as u32;
        rule.len = namespaces.len() as u32;
        self.namespaces.extend_from_slice(namespaces);
        self.rules.push(Some(rule));
        WildcardId::from_index(self.rules.len() - 1)
    }

    /// Rule record
    pub fn rule(&self, id: WildcardId) -> Option<&WildcardRule> {
        self.rules.get(id.index()).and_then(Option::as_ref)
    }

    /// Namespace list of a rule
    pub fn namespaces(&self, rule: &WildcardRule) -> &[NamespaceId] {
        let start = rule.off as usize;
        self.namespaces
            .get(start..start + rule.len as usize)
            .unwrap_or(&[])
    }

    /// Number of ids, including the placeholder
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether only the placeholder exists
    pub fn is_empty(&self) -> bool {
        self.rules.len() <= 1
    }

    /// Whether the rule admits a namespace id
    pub fn accepts(&self, id: WildcardId, ns: NamespaceId) -> bool {
        let Some(rule) = self.rule(id) else {
            return false;
        };
        match rule.kind {
            NsConstraintKind::Any => true,
            NsConstraintKind::Other => ns != rule.target && ns != NS_EMPTY,
            NsConstraintKind::NotAbsent => ns != NS_EMPTY,
            NsConstraintKind::Enumeration => {
                (rule.has_local && ns == NS_EMPTY)
                    || (rule.has_target && ns == rule.target)
                    || self.namespaces(rule).contains(&ns)
            }
        }
    }

    /// Whether the rule admits a namespace given as URI bytes
    pub fn accepts_bytes(&self, table: &NamespaceTable, id: WildcardId, uri: &[u8]) -> bool {
        if let Some(ns) = table.lookup(uri) {
            return self.accepts(id, ns);
        }
        // Unknown to the schema: it cannot be the target, absent, or listed.
        match self.rule(id).map(|r| r.kind) {
            Some(NsConstraintKind::Any) => true,
            Some(NsConstraintKind::Other) | Some(NsConstraintKind::NotAbsent) => !uri.is_empty(),
            Some(NsConstraintKind::Enumeration) | None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::symbols::NamespaceInterner;

    fn rule(kind: NsConstraintKind, target: NamespaceId) -> WildcardRule {
        WildcardRule {
            kind,
            has_target: false,
            has_local: false,
            off: 0,
            len: 0,
            process: ProcessContents::Lax,
            target,
        }
    }

    #[test]
    fn test_id_and_byte_forms_agree() {
        let mut interner = NamespaceInterner::new();
        let tns = interner.intern(b"urn:t").unwrap();
        let other = interner.intern(b"urn:o").unwrap();
        let table = interner.seal().unwrap();

        let mut wildcards = WildcardTable::default();
        let any = wildcards.push(rule(NsConstraintKind::Any, tns), &[]);
        let oth = wildcards.push(rule(NsConstraintKind::Other, tns), &[]);
        let not_absent = wildcards.push(rule(NsConstraintKind::NotAbsent, tns), &[]);
        let mut listed = rule(NsConstraintKind::Enumeration, tns);
        listed.has_local = true;
        let enumeration = wildcards.push(listed, &[other]);

        for id in [any, oth, not_absent, enumeration] {
            for ns in table.ids() {
                let bytes = table.get(ns).unwrap();
                assert_eq!(
                    wildcards.accepts(id, ns),
                    wildcards.accepts_bytes(&table, id, bytes),
                    "rule {} namespace {}",
                    id,
                    ns
                );
            }
        }
        assert!(!wildcards.accepts(oth, tns));
        assert!(!wildcards.accepts(oth, NS_EMPTY));
        assert!(wildcards.accepts(oth, other));
        assert!(wildcards.accepts(enumeration, NS_EMPTY));
        assert!(!wildcards.accepts(enumeration, tns));
        assert!(wildcards.accepts_bytes(&table, oth, b"urn:unknown"));
        assert!(!wildcards.accepts_bytes(&table, enumeration, b"urn:unknown"));
    }
}
