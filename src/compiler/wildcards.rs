//! Wildcard namespace sets and their lowering to rules
//!
//! Attribute wildcards are combined along derivations: union for
//! extension, intersection for restriction and attribute groups. Results
//! that XSD 1.0 cannot express are errors.

use std::collections::BTreeSet;

use super::Compiler;
use crate::ast::{NamespaceConstraint, NamespaceItem, ProcessContents, WildcardDef};
use crate::error::{Error, Result};
use crate::runtime::ids::WildcardId;
use crate::runtime::wildcards::{NsConstraintKind, WildcardRule};

/// Namespace set of a wildcard; the empty string is the absent namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NsSet {
    /// Every namespace
    Any,
    /// Neither the given namespace nor absent
    Other(String),
    /// Every namespace except absent
    NotAbsent,
    /// Listed namespaces
    Set(BTreeSet<String>),
}

/// A wildcard with its namespaces resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wildcard {
    /// Admitted namespaces
    pub ns: NsSet,
    /// processContents
    pub process: ProcessContents,
    /// Target namespace of the declaring schema ("" when absent)
    pub target: String,
}

impl Wildcard {
    /// Resolve a wildcard as written
    pub fn from_def(def: &WildcardDef, default_target: Option<&str>) -> Self {
        let target = def
            .target_namespace
            .as_deref()
            .or(default_target)
            .unwrap_or("")
            .to_string();
        let ns = match &def.namespace {
            NamespaceConstraint::Any => NsSet::Any,
            NamespaceConstraint::Other if target.is_empty() => NsSet::NotAbsent,
            NamespaceConstraint::Other => NsSet::Other(target.clone()),
            NamespaceConstraint::List(items) => NsSet::Set(
                items
                    .iter()
                    .map(|item| match item {
                        NamespaceItem::TargetNamespace => target.clone(),
                        NamespaceItem::Local => String::new(),
                        NamespaceItem::Uri(uri) => uri.clone(),
                    })
                    .collect(),
            ),
        };
        Self {
            ns,
            process: def.process_contents,
            target,
        }
    }

    /// The `##any` lax wildcard of anyType
    pub fn any_lax() -> Self {
        Self {
            ns: NsSet::Any,
            process: ProcessContents::Lax,
            target: String::new(),
        }
    }

    /// Whether a namespace is admitted
    pub fn admits(&self, ns: &str) -> bool {
        match &self.ns {
            NsSet::Any => true,
            NsSet::Other(t) => ns != t && !ns.is_empty(),
            NsSet::NotAbsent => !ns.is_empty(),
            NsSet::Set(set) => set.contains(ns),
        }
    }

    /// Whether no namespace is admitted
    pub fn is_empty(&self) -> bool {
        matches!(&self.ns, NsSet::Set(set) if set.is_empty())
    }

    /// Wildcard union; `self` supplies processContents
    pub fn union(&self, other: &Wildcard) -> Result<Wildcard> {
        let ns = match (&self.ns, &other.ns) {
            (NsSet::Any, _) | (_, NsSet::Any) => NsSet::Any,
            (NsSet::Set(a), NsSet::Set(b)) => NsSet::Set(a.union(b).cloned().collect()),
            (NsSet::Other(a), NsSet::Other(b)) if a == b => NsSet::Other(a.clone()),
            (NsSet::Other(_), NsSet::Other(_))
            | (NsSet::NotAbsent, NsSet::NotAbsent)
            | (NsSet::Other(_), NsSet::NotAbsent)
            | (NsSet::NotAbsent, NsSet::Other(_)) => NsSet::NotAbsent,
            (NsSet::Other(t), NsSet::Set(s)) | (NsSet::Set(s), NsSet::Other(t)) => {
                match (s.contains(t), s.contains("")) {
                    (true, true) => NsSet::Any,
                    (true, false) => NsSet::NotAbsent,
                    (false, false) => NsSet::Other(t.clone()),
                    (false, true) => {
                        return Err(Error::Attributes(format!(
                            "union of ##other and a list with ##local is not expressible \
                             (target namespace '{}')",
                            t
                        )))
                    }
                }
            }
            (NsSet::NotAbsent, NsSet::Set(s)) | (NsSet::Set(s), NsSet::NotAbsent) => {
                if s.contains("") {
                    NsSet::Any
                } else {
                    NsSet::NotAbsent
                }
            }
        };
        Ok(Wildcard {
            ns,
            process: self.process,
            target: self.target.clone(),
        })
    }

    /// Wildcard intersection; `self` supplies processContents
    pub fn intersection(&self, other: &Wildcard) -> Result<Wildcard> {
        let ns = match (&self.ns, &other.ns) {
            (NsSet::Any, x) | (x, NsSet::Any) => x.clone(),
            (NsSet::Set(a), NsSet::Set(b)) => NsSet::Set(a.intersection(b).cloned().collect()),
            (NsSet::Other(t), NsSet::Set(s)) | (NsSet::Set(s), NsSet::Other(t)) => NsSet::Set(
                s.iter()
                    .filter(|ns| *ns != t && !ns.is_empty())
                    .cloned()
                    .collect(),
            ),
            (NsSet::NotAbsent, NsSet::Set(s)) | (NsSet::Set(s), NsSet::NotAbsent) => {
                NsSet::Set(s.iter().filter(|ns| !ns.is_empty()).cloned().collect())
            }
            (NsSet::Other(a), NsSet::Other(b)) if a == b => NsSet::Other(a.clone()),
            (NsSet::Other(a), NsSet::Other(b)) => {
                return Err(Error::Attributes(format!(
                    "intersection of ##other wildcards for '{}' and '{}' is not expressible",
                    a, b
                )))
            }
            (NsSet::Other(t), NsSet::NotAbsent) | (NsSet::NotAbsent, NsSet::Other(t)) => {
                NsSet::Other(t.clone())
            }
            (NsSet::NotAbsent, NsSet::NotAbsent) => NsSet::NotAbsent,
        };
        Ok(Wildcard {
            ns,
            process: self.process,
            target: self.target.clone(),
        })
    }
}

impl Compiler<'_> {
    /// Lower a resolved wildcard into the rule table
    pub(super) fn wildcard_rule(&mut self, wildcard: &Wildcard) -> Result<WildcardId> {
        let target = self.intern_namespace(&wildcard.target)?;
        let mut rule = WildcardRule {
            kind: NsConstraintKind::Any,
            has_target: false,
            has_local: false,
            off: 0,
            len: 0,
            process: wildcard.process,
            target,
        };
        let mut listed = Vec::new();
        match &wildcard.ns {
            NsSet::Any => {}
            NsSet::Other(_) => rule.kind = NsConstraintKind::Other,
            NsSet::NotAbsent => rule.kind = NsConstraintKind::NotAbsent,
            NsSet::Set(set) => {
                rule.kind = NsConstraintKind::Enumeration;
                for ns in set {
                    if ns.is_empty() {
                        rule.has_local = true;
                    } else if *ns == wildcard.target {
                        rule.has_target = true;
                    } else {
                        listed.push(self.intern_namespace(ns)?);
                    }
                }
            }
        }
        Ok(self.wildcards.push(rule, &listed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> Wildcard {
        Wildcard {
            ns: NsSet::Set(items.iter().map(|s| s.to_string()).collect()),
            process: ProcessContents::Strict,
            target: "urn:t".to_string(),
        }
    }

    fn other(target: &str) -> Wildcard {
        Wildcard {
            ns: NsSet::Other(target.to_string()),
            process: ProcessContents::Lax,
            target: target.to_string(),
        }
    }

    #[test]
    fn test_from_def_placeholders() {
        let def = WildcardDef::new(
            NamespaceConstraint::List(vec![
                NamespaceItem::TargetNamespace,
                NamespaceItem::Local,
                NamespaceItem::Uri("urn:x".to_string()),
            ]),
            Some("urn:t"),
        );
        let w = Wildcard::from_def(&def, None);
        assert!(w.admits("urn:t"));
        assert!(w.admits(""));
        assert!(w.admits("urn:x"));
        assert!(!w.admits("urn:y"));

        let no_target = WildcardDef::new(NamespaceConstraint::Other, None);
        assert_eq!(Wildcard::from_def(&no_target, None).ns, NsSet::NotAbsent);
    }

    #[test]
    fn test_union() {
        let u = set(&["urn:a"]).union(&set(&["urn:b"])).unwrap();
        assert!(u.admits("urn:a") && u.admits("urn:b"));
        assert_eq!(other("urn:t").union(&set(&["urn:t", ""])).unwrap().ns, NsSet::Any);
        assert_eq!(
            other("urn:t").union(&set(&["urn:t"])).unwrap().ns,
            NsSet::NotAbsent
        );
        assert_eq!(
            other("urn:t").union(&other("urn:u")).unwrap().ns,
            NsSet::NotAbsent
        );
        assert!(other("urn:t").union(&set(&[""])).is_err());
    }

    #[test]
    fn test_intersection() {
        let i = other("urn:t")
            .intersection(&set(&["urn:t", "", "urn:a"]))
            .unwrap();
        assert_eq!(i.ns, NsSet::Set(["urn:a".to_string()].into_iter().collect()));
        assert_eq!(i.process, ProcessContents::Lax);
        assert!(set(&["urn:a"]).intersection(&set(&["urn:b"])).unwrap().is_empty());
        assert!(other("urn:t").intersection(&other("urn:u")).is_err());
        assert_eq!(
            Wildcard::any_lax().intersection(&other("urn:t")).unwrap().ns,
            NsSet::Other("urn:t".to_string())
        );
    }
}
