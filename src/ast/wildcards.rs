//! Wildcard definitions (xs:any, xs:anyAttribute)

pub use crate::runtime::wildcards::ProcessContents;

/// One entry of a namespace list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceItem {
    /// ##targetNamespace
    TargetNamespace,
    /// ##local
    Local,
    /// A namespace URI
    Uri(String),
}

/// Namespace constraint for wildcards
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamespaceConstraint {
    /// Any namespace is allowed (##any)
    #[default]
    Any,
    /// Any namespace except the target namespace and no namespace (##other)
    Other,
    /// Specific set of allowed namespaces
    List(Vec<NamespaceItem>),
}

/// A wildcard as written in the schema
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WildcardDef {
    /// Namespace constraint
    pub namespace: NamespaceConstraint,
    /// processContents
    pub process_contents: ProcessContents,
    /// Target namespace of the schema document declaring the wildcard
    pub target_namespace: Option<String>,
}

impl WildcardDef {
    /// Wildcard with the given constraint
    pub fn new(namespace: NamespaceConstraint, target_namespace: Option<&str>) -> Self {
        Self {
            namespace,
            process_contents: ProcessContents::Strict,
            target_namespace: target_namespace.map(String::from),
        }
    }

    /// `##any` wildcard
    pub fn any() -> Self {
        Self::default()
    }

    /// Set processContents
    pub fn with_process_contents(mut self, process_contents: ProcessContents) -> Self {
        self.process_contents = process_contents;
        self
    }
}
