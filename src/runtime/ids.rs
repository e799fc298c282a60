//! Typed opaque identifiers
//!
//! Every id is a dense, non-zero `u32` index into its table; `0` is the
//! null sentinel and each table keeps a placeholder at index 0.

macro_rules! define_id {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
            pub struct $name(pub u32);

            impl $name {
                /// The null sentinel
                pub const NONE: Self = Self(0);

                /// Build an id from a table index
                pub fn from_index(index: usize) -> Self {
                    Self(index as u32)
                }

                /// Table index of this id
                pub fn index(self) -> usize {
                    self.0 as usize
                }

                /// Whether this is the null sentinel
                pub fn is_none(self) -> bool {
                    self.0 == 0
                }

                /// Whether this is a real id
                pub fn is_some(self) -> bool {
                    self.0 != 0
                }

                /// `None` for the sentinel
                pub fn get(self) -> Option<Self> {
                    if self.0 == 0 {
                        None
                    } else {
                        Some(self)
                    }
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}#{}", stringify!($name), self.0)
                }
            }
        )*
    };
}

define_id! {
    /// Interned namespace URI
    NamespaceId;
    /// Interned (namespace, local) pair
    SymbolId;
    /// Type record
    TypeId;
    /// Element declaration
    ElementId;
    /// Global attribute declaration
    AttributeId;
    /// Simple-value validator
    ValidatorId;
    /// Compiled pattern
    PatternId;
    /// Enumeration table
    EnumId;
    /// Wildcard rule
    WildcardId;
    /// Identity constraint
    IcId;
    /// Identity-constraint path program
    PathId;
    /// Notation declaration
    NotationId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel() {
        assert!(TypeId::NONE.is_none());
        assert_eq!(TypeId::default(), TypeId::NONE);
        assert_eq!(TypeId(0).get(), None);
        assert_eq!(TypeId(3).get(), Some(TypeId(3)));
        assert_eq!(ElementId::from_index(7).index(), 7);
    }

    #[test]
    fn test_display() {
        assert_eq!(SymbolId(4).to_string(), "SymbolId#4");
    }
}
