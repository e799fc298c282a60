//! Limits and build configuration for schema compilation
//!
//! These limits keep content-model compilation bounded: occurrence ranges
//! are unrolled into Glushkov positions, and subset construction can blow
//! up exponentially in the number of positions.

use crate::error::LimitError;

/// Default cap on DFA states per content model
pub const DEFAULT_MAX_DFA_STATES: u32 = 4096;

/// Default cap on a single particle's maxOccurs
pub const DEFAULT_MAX_OCCURS_LIMIT: u32 = 1_000_000;

/// Automaton limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of DFA states before falling back to an NFA
    pub max_dfa_states: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_dfa_states: DEFAULT_MAX_DFA_STATES,
        }
    }
}

/// Compiler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildConfig {
    /// Automaton limits
    pub limits: Limits,

    /// Maximum accepted maxOccurs (0 disables the check)
    pub max_occurs_limit: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            max_occurs_limit: DEFAULT_MAX_OCCURS_LIMIT,
        }
    }
}

impl BuildConfig {
    /// Create a new BuildConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            limits: Limits {
                max_dfa_states: 256,
            },
            max_occurs_limit: 1_000,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            limits: Limits {
                max_dfa_states: 65_536,
            },
            max_occurs_limit: 0,
        }
    }

    /// Set the DFA state cap
    pub fn with_max_dfa_states(mut self, cap: u32) -> Self {
        self.limits.max_dfa_states = cap;
        self
    }

    /// Set the maxOccurs limit
    pub fn with_max_occurs_limit(mut self, limit: u32) -> Self {
        self.max_occurs_limit = limit;
        self
    }

    /// Check a declared maxOccurs against the configured limit
    pub fn check_occurs(&self, value: u32) -> Result<(), LimitError> {
        if self.max_occurs_limit != 0 && value > self.max_occurs_limit {
            Err(LimitError::OccursTooLarge {
                value,
                limit: self.max_occurs_limit,
            })
        } else {
            Ok(())
        }
    }

    /// Check whether a DFA of the given size still fits
    pub fn check_dfa_states(&self, states: usize) -> Result<(), LimitError> {
        if states > self.limits.max_dfa_states as usize {
            Err(LimitError::DfaLimit {
                states,
                cap: self.limits.max_dfa_states,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BuildConfig::default();
        assert_eq!(config.limits.max_dfa_states, 4096);
        assert_eq!(config.max_occurs_limit, 1_000_000);
        assert!(config.check_occurs(500).is_ok());
        assert!(config.check_occurs(2_000_000).is_err());
    }

    #[test]
    fn test_zero_disables_occurs_check() {
        let config = BuildConfig::default().with_max_occurs_limit(0);
        assert!(config.check_occurs(u32::MAX).is_ok());
        assert!(BuildConfig::permissive().check_occurs(u32::MAX).is_ok());
    }

    #[test]
    fn test_strict_config() {
        let config = BuildConfig::strict();
        assert!(config.limits.max_dfa_states < BuildConfig::default().limits.max_dfa_states);
        assert_eq!(
            config.check_occurs(5_000),
            Err(LimitError::OccursTooLarge {
                value: 5_000,
                limit: 1_000
            })
        );
    }

    #[test]
    fn test_check_dfa_states() {
        let config = BuildConfig::default().with_max_dfa_states(3);
        assert!(config.check_dfa_states(3).is_ok());
        assert!(matches!(
            config.check_dfa_states(4),
            Err(LimitError::DfaLimit { states: 4, cap: 3 })
        ));
    }
}
