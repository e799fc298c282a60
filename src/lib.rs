//! # xsdc
//!
//! Compiles a resolved XML Schema (XSD 1.0) into a dense, immutable,
//! index-based runtime model.
//!
//! The compiler takes a [`ast::SchemaSet`] whose references are already
//! resolved and lowers every component into flat tables addressed by typed
//! ids:
//!
//! - interned namespaces and `(namespace, local)` symbols
//! - type records with precomputed ancestor arrays and derivation masks
//! - simple-value validators with facet programs, patterns and enumerations
//! - content models as DFAs (or position automata above a state cap)
//! - substitution-group closures, attribute-use indices and wildcard rules
//! - identity constraints compiled to path programs
//!
//! The result is a [`Schema`] that never changes after the build and can be
//! shared freely between validating threads.
//!
//! ## Example
//!
//! ```rust
//! use xsdc::ast::{ElementDecl, SchemaSet, TypeRef};
//! use xsdc::{compile, BuildConfig};
//!
//! let mut set = SchemaSet::new(Some("urn:example"));
//! set.add_element(ElementDecl::new(set.qname("root")).with_type(TypeRef::builtin("string")));
//!
//! let schema = compile(&set, &BuildConfig::default()).unwrap();
//! let root = schema.symbol("urn:example", "root").unwrap();
//! assert!(schema.lookup_element(root).is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names and hashing
pub mod hashing;
pub mod names;
pub mod namespaces;

// Value engine
pub mod values;

// Compiler input, output and the lowering between them
pub mod ast;
pub mod compiler;
pub mod runtime;

// Debugging output
pub mod inspect;

pub use compiler::compile;
pub use error::{Error, ErrorKind, Result};
pub use limits::BuildConfig;
pub use runtime::Schema;

/// Version of the xsdc library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
