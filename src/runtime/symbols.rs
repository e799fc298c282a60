//! Namespace and symbol tables
//!
//! Both tables are append-only interners while the schema is being built
//! and become read-only, hash-indexed arenas once sealed. The empty
//! namespace, the XML namespace and the XSI namespace always hold ids 1, 2
//! and 3.

use std::collections::HashMap;

use super::ids::{NamespaceId, SymbolId};
use crate::error::TableError;
use crate::hashing::{fnv1a, Fnv64, HashIndex};
use crate::namespaces::{XML_NAMESPACE, XSI_NAMESPACE};

/// Id of the empty (absent) namespace
pub const NS_EMPTY: NamespaceId = NamespaceId(1);
/// Id of `http://www.w3.org/XML/1998/namespace`
pub const NS_XML: NamespaceId = NamespaceId(2);
/// Id of `http://www.w3.org/2001/XMLSchema-instance`
pub const NS_XSI: NamespaceId = NamespaceId(3);

/// Hash of a symbol: namespace id (little-endian) then local bytes
pub fn symbol_hash(ns: NamespaceId, local: &[u8]) -> u64 {
    let mut h = Fnv64::new();
    h.write_u32(ns.0);
    h.write(local);
    h.finish()
}

/// Byte arena with parallel offset/length arrays; index 0 is a placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
struct Arena {
    blob: Vec<u8>,
    offsets: Vec<u32>,
    lengths: Vec<u32>,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            blob: Vec::new(),
            offsets: vec![0],
            lengths: vec![0],
        }
    }
}

impl Arena {
    fn push(&mut self, bytes: &[u8]) -> usize {
        self.offsets.push(self.blob.len() as u32);
        self.lengths.push(bytes.len() as u32);
        self.blob.extend_from_slice(bytes);
        self.offsets.len() - 1
    }

    fn get(&self, index: usize) -> Option<&[u8]> {
        if index == 0 {
            return None;
        }
        let off = *self.offsets.get(index)? as usize;
        let len = *self.lengths.get(index)? as usize;
        self.blob.get(off..off + len)
    }

    fn len(&self) -> usize {
        self.offsets.len()
    }
}

/// Sealed namespace table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceTable {
    arena: Arena,
    index: HashIndex,
}

impl NamespaceTable {
    /// Table length, including the placeholder at index 0
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether no namespace is interned (never true once predefined)
    pub fn is_empty(&self) -> bool {
        self.arena.len() <= 1
    }

    /// URI bytes of a namespace id
    pub fn get(&self, id: NamespaceId) -> Option<&[u8]> {
        self.arena.get(id.index())
    }

    /// URI of a namespace id as text
    pub fn get_str(&self, id: NamespaceId) -> Option<&str> {
        self.get(id).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Look up a namespace by URI bytes
    pub fn lookup(&self, uri: &[u8]) -> Option<NamespaceId> {
        self.index
            .find(fnv1a(uri), |id| self.arena.get(id as usize) == Some(uri))
            .map(NamespaceId)
    }

    /// All real ids, in interning order
    pub fn ids(&self) -> impl Iterator<Item = NamespaceId> {
        (1..self.arena.len()).map(NamespaceId::from_index)
    }

    /// Raw arena: blob, offsets, lengths
    pub fn raw(&self) -> (&[u8], &[u32], &[u32]) {
        (&self.arena.blob, &self.arena.offsets, &self.arena.lengths)
    }

    /// Hash index
    pub fn index(&self) -> &HashIndex {
        &self.index
    }
}

/// Interner for namespace URIs
#[derive(Debug)]
pub struct NamespaceInterner {
    map: HashMap<Vec<u8>, NamespaceId>,
    arena: Arena,
    sealed: bool,
}

impl Default for NamespaceInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceInterner {
    /// Create an interner holding the predefined namespaces
    pub fn new() -> Self {
        let mut interner = Self {
            map: HashMap::new(),
            arena: Arena::default(),
            sealed: false,
        };
        for uri in ["", XML_NAMESPACE, XSI_NAMESPACE] {
            let id = NamespaceId::from_index(interner.arena.push(uri.as_bytes()));
            interner.map.insert(uri.as_bytes().to_vec(), id);
        }
        interner
    }

    /// Intern a namespace URI
    pub fn intern(&mut self, uri: &[u8]) -> Result<NamespaceId, TableError> {
        if self.sealed {
            return Err(TableError::UsedAfterSeal);
        }
        if let Some(&id) = self.map.get(uri) {
            return Ok(id);
        }
        let id = NamespaceId::from_index(self.arena.push(uri));
        self.map.insert(uri.to_vec(), id);
        Ok(id)
    }

    /// Look up without interning
    pub fn get(&self, uri: &[u8]) -> Option<NamespaceId> {
        self.map.get(uri).copied()
    }

    /// URI bytes of an interned id
    pub fn resolve(&self, id: NamespaceId) -> Option<&[u8]> {
        self.arena.get(id.index())
    }

    /// Number of ids handed out, including the placeholder
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether only the placeholder exists
    pub fn is_empty(&self) -> bool {
        self.arena.len() <= 1
    }

    /// Hand off the arena and build the hash index
    pub fn seal(&mut self) -> Result<NamespaceTable, TableError> {
        if self.sealed {
            return Err(TableError::UsedAfterSeal);
        }
        self.sealed = true;
        self.map.clear();
        let arena = std::mem::take(&mut self.arena);
        let count = arena.len() - 1;
        let index = HashIndex::build(
            count,
            (1..arena.len()).map(|i| (i as u32, fnv1a(arena.get(i).unwrap_or_default()))),
        );
        Ok(NamespaceTable { arena, index })
    }
}

/// Sealed symbol table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    namespaces: Vec<NamespaceId>,
    locals: Arena,
    index: HashIndex,
}

impl SymbolTable {
    /// Table length, including the placeholder at index 0
    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    /// Whether no symbol is interned
    pub fn is_empty(&self) -> bool {
        self.namespaces.len() <= 1
    }

    /// Namespace of a symbol
    pub fn namespace(&self, id: SymbolId) -> Option<NamespaceId> {
        if id.is_none() {
            return None;
        }
        self.namespaces.get(id.index()).copied()
    }

    /// Local name bytes of a symbol
    pub fn local(&self, id: SymbolId) -> Option<&[u8]> {
        self.locals.get(id.index())
    }

    /// Local name as text
    pub fn local_str(&self, id: SymbolId) -> Option<&str> {
        self.local(id).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Look up a symbol by namespace id and local bytes
    pub fn lookup(&self, ns: NamespaceId, local: &[u8]) -> Option<SymbolId> {
        self.index
            .find(symbol_hash(ns, local), |id| {
                self.namespaces.get(id as usize) == Some(&ns)
                    && self.locals.get(id as usize) == Some(local)
            })
            .map(SymbolId)
    }

    /// All real ids, in interning order
    pub fn ids(&self) -> impl Iterator<Item = SymbolId> {
        (1..self.namespaces.len()).map(SymbolId::from_index)
    }

    /// Raw arrays: namespace ids, local blob, offsets, lengths
    pub fn raw(&self) -> (&[NamespaceId], &[u8], &[u32], &[u32]) {
        (
            &self.namespaces,
            &self.locals.blob,
            &self.locals.offsets,
            &self.locals.lengths,
        )
    }

    /// Hash index
    pub fn index(&self) -> &HashIndex {
        &self.index
    }
}

/// Interner for (namespace, local) symbols
#[derive(Debug)]
pub struct SymbolInterner {
    map: HashMap<(NamespaceId, Vec<u8>), SymbolId>,
    namespaces: Vec<NamespaceId>,
    locals: Arena,
    sealed: bool,
}

impl Default for SymbolInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolInterner {
    /// Create an empty interner
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            namespaces: vec![NamespaceId::NONE],
            locals: Arena::default(),
            sealed: false,
        }
    }

    /// Intern a symbol
    pub fn intern(&mut self, ns: NamespaceId, local: &[u8]) -> Result<SymbolId, TableError> {
        if self.sealed {
            return Err(TableError::UsedAfterSeal);
        }
        if ns.is_none() {
            return Err(TableError::MalformedTable(
                "symbol interned without a namespace id".to_string(),
            ));
        }
        if let Some(&id) = self.map.get(&(ns, local.to_vec())) {
            return Ok(id);
        }
        let id = SymbolId::from_index(self.locals.push(local));
        self.namespaces.push(ns);
        self.map.insert((ns, local.to_vec()), id);
        Ok(id)
    }

    /// Look up without interning
    pub fn get(&self, ns: NamespaceId, local: &[u8]) -> Option<SymbolId> {
        self.map.get(&(ns, local.to_vec())).copied()
    }

    /// Namespace and local bytes of an interned id
    pub fn resolve(&self, id: SymbolId) -> Option<(NamespaceId, &[u8])> {
        let ns = *self.namespaces.get(id.index()).filter(|_| id.is_some())?;
        Some((ns, self.locals.get(id.index())?))
    }

    /// Hand off the arenas and build the hash index
    pub fn seal(&mut self) -> Result<SymbolTable, TableError> {
        if self.sealed {
            return Err(TableError::UsedAfterSeal);
        }
        self.sealed = true;
        self.map.clear();
        let namespaces = std::mem::take(&mut self.namespaces);
        let locals = std::mem::take(&mut self.locals);
        let count = namespaces.len() - 1;
        let index = HashIndex::build(
            count,
            (1..namespaces.len()).map(|i| {
                (
                    i as u32,
                    symbol_hash(namespaces[i], locals.get(i).unwrap_or_default()),
                )
            }),
        );
        Ok(SymbolTable {
            namespaces,
            locals,
            index,
        })
    }
}

/// Symbols every schema carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PredefinedSymbols {
    /// `xsi:type`
    pub xsi_type: SymbolId,
    /// `xsi:nil`
    pub xsi_nil: SymbolId,
    /// `xsi:schemaLocation`
    pub xsi_schema_location: SymbolId,
    /// `xsi:noNamespaceSchemaLocation`
    pub xsi_no_namespace_schema_location: SymbolId,
    /// `xml:lang`
    pub xml_lang: SymbolId,
    /// `xml:space`
    pub xml_space: SymbolId,
}

impl PredefinedSymbols {
    /// Intern the predefined symbols
    pub fn intern(symbols: &mut SymbolInterner) -> Result<Self, TableError> {
        Ok(Self {
            xsi_type: symbols.intern(NS_XSI, b"type")?,
            xsi_nil: symbols.intern(NS_XSI, b"nil")?,
            xsi_schema_location: symbols.intern(NS_XSI, b"schemaLocation")?,
            xsi_no_namespace_schema_location: symbols
                .intern(NS_XSI, b"noNamespaceSchemaLocation")?,
            xml_lang: symbols.intern(NS_XML, b"lang")?,
            xml_space: symbols.intern(NS_XML, b"space")?,
        })
    }

    /// Ids in fixed order
    pub fn as_array(&self) -> [SymbolId; 6] {
        [
            self.xsi_type,
            self.xsi_nil,
            self.xsi_schema_location,
            self.xsi_no_namespace_schema_location,
            self.xml_lang,
            self.xml_space,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_namespaces() {
        let mut ns = NamespaceInterner::new();
        assert_eq!(ns.intern(b"").unwrap(), NS_EMPTY);
        assert_eq!(ns.intern(XML_NAMESPACE.as_bytes()).unwrap(), NS_XML);
        assert_eq!(ns.intern(XSI_NAMESPACE.as_bytes()).unwrap(), NS_XSI);
        let table = ns.seal().unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.lookup(b""), Some(NS_EMPTY));
        assert_eq!(table.get(NS_EMPTY), Some(&b""[..]));
    }

    #[test]
    fn test_intern_is_idempotent() {
        let mut ns = NamespaceInterner::new();
        let a = ns.intern(b"urn:a").unwrap();
        let b = ns.intern(b"urn:b").unwrap();
        assert_eq!(ns.intern(b"urn:a").unwrap(), a);
        assert_ne!(a, b);
        let table = ns.seal().unwrap();
        assert_eq!(table.lookup(b"urn:b"), Some(b));
        assert_eq!(table.lookup(b"urn:c"), None);
        assert_eq!(table.get_str(a), Some("urn:a"));
    }

    #[test]
    fn test_used_after_seal() {
        let mut ns = NamespaceInterner::new();
        ns.seal().unwrap();
        assert_eq!(ns.intern(b"urn:x"), Err(TableError::UsedAfterSeal));
        assert!(ns.seal().is_err());

        let mut syms = SymbolInterner::new();
        syms.seal().unwrap();
        assert_eq!(syms.intern(NS_EMPTY, b"a"), Err(TableError::UsedAfterSeal));
    }

    #[test]
    fn test_same_local_in_two_namespaces() {
        let mut ns = NamespaceInterner::new();
        let a = ns.intern(b"urn:a").unwrap();
        let mut syms = SymbolInterner::new();
        let s1 = syms.intern(NS_EMPTY, b"item").unwrap();
        let s2 = syms.intern(a, b"item").unwrap();
        assert_ne!(s1, s2);
        assert_ne!(symbol_hash(NS_EMPTY, b"item"), symbol_hash(a, b"item"));
        let table = syms.seal().unwrap();
        assert_eq!(table.lookup(a, b"item"), Some(s2));
        assert_eq!(table.lookup(NS_EMPTY, b"item"), Some(s1));
        assert_eq!(table.namespace(s2), Some(a));
        assert_eq!(table.local_str(s1), Some("item"));
        assert_eq!(table.namespace(SymbolId::NONE), None);
    }

    #[test]
    fn test_predefined_symbols() {
        let mut syms = SymbolInterner::new();
        let pre = PredefinedSymbols::intern(&mut syms).unwrap();
        let table = syms.seal().unwrap();
        assert_eq!(table.lookup(NS_XSI, b"nil"), Some(pre.xsi_nil));
        assert_eq!(table.lookup(NS_XML, b"space"), Some(pre.xml_space));
        assert!(pre.as_array().iter().all(|s| s.is_some()));
    }
}
