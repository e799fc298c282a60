//! Simple-value validators, facet programs, patterns, enumerations and the
//! value arena

use bitflags::bitflags;
use regex::Regex;

use super::ids::{EnumId, PatternId, TypeId, ValidatorId};
use crate::hashing::{fnv1a, nonzero, HashIndex};
use crate::values::{Primitive, ValueKind, WhiteSpace};

/// Reference into the value arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValueRef {
    /// Byte offset
    pub off: u32,
    /// Byte length
    pub len: u32,
    /// FNV-1a of the bytes (never 0 when present)
    pub hash: u64,
    /// Distinguishes "absent" from "present but empty"
    pub present: bool,
}

impl ValueRef {
    /// The absent reference
    pub const NONE: Self = Self {
        off: 0,
        len: 0,
        hash: 0,
        present: false,
    };
}

/// A value key with its kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValueKeyRef {
    /// Kind of the key (`None` when absent)
    pub kind: Option<ValueKind>,
    /// Key bytes
    pub value: ValueRef,
}

/// Append-only byte arena holding every canonical form and value key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueBlob {
    bytes: Vec<u8>,
}

impl ValueBlob {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes
    pub fn push(&mut self, bytes: &[u8]) -> ValueRef {
        let off = self.bytes.len() as u32;
        self.bytes.extend_from_slice(bytes);
        ValueRef {
            off,
            len: bytes.len() as u32,
            hash: nonzero(fnv1a(bytes)),
            present: true,
        }
    }

    /// Bytes behind a reference
    pub fn get(&self, r: ValueRef) -> Option<&[u8]> {
        if !r.present {
            return None;
        }
        let start = r.off as usize;
        self.bytes.get(start..start + r.len as usize)
    }

    /// Text behind a reference
    pub fn get_str(&self, r: ValueRef) -> Option<&str> {
        self.get(r).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Whole arena
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Arena size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Validator families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValidatorKind {
    /// anySimpleType: any string, no checks
    AnySimple = 0,
    /// string family
    String = 1,
    /// boolean
    Boolean = 2,
    /// decimal
    Decimal = 3,
    /// integer family
    Integer = 4,
    /// float
    Float = 5,
    /// double
    Double = 6,
    /// duration
    Duration = 7,
    /// dateTime, date, time and the Gregorian fragments
    Temporal = 8,
    /// anyURI
    AnyUri = 9,
    /// QName
    QName = 10,
    /// NOTATION
    Notation = 11,
    /// hexBinary and base64Binary
    Binary = 12,
    /// xs:list
    List = 13,
    /// xs:union
    Union = 14,
}

bitflags! {
    /// Validator flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ValidatorFlags: u8 {
        /// Validator of a built-in type
        const BUILTIN = 0b0000_0001;
        /// Facet program contains a pattern
        const HAS_PATTERN = 0b0000_0010;
        /// Facet program contains an enumeration
        const HAS_ENUM = 0b0000_0100;
    }
}

/// Slice of the shared facet instruction pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FacetProgramRef {
    /// Offset of the first instruction
    pub off: u32,
    /// Instruction count
    pub len: u32,
}

/// Per-validator record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meta {
    /// Family
    pub kind: ValidatorKind,
    /// Index into the family array (0 for families without parameters)
    pub index: u32,
    /// Whitespace handling applied before any check
    pub white_space: WhiteSpace,
    /// Flags
    pub flags: ValidatorFlags,
    /// Facets
    pub facets: FacetProgramRef,
}

/// Lexical flavour of a string-derived built-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum StringFlavour {
    /// xs:string, normalizedString, token
    #[default]
    Plain = 0,
    /// xs:language
    Language = 1,
    /// xs:NMTOKEN
    NmToken = 2,
    /// xs:Name
    Name = 3,
    /// xs:NCName, ID, IDREF, ENTITY
    NcName = 4,
}

/// Value-space bounds of an integer-derived built-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IntegerRange {
    /// xs:integer
    #[default]
    Unbounded,
    /// `[min, max]`
    Bounded {
        /// Smallest value
        min: i128,
        /// Largest value
        max: i128,
    },
    /// `>= min` with no upper bound
    AtLeast(i128),
    /// `<= max` with no lower bound
    AtMost(i128),
}

impl IntegerRange {
    /// Check a canonical integer
    pub fn contains(&self, canonical: &str) -> bool {
        let negative = canonical.starts_with('-');
        // Values that overflow i128 are beyond every bounded range.
        let parsed = canonical.parse::<i128>().ok();
        match (*self, parsed) {
            (IntegerRange::Unbounded, _) => true,
            (IntegerRange::Bounded { min, max }, Some(v)) => v >= min && v <= max,
            (IntegerRange::Bounded { .. }, None) => false,
            (IntegerRange::AtLeast(min), Some(v)) => v >= min,
            (IntegerRange::AtLeast(_), None) => !negative,
            (IntegerRange::AtMost(max), Some(v)) => v <= max,
            (IntegerRange::AtMost(_), None) => negative,
        }
    }
}

/// Parameters of a string validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StringFamily {
    /// Built-in lexical flavour
    pub flavour: StringFlavour,
}

/// Parameters of an integer validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntegerFamily {
    /// Built-in bounds
    pub range: IntegerRange,
}

/// Parameters of a temporal validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalFamily {
    /// Which temporal primitive
    pub primitive: Primitive,
}

/// Parameters of a binary validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryFamily {
    /// hexBinary or base64Binary
    pub primitive: Primitive,
}

/// Parameters of a list validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListFamily {
    /// Item validator
    pub item: ValidatorId,
}

/// Parameters of a union validator: a slice of the member arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnionFamily {
    /// Offset into the member arrays
    pub off: u32,
    /// Member count
    pub len: u32,
}

/// All validators of a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorBundle {
    /// Indexed by [`ValidatorId`]; entry 0 is a placeholder
    pub meta: Vec<Meta>,
    /// String family
    pub strings: Vec<StringFamily>,
    /// Integer family
    pub integers: Vec<IntegerFamily>,
    /// Temporal family
    pub temporals: Vec<TemporalFamily>,
    /// Binary family
    pub binaries: Vec<BinaryFamily>,
    /// List family
    pub lists: Vec<ListFamily>,
    /// Union family
    pub unions: Vec<UnionFamily>,
    /// Union member validators
    pub union_members: Vec<ValidatorId>,
    /// Union member types
    pub union_types: Vec<TypeId>,
    /// Whether the member shares the union's whitespace mode
    pub union_same_ws: Vec<bool>,
}

impl Default for ValidatorBundle {
    fn default() -> Self {
        Self {
            meta: vec![Meta {
                kind: ValidatorKind::AnySimple,
                index: 0,
                white_space: WhiteSpace::Preserve,
                flags: ValidatorFlags::empty(),
                facets: FacetProgramRef::default(),
            }],
            strings: Vec::new(),
            integers: Vec::new(),
            temporals: Vec::new(),
            binaries: Vec::new(),
            lists: Vec::new(),
            unions: Vec::new(),
            union_members: Vec::new(),
            union_types: Vec::new(),
            union_same_ws: Vec::new(),
        }
    }
}

impl ValidatorBundle {
    /// Number of validator ids, including the placeholder
    pub fn len(&self) -> usize {
        self.meta.len()
    }

    /// Whether only the placeholder exists
    pub fn is_empty(&self) -> bool {
        self.meta.len() <= 1
    }

    /// Meta record of a validator
    pub fn meta(&self, id: ValidatorId) -> Option<&Meta> {
        if id.is_none() {
            return None;
        }
        self.meta.get(id.index())
    }

    /// Atomic primitive checked by a validator (`None` for list, union and
    /// anySimpleType)
    pub fn primitive(&self, id: ValidatorId) -> Option<Primitive> {
        let meta = self.meta(id)?;
        Some(match meta.kind {
            ValidatorKind::String => Primitive::String,
            ValidatorKind::Boolean => Primitive::Boolean,
            ValidatorKind::Decimal => Primitive::Decimal,
            ValidatorKind::Integer => Primitive::Integer,
            ValidatorKind::Float => Primitive::Float,
            ValidatorKind::Double => Primitive::Double,
            ValidatorKind::Duration => Primitive::Duration,
            ValidatorKind::Temporal => self.temporals.get(meta.index as usize)?.primitive,
            ValidatorKind::AnyUri => Primitive::AnyUri,
            ValidatorKind::QName => Primitive::QName,
            ValidatorKind::Notation => Primitive::Notation,
            ValidatorKind::Binary => self.binaries.get(meta.index as usize)?.primitive,
            ValidatorKind::List | ValidatorKind::Union | ValidatorKind::AnySimple => return None,
        })
    }

    /// Item validator of a list
    pub fn list_item(&self, id: ValidatorId) -> Option<ValidatorId> {
        let meta = self.meta(id)?;
        if meta.kind != ValidatorKind::List {
            return None;
        }
        self.lists.get(meta.index as usize).map(|l| l.item)
    }

    /// Members of a union as (validator, type, same-whitespace) triples
    pub fn union_members(
        &self,
        id: ValidatorId,
    ) -> impl Iterator<Item = (ValidatorId, TypeId, bool)> + '_ {
        let range = self
            .meta(id)
            .filter(|m| m.kind == ValidatorKind::Union)
            .and_then(|m| self.unions.get(m.index as usize))
            .map(|u| u.off as usize..(u.off + u.len) as usize)
            .unwrap_or(0..0);
        range.map(move |i| {
            (
                self.union_members[i],
                self.union_types[i],
                self.union_same_ws[i],
            )
        })
    }

    /// Append a validator and return its id
    pub fn push(&mut self, meta: Meta) -> ValidatorId {
        self.meta.push(meta);
        ValidatorId::from_index(self.meta.len() - 1)
    }
}

/// Facet opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FacetOp {
    /// arg0 = pattern id
    Pattern = 1,
    /// arg0 = enumeration id
    Enumeration = 2,
    /// arg0/arg1 = offset/length of the bound key in the value arena
    MinInclusive = 3,
    /// See [`FacetOp::MinInclusive`]
    MaxInclusive = 4,
    /// See [`FacetOp::MinInclusive`]
    MinExclusive = 5,
    /// See [`FacetOp::MinInclusive`]
    MaxExclusive = 6,
    /// arg0 = length
    Length = 7,
    /// arg0 = minimum length
    MinLength = 8,
    /// arg0 = maximum length
    MaxLength = 9,
    /// arg0 = maximum total digits
    TotalDigits = 10,
    /// arg0 = maximum fraction digits
    FractionDigits = 11,
}

impl FacetOp {
    /// XSD facet name
    pub fn name(&self) -> &'static str {
        match self {
            FacetOp::Pattern => "pattern",
            FacetOp::Enumeration => "enumeration",
            FacetOp::MinInclusive => "minInclusive",
            FacetOp::MaxInclusive => "maxInclusive",
            FacetOp::MinExclusive => "minExclusive",
            FacetOp::MaxExclusive => "maxExclusive",
            FacetOp::Length => "length",
            FacetOp::MinLength => "minLength",
            FacetOp::MaxLength => "maxLength",
            FacetOp::TotalDigits => "totalDigits",
            FacetOp::FractionDigits => "fractionDigits",
        }
    }

    /// Whether arg0/arg1 reference a value key
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            FacetOp::MinInclusive | FacetOp::MaxInclusive | FacetOp::MinExclusive | FacetOp::MaxExclusive
        )
    }
}

/// One facet instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FacetInstr {
    /// Opcode
    pub op: FacetOp,
    /// First argument
    pub arg0: u32,
    /// Second argument
    pub arg1: u32,
}

/// Compiled patterns with their sources
#[derive(Debug, Clone)]
pub struct PatternTable {
    sources: Vec<String>,
    compiled: Vec<Option<Regex>>,
}

impl Default for PatternTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternTable {
    /// Create a table holding only the placeholder
    pub fn new() -> Self {
        Self {
            sources: vec![String::new()],
            compiled: vec![None],
        }
    }

    /// Add a translated, anchored pattern
    pub fn push(&mut self, source: String, regex: Regex) -> PatternId {
        self.sources.push(source);
        self.compiled.push(Some(regex));
        PatternId::from_index(self.sources.len() - 1)
    }

    /// Source text of a pattern
    pub fn source(&self, id: PatternId) -> Option<&str> {
        if id.is_none() {
            return None;
        }
        self.sources.get(id.index()).map(String::as_str)
    }

    /// Compiled regex of a pattern
    pub fn regex(&self, id: PatternId) -> Option<&Regex> {
        self.compiled.get(id.index()).and_then(Option::as_ref)
    }

    /// Number of ids, including the placeholder
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether only the placeholder exists
    pub fn is_empty(&self) -> bool {
        self.sources.len() <= 1
    }

    /// All sources in id order
    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

/// One enumeration: its kind and a slice of the shared key array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumRecord {
    /// Kind shared by every member key (`None` when a union mixes kinds)
    pub kind: Option<ValueKind>,
    /// Offset into the key array
    pub keys_off: u32,
    /// Member count
    pub keys_len: u32,
}

/// Enumerations with a per-enum hash table over member keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumTable {
    /// Indexed by [`EnumId`]; entry 0 is unused
    pub records: Vec<Option<EnumRecord>>,
    /// Member keys of every enumeration
    pub keys: Vec<ValueRef>,
    /// Kind of each member key, parallel to `keys`
    pub kinds: Vec<ValueKind>,
    /// Hash table per enumeration; slot ids are 1-based positions in the
    /// enumeration's key slice
    pub tables: Vec<HashIndex>,
}

impl Default for EnumTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EnumTable {
    /// Create a table holding only the placeholder
    pub fn new() -> Self {
        Self {
            records: vec![None],
            keys: Vec::new(),
            kinds: Vec::new(),
            tables: vec![HashIndex::default()],
        }
    }

    /// Add an enumeration over already de-duplicated member keys
    pub fn push(&mut self, members: &[(ValueKind, ValueRef)]) -> EnumId {
        let keys_off = self.keys.len() as u32;
        self.keys.extend(members.iter().map(|(_, r)| *r));
        self.kinds.extend(members.iter().map(|(k, _)| *k));
        let kind = match members.first() {
            Some((first, _)) if members.iter().all(|(k, _)| k == first) => Some(*first),
            _ => None,
        };
        let table = HashIndex::build(
            members.len(),
            members
                .iter()
                .enumerate()
                .map(|(i, (_, r))| (i as u32 + 1, r.hash)),
        );
        self.records.push(Some(EnumRecord {
            kind,
            keys_off,
            keys_len: members.len() as u32,
        }));
        self.tables.push(table);
        EnumId::from_index(self.records.len() - 1)
    }

    /// Enumeration record
    pub fn record(&self, id: EnumId) -> Option<&EnumRecord> {
        self.records.get(id.index()).and_then(Option::as_ref)
    }

    /// Member keys of an enumeration
    pub fn members(&self, id: EnumId) -> &[ValueRef] {
        match self.record(id) {
            Some(r) => {
                let start = r.keys_off as usize;
                self.keys.get(start..start + r.keys_len as usize).unwrap_or(&[])
            }
            None => &[],
        }
    }

    /// Whether `key` of `kind` is a member of the enumeration
    pub fn contains(&self, values: &ValueBlob, id: EnumId, kind: ValueKind, key: &[u8]) -> bool {
        let Some(record) = self.record(id) else {
            return false;
        };
        if record.kind.map_or(false, |k| k != kind) {
            return false;
        }
        let start = record.keys_off as usize;
        let Some(table) = self.tables.get(id.index()) else {
            return false;
        };
        table
            .find(fnv1a(key), |slot| {
                let i = start + slot as usize - 1;
                self.kinds.get(i) == Some(&kind)
                    && self
                        .keys
                        .get(i)
                        .and_then(|r| values.get(*r))
                        .map_or(false, |stored| stored == key)
            })
            .is_some()
    }

    /// Number of ids, including the placeholder
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether only the placeholder exists
    pub fn is_empty(&self) -> bool {
        self.records.len() <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::keys;

    #[test]
    fn test_value_blob_presence() {
        let mut blob = ValueBlob::new();
        let empty = blob.push(b"");
        assert!(empty.present);
        assert_eq!(blob.get(empty), Some(&b""[..]));
        assert_eq!(blob.get(ValueRef::NONE), None);
        let r = blob.push(b"abc");
        assert_eq!(blob.get_str(r), Some("abc"));
        assert_eq!(r.hash, nonzero(fnv1a(b"abc")));
    }

    #[test]
    fn test_enum_membership() {
        let mut blob = ValueBlob::new();
        let members: Vec<(ValueKind, ValueRef)> = ["a", "b", "c"]
            .iter()
            .map(|s| {
                let r = blob.push(&keys::string_key(keys::TAG_STRING, s.as_bytes()));
                (ValueKind::String, r)
            })
            .collect();
        let mut enums = EnumTable::new();
        let id = enums.push(&members);
        assert_eq!(enums.record(id).unwrap().kind, Some(ValueKind::String));
        let key_b = keys::string_key(keys::TAG_STRING, b"b");
        assert!(enums.contains(&blob, id, ValueKind::String, &key_b));
        assert!(!enums.contains(&blob, id, ValueKind::AnyUri, &key_b));
        let key_d = keys::string_key(keys::TAG_STRING, b"d");
        assert!(!enums.contains(&blob, id, ValueKind::String, &key_d));
        assert!(!enums.contains(&blob, EnumId(9), ValueKind::String, &key_b));
    }

    #[test]
    fn test_enum_with_mixed_kinds() {
        let mut blob = ValueBlob::new();
        let (_, one) = crate::values::canonical::integer("1").unwrap();
        let word = keys::string_key(keys::TAG_STRING, b"one");
        let members = [
            (ValueKind::Integer, blob.push(&one)),
            (ValueKind::String, blob.push(&word)),
        ];
        let mut enums = EnumTable::new();
        let id = enums.push(&members);
        assert_eq!(enums.record(id).unwrap().kind, None);
        assert!(enums.contains(&blob, id, ValueKind::Integer, &one));
        assert!(enums.contains(&blob, id, ValueKind::String, &word));
        assert!(!enums.contains(&blob, id, ValueKind::Decimal, &one));
    }

    #[test]
    fn test_integer_ranges() {
        let byte = IntegerRange::Bounded { min: -128, max: 127 };
        assert!(byte.contains("127"));
        assert!(!byte.contains("128"));
        assert!(!byte.contains("-99999999999999999999999999999999999999999999"));
        let non_negative = IntegerRange::AtLeast(0);
        assert!(non_negative.contains("99999999999999999999999999999999999999999999"));
        assert!(!non_negative.contains("-1"));
        assert!(IntegerRange::AtMost(-1).contains("-5"));
    }

    #[test]
    fn test_union_members_empty_for_atomic() {
        let mut bundle = ValidatorBundle::default();
        let id = bundle.push(Meta {
            kind: ValidatorKind::Boolean,
            index: 0,
            white_space: WhiteSpace::Collapse,
            flags: ValidatorFlags::BUILTIN,
            facets: FacetProgramRef::default(),
        });
        assert_eq!(bundle.union_members(id).count(), 0);
        assert_eq!(bundle.primitive(id), Some(Primitive::Boolean));
        assert_eq!(bundle.primitive(ValidatorId::NONE), None);
    }
}
