//! Value engine
//!
//! Lexical normalization, canonicalization of atomic lexical forms, and
//! value keys. A value key is the only cross-instance comparison primitive
//! used by enumerations, identity constraints and default/fixed matching.

pub mod canonical;
pub mod duration;
pub mod keys;
pub mod temporal;
pub mod whitespace;

pub use canonical::Canonical;
pub use whitespace::WhiteSpace;

use crate::error::LexicalError;
use crate::namespaces::NsResolver;
use temporal::TemporalKind;

/// Closed set of value-key layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValueKind {
    /// string, anyURI-free string family
    String = 1,
    /// xs:boolean
    Boolean = 2,
    /// xs:integer and derived types
    Integer = 3,
    /// xs:decimal
    Decimal = 4,
    /// xs:float
    Float = 5,
    /// xs:double
    Double = 6,
    /// xs:duration
    Duration = 7,
    /// xs:dateTime
    DateTime = 8,
    /// xs:date
    Date = 9,
    /// xs:time
    Time = 10,
    /// xs:gYearMonth
    GYearMonth = 11,
    /// xs:gYear
    GYear = 12,
    /// xs:gMonthDay
    GMonthDay = 13,
    /// xs:gDay
    GDay = 14,
    /// xs:gMonth
    GMonth = 15,
    /// xs:anyURI
    AnyUri = 16,
    /// xs:QName and xs:NOTATION (tagged)
    QName = 17,
    /// xs:hexBinary and xs:base64Binary (tagged)
    Binary = 18,
    /// List of atomic items
    List = 19,
}

impl ValueKind {
    /// Decode from the stored byte
    pub fn from_u8(v: u8) -> Option<Self> {
        use ValueKind::*;
        Some(match v {
            1 => String,
            2 => Boolean,
            3 => Integer,
            4 => Decimal,
            5 => Float,
            6 => Double,
            7 => Duration,
            8 => DateTime,
            9 => Date,
            10 => Time,
            11 => GYearMonth,
            12 => GYear,
            13 => GMonthDay,
            14 => GDay,
            15 => GMonth,
            16 => AnyUri,
            17 => QName,
            18 => Binary,
            19 => List,
            _ => return None,
        })
    }

    /// Whether the kind has an order
    pub fn is_ordered(&self) -> bool {
        keys::is_ordered(*self)
    }
}

/// Primitive lexical spaces (integer is split from decimal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Primitive {
    /// xs:string
    String = 1,
    /// xs:boolean
    Boolean = 2,
    /// xs:decimal
    Decimal = 3,
    /// xs:integer
    Integer = 4,
    /// xs:float
    Float = 5,
    /// xs:double
    Double = 6,
    /// xs:duration
    Duration = 7,
    /// xs:dateTime
    DateTime = 8,
    /// xs:date
    Date = 9,
    /// xs:time
    Time = 10,
    /// xs:gYearMonth
    GYearMonth = 11,
    /// xs:gYear
    GYear = 12,
    /// xs:gMonthDay
    GMonthDay = 13,
    /// xs:gDay
    GDay = 14,
    /// xs:gMonth
    GMonth = 15,
    /// xs:hexBinary
    HexBinary = 16,
    /// xs:base64Binary
    Base64Binary = 17,
    /// xs:anyURI
    AnyUri = 18,
    /// xs:QName
    QName = 19,
    /// xs:NOTATION
    Notation = 20,
}

impl Primitive {
    /// All primitives, in discriminant order
    pub const ALL: [Primitive; 20] = [
        Primitive::String,
        Primitive::Boolean,
        Primitive::Decimal,
        Primitive::Integer,
        Primitive::Float,
        Primitive::Double,
        Primitive::Duration,
        Primitive::DateTime,
        Primitive::Date,
        Primitive::Time,
        Primitive::GYearMonth,
        Primitive::GYear,
        Primitive::GMonthDay,
        Primitive::GDay,
        Primitive::GMonth,
        Primitive::HexBinary,
        Primitive::Base64Binary,
        Primitive::AnyUri,
        Primitive::QName,
        Primitive::Notation,
    ];

    /// Decode from the stored byte
    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| *p as u8 == v)
    }

    /// XSD local name of the primitive
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Boolean => "boolean",
            Primitive::Decimal => "decimal",
            Primitive::Integer => "integer",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Duration => "duration",
            Primitive::DateTime => "dateTime",
            Primitive::Date => "date",
            Primitive::Time => "time",
            Primitive::GYearMonth => "gYearMonth",
            Primitive::GYear => "gYear",
            Primitive::GMonthDay => "gMonthDay",
            Primitive::GDay => "gDay",
            Primitive::GMonth => "gMonth",
            Primitive::HexBinary => "hexBinary",
            Primitive::Base64Binary => "base64Binary",
            Primitive::AnyUri => "anyURI",
            Primitive::QName => "QName",
            Primitive::Notation => "NOTATION",
        }
    }

    /// Value-key layout of the primitive
    pub fn kind(&self) -> ValueKind {
        match self {
            Primitive::String => ValueKind::String,
            Primitive::Boolean => ValueKind::Boolean,
            Primitive::Decimal => ValueKind::Decimal,
            Primitive::Integer => ValueKind::Integer,
            Primitive::Float => ValueKind::Float,
            Primitive::Double => ValueKind::Double,
            Primitive::Duration => ValueKind::Duration,
            Primitive::DateTime => ValueKind::DateTime,
            Primitive::Date => ValueKind::Date,
            Primitive::Time => ValueKind::Time,
            Primitive::GYearMonth => ValueKind::GYearMonth,
            Primitive::GYear => ValueKind::GYear,
            Primitive::GMonthDay => ValueKind::GMonthDay,
            Primitive::GDay => ValueKind::GDay,
            Primitive::GMonth => ValueKind::GMonth,
            Primitive::HexBinary | Primitive::Base64Binary => ValueKind::Binary,
            Primitive::AnyUri => ValueKind::AnyUri,
            Primitive::QName | Primitive::Notation => ValueKind::QName,
        }
    }

    /// White space mode fixed by the primitive
    pub fn white_space(&self) -> WhiteSpace {
        match self {
            Primitive::String => WhiteSpace::Preserve,
            _ => WhiteSpace::Collapse,
        }
    }

    /// Whether length facets apply
    pub fn has_length(&self) -> bool {
        matches!(
            self,
            Primitive::String | Primitive::AnyUri | Primitive::HexBinary | Primitive::Base64Binary
        )
    }

    /// Whether totalDigits/fractionDigits apply
    pub fn has_digits(&self) -> bool {
        matches!(self, Primitive::Decimal | Primitive::Integer)
    }

    fn temporal(&self) -> Option<TemporalKind> {
        Some(match self {
            Primitive::DateTime => TemporalKind::DateTime,
            Primitive::Date => TemporalKind::Date,
            Primitive::Time => TemporalKind::Time,
            Primitive::GYearMonth => TemporalKind::GYearMonth,
            Primitive::GYear => TemporalKind::GYear,
            Primitive::GMonthDay => TemporalKind::GMonthDay,
            Primitive::GDay => TemporalKind::GDay,
            Primitive::GMonth => TemporalKind::GMonth,
            _ => return None,
        })
    }
}

/// Canonicalize an already normalized lexical value
pub fn canonicalize(
    primitive: Primitive,
    value: &str,
    resolver: &dyn NsResolver,
) -> Result<Canonical, LexicalError> {
    if let Some(kind) = primitive.temporal() {
        return temporal::canonicalize(kind, value);
    }
    match primitive {
        Primitive::String => Ok(canonical::string(value)),
        Primitive::Boolean => canonical::boolean(value),
        Primitive::Decimal => canonical::decimal(value),
        Primitive::Integer => canonical::integer(value),
        Primitive::Float => canonical::float(value),
        Primitive::Double => canonical::double(value),
        Primitive::Duration => duration::canonicalize(value),
        Primitive::HexBinary => canonical::hex_binary(value),
        Primitive::Base64Binary => canonical::base64_binary(value),
        Primitive::AnyUri => canonical::any_uri(value),
        Primitive::QName => canonical::qname(value, false, resolver),
        Primitive::Notation => canonical::qname(value, true, resolver),
        _ => Err(LexicalError::new(primitive.name(), value)),
    }
}

/// Length of an atomic value as counted by length facets.
///
/// Characters for strings and URIs, octets for binary values, `None` where
/// length facets do not apply.
pub fn value_length(primitive: Primitive, canonical: &str, key: &[u8]) -> Option<usize> {
    match primitive {
        Primitive::String | Primitive::AnyUri => Some(canonical.chars().count()),
        Primitive::HexBinary | Primitive::Base64Binary => Some(key.len().saturating_sub(1)),
        _ => None,
    }
}
