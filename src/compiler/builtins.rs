//! XSD built-in types
//!
//! The built-in types are installed first, in the fixed order of
//! [`BUILTIN_TYPES`], so their type and validator ids are the same in every
//! build. Each entry names its base; bases always precede derived types.

use crate::runtime::validators::{IntegerRange, StringFlavour};
use crate::values::{Primitive, WhiteSpace};

/// XSD anyType type name
pub const XSD_ANY_TYPE: &str = "anyType";
/// XSD anySimpleType type name
pub const XSD_ANY_SIMPLE_TYPE: &str = "anySimpleType";
/// XSD string type name
pub const XSD_STRING: &str = "string";
/// XSD normalizedString type name
pub const XSD_NORMALIZED_STRING: &str = "normalizedString";
/// XSD token type name
pub const XSD_TOKEN: &str = "token";
/// XSD language type name
pub const XSD_LANGUAGE: &str = "language";
/// XSD Name type name
pub const XSD_NAME: &str = "Name";
/// XSD NCName type name
pub const XSD_NCNAME: &str = "NCName";
/// XSD ID type name
pub const XSD_ID: &str = "ID";
/// XSD IDREF type name
pub const XSD_IDREF: &str = "IDREF";
/// XSD IDREFS type name
pub const XSD_IDREFS: &str = "IDREFS";
/// XSD ENTITY type name
pub const XSD_ENTITY: &str = "ENTITY";
/// XSD ENTITIES type name
pub const XSD_ENTITIES: &str = "ENTITIES";
/// XSD NMTOKEN type name
pub const XSD_NMTOKEN: &str = "NMTOKEN";
/// XSD NMTOKENS type name
pub const XSD_NMTOKENS: &str = "NMTOKENS";
/// XSD boolean type name
pub const XSD_BOOLEAN: &str = "boolean";
/// XSD decimal type name
pub const XSD_DECIMAL: &str = "decimal";
/// XSD integer type name
pub const XSD_INTEGER: &str = "integer";
/// XSD nonPositiveInteger type name
pub const XSD_NON_POSITIVE_INTEGER: &str = "nonPositiveInteger";
/// XSD negativeInteger type name
pub const XSD_NEGATIVE_INTEGER: &str = "negativeInteger";
/// XSD long type name
pub const XSD_LONG: &str = "long";
/// XSD int type name
pub const XSD_INT: &str = "int";
/// XSD short type name
pub const XSD_SHORT: &str = "short";
/// XSD byte type name
pub const XSD_BYTE: &str = "byte";
/// XSD nonNegativeInteger type name
pub const XSD_NON_NEGATIVE_INTEGER: &str = "nonNegativeInteger";
/// XSD unsignedLong type name
pub const XSD_UNSIGNED_LONG: &str = "unsignedLong";
/// XSD unsignedInt type name
pub const XSD_UNSIGNED_INT: &str = "unsignedInt";
/// XSD unsignedShort type name
pub const XSD_UNSIGNED_SHORT: &str = "unsignedShort";
/// XSD unsignedByte type name
pub const XSD_UNSIGNED_BYTE: &str = "unsignedByte";
/// XSD positiveInteger type name
pub const XSD_POSITIVE_INTEGER: &str = "positiveInteger";
/// XSD float type name
pub const XSD_FLOAT: &str = "float";
/// XSD double type name
pub const XSD_DOUBLE: &str = "double";
/// XSD duration type name
pub const XSD_DURATION: &str = "duration";
/// XSD dateTime type name
pub const XSD_DATETIME: &str = "dateTime";
/// XSD time type name
pub const XSD_TIME: &str = "time";
/// XSD date type name
pub const XSD_DATE: &str = "date";
/// XSD gYearMonth type name
pub const XSD_GYEAR_MONTH: &str = "gYearMonth";
/// XSD gYear type name
pub const XSD_GYEAR: &str = "gYear";
/// XSD gMonthDay type name
pub const XSD_GMONTH_DAY: &str = "gMonthDay";
/// XSD gDay type name
pub const XSD_GDAY: &str = "gDay";
/// XSD gMonth type name
pub const XSD_GMONTH: &str = "gMonth";
/// XSD hexBinary type name
pub const XSD_HEX_BINARY: &str = "hexBinary";
/// XSD base64Binary type name
pub const XSD_BASE64_BINARY: &str = "base64Binary";
/// XSD anyURI type name
pub const XSD_ANY_URI: &str = "anyURI";
/// XSD QName type name
pub const XSD_QNAME: &str = "QName";
/// XSD NOTATION type name
pub const XSD_NOTATION: &str = "NOTATION";

/// Category of XSD type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    /// Primitive type (one of the XSD primitives)
    Primitive,
    /// Derived type (derived from another type)
    Derived,
    /// Special type (anyType, anySimpleType)
    Special,
}

/// How a built-in checks its values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinShape {
    /// The synthetic complex anyType
    AnyType,
    /// anySimpleType: any string
    AnySimple,
    /// An atomic type
    Atomic {
        /// Primitive lexical space
        primitive: Primitive,
        /// White space handling
        white_space: WhiteSpace,
        /// Lexical flavour (string family)
        flavour: StringFlavour,
        /// Value bounds (integer family)
        range: IntegerRange,
    },
    /// A list of another built-in
    List {
        /// Item type name
        item: &'static str,
    },
}

/// Definition of a built-in XSD type
#[derive(Debug, Clone, Copy)]
pub struct BuiltinType {
    /// Type name (local name without namespace)
    pub name: &'static str,
    /// Type category
    pub category: TypeCategory,
    /// Base type name (for derived types)
    pub base_type: Option<&'static str>,
    /// Value checking shape
    pub shape: BuiltinShape,
}

impl BuiltinType {
    /// Check whether this is a numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.shape,
            BuiltinShape::Atomic {
                primitive: Primitive::Decimal
                    | Primitive::Integer
                    | Primitive::Float
                    | Primitive::Double,
                ..
            }
        )
    }

    /// Check whether this is a string-derived type
    pub fn is_string(&self) -> bool {
        matches!(
            self.shape,
            BuiltinShape::Atomic {
                primitive: Primitive::String,
                ..
            }
        )
    }

    /// White space mode of the type
    pub fn white_space(&self) -> WhiteSpace {
        match self.shape {
            BuiltinShape::Atomic { white_space, .. } => white_space,
            BuiltinShape::List { .. } => WhiteSpace::Collapse,
            BuiltinShape::AnyType | BuiltinShape::AnySimple => WhiteSpace::Preserve,
        }
    }
}

const fn primitive(name: &'static str, primitive: Primitive) -> BuiltinType {
    let white_space = match primitive {
        Primitive::String => WhiteSpace::Preserve,
        _ => WhiteSpace::Collapse,
    };
    BuiltinType {
        name,
        category: TypeCategory::Primitive,
        base_type: Some(XSD_ANY_SIMPLE_TYPE),
        shape: BuiltinShape::Atomic {
            primitive,
            white_space,
            flavour: StringFlavour::Plain,
            range: IntegerRange::Unbounded,
        },
    }
}

const fn string(
    name: &'static str,
    base: &'static str,
    white_space: WhiteSpace,
    flavour: StringFlavour,
) -> BuiltinType {
    BuiltinType {
        name,
        category: TypeCategory::Derived,
        base_type: Some(base),
        shape: BuiltinShape::Atomic {
            primitive: Primitive::String,
            white_space,
            flavour,
            range: IntegerRange::Unbounded,
        },
    }
}

const fn integer(name: &'static str, base: &'static str, range: IntegerRange) -> BuiltinType {
    BuiltinType {
        name,
        category: TypeCategory::Derived,
        base_type: Some(base),
        shape: BuiltinShape::Atomic {
            primitive: Primitive::Integer,
            white_space: WhiteSpace::Collapse,
            flavour: StringFlavour::Plain,
            range,
        },
    }
}

const fn list(name: &'static str, item: &'static str) -> BuiltinType {
    BuiltinType {
        name,
        category: TypeCategory::Derived,
        base_type: Some(XSD_ANY_SIMPLE_TYPE),
        shape: BuiltinShape::List { item },
    }
}

const fn bounded(min: i128, max: i128) -> IntegerRange {
    IntegerRange::Bounded { min, max }
}

/// Registry of all built-in XSD types, in id order
pub static BUILTIN_TYPES: [BuiltinType; 46] = [
    // Special types
    BuiltinType {
        name: XSD_ANY_TYPE,
        category: TypeCategory::Special,
        base_type: None,
        shape: BuiltinShape::AnyType,
    },
    BuiltinType {
        name: XSD_ANY_SIMPLE_TYPE,
        category: TypeCategory::Special,
        base_type: Some(XSD_ANY_TYPE),
        shape: BuiltinShape::AnySimple,
    },
    // String types
    primitive(XSD_STRING, Primitive::String),
    string(
        XSD_NORMALIZED_STRING,
        XSD_STRING,
        WhiteSpace::Replace,
        StringFlavour::Plain,
    ),
    string(
        XSD_TOKEN,
        XSD_NORMALIZED_STRING,
        WhiteSpace::Collapse,
        StringFlavour::Plain,
    ),
    string(
        XSD_LANGUAGE,
        XSD_TOKEN,
        WhiteSpace::Collapse,
        StringFlavour::Language,
    ),
    string(XSD_NAME, XSD_TOKEN, WhiteSpace::Collapse, StringFlavour::Name),
    string(XSD_NCNAME, XSD_NAME, WhiteSpace::Collapse, StringFlavour::NcName),
    string(XSD_ID, XSD_NCNAME, WhiteSpace::Collapse, StringFlavour::NcName),
    string(XSD_IDREF, XSD_NCNAME, WhiteSpace::Collapse, StringFlavour::NcName),
    list(XSD_IDREFS, XSD_IDREF),
    string(XSD_ENTITY, XSD_NCNAME, WhiteSpace::Collapse, StringFlavour::NcName),
    list(XSD_ENTITIES, XSD_ENTITY),
    string(
        XSD_NMTOKEN,
        XSD_TOKEN,
        WhiteSpace::Collapse,
        StringFlavour::NmToken,
    ),
    list(XSD_NMTOKENS, XSD_NMTOKEN),
    primitive(XSD_BOOLEAN, Primitive::Boolean),
    // Numeric types
    primitive(XSD_DECIMAL, Primitive::Decimal),
    BuiltinType {
        name: XSD_INTEGER,
        category: TypeCategory::Derived,
        base_type: Some(XSD_DECIMAL),
        shape: BuiltinShape::Atomic {
            primitive: Primitive::Integer,
            white_space: WhiteSpace::Collapse,
            flavour: StringFlavour::Plain,
            range: IntegerRange::Unbounded,
        },
    },
    integer(XSD_NON_POSITIVE_INTEGER, XSD_INTEGER, IntegerRange::AtMost(0)),
    integer(
        XSD_NEGATIVE_INTEGER,
        XSD_NON_POSITIVE_INTEGER,
        IntegerRange::AtMost(-1),
    ),
    integer(
        XSD_LONG,
        XSD_INTEGER,
        bounded(i64::MIN as i128, i64::MAX as i128),
    ),
    integer(XSD_INT, XSD_LONG, bounded(i32::MIN as i128, i32::MAX as i128)),
    integer(
        XSD_SHORT,
        XSD_INT,
        bounded(i16::MIN as i128, i16::MAX as i128),
    ),
    integer(XSD_BYTE, XSD_SHORT, bounded(i8::MIN as i128, i8::MAX as i128)),
    integer(
        XSD_NON_NEGATIVE_INTEGER,
        XSD_INTEGER,
        IntegerRange::AtLeast(0),
    ),
    integer(
        XSD_UNSIGNED_LONG,
        XSD_NON_NEGATIVE_INTEGER,
        bounded(0, u64::MAX as i128),
    ),
    integer(
        XSD_UNSIGNED_INT,
        XSD_UNSIGNED_LONG,
        bounded(0, u32::MAX as i128),
    ),
    integer(
        XSD_UNSIGNED_SHORT,
        XSD_UNSIGNED_INT,
        bounded(0, u16::MAX as i128),
    ),
    integer(
        XSD_UNSIGNED_BYTE,
        XSD_UNSIGNED_SHORT,
        bounded(0, u8::MAX as i128),
    ),
    integer(
        XSD_POSITIVE_INTEGER,
        XSD_NON_NEGATIVE_INTEGER,
        IntegerRange::AtLeast(1),
    ),
    primitive(XSD_FLOAT, Primitive::Float),
    primitive(XSD_DOUBLE, Primitive::Double),
    // Date/time types
    primitive(XSD_DURATION, Primitive::Duration),
    primitive(XSD_DATETIME, Primitive::DateTime),
    primitive(XSD_TIME, Primitive::Time),
    primitive(XSD_DATE, Primitive::Date),
    primitive(XSD_GYEAR_MONTH, Primitive::GYearMonth),
    primitive(XSD_GYEAR, Primitive::GYear),
    primitive(XSD_GMONTH_DAY, Primitive::GMonthDay),
    primitive(XSD_GDAY, Primitive::GDay),
    primitive(XSD_GMONTH, Primitive::GMonth),
    // Binary types
    primitive(XSD_HEX_BINARY, Primitive::HexBinary),
    primitive(XSD_BASE64_BINARY, Primitive::Base64Binary),
    // Other types
    primitive(XSD_ANY_URI, Primitive::AnyUri),
    primitive(XSD_QNAME, Primitive::QName),
    primitive(XSD_NOTATION, Primitive::Notation),
];

/// Get a built-in type by local name
pub fn get_builtin_type(name: &str) -> Option<&'static BuiltinType> {
    BUILTIN_TYPES.iter().find(|t| t.name == name)
}

/// Position of a built-in in [`BUILTIN_TYPES`]
pub fn builtin_index(name: &str) -> Option<usize> {
    BUILTIN_TYPES.iter().position(|t| t.name == name)
}
