//! Value keys
//!
//! A value key is a typed byte encoding of a canonical value. Two values of
//! the same kind are equal iff their keys are byte-equal. Ordering, where
//! the value space defines one, goes through [`compare`], which decodes the
//! layout of the kind at hand.

use std::cmp::Ordering;

use super::{duration, ValueKind};

/// Sign byte of a negative number
pub const SIGN_NEGATIVE: u8 = 0;
/// Sign byte of zero
pub const SIGN_ZERO: u8 = 1;
/// Sign byte of a positive number
pub const SIGN_POSITIVE: u8 = 2;

/// Tag byte of a plain string key
pub const TAG_STRING: u8 = 0;
/// Tag byte of an anyURI key
pub const TAG_ANY_URI: u8 = 1;
/// Tag byte of a QName key
pub const TAG_QNAME: u8 = 0;
/// Tag byte of a NOTATION key
pub const TAG_NOTATION: u8 = 1;
/// Tag byte of a hexBinary key
pub const TAG_HEX: u8 = 0;
/// Tag byte of a base64Binary key
pub const TAG_BASE64: u8 = 1;
/// Tag byte of a list key
pub const TAG_LIST: u8 = 0xFF;

/// Append an unsigned LEB128 integer
pub fn write_varuint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Read an unsigned LEB128 integer, returning the value and bytes consumed
pub fn read_varuint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &b) in bytes.iter().enumerate().take(10) {
        value |= u64::from(b & 0x7F) << (7 * i);
        if b & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Key of a decimal number.
///
/// `digits` is the magnitude without leading zeros and without trailing
/// fractional zeros; `scale` counts the fractional digits among them.
pub fn decimal_key(negative: bool, digits: &str, scale: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(digits.len() + 3);
    let sign = if digits.is_empty() {
        SIGN_ZERO
    } else if negative {
        SIGN_NEGATIVE
    } else {
        SIGN_POSITIVE
    };
    out.push(sign);
    write_varuint(&mut out, if digits.is_empty() { 0 } else { u64::from(scale) });
    out.extend_from_slice(digits.as_bytes());
    out
}

/// Decoded view of a decimal or integer key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalKey<'a> {
    /// One of the SIGN_* bytes
    pub sign: u8,
    /// Number of fractional digits
    pub scale: u32,
    /// Magnitude digits (ASCII)
    pub digits: &'a [u8],
}

impl<'a> DecimalKey<'a> {
    /// Decode a decimal key
    pub fn decode(key: &'a [u8]) -> Option<Self> {
        let (&sign, rest) = key.split_first()?;
        let (scale, n) = read_varuint(rest)?;
        Some(Self {
            sign,
            scale: u32::try_from(scale).ok()?,
            digits: &rest[n..],
        })
    }

    /// Digits counted by the totalDigits facet
    pub fn total_digits(&self) -> usize {
        self.digits.len().max(self.scale as usize).max(1)
    }

    /// Digits counted by the fractionDigits facet
    pub fn fraction_digits(&self) -> usize {
        self.scale as usize
    }

    fn integer_len(&self) -> i64 {
        self.digits.len() as i64 - i64::from(self.scale)
    }

    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        match self.integer_len().cmp(&other.integer_len()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        let len = self.digits.len().max(other.digits.len());
        for i in 0..len {
            let a = self.digits.get(i).copied().unwrap_or(b'0');
            let b = other.digits.get(i).copied().unwrap_or(b'0');
            match a.cmp(&b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl Ord for DecimalKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.sign.cmp(&other.sign) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        match self.sign {
            SIGN_POSITIVE => self.cmp_magnitude(other),
            SIGN_NEGATIVE => other.cmp_magnitude(self),
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for DecimalKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Key of a string-family value
pub fn string_key(tag: u8, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(tag);
    out.extend_from_slice(bytes);
    out
}

/// Key of a QName or NOTATION value
pub fn qname_key(tag: u8, namespace: &[u8], local: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(namespace.len() + local.len() + 5);
    out.push(tag);
    write_varuint(&mut out, namespace.len() as u64);
    out.extend_from_slice(namespace);
    write_varuint(&mut out, local.len() as u64);
    out.extend_from_slice(local);
    out
}

/// Key of a list value built from its item kinds and keys
pub fn list_key<'a, I>(items: I) -> Vec<u8>
where
    I: IntoIterator<Item = (ValueKind, &'a [u8])>,
{
    let items: Vec<(ValueKind, &[u8])> = items.into_iter().collect();
    let mut out = vec![TAG_LIST];
    write_varuint(&mut out, items.len() as u64);
    for (kind, key) in items {
        out.push(kind as u8);
        write_varuint(&mut out, key.len() as u64);
        out.extend_from_slice(key);
    }
    out
}

/// Decode a list key into its items
pub fn decode_list(key: &[u8]) -> Option<Vec<(ValueKind, &[u8])>> {
    let (&tag, mut rest) = key.split_first()?;
    if tag != TAG_LIST {
        return None;
    }
    let (count, n) = read_varuint(rest)?;
    rest = &rest[n..];
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (&kind, tail) = rest.split_first()?;
        let (len, n) = read_varuint(tail)?;
        let start = n;
        let end = start.checked_add(len as usize)?;
        let bytes = tail.get(start..end)?;
        items.push((ValueKind::from_u8(kind)?, bytes));
        rest = &tail[end..];
    }
    Some(items)
}

/// Number of items in a list key
pub fn list_len(key: &[u8]) -> Option<usize> {
    let (&tag, rest) = key.split_first()?;
    if tag != TAG_LIST {
        return None;
    }
    read_varuint(rest).map(|(n, _)| n as usize)
}

/// Typed comparison of two keys of the same kind.
///
/// Returns `None` when the kind has no order or the two values are
/// incomparable (NaN, timezone mismatch, indeterminate durations).
pub fn compare(kind: ValueKind, a: &[u8], b: &[u8]) -> Option<Ordering> {
    match kind {
        ValueKind::Integer | ValueKind::Decimal => {
            Some(DecimalKey::decode(a)?.cmp(&DecimalKey::decode(b)?))
        }
        ValueKind::Float => {
            let a = f32::from_bits(u32::from_be_bytes(a.try_into().ok()?));
            let b = f32::from_bits(u32::from_be_bytes(b.try_into().ok()?));
            a.partial_cmp(&b)
        }
        ValueKind::Double => {
            let a = f64::from_bits(u64::from_be_bytes(a.try_into().ok()?));
            let b = f64::from_bits(u64::from_be_bytes(b.try_into().ok()?));
            a.partial_cmp(&b)
        }
        ValueKind::DateTime
        | ValueKind::Date
        | ValueKind::Time
        | ValueKind::GYearMonth
        | ValueKind::GYear
        | ValueKind::GMonthDay
        | ValueKind::GDay
        | ValueKind::GMonth => {
            // Subkind and timezone presence must agree for a determinate order.
            if a.len() < 2 || b.len() < 2 || a[0] != b[0] || a[1] != b[1] {
                return None;
            }
            Some(a.cmp(b))
        }
        ValueKind::Duration => duration::compare_keys(a, b),
        _ => None,
    }
}

/// Whether the kind admits an order (range facets are meaningful)
pub fn is_ordered(kind: ValueKind) -> bool {
    matches!(
        kind,
        ValueKind::Integer
            | ValueKind::Decimal
            | ValueKind::Float
            | ValueKind::Double
            | ValueKind::Duration
            | ValueKind::DateTime
            | ValueKind::Date
            | ValueKind::Time
            | ValueKind::GYearMonth
            | ValueKind::GYear
            | ValueKind::GMonthDay
            | ValueKind::GDay
            | ValueKind::GMonth
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varuint() {
        for v in [0u64, 1, 127, 128, 300, u64::from(u32::MAX), u64::MAX] {
            let mut buf = Vec::new();
            write_varuint(&mut buf, v);
            assert_eq!(read_varuint(&buf), Some((v, buf.len())));
        }
        assert_eq!(read_varuint(&[0x80]), None);
    }

    #[test]
    fn test_decimal_order() {
        let k = |neg, d: &str, s| decimal_key(neg, d, s);
        let values = [
            k(true, "125", 1),  // -12.5
            k(true, "1", 0),    // -1
            k(true, "5", 2),    // -0.05
            k(false, "", 0),    // 0
            k(false, "5", 2),   // 0.05
            k(false, "1", 0),   // 1
            k(false, "15", 1),  // 1.5
            k(false, "2", 0),   // 2
            k(false, "100", 0), // 100
        ];
        for pair in values.windows(2) {
            assert_eq!(
                compare(ValueKind::Decimal, &pair[0], &pair[1]),
                Some(Ordering::Less),
                "{:?} < {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_decimal_digits() {
        let key = decimal_key(false, "12345", 2); // 123.45
        let dec = DecimalKey::decode(&key).unwrap();
        assert_eq!(dec.total_digits(), 5);
        assert_eq!(dec.fraction_digits(), 2);

        let key = decimal_key(false, "5", 3); // 0.005
        assert_eq!(DecimalKey::decode(&key).unwrap().total_digits(), 3);
    }

    #[test]
    fn test_list_key_roundtrip_shape() {
        let a = string_key(TAG_STRING, b"a");
        let b = string_key(TAG_STRING, b"bc");
        let key = list_key(vec![
            (ValueKind::String, a.as_slice()),
            (ValueKind::String, b.as_slice()),
        ]);
        assert_eq!(list_len(&key), Some(2));
        let items = decode_list(&key).unwrap();
        assert_eq!(items[1], (ValueKind::String, b.as_slice()));
    }

    #[test]
    fn test_unordered_kinds() {
        let a = string_key(TAG_STRING, b"a");
        let b = string_key(TAG_STRING, b"b");
        assert_eq!(compare(ValueKind::String, &a, &b), None);
        assert!(!is_ordered(ValueKind::Boolean));
    }
}
