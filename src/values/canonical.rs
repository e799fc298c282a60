//! Canonical lexical forms of the atomic primitives
//!
//! Each function takes an already whitespace-normalized lexical value and
//! returns its canonical form together with its value key. Nothing is
//! returned on failure: canonicalization does not partially succeed.

use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

use super::keys::{self, TAG_ANY_URI, TAG_BASE64, TAG_HEX, TAG_NOTATION, TAG_QNAME, TAG_STRING};
use crate::error::LexicalError;
use crate::namespaces::NsResolver;
use crate::names;

static FLOAT_LEXICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([Ee][+-]?[0-9]+)?$").expect("static regex")
});

static URI_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").expect("static regex"));

/// Canonical string plus value key
pub type Canonical = (String, Vec<u8>);

/// A parsed decimal: sign, integer digits, fractional digits (trimmed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalParts {
    /// Whether the value is below zero
    pub negative: bool,
    /// Integer digits without leading zeros
    pub integer: String,
    /// Fractional digits without trailing zeros
    pub fraction: String,
}

impl DecimalParts {
    /// Whether the number is zero
    pub fn is_zero(&self) -> bool {
        self.integer.is_empty() && self.fraction.is_empty()
    }

    /// Canonical `i.f` form
    pub fn canonical(&self) -> String {
        if self.is_zero() {
            return "0.0".to_string();
        }
        let mut out = String::new();
        if self.negative {
            out.push('-');
        }
        out.push_str(if self.integer.is_empty() { "0" } else { &self.integer });
        out.push('.');
        out.push_str(if self.fraction.is_empty() { "0" } else { &self.fraction });
        out
    }

    /// Decimal value key
    pub fn key(&self) -> Vec<u8> {
        let digits = format!("{}{}", self.integer, self.fraction);
        let digits = digits.trim_start_matches('0');
        keys::decimal_key(self.negative, digits, self.fraction.len() as u32)
    }
}

fn split_sign(value: &str) -> (bool, &str) {
    if let Some(rest) = value.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = value.strip_prefix('+') {
        (false, rest)
    } else {
        (false, value)
    }
}

/// Parse an xs:decimal lexical form
pub fn parse_decimal(value: &str) -> Result<DecimalParts, LexicalError> {
    let (negative, body) = split_sign(value);
    let (int, frac) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int.is_empty() && frac.is_empty()) || !all_digits(int) || !all_digits(frac) {
        return Err(LexicalError::new("decimal", value));
    }
    let parts = DecimalParts {
        negative,
        integer: int.trim_start_matches('0').to_string(),
        fraction: frac.trim_end_matches('0').to_string(),
    };
    Ok(DecimalParts {
        negative: negative && !parts.is_zero(),
        ..parts
    })
}

/// xs:decimal
pub fn decimal(value: &str) -> Result<Canonical, LexicalError> {
    let parts = parse_decimal(value)?;
    Ok((parts.canonical(), parts.key()))
}

/// xs:integer (and its derived types)
pub fn integer(value: &str) -> Result<Canonical, LexicalError> {
    let (negative, digits) = split_sign(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LexicalError::new("integer", value));
    }
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(("0".to_string(), keys::decimal_key(false, "", 0)));
    }
    let canonical = if negative {
        format!("-{}", digits)
    } else {
        digits.to_string()
    };
    Ok((canonical, keys::decimal_key(negative, digits, 0)))
}

fn float_canonical(mantissa_exp: String) -> String {
    // `{:e}` yields the shortest round-trip digits, e.g. `1.5e-3` or `1e2`.
    let (mantissa, exponent) = mantissa_exp
        .split_once('e')
        .unwrap_or((mantissa_exp.as_str(), "0"));
    let mantissa = if mantissa.contains('.') {
        mantissa.to_string()
    } else {
        format!("{}.0", mantissa)
    };
    format!("{}E{}", mantissa, exponent)
}

fn check_float_lexical(primitive: &'static str, value: &str) -> Result<(), LexicalError> {
    if FLOAT_LEXICAL.is_match(value) {
        Ok(())
    } else {
        Err(LexicalError::new(primitive, value))
    }
}

/// Only the INF literals denote infinity; a numeral too large for the type
/// is rejected instead of rounding to it
fn finite<T: Into<f64> + Copy>(v: T) -> Option<T> {
    v.into().is_finite().then_some(v)
}

fn overflow(primitive: &'static str, value: &str) -> LexicalError {
    LexicalError::new(primitive, value).with_reason("out of range")
}

/// xs:double
pub fn double(value: &str) -> Result<Canonical, LexicalError> {
    let v: f64 = match value {
        "NaN" => f64::NAN,
        "INF" => f64::INFINITY,
        "-INF" => f64::NEG_INFINITY,
        _ => {
            check_float_lexical("double", value)?;
            finite(value.parse::<f64>().map_err(|_| LexicalError::new("double", value))?)
                .ok_or_else(|| overflow("double", value))?
        }
    };
    let (canonical, bits) = if v.is_nan() {
        ("NaN".to_string(), 0x7FF8_0000_0000_0000u64)
    } else if v.is_infinite() {
        let s = if v > 0.0 { "INF" } else { "-INF" };
        (s.to_string(), v.to_bits())
    } else if v == 0.0 {
        ("0.0E0".to_string(), 0u64)
    } else {
        (float_canonical(format!("{:e}", v)), v.to_bits())
    };
    Ok((canonical, bits.to_be_bytes().to_vec()))
}

/// xs:float
pub fn float(value: &str) -> Result<Canonical, LexicalError> {
    let v: f32 = match value {
        "NaN" => f32::NAN,
        "INF" => f32::INFINITY,
        "-INF" => f32::NEG_INFINITY,
        _ => {
            check_float_lexical("float", value)?;
            finite(value.parse::<f32>().map_err(|_| LexicalError::new("float", value))?)
                .ok_or_else(|| overflow("float", value))?
        }
    };
    let (canonical, bits) = if v.is_nan() {
        ("NaN".to_string(), 0x7FC0_0000u32)
    } else if v.is_infinite() {
        let s = if v > 0.0 { "INF" } else { "-INF" };
        (s.to_string(), v.to_bits())
    } else if v == 0.0 {
        ("0.0E0".to_string(), 0u32)
    } else {
        (float_canonical(format!("{:e}", v)), v.to_bits())
    };
    Ok((canonical, bits.to_be_bytes().to_vec()))
}

/// xs:boolean
pub fn boolean(value: &str) -> Result<Canonical, LexicalError> {
    match value {
        "true" | "1" => Ok(("true".to_string(), vec![1])),
        "false" | "0" => Ok(("false".to_string(), vec![0])),
        _ => Err(LexicalError::new("boolean", value)),
    }
}

/// Decode a hexBinary lexical form
pub fn decode_hex(value: &str) -> Result<Vec<u8>, LexicalError> {
    let bytes = value.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(LexicalError::new("hexBinary", value).with_reason("odd number of digits"));
    }
    let nibble = |b: u8| match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    };
    bytes
        .chunks(2)
        .map(|pair| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(hi), Some(lo)) => Ok(hi << 4 | lo),
            _ => Err(LexicalError::new("hexBinary", value)),
        })
        .collect()
}

/// xs:hexBinary
pub fn hex_binary(value: &str) -> Result<Canonical, LexicalError> {
    let raw = decode_hex(value)?;
    Ok((value.to_ascii_uppercase(), keys::string_key(TAG_HEX, &raw)))
}

/// Decode a base64Binary lexical form (strict RFC 4648, spaces ignored)
pub fn decode_base64(value: &str) -> Result<Vec<u8>, LexicalError> {
    let compact: String = value.chars().filter(|c| *c != ' ').collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| LexicalError::new("base64Binary", value).with_reason(e.to_string()))
}

/// xs:base64Binary
pub fn base64_binary(value: &str) -> Result<Canonical, LexicalError> {
    let raw = decode_base64(value)?;
    let canonical = base64::engine::general_purpose::STANDARD.encode(&raw);
    Ok((canonical, keys::string_key(TAG_BASE64, &raw)))
}

/// xs:anyURI
pub fn any_uri(value: &str) -> Result<Canonical, LexicalError> {
    let bad = |reason: &str| LexicalError::new("anyURI", value).with_reason(reason);
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b if b < 0x20 || b == 0x7F => return Err(bad("control character")),
            b'<' | b'>' | b'"' | b'{' | b'}' | b'|' | b'\\' | b'^' | b'`' => {
                return Err(bad("disallowed character"))
            }
            b'%' => {
                let ok = bytes.get(i + 1).map_or(false, u8::is_ascii_hexdigit)
                    && bytes.get(i + 2).map_or(false, u8::is_ascii_hexdigit);
                if !ok {
                    return Err(bad("bad percent-encoding"));
                }
                i += 2;
            }
            _ => {}
        }
        i += 1;
    }
    let head_end = value.find(['/', '?', '#']).unwrap_or(value.len());
    if let Some(colon) = value[..head_end].find(':') {
        if !URI_SCHEME.is_match(&value[..colon]) {
            return Err(bad("bad scheme"));
        }
    }
    if value.matches('#').count() > 1 {
        return Err(bad("more than one fragment"));
    }
    Ok((value.to_string(), keys::string_key(TAG_ANY_URI, bytes)))
}

/// xs:QName or xs:NOTATION, resolved through `resolver`.
///
/// The canonical form is `namespace NUL local`.
pub fn qname(
    value: &str,
    notation: bool,
    resolver: &dyn NsResolver,
) -> Result<Canonical, LexicalError> {
    let primitive = if notation { "NOTATION" } else { "QName" };
    if !names::is_valid_qname(value) {
        return Err(LexicalError::new(primitive, value));
    }
    let (prefix, local) = names::split_qname(value);
    let namespace = match prefix {
        Some(p) => resolver.lookup(p).ok_or_else(|| {
            LexicalError::new(primitive, value).with_reason(format!("unbound prefix '{}'", p))
        })?,
        None => resolver.lookup("").unwrap_or(""),
    };
    let canonical = format!("{}\u{0}{}", namespace, local);
    let tag = if notation { TAG_NOTATION } else { TAG_QNAME };
    Ok((canonical, keys::qname_key(tag, namespace.as_bytes(), local.as_bytes())))
}

/// Plain string (already normalized)
pub fn string(value: &str) -> Canonical {
    (value.to_string(), keys::string_key(TAG_STRING, value.as_bytes()))
}
