//! xs:duration
//!
//! A duration is reduced to a sign, a month count, and a second count with
//! arbitrary fractional precision. The canonical form re-distributes those
//! totals into `PnYnMnDTnHnMnS`, eliding zero components.

use std::cmp::Ordering;

use super::keys::{self, DecimalKey, SIGN_NEGATIVE, SIGN_POSITIVE, SIGN_ZERO};
use crate::error::LexicalError;

/// A parsed duration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duration {
    /// Whether the duration is negative
    pub negative: bool,
    /// Total months (years folded in)
    pub months: u128,
    /// Whole seconds (days, hours and minutes folded in)
    pub seconds: u128,
    /// Fractional second digits, without trailing zeros
    pub fraction: String,
}

fn err(value: &str, reason: &str) -> LexicalError {
    LexicalError::new("duration", value).with_reason(reason)
}

impl Duration {
    /// Parse a duration lexical form
    pub fn parse(value: &str) -> Result<Self, LexicalError> {
        let (negative, rest) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        let rest = rest
            .strip_prefix('P')
            .ok_or_else(|| err(value, "missing 'P'"))?;
        let (date_part, time_part) = match rest.split_once('T') {
            Some((d, t)) => {
                if t.is_empty() {
                    return Err(err(value, "'T' must be followed by a time component"));
                }
                (d, Some(t))
            }
            None => (rest, None),
        };

        let overflow = || err(value, "component overflow");
        let mut months: u128 = 0;
        let mut seconds: u128 = 0;
        let mut fraction = String::new();
        let mut seen_any = false;

        let mut order = 0;
        for (number, designator) in components(date_part).ok_or_else(|| err(value, "bad date part"))? {
            let rank = match designator {
                'Y' => 1,
                'M' => 2,
                'D' => 3,
                _ => return Err(err(value, "unexpected designator")),
            };
            if rank <= order || number.contains('.') {
                return Err(err(value, "misplaced component"));
            }
            order = rank;
            seen_any = true;
            let n: u128 = number.parse().map_err(|_| overflow())?;
            match designator {
                'Y' => months = months.checked_add(n.checked_mul(12).ok_or_else(overflow)?).ok_or_else(overflow)?,
                'M' => months = months.checked_add(n).ok_or_else(overflow)?,
                _ => seconds = seconds.checked_add(n.checked_mul(86_400).ok_or_else(overflow)?).ok_or_else(overflow)?,
            }
        }

        if let Some(time_part) = time_part {
            let mut order = 0;
            for (number, designator) in components(time_part).ok_or_else(|| err(value, "bad time part"))? {
                let (rank, factor) = match designator {
                    'H' => (1, 3_600u128),
                    'M' => (2, 60),
                    'S' => (3, 1),
                    _ => return Err(err(value, "unexpected designator")),
                };
                if rank <= order || (designator != 'S' && number.contains('.')) {
                    return Err(err(value, "misplaced component"));
                }
                order = rank;
                seen_any = true;
                let (whole, frac) = match number.split_once('.') {
                    Some((w, f)) => {
                        if w.is_empty() || f.is_empty() {
                            return Err(err(value, "bad fractional seconds"));
                        }
                        (w, f)
                    }
                    None => (number, ""),
                };
                let n: u128 = whole.parse().map_err(|_| overflow())?;
                seconds = seconds
                    .checked_add(n.checked_mul(factor).ok_or_else(overflow)?)
                    .ok_or_else(overflow)?;
                fraction = frac.trim_end_matches('0').to_string();
            }
        }

        if !seen_any {
            return Err(err(value, "no components"));
        }
        Ok(Self {
            negative,
            months,
            seconds,
            fraction,
        })
    }

    /// Whether the duration is zero-length
    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.seconds == 0 && self.fraction.is_empty()
    }

    /// Canonical lexical form
    pub fn canonical(&self) -> String {
        if self.is_zero() {
            return "PT0S".to_string();
        }
        let mut out = String::new();
        if self.negative {
            out.push('-');
        }
        out.push('P');
        let (years, months) = (self.months / 12, self.months % 12);
        if years > 0 {
            out.push_str(&format!("{}Y", years));
        }
        if months > 0 {
            out.push_str(&format!("{}M", months));
        }
        let days = self.seconds / 86_400;
        let rem = self.seconds % 86_400;
        let (hours, minutes, secs) = (rem / 3_600, (rem % 3_600) / 60, rem % 60);
        if days > 0 {
            out.push_str(&format!("{}D", days));
        }
        if hours > 0 || minutes > 0 || secs > 0 || !self.fraction.is_empty() {
            out.push('T');
            if hours > 0 {
                out.push_str(&format!("{}H", hours));
            }
            if minutes > 0 {
                out.push_str(&format!("{}M", minutes));
            }
            if secs > 0 || !self.fraction.is_empty() {
                out.push_str(&secs.to_string());
                if !self.fraction.is_empty() {
                    out.push('.');
                    out.push_str(&self.fraction);
                }
                out.push('S');
            }
        }
        out
    }

    /// Value key: sign, integer key of months, decimal key of seconds
    pub fn key(&self) -> Vec<u8> {
        let sign = if self.is_zero() {
            SIGN_ZERO
        } else if self.negative {
            SIGN_NEGATIVE
        } else {
            SIGN_POSITIVE
        };
        let months = keys::decimal_key(false, &magnitude(self.months, ""), 0);
        let seconds = keys::decimal_key(
            false,
            &magnitude(self.seconds, &self.fraction),
            self.fraction.len() as u32,
        );
        let mut out = vec![sign];
        keys::write_varuint(&mut out, months.len() as u64);
        out.extend_from_slice(&months);
        keys::write_varuint(&mut out, seconds.len() as u64);
        out.extend_from_slice(&seconds);
        out
    }
}

fn magnitude(whole: u128, fraction: &str) -> String {
    let digits = if whole == 0 {
        fraction.to_string()
    } else {
        format!("{}{}", whole, fraction)
    };
    digits.trim_start_matches('0').to_string()
}

/// Split `12Y3M` style runs into (number, designator) pairs
fn components(s: &str) -> Option<Vec<(&str, char)>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() || c == '.' {
            continue;
        }
        if i == start {
            return None;
        }
        out.push((&s[start..i], c));
        start = i + c.len_utf8();
    }
    if start != s.len() {
        return None;
    }
    Some(out)
}

/// Canonicalize a duration into (canonical, key)
pub fn canonicalize(value: &str) -> Result<(String, Vec<u8>), LexicalError> {
    let d = Duration::parse(value)?;
    Ok((d.canonical(), d.key()))
}

struct KeyParts<'a> {
    sign: u8,
    months: DecimalKey<'a>,
    seconds: DecimalKey<'a>,
}

fn split_key(key: &[u8]) -> Option<KeyParts<'_>> {
    let (&sign, rest) = key.split_first()?;
    let (len, n) = keys::read_varuint(rest)?;
    let months = rest.get(n..n + len as usize)?;
    let rest = &rest[n + len as usize..];
    let (len, n) = keys::read_varuint(rest)?;
    let seconds = rest.get(n..n + len as usize)?;
    Some(KeyParts {
        sign,
        months: DecimalKey::decode(months)?,
        seconds: DecimalKey::decode(seconds)?,
    })
}

fn signed(sign: u8, ord: Ordering) -> Ordering {
    if sign == SIGN_NEGATIVE {
        ord.reverse()
    } else {
        ord
    }
}

/// Partial order on duration keys.
///
/// Months and seconds are compared separately; the result is determinate
/// only when the two comparisons do not pull in opposite directions.
pub fn compare_keys(a: &[u8], b: &[u8]) -> Option<Ordering> {
    let a = split_key(a)?;
    let b = split_key(b)?;
    if a.sign != b.sign {
        return Some(a.sign.cmp(&b.sign));
    }
    let months = signed(a.sign, a.months.cmp(&b.months));
    let seconds = signed(a.sign, a.seconds.cmp(&b.seconds));
    match (months, seconds) {
        (Ordering::Equal, other) | (other, Ordering::Equal) => Some(other),
        (m, s) if m == s => Some(m),
        _ => None,
    }
}
