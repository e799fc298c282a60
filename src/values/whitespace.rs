//! White space normalization
//!
//! Replace and collapse scan the input first and only allocate when the
//! value actually needs rewriting; otherwise the input is returned as-is.

use std::borrow::Cow;
use std::fmt;

/// White space handling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum WhiteSpace {
    /// Preserve all white space
    #[default]
    Preserve = 0,
    /// Replace tabs and newlines with spaces
    Replace = 1,
    /// Replace, trim, and squeeze runs of spaces
    Collapse = 2,
}

fn is_xml_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

impl WhiteSpace {
    /// Decode from the stored byte
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => WhiteSpace::Replace,
            2 => WhiteSpace::Collapse,
            _ => WhiteSpace::Preserve,
        }
    }

    /// Get the facet value as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            WhiteSpace::Preserve => "preserve",
            WhiteSpace::Replace => "replace",
            WhiteSpace::Collapse => "collapse",
        }
    }

    /// Whether a derived type may use `self` when its base uses `base`
    pub fn is_restriction_of(&self, base: WhiteSpace) -> bool {
        *self >= base
    }

    /// Normalize a string according to this white space mode
    pub fn normalize<'a>(&self, s: &'a str) -> Cow<'a, str> {
        match self {
            WhiteSpace::Preserve => Cow::Borrowed(s),
            WhiteSpace::Replace => replace(s),
            WhiteSpace::Collapse => collapse(s),
        }
    }
}

impl fmt::Display for WhiteSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn replace(s: &str) -> Cow<'_, str> {
    if !s.bytes().any(|b| matches!(b, b'\t' | b'\n' | b'\r')) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.chars()
            .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
            .collect(),
    )
}

fn needs_collapse(s: &str) -> bool {
    let bytes = s.as_bytes();
    if let (Some(&first), Some(&last)) = (bytes.first(), bytes.last()) {
        if is_xml_ws(first) || is_xml_ws(last) {
            return true;
        }
    }
    let mut prev_space = false;
    for &b in bytes {
        match b {
            b'\t' | b'\n' | b'\r' => return true,
            b' ' if prev_space => return true,
            b' ' => prev_space = true,
            _ => prev_space = false,
        }
    }
    false
}

fn collapse(s: &str) -> Cow<'_, str> {
    if !needs_collapse(s) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    for word in s.split(|c| matches!(c, ' ' | '\t' | '\n' | '\r')) {
        if word.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    Cow::Owned(out)
}
