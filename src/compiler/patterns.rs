//! XSD regular expressions
//!
//! XSD patterns are implicitly anchored and differ from the `regex` crate
//! syntax in a few places: the `\i`/`\c` name escapes, character-class
//! subtraction, `.` excluding carriage return, and `^`/`$` being ordinary
//! characters. Patterns of one restriction step are alternatives; each step
//! is compiled to one anchored regex.

use regex::Regex;

use super::Compiler;
use crate::error::{Error, Result};
use crate::runtime::ids::PatternId;

const NAME_START: &str = "A-Z:_a-z\\x{C0}-\\x{D6}\\x{D8}-\\x{F6}\\x{F8}-\\x{2FF}\
\\x{370}-\\x{37D}\\x{37F}-\\x{1FFF}\\x{200C}-\\x{200D}\\x{2070}-\\x{218F}\
\\x{2C00}-\\x{2FEF}\\x{3001}-\\x{D7FF}\\x{F900}-\\x{FDCF}\\x{FDF0}-\\x{FFFD}\
\\x{10000}-\\x{EFFFF}";

const NAME_EXTRA: &str = "\\-.0-9\\x{B7}\\x{300}-\\x{36F}\\x{203F}-\\x{2040}";

fn invalid(pattern: &str, reason: &str) -> Error {
    Error::SchemaStructural(format!("invalid pattern '{}': {}", pattern, reason))
}

fn name_class(negated: bool, with_extra: bool) -> String {
    format!(
        "[{}{}{}]",
        if negated { "^" } else { "" },
        NAME_START,
        if with_extra { NAME_EXTRA } else { "" }
    )
}

/// Translate one XSD pattern into `regex` syntax (unanchored)
pub fn translate(pattern: &str) -> Result<String> {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    // Class nesting depth; above 1 only inside a subtraction
    let mut depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| invalid(pattern, "trailing backslash"))?;
                match escaped {
                    'i' => out.push_str(&name_class(false, false)),
                    'I' => out.push_str(&name_class(true, false)),
                    'c' => out.push_str(&name_class(false, true)),
                    'C' => out.push_str(&name_class(true, true)),
                    'p' | 'P' => {
                        out.push('\\');
                        out.push(escaped);
                        if chars.peek() != Some(&'{') {
                            return Err(invalid(pattern, "expected '{' after \\p"));
                        }
                        loop {
                            let n = chars
                                .next()
                                .ok_or_else(|| invalid(pattern, "unterminated \\p{...}"))?;
                            out.push(n);
                            if n == '}' {
                                break;
                            }
                        }
                    }
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            '[' if depth == 0 => {
                depth = 1;
                out.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('^');
                }
            }
            '[' => return Err(invalid(pattern, "nested character class")),
            '-' if depth > 0 && chars.peek() == Some(&'[') => {
                chars.next();
                depth += 1;
                out.push_str("--[");
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('^');
                }
            }
            ']' if depth > 0 => {
                depth -= 1;
                out.push(']');
            }
            '&' | '~' if depth > 0 => {
                out.push('\\');
                out.push(c);
            }
            '^' | '$' if depth == 0 => {
                out.push('\\');
                out.push(c);
            }
            '.' if depth == 0 => out.push_str("[^\\n\\r]"),
            _ => out.push(c),
        }
    }

    if depth > 0 {
        return Err(invalid(pattern, "unterminated character class"));
    }
    Ok(out)
}

/// Combine the patterns of one restriction step into an anchored regex
pub fn anchored(patterns: &[&str]) -> Result<String> {
    let mut alternatives = Vec::with_capacity(patterns.len());
    for p in patterns {
        alternatives.push(format!("(?:{})", translate(p)?));
    }
    Ok(format!("^(?:{})$", alternatives.join("|")))
}

impl Compiler<'_> {
    /// Compile the patterns of one restriction step, sharing identical ones
    pub(super) fn pattern(&mut self, patterns: &[&str]) -> Result<PatternId> {
        let source = anchored(patterns)?;
        if let Some(&id) = self.pattern_cache.get(&source) {
            return Ok(id);
        }
        let regex = Regex::new(&source)
            .map_err(|e| invalid(&patterns.join("|"), &e.to_string()))?;
        let id = self.patterns.push(source.clone(), regex);
        self.pattern_cache.insert(source, id);
        Ok(id)
    }
}
