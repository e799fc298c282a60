//! Date and time primitives
//!
//! Parses the XSD 1.0 lexical forms of dateTime, date, time and the
//! Gregorian fragments. Calendar arithmetic (day validity, timezone
//! normalization, the 24:00:00 rollover) goes through `chrono`.
//!
//! dateTime and time values carrying a timezone are shifted to UTC in both
//! the canonical form and the key. A date with a timezone is read as the
//! start of its day in that timezone: the canonical form is the UTC date of
//! that instant followed by `Z`, and the key keeps the UTC hour and minute
//! so that distinct instants stay distinct. Gregorian fragments keep their
//! fields and record the offset.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::error::LexicalError;

/// Which temporal primitive a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TemporalKind {
    /// xs:dateTime
    DateTime = 1,
    /// xs:date
    Date = 2,
    /// xs:time
    Time = 3,
    /// xs:gYearMonth
    GYearMonth = 4,
    /// xs:gYear
    GYear = 5,
    /// xs:gMonthDay
    GMonthDay = 6,
    /// xs:gDay
    GDay = 7,
    /// xs:gMonth
    GMonth = 8,
}

impl TemporalKind {
    /// Primitive name
    pub fn name(&self) -> &'static str {
        match self {
            TemporalKind::DateTime => "dateTime",
            TemporalKind::Date => "date",
            TemporalKind::Time => "time",
            TemporalKind::GYearMonth => "gYearMonth",
            TemporalKind::GYear => "gYear",
            TemporalKind::GMonthDay => "gMonthDay",
            TemporalKind::GDay => "gDay",
            TemporalKind::GMonth => "gMonth",
        }
    }

    fn has_year(&self) -> bool {
        matches!(
            self,
            TemporalKind::DateTime | TemporalKind::Date | TemporalKind::GYearMonth | TemporalKind::GYear
        )
    }

    fn has_month(&self) -> bool {
        !matches!(self, TemporalKind::Time | TemporalKind::GYear | TemporalKind::GDay)
    }

    fn has_day(&self) -> bool {
        matches!(
            self,
            TemporalKind::DateTime | TemporalKind::Date | TemporalKind::GMonthDay | TemporalKind::GDay
        )
    }

    fn has_time(&self) -> bool {
        matches!(self, TemporalKind::DateTime | TemporalKind::Time)
    }
}

/// A parsed temporal value, fields as written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Temporal {
    /// Which primitive
    pub kind: TemporalKind,
    /// Year (>= 1) when the kind has one
    pub year: i32,
    /// Month 1..=12 when present
    pub month: u8,
    /// Day 1..=31 when present
    pub day: u8,
    /// Hour 0..=23 (24:00:00 is rolled over while parsing)
    pub hour: u8,
    /// Minute 0..=59
    pub minute: u8,
    /// Second 0..=60 (60 only at 23:59:60)
    pub second: u8,
    /// Fractional seconds in nanoseconds
    pub nanos: u32,
    /// Timezone offset in minutes east of UTC
    pub tz: Option<i16>,
}

struct Cursor<'a> {
    s: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.s.get(self.pos).copied()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn digits(&mut self, min: usize, max: usize) -> Option<&'a str> {
        let start = self.pos;
        while self.pos - start < max && self.peek().map_or(false, |b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos - start < min {
            return None;
        }
        std::str::from_utf8(&self.s[start..self.pos]).ok()
    }

    fn fixed(&mut self, n: usize) -> Option<u8> {
        self.digits(n, n)?.parse().ok()
    }

    fn done(&self) -> bool {
        self.pos == self.s.len()
    }
}

fn err(kind: TemporalKind, value: &str, reason: &str) -> LexicalError {
    LexicalError::new(kind.name(), value).with_reason(reason)
}

/// Parse a temporal lexical form (already whitespace-collapsed)
pub fn parse(kind: TemporalKind, value: &str) -> Result<Temporal, LexicalError> {
    let mut c = Cursor {
        s: value.as_bytes(),
        pos: 0,
    };
    let mut t = Temporal {
        kind,
        year: 1,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
        nanos: 0,
        tz: None,
    };

    if kind.has_year() {
        if c.peek() == Some(b'-') {
            return Err(err(kind, value, "year must be >= 1"));
        }
        let digits = c
            .digits(4, usize::MAX)
            .ok_or_else(|| err(kind, value, "year needs at least four digits"))?;
        if digits.len() > 4 && digits.starts_with('0') {
            return Err(err(kind, value, "year has a leading zero"));
        }
        t.year = digits
            .parse()
            .map_err(|_| err(kind, value, "year out of range"))?;
        if t.year < 1 {
            return Err(err(kind, value, "year must be >= 1"));
        }
        if kind.has_month() && !c.eat(b'-') {
            return Err(err(kind, value, "expected '-'"));
        }
    } else if kind.has_month() || kind.has_day() {
        let dashes = if kind == TemporalKind::GDay { 3 } else { 2 };
        for _ in 0..dashes {
            if !c.eat(b'-') {
                return Err(err(kind, value, "expected leading '-'"));
            }
        }
    }

    if kind.has_month() {
        t.month = c.fixed(2).ok_or_else(|| err(kind, value, "bad month"))?;
        if !(1..=12).contains(&t.month) {
            return Err(err(kind, value, "month out of range"));
        }
        if kind.has_day() && !c.eat(b'-') {
            return Err(err(kind, value, "expected '-'"));
        }
    }

    if kind.has_day() {
        t.day = c.fixed(2).ok_or_else(|| err(kind, value, "bad day"))?;
        let max = match kind {
            TemporalKind::GDay => 31,
            // gMonthDay admits --02-29
            TemporalKind::GMonthDay => days_in_month(2000, t.month),
            _ => days_in_month(t.year, t.month),
        };
        if t.day < 1 || t.day > max {
            return Err(err(kind, value, "day out of range"));
        }
    }

    let mut rollover = false;
    if kind.has_time() {
        if kind == TemporalKind::DateTime && !c.eat(b'T') {
            return Err(err(kind, value, "expected 'T'"));
        }
        t.hour = c.fixed(2).ok_or_else(|| err(kind, value, "bad hour"))?;
        if !c.eat(b':') {
            return Err(err(kind, value, "expected ':'"));
        }
        t.minute = c.fixed(2).ok_or_else(|| err(kind, value, "bad minute"))?;
        if !c.eat(b':') {
            return Err(err(kind, value, "expected ':'"));
        }
        t.second = c.fixed(2).ok_or_else(|| err(kind, value, "bad second"))?;
        if c.eat(b'.') {
            let frac = c
                .digits(1, usize::MAX)
                .ok_or_else(|| err(kind, value, "empty fractional seconds"))?;
            if frac.len() > 9 {
                return Err(err(kind, value, "more than 9 fractional digits"));
            }
            let padded = format!("{:0<9}", frac);
            t.nanos = padded
                .parse()
                .map_err(|_| err(kind, value, "bad fractional seconds"))?;
        }
        if t.minute > 59 {
            return Err(err(kind, value, "minute out of range"));
        }
        if t.hour == 24 {
            if t.minute != 0 || t.second != 0 || t.nanos != 0 {
                return Err(err(kind, value, "24:00:00 is the only valid hour-24 time"));
            }
            t.hour = 0;
            rollover = true;
        } else if t.hour > 23 {
            return Err(err(kind, value, "hour out of range"));
        }
        if t.second == 60 {
            if t.hour != 23 || t.minute != 59 {
                return Err(err(kind, value, "leap second only at 23:59:60"));
            }
        } else if t.second > 59 {
            return Err(err(kind, value, "second out of range"));
        }
    }

    if !c.done() {
        t.tz = Some(parse_timezone(&mut c).ok_or_else(|| err(kind, value, "bad timezone"))?);
    }
    if !c.done() {
        return Err(err(kind, value, "trailing characters"));
    }

    if rollover && kind == TemporalKind::DateTime {
        let next = date(t.year, t.month, t.day)
            .and_then(|d| d.succ_opt())
            .ok_or_else(|| err(kind, value, "date out of range"))?;
        t.year = next.year();
        t.month = next.month() as u8;
        t.day = next.day() as u8;
    }
    Ok(t)
}

fn parse_timezone(c: &mut Cursor<'_>) -> Option<i16> {
    if c.eat(b'Z') {
        return Some(0);
    }
    let negative = match c.peek()? {
        b'+' => false,
        b'-' => true,
        _ => return None,
    };
    c.pos += 1;
    let hh = c.fixed(2)?;
    if !c.eat(b':') {
        return None;
    }
    let mm = c.fixed(2)?;
    if mm > 59 || hh > 14 || (hh == 14 && mm != 0) {
        return None;
    }
    let minutes = i16::from(hh) * 60 + i16::from(mm);
    Some(if negative { -minutes } else { minutes })
}

fn date(year: i32, month: u8, day: u8) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(day))
}

fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
            if leap {
                29
            } else {
                28
            }
        }
    }
}

impl Temporal {
    /// Shift to UTC where the kind supports it
    fn normalized(&self) -> Result<Temporal, LexicalError> {
        let Some(offset) = self.tz else {
            return Ok(*self);
        };
        let overflow = || LexicalError::new(self.kind.name(), "").with_reason("date out of range");
        match self.kind {
            TemporalKind::DateTime | TemporalKind::Date => {
                let (h, m) = if self.kind == TemporalKind::Date {
                    (0, 0)
                } else {
                    (self.hour, self.minute)
                };
                let local: NaiveDateTime = date(self.year, self.month, self.day)
                    .and_then(|d| d.and_hms_opt(u32::from(h), u32::from(m), 0))
                    .ok_or_else(overflow)?;
                let utc = local
                    .checked_sub_signed(Duration::minutes(i64::from(offset)))
                    .filter(|utc| utc.year() >= 1)
                    .ok_or_else(overflow)?;
                Ok(Temporal {
                    year: utc.year(),
                    month: utc.month() as u8,
                    day: utc.day() as u8,
                    hour: utc.hour() as u8,
                    minute: utc.minute() as u8,
                    tz: Some(0),
                    ..*self
                })
            }
            TemporalKind::Time => {
                let total = i32::from(self.hour) * 60 + i32::from(self.minute) - i32::from(offset);
                let total = total.rem_euclid(24 * 60);
                Ok(Temporal {
                    hour: (total / 60) as u8,
                    minute: (total % 60) as u8,
                    tz: Some(0),
                    ..*self
                })
            }
            _ => Ok(*self),
        }
    }

    /// Canonical lexical form
    pub fn canonical(&self) -> Result<String, LexicalError> {
        let shifted = match self.kind {
            TemporalKind::DateTime | TemporalKind::Date | TemporalKind::Time => self.normalized()?,
            _ => *self,
        };
        let mut out = String::new();
        match shifted.kind {
            TemporalKind::DateTime => {
                out.push_str(&format!(
                    "{:04}-{:02}-{:02}T{}",
                    shifted.year,
                    shifted.month,
                    shifted.day,
                    shifted.time_string()
                ));
            }
            TemporalKind::Date => {
                out.push_str(&format!("{:04}-{:02}-{:02}", shifted.year, shifted.month, shifted.day))
            }
            TemporalKind::Time => out.push_str(&shifted.time_string()),
            TemporalKind::GYearMonth => {
                out.push_str(&format!("{:04}-{:02}", shifted.year, shifted.month))
            }
            TemporalKind::GYear => out.push_str(&format!("{:04}", shifted.year)),
            TemporalKind::GMonthDay => {
                out.push_str(&format!("--{:02}-{:02}", shifted.month, shifted.day))
            }
            TemporalKind::GDay => out.push_str(&format!("---{:02}", shifted.day)),
            TemporalKind::GMonth => out.push_str(&format!("--{:02}", shifted.month)),
        }
        if let Some(tz) = shifted.tz {
            out.push_str(&timezone_string(tz));
        }
        Ok(out)
    }

    fn time_string(&self) -> String {
        let mut s = format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second);
        if self.nanos != 0 {
            let frac = format!("{:09}", self.nanos);
            s.push('.');
            s.push_str(frac.trim_end_matches('0'));
        }
        s
    }

    /// Value key: subkind, timezone bit, packed fields
    pub fn key(&self) -> Result<Vec<u8>, LexicalError> {
        let v = self.normalized()?;
        let mut out = Vec::with_capacity(20);
        out.push(v.kind as u8);
        out.push(u8::from(v.tz.is_some()));
        if v.kind == TemporalKind::Time {
            let secs = u32::from(v.hour) * 3600 + u32::from(v.minute) * 60 + u32::from(v.second);
            out.extend_from_slice(&secs.to_be_bytes());
            out.extend_from_slice(&v.nanos.to_be_bytes());
            return Ok(out);
        }
        // Bias the year so that byte order matches numeric order.
        let year = (i64::from(v.year) + (1i64 << 31)) as u32;
        out.extend_from_slice(&year.to_be_bytes());
        out.extend_from_slice(&[v.month, v.day, v.hour, v.minute, v.second]);
        out.extend_from_slice(&v.nanos.to_be_bytes());
        let offset = match v.kind {
            TemporalKind::DateTime | TemporalKind::Date => 0,
            _ => v.tz.unwrap_or(0),
        };
        out.extend_from_slice(&((i32::from(offset) + 0x8000) as u16).to_be_bytes());
        Ok(out)
    }
}

fn timezone_string(minutes: i16) -> String {
    if minutes == 0 {
        return "Z".to_string();
    }
    let sign = if minutes < 0 { '-' } else { '+' };
    let abs = minutes.unsigned_abs();
    format!("{}{:02}:{:02}", sign, abs / 60, abs % 60)
}

/// Canonicalize a temporal lexical form into (canonical, key)
pub fn canonicalize(kind: TemporalKind, value: &str) -> Result<(String, Vec<u8>), LexicalError> {
    let t = parse(kind, value)?;
    let canonical = t.canonical().map_err(|e| LexicalError { value: value.to_string(), ..e })?;
    let key = t.key().map_err(|e| LexicalError { value: value.to_string(), ..e })?;
    Ok((canonical, key))
}
