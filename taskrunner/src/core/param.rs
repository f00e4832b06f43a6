//! Typed parameters and the raw `<flag>:<type>:<name>:<value>` token grammar.

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

/// Partition a parameter lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Read-only values describing the host and process.
    System,
    /// Defaults that user parameters of the same type may override.
    Environment,
    /// Read-only statistics derived from Task execution.
    Task,
    /// Read-only statistics derived from Sub-Task execution.
    SubTask,
    /// Ad hoc values supplied at startup.
    User,
}

impl Category {
    /// Categories in the order the expression evaluator substitutes them.
    ///
    /// Sub-Task names embed Task names (`SUBTASK_NAME` contains `TASK_NAME`),
    /// so they go first.
    pub const SUBSTITUTION_ORDER: [Category; 5] = [
        Category::System,
        Category::Environment,
        Category::SubTask,
        Category::Task,
        Category::User,
    ];
}

/// Type tag of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    Timestamp,
}

impl ParamKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "" | "s" => Some(ParamKind::String),
            "n" => Some(ParamKind::Number),
            "b" => Some(ParamKind::Boolean),
            "d" => Some(ParamKind::Timestamp),
            _ => None,
        }
    }

    fn tag(self) -> char {
        match self {
            ParamKind::String => 's',
            ParamKind::Number => 'n',
            ParamKind::Boolean => 'b',
            ParamKind::Timestamp => 'd',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::String(_) => ParamKind::String,
            ParamValue::Number(_) => ParamKind::Number,
            ParamValue::Boolean(_) => ParamKind::Boolean,
            ParamValue::Timestamp(_) => ParamKind::Timestamp,
        }
    }

    /// Parse `raw` as a value of `kind`.
    pub fn parse(kind: ParamKind, raw: &str) -> Result<Self, ParamError> {
        match kind {
            ParamKind::String => Ok(ParamValue::String(raw.to_string())),
            ParamKind::Number => parse_number(raw).map(ParamValue::Number),
            ParamKind::Boolean => parse_boolean(raw).map(ParamValue::Boolean),
            ParamKind::Timestamp => parse_timestamp(raw).map(ParamValue::Timestamp),
        }
    }

    /// Literal used when substituting this value into an expression.
    ///
    /// `None` for a timestamp whose tick count does not fit in an `i64`.
    pub fn expression_literal(&self) -> Option<String> {
        match self {
            ParamValue::String(s) => Some(format!("'{s}'")),
            ParamValue::Number(n) => Some(format_number(*n)),
            ParamValue::Boolean(b) => Some(b.to_string()),
            ParamValue::Timestamp(ts) => ticks(*ts).map(|t| t.to_string()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::String(s) => f.write_str(s),
            ParamValue::Number(n) => f.write_str(&format_number(*n)),
            ParamValue::Boolean(b) => write!(f, "{b}"),
            ParamValue::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_RENDER_FORMAT)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("parameter token '{0}' must look like <flag>:<type>:<name>:<value>")]
    Malformed(String),
    #[error("invalid number '{0}'")]
    Number(String),
    #[error("invalid boolean '{0}'")]
    Boolean(String),
    #[error("unrecognized date/time '{0}'")]
    Timestamp(String),
}

/// One typed entry in the parameter store.
///
/// Consumers receive clones; updates replace the whole record.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: ParamValue,
    category: Category,
    valid: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: ParamValue, category: Category) -> Self {
        Self {
            name: name.into(),
            value,
            category,
            valid: true,
        }
    }

    /// Placeholder returned for lookups that found nothing.
    pub fn invalid(name: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            value: ParamValue::String(String::new()),
            category,
            valid: false,
        }
    }

    /// Parse a raw user token: `<flag>:<type>:<name>:<value>`.
    ///
    /// The type tag may be empty or omitted entirely (`<flag>:<name>:<value>`),
    /// in which case the value is a string. Quotes around the value are stripped.
    ///
    /// The second field is read as a tag only when it is `s`, `n`, `b`, `d` or
    /// empty and two more fields follow. Anything else is the name of an
    /// untyped parameter, so `p:a:b:c` is the string `a` = `b:c`, while
    /// `p:s:b:c` is the string `b` = `c`.
    pub fn parse(token: &str) -> Result<Self, ParamError> {
        let malformed = || ParamError::Malformed(token.to_string());
        let (_flag, rest) = token.split_once(':').ok_or_else(malformed)?;
        let (kind, rest) = match rest.split_once(':') {
            Some((tag, after)) if after.contains(':') => match ParamKind::from_tag(tag) {
                Some(kind) => (kind, after),
                None => (ParamKind::String, rest),
            },
            _ => (ParamKind::String, rest),
        };
        let (name, raw_value) = rest.split_once(':').ok_or_else(malformed)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(malformed());
        }
        let value = ParamValue::parse(kind, strip_quotes(raw_value))?;
        Ok(Parameter::new(name, value, Category::User))
    }

    /// Inverse of [`Parameter::parse`].
    pub fn render(&self) -> String {
        let value = match &self.value {
            ParamValue::String(s) => format!("\"{s}\""),
            other => other.to_string(),
        };
        format!("p:{}:{}:{}", self.value.kind().tag(), self.name, value)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    pub fn kind(&self) -> ParamKind {
        self.value.kind()
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn with_value(&self, value: ParamValue) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }

    pub(crate) fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }
}

fn strip_quotes(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    raw
}

fn parse_number(raw: &str) -> Result<f64, ParamError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.to_ascii_lowercase().as_str() {
        "min" => return Ok(f64::MIN),
        "max" => return Ok(f64::MAX),
        _ => {}
    }
    compact
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ParamError::Number(raw.to_string()))
}

fn parse_boolean(raw: &str) -> Result<bool, ParamError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "0" | "no" | "n" | "off" => Ok(false),
        _ => Err(ParamError::Boolean(raw.to_string())),
    }
}

/// Shortest text that parses back to the same `f64`.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

const TIMESTAMP_RENDER_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Date/time layouts accepted for timestamps, tried in order.
///
/// Covers ISO 8601 plus the common day-first, month-first, dotted and
/// month-name conventions; the first layout that matches wins.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y%m%dT%H%M%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %B %Y %H:%M:%S",
    "%b %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M:%S",
    "%b %d, %Y %I:%M:%S %p",
    "%B %d, %Y %I:%M:%S %p",
    "%a, %d %b %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%Y%m%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%m-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%A, %B %d, %Y",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// Best-effort timestamp parsing against a broad set of layouts.
///
/// Dates outside the tick range (roughly years -27000 to 29000) are rejected
/// so every parsed timestamp has an expression literal.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ParamError> {
    parse_layouts(raw.trim())
        .filter(|ts| ticks(*ts).is_some())
        .ok_or_else(|| ParamError::Timestamp(raw.to_string()))
}

fn parse_layouts(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt);
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
    {
        return Some(date.and_time(NaiveTime::MIN));
    }
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
        .map(|time| Local::now().date_naive().and_time(time))
}

/// 100-nanosecond intervals since 0001-01-01T00:00:00, if it fits in an `i64`.
pub fn ticks(ts: NaiveDateTime) -> Option<i64> {
    let utc = ts.and_utc();
    utc.timestamp()
        .checked_mul(10_000_000)?
        .checked_add(UNIX_EPOCH_TICKS)?
        .checked_add(i64::from(utc.timestamp_subsec_nanos() / 100))
}

const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;
