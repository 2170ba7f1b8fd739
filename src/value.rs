//! Dynamically-typed result sets exchanged with the store.
//!
//! A [`ResultSet`] is an ordered list of column names plus rows of [`Value`]s.
//! Builders decode result sets into typed records, transform them, and encode
//! the output back into a result set for alignment and upsert.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::{EltError, Result};

/// Scale used for every monetary amount.
pub const MONEY_SCALE: u32 = 2;

/// Timestamp layouts accepted from staging columns.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Collapse null-like sentinels into [`Value::Null`].
    ///
    /// Empty (or whitespace-only) text and NaN reals both mean "missing".
    pub fn normalized(self) -> Value {
        match self {
            Value::Text(s) if s.trim().is_empty() => Value::Null,
            Value::Real(f) if f.is_nan() => Value::Null,
            other => other,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(f) if f.is_nan() => None,
            Value::Real(f) => Some(f.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::Text(s) if s.trim().is_empty() => None,
            Value::Text(s) => Some(s.clone()),
            Value::Date(d) => Some(d.to_string()),
            Value::DateTime(dt) => Some(dt.to_string()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(f) if f.is_finite() => Some(f.trunc() as i64),
            Value::Decimal(d) => d.trunc().to_i64(),
            Value::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<Decimal>().ok().and_then(|d| d.trunc().to_i64()))
            }
            _ => None,
        }
    }

    /// Numeric value as a money amount, or `None` when absent or unparsable.
    pub fn as_decimal(&self) -> Option<Decimal> {
        let amount = match self {
            Value::Integer(i) => Some(Decimal::from(*i)),
            Value::Real(f) => Decimal::from_f64(*f),
            Value::Decimal(d) => Some(*d),
            Value::Text(s) => s.trim().parse::<Decimal>().ok(),
            _ => None,
        };
        amount.map(|d| d.round_dp(MONEY_SCALE))
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            other => other.as_datetime().map(|dt| dt.date()),
        }
    }
}

/// Parse a staging timestamp; anything unparsable becomes `None`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    // Offset timestamps keep their wall-clock date and time.
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Coerce an item price: absent or unparsable prices count as zero.
pub fn coerce_price(value: &Value) -> Decimal {
    value.as_decimal().unwrap_or(Decimal::ZERO)
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<Value> for sea_query::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => sea_query::Value::String(None),
            Value::Integer(i) => i.into(),
            Value::Real(f) => f.into(),
            Value::Decimal(d) => d.into(),
            Value::Text(s) => s.into(),
            Value::Date(d) => d.into(),
            Value::DateTime(dt) => dt.into(),
        }
    }
}

/// Named columns plus rows of values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let mut rs = Self::new(columns);
        for row in rows {
            rs.push_row(row);
        }
        rs
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len(), "row width must match columns");
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Resolve a column the caller cannot do without.
    pub fn require_column(&self, relation: &str, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| EltError::MissingColumn {
            relation: relation.to_string(),
            column: name.to_string(),
        })
    }

    /// Restrict and reorder to `columns`. Names not present are skipped.
    pub fn project(&self, columns: &[String]) -> ResultSet {
        let indexes: Vec<(usize, &String)> = columns
            .iter()
            .filter_map(|name| self.column_index(name).map(|i| (i, name)))
            .collect();

        ResultSet {
            columns: indexes.iter().map(|(_, name)| (*name).clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indexes.iter().map(|(i, _)| row[*i].clone()).collect())
                .collect(),
        }
    }

    /// Replace every value with its null-normalized form.
    pub fn normalized(self) -> ResultSet {
        ResultSet {
            columns: self.columns,
            rows: self
                .rows
                .into_iter()
                .map(|row| row.into_iter().map(Value::normalized).collect())
                .collect(),
        }
    }
}
