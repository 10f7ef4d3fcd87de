use core::fmt;
use std::str::FromStr;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::temporal;
use crate::error::{Error, ErrorCode};

/// The atomic types of the Metapath data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicType {
    AnyAtomic,
    Boolean,
    String,
    UntypedAtomic,
    Decimal,
    Integer,
    Date,
    DateTime,
    YearMonthDuration,
    DayTimeDuration,
}

impl AtomicType {
    pub fn name(&self) -> &'static str {
        match self {
            AtomicType::AnyAtomic => "any-atomic-type",
            AtomicType::Boolean => "boolean",
            AtomicType::String => "string",
            AtomicType::UntypedAtomic => "untyped-atomic",
            AtomicType::Decimal => "decimal",
            AtomicType::Integer => "integer",
            AtomicType::Date => "date",
            AtomicType::DateTime => "date-time",
            AtomicType::YearMonthDuration => "year-month-duration",
            AtomicType::DayTimeDuration => "day-time-duration",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "any-atomic-type" => AtomicType::AnyAtomic,
            "boolean" => AtomicType::Boolean,
            "string" => AtomicType::String,
            "untyped-atomic" => AtomicType::UntypedAtomic,
            "decimal" => AtomicType::Decimal,
            "integer" => AtomicType::Integer,
            "date" => AtomicType::Date,
            "date-time" => AtomicType::DateTime,
            "year-month-duration" => AtomicType::YearMonthDuration,
            "day-time-duration" => AtomicType::DayTimeDuration,
            _ => return None,
        })
    }

    /// Direct supertype; `None` for the root of the hierarchy.
    pub fn parent(&self) -> Option<AtomicType> {
        match self {
            AtomicType::AnyAtomic => None,
            AtomicType::Integer => Some(AtomicType::Decimal),
            _ => Some(AtomicType::AnyAtomic),
        }
    }

    /// True if `self` is `other` or derives from it.
    pub fn derives_from(&self, other: AtomicType) -> bool {
        let mut cur = Some(*self);
        while let Some(t) = cur {
            if t == other {
                return true;
            }
            cur = t.parent();
        }
        false
    }

    /// Most specific common supertype.
    pub fn common_supertype(self, other: AtomicType) -> AtomicType {
        let mut cur = Some(self);
        while let Some(t) = cur {
            if other.derives_from(t) {
                return t;
            }
            cur = t.parent();
        }
        AtomicType::AnyAtomic
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, AtomicType::Integer | AtomicType::Decimal)
    }
}

impl fmt::Display for AtomicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtomicValue {
    Boolean(bool),
    String(String),
    /// Raw text of a field or flag that carries no declared type.
    Untyped(String),
    Integer(i64),
    Decimal(Decimal),
    Date {
        date: NaiveDate,
        tz: Option<FixedOffset>,
    },
    DateTime {
        value: NaiveDateTime,
        tz: Option<FixedOffset>,
    },
    /// Signed month count.
    YearMonthDuration(i32),
    DayTimeDuration(TimeDelta),
}

impl AtomicValue {
    pub fn type_of(&self) -> AtomicType {
        match self {
            AtomicValue::Boolean(_) => AtomicType::Boolean,
            AtomicValue::String(_) => AtomicType::String,
            AtomicValue::Untyped(_) => AtomicType::UntypedAtomic,
            AtomicValue::Integer(_) => AtomicType::Integer,
            AtomicValue::Decimal(_) => AtomicType::Decimal,
            AtomicValue::Date { .. } => AtomicType::Date,
            AtomicValue::DateTime { .. } => AtomicType::DateTime,
            AtomicValue::YearMonthDuration(_) => AtomicType::YearMonthDuration,
            AtomicValue::DayTimeDuration(_) => AtomicType::DayTimeDuration,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.type_of().is_numeric()
    }

    pub fn string(s: impl Into<String>) -> Self {
        AtomicValue::String(s.into())
    }

    pub fn untyped(s: impl Into<String>) -> Self {
        AtomicValue::Untyped(s.into())
    }

    /// Parse the lexical form of `target` into a value.
    pub fn parse_as(s: &str, target: AtomicType) -> Result<Self, Error> {
        let invalid = || {
            Error::from_code(
                ErrorCode::FORG0001,
                format!("invalid {} value '{}'", target.name(), s),
            )
        };
        let t = s.trim();
        Ok(match target {
            AtomicType::AnyAtomic | AtomicType::UntypedAtomic => AtomicValue::Untyped(s.to_string()),
            AtomicType::String => AtomicValue::String(s.to_string()),
            AtomicType::Boolean => match t {
                "true" | "1" => AtomicValue::Boolean(true),
                "false" | "0" => AtomicValue::Boolean(false),
                _ => return Err(invalid()),
            },
            AtomicType::Integer => {
                let digits = t.strip_prefix('+').unwrap_or(t);
                let unsigned = digits.strip_prefix('-').unwrap_or(digits);
                if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                AtomicValue::Integer(digits.parse().map_err(|_| {
                    Error::from_code(ErrorCode::FOAR0002, format!("integer overflow: '{s}'"))
                })?)
            }
            AtomicType::Decimal => {
                if t.contains(['e', 'E']) || t.is_empty() {
                    return Err(invalid());
                }
                let body = t.strip_prefix('+').unwrap_or(t);
                AtomicValue::Decimal(Decimal::from_str(body).map_err(|_| invalid())?)
            }
            AtomicType::Date => {
                let (date, tz) = temporal::parse_date(t)?;
                AtomicValue::Date { date, tz }
            }
            AtomicType::DateTime => {
                let (value, tz) = temporal::parse_date_time(t)?;
                AtomicValue::DateTime { value, tz }
            }
            AtomicType::YearMonthDuration => {
                AtomicValue::YearMonthDuration(temporal::parse_year_month_duration(t)?)
            }
            AtomicType::DayTimeDuration => {
                AtomicValue::DayTimeDuration(temporal::parse_day_time_duration(t)?)
            }
        })
    }

    /// Cast to `target`. Text values go through the target's lexical form;
    /// other conversions follow the usual XPath casting table.
    pub fn cast_to(&self, target: AtomicType) -> Result<AtomicValue, Error> {
        use AtomicValue as V;
        if let (V::Integer(i), AtomicType::Decimal) = (self, target) {
            return Ok(V::Decimal(Decimal::from(*i)));
        }
        if self.type_of().derives_from(target) {
            return Ok(self.clone());
        }
        let unsupported = || {
            Error::type_err(format!(
                "cannot cast {} to {}",
                self.type_of(),
                target
            ))
        };
        match (self, target) {
            (_, AtomicType::String) => Ok(V::String(self.to_string())),
            (_, AtomicType::UntypedAtomic) => Ok(V::Untyped(self.to_string())),
            (V::String(s) | V::Untyped(s), _) => Self::parse_as(s, target),
            (V::Boolean(b), AtomicType::Integer) => Ok(V::Integer(i64::from(*b))),
            (V::Boolean(b), AtomicType::Decimal) => Ok(V::Decimal(Decimal::from(i64::from(*b)))),
            (V::Integer(i), AtomicType::Boolean) => Ok(V::Boolean(*i != 0)),
            (V::Decimal(d), AtomicType::Boolean) => Ok(V::Boolean(!d.is_zero())),
            (V::Decimal(d), AtomicType::Integer) => d.trunc().to_i64().map(V::Integer).ok_or_else(|| {
                Error::from_code(ErrorCode::FOAR0002, format!("decimal {d} out of integer range"))
            }),
            (V::DateTime { value, tz }, AtomicType::Date) => Ok(V::Date {
                date: value.date(),
                tz: *tz,
            }),
            (V::Date { date, tz }, AtomicType::DateTime) => Ok(V::DateTime {
                value: date.and_time(NaiveTime::MIN),
                tz: *tz,
            }),
            _ => Err(unsupported()),
        }
    }

    /// Value equality as used for distinctness: numbers compare by value
    /// across integer and decimal, text compares by codepoints across string
    /// and untyped, temporal values compare on the UTC timeline (a value
    /// without a timezone is taken as UTC).
    pub fn value_eq(&self, other: &AtomicValue) -> bool {
        use AtomicValue as V;
        match (self, other) {
            (V::Integer(a), V::Integer(b)) => a == b,
            (V::Integer(_) | V::Decimal(_), V::Integer(_) | V::Decimal(_)) => {
                self.as_decimal() == other.as_decimal()
            }
            (V::String(a) | V::Untyped(a), V::String(b) | V::Untyped(b)) => a == b,
            (V::Boolean(a), V::Boolean(b)) => a == b,
            (V::Date { .. }, V::Date { .. }) | (V::DateTime { .. }, V::DateTime { .. }) => {
                self.utc_instant(None) == other.utc_instant(None)
            }
            (V::YearMonthDuration(a), V::YearMonthDuration(b)) => a == b,
            (V::DayTimeDuration(a), V::DayTimeDuration(b)) => a == b,
            _ => false,
        }
    }

    /// Decimal view of a numeric value.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            AtomicValue::Integer(i) => Some(Decimal::from(*i)),
            AtomicValue::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Point on the UTC timeline of a date or date-time, using `implicit`
    /// (or UTC) when the value has no timezone of its own.
    pub(crate) fn utc_instant(&self, implicit: Option<FixedOffset>) -> Option<NaiveDateTime> {
        let (local, tz) = match self {
            AtomicValue::Date { date, tz } => (date.and_time(NaiveTime::MIN), *tz),
            AtomicValue::DateTime { value, tz } => (*value, *tz),
            _ => return None,
        };
        let offset = tz.or(implicit).map_or(0, |o| o.local_minus_utc());
        local.checked_sub_signed(TimeDelta::seconds(i64::from(offset)))
    }
}

impl fmt::Display for AtomicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomicValue::Boolean(b) => write!(f, "{b}"),
            AtomicValue::String(s) | AtomicValue::Untyped(s) => f.write_str(s),
            AtomicValue::Integer(i) => write!(f, "{i}"),
            AtomicValue::Decimal(d) => write!(f, "{}", d.normalize()),
            AtomicValue::Date { date, tz } => f.write_str(&temporal::format_date(date, tz.as_ref())),
            AtomicValue::DateTime { value, tz } => {
                f.write_str(&temporal::format_date_time(value, tz.as_ref()))
            }
            AtomicValue::YearMonthDuration(m) => {
                f.write_str(&temporal::format_year_month_duration(*m))
            }
            AtomicValue::DayTimeDuration(d) => f.write_str(&temporal::format_day_time_duration(d)),
        }
    }
}

impl From<bool> for AtomicValue {
    fn from(b: bool) -> Self {
        AtomicValue::Boolean(b)
    }
}

impl From<i64> for AtomicValue {
    fn from(i: i64) -> Self {
        AtomicValue::Integer(i)
    }
}

impl From<Decimal> for AtomicValue {
    fn from(d: Decimal) -> Self {
        AtomicValue::Decimal(d)
    }
}

impl From<&str> for AtomicValue {
    fn from(s: &str) -> Self {
        AtomicValue::String(s.to_string())
    }
}

impl From<String> for AtomicValue {
    fn from(s: String) -> Self {
        AtomicValue::String(s)
    }
}
