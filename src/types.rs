//! SQL type system: scalar types, nullability-carrying row field types and the
//! `TypeFactory` seam used by the validator to join and cast types.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

pub const DEFAULT_DECIMAL_PRECISION: u32 = 19;
pub const MAX_DECIMAL_PRECISION: u32 = 38;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Decimal { precision: u32, scale: u32 },
    Float,
    Double,
    Varchar(Option<u32>),
    Text,
    Date,
    Time,
    Timestamp,
    // Type of the bare NULL literal; joins with anything
    Null,
}

impl SqlType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, SqlType::SmallInt | SqlType::Integer | SqlType::BigInt | SqlType::Decimal { .. } | SqlType::Float | SqlType::Double)
    }
    pub fn is_exact_integer(&self) -> bool {
        matches!(self, SqlType::SmallInt | SqlType::Integer | SqlType::BigInt)
    }
    pub fn is_approximate(&self) -> bool {
        matches!(self, SqlType::Float | SqlType::Double)
    }
    pub fn is_character(&self) -> bool {
        matches!(self, SqlType::Varchar(_) | SqlType::Text)
    }
    pub fn is_datetime(&self) -> bool {
        matches!(self, SqlType::Date | SqlType::Time | SqlType::Timestamp)
    }
    pub fn is_boolean(&self) -> bool {
        matches!(self, SqlType::Boolean)
    }
    pub fn is_null(&self) -> bool {
        matches!(self, SqlType::Null)
    }

    /// Rank inside the numeric family; wider types have larger ranks.
    fn numeric_rank(&self) -> Option<u8> {
        match self {
            SqlType::SmallInt => Some(1),
            SqlType::Integer => Some(2),
            SqlType::BigInt => Some(3),
            SqlType::Decimal { .. } => Some(4),
            SqlType::Float => Some(5),
            SqlType::Double => Some(6),
            _ => None,
        }
    }

    /// Upper-case type name without parameters, as used by the plan wire format.
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Decimal { .. } => "DECIMAL",
            SqlType::Float => "FLOAT",
            SqlType::Double => "DOUBLE",
            SqlType::Varchar(_) => "VARCHAR",
            SqlType::Text => "TEXT",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Null => "NULL",
        }
    }
}

impl Display for SqlType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlType::Decimal { precision, scale } => write!(f, "DECIMAL({},{})", precision, scale),
            SqlType::Varchar(Some(n)) => write!(f, "VARCHAR({})", n),
            other => write!(f, "{}", other.type_name()),
        }
    }
}

impl FromStr for SqlType {
    type Err = AppError;

    /// Parse a type name such as `int`, `DECIMAL(10, 2)`, `varchar(20)` or `double precision`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let (base, params) = match raw.find('(') {
            Some(open) => {
                if !raw.ends_with(')') {
                    return Err(AppError::syntax("invalid_type".to_string(), format!("Invalid type '{}'", raw)));
                }
                let inner = &raw[open + 1..raw.len() - 1];
                let mut nums = Vec::new();
                for p in inner.split(',') {
                    let n: u32 = p.trim().parse().map_err(|_| {
                        AppError::syntax("invalid_type".to_string(), format!("Invalid type parameter '{}' in '{}'", p.trim(), raw))
                    })?;
                    nums.push(n);
                }
                (raw[..open].trim(), nums)
            }
            None => (raw, Vec::new()),
        };
        let base = base.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
        let ty = match (base.as_str(), params.as_slice()) {
            ("BOOL" | "BOOLEAN", []) => SqlType::Boolean,
            ("SMALLINT", []) => SqlType::SmallInt,
            ("INT" | "INTEGER", []) => SqlType::Integer,
            ("BIGINT", []) => SqlType::BigInt,
            ("DECIMAL" | "NUMERIC", []) => SqlType::Decimal { precision: DEFAULT_DECIMAL_PRECISION, scale: 0 },
            ("DECIMAL" | "NUMERIC", [p]) => {
                if *p == 0 || *p > MAX_DECIMAL_PRECISION {
                    return Err(AppError::syntax("invalid_type".to_string(), format!("Invalid decimal precision/scale in '{}'", raw)));
                }
                SqlType::Decimal { precision: *p, scale: 0 }
            }
            ("DECIMAL" | "NUMERIC", [p, sc]) => {
                if sc > p || *p == 0 || *p > MAX_DECIMAL_PRECISION {
                    return Err(AppError::syntax("invalid_type".to_string(), format!("Invalid decimal precision/scale in '{}'", raw)));
                }
                SqlType::Decimal { precision: *p, scale: *sc }
            }
            ("FLOAT" | "REAL", []) => SqlType::Float,
            ("DOUBLE" | "DOUBLE PRECISION", []) => SqlType::Double,
            ("VARCHAR" | "CHAR" | "CHARACTER", []) => SqlType::Varchar(None),
            ("VARCHAR" | "CHAR" | "CHARACTER", [n]) => SqlType::Varchar(Some(*n)),
            ("TEXT" | "STRING", []) => SqlType::Text,
            ("DATE", []) => SqlType::Date,
            ("TIME", []) => SqlType::Time,
            ("TIMESTAMP", []) => SqlType::Timestamp,
            ("NULL", []) => SqlType::Null,
            _ => return Err(AppError::syntax("invalid_type".to_string(), format!("Unknown type '{}'", raw))),
        };
        Ok(ty)
    }
}

impl Serialize for SqlType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SqlType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: AppError| serde::de::Error::custom(e.message().to_string()))
    }
}

/// A SQL type together with its nullability, as carried by row type fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelDataType {
    #[serde(rename = "type")]
    pub sql_type: SqlType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool { true }

impl RelDataType {
    pub fn new(sql_type: SqlType, nullable: bool) -> Self { Self { sql_type, nullable } }
    pub fn not_null(sql_type: SqlType) -> Self { Self::new(sql_type, false) }
    pub fn nullable(sql_type: SqlType) -> Self { Self::new(sql_type, true) }
}

impl Display for RelDataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.nullable { write!(f, "{}", self.sql_type) } else { write!(f, "{} NOT NULL", self.sql_type) }
    }
}

/// Creates and combines types for the validator.
pub trait TypeFactory: Send + Sync {
    fn create_sql_type(&self, sql_type: SqlType) -> RelDataType {
        RelDataType::not_null(sql_type)
    }

    fn create_with_nullability(&self, ty: &RelDataType, nullable: bool) -> RelDataType {
        RelDataType::new(ty.sql_type, nullable)
    }

    /// Narrowest type every input can be converted to, or `None` when the inputs do not share a family.
    fn least_restrictive(&self, types: &[RelDataType]) -> Option<RelDataType>;

    fn can_cast(&self, from: &SqlType, to: &SqlType) -> bool;

    /// Type of an exact numeric literal such as `12.50`.
    fn decimal_of_literal(&self, text: &str) -> RelDataType;
}

#[derive(Debug, Default, Clone)]
pub struct DefaultTypeFactory;

impl DefaultTypeFactory {
    pub fn new() -> Self { Self }

    fn join_pair(a: &SqlType, b: &SqlType) -> Option<SqlType> {
        if a == b { return Some(*a); }
        if a.is_null() { return Some(*b); }
        if b.is_null() { return Some(*a); }
        if let (Some(ra), Some(rb)) = (a.numeric_rank(), b.numeric_rank()) {
            return Some(match (a, b) {
                (SqlType::Decimal { precision: pa, scale: sa }, SqlType::Decimal { precision: pb, scale: sb }) => {
                    let scale = (*sa).max(*sb);
                    let int_digits = (pa - sa).max(pb - sb);
                    SqlType::Decimal { precision: (int_digits + scale).min(MAX_DECIMAL_PRECISION), scale }
                }
                _ => if ra >= rb { *a } else { *b },
            });
        }
        if a.is_character() && b.is_character() {
            return Some(match (a, b) {
                (SqlType::Varchar(Some(x)), SqlType::Varchar(Some(y))) => SqlType::Varchar(Some((*x).max(*y))),
                (SqlType::Varchar(_), SqlType::Varchar(_)) => SqlType::Varchar(None),
                _ => SqlType::Text,
            });
        }
        match (a, b) {
            (SqlType::Date, SqlType::Timestamp) | (SqlType::Timestamp, SqlType::Date) => Some(SqlType::Timestamp),
            _ => None,
        }
    }
}

impl TypeFactory for DefaultTypeFactory {
    fn least_restrictive(&self, types: &[RelDataType]) -> Option<RelDataType> {
        let first = types.first()?;
        let mut acc = first.sql_type;
        let mut nullable = first.nullable;
        for t in &types[1..] {
            acc = Self::join_pair(&acc, &t.sql_type)?;
            nullable |= t.nullable;
        }
        Some(RelDataType::new(acc, nullable || acc.is_null()))
    }

    fn can_cast(&self, from: &SqlType, to: &SqlType) -> bool {
        if from == to || from.is_null() { return true; }
        if from.is_numeric() && to.is_numeric() { return true; }
        if from.is_character() || to.is_character() { return true; }
        if from.is_datetime() && to.is_datetime() { return !(from == &SqlType::Time || to == &SqlType::Time) || from == to; }
        false
    }

    fn decimal_of_literal(&self, text: &str) -> RelDataType {
        let digits = text.trim_start_matches(['-', '+']);
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        let int_len = int_part.trim_start_matches('0').len().max(1) as u32;
        let scale = frac_part.len() as u32;
        let precision = (int_len + scale).min(MAX_DECIMAL_PRECISION);
        RelDataType::not_null(SqlType::Decimal { precision, scale: scale.min(precision) })
    }
}
