//! Dialect conformance levels. The validator and parser ask these predicates
//! instead of hard-coding dialect rules.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conformance {
    #[default]
    Default,
    Lenient,
    #[serde(rename = "strict_92")]
    Strict92,
    #[serde(rename = "strict_2003")]
    Strict2003,
    #[serde(rename = "mysql_5")]
    MySql5,
}

impl Conformance {
    pub const ALL: [Conformance; 5] = [
        Conformance::Default,
        Conformance::Lenient,
        Conformance::Strict92,
        Conformance::Strict2003,
        Conformance::MySql5,
    ];

    fn is_relaxed(&self) -> bool {
        matches!(self, Conformance::Lenient | Conformance::MySql5)
    }

    /// `GROUP BY x` may refer to a select-list alias.
    pub fn is_group_by_alias(&self) -> bool { self.is_relaxed() }

    /// `GROUP BY 2` refers to the second select item.
    pub fn is_group_by_ordinal(&self) -> bool { self.is_relaxed() }

    /// `HAVING x > 1` may refer to a select-list alias.
    pub fn is_having_alias(&self) -> bool { self.is_relaxed() }

    pub fn is_sort_by_alias(&self) -> bool { !matches!(self, Conformance::Strict2003) }

    pub fn is_sort_by_ordinal(&self) -> bool { !matches!(self, Conformance::Strict2003) }

    /// `!=` as a synonym for `<>`.
    pub fn is_bang_equal_allowed(&self) -> bool { self.is_relaxed() }

    /// `%` as a synonym for `MOD`.
    pub fn is_percent_remainder_allowed(&self) -> bool { self.is_relaxed() }

    /// `LIMIT start, count`.
    pub fn is_limit_start_count_allowed(&self) -> bool { self.is_relaxed() }

    pub fn is_from_required(&self) -> bool {
        matches!(self, Conformance::Strict92 | Conformance::Strict2003)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Conformance::Default => "default",
            Conformance::Lenient => "lenient",
            Conformance::Strict92 => "strict_92",
            Conformance::Strict2003 => "strict_2003",
            Conformance::MySql5 => "mysql_5",
        }
    }
}

impl Display for Conformance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Conformance {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Conformance::ALL
            .iter()
            .find(|c| c.name() == key)
            .copied()
            .ok_or_else(|| AppError::config("invalid_conformance".to_string(), format!("Unknown conformance '{}'", s.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names() {
        assert_eq!("LENIENT".parse::<Conformance>().unwrap(), Conformance::Lenient);
        assert_eq!("strict-92".parse::<Conformance>().unwrap(), Conformance::Strict92);
        assert_eq!("mysql_5".parse::<Conformance>().unwrap(), Conformance::MySql5);
        assert!("oracle".parse::<Conformance>().is_err());
        for c in Conformance::ALL {
            assert_eq!(c.name().parse::<Conformance>().unwrap(), c);
        }
    }

    #[test]
    fn default_is_standard_but_sorts_by_alias() {
        let c = Conformance::default();
        assert!(!c.is_group_by_alias());
        assert!(!c.is_group_by_ordinal());
        assert!(!c.is_bang_equal_allowed());
        assert!(!c.is_percent_remainder_allowed());
        assert!(c.is_sort_by_alias());
        assert!(c.is_sort_by_ordinal());
        assert!(!c.is_from_required());
    }

    #[test]
    fn strict_levels() {
        assert!(Conformance::Strict92.is_from_required());
        assert!(Conformance::Strict92.is_sort_by_ordinal());
        assert!(!Conformance::Strict2003.is_sort_by_alias());
        assert!(!Conformance::Strict2003.is_sort_by_ordinal());
    }

    #[test]
    fn serde_names_match_display() {
        for c in Conformance::ALL {
            let v = serde_json::to_value(c).unwrap();
            assert_eq!(v, serde_json::Value::String(c.name().to_string()));
        }
    }
}
