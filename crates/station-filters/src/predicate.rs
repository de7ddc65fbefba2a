//! Composable predicates over the station summary view.
//!
//! A [`Predicate`] is a small expression tree. The catalog renders it into a
//! parameterised SQL `WHERE` clause; [`Predicate::matches`] evaluates the same
//! tree against an in-memory [`StationSummary`]. Conjunction is the only
//! composition the filter layer relies on, and it is associative and
//! commutative.

use chrono::NaiveDateTime;
use pdp_common::StationSummary;
use serde::{Deserialize, Serialize};

use crate::wkt::Geometry;

/// Columns of the station summary view that filters can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    NetworkName,
    NativeId,
    MinObsTime,
    MaxObsTime,
    Freq,
    Vars,
}

impl Column {
    /// Column name in `crmp_network_geoserver`.
    pub fn sql_name(&self) -> &'static str {
        match self {
            Column::NetworkName => "network_name",
            Column::NativeId => "native_id",
            Column::MinObsTime => "min_obs_time",
            Column::MaxObsTime => "max_obs_time",
            Column::Freq => "freq",
            Column::Vars => "vars",
        }
    }

    fn text<'a>(&self, row: &'a StationSummary) -> Option<&'a str> {
        match self {
            Column::NetworkName => Some(row.network_name.as_str()),
            Column::NativeId => Some(row.native_id.as_str()),
            Column::Freq => row.freq.as_deref(),
            Column::Vars => row.vars.as_deref(),
            Column::MinObsTime | Column::MaxObsTime => None,
        }
    }

    fn timestamp(&self, row: &StationSummary) -> Option<NaiveDateTime> {
        match self {
            Column::MinObsTime => row.min_obs_time,
            Column::MaxObsTime => row.max_obs_time,
            _ => None,
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl CompareOp {
    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "=",
        }
    }

    fn holds<T: PartialOrd>(&self, lhs: &T, rhs: &T) -> bool {
        match self {
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Eq => lhs == rhs,
        }
    }
}

/// A bound comparison value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Timestamp(NaiveDateTime),
}

/// Boolean condition over a station summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Matches every station.
    True,
    /// `column <op> value`
    Compare {
        column: Column,
        op: CompareOp,
        value: Value,
    },
    /// `column IN (values...)`
    In { column: Column, values: Vec<String> },
    /// `column LIKE pattern` with `%` and `_` wildcards.
    Like { column: Column, pattern: String },
    /// The comma-separated `vars` column shares at least one exact
    /// identifier with `ids`.
    VarsOverlap { ids: Vec<String> },
    /// The station location intersects the geometry.
    Intersects(Geometry),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(column: Column, op: CompareOp, value: Value) -> Self {
        Predicate::Compare { column, op, value }
    }

    pub fn is_in<I, S>(column: Column, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn like(column: Column, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            column,
            pattern: pattern.into(),
        }
    }

    /// Conjunction of two predicates. `True` is the identity.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::True, p) | (p, Predicate::True) => p,
            (Predicate::And(mut a), Predicate::And(b)) => {
                a.extend(b);
                Predicate::And(a)
            }
            (Predicate::And(mut a), p) => {
                a.push(p);
                Predicate::And(a)
            }
            (p, Predicate::And(mut b)) => {
                b.insert(0, p);
                Predicate::And(b)
            }
            (a, b) => Predicate::And(vec![a, b]),
        }
    }

    /// Conjunction of any number of predicates; `True` when empty.
    pub fn all<I: IntoIterator<Item = Predicate>>(predicates: I) -> Predicate {
        predicates
            .into_iter()
            .fold(Predicate::True, |acc, p| acc.and(p))
    }

    /// Whether the predicate trivially matches every row.
    pub fn is_true(&self) -> bool {
        match self {
            Predicate::True => true,
            Predicate::And(ps) => ps.iter().all(Predicate::is_true),
            Predicate::Or(ps) => ps.iter().any(Predicate::is_true),
            _ => false,
        }
    }

    /// Evaluate against a summary row.
    ///
    /// Follows SQL semantics for missing values: a comparison against a NULL
    /// column is false.
    pub fn matches(&self, row: &StationSummary) -> bool {
        match self {
            Predicate::True => true,
            Predicate::Compare { column, op, value } => match value {
                Value::Timestamp(t) => column
                    .timestamp(row)
                    .map_or(false, |actual| op.holds(&actual, t)),
                Value::Text(s) => column
                    .text(row)
                    .map_or(false, |actual| op.holds(&actual, &s.as_str())),
            },
            Predicate::In { column, values } => column
                .text(row)
                .map_or(false, |actual| values.iter().any(|v| v == actual)),
            Predicate::Like { column, pattern } => column
                .text(row)
                .map_or(false, |actual| like_matches(pattern, actual)),
            Predicate::VarsOverlap { ids } => {
                let vars = row.variable_ids();
                ids.iter().any(|id| vars.contains(&id.as_str()))
            }
            Predicate::Intersects(geometry) => match (row.lon, row.lat) {
                (Some(lon), Some(lat)) => geometry.intersects_point(lon, lat),
                _ => false,
            },
            Predicate::And(ps) => ps.iter().all(|p| p.matches(row)),
            Predicate::Or(ps) => ps.iter().any(|p| p.matches(row)),
            Predicate::Not(p) => !p.matches(row),
        }
    }
}

/// SQL `LIKE` matching: `%` matches any run of characters, `_` exactly one.
pub fn like_matches(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    // Greedy matching with backtracking to the last `%`.
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) && p[pi] != '%' {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '%')
}
