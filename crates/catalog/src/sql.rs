//! Rendering filter predicates into parameterised SQL.
//!
//! Every user-supplied value is bound; only column names and operators from
//! the closed `Column`/`CompareOp` sets are pushed as text.

use sqlx::{Postgres, QueryBuilder};
use station_filters::{Predicate, Value};

/// Summary view the station filters apply to.
pub const STATION_VIEW: &str = "crmp_network_geoserver";

/// Restricts a station query to networks flagged for publication.
const PUBLISHED_NETWORKS: &str =
    "network_name IN (SELECT network_name FROM meta_network WHERE publish)";

/// Splits the collapsed `vars` column into identifiers.
const VARS_ARRAY: &str = r"regexp_split_to_array(vars, ',\s*')";

/// Append `predicate` to the query.
pub fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
    match predicate {
        Predicate::True => {
            qb.push("TRUE");
        }
        Predicate::Compare { column, op, value } => {
            qb.push(column.sql_name()).push(" ").push(op.sql()).push(" ");
            push_value(qb, value);
        }
        Predicate::In { column, values } => {
            if values.is_empty() {
                qb.push("FALSE");
                return;
            }
            qb.push(column.sql_name()).push(" IN (");
            let mut list = qb.separated(", ");
            for value in values {
                list.push_bind(value.clone());
            }
            list.push_unseparated(")");
        }
        Predicate::Like { column, pattern } => {
            qb.push(column.sql_name())
                .push(" LIKE ")
                .push_bind(pattern.clone());
        }
        Predicate::VarsOverlap { ids } => {
            qb.push(VARS_ARRAY).push(" && ").push_bind(ids.clone());
        }
        Predicate::Intersects(geometry) => {
            qb.push("ST_Intersects(ST_GeomFromText(")
                .push_bind(geometry.wkt.clone())
                .push(", ")
                .push_bind(geometry.srid)
                .push("), the_geom)");
        }
        Predicate::And(ps) => push_joined(qb, ps, " AND ", "TRUE"),
        Predicate::Or(ps) => push_joined(qb, ps, " OR ", "FALSE"),
        Predicate::Not(p) => {
            qb.push("NOT (");
            push_predicate(qb, p);
            qb.push(")");
        }
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &Value) {
    match value {
        Value::Text(s) => qb.push_bind(s.clone()),
        Value::Timestamp(t) => qb.push_bind(*t),
    };
}

fn push_joined(
    qb: &mut QueryBuilder<'_, Postgres>,
    predicates: &[Predicate],
    separator: &str,
    empty: &str,
) {
    if predicates.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (i, p) in predicates.iter().enumerate() {
        if i > 0 {
            qb.push(separator);
        }
        push_predicate(qb, p);
    }
    qb.push(")");
}

/// Append a `WHERE` clause AND-ing every predicate, plus the publication
/// restriction when requested. Appends nothing when there is nothing to
/// filter on.
pub fn push_station_filter(
    qb: &mut QueryBuilder<'_, Postgres>,
    predicates: &[Predicate],
    published_only: bool,
) {
    let mut keyword = " WHERE ";
    for p in predicates {
        qb.push(keyword).push("(");
        push_predicate(qb, p);
        qb.push(")");
        keyword = " AND ";
    }
    if published_only {
        qb.push(keyword).push(PUBLISHED_NETWORKS);
    }
}

/// `SELECT <columns> FROM crmp_network_geoserver WHERE ...`
pub fn station_query<'a>(
    columns: &str,
    predicates: &[Predicate],
    published_only: bool,
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM {}", columns, STATION_VIEW));
    push_station_filter(&mut qb, predicates, published_only);
    qb
}
