//! WKT polygon validation and parsing.
//!
//! The portal map sends the user's selection as a WKT `POLYGON` or
//! `MULTIPOLYGON`. Validation uses a regular expression that mirrors the
//! subset of WKT grammar the map produces (it is not a full WKT parser):
//! every ring has at least three points, a polygon has an outer ring and at
//! most one inner ring.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing polygon text.
#[derive(Debug, Error, PartialEq)]
pub enum WktError {
    /// Text does not follow the POLYGON/MULTIPOLYGON grammar.
    #[error("Invalid WKT format: {0}")]
    InvalidWkt(String),

    /// Invalid coordinate value.
    #[error("Invalid coordinate value: {0}")]
    InvalidCoordinate(String),
}

/// Build the polygon/multipolygon validation pattern (unanchored).
pub fn polygon_pattern() -> String {
    let decimal = r"-?[0-9]+(\.[0-9]+)?";
    let point = format!("{decimal} {decimal}");
    let inner = format!(r"\({point}(, ?{point}){{2,}}\)");
    let outer = &inner;
    let single_polygon = format!(r"\({outer}(, ?{inner})?\)");
    let multipolygon = format!(r"MULTIPOLYGON ?\({single_polygon}(, ?{single_polygon})*\)");
    let polygon = format!(r"POLYGON {single_polygon}");
    format!("({polygon}|{multipolygon})")
}

static POLYGON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^(?:{})$", polygon_pattern())).expect("polygon pattern is valid")
});

/// Whether `wkt` is an acceptable portal polygon.
pub fn is_valid_polygon(wkt: &str) -> bool {
    POLYGON_RE.is_match(wkt)
}

/// A polygon: one exterior ring and any number of holes, as (lon, lat) pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<(f64, f64)>,
    pub holes: Vec<Vec<(f64, f64)>>,
}

impl Polygon {
    /// Check if a point is inside the polygon (and outside all holes).
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        ring_contains(&self.exterior, lon, lat)
            && !self.holes.iter().any(|h| ring_contains(h, lon, lat))
    }
}

/// Ray casting point-in-ring test.
fn ring_contains(ring: &[(f64, f64)], lon: f64, lat: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;

    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];

        if ((yi > lat) != (yj > lat)) && (lon < (xj - xi) * (lat - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// A validated polygon selection: the original WKT (sent to the database
/// as-is) plus its parsed rings for in-memory evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub wkt: String,
    pub srid: i32,
    pub polygons: Vec<Polygon>,
}

impl Geometry {
    /// Parse a WKT POLYGON or MULTIPOLYGON string.
    ///
    /// Accepts formats:
    /// - `POLYGON ((lon1 lat1, lon2 lat2, lon3 lat3, lon1 lat1))`
    /// - `MULTIPOLYGON(((ring1)),((ring2)))`
    pub fn parse(wkt: &str, srid: i32) -> Result<Self, WktError> {
        let trimmed = wkt.trim();
        let upper = trimmed.to_uppercase();

        let polygons = if let Some(body) = upper.strip_prefix("MULTIPOLYGON") {
            let list = single_group(body)?;
            top_level_groups(list)?
                .into_iter()
                .map(parse_polygon_body)
                .collect::<Result<Vec<_>, _>>()?
        } else if let Some(body) = upper.strip_prefix("POLYGON") {
            vec![parse_polygon_body(single_group(body)?)?]
        } else {
            return Err(WktError::InvalidWkt(
                "Expected POLYGON or MULTIPOLYGON format".to_string(),
            ));
        };

        if polygons.is_empty() {
            return Err(WktError::InvalidWkt(
                "Geometry must contain at least one polygon".to_string(),
            ));
        }

        Ok(Self {
            wkt: trimmed.to_string(),
            srid,
            polygons,
        })
    }

    /// Whether a station location falls inside any of the polygons.
    pub fn intersects_point(&self, lon: f64, lat: f64) -> bool {
        self.polygons.iter().any(|p| p.contains_point(lon, lat))
    }
}

/// Expect exactly one parenthesised group in `s` and return its contents.
fn single_group(s: &str) -> Result<&str, WktError> {
    let groups = top_level_groups(s)?;
    match groups.as_slice() {
        [only] => Ok(only),
        _ => Err(WktError::InvalidWkt(format!(
            "Expected a single parenthesised group, got '{}'",
            s.trim()
        ))),
    }
}

/// Split `s` into the contents of its top-level parenthesised groups.
///
/// `"(a),(b (c))"` yields `["a", "b (c)"]`. Only whitespace and commas are
/// allowed between groups.
fn top_level_groups(s: &str) -> Result<Vec<&str>, WktError> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, ch) in s.char_indices() {
        match ch {
            '(' => {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            }
            ')' => {
                if depth == 0 {
                    return Err(WktError::InvalidWkt("Unbalanced parentheses".to_string()));
                }
                depth -= 1;
                if depth == 0 {
                    groups.push(&s[start..i]);
                }
            }
            c if depth == 0 && !(c == ',' || c.is_whitespace()) => {
                return Err(WktError::InvalidWkt(format!(
                    "Unexpected '{}' outside parentheses",
                    c
                )));
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(WktError::InvalidWkt("Unbalanced parentheses".to_string()));
    }

    Ok(groups)
}

/// Parse `(ring),(ring)...` into a polygon.
fn parse_polygon_body(body: &str) -> Result<Polygon, WktError> {
    let mut rings = top_level_groups(body)?
        .into_iter()
        .map(parse_ring)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    let exterior = rings
        .next()
        .ok_or_else(|| WktError::InvalidWkt("Polygon has no rings".to_string()))?;

    Ok(Polygon {
        exterior,
        holes: rings.collect(),
    })
}

/// Parse a single ring from `lon lat, lon lat, ...`.
fn parse_ring(coords_str: &str) -> Result<Vec<(f64, f64)>, WktError> {
    coords_str
        .split(',')
        .map(|pair| {
            let pair = pair.trim();
            let parts: Vec<&str> = pair.split_whitespace().collect();
            if parts.len() != 2 {
                return Err(WktError::InvalidWkt(format!(
                    "Expected 'lon lat' format, got '{}'",
                    pair
                )));
            }

            let lon: f64 = parts[0]
                .parse()
                .map_err(|_| WktError::InvalidCoordinate(parts[0].to_string()))?;
            let lat: f64 = parts[1]
                .parse()
                .map_err(|_| WktError::InvalidCoordinate(parts[1].to_string()))?;

            Ok((lon, lat))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VANCOUVER_ISLAND: &str = "POLYGON ((-123.240336 50.074796,-122.443323 49.762922,-121.992837 49.416394,-122.235407 48.654034,-123.725474 48.792645,-123.864085 49.728269,-123.240336 50.074796))";

    #[test]
    fn test_pattern_accepts_polygon() {
        assert!(is_valid_polygon(VANCOUVER_ISLAND));
        assert!(is_valid_polygon("POLYGON ((0 0, 1 0, 1 1, 0 0))"));
        assert!(is_valid_polygon("MULTIPOLYGON(((0 0, 1 0, 1 1, 0 0)))"));
    }

    #[test]
    fn test_pattern_requires_space_after_polygon() {
        assert!(!is_valid_polygon("POLYGON((0 0, 1 0, 1 1, 0 0))"));
        // The parser itself is lenient.
        assert!(Geometry::parse("POLYGON((0 0, 1 0, 1 1, 0 0))", 4326).is_ok());
    }

    #[test]
    fn test_pattern_accepts_polygon_with_hole() {
        assert!(is_valid_polygon(
            "POLYGON ((0 0, 10 0, 10 10, 0 0), (1 1, 2 1, 2 2, 1 1))"
        ));
    }

    #[test]
    fn test_pattern_accepts_multipolygon() {
        assert!(is_valid_polygon(
            "MULTIPOLYGON(((0 0, 1 0, 1 1, 0 0)), ((5 5, 6 5, 6 6, 5 5)))"
        ));
    }

    #[test]
    fn test_pattern_rejects_bad_input() {
        // Too few points in ring
        assert!(!is_valid_polygon("POLYGON((0 0, 1 1))"));
        // Not a polygon
        assert!(!is_valid_polygon("POINT(0 0)"));
        // Trailing garbage
        assert!(!is_valid_polygon("POLYGON((0 0, 1 0, 1 1, 0 0)); DROP TABLE"));
        // Lowercase keyword is not produced by the map
        assert!(!is_valid_polygon("polygon((0 0, 1 0, 1 1, 0 0))"));
        assert!(!is_valid_polygon(""));
    }

    #[test]
    fn test_parse_polygon() {
        let g = Geometry::parse(VANCOUVER_ISLAND, 4326).unwrap();
        assert_eq!(g.polygons.len(), 1);
        assert_eq!(g.polygons[0].exterior.len(), 7);
        assert!(g.polygons[0].holes.is_empty());
        assert_eq!(g.polygons[0].exterior[0], (-123.240336, 50.074796));
    }

    #[test]
    fn test_parse_multipolygon_with_hole() {
        let g = Geometry::parse(
            "MULTIPOLYGON(((0 0, 10 0, 10 10, 0 10, 0 0), (4 4, 6 4, 6 6, 4 6, 4 4)), ((20 20, 21 20, 21 21, 20 20)))",
            4326,
        )
        .unwrap();
        assert_eq!(g.polygons.len(), 2);
        assert_eq!(g.polygons[0].holes.len(), 1);

        assert!(g.intersects_point(1.0, 1.0));
        assert!(!g.intersects_point(5.0, 5.0));
        assert!(g.intersects_point(20.8, 20.2));
        assert!(!g.intersects_point(15.0, 15.0));
    }

    #[test]
    fn test_point_in_polygon() {
        let g = Geometry::parse(VANCOUVER_ISLAND, 4326).unwrap();
        // Duncan, BC
        assert!(g.intersects_point(-123.0, 49.2));
        // Prince George, BC
        assert!(!g.intersects_point(-122.75, 53.9));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Geometry::parse("LINESTRING(0 0, 1 1)", 4326).is_err());
        assert!(Geometry::parse("POLYGON((0 0, 1 0, 1 1, 0 0)", 4326).is_err());
        assert!(matches!(
            Geometry::parse("POLYGON((0 x, 1 0, 1 1, 0 0))", 4326),
            Err(WktError::InvalidCoordinate(_))
        ));
    }
}
