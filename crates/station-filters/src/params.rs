//! Request parameter access and the small translators built on top of the
//! filter table: clip dates, output extension and the climatology flag.

use pdp_common::{ClipDates, PortalDate};
use serde::{Deserialize, Serialize};

use crate::filters::{names, FilterRegistry};

/// Parameter that turns the date filters into clipping bounds.
pub const CLIP_TO_DATE: &str = "cliptodate";
/// Requested output format of station data.
pub const DATA_FORMAT: &str = "data-format";
/// Download climatologies instead of raw observations.
pub const DOWNLOAD_CLIMATOLOGY: &str = "download-climatology";

/// Decoded query parameters, in request order, duplicates retained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestParams(Vec<(String, String)>);

impl RequestParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value of `name`; when repeated, the last occurrence wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(k, _)| k == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Clipping bounds for returned observations.
    ///
    /// Without `cliptodate` the date filters only select stations, so both
    /// bounds are `None`. With it, each of `from-date`/`to-date` that passes
    /// the date filter's validation becomes a bound.
    pub fn clip_dates(&self) -> ClipDates {
        if !self.contains(CLIP_TO_DATE) {
            return ClipDates::none();
        }

        let registry = FilterRegistry::global();
        let bound = |name: &str| {
            let value = self.get(name).unwrap_or("");
            registry
                .get(name)
                .and_then(|f| f.validate(value))
                .and_then(|v| PortalDate::parse(v).ok())
                .map(|d| d.start_of_day())
        };

        ClipDates::new(bound(names::FROM_DATE), bound(names::TO_DATE))
    }

    /// The requested `data-format`, if it is one of `supported`.
    pub fn extension<S: AsRef<str>>(&self, supported: &[S]) -> Option<String> {
        let requested = self.get(DATA_FORMAT)?;
        supported
            .iter()
            .any(|s| s.as_ref() == requested)
            .then(|| requested.to_string())
    }

    /// Whether climatologies were requested instead of raw observations.
    pub fn wants_climatology(&self) -> bool {
        self.contains(DOWNLOAD_CLIMATOLOGY)
    }
}

impl From<Vec<(String, String)>> for RequestParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}
