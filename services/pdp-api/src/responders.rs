//! Archive entry producers for aggregate downloads.
//!
//! Each selected network contributes a `variables.csv` listing, each selected
//! station a table of its observations. Producers are lazy: nothing touches
//! the catalog until the archive stream pulls the entry.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use catalog::{NetworkVariable, Observation, StationCatalog};
use chrono::NaiveDateTime;
use futures::StreamExt;
use pdp_common::{ClipDates, StationKey};
use zip_stream::{ArchiveError, AsyncArchiveEntry};

/// Table rows are handed to the archive in chunks of about this size.
const FLUSH_BYTES: usize = 64 * 1024;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Output format of station tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Ascii,
}

impl DataFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "csv" => Some(DataFormat::Csv),
            "ascii" => Some(DataFormat::Ascii),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DataFormat::Csv => "csv",
            DataFormat::Ascii => "ascii",
        }
    }

    fn separator(&self) -> &'static str {
        match self {
            DataFormat::Csv => ",",
            DataFormat::Ascii => ", ",
        }
    }
}

/// Quote a CSV field when it contains a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render a network's variable listing.
pub fn render_metadata(variables: &[NetworkVariable]) -> String {
    let mut out = String::from("variable,standard_name,cell_method,unit\n");
    for v in variables {
        let fields = [
            Some(v.variable.as_str()),
            v.standard_name.as_deref(),
            v.cell_method.as_deref(),
            v.unit.as_deref(),
        ];
        let line: Vec<String> = fields
            .iter()
            .map(|f| csv_field(f.unwrap_or("")))
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Pivots a time-ordered observation stream into one row per timestamp with
/// a column per variable.
#[derive(Debug)]
pub struct TableWriter {
    format: DataFormat,
    columns: HashMap<String, usize>,
    time: Option<NaiveDateTime>,
    row: Vec<Option<f64>>,
    buf: String,
}

impl TableWriter {
    /// Start a table; the header is buffered immediately.
    pub fn new(format: DataFormat, station: &StationKey, variables: &[String]) -> Self {
        let sep = format.separator();
        let mut buf = String::new();
        if format == DataFormat::Ascii {
            buf.push_str(&format!("Dataset: {}\n", station));
        }
        buf.push_str("time");
        for v in variables {
            buf.push_str(sep);
            buf.push_str(&csv_field(v));
        }
        buf.push('\n');

        Self {
            format,
            columns: variables
                .iter()
                .enumerate()
                .map(|(i, v)| (v.clone(), i))
                .collect(),
            time: None,
            row: vec![None; variables.len()],
            buf,
        }
    }

    /// Add one observation. Observations must arrive ordered by time; values
    /// for variables outside the header are skipped.
    pub fn push(&mut self, obs: Observation) {
        if self.time != Some(obs.obs_time) {
            self.flush_row();
            self.time = Some(obs.obs_time);
        }
        if let Some(&i) = self.columns.get(&obs.variable) {
            self.row[i] = Some(obs.datum);
        }
    }

    /// Buffered bytes, once there are enough to be worth a chunk.
    pub fn take_full(&mut self) -> Option<Bytes> {
        (self.buf.len() >= FLUSH_BYTES).then(|| Bytes::from(std::mem::take(&mut self.buf)))
    }

    /// Everything still buffered, including the pending row.
    pub fn finish(mut self) -> Bytes {
        self.flush_row();
        Bytes::from(self.buf)
    }

    fn flush_row(&mut self) {
        let Some(time) = self.time.take() else {
            return;
        };
        let sep = self.format.separator();
        self.buf.push_str(&time.format(TIME_FORMAT).to_string());
        for value in self.row.iter_mut() {
            self.buf.push_str(sep);
            if let Some(v) = value.take() {
                self.buf.push_str(&v.to_string());
            }
        }
        self.buf.push('\n');
    }
}

/// `{network}/variables.csv`
pub fn metadata_entry(
    catalog: Arc<dyn StationCatalog>,
    network: String,
    climatology: bool,
) -> AsyncArchiveEntry {
    let name = StationKey::metadata_archive_name(&network);
    let producer = async_stream::stream! {
        match catalog.network_variables(&network, climatology).await {
            Ok(variables) => {
                yield Ok(Bytes::from(render_metadata(&variables)));
            }
            Err(e) => {
                yield Err(ArchiveError::source(e));
            }
        }
    };
    AsyncArchiveEntry::new(name, producer)
}

/// `{network}/{native_id}.{ext}`
pub fn station_entry(
    catalog: Arc<dyn StationCatalog>,
    station: StationKey,
    format: DataFormat,
    climatology: bool,
    clip: ClipDates,
) -> AsyncArchiveEntry {
    let name = station.archive_name(format.extension());
    let producer = async_stream::stream! {
        let variables = match catalog.station_variables(&station, climatology).await {
            Ok(variables) => variables,
            Err(e) => {
                yield Err(ArchiveError::source(e));
                return;
            }
        };

        let mut table = TableWriter::new(format, &station, &variables);
        let mut observations = catalog.observations(&station, climatology, clip);
        while let Some(obs) = observations.next().await {
            match obs {
                Ok(obs) => table.push(obs),
                Err(e) => {
                    yield Err(ArchiveError::source(e));
                    return;
                }
            }
            if let Some(chunk) = table.take_full() {
                yield Ok(chunk);
            }
        }
        yield Ok(table.finish());
    };
    AsyncArchiveEntry::new(name, producer)
}

/// Entries for an aggregate download: one metadata listing per distinct
/// network (sorted), then one table per station in listing order.
pub fn aggregate_entries(
    catalog: Arc<dyn StationCatalog>,
    stations: &[StationKey],
    format: DataFormat,
    climatology: bool,
    clip: ClipDates,
) -> Vec<AsyncArchiveEntry> {
    let networks: BTreeSet<&str> = stations.iter().map(|s| s.network_name.as_str()).collect();

    let metadata = networks
        .into_iter()
        .map(|net| metadata_entry(Arc::clone(&catalog), net.to_string(), climatology));
    let tables = stations.iter().map(|s| {
        station_entry(Arc::clone(&catalog), s.clone(), format, climatology, clip)
    });
    metadata.chain(tables).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::ts;

    fn key() -> StationKey {
        StationKey::new("EC_raw", "1046332")
    }

    #[test]
    fn test_data_format_extensions() {
        assert_eq!(DataFormat::from_extension("csv"), Some(DataFormat::Csv));
        assert_eq!(DataFormat::from_extension("ascii"), Some(DataFormat::Ascii));
        assert_eq!(DataFormat::from_extension("xls"), None);
        assert_eq!(DataFormat::Ascii.extension(), "ascii");
    }

    #[test]
    fn test_render_metadata() {
        let vars = vec![
            NetworkVariable::new("MAX_TEMP", "air_temperature", "time: maximum", "celsius"),
            NetworkVariable {
                variable: "PRECIP".to_string(),
                standard_name: Some("lwe_thickness_of_precipitation_amount".to_string()),
                cell_method: Some("time: sum, interval: 1 day".to_string()),
                unit: None,
            },
        ];
        assert_eq!(
            render_metadata(&vars),
            "variable,standard_name,cell_method,unit\n\
             MAX_TEMP,air_temperature,time: maximum,celsius\n\
             PRECIP,lwe_thickness_of_precipitation_amount,\"time: sum, interval: 1 day\",\n"
        );
    }

    #[test]
    fn test_table_pivots_by_time() {
        let vars = vec!["MAX_TEMP".to_string(), "MIN_TEMP".to_string()];
        let mut table = TableWriter::new(DataFormat::Csv, &key(), &vars);
        table.push(Observation::new(ts(2000, 1, 1), "MAX_TEMP", 4.0));
        table.push(Observation::new(ts(2000, 1, 1), "MIN_TEMP", -2.0));
        table.push(Observation::new(ts(2000, 1, 2), "MIN_TEMP", -3.5));
        table.push(Observation::new(ts(2000, 1, 2), "UNLISTED", 1.0));

        let out = table.finish();
        assert_eq!(
            std::str::from_utf8(&out).unwrap(),
            "time,MAX_TEMP,MIN_TEMP\n\
             2000-01-01 00:00:00,4,-2\n\
             2000-01-02 00:00:00,,-3.5\n"
        );
    }

    #[test]
    fn test_ascii_table() {
        let vars = vec!["TEMP".to_string()];
        let mut table = TableWriter::new(DataFormat::Ascii, &key(), &vars);
        table.push(Observation::new(ts(2000, 1, 1), "TEMP", 1.5));
        assert_eq!(
            std::str::from_utf8(&table.finish()).unwrap(),
            "Dataset: EC_raw/1046332\ntime, TEMP\n2000-01-01 00:00:00, 1.5\n"
        );
    }

    #[test]
    fn test_empty_table_is_header_only() {
        let table = TableWriter::new(DataFormat::Csv, &key(), &[]);
        assert_eq!(&table.finish()[..], b"time\n");
    }

    #[test]
    fn test_take_full_waits_for_enough_bytes() {
        let vars = vec!["TEMP".to_string()];
        let mut table = TableWriter::new(DataFormat::Csv, &key(), &vars);
        assert!(table.take_full().is_none());

        let start = ts(2000, 1, 1);
        let mut chunks = Vec::new();
        for minute in 0..5000 {
            let t = start + chrono::Duration::minutes(minute);
            table.push(Observation::new(t, "TEMP", minute as f64));
            if let Some(chunk) = table.take_full() {
                chunks.push(chunk);
            }
        }
        assert!(!chunks.is_empty());
        chunks.push(table.finish());

        let text: String = chunks
            .iter()
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect();
        assert_eq!(text.lines().count(), 5001);
    }
}
