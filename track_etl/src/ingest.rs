//! CSV reader for Movebank-style study exports.

use std::io::Read;
use std::path::Path;

use crate::record::{Dataset, RawRecord};
use crate::EtlError;

pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_LAT: &str = "location-lat";
pub const COL_LON: &str = "location-long";
pub const COL_INDIVIDUAL: &str = "individual-local-identifier";
pub const COL_TAG: &str = "tag-local-identifier";
pub const COL_SPECIES: &str = "individual-taxon-canonical-name";
pub const COL_STUDY: &str = "study-name";

pub const MANDATORY_COLUMNS: [&str; 5] = [COL_TIMESTAMP, COL_LAT, COL_LON, COL_INDIVIDUAL, COL_TAG];

/// Cell values read as missing.
const NA_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-nan", "NULL", "null", "None", "<NA>", "#N/A",
];

/// Dataset key for a source file: the file name up to its first `.`.
pub fn dataset_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_name
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

struct Columns {
    timestamp: usize,
    lat: usize,
    lon: usize,
    individual: usize,
    tag: usize,
    species: Option<usize>,
    study: Option<usize>,
}

impl Columns {
    fn resolve(dataset: &str, headers: &csv::StringRecord) -> Result<Self, EtlError> {
        let find = |column: &str| headers.iter().position(|h| h.trim() == column);
        let require = |column: &'static str| {
            find(column).ok_or_else(|| EtlError::MissingColumn {
                dataset: dataset.to_string(),
                column,
            })
        };
        Ok(Self {
            timestamp: require(COL_TIMESTAMP)?,
            lat: require(COL_LAT)?,
            lon: require(COL_LON)?,
            individual: require(COL_INDIVIDUAL)?,
            tag: require(COL_TAG)?,
            species: find(COL_SPECIES),
            study: find(COL_STUDY),
        })
    }

    fn is_known(&self, idx: usize) -> bool {
        [self.timestamp, self.lat, self.lon, self.individual, self.tag].contains(&idx)
            || self.species == Some(idx)
            || self.study == Some(idx)
    }
}

fn cell(row: &csv::StringRecord, idx: usize) -> Option<&str> {
    row.get(idx).filter(|v| !NA_MARKERS.contains(&v.trim()))
}

fn text(row: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| cell(row, i)).map(str::to_string)
}

fn number(row: &csv::StringRecord, idx: usize) -> Option<f64> {
    cell(row, idx)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Reads one study export. The five mandatory columns must be present in
/// the header; individual cells may still be empty. Unrecognised columns are
/// kept as passthrough fields.
pub fn read_dataset<R: Read>(name: &str, reader: R) -> Result<Dataset, EtlError> {
    let csv_err = |source: csv::Error| EtlError::Csv {
        dataset: name.to_string(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers().map_err(csv_err)?.clone();
    let columns = Columns::resolve(name, &headers)?;

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row.map_err(csv_err)?;
        let extra = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !columns.is_known(*i))
            .map(|(i, h)| (h.to_string(), row.get(i).unwrap_or_default().to_string()))
            .collect();
        records.push(RawRecord {
            timestamp: text(&row, Some(columns.timestamp)),
            lat: number(&row, columns.lat),
            lon: number(&row, columns.lon),
            individual_id: text(&row, Some(columns.individual)),
            tag_id: text(&row, Some(columns.tag)),
            species: text(&row, columns.species),
            study_name: text(&row, columns.study),
            extra,
        });
    }
    Ok(Dataset::new(name, records))
}
