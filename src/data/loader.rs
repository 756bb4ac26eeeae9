use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::model::{Dataset, FieldValue, ModelYear, Record, Schema};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Load failures are fatal: the dataset stays unset and the message is shown
/// in the status bar. Rows with missing required fields are not errors; the
/// loader drops them and keeps going.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),
    #[error("missing required column: {0}")]
    MissingColumn(&'static str),
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a registration dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – delimited text with a header row (the format the export
///                round-trips with)
/// * `.json`    – records-oriented array of objects
/// * `.parquet` – flat columnar table
pub fn load_file(path: &Path) -> Result<Dataset, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => {
            let file = File::open(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            load_csv(BufReader::new(file))
        }
        "json" => {
            let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            load_json(&text)
        }
        "parquet" | "pq" => load_parquet(path),
        other => Err(LoadError::UnsupportedExtension(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Schema detection
// ---------------------------------------------------------------------------

const MAKE_ALIASES: &[&str] = &["make", "manufacturer"];
const MODEL_ALIASES: &[&str] = &["model"];
const YEAR_ALIASES: &[&str] = &["model year", "year"];
const TYPE_ALIASES: &[&str] = &["electric vehicle type", "vehicle type", "ev type"];
const COUNTRY_ALIASES: &[&str] = &["country"];
const CITY_ALIASES: &[&str] = &["city"];

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.contains(&h.trim().to_ascii_lowercase().as_str()))
}

/// Recognize column roles in the header row. Required roles missing at this
/// level fail the whole load; country and city are optional dimensions, and
/// the range series is the first column whose name contains "range"
/// (case-insensitive), skipping the already-assigned roles.
pub fn detect_schema(headers: Vec<String>) -> Result<Schema, LoadError> {
    let make = find_column(&headers, MAKE_ALIASES).ok_or(LoadError::MissingColumn("Make"))?;
    let model = find_column(&headers, MODEL_ALIASES).ok_or(LoadError::MissingColumn("Model"))?;
    let year =
        find_column(&headers, YEAR_ALIASES).ok_or(LoadError::MissingColumn("Model Year"))?;
    let vehicle_type = find_column(&headers, TYPE_ALIASES)
        .ok_or(LoadError::MissingColumn("Electric Vehicle Type"))?;
    let country = find_column(&headers, COUNTRY_ALIASES);
    let city = find_column(&headers, CITY_ALIASES);

    let named = [make, model, year, vehicle_type];
    let range = headers
        .iter()
        .enumerate()
        .find(|(i, h)| !named.contains(i) && h.to_ascii_lowercase().contains("range"))
        .map(|(i, _)| i);

    Ok(Schema {
        columns: headers,
        make,
        model,
        year,
        vehicle_type,
        country,
        city,
        range,
    })
}

// ---------------------------------------------------------------------------
// Row assembly (shared by all formats)
// ---------------------------------------------------------------------------

/// Build the dataset from typed cell rows. Rows whose make, model year, or
/// vehicle type is missing or unparseable are dropped, not errors.
fn assemble(schema: Schema, rows: Vec<Vec<FieldValue>>) -> Dataset {
    let mut records = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;

    for cells in &rows {
        match record_from_cells(&schema, cells) {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        log::warn!("dropped {dropped} rows missing make, model year, or vehicle type");
    }

    Dataset::from_records(schema, records, dropped)
}

fn record_from_cells(schema: &Schema, cells: &[FieldValue]) -> Option<Record> {
    let make = cell_to_string(cells.get(schema.make)?)?;
    let vehicle_type = cell_to_string(cells.get(schema.vehicle_type)?)?;
    let model_year = cells
        .get(schema.year)
        .and_then(cell_to_year)
        .and_then(ModelYear::new)?;
    let model = cells
        .get(schema.model)
        .and_then(cell_to_string)
        .unwrap_or_default();
    let country = schema
        .country
        .and_then(|i| cells.get(i))
        .and_then(cell_to_string);
    let city = schema
        .city
        .and_then(|i| cells.get(i))
        .and_then(cell_to_string);
    let electric_range = schema
        .range
        .and_then(|i| cells.get(i))
        .and_then(FieldValue::as_f64);

    let mut extra = BTreeMap::new();
    for (i, name) in schema.columns.iter().enumerate() {
        let is_role = [schema.make, schema.model, schema.year, schema.vehicle_type].contains(&i)
            || [schema.country, schema.city, schema.range].contains(&Some(i));
        if is_role {
            continue;
        }
        extra.insert(
            name.clone(),
            cells.get(i).cloned().unwrap_or(FieldValue::Null),
        );
    }

    Some(Record {
        make,
        model,
        model_year,
        vehicle_type,
        country,
        city,
        electric_range,
        extra,
    })
}

/// A cell read as text, whatever type the source gave it. Blank strings count
/// as missing (a Fiat "500" arrives as an integer cell and must survive).
fn cell_to_string(cell: &FieldValue) -> Option<String> {
    match cell {
        FieldValue::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Float(v) => Some(v.to_string()),
        FieldValue::Null => None,
    }
}

fn cell_to_year(cell: &FieldValue) -> Option<i32> {
    match cell {
        FieldValue::Integer(i) => i32::try_from(*i).ok(),
        FieldValue::Float(v) if v.fract() == 0.0 => Some(*v as i32),
        FieldValue::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Load delimited text with a header row. Cells are typed by inspection:
/// integer, then float, otherwise string; empty means null.
pub fn load_csv<R: Read>(reader: R) -> Result<Dataset, LoadError> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let schema = detect_schema(headers)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(guess_cell).collect());
    }

    Ok(assemble(schema, rows))
}

fn guess_cell(s: &str) -> FieldValue {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return FieldValue::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return FieldValue::Integer(i);
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        return FieldValue::Float(v);
    }
    FieldValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   { "Make": "TESLA", "Model": "Model 3", "Model Year": 2019, ... },
///   ...
/// ]
/// ```
///
/// The first object's keys stand in for the header row.
pub fn load_json(text: &str) -> Result<Dataset, LoadError> {
    let root: Vec<serde_json::Map<String, JsonValue>> = serde_json::from_str(text)?;
    let first = root
        .first()
        .ok_or_else(|| LoadError::Malformed("expected a non-empty array of objects".into()))?;

    let headers: Vec<String> = first.keys().cloned().collect();
    let schema = detect_schema(headers)?;

    let rows = root
        .iter()
        .map(|obj| {
            schema
                .columns
                .iter()
                .map(|name| obj.get(name).map(json_to_field).unwrap_or(FieldValue::Null))
                .collect()
        })
        .collect();

    Ok(assemble(schema, rows))
}

fn json_to_field(value: &JsonValue) -> FieldValue {
    match value {
        JsonValue::String(s) => FieldValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                FieldValue::Integer(i)
            } else if let Some(v) = n.as_f64() {
                FieldValue::Float(v)
            } else {
                FieldValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => FieldValue::String(b.to_string()),
        JsonValue::Null => FieldValue::Null,
        other => FieldValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one flat column per source field. Works with
/// files written by both Pandas (`df.to_parquet()`) and Polars
/// (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Dataset, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let schema = detect_schema(headers)?;

    let reader = builder.build()?;
    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        for row in 0..batch.num_rows() {
            rows.push(
                (0..batch.num_columns())
                    .map(|col| arrow_cell(batch.column(col), row))
                    .collect(),
            );
        }
    }

    Ok(assemble(schema, rows))
}

/// Extract a single cell from an Arrow column at a given row.
fn arrow_cell(col: &Arc<dyn Array>, row: usize) -> FieldValue {
    if col.is_null(row) {
        return FieldValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => {
            if let Some(s) = col.as_any().downcast_ref::<StringArray>() {
                FieldValue::String(s.value(row).to_string())
            } else {
                // LargeStringArray
                let s = col.as_string::<i64>();
                FieldValue::String(s.value(row).to_string())
            }
        }
        DataType::Int16 => {
            let arr = col.as_any().downcast_ref::<Int16Array>();
            arr.map_or(FieldValue::Null, |a| {
                FieldValue::Integer(a.value(row) as i64)
            })
        }
        DataType::Int32 => {
            let arr = col.as_any().downcast_ref::<Int32Array>();
            arr.map_or(FieldValue::Null, |a| {
                FieldValue::Integer(a.value(row) as i64)
            })
        }
        DataType::Int64 => {
            let arr = col.as_any().downcast_ref::<Int64Array>();
            arr.map_or(FieldValue::Null, |a| FieldValue::Integer(a.value(row)))
        }
        DataType::Float32 => {
            let arr = col.as_any().downcast_ref::<Float32Array>();
            arr.map_or(FieldValue::Null, |a| FieldValue::Float(a.value(row) as f64))
        }
        DataType::Float64 => {
            let arr = col.as_any().downcast_ref::<Float64Array>();
            arr.map_or(FieldValue::Null, |a| FieldValue::Float(a.value(row)))
        }
        DataType::Boolean => {
            let arr = col.as_any().downcast_ref::<BooleanArray>();
            arr.map_or(FieldValue::Null, |a| {
                FieldValue::String(a.value(row).to_string())
            })
        }
        _ => FieldValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_CSV: &str = "\
Make,Model,Model Year,Electric Vehicle Type,Electric Range,Country,City,DOL Vehicle ID
TESLA,Model 3,2018,Battery Electric Vehicle (BEV),215,USA,Seattle,101
NISSAN,Leaf,2019,Battery Electric Vehicle (BEV),150,USA,Bellevue,102
TESLA,Model Y,2019,Battery Electric Vehicle (BEV),230,Norway,Oslo,103
BMW,i3,2020,Battery Electric Vehicle (BEV),,USA,Seattle,104
TOYOTA,Prius Prime,2020,Plug-in Hybrid Electric Vehicle (PHEV),25,Norway,Bergen,105
";

    #[test]
    fn loads_csv_with_recognized_roles() {
        let dataset = load_csv(BASE_CSV.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.dropped, 0);
        assert_eq!(dataset.year_bounds, Some((2018, 2020)));
        assert_eq!(dataset.schema.range_column(), Some("Electric Range"));
        assert!(dataset.has_country());
        assert!(dataset.has_city());

        let first = &dataset.records[0];
        assert_eq!(first.make, "TESLA");
        assert_eq!(first.model, "Model 3");
        assert_eq!(first.model_year.year(), 2018);
        assert_eq!(first.electric_range, Some(215.0));
        assert_eq!(first.country.as_deref(), Some("USA"));
        assert_eq!(
            first.extra.get("DOL Vehicle ID"),
            Some(&FieldValue::Integer(101))
        );
    }

    #[test]
    fn drops_rows_missing_required_fields() {
        let csv = "\
Make,Model,Model Year,Electric Vehicle Type
TESLA,Model 3,2019,Battery Electric Vehicle (BEV)
,Leaf,2019,Battery Electric Vehicle (BEV)
KIA,Niro,n/a,Battery Electric Vehicle (BEV)
KIA,Niro,2021,
FORD,Mustang Mach-E,2021,Battery Electric Vehicle (BEV)
";
        let dataset = load_csv(csv.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dropped, 3);
    }

    #[test]
    fn blank_model_is_kept_as_empty() {
        let csv = "\
Make,Model,Model Year,Electric Vehicle Type
TESLA,,2019,Battery Electric Vehicle (BEV)
";
        let dataset = load_csv(csv.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records[0].model, "");
    }

    #[test]
    fn numeric_model_names_survive() {
        let csv = "\
Make,Model,Model Year,Electric Vehicle Type
FIAT,500,2020,Battery Electric Vehicle (BEV)
";
        let dataset = load_csv(csv.as_bytes()).unwrap();
        assert_eq!(dataset.records[0].model, "500");
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let csv = "Make,Model,Electric Vehicle Type\nTESLA,Model 3,BEV\n";
        let err = load_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn("Model Year")));
    }

    #[test]
    fn header_aliases_are_recognized() {
        let csv = "\
Manufacturer,Model,Year,Vehicle Type
TESLA,Model 3,2019,BEV
";
        let dataset = load_csv(csv.as_bytes()).unwrap();
        assert_eq!(dataset.records[0].make, "TESLA");
        assert_eq!(dataset.records[0].model_year.year(), 2019);
        assert_eq!(dataset.records[0].vehicle_type, "BEV");
    }

    #[test]
    fn first_range_like_column_wins() {
        let headers = vec![
            "Make".to_string(),
            "Model".to_string(),
            "Model Year".to_string(),
            "Electric Vehicle Type".to_string(),
            "Range Class".to_string(),
            "Electric Range".to_string(),
        ];
        let schema = detect_schema(headers).unwrap();
        assert_eq!(schema.range, Some(4));
        assert_eq!(schema.range_column(), Some("Range Class"));
    }

    #[test]
    fn country_and_city_are_optional() {
        let csv = "\
Make,Model,Model Year,Electric Vehicle Type
TESLA,Model 3,2019,BEV
";
        let dataset = load_csv(csv.as_bytes()).unwrap();
        assert!(!dataset.has_country());
        assert!(!dataset.has_city());
        assert_eq!(dataset.schema.range, None);
    }

    #[test]
    fn json_records_match_csv_equivalent() {
        let json = r#"[
            {"Make": "TESLA", "Model": "Model 3", "Model Year": 2018,
             "Electric Vehicle Type": "Battery Electric Vehicle (BEV)",
             "Electric Range": 215, "Country": "USA", "City": "Seattle",
             "DOL Vehicle ID": 101},
            {"Make": null, "Model": "Leaf", "Model Year": 2019,
             "Electric Vehicle Type": "Battery Electric Vehicle (BEV)",
             "Electric Range": 150, "Country": "USA", "City": "Bellevue",
             "DOL Vehicle ID": 102}
        ]"#;
        let dataset = load_json(json).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.dropped, 1);
        assert_eq!(dataset.records[0].make, "TESLA");
        assert_eq!(dataset.records[0].electric_range, Some(215.0));
    }

    #[test]
    fn empty_json_array_is_malformed() {
        assert!(matches!(load_json("[]"), Err(LoadError::Malformed(_))));
    }

    #[test]
    fn arrow_cells_convert_per_type() {
        let strings: Arc<dyn Array> = Arc::new(StringArray::from(vec![Some("TESLA"), None]));
        let ints: Arc<dyn Array> = Arc::new(Int64Array::from(vec![2019]));
        let floats: Arc<dyn Array> = Arc::new(Float64Array::from(vec![215.0]));

        assert_eq!(
            arrow_cell(&strings, 0),
            FieldValue::String("TESLA".to_string())
        );
        assert_eq!(arrow_cell(&strings, 1), FieldValue::Null);
        assert_eq!(arrow_cell(&ints, 0), FieldValue::Integer(2019));
        assert_eq!(arrow_cell(&floats, 0), FieldValue::Float(215.0));
    }
}
