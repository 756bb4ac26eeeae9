use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

// ---------------------------------------------------------------------------
// FieldValue – a single cell in a passthrough column or result table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value. Passthrough columns keep whatever type the
/// source file carried; aggregation result tables reuse the same enum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{s}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            // Empty, not a sentinel: Display feeds table cells and CSV export.
            FieldValue::Null => Ok(()),
        }
    }
}

impl FieldValue {
    /// Try to interpret the value as an `f64` for numeric series.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

// ---------------------------------------------------------------------------
// ModelYear – a model year anchored to Jan 1
// ---------------------------------------------------------------------------

/// A vehicle model year, normalized to January 1 of that year so it compares
/// and buckets like any other date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelYear(NaiveDate);

impl ModelYear {
    /// `None` if the year is outside the representable calendar range.
    pub fn new(year: i32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, 1, 1).map(ModelYear)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for ModelYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.year())
    }
}

// ---------------------------------------------------------------------------
// Record – one vehicle registration (one row of the source table)
// ---------------------------------------------------------------------------

/// A single registration row. `make`, `model_year`, and `vehicle_type` are
/// guaranteed non-empty after loading; rows where they are missing get
/// dropped by the loader. `model` may be blank when the source cell was.
#[derive(Debug, Clone)]
pub struct Record {
    pub make: String,
    pub model: String,
    pub model_year: ModelYear,
    pub vehicle_type: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub electric_range: Option<f64>,
    /// Columns not used by any aggregation: column_name → value.
    pub extra: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Render the cell for a source column, used by the preview table and the
    /// CSV export. Missing optional values render as the empty string.
    pub fn cell_text(&self, schema: &Schema, col: usize) -> String {
        if col == schema.make {
            self.make.clone()
        } else if col == schema.model {
            self.model.clone()
        } else if col == schema.year {
            self.model_year.to_string()
        } else if col == schema.vehicle_type {
            self.vehicle_type.clone()
        } else if Some(col) == schema.country {
            self.country.clone().unwrap_or_default()
        } else if Some(col) == schema.city {
            self.city.clone().unwrap_or_default()
        } else if Some(col) == schema.range {
            self.electric_range
                .map(|v| format!("{v}"))
                .unwrap_or_default()
        } else {
            schema
                .columns
                .get(col)
                .and_then(|name| self.extra.get(name))
                .map(|v| v.to_string())
                .unwrap_or_default()
        }
    }
}

// ---------------------------------------------------------------------------
// Schema – source columns and their detected roles
// ---------------------------------------------------------------------------

/// The source header row plus the column roles recognized at load time.
/// Role detection happens exactly once; every consumer (filters, aggregations,
/// export) goes through these indices instead of re-scanning headers.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Header names in source order.
    pub columns: Vec<String>,
    pub make: usize,
    pub model: usize,
    pub year: usize,
    pub vehicle_type: usize,
    pub country: Option<usize>,
    pub city: Option<usize>,
    /// First column whose name contains "range" (case-insensitive), if any.
    pub range: Option<usize>,
}

impl Schema {
    /// Name of the detected numeric range column.
    pub fn range_column(&self) -> Option<&str> {
        self.range.map(|i| self.columns[i].as_str())
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full parsed dataset with pre-computed filter bounds. Immutable for the
/// lifetime of the session once built.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub schema: Schema,
    /// All registrations (rows), in source order.
    pub records: Vec<Record>,
    /// Rows discarded during load for missing required fields.
    pub dropped: usize,
    /// Min and max model year present; `None` when no rows survived the load.
    pub year_bounds: Option<(i32, i32)>,
    /// Sorted unique values bounding the filter widgets.
    pub makes: BTreeSet<String>,
    pub countries: BTreeSet<String>,
    pub cities: BTreeSet<String>,
}

impl Dataset {
    /// Build filter bounds from the loaded records.
    pub fn from_records(schema: Schema, records: Vec<Record>, dropped: usize) -> Self {
        let mut makes = BTreeSet::new();
        let mut countries = BTreeSet::new();
        let mut cities = BTreeSet::new();
        let mut year_bounds: Option<(i32, i32)> = None;

        for record in &records {
            makes.insert(record.make.clone());
            if let Some(country) = &record.country {
                countries.insert(country.clone());
            }
            if let Some(city) = &record.city {
                cities.insert(city.clone());
            }
            let year = record.model_year.year();
            year_bounds = Some(match year_bounds {
                None => (year, year),
                Some((lo, hi)) => (lo.min(year), hi.max(year)),
            });
        }

        Dataset {
            schema,
            records,
            dropped,
            year_bounds,
            makes,
            countries,
            cities,
        }
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the source schema carries the optional country dimension.
    pub fn has_country(&self) -> bool {
        self.schema.country.is_some()
    }

    /// Whether the source schema carries the optional city dimension.
    pub fn has_city(&self) -> bool {
        self.schema.city.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema {
            columns: vec![
                "Make".to_string(),
                "Model".to_string(),
                "Model Year".to_string(),
                "Electric Vehicle Type".to_string(),
                "Electric Range".to_string(),
                "DOL Vehicle ID".to_string(),
            ],
            make: 0,
            model: 1,
            year: 2,
            vehicle_type: 3,
            country: None,
            city: None,
            range: Some(4),
        }
    }

    fn record() -> Record {
        let mut extra = BTreeMap::new();
        extra.insert("DOL Vehicle ID".to_string(), FieldValue::Integer(4_760_321));
        Record {
            make: "TESLA".to_string(),
            model: "Model 3".to_string(),
            model_year: ModelYear::new(2019).unwrap(),
            vehicle_type: "Battery Electric Vehicle (BEV)".to_string(),
            country: None,
            city: None,
            electric_range: Some(220.0),
            extra,
        }
    }

    #[test]
    fn model_year_orders_like_years() {
        let a = ModelYear::new(2018).unwrap();
        let b = ModelYear::new(2024).unwrap();
        assert!(a < b);
        assert_eq!(a.year(), 2018);
        assert_eq!(a.to_string(), "2018");
    }

    #[test]
    fn model_year_rejects_out_of_range_years() {
        assert!(ModelYear::new(2020).is_some());
        assert!(ModelYear::new(i32::MAX).is_none());
    }

    #[test]
    fn cell_text_covers_every_column_role() {
        let schema = schema();
        let record = record();
        assert_eq!(record.cell_text(&schema, 0), "TESLA");
        assert_eq!(record.cell_text(&schema, 1), "Model 3");
        assert_eq!(record.cell_text(&schema, 2), "2019");
        assert_eq!(
            record.cell_text(&schema, 3),
            "Battery Electric Vehicle (BEV)"
        );
        assert_eq!(record.cell_text(&schema, 4), "220");
        assert_eq!(record.cell_text(&schema, 5), "4760321");
    }

    #[test]
    fn missing_optional_values_render_empty() {
        let schema = schema();
        let mut record = record();
        record.electric_range = None;
        assert_eq!(record.cell_text(&schema, 4), "");
        assert_eq!(FieldValue::Null.to_string(), "");
    }

    #[test]
    fn field_value_as_f64() {
        assert_eq!(FieldValue::Integer(7).as_f64(), Some(7.0));
        assert_eq!(FieldValue::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(FieldValue::String("7".to_string()).as_f64(), None);
        assert_eq!(FieldValue::Null.as_f64(), None);
    }

    #[test]
    fn dataset_precomputes_bounds_and_uniques() {
        let mut second = record();
        second.make = "NISSAN".to_string();
        second.model_year = ModelYear::new(2021).unwrap();
        second.country = Some("Norway".to_string());
        let dataset = Dataset::from_records(schema(), vec![record(), second], 1);

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dropped, 1);
        assert_eq!(dataset.year_bounds, Some((2019, 2021)));
        assert!(dataset.makes.contains("TESLA"));
        assert!(dataset.makes.contains("NISSAN"));
        assert!(dataset.countries.contains("Norway"));
        assert!(!dataset.has_country(), "role absent from schema");
    }
}
