use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use serde::Serialize;

use super::filter::FilteredView;
use super::model::FieldValue;

/// Top-N aggregations keep at most this many rows.
pub const TOP_N: usize = 10;

// ---------------------------------------------------------------------------
// AggregationResult – a small ordered result table
// ---------------------------------------------------------------------------

/// The output of one aggregation: named columns over a handful of rows
/// (categories or year buckets). Produced fresh per pass, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl AggregationResult {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Grouping helpers
// ---------------------------------------------------------------------------

/// Count per key, preserving first-encountered key order so that later
/// sorting by count is stable in the original sense: equal counts keep their
/// encounter order.
fn counted<K, I>(keys: I) -> Vec<(K, u64)>
where
    K: Eq + Hash + Clone,
    I: Iterator<Item = K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, u64)> = Vec::new();
    for key in keys {
        match index.get(&key) {
            Some(&i) => groups[i].1 += 1,
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, 1));
            }
        }
    }
    groups
}

/// Registrations per model year, ascending.
fn year_counts(view: &FilteredView) -> BTreeMap<i32, u64> {
    let mut counts = BTreeMap::new();
    for record in view.records() {
        *counts.entry(record.model_year.year()).or_insert(0) += 1;
    }
    counts
}

// ---------------------------------------------------------------------------
// The catalog
// ---------------------------------------------------------------------------
//
// Each function takes the current FilteredView and produces one small table;
// none depends on another's output. Functions returning Option signal
// "feature unavailable" with None. Callers skip the whole catalog when the
// view is empty.

/// Count of registrations grouped by model year, ascending.
pub fn adoption_by_year(view: &FilteredView) -> AggregationResult {
    AggregationResult {
        columns: vec!["Model Year".to_string(), "Count".to_string()],
        rows: year_counts(view)
            .into_iter()
            .map(|(year, count)| {
                vec![
                    FieldValue::Integer(year as i64),
                    FieldValue::Integer(count as i64),
                ]
            })
            .collect(),
    }
}

/// Count of registrations grouped by vehicle type, for proportion display.
/// None when the view holds no vehicle type values at all.
pub fn share_by_type(view: &FilteredView) -> Option<AggregationResult> {
    let groups = counted(
        view.records()
            .filter(|r| !r.vehicle_type.is_empty())
            .map(|r| r.vehicle_type.clone()),
    );
    if groups.is_empty() {
        return None;
    }
    Some(AggregationResult {
        columns: vec!["Electric Vehicle Type".to_string(), "Count".to_string()],
        rows: groups
            .into_iter()
            .map(|(ty, count)| vec![FieldValue::String(ty), FieldValue::Integer(count as i64)])
            .collect(),
    })
}

/// Top manufacturers by registration count, descending, ties broken by
/// first-encountered order.
pub fn top_makes(view: &FilteredView) -> AggregationResult {
    let mut groups = counted(view.records().map(|r| r.make.clone()));
    groups.sort_by(|a, b| b.1.cmp(&a.1));
    groups.truncate(TOP_N);
    AggregationResult {
        columns: vec!["Make".to_string(), "Count".to_string()],
        rows: groups
            .into_iter()
            .map(|(make, count)| {
                vec![FieldValue::String(make), FieldValue::Integer(count as i64)]
            })
            .collect(),
    }
}

/// Top (make, model) pairs by registration count. Records with a blank model
/// cannot form a group key and are skipped.
pub fn top_models(view: &FilteredView) -> AggregationResult {
    let mut groups = counted(
        view.records()
            .filter(|r| !r.model.is_empty())
            .map(|r| (r.make.clone(), r.model.clone())),
    );
    groups.sort_by(|a, b| b.1.cmp(&a.1));
    groups.truncate(TOP_N);
    AggregationResult {
        columns: vec![
            "Model".to_string(),
            "Make".to_string(),
            "Count".to_string(),
        ],
        rows: groups
            .into_iter()
            .map(|((make, model), count)| {
                vec![
                    FieldValue::String(model),
                    FieldValue::String(make),
                    FieldValue::Integer(count as i64),
                ]
            })
            .collect(),
    }
}

/// Mean of the detected range column per model year, ascending. Years with
/// no range samples are omitted. None when the schema has no range column or
/// the view has no non-null range values.
pub fn avg_range_by_year(view: &FilteredView) -> Option<AggregationResult> {
    let range_column = view.schema().range_column()?.to_string();

    let mut sums: BTreeMap<i32, (f64, u64)> = BTreeMap::new();
    for record in view.records() {
        if let Some(value) = record.electric_range {
            let entry = sums.entry(record.model_year.year()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    if sums.is_empty() {
        return None;
    }

    Some(AggregationResult {
        columns: vec!["Model Year".to_string(), range_column],
        rows: sums
            .into_iter()
            .map(|(year, (sum, n))| {
                vec![
                    FieldValue::Integer(year as i64),
                    FieldValue::Float(sum / n as f64),
                ]
            })
            .collect(),
    })
}

/// Top (make, model) pairs by their maximum range value, descending, ties
/// broken by first-encountered order. Same availability conditions as
/// [`avg_range_by_year`].
pub fn top_models_by_range(view: &FilteredView) -> Option<AggregationResult> {
    let range_column = view.schema().range_column()?.to_string();

    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<((String, String), f64)> = Vec::new();
    for record in view.records() {
        if record.model.is_empty() {
            continue;
        }
        let Some(value) = record.electric_range else {
            continue;
        };
        let key = (record.make.clone(), record.model.clone());
        match index.get(&key) {
            Some(&i) => groups[i].1 = groups[i].1.max(value),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, value));
            }
        }
    }
    if groups.is_empty() {
        return None;
    }

    groups.sort_by(|a, b| b.1.total_cmp(&a.1));
    groups.truncate(TOP_N);
    Some(AggregationResult {
        columns: vec!["Model".to_string(), "Make".to_string(), range_column],
        rows: groups
            .into_iter()
            .map(|((make, model), value)| {
                vec![
                    FieldValue::String(model),
                    FieldValue::String(make),
                    FieldValue::Float(value),
                ]
            })
            .collect(),
    })
}

/// Adoption counts plus a trailing 2-point moving average as a naive
/// projection. The projection is null for the first bucket; a 2-point
/// average needs a predecessor.
pub fn growth_projection(view: &FilteredView) -> AggregationResult {
    let counts: Vec<(i32, u64)> = year_counts(view).into_iter().collect();
    let rows = counts
        .iter()
        .enumerate()
        .map(|(i, &(year, count))| {
            let projected = if i == 0 {
                FieldValue::Null
            } else {
                FieldValue::Float((counts[i - 1].1 + count) as f64 / 2.0)
            };
            vec![
                FieldValue::Integer(year as i64),
                FieldValue::Integer(count as i64),
                projected,
            ]
        })
        .collect();
    AggregationResult {
        columns: vec![
            "Model Year".to_string(),
            "Count".to_string(),
            "Projected".to_string(),
        ],
        rows,
    }
}

/// Count grouped by (model year, vehicle type), ascending on both, for the
/// stacked time series. None when no vehicle type values exist.
pub fn type_over_time(view: &FilteredView) -> Option<AggregationResult> {
    let mut counts: BTreeMap<(i32, String), u64> = BTreeMap::new();
    for record in view.records() {
        if record.vehicle_type.is_empty() {
            continue;
        }
        *counts
            .entry((record.model_year.year(), record.vehicle_type.clone()))
            .or_insert(0) += 1;
    }
    if counts.is_empty() {
        return None;
    }
    Some(AggregationResult {
        columns: vec![
            "Model Year".to_string(),
            "Electric Vehicle Type".to_string(),
            "Count".to_string(),
        ],
        rows: counts
            .into_iter()
            .map(|((year, ty), count)| {
                vec![
                    FieldValue::Integer(year as i64),
                    FieldValue::String(ty),
                    FieldValue::Integer(count as i64),
                ]
            })
            .collect(),
    })
}
