use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::model::{Dataset, Record, Schema};

// ---------------------------------------------------------------------------
// FilterSelection – what the user currently has selected
// ---------------------------------------------------------------------------

/// The active filter predicates, rebuilt from widget state on every
/// interaction. An empty set for a dimension means "no constraint on that
/// dimension", not "exclude all".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterSelection {
    /// Inclusive on both ends.
    pub year_range: (i32, i32),
    pub makes: BTreeSet<String>,
    pub countries: BTreeSet<String>,
    pub cities: BTreeSet<String>,
}

impl FilterSelection {
    /// The selection that matches the whole dataset: full year span, no
    /// value constraints.
    pub fn full_range(dataset: &Dataset) -> Self {
        FilterSelection {
            year_range: dataset.year_bounds.unwrap_or((0, 0)),
            ..FilterSelection::default()
        }
    }

    /// Predicate composition is conjunctive across dimensions; within a
    /// dimension, set membership is disjunctive. A record lacking a value for
    /// an actively filtered optional dimension fails that dimension.
    pub fn matches(&self, record: &Record) -> bool {
        let year = record.model_year.year();
        if year < self.year_range.0 || year > self.year_range.1 {
            return false;
        }
        if !self.makes.is_empty() && !self.makes.contains(&record.make) {
            return false;
        }
        if !self.countries.is_empty()
            && !record
                .country
                .as_ref()
                .is_some_and(|c| self.countries.contains(c))
        {
            return false;
        }
        if !self.cities.is_empty()
            && !record
                .city
                .as_ref()
                .is_some_and(|c| self.cities.contains(c))
        {
            return false;
        }
        true
    }
}

/// Return indices of records that pass the current selection. Pure and
/// deterministic; recomputed in full on every interaction.
pub fn filtered_indices(dataset: &Dataset, selection: &FilterSelection) -> Vec<usize> {
    dataset
        .records
        .iter()
        .enumerate()
        .filter(|(_, record)| selection.matches(record))
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// FilteredView – the matching subsequence, borrowed from the dataset
// ---------------------------------------------------------------------------

/// The subsequence of the dataset satisfying the current selection. Holds
/// borrowed indices so the aggregations and the export can walk the same
/// records without copying them.
#[derive(Debug, Clone, Copy)]
pub struct FilteredView<'a> {
    dataset: &'a Dataset,
    indices: &'a [usize],
}

impl<'a> FilteredView<'a> {
    pub fn new(dataset: &'a Dataset, indices: &'a [usize]) -> Self {
        FilteredView { dataset, indices }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn schema(&self) -> &'a Schema {
        &self.dataset.schema
    }

    pub fn records(&self) -> impl Iterator<Item = &'a Record> + '_ {
        self.indices.iter().map(|&i| &self.dataset.records[i])
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_csv;

    const CSV: &str = "\
Make,Model,Model Year,Electric Vehicle Type,Electric Range,Country,City
TESLA,Model 3,2018,Battery Electric Vehicle (BEV),215,USA,Seattle
NISSAN,Leaf,2019,Battery Electric Vehicle (BEV),150,USA,Bellevue
TESLA,Model Y,2019,Battery Electric Vehicle (BEV),230,Norway,Oslo
BMW,i3,2020,Battery Electric Vehicle (BEV),,USA,Seattle
TOYOTA,Prius Prime,2020,Plug-in Hybrid Electric Vehicle (PHEV),25,Norway,Bergen
RIVIAN,R1T,2020,Battery Electric Vehicle (BEV),314,,
";

    fn dataset() -> Dataset {
        load_csv(CSV.as_bytes()).unwrap()
    }

    fn selection(dataset: &Dataset) -> FilterSelection {
        FilterSelection::full_range(dataset)
    }

    #[test]
    fn empty_sets_are_noops() {
        let ds = dataset();
        let sel = selection(&ds);
        assert_eq!(filtered_indices(&ds, &sel).len(), ds.len());
    }

    #[test]
    fn year_bounds_are_inclusive() {
        let ds = dataset();
        let mut sel = selection(&ds);
        sel.year_range = (2019, 2020);
        // Excludes only the single 2018 record.
        assert_eq!(filtered_indices(&ds, &sel).len(), 5);

        sel.year_range = (2019, 2019);
        assert_eq!(filtered_indices(&ds, &sel).len(), 2);
    }

    #[test]
    fn set_membership_is_disjunctive_within_a_dimension() {
        let ds = dataset();
        let mut sel = selection(&ds);
        sel.makes = ["TESLA", "NISSAN"].iter().map(|s| s.to_string()).collect();
        assert_eq!(filtered_indices(&ds, &sel).len(), 3);
    }

    #[test]
    fn dimensions_compose_conjunctively() {
        let ds = dataset();
        let mut sel = selection(&ds);
        sel.makes.insert("TESLA".to_string());
        sel.countries.insert("USA".to_string());
        let indices = filtered_indices(&ds, &sel);
        assert_eq!(indices.len(), 1);
        assert_eq!(ds.records[indices[0]].model, "Model 3");
    }

    #[test]
    fn records_without_a_country_fail_an_active_country_filter() {
        let ds = dataset();
        let mut sel = selection(&ds);
        sel.countries.insert("USA".to_string());
        let indices = filtered_indices(&ds, &sel);
        // The RIVIAN row has no country value.
        assert_eq!(indices.len(), 3);
        assert!(indices.iter().all(|&i| ds.records[i].make != "RIVIAN"));
    }

    #[test]
    fn every_survivor_matches_and_every_reject_fails() {
        let ds = dataset();
        let mut sel = selection(&ds);
        sel.year_range = (2019, 2020);
        sel.countries.insert("Norway".to_string());

        let indices = filtered_indices(&ds, &sel);
        for (i, record) in ds.records.iter().enumerate() {
            assert_eq!(sel.matches(record), indices.contains(&i));
        }
    }

    #[test]
    fn filtering_is_idempotent() {
        let ds = dataset();
        let mut sel = selection(&ds);
        sel.year_range = (2019, 2020);
        sel.makes.insert("TESLA".to_string());

        let indices = filtered_indices(&ds, &sel);
        let view = FilteredView::new(&ds, &indices);
        // Re-applying the same selection to the view keeps every record.
        assert!(view.records().all(|r| sel.matches(r)));
    }

    #[test]
    fn view_exposes_the_matching_records() {
        let ds = dataset();
        let sel = selection(&ds);
        let indices = filtered_indices(&ds, &sel);
        let view = FilteredView::new(&ds, &indices);
        assert_eq!(view.len(), ds.len());
        assert!(!view.is_empty());
        assert_eq!(view.records().count(), ds.len());
    }
}
