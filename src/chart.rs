use std::fmt;

use serde::Serialize;

use crate::data::aggregate::{self, AggregationResult};
use crate::data::filter::FilteredView;
use crate::data::model::FieldValue;

// ---------------------------------------------------------------------------
// ChartDescriptor – what to draw, decoupled from how it is drawn
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Bar,
    Pie,
    Line,
    Area,
}

/// A renderer-agnostic description of one chart: the result table plus which
/// of its columns drive the axes and the color dimension.
#[derive(Debug, Clone, Serialize)]
pub struct ChartDescriptor {
    pub kind: ChartKind,
    pub data: AggregationResult,
    pub x_field: String,
    pub y_fields: Vec<String>,
    pub color_field: Option<String>,
    pub title: String,
}

/// Map a result table to a chart descriptor. Pure field selection: the first
/// column is the x axis; a categorical second column (when a third exists)
/// becomes the color dimension, everything after it the y series. No color
/// field is emitted when the table has none.
pub fn to_chart(data: AggregationResult, kind: ChartKind, title: &str) -> ChartDescriptor {
    let x_field = data.columns.first().cloned().unwrap_or_default();

    let second_is_categorical = data.columns.len() >= 3
        && data
            .rows
            .first()
            .is_some_and(|row| matches!(row.get(1), Some(FieldValue::String(_))));
    let (color_field, y_start) = if second_is_categorical {
        (Some(data.columns[1].clone()), 2)
    } else {
        (None, 1)
    };
    let y_fields = data.columns.iter().skip(y_start).cloned().collect();

    ChartDescriptor {
        kind,
        data,
        x_field,
        y_fields,
        color_field,
        title: title.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Dashboard – the full output of one filter pass
// ---------------------------------------------------------------------------

/// Non-fatal conditions surfaced alongside the charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Notice {
    /// The current selection matched nothing; no charts were produced.
    EmptyResult,
    /// A required field is absent or entirely null; its charts are omitted.
    FeatureUnavailable(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::EmptyResult => write!(f, "No data available for the selected filters."),
            Notice::FeatureUnavailable(feature) => {
                write!(f, "No valid data for {feature}; those charts are hidden.")
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboard {
    pub charts: Vec<ChartDescriptor>,
    pub notices: Vec<Notice>,
}

/// One full pass: run every applicable aggregation over the view and map the
/// results to chart descriptors. The hosting UI only wires inputs in and
/// renders what comes out.
pub fn build_dashboard(view: &FilteredView) -> Dashboard {
    if view.is_empty() {
        return Dashboard {
            charts: Vec::new(),
            notices: vec![Notice::EmptyResult],
        };
    }

    let mut charts = Vec::new();
    let mut notices = Vec::new();

    charts.push(to_chart(
        aggregate::adoption_by_year(view),
        ChartKind::Bar,
        "EV Adoption Over the Years",
    ));

    match aggregate::share_by_type(view) {
        Some(result) => charts.push(to_chart(result, ChartKind::Pie, "EVs by Battery Type")),
        None => notices.push(Notice::FeatureUnavailable("vehicle type".to_string())),
    }

    charts.push(to_chart(
        aggregate::top_makes(view),
        ChartKind::Bar,
        "Top 10 EV Manufacturers",
    ));
    charts.push(to_chart(
        aggregate::top_models(view),
        ChartKind::Bar,
        "Top 10 Models by Manufacturer",
    ));

    let mut range_available = false;
    if let Some(result) = aggregate::avg_range_by_year(view) {
        range_available = true;
        charts.push(to_chart(
            result,
            ChartKind::Line,
            "Avg. Electric Range by Year",
        ));
    }
    if let Some(result) = aggregate::top_models_by_range(view) {
        range_available = true;
        charts.push(to_chart(
            result,
            ChartKind::Bar,
            "Top 10 Models by Electric Range",
        ));
    }
    if !range_available {
        notices.push(Notice::FeatureUnavailable("electric range".to_string()));
    }

    charts.push(to_chart(
        aggregate::growth_projection(view),
        ChartKind::Line,
        "Current & Estimated EV Market Growth",
    ));

    if let Some(result) = aggregate::type_over_time(view) {
        charts.push(to_chart(
            result,
            ChartKind::Area,
            "EV Type Distribution Over Time",
        ));
    }

    Dashboard { charts, notices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::{filtered_indices, FilterSelection, FilteredView};
    use crate::data::loader::load_csv;
    use crate::data::model::Dataset;

    const CSV: &str = "\
Make,Model,Model Year,Electric Vehicle Type,Electric Range
TESLA,Model 3,2018,Battery Electric Vehicle (BEV),215
NISSAN,Leaf,2019,Battery Electric Vehicle (BEV),150
TESLA,Model Y,2019,Battery Electric Vehicle (BEV),230
TOYOTA,Prius Prime,2020,Plug-in Hybrid Electric Vehicle (PHEV),25
";

    fn dataset() -> Dataset {
        load_csv(CSV.as_bytes()).unwrap()
    }

    #[test]
    fn categorical_second_column_becomes_the_color_field() {
        let data = AggregationResult {
            columns: vec![
                "Model".to_string(),
                "Make".to_string(),
                "Count".to_string(),
            ],
            rows: vec![vec![
                FieldValue::String("Leaf".to_string()),
                FieldValue::String("NISSAN".to_string()),
                FieldValue::Integer(3),
            ]],
        };
        let chart = to_chart(data, ChartKind::Bar, "t");
        assert_eq!(chart.x_field, "Model");
        assert_eq!(chart.color_field.as_deref(), Some("Make"));
        assert_eq!(chart.y_fields, vec!["Count"]);
    }

    #[test]
    fn numeric_second_column_stays_a_y_series() {
        let data = AggregationResult {
            columns: vec![
                "Model Year".to_string(),
                "Count".to_string(),
                "Projected".to_string(),
            ],
            rows: vec![vec![
                FieldValue::Integer(2019),
                FieldValue::Integer(4),
                FieldValue::Null,
            ]],
        };
        let chart = to_chart(data, ChartKind::Line, "t");
        assert_eq!(chart.color_field, None);
        assert_eq!(chart.y_fields, vec!["Count", "Projected"]);
    }

    #[test]
    fn full_dashboard_builds_all_eight_charts() {
        let ds = dataset();
        let indices = filtered_indices(&ds, &FilterSelection::full_range(&ds));
        let dashboard = build_dashboard(&FilteredView::new(&ds, &indices));

        assert_eq!(dashboard.charts.len(), 8);
        assert!(dashboard.notices.is_empty());
        assert_eq!(dashboard.charts[0].kind, ChartKind::Bar);
        assert_eq!(dashboard.charts[1].kind, ChartKind::Pie);
        assert_eq!(
            dashboard.charts.last().unwrap().kind,
            ChartKind::Area
        );
    }

    #[test]
    fn empty_view_yields_a_notice_and_no_charts() {
        let ds = dataset();
        let indices: Vec<usize> = Vec::new();
        let dashboard = build_dashboard(&FilteredView::new(&ds, &indices));
        assert!(dashboard.charts.is_empty());
        assert_eq!(dashboard.notices, vec![Notice::EmptyResult]);
    }

    #[test]
    fn missing_range_column_omits_both_range_charts() {
        let csv = "\
Make,Model,Model Year,Electric Vehicle Type
TESLA,Model 3,2019,BEV
";
        let ds = load_csv(csv.as_bytes()).unwrap();
        let indices = filtered_indices(&ds, &FilterSelection::full_range(&ds));
        let dashboard = build_dashboard(&FilteredView::new(&ds, &indices));

        assert_eq!(dashboard.charts.len(), 6);
        assert_eq!(
            dashboard.notices,
            vec![Notice::FeatureUnavailable("electric range".to_string())]
        );
        assert!(dashboard
            .charts
            .iter()
            .all(|c| !c.title.contains("Range") && !c.title.contains("range")));
    }

    #[test]
    fn descriptors_serialize_for_external_renderers() {
        let ds = dataset();
        let indices = filtered_indices(&ds, &FilterSelection::full_range(&ds));
        let dashboard = build_dashboard(&FilteredView::new(&ds, &indices));
        let json = serde_json::to_string(&dashboard).unwrap();
        assert!(json.contains("\"EV Adoption Over the Years\""));
    }
}
