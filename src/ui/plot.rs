use std::collections::HashMap;
use std::ops::RangeInclusive;

use eframe::egui::{self, Color32, Pos2, RichText, Sense, Stroke, Ui, Vec2};
use egui_plot::{Bar, BarChart, GridMark, Legend, Line, Plot, PlotPoints, Points};

use crate::chart::{ChartDescriptor, ChartKind};
use crate::color::{generate_palette, CategoryColors};
use crate::data::model::FieldValue;

// ---------------------------------------------------------------------------
// Chart rendering (central panel)
// ---------------------------------------------------------------------------

/// Render one chart descriptor. The descriptor stays renderer-agnostic; every
/// egui_plot decision lives here.
pub fn chart(ui: &mut Ui, descriptor: &ChartDescriptor, height: f32) {
    ui.vertical(|ui| {
        ui.strong(&descriptor.title);
        match descriptor.kind {
            ChartKind::Bar => bar_chart(ui, descriptor, height),
            ChartKind::Pie => pie_chart(ui, descriptor, height),
            ChartKind::Line => line_chart(ui, descriptor, height),
            ChartKind::Area => area_chart(ui, descriptor, height),
        }
    });
}

fn base_plot(title: &str, height: f32) -> Plot<'_> {
    // The dashboard lives in a scroll area; the plots must not eat the
    // wheel and drag events.
    Plot::new(title)
        .height(height)
        .legend(Legend::default())
        .allow_scroll(false)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_boxed_zoom(false)
}

// ---------------------------------------------------------------------------
// Bars
// ---------------------------------------------------------------------------

/// Year buckets plot vertically at their numeric coordinate; category bars
/// plot horizontally (long manufacturer and model labels), first row on top.
fn bar_chart(ui: &mut Ui, descriptor: &ChartDescriptor, height: f32) {
    let data = &descriptor.data;
    let Some(x_idx) = data.column_index(&descriptor.x_field) else {
        return;
    };
    let Some(y_idx) = descriptor
        .y_fields
        .first()
        .and_then(|f| data.column_index(f))
    else {
        return;
    };

    let categorical = data
        .rows
        .first()
        .is_some_and(|row| !matches!(row[x_idx], FieldValue::Integer(_)));
    let n = data.rows.len();
    let position = |i: usize, row: &[FieldValue]| -> f64 {
        if categorical {
            (n - 1 - i) as f64
        } else {
            row[x_idx].as_f64().unwrap_or(i as f64)
        }
    };

    let mut charts: Vec<BarChart> = Vec::new();
    if let Some(color_idx) = descriptor
        .color_field
        .as_deref()
        .and_then(|f| data.column_index(f))
    {
        // One BarChart per colour value so the legend lists them.
        let colors = CategoryColors::new(data.rows.iter().map(|r| r[color_idx].to_string()));
        let mut groups: Vec<(String, Vec<Bar>)> = Vec::new();
        for (i, row) in data.rows.iter().enumerate() {
            let key = row[color_idx].to_string();
            let bar = Bar::new(position(i, row), row[y_idx].as_f64().unwrap_or(0.0))
                .width(0.6)
                .name(row[x_idx].to_string());
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, bars)) => bars.push(bar),
                None => groups.push((key, vec![bar])),
            }
        }
        for (key, bars) in groups {
            let mut bar_chart = BarChart::new(bars).name(&key).color(colors.color_for(&key));
            if categorical {
                bar_chart = bar_chart.horizontal();
            }
            charts.push(bar_chart);
        }
    } else {
        let bars: Vec<Bar> = data
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                Bar::new(position(i, row), row[y_idx].as_f64().unwrap_or(0.0))
                    .width(0.6)
                    .name(row[x_idx].to_string())
            })
            .collect();
        let series_name = descriptor.y_fields.first().cloned().unwrap_or_default();
        let mut bar_chart = BarChart::new(bars)
            .name(series_name)
            .color(Color32::LIGHT_BLUE);
        if categorical {
            bar_chart = bar_chart.horizontal();
        }
        charts.push(bar_chart);
    }

    let mut plot = base_plot(&descriptor.title, height);
    if categorical {
        let labels: Vec<String> = data.rows.iter().map(|r| r[x_idx].to_string()).collect();
        plot = plot
            .y_axis_formatter(move |mark: GridMark, _range: &RangeInclusive<f64>| {
                category_label(&labels, mark.value)
            })
            .x_axis_label(descriptor.y_fields.first().cloned().unwrap_or_default());
    } else {
        plot = plot
            .x_axis_formatter(year_label)
            .x_axis_label(descriptor.x_field.clone())
            .y_axis_label(descriptor.y_fields.first().cloned().unwrap_or_default());
    }

    plot.show(ui, |plot_ui| {
        for bar_chart in charts {
            plot_ui.bar_chart(bar_chart);
        }
    });
}

// ---------------------------------------------------------------------------
// Lines
// ---------------------------------------------------------------------------

fn line_chart(ui: &mut Ui, descriptor: &ChartDescriptor, height: f32) {
    let data = &descriptor.data;
    let Some(x_idx) = data.column_index(&descriptor.x_field) else {
        return;
    };
    let series: Vec<(String, usize)> = descriptor
        .y_fields
        .iter()
        .filter_map(|f| data.column_index(f).map(|i| (f.clone(), i)))
        .collect();
    let palette = generate_palette(series.len());

    base_plot(&descriptor.title, height)
        .x_axis_formatter(year_label)
        .x_axis_label(descriptor.x_field.clone())
        .show(ui, |plot_ui| {
            for (si, (name, y_idx)) in series.iter().enumerate() {
                // Null cells (the first projection bucket) leave a gap.
                let points: Vec<[f64; 2]> = data
                    .rows
                    .iter()
                    .filter_map(|row| Some([row[x_idx].as_f64()?, row[*y_idx].as_f64()?]))
                    .collect();
                let color = palette[si];
                plot_ui.line(
                    Line::new(PlotPoints::from(points.clone()))
                        .name(name)
                        .color(color)
                        .width(2.0),
                );
                plot_ui.points(Points::new(points).name(name).color(color).radius(3.0));
            }
        });
}

// ---------------------------------------------------------------------------
// Stacked area
// ---------------------------------------------------------------------------

fn area_chart(ui: &mut Ui, descriptor: &ChartDescriptor, height: f32) {
    let data = &descriptor.data;
    let Some(x_idx) = data.column_index(&descriptor.x_field) else {
        return;
    };
    let Some(color_idx) = descriptor
        .color_field
        .as_deref()
        .and_then(|f| data.column_index(f))
    else {
        // No stacking dimension, nothing to pivot.
        line_chart(ui, descriptor, height);
        return;
    };
    let Some(y_idx) = descriptor
        .y_fields
        .first()
        .and_then(|f| data.column_index(f))
    else {
        return;
    };

    // Pivot the long (year, type, count) table into per-type series.
    let mut years: Vec<f64> = Vec::new();
    let mut types: Vec<String> = Vec::new();
    let mut cells: HashMap<(usize, usize), f64> = HashMap::new();
    for row in &data.rows {
        let Some(x) = row[x_idx].as_f64() else {
            continue;
        };
        let xi = match years.iter().position(|&v| v == x) {
            Some(i) => i,
            None => {
                years.push(x);
                years.len() - 1
            }
        };
        let key = row[color_idx].to_string();
        let ti = match types.iter().position(|t| *t == key) {
            Some(i) => i,
            None => {
                types.push(key);
                types.len() - 1
            }
        };
        *cells.entry((xi, ti)).or_insert(0.0) += row[y_idx].as_f64().unwrap_or(0.0);
    }

    let mut cumulative = vec![vec![0.0f64; years.len()]; types.len()];
    for ti in 0..types.len() {
        for xi in 0..years.len() {
            let below = if ti == 0 { 0.0 } else { cumulative[ti - 1][xi] };
            cumulative[ti][xi] = below + cells.get(&(xi, ti)).copied().unwrap_or(0.0);
        }
    }

    let colors = CategoryColors::new(types.iter().cloned());
    base_plot(&descriptor.title, height)
        .x_axis_formatter(year_label)
        .x_axis_label(descriptor.x_field.clone())
        .show(ui, |plot_ui| {
            // Tallest cumulative series first; each fill overdraws the one
            // beneath it, which reads as a stack.
            for ti in (0..types.len()).rev() {
                let points: Vec<[f64; 2]> = years
                    .iter()
                    .enumerate()
                    .map(|(xi, &x)| [x, cumulative[ti][xi]])
                    .collect();
                plot_ui.line(
                    Line::new(PlotPoints::from(points))
                        .name(&types[ti])
                        .color(colors.color_for(&types[ti]))
                        .fill(0.0)
                        .width(1.0),
                );
            }
        });
}

// ---------------------------------------------------------------------------
// Pie
// ---------------------------------------------------------------------------

fn pie_chart(ui: &mut Ui, descriptor: &ChartDescriptor, height: f32) {
    let data = &descriptor.data;
    let Some(x_idx) = data.column_index(&descriptor.x_field) else {
        return;
    };
    let Some(y_idx) = descriptor
        .y_fields
        .first()
        .and_then(|f| data.column_index(f))
    else {
        return;
    };

    let slices: Vec<(String, f64)> = data
        .rows
        .iter()
        .filter_map(|row| {
            let value = row[y_idx].as_f64()?;
            (value > 0.0).then(|| (row[x_idx].to_string(), value))
        })
        .collect();
    let total: f64 = slices.iter().map(|(_, v)| v).sum();
    if total <= 0.0 {
        return;
    }

    let colors = CategoryColors::new(slices.iter().map(|(label, _)| label.clone()));
    let (response, painter) =
        ui.allocate_painter(Vec2::new(ui.available_width(), height), Sense::hover());
    let rect = response.rect;
    let center = rect.center();
    let radius = (rect.height().min(rect.width()) * 0.45).max(10.0);

    // egui has no arc primitive: each slice is a fan of thin triangles.
    let mut angle = -std::f64::consts::FRAC_PI_2;
    for (label, value) in &slices {
        let sweep = value / total * std::f64::consts::TAU;
        let color = colors.color_for(label);
        let steps = ((sweep / 0.05).ceil() as usize).max(2);
        let arc: Vec<Pos2> = (0..=steps)
            .map(|s| {
                let a = angle + sweep * s as f64 / steps as f64;
                center + Vec2::new(a.cos() as f32, a.sin() as f32) * radius
            })
            .collect();
        for pair in arc.windows(2) {
            painter.add(egui::Shape::convex_polygon(
                vec![center, pair[0], pair[1]],
                color,
                Stroke::NONE,
            ));
        }
        angle += sweep;
    }

    ui.horizontal_wrapped(|ui| {
        for (label, value) in &slices {
            let pct = value / total * 100.0;
            ui.label(
                RichText::new(format!("■ {label} ({pct:.1}%)")).color(colors.color_for(label)),
            );
        }
    });
}

// ---------------------------------------------------------------------------
// Axis labels
// ---------------------------------------------------------------------------

/// Label integral grid marks with the category at that row position (rows
/// are laid out top-down), everything else stays blank.
fn category_label(labels: &[String], value: f64) -> String {
    let rounded = value.round();
    if (value - rounded).abs() > 1e-3 || rounded < 0.0 {
        return String::new();
    }
    let i = rounded as usize;
    if i < labels.len() {
        labels[labels.len() - 1 - i].clone()
    } else {
        String::new()
    }
}

/// Year axes only label whole years.
fn year_label(mark: GridMark, _range: &RangeInclusive<f64>) -> String {
    if mark.value.fract().abs() < 1e-6 {
        format!("{:.0}", mark.value)
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_read_top_down() {
        let labels = vec!["TESLA".to_string(), "NISSAN".to_string()];
        assert_eq!(category_label(&labels, 1.0), "TESLA");
        assert_eq!(category_label(&labels, 0.0), "NISSAN");
        assert_eq!(category_label(&labels, 0.5), "");
        assert_eq!(category_label(&labels, 5.0), "");
        assert_eq!(category_label(&labels, -1.0), "");
    }

    #[test]
    fn year_axis_skips_fractional_marks() {
        let mark = |value| GridMark {
            value,
            step_size: 1.0,
        };
        assert_eq!(year_label(mark(2019.0), &(2018.0..=2024.0)), "2019");
        assert_eq!(year_label(mark(2019.5), &(2018.0..=2024.0)), "");
    }
}
