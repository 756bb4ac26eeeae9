use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context as _;
use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::chart::ChartKind;
use crate::data::export;
use crate::data::filter::FilteredView;
use crate::data::model::Dataset;
use crate::state::AppState;
use crate::ui::plot;

/// Rows shown in the collapsible data preview under the charts.
const PREVIEW_ROWS: usize = 100;

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel. Any widget change rebuilds the selection and
/// triggers one full recomputation pass.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    // Clone the filter bounds so we can mutate the selection below.
    let (bounds, makes, countries, cities) = match &state.dataset {
        Some(ds) => (
            ds.year_bounds,
            ds.makes.clone(),
            ds.has_country().then(|| ds.countries.clone()),
            ds.has_city().then(|| ds.cities.clone()),
        ),
        None => {
            ui.label("No dataset loaded.");
            return;
        }
    };

    let mut changed = false;
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            if let Some((lo, hi)) = bounds {
                ui.strong("Model year range");
                let (mut from, mut to) = state.selection.year_range;
                ui.horizontal(|ui: &mut Ui| {
                    changed |= ui
                        .add(egui::DragValue::new(&mut from).range(lo..=hi).prefix("from "))
                        .changed();
                    changed |= ui
                        .add(egui::DragValue::new(&mut to).range(lo..=hi).prefix("to "))
                        .changed();
                });
                state.selection.year_range = (from, to.max(from));
                ui.separator();
            }

            changed |= value_filter(ui, "Manufacturer", &makes, &mut state.selection.makes);
            if let Some(countries) = &countries {
                changed |= value_filter(ui, "Country", countries, &mut state.selection.countries);
            }
            if let Some(cities) = &cities {
                changed |= value_filter(ui, "City", cities, &mut state.selection.cities);
            }
        });

    if changed {
        state.recompute();
    }
}

/// One collapsible multi-select. Nothing checked means "no constraint", so
/// the only bulk action needed is Clear.
fn value_filter(
    ui: &mut Ui,
    title: &str,
    values: &BTreeSet<String>,
    selected: &mut BTreeSet<String>,
) -> bool {
    let mut changed = false;
    let header = if selected.is_empty() {
        format!("{title}  (all)")
    } else {
        format!("{title}  ({}/{})", selected.len(), values.len())
    };

    egui::CollapsingHeader::new(RichText::new(header).strong())
        .id_salt(title)
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            if !selected.is_empty() && ui.small_button("Clear").clicked() {
                selected.clear();
                changed = true;
            }
            for value in values {
                let mut checked = selected.contains(value);
                if ui.checkbox(&mut checked, value).changed() {
                    if checked {
                        selected.insert(value.clone());
                    } else {
                        selected.remove(value);
                    }
                    changed = true;
                }
            }
        });

    changed
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if state.dataset.is_some() {
            if ui.button("Export filtered…").clicked() {
                export_dialog(state);
            }
            ui.separator();
        }

        if let Some(ds) = &state.dataset {
            ui.label(format!(
                "{} registrations loaded, {} matching",
                ds.len(),
                state.visible.len()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Central panel – the dashboard
// ---------------------------------------------------------------------------

/// Render notices, the chart grid, and the data preview for the current
/// filter pass.
pub fn dashboard_panel(ui: &mut Ui, state: &AppState) {
    let Some(dataset) = &state.dataset else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a data file to explore registrations  (File → Open…)");
        });
        return;
    };
    let Some(dashboard) = &state.dashboard else {
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for notice in &dashboard.notices {
                ui.label(RichText::new(notice.to_string()).color(Color32::YELLOW));
            }

            // The adoption chart leads full-width; the stacked time series
            // closes full-width; everything between renders in pairs.
            let charts = &dashboard.charts;
            let full_width = |i: usize| i == 0 || charts[i].kind == ChartKind::Area;
            let mut i = 0;
            while i < charts.len() {
                if full_width(i) {
                    plot::chart(ui, &charts[i], 260.0);
                    i += 1;
                } else if i + 1 < charts.len() && !full_width(i + 1) {
                    ui.columns(2, |cols: &mut [Ui]| {
                        plot::chart(&mut cols[0], &charts[i], 220.0);
                        plot::chart(&mut cols[1], &charts[i + 1], 220.0);
                    });
                    i += 2;
                } else {
                    plot::chart(ui, &charts[i], 220.0);
                    i += 1;
                }
                ui.add_space(8.0);
            }

            if !state.visible.is_empty() {
                preview_table(ui, dataset, &state.visible);
            }
        });
}

fn preview_table(ui: &mut Ui, dataset: &Dataset, visible: &[usize]) {
    egui::CollapsingHeader::new(RichText::new("Data preview").strong())
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            let schema = &dataset.schema;
            let shown = visible.len().min(PREVIEW_ROWS);
            if visible.len() > shown {
                ui.label(format!("Showing first {shown} of {} rows", visible.len()));
            }

            TableBuilder::new(ui)
                .striped(true)
                .vscroll(false)
                .columns(Column::auto().resizable(true), schema.columns.len())
                .header(20.0, |mut header| {
                    for name in &schema.columns {
                        header.col(|ui| {
                            ui.strong(name);
                        });
                    }
                })
                .body(|body| {
                    body.rows(18.0, shown, |mut row| {
                        let record = &dataset.records[visible[row.index()]];
                        for col in 0..schema.columns.len() {
                            row.col(|ui| {
                                ui.label(record.cell_text(schema, col));
                            });
                        }
                    });
                });
        });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open registration data")
        .add_filter("Supported files", &["csv", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.load_dataset(&path);
    }
}

fn export_dialog(state: &mut AppState) {
    let Some(path) = rfd::FileDialog::new()
        .set_title("Export filtered data")
        .set_file_name("filtered_ev_data.csv")
        .add_filter("CSV", &["csv"])
        .save_file()
    else {
        return;
    };

    match write_export(state, &path) {
        Ok(rows) => {
            log::info!("exported {rows} rows to {}", path.display());
            state.status_message = None;
        }
        Err(e) => {
            log::error!("export failed: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}

fn write_export(state: &AppState, path: &Path) -> anyhow::Result<usize> {
    let dataset = state.dataset.as_ref().context("no dataset loaded")?;
    let view = FilteredView::new(dataset, &state.visible);
    let bytes = export::to_csv(&view).context("serializing filtered data")?;
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(view.len())
}
