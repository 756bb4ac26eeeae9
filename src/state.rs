use std::path::Path;

use crate::chart::{build_dashboard, Dashboard};
use crate::data::filter::{filtered_indices, FilterSelection, FilteredView};
use crate::data::loader;
use crate::data::model::Dataset;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering. The dataset is loaded at
/// most once per file and read-only afterwards; everything derived from it is
/// rebuilt in full by [`AppState::recompute`] on every interaction.
#[derive(Default)]
pub struct AppState {
    /// Loaded dataset (None until a file is opened).
    pub dataset: Option<Dataset>,

    /// The active filter predicates, mirrored by the sidebar widgets.
    pub selection: FilterSelection,

    /// Indices of records passing the current selection.
    pub visible: Vec<usize>,

    /// Charts and notices for the current selection.
    pub dashboard: Option<Dashboard>,

    /// Status / error message shown in the top bar.
    pub status_message: Option<String>,
}

impl AppState {
    /// Ingest a newly loaded dataset and reset the filters to its full span.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        self.selection = FilterSelection::full_range(&dataset);
        self.dataset = Some(dataset);
        self.status_message = None;
        self.recompute();
    }

    /// Load a dataset from disk, surfacing failures in the status bar.
    pub fn load_dataset(&mut self, path: &Path) {
        match loader::load_file(path) {
            Ok(dataset) => {
                log::info!(
                    "loaded {} registrations from {} ({} rows dropped)",
                    dataset.len(),
                    path.display(),
                    dataset.dropped
                );
                self.set_dataset(dataset);
            }
            Err(e) => {
                log::error!("failed to load {}: {e}", path.display());
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// One full pass: selection → filtered view → all aggregations → charts.
    pub fn recompute(&mut self) {
        let Some(dataset) = &self.dataset else {
            self.visible.clear();
            self.dashboard = None;
            return;
        };
        self.visible = filtered_indices(dataset, &self.selection);
        let view = FilteredView::new(dataset, &self.visible);
        self.dashboard = Some(build_dashboard(&view));
    }
}
