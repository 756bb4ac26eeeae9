mod app;
mod chart;
mod color;
mod data;
mod state;
mod ui;

use std::path::PathBuf;

use app::VoltViewApp;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let initial_file = std::env::args().nth(1).map(PathBuf::from);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([700.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "VoltView – EV Registration Dashboard",
        options,
        Box::new(move |_cc| Ok(Box::new(VoltViewApp::new(initial_file)))),
    )
}
