// No console window for the GUI in Windows release builds.
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod cli;
mod io;
mod logger;

use std::path::PathBuf;

use app::TrimapApp;
use eframe::egui;

fn main() -> anyhow::Result<()> {
    logger::init();

    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        log::logger().flush();
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode --------------------------------------------------------
    // A single positional argument opens that image ("Open with").
    let startup_file = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .filter(|p| p.is_file());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([480.0, 320.0])
            .with_title("Trimap Editor"),
        ..Default::default()
    };

    eframe::run_native(
        "Trimap Editor",
        options,
        Box::new(move |cc| Box::new(TrimapApp::new(cc, startup_file))),
    )
    .map_err(|e| anyhow::anyhow!("window error: {e}"))
}
