#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::sync::Arc;

use anyhow::Result;
use gpui::Application;
use hand_overlay::{
    DetectionOptions, PipelineController,
    pipeline::{ModelPaths, NokhwaBackend, OnnxLandmarkBackend},
    ui,
};

fn main() -> Result<()> {
    env_logger::init();

    let controller = PipelineController::new(
        Arc::new(NokhwaBackend),
        Arc::new(OnnxLandmarkBackend::new(ModelPaths::default())),
        DetectionOptions::default(),
    )?;

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, controller) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
