use std::sync::Arc;

use gpui::prelude::FluentBuilder;
use gpui::{
    AnyElement, App, AppContext, Context, Hsla, InteractiveElement, IntoElement, ObjectFit,
    ParentElement, Render, RenderImage, SharedString, Styled, StyledImage, TitlebarOptions,
    Window, WindowControlArea, WindowDecorations, WindowOptions, div, img, px,
};
use gpui_component::{
    ActiveTheme, Root, Selectable, StyledExt,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};

use crate::pipeline::PipelineController;

mod main_view;
mod render_util;
mod settings;
mod titlebar;

const VIDEO_WIDTH: f32 = 640.0;
const DEFAULT_VIDEO_RATIO: f32 = 4.0 / 3.0;
const SIDE_PANEL_WIDTH: f32 = 340.0;

pub fn launch_ui(app: &mut App, controller: PipelineController) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Hand Overlay".into()),
            appears_transparent: true,
            traffic_light_position: None,
        }),
        window_decorations: Some(WindowDecorations::Client),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(controller));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    controller: PipelineController,
    latest_image: Option<Arc<RenderImage>>,
    shown_frames: u64,
    settings_open: bool,
    notice: Option<String>,
}

impl AppView {
    fn new(mut controller: PipelineController) -> Self {
        controller.start();
        Self {
            controller,
            latest_image: None,
            shown_frames: 0,
            settings_open: true,
            notice: None,
        }
    }

    /// Applies pipeline events and uploads the canvas if a new frame landed.
    fn sync_pipeline(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        self.controller.pump();

        let rendered = self.controller.frames_rendered();
        if rendered == self.shown_frames {
            return;
        }
        self.shown_frames = rendered;
        if let Some(image) = render_util::canvas_to_image(self.controller.canvas()) {
            if let Some(old_image) = self.latest_image.replace(image) {
                // Release the previous texture; the sprite atlas keeps every frame otherwise.
                cx.drop_image(old_image, Some(window));
            }
        }
    }

    fn video_aspect_ratio(&self) -> f32 {
        let (width, height) = self.controller.canvas().dimensions();
        if width > 0 && height > 0 {
            width as f32 / height as f32
        } else {
            DEFAULT_VIDEO_RATIO
        }
    }
}

impl Render for AppView {
    fn render(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) -> impl IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        self.sync_pipeline(window, cx);
        self.render_main(window, cx)
    }
}
