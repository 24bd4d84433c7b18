use super::{
    AnyElement, AppView, Button, ButtonVariants, Context, Hsla, InteractiveElement, IntoElement,
    ParentElement, Selectable, Styled, Window, WindowControlArea, div, h_flex, px,
};
use crate::pipeline::SessionState;

const TITLEBAR_HEIGHT: f32 = 32.0;

/// Client-drawn window buttons: element id, control area, glyph path.
#[cfg(not(target_os = "macos"))]
const WINDOW_CONTROLS: [(&str, WindowControlArea, &str); 3] = [
    ("window-minimize", WindowControlArea::Min, "M 4,8 H 12"),
    ("window-maximize", WindowControlArea::Max, "M 4,4 H 12 V 12 H 4 Z"),
    ("window-close", WindowControlArea::Close, "M 4,4 L 12,12 M 12,4 L 4,12"),
];

impl AppView {
    pub(super) fn render_titlebar(
        &self,
        session: &SessionState,
        camera_color: Hsla,
        detector_color: Hsla,
        _window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let camera_icon = if session.running { "●" } else { "○" };

        h_flex()
            .window_control_area(WindowControlArea::Drag)
            .h(px(TITLEBAR_HEIGHT))
            .w_full()
            .items_center()
            .justify_between()
            .bg(gpui::rgb(0x1a2332))
            .child(
                h_flex()
                    .gap_3()
                    .pl(px(80.0))
                    .pr_3()
                    .h_full()
                    .items_center()
                    .child(status_pill(
                        format!("{camera_icon} {}", session.camera_text()),
                        camera_color,
                    ))
                    .child(status_pill(session.fps_text(), gpui::rgb(0xa0aab8).into()))
                    .child(status_pill(session.detector_text(), detector_color)),
            )
            .child(
                h_flex()
                    .gap_1()
                    .items_center()
                    .child(
                        Button::new("toggle-settings")
                            .ghost()
                            .selected(self.settings_open)
                            .label("Settings")
                            .on_click(cx.listener(|this, _, _, cx| {
                                this.settings_open = !this.settings_open;
                                cx.notify();
                            })),
                    )
                    .child(
                        Button::new("toggle-fullscreen")
                            .ghost()
                            .label("Fullscreen")
                            .on_click(cx.listener(|_, _, window, _| {
                                window.toggle_fullscreen();
                            })),
                    )
                    .child(window_controls()),
            )
            .into_any_element()
    }
}

// macOS draws its own traffic lights.
#[cfg(target_os = "macos")]
fn window_controls() -> AnyElement {
    div().into_any_element()
}

#[cfg(not(target_os = "macos"))]
fn window_controls() -> AnyElement {
    let mut controls = h_flex().gap_1().px_2();
    for (id, area, glyph) in WINDOW_CONTROLS {
        let hover_bg = if matches!(area, WindowControlArea::Close) {
            gpui::rgb(0xe81123)
        } else {
            gpui::rgb(0x1f2428)
        };
        controls = controls.child(
            div()
                .id(id)
                .size(px(28.0))
                .flex()
                .items_center()
                .justify_center()
                .rounded_md()
                .cursor_pointer()
                .window_control_area(area)
                .hover(move |s| s.bg(hover_bg))
                .child(
                    gpui::svg()
                        .size(px(16.0))
                        .path(glyph)
                        .text_color(gpui::rgb(0xc9d1d9)),
                ),
        );
    }
    controls.into_any_element()
}

fn status_pill(text: String, color: Hsla) -> AnyElement {
    div()
        .px_2()
        .py_0p5()
        .rounded_md()
        .bg(gpui::rgba(0x00000033))
        .text_xs()
        .text_color(color)
        .child(text)
        .into_any_element()
}
