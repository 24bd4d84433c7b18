use super::{
    ActiveTheme, AnyElement, AppView, Context, FluentBuilder, IntoElement, ObjectFit,
    ParentElement, SIDE_PANEL_WIDTH, Styled, StyledExt, StyledImage, VIDEO_WIDTH, Window, div,
    h_flex, img, px, v_flex,
};
use crate::pipeline::{DetectorStatus, PipelineState};

impl AppView {
    pub(super) fn render_main(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let session = self.controller.session();
        let theme = cx.theme();

        let camera_color = if session.running {
            theme.success
        } else {
            theme.muted_foreground
        };
        let detector_color = match session.detector {
            DetectorStatus::Ready => theme.success,
            DetectorStatus::Loading => theme.muted_foreground,
            DetectorStatus::Unavailable(_) => theme.danger,
        };

        let titlebar = self.render_titlebar(&session, camera_color, detector_color, window, cx);
        let settings = self.settings_open.then(|| self.render_settings(cx));

        v_flex()
            .size_full()
            .bg(gpui::rgb(0x1a2332))
            .child(titlebar)
            .child(
                h_flex()
                    .flex_1()
                    .gap_3()
                    .p_4()
                    .items_start()
                    .child(self.render_video())
                    .child(
                        v_flex()
                            .w(px(SIDE_PANEL_WIDTH))
                            .gap_3()
                            .child(self.render_gesture_panel())
                            .when_some(settings, |this, settings| this.child(settings)),
                    ),
            )
            .into_any_element()
    }

    fn render_video(&self) -> AnyElement {
        let ratio = self.video_aspect_ratio();
        let placeholder = match self.controller.state() {
            PipelineState::Idle if self.controller.cameras().is_empty() => "No camera found",
            PipelineState::Idle => "Camera idle",
            PipelineState::Starting { .. } | PipelineState::Restarting { .. } => {
                "Starting camera..."
            }
            PipelineState::Running { .. } => "Waiting for frames...",
            PipelineState::Stopped { .. } => "Camera stopped",
        };

        let content: AnyElement = match &self.latest_image {
            Some(image) if self.controller.is_running() => img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element(),
            _ => div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .child(placeholder)
                .into_any_element(),
        };

        let error_banner = match self.controller.state() {
            PipelineState::Stopped { error } => Some(error.to_string()),
            _ => self.notice.clone(),
        };

        v_flex()
            .flex_1()
            .gap_2()
            .child(
                div()
                    .w(px(VIDEO_WIDTH))
                    .h(px(VIDEO_WIDTH / ratio))
                    .rounded_lg()
                    .overflow_hidden()
                    .bg(gpui::rgb(0x000000))
                    .child(content),
            )
            .when_some(error_banner, |this, message| {
                this.child(
                    h_flex()
                        .gap_2()
                        .items_center()
                        .p_3()
                        .rounded_lg()
                        .bg(gpui::rgba(0xef444433))
                        .border_1()
                        .border_color(gpui::rgba(0xef4444ff))
                        .child(div().text_sm().text_color(gpui::rgb(0xfca5a5)).child("!"))
                        .child(
                            div()
                                .text_xs()
                                .text_color(gpui::rgb(0xfca5a5))
                                .child(message),
                        ),
                )
            })
            .into_any_element()
    }

    fn render_gesture_panel(&self) -> AnyElement {
        let gestures = self.controller.gestures();
        let hands = self.controller.hands();

        let mut panel = v_flex()
            .gap_2()
            .p_3()
            .rounded_lg()
            .bg(gpui::rgb(0x0f1419))
            .child(
                div()
                    .text_sm()
                    .font_semibold()
                    .text_color(gpui::rgb(0xe2e8f0))
                    .child("Gestures"),
            );

        if gestures.is_empty() {
            let current = self.controller.current_gesture();
            return panel
                .child(
                    div()
                        .text_lg()
                        .text_color(gpui::rgb(0x8b95a5))
                        .child(current.display_text()),
                )
                .into_any_element();
        }

        for (slot, result) in gestures.iter().enumerate() {
            let handedness = hands
                .get(slot)
                .map(|hand| format!("{} {:.0}%", hand.handedness.label(), hand.confidence * 100.0))
                .unwrap_or_default();

            let mut card = v_flex()
                .gap_1()
                .p_2()
                .rounded_md()
                .bg(gpui::rgba(0x2d374855))
                .child(
                    h_flex()
                        .justify_between()
                        .child(
                            div()
                                .text_base()
                                .text_color(gpui::rgb(0xa5b4fc))
                                .child(format!("{}{}", result.kind.emoji(), result.label())),
                        )
                        .child(
                            div()
                                .text_xs()
                                .text_color(gpui::rgb(0x8b95a5))
                                .child(format!("Hand {} {handedness}", slot + 1)),
                        ),
                )
                .child(
                    div()
                        .text_xs()
                        .text_color(gpui::rgb(0xcbd5e1))
                        .child(format!("Thumb-index distance: {}", result.distance_text())),
                );

            for line in result.fingertip_lines() {
                card = card.child(div().text_xs().text_color(gpui::rgb(0x94a3b8)).child(line));
            }
            panel = panel.child(card);
        }

        panel.into_any_element()
    }
}
