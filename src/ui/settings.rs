use super::{
    AnyElement, AppView, Button, ButtonVariants, Context, FluentBuilder, IntoElement,
    ParentElement, Selectable, SharedString, Styled, StyledExt, div, h_flex, v_flex,
};
use crate::config::{
    DetectionOptions, MAX_HANDS_RANGE, MODEL_COMPLEXITY_LEVELS, Resolution,
    model_complexity_label,
};

#[derive(Clone, Copy)]
enum ConfidenceField {
    Detection,
    Tracking,
}

impl ConfidenceField {
    fn label(self) -> &'static str {
        match self {
            ConfidenceField::Detection => "Min detection confidence",
            ConfidenceField::Tracking => "Min tracking confidence",
        }
    }

    fn id(self) -> &'static str {
        match self {
            ConfidenceField::Detection => "detection",
            ConfidenceField::Tracking => "tracking",
        }
    }

    fn value(self, options: &DetectionOptions) -> f32 {
        match self {
            ConfidenceField::Detection => options.min_detection_confidence,
            ConfidenceField::Tracking => options.min_tracking_confidence,
        }
    }

    fn slot(self, options: &mut DetectionOptions) -> &mut f32 {
        match self {
            ConfidenceField::Detection => &mut options.min_detection_confidence,
            ConfidenceField::Tracking => &mut options.min_tracking_confidence,
        }
    }
}

impl AppView {
    fn apply_options(&mut self, f: impl FnOnce(&mut DetectionOptions)) {
        self.notice = self
            .controller
            .update_options(f)
            .err()
            .map(|err| err.to_string());
    }

    fn pick_camera(&mut self, device_id: &str) {
        self.notice = self
            .controller
            .select_camera(device_id)
            .err()
            .map(|err| err.to_string());
    }

    fn rescan_cameras(&mut self) {
        self.notice = match self.controller.refresh_cameras() {
            Ok([]) => Some("No camera found".to_string()),
            Ok(_) => None,
            Err(err) => Some(err.to_string()),
        };
    }

    pub(super) fn render_settings(&self, cx: &mut Context<'_, Self>) -> AnyElement {
        let options = *self.controller.options();
        let selected = self.controller.session().selected_device_id;

        let mut cameras = v_flex().gap_1();
        for (idx, device) in self.controller.cameras().iter().enumerate() {
            let is_selected = selected.as_deref() == Some(device.id.as_str());
            let device_id = device.id.clone();
            cameras = cameras.child(
                Button::new(SharedString::from(format!("camera-{idx}")))
                    .ghost()
                    .w_full()
                    .selected(is_selected)
                    .label(device.display_label())
                    .on_click(cx.listener(move |this, _, _, cx| {
                        this.pick_camera(&device_id);
                        cx.notify();
                    })),
            );
        }

        let max_hands = h_flex()
            .gap_2()
            .items_center()
            .child(setting_label(format!("Max hands: {}", options.max_hands)))
            .child(
                Button::new("max-hands-dec")
                    .outline()
                    .label("-")
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.apply_options(|o| {
                            o.max_hands = o.max_hands.saturating_sub(1).max(MAX_HANDS_RANGE.0)
                        });
                        cx.notify();
                    })),
            )
            .child(
                Button::new("max-hands-inc")
                    .outline()
                    .label("+")
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.apply_options(|o| o.max_hands = (o.max_hands + 1).min(MAX_HANDS_RANGE.1));
                        cx.notify();
                    })),
            );

        let mut complexity = h_flex()
            .gap_1()
            .items_center()
            .child(setting_label("Model complexity".to_string()));
        for level in MODEL_COMPLEXITY_LEVELS {
            complexity = complexity.child(
                Button::new(SharedString::from(format!("complexity-{level}")))
                    .outline()
                    .selected(options.model_complexity == level)
                    .label(model_complexity_label(level))
                    .on_click(cx.listener(move |this, _, _, cx| {
                        this.apply_options(|o| o.model_complexity = level);
                        cx.notify();
                    })),
            );
        }

        let mut resolutions = h_flex()
            .gap_1()
            .items_center()
            .child(setting_label("Resolution".to_string()));
        for preset in Resolution::PRESETS {
            resolutions = resolutions.child(
                Button::new(SharedString::from(format!("resolution-{preset}")))
                    .outline()
                    .selected(options.resolution == preset)
                    .label(preset.to_string())
                    .on_click(cx.listener(move |this, _, _, cx| {
                        this.apply_options(|o| o.resolution = preset);
                        cx.notify();
                    })),
            );
        }

        v_flex()
            .gap_3()
            .p_3()
            .rounded_lg()
            .bg(gpui::rgb(0x0f1419))
            .child(
                h_flex()
                    .justify_between()
                    .items_center()
                    .child(
                        div()
                            .text_sm()
                            .font_semibold()
                            .text_color(gpui::rgb(0xe2e8f0))
                            .child("Camera"),
                    )
                    .child(
                        Button::new("camera-rescan")
                            .ghost()
                            .label("Rescan")
                            .on_click(cx.listener(|this, _, _, cx| {
                                this.rescan_cameras();
                                cx.notify();
                            })),
                    ),
            )
            .when(self.controller.cameras().is_empty(), |this| {
                this.child(setting_label("No camera found".to_string()))
            })
            .child(cameras)
            .child(
                div()
                    .text_sm()
                    .font_semibold()
                    .text_color(gpui::rgb(0xe2e8f0))
                    .child("Detection"),
            )
            .child(max_hands)
            .child(complexity)
            .child(confidence_row(ConfidenceField::Detection, &options, cx))
            .child(confidence_row(ConfidenceField::Tracking, &options, cx))
            .child(resolutions)
            .into_any_element()
    }
}

fn setting_label(text: String) -> AnyElement {
    div()
        .flex_1()
        .text_xs()
        .text_color(gpui::rgb(0xa0aab8))
        .child(text)
        .into_any_element()
}

fn confidence_row(
    field: ConfidenceField,
    options: &DetectionOptions,
    cx: &mut Context<'_, AppView>,
) -> AnyElement {
    let value = field.value(options);
    h_flex()
        .gap_2()
        .items_center()
        .child(setting_label(format!("{}: {value:.2}", field.label())))
        .child(
            Button::new(SharedString::from(format!("{}-dec", field.id())))
                .outline()
                .label("-")
                .on_click(cx.listener(move |this, _, _, cx| {
                    this.apply_options(|o| {
                        let slot = field.slot(o);
                        *slot = DetectionOptions::step_confidence(*slot, -1);
                    });
                    cx.notify();
                })),
        )
        .child(
            Button::new(SharedString::from(format!("{}-inc", field.id())))
                .outline()
                .label("+")
                .on_click(cx.listener(move |this, _, _, cx| {
                    this.apply_options(|o| {
                        let slot = field.slot(o);
                        *slot = DetectionOptions::step_confidence(*slot, 1);
                    });
                    cx.notify();
                })),
        )
        .into_any_element()
}
