use super::render_util::frame_to_image;
use super::{
    ActiveTheme, AnyElement, AppView, Arc, Button, ButtonVariants, Context, DEBUG_KEY,
    IntoElement, LatestView, ObjectFit, ParentElement, QUIT_KEY, RenderImage, SharedString,
    Styled, StyledImage, Window, div, h_flex, img, px, quit, toggle_debug, v_flex,
};

impl AppView {
    pub(super) fn render_main(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        // Only the newest frame is worth a texture upload.
        if let Some(display) = self.frame_rx.try_iter().last() {
            if let Some(image) = frame_to_image(&display.frame) {
                self.replace_latest_image(image, window, cx);
            }
            self.latest = Some(LatestView {
                width: display.frame.width,
                height: display.frame.height,
                active: display.active,
                fps: display.fps,
            });
        }

        let snapshot = self.state.snapshot();

        let frame_view: AnyElement = match &self.latest_image {
            Some(image) => img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element(),
            None => {
                let message = if snapshot.running {
                    "Waiting for camera..."
                } else {
                    "Camera stopped"
                };
                div()
                    .size_full()
                    .flex()
                    .items_center()
                    .justify_center()
                    .text_sm()
                    .text_color(gpui::rgb(0x8b95a5))
                    .child(message)
                    .into_any_element()
            }
        };

        let (seal_text, seal_color) = match &self.latest {
            Some(latest) if latest.active => ("SEAL: ACTIVE", gpui::rgb(0x22c55e)),
            _ => ("SEAL: INACTIVE", gpui::rgb(0xef4444)),
        };
        let stats = match &self.latest {
            Some(latest) => format!(
                "{} · {}x{} · {:.0} FPS",
                snapshot.camera, latest.width, latest.height, latest.fps
            ),
            None => snapshot.camera.clone(),
        };
        let debug_label = format!(
            "Debug: {} ({})",
            if snapshot.debug { "on" } else { "off" },
            DEBUG_KEY.to_uppercase()
        );

        let controls = h_flex()
            .gap_2()
            .items_center()
            .child(
                Button::new(SharedString::from("toggle-debug"))
                    .outline()
                    .label(debug_label)
                    .on_click(cx.listener(|this, _, _, cx| {
                        toggle_debug(&this.state);
                        cx.notify();
                    })),
            )
            .child(
                Button::new(SharedString::from("quit"))
                    .outline()
                    .label(format!("Quit ({})", QUIT_KEY.to_uppercase()))
                    .on_click(cx.listener(|this, _, _, cx| quit(&this.state, cx))),
            );

        let status_row = h_flex()
            .w_full()
            .justify_between()
            .items_center()
            .gap_3()
            .p_3()
            .child(
                h_flex()
                    .gap_3()
                    .items_center()
                    .child(
                        div()
                            .text_sm()
                            .font_weight(gpui::FontWeight::SEMIBOLD)
                            .text_color(seal_color)
                            .child(seal_text),
                    )
                    .child(
                        div()
                            .text_xs()
                            .text_color(cx.theme().muted_foreground)
                            .child(stats),
                    ),
            )
            .child(controls);

        v_flex()
            .size_full()
            .bg(gpui::rgb(0x1a2332))
            .child(
                div()
                    .flex_1()
                    .w_full()
                    .min_h(px(120.0))
                    .overflow_hidden()
                    .bg(gpui::rgb(0x000000))
                    .child(frame_view),
            )
            .child(status_row)
            .into_any_element()
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // Free the previous texture or the sprite atlas keeps every frame.
            cx.drop_image(old_image, Some(window));
        }
    }
}
