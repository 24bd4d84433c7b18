use image::RgbaImage;
use rayon::prelude::*;

use super::skeleton::{
    self, CONNECTIONS, CONNECTOR_COLOR, CONNECTOR_THICKNESS, MARKER_FILL, MARKER_OUTLINE,
    MARKER_RADIUS,
};
use crate::types::{Frame, Hand, Landmark};

/// What one [`OverlayRenderer::render`] call drew.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub markers: usize,
    pub connectors: usize,
}

/// Draws the mirrored camera image plus every hand skeleton onto an RGBA surface.
#[derive(Debug, Default)]
pub struct OverlayRenderer {
    frames_rendered: u64,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn render(&mut self, canvas: &mut RgbaImage, frame: &Frame, hands: &[Hand]) -> RenderStats {
        if canvas.dimensions() != (frame.width, frame.height) {
            *canvas = RgbaImage::new(frame.width, frame.height);
        }
        draw_mirrored(canvas, frame);

        let mut stats = RenderStats::default();
        let (width, height) = (frame.width as f32, frame.height as f32);
        let project = |lm: Landmark| ((1.0 - lm.x) * width, lm.y * height);

        for hand in hands {
            for &(a, b) in CONNECTIONS {
                if let (Some(pa), Some(pb)) = (hand.get(a), hand.get(b)) {
                    skeleton::draw_line(
                        canvas,
                        project(pa),
                        project(pb),
                        CONNECTOR_COLOR,
                        CONNECTOR_THICKNESS,
                    );
                    stats.connectors += 1;
                }
            }
        }

        for hand in hands {
            for (_, lm) in hand.present() {
                skeleton::draw_marker(
                    canvas,
                    project(lm),
                    MARKER_RADIUS,
                    MARKER_FILL,
                    MARKER_OUTLINE,
                );
                stats.markers += 1;
            }
        }

        self.frames_rendered += 1;
        stats
    }
}

/// Copies `frame` into `canvas` flipped about the vertical axis.
fn draw_mirrored(canvas: &mut RgbaImage, frame: &Frame) {
    let stride = frame.width as usize * 4;
    if stride == 0 {
        return;
    }
    if !frame.is_well_formed() {
        log::warn!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            stride * frame.height as usize
        );
        canvas.pixels_mut().for_each(|px| px.0 = [0, 0, 0, 255]);
        return;
    }

    let dst: &mut [u8] = &mut **canvas;
    dst.par_chunks_exact_mut(stride)
        .zip(frame.rgba.par_chunks_exact(stride))
        .for_each(|(dst_row, src_row)| {
            for (dst_px, src_px) in dst_row
                .chunks_exact_mut(4)
                .zip(src_row.chunks_exact(4).rev())
            {
                dst_px.copy_from_slice(src_px);
            }
        });
}
