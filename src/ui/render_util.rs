use image::{Frame as ImageFrame, ImageBuffer, Rgba, RgbaImage};
use rayon::prelude::*;

use super::{Arc, RenderImage};

pub(super) fn canvas_to_image(canvas: &RgbaImage) -> Option<Arc<RenderImage>> {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let mut pixels = canvas.as_raw().clone();
    // GPUI expects BGRA; convert here to avoid the async asset pipeline and flicker.
    rgba_to_bgra(&mut pixels);

    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, pixels)?;
    Some(Arc::new(RenderImage::new(vec![ImageFrame::new(buffer)])))
}

fn rgba_to_bgra(pixels: &mut [u8]) {
    pixels.par_chunks_exact_mut(4).for_each(|px| px.swap(0, 2));
}
