//! Tensor preparation shared by the palm detector and the landmark model.

use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, Landmark};

pub const LANDMARK_INPUT_SIZE: u32 = 224;
pub const PALM_INPUT_SIZE: u32 = 192;

/// How a frame was scaled and padded into a square model input.
#[derive(Clone, Copy, Debug)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub frame_w: u32,
    pub frame_h: u32,
}

fn check_frame(frame: &Frame) -> Result<()> {
    if !frame.is_well_formed() {
        return Err(anyhow!(
            "frame buffer size mismatch: got {} bytes for {}x{}",
            frame.rgba.len(),
            frame.width,
            frame.height
        ));
    }
    if frame.width == 0 || frame.height == 0 {
        return Err(anyhow!("empty frame"));
    }
    Ok(())
}

/// Resizes `frame` to fit a `size`×`size` square (aspect kept, black padding)
/// and returns an NHWC tensor in `[0, 1]`.
pub fn letterbox_tensor(frame: &Frame, size: u32) -> Result<(Array4<f32>, Letterbox)> {
    check_frame(frame)?;

    let scale = size as f32 / frame.width.max(frame.height) as f32;
    let new_w = ((frame.width as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((frame.height as f32 * scale).round() as u32).clamp(1, size);

    let src = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .context("fast resize failed")?;
    let resized = dst.into_vec();

    let side = size as usize;
    let pad_x = (side - new_w as usize) / 2;
    let pad_y = (side - new_h as usize) / 2;
    let src_stride = new_w as usize * 4;

    let mut data = vec![0f32; side * side * 3];
    data.par_chunks_exact_mut(side * 3)
        .enumerate()
        .skip(pad_y)
        .take(new_h as usize)
        .for_each(|(row, dst_row)| {
            let src_row = &resized[(row - pad_y) * src_stride..][..src_stride];
            for (dst_px, src_px) in dst_row[pad_x * 3..]
                .chunks_exact_mut(3)
                .zip(src_row.chunks_exact(4))
            {
                dst_px[0] = src_px[0] as f32 / 255.0;
                dst_px[1] = src_px[1] as f32 / 255.0;
                dst_px[2] = src_px[2] as f32 / 255.0;
            }
        });

    let input = Array4::from_shape_vec((1, side, side, 3), data)
        .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    Ok((
        input,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            frame_w: frame.width,
            frame_h: frame.height,
        },
    ))
}

/// A rotated square region of the frame, in pixels, fed to the landmark model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandCrop {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
}

impl HandCrop {
    /// Samples the crop into an `size`×`size` NHWC tensor with bilinear filtering.
    pub fn sample(&self, frame: &Frame, size: u32) -> Result<Array4<f32>> {
        check_frame(frame)?;

        let side = size as usize;
        let half = size as f32 / 2.0;
        let step = self.side / size as f32;
        let (sin, cos) = self.angle.sin_cos();

        let mut data = vec![0f32; side * side * 3];
        data.par_chunks_exact_mut(side * 3)
            .enumerate()
            .for_each(|(y, row)| {
                let dy = (y as f32 + 0.5 - half) * step;
                for (x, px) in row.chunks_exact_mut(3).enumerate() {
                    let dx = (x as f32 + 0.5 - half) * step;
                    let src_x = self.center.0 + dx * cos - dy * sin;
                    let src_y = self.center.1 + dx * sin + dy * cos;
                    px.copy_from_slice(&sample_rgb(frame, src_x, src_y));
                }
            });

        Array4::from_shape_vec((1, side, side, 3), data)
            .map_err(|err| anyhow!("failed to build crop tensor: {err}"))
    }

    /// Maps a point in model input space back to normalized frame coordinates.
    pub fn to_frame(&self, x: f32, y: f32, z: f32, size: u32, frame_w: u32, frame_h: u32) -> Landmark {
        let half = size as f32 / 2.0;
        let step = self.side / size as f32;
        let (sin, cos) = self.angle.sin_cos();
        let dx = (x - half) * step;
        let dy = (y - half) * step;
        let px = self.center.0 + dx * cos - dy * sin;
        let py = self.center.1 + dx * sin + dy * cos;
        Landmark::with_depth(
            (px / frame_w as f32).clamp(0.0, 1.0),
            (py / frame_h as f32).clamp(0.0, 1.0),
            z * step / frame_w as f32,
        )
    }

    /// Square crop around a set of normalized landmarks, used to refine a
    /// previous estimate.
    pub fn around(landmarks: &[Landmark], angle: f32, frame_w: u32, frame_h: u32) -> Option<Self> {
        let (min_x, max_x, min_y, max_y) = landmarks
            .iter()
            .filter(|lm| lm.is_finite())
            .map(|lm| (lm.x * frame_w as f32, lm.y * frame_h as f32))
            .fold(None, |acc: Option<(f32, f32, f32, f32)>, (x, y)| {
                Some(match acc {
                    None => (x, x, y, y),
                    Some((a, b, c, d)) => (a.min(x), b.max(x), c.min(y), d.max(y)),
                })
            })?;

        let side = (max_x - min_x).max(max_y - min_y) * 1.6;
        if side <= 1.0 {
            return None;
        }
        Some(Self {
            center: ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0),
            side,
            angle,
        })
    }
}

fn sample_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if !x.is_finite() || !y.is_finite() {
        return [0.0; 3];
    }
    let (w, h) = (frame.width as i64, frame.height as i64);
    let fetch = |ix: i64, iy: i64| -> [f32; 3] {
        if ix < 0 || iy < 0 || ix >= w || iy >= h {
            return [0.0; 3];
        }
        let idx = (iy as usize * frame.width as usize + ix as usize) * 4;
        [
            frame.rgba[idx] as f32 / 255.0,
            frame.rgba[idx + 1] as f32 / 255.0,
            frame.rgba[idx + 2] as f32 / 255.0,
        ]
    };

    // Pixel centres sit at +0.5.
    let (x, y) = (x - 0.5, y - 0.5);
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (ix, iy) = (x0 as i64, y0 as i64);

    let c00 = fetch(ix, iy);
    let c10 = fetch(ix + 1, iy);
    let c01 = fetch(ix, iy + 1);
    let c11 = fetch(ix + 1, iy + 1);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    std::array::from_fn(|c| lerp(lerp(c00[c], c10[c], fx), lerp(c01[c], c11[c], fx), fy))
}
