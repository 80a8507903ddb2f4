//! Pan band construction.
//!
//! The pan band is a single broadband plane combined from the selected
//! channels, optionally upscaled by the configured pan scale. Cubic and
//! Lanczos interpolation fall back to bilinear.

use contracts::ImageBuffer;

use crate::settings::{GeneralExportSettings, PanAlgorithm, PanInterpolation};

/// A built pan plane with its geometry.
pub(crate) struct PanPlane {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

/// Combine the selected channels into a pan plane per the settings, then
/// upscale when `pan_scale > 1`.
pub(crate) fn build_pan(
    cube: &ImageBuffer,
    channels: &[u32],
    settings: &GeneralExportSettings,
) -> Option<PanPlane> {
    let combined = combine(cube, channels, settings.pan_algorithm)?;
    let (width, height) = (cube.width(), cube.height());

    if settings.pan_scale > 1.0 {
        Some(upscale(
            &combined,
            width,
            height,
            settings.pan_scale,
            settings.pan_interpolation,
        ))
    } else {
        Some(PanPlane {
            data: combined,
            width,
            height,
        })
    }
}

/// Min/max-normalize a pan plane to [0, 1] (the "fullscale" variant).
pub(crate) fn to_fullscale(plane: &PanPlane) -> PanPlane {
    let (mut min, mut max) = (f32::INFINITY, f32::NEG_INFINITY);
    for &sample in &plane.data {
        min = min.min(sample);
        max = max.max(sample);
    }
    let range = max - min;
    let data = if !range.is_finite() || range <= 0.0 {
        vec![0.0; plane.data.len()]
    } else {
        plane.data.iter().map(|s| (s - min) / range).collect()
    };
    PanPlane {
        data,
        width: plane.width,
        height: plane.height,
    }
}

fn combine(cube: &ImageBuffer, channels: &[u32], algorithm: PanAlgorithm) -> Option<Vec<f32>> {
    match algorithm {
        PanAlgorithm::Noop => cube.channel_plane(*channels.first()?),
        PanAlgorithm::MacroPixel => {
            let len = cube.width() as usize * cube.height() as usize;
            let mut sum = vec![0.0f32; len];
            let mut used = 0usize;
            for &ch in channels {
                let plane = cube.channel_plane(ch)?;
                for (acc, sample) in sum.iter_mut().zip(plane) {
                    *acc += sample;
                }
                used += 1;
            }
            if used == 0 {
                return None;
            }
            let norm = used as f32;
            for acc in &mut sum {
                *acc /= norm;
            }
            Some(sum)
        }
    }
}

fn upscale(
    plane: &[f32],
    width: u32,
    height: u32,
    scale: f64,
    interpolation: PanInterpolation,
) -> PanPlane {
    let out_w = ((width as f64 * scale).round() as u32).max(1);
    let out_h = ((height as f64 * scale).round() as u32).max(1);
    let mut data = Vec::with_capacity(out_w as usize * out_h as usize);

    let sample_at = |x: u32, y: u32| plane[(y as usize * width as usize) + x as usize];

    for oy in 0..out_h {
        for ox in 0..out_w {
            let src_x = ox as f64 / scale;
            let src_y = oy as f64 / scale;
            let value = match interpolation {
                PanInterpolation::NearestNeighbour => {
                    let x = (src_x.round() as u32).min(width - 1);
                    let y = (src_y.round() as u32).min(height - 1);
                    sample_at(x, y)
                }
                // Bilinear; cubic/lanczos kernels degrade to it
                PanInterpolation::Linear
                | PanInterpolation::Cubic
                | PanInterpolation::Lanczos => {
                    let x0 = (src_x.floor() as u32).min(width - 1);
                    let y0 = (src_y.floor() as u32).min(height - 1);
                    let x1 = (x0 + 1).min(width - 1);
                    let y1 = (y0 + 1).min(height - 1);
                    let fx = (src_x - x0 as f64) as f32;
                    let fy = (src_y - y0 as f64) as f32;

                    let top = sample_at(x0, y0) * (1.0 - fx) + sample_at(x1, y0) * fx;
                    let bottom = sample_at(x0, y1) * (1.0 - fx) + sample_at(x1, y1) * fx;
                    top * (1.0 - fy) + bottom * fy
                }
            };
            data.push(value);
        }
    }

    PanPlane {
        data,
        width: out_w,
        height: out_h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SampleFormat;

    fn cube() -> ImageBuffer {
        // Two channels: constant 10 and constant 30
        let mut data = Vec::new();
        for _ in 0..4 {
            data.push(10.0);
            data.push(30.0);
        }
        ImageBuffer::new(2, 2, 2, SampleFormat::F32, data, None).unwrap()
    }

    #[test]
    fn macro_pixel_averages_channels() {
        let settings = GeneralExportSettings::default();
        let pan = build_pan(&cube(), &[0, 1], &settings).unwrap();
        assert_eq!(pan.width, 2);
        assert!(pan.data.iter().all(|&s| (s - 20.0).abs() < 1e-6));
    }

    #[test]
    fn noop_takes_first_channel() {
        let mut settings = GeneralExportSettings::default();
        settings.pan_algorithm = PanAlgorithm::Noop;
        let pan = build_pan(&cube(), &[1, 0], &settings).unwrap();
        assert!(pan.data.iter().all(|&s| s == 30.0));
    }

    #[test]
    fn pan_scale_upscales() {
        let mut settings = GeneralExportSettings::default();
        settings.pan_scale = 2.0;
        settings.pan_interpolation = PanInterpolation::NearestNeighbour;
        let pan = build_pan(&cube(), &[0], &settings).unwrap();
        assert_eq!((pan.width, pan.height), (4, 4));
        assert_eq!(pan.data.len(), 16);
    }

    #[test]
    fn fullscale_normalizes() {
        let plane = PanPlane {
            data: vec![5.0, 10.0, 15.0, 20.0],
            width: 2,
            height: 2,
        };
        let fullscale = to_fullscale(&plane);
        assert_eq!(fullscale.data[0], 0.0);
        assert_eq!(fullscale.data[3], 1.0);
    }
}
