//! Cube correction arithmetic.
//!
//! All operations take the pristine raw cube as input and produce a new cube
//! plus the quality flags observed along the way. Reference cubes must match
//! the raw cube's geometry exactly.

use contracts::{ImageBuffer, MeasurementFlags, PipelineError, Result, SampleFormat};

/// Relative tolerance when comparing integration times.
const INTTIME_TOLERANCE: f64 = 1e-3;

/// Fraction of full-scale above which a sample counts as saturated.
const SATURATION_THRESHOLD: f32 = 0.98;

/// Fraction of saturated samples above which a cube is flagged overilluminated.
const SATURATION_RATIO: f64 = 0.005;

/// Check two integration times for practical equality.
pub fn inttime_matches(a_ms: f64, b_ms: f64) -> bool {
    (a_ms - b_ms).abs() <= INTTIME_TOLERANCE * a_ms.abs().max(b_ms.abs()).max(1.0)
}

/// Flag raw cubes with a significant saturated-sample fraction.
pub fn saturation_flags(raw: &ImageBuffer) -> MeasurementFlags {
    let full_scale = match raw.source_format() {
        SampleFormat::U8 => 255.0,
        SampleFormat::U16 => 65535.0,
        SampleFormat::U32 => u32::MAX as f32,
        // No defined full scale for float sources
        SampleFormat::F32 => return MeasurementFlags::empty(),
    };
    let threshold = full_scale * SATURATION_THRESHOLD;
    let saturated = raw.samples().iter().filter(|&&s| s >= threshold).count();

    let mut flags = MeasurementFlags::empty();
    if (saturated as f64) / (raw.num_samples() as f64) > SATURATION_RATIO {
        flags.insert(MeasurementFlags::OVERILLUMINATED);
    }
    flags
}

fn check_geometry(raw: &ImageBuffer, reference: &ImageBuffer, what: &str) -> Result<()> {
    if raw.dims() != reference.dims() {
        return Err(PipelineError::buffer_geometry(format!(
            "{what} reference is {:?}, measurement is {:?}",
            reference.dims(),
            raw.dims()
        )));
    }
    Ok(())
}

/// `max(0, raw - dark)`
pub fn dark_subtract(raw: &ImageBuffer, dark: &ImageBuffer) -> Result<ImageBuffer> {
    check_geometry(raw, dark, "dark")?;

    let mut out = raw.clone();
    for (sample, d) in out.samples_mut().iter_mut().zip(dark.samples()) {
        *sample = (*sample - d).max(0.0);
    }
    out.set_source_format(SampleFormat::F32);
    Ok(out)
}

/// `(raw - dark) / (white - dark)`, clamped at zero.
///
/// Samples where the white reference does not exceed the dark reference carry
/// no usable signal and are zeroed; when that happens the result is flagged
/// with a poor reference.
pub fn reflectance(
    raw: &ImageBuffer,
    dark: &ImageBuffer,
    white: &ImageBuffer,
) -> Result<(ImageBuffer, MeasurementFlags)> {
    check_geometry(raw, dark, "dark")?;
    check_geometry(raw, white, "white")?;

    let mut flags = MeasurementFlags::empty();
    let mut degenerate = 0usize;

    let mut out = raw.clone();
    for ((sample, d), w) in out
        .samples_mut()
        .iter_mut()
        .zip(dark.samples())
        .zip(white.samples())
    {
        let denom = w - d;
        if denom <= f32::EPSILON {
            *sample = 0.0;
            degenerate += 1;
        } else {
            *sample = ((*sample - d) / denom).max(0.0);
        }
    }

    if degenerate > 0 {
        flags.insert(MeasurementFlags::POOR_REFERENCE);
    }
    out.set_source_format(SampleFormat::F32);
    Ok((out, flags))
}

/// Dark-subtracted counts scaled by the per-sample radiometric gain and
/// normalized by the exposure time.
pub fn spectral_radiance(
    raw: &ImageBuffer,
    dark: &ImageBuffer,
    gain: &ImageBuffer,
    integration_time_ms: f64,
) -> Result<ImageBuffer> {
    check_geometry(raw, dark, "dark")?;
    check_geometry(raw, gain, "sprad")?;

    if integration_time_ms <= 0.0 {
        return Err(PipelineError::buffer_geometry(format!(
            "integration time {integration_time_ms} ms is not positive"
        )));
    }
    let exposure_s = (integration_time_ms / 1000.0) as f32;

    let mut out = raw.clone();
    for ((sample, d), g) in out
        .samples_mut()
        .iter_mut()
        .zip(dark.samples())
        .zip(gain.samples())
    {
        *sample = ((*sample - d).max(0.0) * g) / exposure_s;
    }
    out.set_source_format(SampleFormat::F32);
    Ok(out)
}

/// Nearest-neighbour decimation to at most `max_dim` in width and height.
///
/// Channels are kept; the wavelength table carries over.
pub fn preview(raw: &ImageBuffer, max_dim: u32) -> ImageBuffer {
    let (width, height, channels) = raw.dims();
    let stride = width.max(height).div_ceil(max_dim).max(1);
    let out_w = width.div_ceil(stride);
    let out_h = height.div_ceil(stride);

    let mut data = Vec::with_capacity((out_w * out_h * channels) as usize);
    for y in 0..out_h {
        for x in 0..out_w {
            for c in 0..channels {
                data.push(raw.at(x * stride, y * stride, c));
            }
        }
    }

    let mut out = ImageBuffer::new(out_w, out_h, channels, raw.source_format(), data, None)
        .expect("decimated geometry is consistent by construction");
    if let Some(wl) = raw.wavelengths_nm() {
        out = out.with_wavelengths(wl.to_vec()).expect("channel count unchanged");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(fill: f32) -> ImageBuffer {
        ImageBuffer::new(2, 2, 2, SampleFormat::U16, vec![fill; 8], None).unwrap()
    }

    #[test]
    fn dark_subtract_clamps_at_zero() {
        let out = dark_subtract(&cube(100.0), &cube(130.0)).unwrap();
        assert!(out.samples().iter().all(|&s| s == 0.0));

        let out = dark_subtract(&cube(200.0), &cube(50.0)).unwrap();
        assert!(out.samples().iter().all(|&s| s == 150.0));
    }

    #[test]
    fn reflectance_scaling() {
        let (out, flags) = reflectance(&cube(550.0), &cube(100.0), &cube(1000.0)).unwrap();
        for &s in out.samples() {
            assert!((s - 0.5).abs() < 1e-6);
        }
        assert!(flags.is_empty());
    }

    #[test]
    fn reflectance_degenerate_white_flags_poor_reference() {
        let (out, flags) = reflectance(&cube(550.0), &cube(100.0), &cube(100.0)).unwrap();
        assert!(out.samples().iter().all(|&s| s == 0.0));
        assert!(flags.contains(MeasurementFlags::POOR_REFERENCE));
    }

    #[test]
    fn geometry_mismatch_rejected() {
        let other = ImageBuffer::new(3, 2, 2, SampleFormat::U16, vec![0.0; 12], None).unwrap();
        assert!(dark_subtract(&cube(1.0), &other).is_err());
    }

    #[test]
    fn radiance_normalizes_by_exposure() {
        let out = spectral_radiance(&cube(300.0), &cube(100.0), &cube(2.0), 500.0).unwrap();
        // (300 - 100) * 2 / 0.5s
        assert!(out.samples().iter().all(|&s| (s - 800.0).abs() < 1e-3));
    }

    #[test]
    fn preview_decimates() {
        let raw = ImageBuffer::new(
            8,
            4,
            1,
            SampleFormat::U16,
            (0..32).map(|v| v as f32).collect(),
            None,
        )
        .unwrap();
        let view = preview(&raw, 4);
        assert_eq!(view.dims(), (4, 2, 1));
        assert_eq!(view.at(0, 0, 0), raw.at(0, 0, 0));
        assert_eq!(view.at(1, 1, 0), raw.at(2, 2, 0));
    }

    #[test]
    fn saturation_flagging() {
        let mut raw = cube(65000.0);
        assert!(saturation_flags(&raw).contains(MeasurementFlags::OVERILLUMINATED));

        raw.samples_mut().fill(1000.0);
        assert!(saturation_flags(&raw).is_empty());
    }

    #[test]
    fn inttime_tolerance() {
        assert!(inttime_matches(100.0, 100.05));
        assert!(!inttime_matches(100.0, 120.0));
    }
}
