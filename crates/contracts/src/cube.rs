//! ImageBuffer - dense spectral sample volume.
//!
//! Samples are stored channel-interleaved: index = ((y * width) + x) * channels + c.
//! Dimensions are fixed at creation; processing mutates samples in place.

use serde::{Deserialize, Serialize};

use crate::{PipelineError, Result};

/// Source sample format of a cube plane.
///
/// All samples are held as `f32` in memory; the tag records what the sensor
/// (or file) originally delivered so exporters can pick sensible output types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    U8,
    #[default]
    U16,
    U32,
    F32,
}

/// A 3-dimensional image buffer indexed by `(x, y, channel)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    channels: u32,
    source_format: SampleFormat,
    /// Channel-interleaved samples, `width * height * channels` long
    data: Vec<f32>,
    /// Center wavelength per channel, nanometres
    wavelengths_nm: Option<Vec<u32>>,
}

impl ImageBuffer {
    /// Create a buffer from existing samples.
    ///
    /// # Errors
    /// Fails when `data.len() != width * height * channels` or when the
    /// wavelength table length does not match the channel count.
    pub fn new(
        width: u32,
        height: u32,
        channels: u32,
        source_format: SampleFormat,
        data: Vec<f32>,
        wavelengths_nm: Option<Vec<u32>>,
    ) -> Result<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(PipelineError::buffer_geometry(format!(
                "sample count {} does not match {width}x{height}x{channels} (= {expected})",
                data.len()
            )));
        }
        if let Some(wl) = &wavelengths_nm {
            if wl.len() != channels as usize {
                return Err(PipelineError::buffer_geometry(format!(
                    "wavelength table length {} does not match channel count {channels}",
                    wl.len()
                )));
            }
        }
        Ok(Self {
            width,
            height,
            channels,
            source_format,
            data,
            wavelengths_nm,
        })
    }

    /// Create a buffer filled with a constant value.
    pub fn filled(width: u32, height: u32, channels: u32, value: f32) -> Self {
        let len = width as usize * height as usize * channels as usize;
        Self {
            width,
            height,
            channels,
            source_format: SampleFormat::F32,
            data: vec![value; len],
            wavelengths_nm: None,
        }
    }

    /// Attach a per-channel wavelength table.
    pub fn with_wavelengths(mut self, wavelengths_nm: Vec<u32>) -> Result<Self> {
        if wavelengths_nm.len() != self.channels as usize {
            return Err(PipelineError::buffer_geometry(format!(
                "wavelength table length {} does not match channel count {}",
                wavelengths_nm.len(),
                self.channels
            )));
        }
        self.wavelengths_nm = Some(wavelengths_nm);
        Ok(self)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// `(width, height, channels)`
    pub fn dims(&self) -> (u32, u32, u32) {
        (self.width, self.height, self.channels)
    }

    pub fn source_format(&self) -> SampleFormat {
        self.source_format
    }

    pub fn set_source_format(&mut self, format: SampleFormat) {
        self.source_format = format;
    }

    /// Center wavelength of a channel, if a table is attached.
    pub fn wavelength_nm(&self, channel: u32) -> Option<u32> {
        self.wavelengths_nm
            .as_ref()
            .and_then(|wl| wl.get(channel as usize).copied())
    }

    pub fn wavelengths_nm(&self) -> Option<&[u32]> {
        self.wavelengths_nm.as_deref()
    }

    /// Sample at `(x, y, channel)`, `None` when out of range.
    pub fn get(&self, x: u32, y: u32, channel: u32) -> Option<f32> {
        if x >= self.width || y >= self.height || channel >= self.channels {
            return None;
        }
        Some(self.data[self.index(x, y, channel)])
    }

    /// Sample at `(x, y, channel)`.
    ///
    /// # Panics
    /// Panics when the coordinates are out of range; use [`get`](Self::get)
    /// for checked access.
    pub fn at(&self, x: u32, y: u32, channel: u32) -> f32 {
        assert!(
            x < self.width && y < self.height && channel < self.channels,
            "sample ({x}, {y}, {channel}) out of {}x{}x{}",
            self.width,
            self.height,
            self.channels
        );
        self.data[self.index(x, y, channel)]
    }

    pub fn set(&mut self, x: u32, y: u32, channel: u32, value: f32) {
        let idx = self.index(x, y, channel);
        self.data[idx] = value;
    }

    /// Flat view of all samples (channel-interleaved).
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    /// Mutable flat view of all samples.
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn num_samples(&self) -> usize {
        self.data.len()
    }

    /// Extract a single channel as a `width * height` plane (row-major).
    pub fn channel_plane(&self, channel: u32) -> Option<Vec<f32>> {
        if channel >= self.channels {
            return None;
        }
        let mut plane = Vec::with_capacity(self.width as usize * self.height as usize);
        let stride = self.channels as usize;
        let offset = channel as usize;
        for px in self.data.chunks_exact(stride) {
            plane.push(px[offset]);
        }
        Some(plane)
    }

    fn index(&self, x: u32, y: u32, channel: u32) -> usize {
        ((y as usize * self.width as usize) + x as usize) * self.channels as usize
            + channel as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_wrong_sample_count() {
        let result = ImageBuffer::new(2, 2, 3, SampleFormat::U16, vec![0.0; 11], None);
        assert!(result.is_err());
    }

    #[test]
    fn new_rejects_wrong_wavelength_count() {
        let result = ImageBuffer::new(1, 1, 3, SampleFormat::U16, vec![0.0; 3], Some(vec![500]));
        assert!(result.is_err());
    }

    #[test]
    fn indexing_is_channel_interleaved() {
        let data: Vec<f32> = (0..2 * 2 * 2).map(|v| v as f32).collect();
        let buf = ImageBuffer::new(2, 2, 2, SampleFormat::F32, data, None).unwrap();

        assert_eq!(buf.at(0, 0, 0), 0.0);
        assert_eq!(buf.at(0, 0, 1), 1.0);
        assert_eq!(buf.at(1, 0, 0), 2.0);
        assert_eq!(buf.at(0, 1, 0), 4.0);
        assert_eq!(buf.at(1, 1, 1), 7.0);
    }

    #[test]
    fn channel_plane_extracts_band() {
        let data: Vec<f32> = (0..2 * 1 * 3).map(|v| v as f32).collect();
        let buf = ImageBuffer::new(2, 1, 3, SampleFormat::F32, data, None).unwrap();

        assert_eq!(buf.channel_plane(1).unwrap(), vec![1.0, 4.0]);
        assert!(buf.channel_plane(3).is_none());
    }

    #[test]
    fn wavelength_lookup() {
        let buf = ImageBuffer::filled(1, 1, 2, 0.0)
            .with_wavelengths(vec![450, 650])
            .unwrap();
        assert_eq!(buf.wavelength_nm(1), Some(650));
        assert_eq!(buf.wavelength_nm(2), None);
    }
}
