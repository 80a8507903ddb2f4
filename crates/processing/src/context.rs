//! ProcessingContext - stateful cube re-processing.
//!
//! Holds the reference table and target mode, answers the capability
//! predicate, and applies the configured correction to a measurement in
//! place. Re-processing always starts from the pristine raw cube, which is
//! stashed under the `raw` data plane on first apply.

use std::collections::HashMap;

use tracing::{debug, instrument};

use contracts::{
    DataValue, ImageBuffer, Measurement, MeasurementFlags, PipelineError, ProcessingMode,
    ReferenceType, Result, SessionItemType, CUBE_PLANE, RAW_PLANE, VIEW_PLANE,
};
use session_store::{Calibration, SessionReader};

use crate::ops;

/// Preview planes are decimated to at most this many pixels per side.
const PREVIEW_MAX_DIM: u32 = 64;

/// Mode and knobs applied by [`ProcessingContext::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessingArgs {
    pub processing_mode: ProcessingMode,
    /// Allow apply to proceed when reference integration times differ
    /// (the mismatch is flagged on the measurement instead of failing)
    pub allow_recalib: bool,
}

/// Stateful configurator for cube re-processing.
pub struct ProcessingContext {
    references: HashMap<ReferenceType, Measurement>,
    args: ProcessingArgs,
    distance_mm: Option<f64>,
    calibration_id: String,
}

impl ProcessingContext {
    /// Empty context with default (Raw) args.
    pub fn new() -> Self {
        Self {
            references: HashMap::new(),
            args: ProcessingArgs::default(),
            distance_mm: None,
            calibration_id: String::new(),
        }
    }

    /// Context bound to a factory calibration.
    pub fn from_calibration(calibration: &Calibration) -> Self {
        let mut ctx = Self::new();
        ctx.calibration_id = calibration.id.clone();
        ctx
    }

    /// Context bound to a session file.
    ///
    /// Reference measurements stored in the session are pre-loaded into the
    /// reference table.
    pub fn from_session(session: &SessionReader) -> Result<Self> {
        let mut ctx = Self::new();
        ctx.calibration_id = session.name().to_string();

        for (index, kind) in session.reference_kinds().into_iter().enumerate() {
            let reference = session.get_measurement(index, SessionItemType::References)?;
            debug!(kind = ?kind, name = %reference.name(), "preloaded session reference");
            ctx.references.insert(kind, reference);
        }
        Ok(ctx)
    }

    /// Context bound to a single measurement (its serial number becomes the id).
    pub fn from_measurement(measurement: &Measurement) -> Self {
        let mut ctx = Self::new();
        ctx.calibration_id = measurement.metadata.serial_number.clone();
        ctx
    }

    pub fn calibration_id(&self) -> &str {
        &self.calibration_id
    }

    /// Store a reference of the given kind, replacing any prior one.
    ///
    /// # Errors
    /// Image-bearing reference kinds (dark/white/sprad) must carry a cube.
    pub fn set_reference(&mut self, measurement: Measurement, kind: ReferenceType) -> Result<()> {
        let needs_cube = !matches!(kind, ReferenceType::Distance);
        if needs_cube && measurement.cube().is_none() {
            return Err(PipelineError::missing_plane(CUBE_PLANE));
        }
        debug!(kind = ?kind, name = %measurement.name(), "reference set");
        self.references.insert(kind, measurement);
        Ok(())
    }

    pub fn clear_reference(&mut self, kind: ReferenceType) {
        self.references.remove(&kind);
    }

    pub fn has_reference(&self, kind: ReferenceType) -> bool {
        self.references.contains_key(&kind)
    }

    pub fn reference(&self, kind: ReferenceType) -> Option<&Measurement> {
        self.references.get(&kind)
    }

    pub fn set_processing_mode(&mut self, mode: ProcessingMode) {
        self.args.processing_mode = mode;
    }

    pub fn processing_mode(&self) -> ProcessingMode {
        self.args.processing_mode
    }

    pub fn set_processing_args(&mut self, args: ProcessingArgs) {
        self.args = args;
    }

    pub fn processing_args(&self) -> ProcessingArgs {
        self.args
    }

    pub fn set_allow_recalib(&mut self, allow: bool) {
        self.args.allow_recalib = allow;
    }

    pub fn allow_recalib(&self) -> bool {
        self.args.allow_recalib
    }

    /// Configure the object distance used on the next apply. Millimetres.
    pub fn calc_distance(&mut self, distance_mm: f64) -> Result<()> {
        if distance_mm <= 0.0 {
            return Err(PipelineError::config_validation(
                "distance_mm",
                format!("distance must be positive, got {distance_mm}"),
            ));
        }
        self.distance_mm = Some(distance_mm);
        Ok(())
    }

    pub fn distance_mm(&self) -> Option<f64> {
        self.distance_mm
    }

    /// Pure capability predicate for processing `measurement` with `args`.
    ///
    /// Non-strict checks that a raw cube is available and every reference the
    /// target mode needs is present. Strict additionally requires matching
    /// cube geometry and integration times between measurement and
    /// references.
    pub fn is_capable(&self, measurement: &Measurement, args: ProcessingArgs, strict: bool) -> bool {
        if self.raw_cube_of(measurement).is_none() {
            return false;
        }

        for kind in args.processing_mode.required_references() {
            let Some(reference) = self.references.get(kind) else {
                return false;
            };
            if strict {
                let Some(raw) = self.raw_cube_of(measurement) else {
                    return false;
                };
                let Some(ref_cube) = reference.cube() else {
                    return false;
                };
                if ref_cube.dims() != raw.dims() {
                    return false;
                }
                if !ops::inttime_matches(
                    measurement.metadata.integration_time_ms,
                    reference.metadata.integration_time_ms,
                ) {
                    return false;
                }
            }
        }
        true
    }

    /// Missing references for a mode (for diagnostics and errors).
    fn missing_references(&self, mode: ProcessingMode) -> Vec<ReferenceType> {
        mode.required_references()
            .iter()
            .filter(|kind| !self.references.contains_key(kind))
            .copied()
            .collect()
    }

    /// Re-process the measurement to the configured mode, in place.
    ///
    /// The measurement's cube plane is replaced, its processing mode and
    /// quality flags are stamped, and the configured distance (if any) is
    /// written into the metadata. Callers are expected to check
    /// [`is_capable`](Self::is_capable) first.
    ///
    /// # Errors
    /// [`PipelineError::IncapableMode`] when the capability gate fails;
    /// [`PipelineError::BufferGeometry`] when a reference cube does not match
    /// the measurement geometry.
    #[instrument(
        name = "processing_apply",
        skip(self, measurement),
        fields(mode = ?self.args.processing_mode, mesu = %measurement.name())
    )]
    pub fn apply(&self, measurement: &mut Measurement) -> Result<()> {
        let mode = self.args.processing_mode;
        if !self.is_capable(measurement, self.args, false) {
            return Err(PipelineError::IncapableMode {
                mode,
                missing: self.missing_references(mode),
            });
        }

        let raw = match self.raw_cube_of(measurement) {
            Some(raw) => raw.clone(),
            None => return Err(PipelineError::missing_plane(RAW_PLANE)),
        };

        let mut flags = ops::saturation_flags(&raw);

        let processed = match mode {
            ProcessingMode::Raw => raw.clone(),
            ProcessingMode::Preview => {
                let view = ops::preview(&raw, PREVIEW_MAX_DIM);
                measurement.insert_data(VIEW_PLANE, DataValue::Image(view.clone()));
                view
            }
            ProcessingMode::DarkSubtract => {
                let dark = self.reference_cube(ReferenceType::Dark)?;
                flags.insert(self.inttime_flags(measurement, ReferenceType::Dark)?);
                ops::dark_subtract(&raw, dark)?
            }
            ProcessingMode::Reflectance => {
                let dark = self.reference_cube(ReferenceType::Dark)?;
                let white = self.reference_cube(ReferenceType::White)?;
                flags.insert(self.inttime_flags(measurement, ReferenceType::Dark)?);
                flags.insert(self.inttime_flags(measurement, ReferenceType::White)?);
                let (cube, op_flags) = ops::reflectance(&raw, dark, white)?;
                flags.insert(op_flags.bits());
                cube
            }
            ProcessingMode::SpectralRadiance => {
                let dark = self.reference_cube(ReferenceType::Dark)?;
                let gain = self.reference_cube(ReferenceType::SpRad)?;
                flags.insert(self.inttime_flags(measurement, ReferenceType::Dark)?);
                ops::spectral_radiance(
                    &raw,
                    dark,
                    gain,
                    measurement.metadata.integration_time_ms,
                )?
            }
        };

        // Keep the pristine raw cube around so later applies can re-process
        if measurement.data(RAW_PLANE).is_none() && mode != ProcessingMode::Raw {
            measurement.insert_data(RAW_PLANE, DataValue::Image(raw));
        }

        measurement.set_cube(processed);
        measurement.metadata.processing_mode = mode;
        measurement.metadata.flags = flags;
        if let Some(distance) = self.distance_mm {
            measurement.metadata.distance_mm = Some(distance);
        }

        debug!(flags = ?measurement.metadata.flags.names(), "apply complete");
        Ok(())
    }

    /// The pristine raw cube of a measurement: the stashed `raw` plane, or
    /// the cube itself while the measurement is still in Raw mode.
    fn raw_cube_of<'m>(&self, measurement: &'m Measurement) -> Option<&'m ImageBuffer> {
        if let Some(DataValue::Image(raw)) = measurement.data(RAW_PLANE) {
            return Some(raw);
        }
        if measurement.processing_mode() == ProcessingMode::Raw {
            return measurement.cube();
        }
        None
    }

    fn reference_cube(&self, kind: ReferenceType) -> Result<&ImageBuffer> {
        self.references
            .get(&kind)
            .and_then(|m| m.cube())
            .ok_or_else(|| PipelineError::missing_plane(CUBE_PLANE))
    }

    /// Integration-time mismatch between measurement and a reference, as the
    /// reference-specific flag bit (zero when matching or `allow_recalib`
    /// compensates downstream).
    fn inttime_flags(&self, measurement: &Measurement, kind: ReferenceType) -> Result<u32> {
        let reference = self
            .references
            .get(&kind)
            .ok_or(PipelineError::IncapableMode {
                mode: self.args.processing_mode,
                missing: vec![kind],
            })?;
        if ops::inttime_matches(
            measurement.metadata.integration_time_ms,
            reference.metadata.integration_time_ms,
        ) {
            return Ok(0);
        }
        Ok(match kind {
            ReferenceType::Dark => MeasurementFlags::DARK_INTTIME,
            ReferenceType::White => MeasurementFlags::WHITE_INTTIME,
            ReferenceType::WhiteDark => MeasurementFlags::WHITEDARK_INTTIME,
            _ => MeasurementFlags::POOR_REFERENCE,
        })
    }
}

impl Default for ProcessingContext {
    fn default() -> Self {
        Self::new()
    }
}
