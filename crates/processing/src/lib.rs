//! # Processing
//!
//! Cube re-processing: the reference table, the capability predicate and the
//! in-place corrections (dark subtract, reflectance, spectral radiance,
//! preview decimation).
//!
//! Callers check capability before applying:
//!
//! ```ignore
//! let mut ctx = ProcessingContext::from_session(&session)?;
//! ctx.set_reference(dark, ReferenceType::Dark)?;
//! ctx.set_reference(white, ReferenceType::White)?;
//! ctx.set_processing_mode(ProcessingMode::Reflectance);
//!
//! if ctx.is_capable(&mesu, ctx.processing_args(), false) {
//!     ctx.apply(&mut mesu)?;
//! }
//! ```

mod context;
mod ops;

pub use context::{ProcessingArgs, ProcessingContext};
pub use ops::{dark_subtract, preview, reflectance, spectral_radiance};

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ImageBuffer, Measurement, MeasurementFlags, MeasurementMetadata, PipelineError,
        ProcessingMode, ReferenceType, SampleFormat,
    };

    fn measurement(name: &str, fill: f32, inttime_ms: f64) -> Measurement {
        let cube =
            ImageBuffer::new(2, 2, 2, SampleFormat::U16, vec![fill; 8], None).unwrap();
        Measurement::with_cube(MeasurementMetadata::new(name, inttime_ms), cube)
    }

    fn args(mode: ProcessingMode) -> ProcessingArgs {
        ProcessingArgs {
            processing_mode: mode,
            allow_recalib: false,
        }
    }

    #[test]
    fn capability_requires_references() {
        let mut ctx = ProcessingContext::new();
        let mesu = measurement("m", 500.0, 100.0);

        assert!(ctx.is_capable(&mesu, args(ProcessingMode::Raw), false));
        assert!(!ctx.is_capable(&mesu, args(ProcessingMode::Reflectance), false));

        ctx.set_reference(measurement("dark", 100.0, 100.0), ReferenceType::Dark)
            .unwrap();
        assert!(ctx.is_capable(&mesu, args(ProcessingMode::DarkSubtract), false));
        assert!(!ctx.is_capable(&mesu, args(ProcessingMode::Reflectance), false));

        ctx.set_reference(measurement("white", 900.0, 100.0), ReferenceType::White)
            .unwrap();
        assert!(ctx.is_capable(&mesu, args(ProcessingMode::Reflectance), false));
    }

    #[test]
    fn set_reference_overwrites_same_kind() {
        let mut ctx = ProcessingContext::new();
        ctx.set_reference(measurement("dark_a", 10.0, 100.0), ReferenceType::Dark)
            .unwrap();
        ctx.set_reference(measurement("dark_b", 20.0, 100.0), ReferenceType::Dark)
            .unwrap();

        assert_eq!(ctx.reference(ReferenceType::Dark).unwrap().name(), "dark_b");
    }

    #[test]
    fn apply_without_capability_fails() {
        let ctx = {
            let mut c = ProcessingContext::new();
            c.set_processing_mode(ProcessingMode::Reflectance);
            c
        };
        let mut mesu = measurement("m", 500.0, 100.0);

        let err = ctx.apply(&mut mesu).unwrap_err();
        match err {
            PipelineError::IncapableMode { mode, missing } => {
                assert_eq!(mode, ProcessingMode::Reflectance);
                assert!(missing.contains(&ReferenceType::Dark));
                assert!(missing.contains(&ReferenceType::White));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Mode untouched on failure
        assert_eq!(mesu.processing_mode(), ProcessingMode::Raw);
    }

    #[test]
    fn apply_stamps_configured_mode_and_scales() {
        let mut ctx = ProcessingContext::new();
        ctx.set_reference(measurement("dark", 100.0, 100.0), ReferenceType::Dark)
            .unwrap();
        ctx.set_reference(measurement("white", 1100.0, 100.0), ReferenceType::White)
            .unwrap();
        ctx.set_processing_mode(ProcessingMode::Reflectance);

        let mut mesu = measurement("m", 600.0, 100.0);
        assert!(ctx.is_capable(&mesu, ctx.processing_args(), false));
        ctx.apply(&mut mesu).unwrap();

        assert_eq!(mesu.processing_mode(), ProcessingMode::Reflectance);
        let cube = mesu.cube().unwrap();
        assert!((cube.at(0, 0, 0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn reprocessing_chains_from_pristine_raw() {
        let mut ctx = ProcessingContext::new();
        ctx.set_reference(measurement("dark", 100.0, 100.0), ReferenceType::Dark)
            .unwrap();
        ctx.set_reference(measurement("white", 1100.0, 100.0), ReferenceType::White)
            .unwrap();

        let mut mesu = measurement("m", 600.0, 100.0);

        ctx.set_processing_mode(ProcessingMode::DarkSubtract);
        ctx.apply(&mut mesu).unwrap();
        assert_eq!(mesu.cube().unwrap().at(0, 0, 0), 500.0);

        // Second apply must start from the raw counts again, not from the
        // dark-subtracted cube
        ctx.set_processing_mode(ProcessingMode::Reflectance);
        ctx.apply(&mut mesu).unwrap();
        assert!((mesu.cube().unwrap().at(0, 0, 0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn mismatched_dark_inttime_sets_flag() {
        let mut ctx = ProcessingContext::new();
        ctx.set_reference(measurement("dark", 100.0, 50.0), ReferenceType::Dark)
            .unwrap();
        ctx.set_processing_mode(ProcessingMode::DarkSubtract);

        let mut mesu = measurement("m", 600.0, 100.0);
        // Non-strict capability still holds; strict does not
        assert!(ctx.is_capable(&mesu, ctx.processing_args(), false));
        assert!(!ctx.is_capable(&mesu, ctx.processing_args(), true));

        ctx.apply(&mut mesu).unwrap();
        assert!(mesu
            .metadata
            .flags
            .contains(MeasurementFlags::DARK_INTTIME));
    }

    #[test]
    fn distance_is_written_on_apply() {
        let mut ctx = ProcessingContext::new();
        ctx.calc_distance(1000.0).unwrap();

        let mut mesu = measurement("m", 500.0, 100.0);
        assert_eq!(mesu.metadata.distance_mm, None);

        ctx.apply(&mut mesu).unwrap();
        assert_eq!(mesu.metadata.distance_mm, Some(1000.0));

        assert!(ctx.calc_distance(-5.0).is_err());
    }

    #[test]
    fn preview_produces_view_plane() {
        let mut ctx = ProcessingContext::new();
        ctx.set_processing_mode(ProcessingMode::Preview);

        let mut mesu = measurement("m", 500.0, 100.0);
        ctx.apply(&mut mesu).unwrap();

        assert_eq!(mesu.processing_mode(), ProcessingMode::Preview);
        assert!(mesu.thumbnail().is_some());
    }
}
