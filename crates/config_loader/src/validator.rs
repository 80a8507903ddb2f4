//! Blueprint validation
//!
//! Rules:
//! - exporter names unique and non-empty
//! - acquisition parameters positive (fps in internal trigger mode,
//!   integration time, queue size)
//! - processing mode prerequisites covered by configured references
//! - worker limits consistent (soft <= hard, both > 0)

use std::collections::HashSet;

use contracts::{
    OperationMode, PipelineBlueprint, PipelineError, ReferenceType, SourceConfig,
};

/// Validate a PipelineBlueprint.
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    validate_source(blueprint)?;
    validate_acquisition(blueprint)?;
    validate_processing(blueprint)?;
    validate_exporters(blueprint)?;
    validate_worker(blueprint)?;
    Ok(())
}

fn validate_source(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    match &blueprint.source {
        SourceConfig::Session { path, .. } => {
            if path.as_os_str().is_empty() {
                return Err(PipelineError::config_validation(
                    "source.path",
                    "session path cannot be empty",
                ));
            }
        }
        SourceConfig::Simulated {
            width,
            height,
            channels,
            ..
        } => {
            if *width == 0 || *height == 0 || *channels == 0 {
                return Err(PipelineError::config_validation(
                    "source",
                    format!("cube geometry must be positive, got {width}x{height}x{channels}"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_acquisition(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    let acq = &blueprint.acquisition;

    if acq.integration_time_ms <= 0.0 {
        return Err(PipelineError::config_validation(
            "acquisition.integration_time_ms",
            format!("integration time must be > 0, got {}", acq.integration_time_ms),
        ));
    }

    if acq.operation_mode == OperationMode::Internal && acq.fps <= 0.0 {
        return Err(PipelineError::config_validation(
            "acquisition.fps",
            format!("fps must be > 0 in internal trigger mode, got {}", acq.fps),
        ));
    }

    if acq.queue_size == 0 {
        return Err(PipelineError::config_validation(
            "acquisition.queue_size",
            "queue size must be > 0",
        ));
    }

    Ok(())
}

fn validate_processing(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    let processing = &blueprint.processing;

    let configured: HashSet<ReferenceType> = processing
        .references
        .iter()
        .map(|reference| reference.kind)
        .collect();

    for required in processing.mode.required_references() {
        if !configured.contains(required) {
            return Err(PipelineError::config_validation(
                "processing.references",
                format!(
                    "mode {:?} requires a {:?} reference, none configured",
                    processing.mode, required
                ),
            ));
        }
    }

    for (idx, reference) in processing.references.iter().enumerate() {
        if reference.path.as_os_str().is_empty() {
            return Err(PipelineError::config_validation(
                format!("processing.references[{idx}].path"),
                "reference path cannot be empty",
            ));
        }
    }

    if let Some(distance) = processing.distance_mm {
        if distance <= 0.0 {
            return Err(PipelineError::config_validation(
                "processing.distance_mm",
                format!("distance must be > 0, got {distance}"),
            ));
        }
    }

    Ok(())
}

fn validate_exporters(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    for (idx, exporter) in blueprint.exporters.iter().enumerate() {
        if exporter.name.is_empty() {
            return Err(PipelineError::config_validation(
                format!("exporters[{idx}].name"),
                "exporter name cannot be empty",
            ));
        }
        if !seen.insert(&exporter.name) {
            return Err(PipelineError::config_validation(
                format!("exporters[name={}]", exporter.name),
                "duplicate exporter name",
            ));
        }
        if exporter.export_dir.as_os_str().is_empty() {
            return Err(PipelineError::config_validation(
                format!("exporters[{}].export_dir", exporter.name),
                "export_dir cannot be empty",
            ));
        }
    }
    Ok(())
}

fn validate_worker(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    let worker = &blueprint.worker;

    if worker.hard_limit == 0 {
        return Err(PipelineError::config_validation(
            "worker.hard_limit",
            "hard limit must be > 0",
        ));
    }
    if worker.soft_limit > worker.hard_limit {
        return Err(PipelineError::config_validation(
            "worker.soft_limit / worker.hard_limit",
            format!(
                "soft limit ({}) must be <= hard limit ({})",
                worker.soft_limit, worker.hard_limit
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        AcquisitionSettings, ConfigVersion, ExporterConfig, ExporterKind, ProcessingMode,
        ProcessingSettings, ReferenceEntry, WorkerLimits,
    };
    use std::path::PathBuf;

    fn minimal_blueprint() -> PipelineBlueprint {
        PipelineBlueprint {
            version: ConfigVersion::V1,
            source: SourceConfig::Simulated {
                width: 8,
                height: 8,
                channels: 4,
                wavelength_start_nm: 450,
                wavelength_step_nm: 10,
                warmup_ms: 0,
            },
            acquisition: AcquisitionSettings::default(),
            processing: ProcessingSettings::default(),
            exporters: vec![ExporterConfig {
                name: "rec".into(),
                kind: ExporterKind::Cube,
                export_dir: PathBuf::from("./out"),
                params: Default::default(),
            }],
            worker: WorkerLimits::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_blueprint()).is_ok());
    }

    #[test]
    fn test_duplicate_exporter_name() {
        let mut bp = minimal_blueprint();
        bp.exporters.push(bp.exporters[0].clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate exporter name"), "got: {err}");
    }

    #[test]
    fn test_zero_fps_in_internal_mode() {
        let mut bp = minimal_blueprint();
        bp.acquisition.operation_mode = OperationMode::Internal;
        bp.acquisition.fps = 0.0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("fps"), "got: {err}");
    }

    #[test]
    fn test_zero_fps_tolerated_in_software_mode() {
        let mut bp = minimal_blueprint();
        bp.acquisition.operation_mode = OperationMode::Software;
        bp.acquisition.fps = 0.0;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_reflectance_requires_references() {
        let mut bp = minimal_blueprint();
        bp.processing = ProcessingSettings {
            mode: ProcessingMode::Reflectance,
            references: vec![ReferenceEntry {
                kind: ReferenceType::Dark,
                path: PathBuf::from("./dark"),
            }],
            ..Default::default()
        };
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("White"), "got: {err}");

        bp.processing.references.push(ReferenceEntry {
            kind: ReferenceType::White,
            path: PathBuf::from("./white"),
        });
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_invalid_integration_time() {
        let mut bp = minimal_blueprint();
        bp.acquisition.integration_time_ms = -10.0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("integration time"), "got: {err}");
    }

    #[test]
    fn test_worker_limits() {
        let mut bp = minimal_blueprint();
        bp.worker.soft_limit = 200;
        bp.worker.hard_limit = 100;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("soft limit"), "got: {err}");
    }
}
