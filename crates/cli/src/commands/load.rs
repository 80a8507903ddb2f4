//! `load` command implementation: open a session, print one measurement.

use anyhow::{Context, Result};
use tracing::info;

use contracts::{DataValue, SessionItemType};
use session_store::SessionReader;

use crate::cli::LoadArgs;
use crate::commands::load_measurement;

/// Execute the `load` command
pub fn run_load(args: &LoadArgs) -> Result<()> {
    let reader = SessionReader::open(&args.session)
        .with_context(|| format!("Failed to open session at {}", args.session.display()))?;

    info!(
        session = reader.name(),
        frames = reader.size(SessionItemType::Frames),
        references = reader.size(SessionItemType::References),
        fps = reader.fps(),
        "session opened"
    );

    let item_type = if args.references {
        SessionItemType::References
    } else {
        SessionItemType::Frames
    };
    let measurement = load_measurement(&args.session, args.index, item_type)?;
    let metadata = &measurement.metadata;

    println!(
        "Measurement {} t={}ms mode={:?}",
        metadata.name, metadata.integration_time_ms, metadata.processing_mode
    );
    println!("  Captured: {}", metadata.capture_time);
    println!("  Serial: {}  Product: {}", metadata.serial_number, metadata.product_name);
    println!("  Averages: {}", metadata.averages);
    if let Some(distance) = metadata.distance_mm {
        println!("  Distance: {distance} mm");
    }
    if !metadata.flags.is_empty() {
        println!("  Flags: {}", metadata.flags.names().join(", "));
    }
    println!(
        "  Session: {} #{} seq {}",
        metadata.session.name, metadata.session.session_no, metadata.session.sequence_no
    );

    println!("  Data planes ({}):", measurement.data_count());
    for (key, value) in measurement.planes() {
        match value {
            DataValue::Image(buffer) => {
                let (w, h, c) = buffer.dims();
                let range = match (
                    buffer.wavelength_nm(0),
                    buffer.wavelength_nm(c.saturating_sub(1)),
                ) {
                    (Some(lo), Some(hi)) => format!(", {lo}-{hi} nm"),
                    _ => String::new(),
                };
                println!("    {key}: image {w}x{h}x{c}{range}");
            }
            DataValue::Text(text) => println!("    {key}: \"{text}\""),
            DataValue::Gps(gps) => println!(
                "    {key}: gps {:.5}, {:.5} @ {:.1} m",
                gps.latitude, gps.longitude, gps.altitude
            ),
            DataValue::SensorInfo(sensor) => println!(
                "    {key}: sensor readout {} ms, {:.1} C",
                sensor.readout_time_ms, sensor.temperature_c
            ),
        }
    }

    match measurement.thumbnail() {
        Some(thumb) => println!("  Thumbnail: {}x{}", thumb.width(), thumb.height()),
        None => println!("  No thumbnail available. Use cube instead!"),
    }

    Ok(())
}
