use csv::WriterBuilder;
use std::path::Path;

use super::constants::NULL_MARKER;
use super::error::WriterError;
use super::micrograph::{Catalog, GridSquareIndex};
use super::statistics::{MeanStd, ModeStatistics, Statistics};

const TABLE_HEADER: [&str; 7] = [
    "Micrograph Name",
    "Micrograph Index",
    "Grid Square Name",
    "Grid Square Index",
    "Number of Particles",
    "Percent Transmission",
    "Applied Defocus",
];
const GRID_SQUARE_HEADER: [&str; 2] = ["Grid Square Index", "Grid Square Name"];

/// Floats keep their decimal point (100.0, not 100) so the columns read as floats
fn format_float(value: f64) -> String {
    format!("{value:?}")
}

fn format_optional(value: Option<f64>) -> String {
    match value {
        Some(v) => format_float(v),
        None => String::from(NULL_MARKER),
    }
}

/// Write the per-micrograph table as CSV, one row per micrograph in sequence order
pub fn write_micrograph_table(path: &Path, catalog: &Catalog) -> Result<(), WriterError> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(TABLE_HEADER)?;
    for record in catalog.iter() {
        writer.write_record([
            record.name.clone(),
            record.sequence_index.to_string(),
            record.grid_square_name.clone(),
            record.grid_square_index.to_string(),
            record.particle_count.to_string(),
            format_optional(record.percent_transmission),
            format_optional(record.applied_defocus),
        ])?;
    }
    writer.flush()?;
    log::info!("Saved main table to {}", path.display());
    Ok(())
}

/// Write the grid square index mapping as tab separated text, ascending by index
pub fn write_grid_square_indices(path: &Path, index: &GridSquareIndex) -> Result<(), WriterError> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(GRID_SQUARE_HEADER)?;
    for (grid_square_index, name) in index.iter() {
        writer.write_record([grid_square_index.to_string(), name.to_string()])?;
    }
    writer.flush()?;
    log::info!("Saved grid square indices to {}", path.display());
    Ok(())
}

fn write_mean_std_rows<L: ToString>(
    path: &Path,
    label_header: &str,
    rows: &[(L, MeanStd)],
) -> Result<(), WriterError> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record([label_header, "Mean", "Standard Deviation", "Micrographs"])?;
    for (label, stat) in rows {
        writer.write_record([
            label.to_string(),
            format_float(stat.mean),
            format_float(stat.std),
            stat.count.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_mode_statistics(dir: &Path, stats: &ModeStatistics) -> Result<(), WriterError> {
    let tag = stats.tag();
    write_mean_std_rows(
        &dir.join(format!("avg_particles_{tag}.csv")),
        "Grid Square Index",
        &stats.particles_by_grid_square,
    )?;
    let defocus_rows: Vec<(String, MeanStd)> = stats
        .particles_by_defocus
        .iter()
        .map(|(defocus, stat)| (format_float(*defocus), *stat))
        .collect();
    write_mean_std_rows(
        &dir.join(format!("particles_vs_defocus_{tag}.csv")),
        "Applied Defocus",
        &defocus_rows,
    )?;
    write_mean_std_rows(
        &dir.join(format!("transmission_vs_gridsquare_{tag}.csv")),
        "Grid Square Index",
        &stats.transmission_by_grid_square,
    )?;
    Ok(())
}

/// Write every aggregate series to CSV files in dir, ready for plotting
pub fn write_statistics(dir: &Path, stats: &Statistics) -> Result<(), WriterError> {
    write_mode_statistics(dir, &stats.all_micrographs)?;
    write_mode_statistics(dir, &stats.no_empty)?;

    let mut writer = WriterBuilder::new().from_path(dir.join("percent_empty.csv"))?;
    writer.write_record(["Grid Square Index", "Percent Empty"])?;
    for (index, percent) in stats.percent_empty.iter() {
        writer.write_record([index.to_string(), format_float(*percent)])?;
    }
    writer.flush()?;

    let mut writer = WriterBuilder::new().from_path(dir.join("total_particles.csv"))?;
    writer.write_record(["Grid Square Index", "Total Particles"])?;
    for (index, total) in stats.total_particles.iter() {
        writer.write_record([index.to_string(), total.to_string()])?;
    }
    writer.flush()?;

    let mut writer = WriterBuilder::new().from_path(dir.join("particles_vs_transmission.csv"))?;
    writer.write_record([
        "Grid Square Index",
        "Percent Transmission",
        "Number of Particles",
    ])?;
    for point in stats.transmission_points.iter() {
        writer.write_record([
            point.grid_square_index.to_string(),
            format_float(point.percent_transmission),
            point.particle_count.to_string(),
        ])?;
    }
    writer.flush()?;

    log::info!("Saved summary statistics to {}", dir.display());
    Ok(())
}
