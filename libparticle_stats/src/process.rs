use std::path::PathBuf;
use std::sync::mpsc::Sender;

use super::catalog::CatalogBuilder;
use super::config::Config;
use super::constants::{GRID_SQUARE_FILE_NAME, TABLE_FILE_NAME};
use super::error::{ConfigError, ProcessorError};
use super::micrograph::Catalog;
use super::particle_joiner::{JoinSummary, MatchMode, ParticleCountJoiner};
use super::raw_path::{locate_raw_data_path, resolve_true_root};
use super::sidecar::{EnrichSummary, MetadataEnricher};
use super::statistics::Statistics;
use super::status::{Stage, StageStatus};
use super::table_writer::{write_grid_square_indices, write_micrograph_table, write_statistics};
use super::transmission::normalize_transmission;

/// Everything a run needs, resolved once from the Config and handed to each stage
#[derive(Debug, Clone)]
pub struct RunContext {
    pub raw_data_root: PathBuf,
    pub particles_file: PathBuf,
    pub match_mode: MatchMode,
    pub output_directory: PathBuf,
    pub csv_directory: PathBuf,
}

impl RunContext {
    /// Resolve the raw data root and output locations from a Config
    pub fn from_config(config: &Config) -> Result<Self, ProcessorError> {
        let given_path = match (&config.raw_data_path, &config.job_path) {
            (Some(path), _) => path.clone(),
            (None, Some(job)) => locate_raw_data_path(job)?,
            (None, None) => return Err(ConfigError::NoRawDataPath.into()),
        };
        let raw_data_root = resolve_true_root(&given_path)?;
        Ok(Self {
            raw_data_root,
            particles_file: config.get_particles_file()?,
            match_mode: config.match_mode,
            output_directory: config.get_output_directory()?,
            csv_directory: config.get_csv_directory()?,
        })
    }
}

/// What happened during a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub n_micrographs: usize,
    pub n_grid_squares: usize,
    pub particles: JoinSummary,
    pub sidecars: EnrichSummary,
    pub max_raw_dose: Option<f64>,
}

/// The enriched catalog of a run along with its summary
#[derive(Debug, Clone)]
pub struct RunResult {
    pub catalog: Catalog,
    pub statistics: Statistics,
    pub summary: RunSummary,
}

/// Build and enrich the catalog (stages 1 through 4).
///
/// Fails if the raw data root holds no micrographs at all; everything else is recovered
/// per micrograph or per line.
pub fn process_catalog(
    ctx: &RunContext,
    tx: Option<&Sender<StageStatus>>,
) -> Result<(Catalog, RunSummary), ProcessorError> {
    let report = |stage: Stage| -> Result<(), ProcessorError> {
        if let Some(tx) = tx {
            tx.send(StageStatus::finished(stage))?;
        }
        Ok(())
    };

    log::info!("Cataloging movies under {}...", ctx.raw_data_root.display());
    let mut catalog = CatalogBuilder::new(&ctx.raw_data_root)?.build()?;
    if catalog.is_empty() {
        return Err(ProcessorError::EmptyCatalog(ctx.raw_data_root.clone()));
    }
    report(Stage::Catalog)?;

    log::info!("Counting particles from {}...", ctx.particles_file.display());
    let particles =
        ParticleCountJoiner::new(ctx.match_mode).join_file(&mut catalog, &ctx.particles_file)?;
    report(Stage::Particles)?;

    log::info!("Reading micrograph metadata...");
    let sidecars = MetadataEnricher::new(&ctx.raw_data_root)?.enrich(&mut catalog);
    report(Stage::Sidecars)?;

    let max_raw_dose = normalize_transmission(&mut catalog);
    report(Stage::Transmission)?;

    let summary = RunSummary {
        n_micrographs: catalog.len(),
        n_grid_squares: catalog.grid_squares.len(),
        particles,
        sidecars,
        max_raw_dose,
    };
    Ok((catalog, summary))
}

/// Run the whole pipeline for a Config and write the outputs.
///
/// Progress is sent over tx after every stage.
pub fn process(config: &Config, tx: &Sender<StageStatus>) -> Result<RunResult, ProcessorError> {
    let ctx = RunContext::from_config(config)?;
    let (catalog, summary) = process_catalog(&ctx, Some(tx))?;

    log::info!("Computing statistics...");
    let statistics = Statistics::compute(&catalog);
    tx.send(StageStatus::finished(Stage::Statistics))?;

    std::fs::create_dir_all(&ctx.csv_directory)?;
    write_micrograph_table(&ctx.csv_directory.join(TABLE_FILE_NAME), &catalog)?;
    write_grid_square_indices(
        &ctx.csv_directory.join(GRID_SQUARE_FILE_NAME),
        &catalog.grid_squares,
    )?;
    write_statistics(&ctx.csv_directory, &statistics)?;
    tx.send(StageStatus::finished(Stage::Writing))?;

    log::info!(
        "Done! {} micrographs, {} particles. All outputs saved in {}",
        summary.n_micrographs,
        statistics.total(),
        ctx.output_directory.display()
    );
    Ok(RunResult {
        catalog,
        statistics,
        summary,
    })
}
