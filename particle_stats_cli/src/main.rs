use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use libparticle_stats::config::Config;
use libparticle_stats::process::process;
use libparticle_stats::status::StageStatus;

fn make_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

fn main() {
    // Create a cli
    let matches = Command::new("particle_stats_cli")
        .about("Per-micrograph particle statistics for an EPU session")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        log::error!("A configuration path is required (--path)");
        return;
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => log::info!("Done."),
            Err(e) => log::error!("Could not write template config: {e}"),
        }
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    match &config.raw_data_path {
        Some(p) => log::info!("Raw Data Path: {}", p.to_string_lossy()),
        None => log::info!("Raw Data Path: from job"),
    }
    if let Some(p) = &config.job_path {
        log::info!("Job Path: {}", p.to_string_lossy());
    }
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!("Match Mode: {:?}", config.match_mode);

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}") {
        pb.set_style(style);
    }
    let (tx, rx) = mpsc::channel::<StageStatus>();
    // Spawn the task!
    let handle = std::thread::spawn(move || process(&config, &tx));

    // The channel closes when the worker is done (or failed)
    for status in rx.iter() {
        pb.set_position((status.progress * 100.0) as u64);
        pb.set_message(status.stage.to_string());
    }

    match handle.join() {
        Ok(result) => match result {
            Ok(run) => log::info!(
                "Successfully processed {} micrographs in {} grid squares ({} particles matched, {} unmatched)",
                run.summary.n_micrographs,
                run.summary.n_grid_squares,
                run.summary.particles.matched,
                run.summary.particles.unmatched
            ),
            Err(e) => log::error!("Processing failed with error: {e}"),
        },
        Err(_) => log::error!("Failed to join processing task!"),
    }

    pb.finish();

    log::info!("Done.");
}
