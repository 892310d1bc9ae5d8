//! # particle_stats
//!
//! particle_stats correlates the particles picked in a cryoSPARC job with the EPU
//! acquisition that produced the micrographs. It takes the raw EPU movie tree, the
//! particle assignment (.star) file exported from the job, and the per-micrograph
//! metadata XML files, and builds a single table with one row per micrograph: where
//! (which grid square) and when it was taken, how many particles were picked on it,
//! the approximate percent transmission, and the applied defocus. Grouped summary
//! statistics (per grid square and per defocus) are derived from that table.
//!
//! ## Installation
//!
//! Currently the only method of install is from source. If you have not used Rust
//! before, see the [Rust docs](https://www.rust-lang.org/tools/install) to install the
//! tool chain, then clone the repository.
//!
//! To build and install the CLI use `cargo install --path ./particle_stats_cli` from the
//! top level repository. To use the CLI see the `particle_stats_cli` README.
//!
//! ## Configuration
//!
//! A configuration is a YAML file of the following form:
//!
//! ```yml
//! raw_data_path: /path/to/raw/data
//! job_path: /path/to/project/J123
//! particles_path: null
//! output_path: .
//! match_mode: Substring
//! ```
//!
//! - `raw_data_path`: The EPU raw data directory (the one holding the `GridSquare_*`
//! folders) or a cryoSPARC import directory of symlinks to the movies. If null, it is
//! looked up from the `workspaces.json` of the job's project.
//! - `job_path`: The cryoSPARC job the particles come from. Only used to find the raw
//! data and to name the output folder (`particle_stats_J123`).
//! - `particles_path`: The .star file with the particles (for example from
//! `cs2star`). If null, `<output>/inputs/particles.star` is used. A missing file is not
//! an error; every micrograph will simply have zero particles.
//! - `output_path`: Directory in which the output folder is created.
//! - `match_mode`: `Substring` (default) attributes each particle to the first
//! micrograph whose name contains the name fragment of the particle. `Exact` requires
//! the full movie name to match.
//!
//! ## Raw data layout
//!
//! ```text
//! Images-Disc1
//! |---- GridSquare_#
//! |    |---- Data
//! |    |    |---- FoilHole_#_Data_#_#_YYYYMMDD_HHMMSS_Fractions.tiff (movie)
//! |    |    |---- FoilHole_#_Data_#_#_YYYYMMDD_HHMMSS.xml (metadata)
//! ```
//!
//! Micrographs are ordered by the timestamp in their name. Movies whose name has no valid
//! timestamp are kept and placed after all others. Grid squares are numbered in the order
//! they were first imaged.
//!
//! ## Output
//!
//! ```text
//! particle_stats_J#
//! |---- output_CSVs
//! |    |---- allmicstats.csv
//! |    |---- gridsquareindices.txt
//! |    |---- avg_particles_{allmics,noempty}.csv
//! |    |---- particles_vs_defocus_{allmics,noempty}.csv
//! |    |---- transmission_vs_gridsquare_{allmics,noempty}.csv
//! |    |---- percent_empty.csv
//! |    |---- total_particles.csv
//! |    |---- particles_vs_transmission.csv
//! ```
//!
//! `allmicstats.csv` has the columns `Micrograph Name, Micrograph Index, Grid Square Name,
//! Grid Square Index, Number of Particles, Percent Transmission, Applied Defocus`. Values
//! which could not be determined are written as `None`.
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod micrograph;
pub mod particle_joiner;
pub mod process;
pub mod raw_path;
pub mod sidecar;
pub mod statistics;
pub mod status;
pub mod table_writer;
pub mod transmission;
