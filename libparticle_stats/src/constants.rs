// Naming conventions of the EPU acquisition tree:
// <root>/GridSquare_<id>/Data/FoilHole_<hole>_Data_<a>_<b>_<YYYYMMDD>_<HHMMSS>_Fractions.<ext>
// <root>/GridSquare_<id>/Data/FoilHole_<hole>_Data_<a>_<b>_<YYYYMMDD>_<HHMMSS>.xml

/// Directory holding the movies and sidecars of a grid square
pub const DATA_DIR_NAME: &str = "Data";
/// Prefix of every movie and sidecar file
pub const MOVIE_PREFIX: &str = "FoilHole";
/// Marker of a (motion-correctable) movie
pub const MOVIE_SUFFIX: &str = "Fractions";
/// Removed from a micrograph name to get the name of its sidecar
pub const SIDECAR_STRIP: &str = "_Fractions";
pub const SIDECAR_EXTENSION: &str = "xml";
/// Directory name prefix of a grid square
pub const GRID_SQUARE_PREFIX: &str = "GridSquare";

/// Pattern capturing the acquisition timestamp (YYYYMMDD_HHMMSS) from a movie path
pub const TIMESTAMP_PATTERN: &str = r"FoilHole_.*_Data_.*_.*_(\d{8}_\d{6})_Fractions";

/// A line of the particle file containing this refers to a particle image
pub const PARTICLE_LINE_TOKEN: char = '@';

/// Sidecar key of the raw dose measured at the camera
pub const DOSE_KEY: &str = "DoseOnCamera";
/// Sidecar key of the applied defocus, stored in meters
pub const DEFOCUS_KEY: &str = "AppliedDefocus";
pub const METERS_TO_MICROMETERS: f64 = 1.0e6;

/// Literal written into the table for absent values
pub const NULL_MARKER: &str = "None";

pub const TABLE_FILE_NAME: &str = "allmicstats.csv";
pub const GRID_SQUARE_FILE_NAME: &str = "gridsquareindices.txt";
pub const DEFAULT_PARTICLES_FILE: &str = "particles.star";
