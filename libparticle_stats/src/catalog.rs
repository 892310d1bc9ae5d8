use fxhash::FxHashSet;
use regex::Regex;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::PrimitiveDateTime;

use super::constants::{
    DATA_DIR_NAME, MOVIE_PREFIX, MOVIE_SUFFIX, SIDECAR_EXTENSION, TIMESTAMP_PATTERN,
};
use super::error::CatalogError;
use super::micrograph::Catalog;

/// A movie found on disk, before ordering
#[derive(Debug, Clone)]
struct MovieEntry {
    name: String,
    grid_square: String,
    acquired_at: Option<PrimitiveDateTime>,
}

/// CatalogBuilder scans an EPU acquisition tree and produces the skeleton Catalog.
///
/// Movies are expected at `<root>/<GridSquare_*>/Data/FoilHole*Fractions*`. Each movie
/// becomes one record, ordered by the acquisition timestamp embedded in its name.
/// Movies without a parsable timestamp are kept, but placed after all timestamped
/// movies in the order they were discovered.
#[derive(Debug)]
pub struct CatalogBuilder {
    root: PathBuf,
    timestamp_re: Regex,
}

impl CatalogBuilder {
    /// Create a new CatalogBuilder for a raw data root
    pub fn new(root: &Path) -> Result<Self, CatalogError> {
        Ok(Self {
            root: root.to_path_buf(),
            timestamp_re: Regex::new(TIMESTAMP_PATTERN)?,
        })
    }

    /// Scan the root and build the catalog.
    ///
    /// An unreachable root or a root without movies gives an empty Catalog; it is up to
    /// the caller to decide if that is fatal.
    pub fn build(&self) -> Result<Catalog, CatalogError> {
        let movie_paths = self.get_movie_list()?;
        if movie_paths.is_empty() {
            log::warn!(
                "No movies matching {}*{}* found under {}",
                MOVIE_PREFIX,
                MOVIE_SUFFIX,
                self.root.display()
            );
            return Ok(Catalog::default());
        }

        let mut seen_names: FxHashSet<String> = FxHashSet::default();
        let mut entries: Vec<MovieEntry> = Vec::with_capacity(movie_paths.len());
        let mut n_unsortable = 0;
        for path in movie_paths.iter() {
            let entry = match self.read_movie_path(path) {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("{e}; skipping");
                    continue;
                }
            };
            if !seen_names.insert(entry.name.clone()) {
                log::warn!("{}; skipping", CatalogError::DuplicateName(entry.name));
                continue;
            }
            if entry.acquired_at.is_none() {
                log::warn!(
                    "Movie {} has no valid acquisition timestamp, it will be placed at the end",
                    path.display()
                );
                n_unsortable += 1;
            }
            entries.push(entry);
        }

        // Stable, so equal timestamps keep discovery order. Unsortable movies go last.
        entries.sort_by_key(|e| (e.acquired_at.is_none(), e.acquired_at));

        let catalog = Catalog::from_ordered(
            entries
                .iter()
                .map(|e| (e.name.as_str(), e.grid_square.as_str(), e.acquired_at)),
        );
        log::info!(
            "Cataloged {} micrographs in {} grid squares ({} without timestamp)",
            catalog.len(),
            catalog.grid_squares.len(),
            n_unsortable
        );
        Ok(catalog)
    }

    /// Get all movie paths under the root in lexicographic order, excluding sidecars
    fn get_movie_list(&self) -> Result<Vec<PathBuf>, CatalogError> {
        let pattern = format!(
            "{}/*/{}/{}*{}*",
            glob::Pattern::escape(&self.root.to_string_lossy()),
            DATA_DIR_NAME,
            MOVIE_PREFIX,
            MOVIE_SUFFIX
        );
        let mut movies: Vec<PathBuf> = Vec::new();
        for item in glob::glob(&pattern)? {
            match item {
                Ok(path) => {
                    let is_sidecar = path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(SIDECAR_EXTENSION));
                    if !is_sidecar && path.is_file() {
                        movies.push(path);
                    }
                }
                Err(e) => log::warn!("Could not read {}: {}", e.path().display(), e.error()),
            }
        }
        movies.sort();
        Ok(movies)
    }

    /// Pull the name, grid square and timestamp out of a movie path
    fn read_movie_path(&self, path: &Path) -> Result<MovieEntry, CatalogError> {
        let name = micrograph_name(path)
            .ok_or_else(|| CatalogError::BadMoviePath(path.to_path_buf()))?;
        let grid_square = grid_square_name(path)
            .ok_or_else(|| CatalogError::BadMoviePath(path.to_path_buf()))?;
        let acquired_at = self.extract_timestamp(path);
        Ok(MovieEntry {
            name,
            grid_square,
            acquired_at,
        })
    }

    /// Extract the acquisition timestamp (YYYYMMDD_HHMMSS) from a movie file name.
    ///
    /// Returns None if the name does not follow the convention or the digits are not a
    /// real date and time.
    pub fn extract_timestamp(&self, path: &Path) -> Option<PrimitiveDateTime> {
        let file_name = path.file_name()?.to_string_lossy();
        let captures = self.timestamp_re.captures(&file_name)?;
        let stamp = captures.get(1)?.as_str();
        let format = format_description!("[year][month][day]_[hour][minute][second]");
        PrimitiveDateTime::parse(stamp, &format).ok()
    }
}

/// The micrograph name is the movie file name without its extension
pub fn micrograph_name(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().to_string())
}

/// The grid square is the directory which holds the Data directory of the movie
pub fn grid_square_name(path: &Path) -> Option<String> {
    let data_dir = path.parent()?;
    if data_dir.file_name()? != DATA_DIR_NAME {
        return None;
    }
    data_dir
        .parent()?
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, grid_square: &str, file_name: &str) {
        let dir = root.join(grid_square).join(DATA_DIR_NAME);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file_name), b"").unwrap();
    }

    fn movie(hole: u32, stamp: &str) -> String {
        format!("FoilHole_{hole}_Data_100_5_{stamp}_Fractions.tiff")
    }

    #[test]
    fn test_timestamp_extraction() {
        let builder = CatalogBuilder::new(Path::new("/none")).unwrap();
        let ts = builder.extract_timestamp(Path::new(&movie(1, "20240312_142501")));
        assert_eq!(ts.map(|t| t.hour()), Some(14));
        assert_eq!(ts.map(|t| t.day()), Some(12));
        assert!(builder
            .extract_timestamp(Path::new("FoilHole_1_Data_Fractions.tiff"))
            .is_none());
        // Month 13 is not a date
        assert!(builder
            .extract_timestamp(Path::new(&movie(1, "20241312_142501")))
            .is_none());
    }

    #[test]
    fn test_grid_square_from_path() {
        let path = Path::new("/raw/Images-Disc1/GridSquare_77/Data/FoilHole_1_Fractions.tiff");
        assert_eq!(grid_square_name(path).as_deref(), Some("GridSquare_77"));
        assert_eq!(
            micrograph_name(path).as_deref(),
            Some("FoilHole_1_Fractions")
        );
        assert_eq!(grid_square_name(Path::new("/raw/FoilHole_1.tiff")), None);
    }

    #[test]
    fn test_build_orders_by_time() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "GridSquare_2", &movie(3, "20240101_120500"));
        touch(root, "GridSquare_1", &movie(1, "20240101_120000"));
        touch(root, "GridSquare_1", &movie(2, "20240101_121000"));
        touch(root, "GridSquare_1", "FoilHole_1_Data_100_5_20240101_120000.xml");

        let catalog = CatalogBuilder::new(root).unwrap().build().unwrap();
        assert_eq!(catalog.len(), 3);
        let squares: Vec<&str> = catalog
            .iter()
            .map(|r| r.grid_square_name.as_str())
            .collect();
        assert_eq!(squares, vec!["GridSquare_1", "GridSquare_2", "GridSquare_1"]);
        let indices: Vec<usize> = catalog.iter().map(|r| r.grid_square_index).collect();
        assert_eq!(indices, vec![1, 2, 1]);
        assert_eq!(
            catalog.records[1].name,
            "FoilHole_3_Data_100_5_20240101_120500_Fractions"
        );
    }

    #[test]
    fn test_unsortable_movies_go_last() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "GridSquare_1", "FoilHole_0_Data_Fractions.tiff");
        touch(root, "GridSquare_1", &movie(5, "20240101_120000"));
        touch(root, "GridSquare_2", &movie(6, "20230101_120000"));

        let catalog = CatalogBuilder::new(root).unwrap().build().unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.records[0].grid_square_name, "GridSquare_2");
        assert_eq!(catalog.records[2].name, "FoilHole_0_Data_Fractions");
        assert!(catalog.records[2].acquired_at.is_none());
        assert_eq!(catalog.records[2].sequence_index, 3);
    }

    #[test]
    fn test_duplicate_name_is_skipped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let stem = "FoilHole_4_Data_100_5_20240101_120000_Fractions";
        touch(root, "GridSquare_1", &format!("{stem}.tiff"));
        touch(root, "GridSquare_1", &format!("{stem}.mrc"));
        touch(root, "GridSquare_1", &movie(5, "20240101_120100"));

        let catalog = CatalogBuilder::new(root).unwrap().build().unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.iter().filter(|r| r.name == stem).count(), 1);
        let sequence: Vec<usize> = catalog.iter().map(|r| r.sequence_index).collect();
        assert_eq!(sequence, vec![1, 2]);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let catalog = CatalogBuilder::new(Path::new("/this/path/does/not/exist"))
            .unwrap()
            .build()
            .unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.grid_squares.is_empty());
    }
}
