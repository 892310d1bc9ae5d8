use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::constants::{MOVIE_PREFIX, MOVIE_SUFFIX, PARTICLE_LINE_TOKEN};
use super::error::ParticleFileError;
use super::micrograph::Catalog;

/// How a name fragment from the particle file is matched against micrograph names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    /// First micrograph (in sequence order) whose name contains the fragment
    #[default]
    Substring,
    /// The micrograph whose name is exactly FoilHole<fragment>Fractions
    Exact,
}

/// Counters of a particle join
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinSummary {
    pub particle_lines: usize,
    pub matched: usize,
    pub unmatched: usize,
}

/// Extract the partial micrograph name from a particle line.
///
/// This is the text after the first `FoilHole`, up to the following `Fractions` or the
/// next `FoilHole`, whichever comes first. A line whose first `FoilHole` is followed by
/// neither has no fragment.
pub fn extract_fragment(line: &str) -> Option<&str> {
    let start = line.find(MOVIE_PREFIX)? + MOVIE_PREFIX.len();
    let rest = &line[start..];
    match rest.find(MOVIE_PREFIX) {
        Some(next) => {
            let segment = &rest[..next];
            Some(segment.find(MOVIE_SUFFIX).map_or(segment, |end| &segment[..end]))
        }
        None => rest.find(MOVIE_SUFFIX).map(|end| &rest[..end]),
    }
}

/// ParticleCountJoiner reads a particle assignment (.star) file and counts particles per micrograph.
///
/// There is no shared key between the particle file and the movie names, so each particle
/// line is attributed to a micrograph by a name fragment. In the default Substring mode the
/// first micrograph containing the fragment wins, even if others would also match.
#[derive(Debug, Clone, Default)]
pub struct ParticleCountJoiner {
    mode: MatchMode,
}

impl ParticleCountJoiner {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    /// Join the particle file at path into the catalog.
    ///
    /// A missing file is not an error; every count simply stays at zero.
    pub fn join_file(
        &self,
        catalog: &mut Catalog,
        path: &Path,
    ) -> Result<JoinSummary, ParticleFileError> {
        if !path.exists() {
            log::warn!(
                "Particle file {} does not exist; all particle counts will be zero",
                path.display()
            );
            return Ok(JoinSummary::default());
        }
        let file = File::open(path)?;
        let summary = self.join_reader(catalog, BufReader::new(file))?;
        log::info!(
            "Read {} particle lines from {}: {} matched, {} unmatched",
            summary.particle_lines,
            path.display(),
            summary.matched,
            summary.unmatched
        );
        Ok(summary)
    }

    /// Join particle lines from any buffered reader into the catalog
    pub fn join_reader<R: BufRead>(
        &self,
        catalog: &mut Catalog,
        reader: R,
    ) -> Result<JoinSummary, ParticleFileError> {
        let mut summary = JoinSummary::default();
        // Fragments repeat once per particle, so remember where each one landed
        let mut matches: FxHashMap<String, Option<usize>> = FxHashMap::default();
        for raw_line in reader.split(b'\n') {
            let raw_line = raw_line?;
            let line = String::from_utf8_lossy(&raw_line);
            if !line.contains(PARTICLE_LINE_TOKEN) {
                continue;
            }
            summary.particle_lines += 1;

            let target = match extract_fragment(&line) {
                Some(fragment) if !fragment.is_empty() => {
                    if let Some(found) = matches.get(fragment) {
                        *found
                    } else {
                        let found = self.find_record(catalog, fragment);
                        matches.insert(fragment.to_string(), found);
                        found
                    }
                }
                _ => None,
            };

            match target {
                Some(row) => {
                    catalog.records[row].particle_count += 1;
                    summary.matched += 1;
                }
                None => {
                    log::debug!("No micrograph matches particle line: {}", line.trim_end());
                    summary.unmatched += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Position of the record a fragment belongs to
    fn find_record(&self, catalog: &Catalog, fragment: &str) -> Option<usize> {
        match self.mode {
            MatchMode::Substring => catalog.iter().position(|r| r.name.contains(fragment)),
            MatchMode::Exact => {
                let full_name = format!("{MOVIE_PREFIX}{fragment}{MOVIE_SUFFIX}");
                catalog.iter().position(|r| r.name == full_name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_catalog() -> Catalog {
        Catalog::from_ordered([
            ("FoilHole_11_Data_1_2_20240101_120000_Fractions", "A", None),
            ("FoilHole_12_Data_1_2_20240101_120100_Fractions", "A", None),
            ("FoilHole_13_Data_1_2_20240101_120200_Fractions", "B", None),
        ])
    }

    const STAR: &str = "\
data_particles

loop_
_rlnImageName #1
_rlnMicrographName #2
000001@J12/extract/FoilHole_12_Data_1_2_20240101_120100_Fractions_patch_aligned_doseweighted_particles.mrc J12/FoilHole_12_Data_1_2_20240101_120100_Fractions.mrc
000002@J12/extract/FoilHole_12_Data_1_2_20240101_120100_Fractions_patch_aligned_doseweighted_particles.mrc J12/FoilHole_12_Data_1_2_20240101_120100_Fractions.mrc
000001@J12/extract/FoilHole_99_Data_1_2_20240101_120100_Fractions_particles.mrc J12/x.mrc
";

    #[test]
    fn test_fragment_extraction() {
        assert_eq!(
            extract_fragment("1@J1/FoilHole_5_Data_7_Fractions_x.mrc"),
            Some("_5_Data_7_")
        );
        assert_eq!(extract_fragment("1@J1/nothing.mrc"), None);
        assert_eq!(extract_fragment("1@FoilHole_5_end\n"), None);
        // A second FoilHole ends the fragment
        assert_eq!(
            extract_fragment("1@J1/FoilHole_5_x.mrc J1/FoilHole_6_Fractions.mrc"),
            Some("_5_x.mrc J1/")
        );
        assert_eq!(
            extract_fragment("1@FoilHole_5_FoilHole_6_Fractions.mrc"),
            Some("_5_")
        );
    }

    #[test]
    fn test_counts_particles() {
        let mut catalog = make_catalog();
        let summary = ParticleCountJoiner::default()
            .join_reader(&mut catalog, Cursor::new(STAR))
            .unwrap();
        assert_eq!(summary.particle_lines, 3);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.unmatched, 1);
        let counts: Vec<u64> = catalog.iter().map(|r| r.particle_count).collect();
        assert_eq!(counts, vec![0, 2, 0]);
    }

    #[test]
    fn test_single_line_single_match() {
        let mut catalog = make_catalog();
        let line = "7@J3/FoilHole_13_Data_1_2_20240101_120200_Fractions_particles.mrc\n";
        ParticleCountJoiner::default()
            .join_reader(&mut catalog, Cursor::new(line))
            .unwrap();
        let counts: Vec<u64> = catalog.iter().map(|r| r.particle_count).collect();
        assert_eq!(counts, vec![0, 0, 1]);
    }

    #[test]
    fn test_substring_first_match_wins() {
        // "_1" is contained in all three names; only the first gets the particle
        let mut catalog = make_catalog();
        let line = "1@FoilHole_1Fractions\n";
        ParticleCountJoiner::new(MatchMode::Substring)
            .join_reader(&mut catalog, Cursor::new(line))
            .unwrap();
        let counts: Vec<u64> = catalog.iter().map(|r| r.particle_count).collect();
        assert_eq!(counts, vec![1, 0, 0]);

        let mut catalog = make_catalog();
        let summary = ParticleCountJoiner::new(MatchMode::Exact)
            .join_reader(&mut catalog, Cursor::new(line))
            .unwrap();
        assert_eq!(summary.unmatched, 1);
        assert!(catalog.iter().all(|r| r.particle_count == 0));
    }

    #[test]
    fn test_exact_mode_matches_full_name() {
        let mut catalog = make_catalog();
        let line = "1@J1/FoilHole_11_Data_1_2_20240101_120000_Fractions_particles.mrc\n";
        let summary = ParticleCountJoiner::new(MatchMode::Exact)
            .join_reader(&mut catalog, Cursor::new(line))
            .unwrap();
        assert_eq!(summary.matched, 1);
        assert_eq!(catalog.records[0].particle_count, 1);
    }

    #[test]
    fn test_line_without_fractions_is_unmatched() {
        let mut catalog = make_catalog();
        let line = "1@J1/FoilHole_11_Data_1_2\n";
        let summary = ParticleCountJoiner::default()
            .join_reader(&mut catalog, Cursor::new(line))
            .unwrap();
        assert_eq!(summary.particle_lines, 1);
        assert_eq!(summary.unmatched, 1);
        assert!(catalog.iter().all(|r| r.particle_count == 0));
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let mut catalog = make_catalog();
        let summary = ParticleCountJoiner::default()
            .join_file(&mut catalog, Path::new("/no/such/particles.star"))
            .unwrap();
        assert_eq!(summary, JoinSummary::default());
        assert!(catalog.iter().all(|r| r.particle_count == 0));
    }
}
