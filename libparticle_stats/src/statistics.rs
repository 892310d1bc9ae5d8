use std::fmt;

use super::micrograph::{Catalog, MicrographRecord};

/// Mean and (population) standard deviation of a group.
///
/// An empty group has mean 0 and std 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanStd {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

impl MeanStd {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|x| x - mean).fold(0f64, |s, x| s + x * x) / n).sqrt();
        Self {
            mean,
            std,
            count: values.len(),
        }
    }
}

/// Label of a group in the per-grid-square particle statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupLabel {
    GridSquare(usize),
    All,
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupLabel::GridSquare(index) => write!(f, "{index}"),
            GroupLabel::All => write!(f, "All"),
        }
    }
}

/// One micrograph in the transmission vs. particles scatter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmissionPoint {
    pub grid_square_index: usize,
    pub percent_transmission: f64,
    pub particle_count: u64,
}

fn is_selected(record: &MicrographRecord, include_empty: bool) -> bool {
    include_empty || !record.is_empty()
}

fn grid_square_indices(catalog: &Catalog) -> impl Iterator<Item = usize> {
    1..=catalog.grid_squares.len()
}

/// Particle count mean/std per grid square, followed by an "All" group over every
/// selected micrograph.
pub fn particle_stats_by_grid_square(
    catalog: &Catalog,
    include_empty: bool,
) -> Vec<(GroupLabel, MeanStd)> {
    let mut groups: Vec<(GroupLabel, MeanStd)> = grid_square_indices(catalog)
        .map(|index| {
            let values: Vec<f64> = catalog
                .iter()
                .filter(|r| r.grid_square_index == index && is_selected(r, include_empty))
                .map(|r| r.particle_count as f64)
                .collect();
            (GroupLabel::GridSquare(index), MeanStd::from_values(&values))
        })
        .collect();

    let overall: Vec<f64> = catalog
        .iter()
        .filter(|r| is_selected(r, include_empty))
        .map(|r| r.particle_count as f64)
        .collect();
    groups.push((GroupLabel::All, MeanStd::from_values(&overall)));
    groups
}

/// Percentage of micrographs without particles per grid square, always over all micrographs
pub fn percent_empty_by_grid_square(catalog: &Catalog) -> Vec<(usize, f64)> {
    grid_square_indices(catalog)
        .map(|index| {
            let (n_total, n_empty) = catalog
                .iter()
                .filter(|r| r.grid_square_index == index)
                .fold((0usize, 0usize), |(total, empty), r| {
                    (total + 1, empty + r.is_empty() as usize)
                });
            let percent = if n_total == 0 {
                0.0
            } else {
                100.0 * n_empty as f64 / n_total as f64
            };
            (index, percent)
        })
        .collect()
}

/// Sum of particles per grid square, always over all micrographs
pub fn total_particles_by_grid_square(catalog: &Catalog) -> Vec<(usize, u64)> {
    grid_square_indices(catalog)
        .map(|index| {
            let total = catalog
                .iter()
                .filter(|r| r.grid_square_index == index)
                .map(|r| r.particle_count)
                .sum();
            (index, total)
        })
        .collect()
}

/// Particle count of every micrograph, in sequence order
pub fn particle_distribution(catalog: &Catalog) -> Vec<u64> {
    catalog.iter().map(|r| r.particle_count).collect()
}

/// Particle count mean/std per distinct applied defocus, ascending by defocus.
///
/// Micrographs without a defocus are left out.
pub fn particle_stats_by_defocus(catalog: &Catalog, include_empty: bool) -> Vec<(f64, MeanStd)> {
    let selected: Vec<(f64, f64)> = catalog
        .iter()
        .filter(|r| is_selected(r, include_empty))
        .filter_map(|r| r.applied_defocus.map(|d| (d, r.particle_count as f64)))
        .collect();

    let mut defocus_values: Vec<f64> = selected.iter().map(|(d, _)| *d).collect();
    defocus_values.sort_by(|a, b| a.total_cmp(b));
    defocus_values.dedup_by(|a, b| *a == *b);

    defocus_values
        .into_iter()
        .map(|defocus| {
            let values: Vec<f64> = selected
                .iter()
                .filter(|(d, _)| *d == defocus)
                .map(|(_, n)| *n)
                .collect();
            (defocus, MeanStd::from_values(&values))
        })
        .collect()
}

/// Percent transmission mean/std per grid square, over micrographs where it is defined
pub fn transmission_stats_by_grid_square(
    catalog: &Catalog,
    include_empty: bool,
) -> Vec<(usize, MeanStd)> {
    grid_square_indices(catalog)
        .map(|index| {
            let values: Vec<f64> = catalog
                .iter()
                .filter(|r| r.grid_square_index == index && is_selected(r, include_empty))
                .filter_map(|r| r.percent_transmission)
                .collect();
            (index, MeanStd::from_values(&values))
        })
        .collect()
}

/// Transmission vs. particle count of every micrograph with a defined transmission
pub fn transmission_particle_pairs(catalog: &Catalog) -> Vec<TransmissionPoint> {
    catalog
        .iter()
        .filter_map(|r| {
            r.percent_transmission.map(|t| TransmissionPoint {
                grid_square_index: r.grid_square_index,
                percent_transmission: t,
                particle_count: r.particle_count,
            })
        })
        .collect()
}

/// The statistics which depend on whether empty micrographs are included
#[derive(Debug, Clone, PartialEq)]
pub struct ModeStatistics {
    pub include_empty: bool,
    pub particles_by_grid_square: Vec<(GroupLabel, MeanStd)>,
    pub particles_by_defocus: Vec<(f64, MeanStd)>,
    pub transmission_by_grid_square: Vec<(usize, MeanStd)>,
}

impl ModeStatistics {
    pub fn compute(catalog: &Catalog, include_empty: bool) -> Self {
        Self {
            include_empty,
            particles_by_grid_square: particle_stats_by_grid_square(catalog, include_empty),
            particles_by_defocus: particle_stats_by_defocus(catalog, include_empty),
            transmission_by_grid_square: transmission_stats_by_grid_square(
                catalog,
                include_empty,
            ),
        }
    }

    /// File name tag of this mode
    pub fn tag(&self) -> &'static str {
        if self.include_empty {
            "allmics"
        } else {
            "noempty"
        }
    }
}

/// Every aggregate derived from a finished catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub all_micrographs: ModeStatistics,
    pub no_empty: ModeStatistics,
    pub percent_empty: Vec<(usize, f64)>,
    pub total_particles: Vec<(usize, u64)>,
    pub distribution: Vec<u64>,
    pub transmission_points: Vec<TransmissionPoint>,
}

impl Statistics {
    pub fn compute(catalog: &Catalog) -> Self {
        Self {
            all_micrographs: ModeStatistics::compute(catalog, true),
            no_empty: ModeStatistics::compute(catalog, false),
            percent_empty: percent_empty_by_grid_square(catalog),
            total_particles: total_particles_by_grid_square(catalog),
            distribution: particle_distribution(catalog),
            transmission_points: transmission_particle_pairs(catalog),
        }
    }

    pub fn total(&self) -> u64 {
        self.distribution.iter().sum()
    }
}
