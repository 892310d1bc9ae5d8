use std::fmt;

/// The pipeline stages, in the order they run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Catalog,
    Particles,
    Sidecars,
    Transmission,
    Statistics,
    Writing,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Catalog,
        Stage::Particles,
        Stage::Sidecars,
        Stage::Transmission,
        Stage::Statistics,
        Stage::Writing,
    ];

    /// Fraction of the whole run completed once this stage is done
    pub fn completed_fraction(&self) -> f32 {
        let position = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        (position + 1) as f32 / Self::ALL.len() as f32
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Catalog => "Cataloging movies",
            Stage::Particles => "Counting particles",
            Stage::Sidecars => "Reading metadata",
            Stage::Transmission => "Normalizing dose",
            Stage::Statistics => "Computing statistics",
            Stage::Writing => "Writing outputs",
        };
        write!(f, "{name}")
    }
}

/// Progress message sent from the pipeline to whoever is watching (typically the CLI)
#[derive(Debug, Clone, Default)]
pub struct StageStatus {
    pub progress: f32,
    pub stage: Stage,
}

impl StageStatus {
    pub fn new(progress: f32, stage: Stage) -> Self {
        Self { progress, stage }
    }

    /// Status for a stage which just finished
    pub fn finished(stage: Stage) -> Self {
        Self::new(stage.completed_fraction(), stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_stage_completes_run() {
        assert_eq!(StageStatus::finished(Stage::Writing).progress, 1.0);
        assert!(Stage::Catalog.completed_fraction() < Stage::Particles.completed_fraction());
    }
}
