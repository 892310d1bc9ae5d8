use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::DEFAULT_PARTICLES_FILE;
use super::error::ConfigError;
use super::particle_joiner::MatchMode;

/// Structure representing the application configuration. Contains pathing and matching information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub raw_data_path: Option<PathBuf>,
    pub job_path: Option<PathBuf>,
    pub particles_path: Option<PathBuf>,
    pub output_path: PathBuf,
    #[serde(default)]
    pub match_mode: MatchMode,
}

impl Default for Config {
    /// Generate a new Config object. All paths will be empty/invalid
    fn default() -> Self {
        Self {
            raw_data_path: None,
            job_path: None,
            particles_path: None,
            output_path: PathBuf::from("."),
            match_mode: MatchMode::Substring,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check that there is some way to find the raw data
    pub fn has_raw_data_source(&self) -> bool {
        self.raw_data_path.is_some() || self.job_path.is_some()
    }

    /// Get the job number (the digits after the last J of the job directory name)
    pub fn get_job_number(&self) -> Result<Option<String>, ConfigError> {
        let Some(job_path) = self.job_path.as_ref() else {
            return Ok(None);
        };
        let job_name = job_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match job_name.rsplit_once('J') {
            Some((_, number))
                if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) =>
            {
                Ok(Some(number.to_string()))
            }
            _ => Err(ConfigError::BadJobName(job_path.clone())),
        }
    }

    /// Get the path to the folder holding every output of this run
    pub fn get_output_directory(&self) -> Result<PathBuf, ConfigError> {
        let folder_name = match self.get_job_number()? {
            Some(number) => format!("particle_stats_J{number}"),
            None => String::from("particle_stats"),
        };
        Ok(self.output_path.join(folder_name))
    }

    /// Get the path to the folder holding the output tables
    pub fn get_csv_directory(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.get_output_directory()?.join("output_CSVs"))
    }

    /// Get the path to the particle assignment file
    ///
    /// If not given explicitly, it is expected in the inputs folder of the output directory
    pub fn get_particles_file(&self) -> Result<PathBuf, ConfigError> {
        match &self.particles_path {
            Some(path) => Ok(path.clone()),
            None => Ok(self
                .get_output_directory()?
                .join("inputs")
                .join(DEFAULT_PARTICLES_FILE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_paths_from_job() {
        let config = Config {
            job_path: Some(PathBuf::from("/data/P4/J123")),
            output_path: PathBuf::from("/out"),
            ..Default::default()
        };
        assert_eq!(config.get_job_number().unwrap().as_deref(), Some("123"));
        assert_eq!(
            config.get_csv_directory().unwrap(),
            PathBuf::from("/out/particle_stats_J123/output_CSVs")
        );
        assert_eq!(
            config.get_particles_file().unwrap(),
            PathBuf::from("/out/particle_stats_J123/inputs/particles.star")
        );
    }

    #[test]
    fn test_bad_job_name() {
        let config = Config {
            job_path: Some(PathBuf::from("/data/P4/extract")),
            ..Default::default()
        };
        assert!(matches!(
            config.get_job_number(),
            Err(ConfigError::BadJobName(_))
        ));
    }

    #[test]
    fn test_yaml_round_trip_defaults_match_mode() {
        let yaml = "raw_data_path: /raw\njob_path: null\nparticles_path: /p.star\noutput_path: /out\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.match_mode, MatchMode::Substring);
        assert!(config.has_raw_data_source());
        assert_eq!(
            config.get_output_directory().unwrap(),
            PathBuf::from("/out/particle_stats")
        );
    }
}
