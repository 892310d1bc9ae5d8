use std::path::PathBuf;
use thiserror::Error;

use super::status::StageStatus;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog could not build a glob pattern for the raw data path: {0}")]
    BadPattern(#[from] glob::PatternError),
    #[error("Catalog failed to compile the timestamp pattern: {0}")]
    BadRegex(#[from] regex::Error),
    #[error("Catalog found movie {0:?} which is not inside a GridSquare/Data directory")]
    BadMoviePath(PathBuf),
    #[error("Catalog found duplicate micrograph name {0}")]
    DuplicateName(String),
}

#[derive(Debug, Error)]
pub enum ParticleFileError {
    #[error("Particle file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("Sidecar failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Sidecar failed to parse XML: {0}")]
    XmlError(#[from] quick_xml::Error),
    #[error("Sidecar is missing the {0} field")]
    MissingField(&'static str),
    #[error("Sidecar field {0} has a value which is not a number: {1}")]
    BadValue(&'static str, String),
    #[error("Sidecar could not build a glob pattern: {0}")]
    BadPattern(#[from] glob::PatternError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has neither a raw data path nor a job path")]
    NoRawDataPath,
    #[error("Config job path {0:?} does not contain a job number (expected a J followed by digits)")]
    BadJobName(PathBuf),
}

#[derive(Debug, Error)]
pub enum RawPathError {
    #[error("Raw path resolution failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Raw path resolution failed to parse JSON: {0}")]
    ParsingError(#[from] serde_json::Error),
    #[error("Raw path resolution could not find the file {0:?}")]
    BadFilePath(PathBuf),
    #[error("Raw path resolution could not find a workspace uid in the job file")]
    NoWorkspaceUid,
    #[error("Raw path resolution could not find file_engine_watch_path_abs for workspace {0}")]
    NoWatchPath(String),
    #[error("Raw data directory {0:?} is empty")]
    EmptyDirectory(PathBuf),
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("Writer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Writer failed due to CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Catalog error: {0}")]
    CatalogError(#[from] CatalogError),
    #[error("Processor found no micrographs under {0:?}")]
    EmptyCatalog(PathBuf),
    #[error("Processor failed due to ParticleFile error: {0}")]
    ParticleError(#[from] ParticleFileError),
    #[error("Processor failed due to Sidecar error: {0}")]
    SidecarError(#[from] SidecarError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to RawPath error: {0}")]
    RawPathError(#[from] RawPathError),
    #[error("Processor failed due to Writer error: {0}")]
    WriterError(#[from] WriterError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<StageStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
