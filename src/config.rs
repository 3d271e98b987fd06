//! tonearm configuration

use std::path::PathBuf;

/// Server configuration, assembled from CLI arguments
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,
    /// Sqlite database path
    pub db_path: PathBuf,
}
