use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Database
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. The parent directory is created
    /// on startup when missing.
    #[serde(default = "d_path")]
    pub path: PathBuf,
    #[serde(default = "d_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: d_path(),
            max_connections: d_max_connections(),
        }
    }
}

fn d_path() -> PathBuf {
    PathBuf::from("./data/gatehouse.db")
}
fn d_max_connections() -> u32 {
    8
}
