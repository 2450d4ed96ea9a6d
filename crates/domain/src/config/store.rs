use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file. Parent directories are created on boot.
    #[serde(default = "d_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: d_path() }
    }
}

fn d_path() -> PathBuf {
    PathBuf::from("./data/chatrelay.db")
}
