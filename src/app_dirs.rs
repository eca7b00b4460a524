use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", "taja")
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("taja_config.json"))
    }

    pub fn progress_path() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("taja")
                .join("progress.json")
        } else {
            ProjectDirs::from("", "", "taja")
                .map(|pd| pd.data_local_dir().join("progress.json"))
                .unwrap_or_else(|| PathBuf::from("taja_progress.json"))
        }
    }
}
