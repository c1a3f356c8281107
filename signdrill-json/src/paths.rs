use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "signdrill", "SignDrill")
}

pub fn data_root() -> PathBuf {
    if let Some(pd) = project_dirs() {
        pd.data_dir().to_path_buf()
    } else {
        // Fallback: current dir
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }
}

pub fn config_root() -> PathBuf {
    project_dirs()
        .map(|pd| pd.config_dir().to_path_buf())
        .unwrap_or_else(data_root)
}

pub fn default_store_file() -> (PathBuf, PathBuf) {
    let root = data_root();
    let file = root.join("signdrill.json");
    let backups = root.join("backups");
    (file, backups)
}

pub fn default_config_file() -> PathBuf {
    config_root().join("signdrill.toml")
}
