//! Storage path resolution.

use std::env;
use std::path::PathBuf;

/// Application directory name under the platform data directory.
const APP_AUTHOR: &str = "PersonaSim";

/// Returns the directory used for SQLite databases.
///
/// `PERSONA_SIM_STORAGE_DIR` wins when set (used verbatim). Otherwise the
/// platform data directory is used, namespaced by the current project
/// directory name. The directory is created if missing.
pub fn db_storage_path() -> PathBuf {
    if let Ok(dir) = env::var("PERSONA_SIM_STORAGE_DIR") {
        let dir = PathBuf::from(dir);
        let _ = std::fs::create_dir_all(&dir);
        return dir;
    }

    let app_name = project_directory_name();

    // Linux: ~/.local/share/<author>/<project>
    // macOS: ~/Library/Application Support/<author>/<project>
    // Windows: %LOCALAPPDATA%\<author>\<project>
    let data_dir = if cfg!(target_os = "linux") {
        let home = env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_AUTHOR)
            .join(&app_name)
    } else if cfg!(target_os = "macos") {
        let home = env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join(APP_AUTHOR)
            .join(&app_name)
    } else if cfg!(target_os = "windows") {
        let local_app_data = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("APPDATA").unwrap_or_else(|_| "C:\\tmp".to_string()));
        PathBuf::from(local_app_data).join(APP_AUTHOR).join(&app_name)
    } else {
        PathBuf::from("/tmp").join(APP_AUTHOR).join(&app_name)
    };

    let _ = std::fs::create_dir_all(&data_dir);
    data_dir
}

/// Name of the current working directory, used to namespace databases per
/// project.
pub fn project_directory_name() -> String {
    env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "persona_sim_default".to_string())
}
