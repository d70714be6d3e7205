//! Where Lantern stores its own data (config, vector store).
//!
//! Source documents stay where the user keeps them. We only store app state here.

use std::path::PathBuf;

/// Returns the directory where Lantern stores config and the vector store.
/// On Linux: `~/.local/share/lantern/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "Lantern", "lantern")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Default logical storage path for the vector store, inside [`app_data_dir`].
pub fn default_storage_path() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join("vector_db"))
}
