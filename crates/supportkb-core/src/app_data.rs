//! Where supportkb stores its own data (config).
//!
//! Articles stay in the knowledge folder; the vector index lives only in memory.

use std::path::PathBuf;

/// Returns the directory where supportkb stores its config.
/// On Linux: `~/.local/share/supportkb/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "SupportKb", "supportkb")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}
