//! Platform search paths and filesystem discovery for installed plug-ins.

use std::path::PathBuf;

use tracing::debug;
use walkdir::WalkDir;

/// The standard CLAP plug-in directories for the current platform.
pub fn search_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        let mut paths = Vec::new();
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join("Library/Audio/Plug-Ins/CLAP"));
        }
        paths.push(PathBuf::from("/Library/Audio/Plug-Ins/CLAP"));
        paths
    }

    #[cfg(windows)]
    {
        let mut paths = Vec::new();
        if let Some(local_app_data) = std::env::var_os("LOCALAPPDATA") {
            paths.push(PathBuf::from(local_app_data).join("Programs/Common/CLAP"));
        }
        if let Some(common_program_files) = std::env::var_os("COMMONPROGRAMFILES") {
            paths.push(PathBuf::from(common_program_files).join("CLAP"));
        }
        paths
    }

    #[cfg(not(any(target_os = "macos", windows)))]
    {
        let mut paths = Vec::new();
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".clap"));
        }
        paths.push(PathBuf::from("/usr/lib/clap"));
        paths
    }
}

/// All installed plug-in candidates in the standard search paths.
pub fn installed_plugins() -> Vec<PathBuf> {
    find_plugins(&search_paths())
}

/// Walks the given directories recursively. Files and directories whose name
/// ends in `.clap` are candidates; directories cover the macOS bundle format.
pub fn find_plugins(search_paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut plugins = Vec::new();
    for root in search_paths {
        if !root.exists() {
            continue;
        }

        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("skipping an entry while scanning {}: {err}", root.display());
                    continue;
                }
            };

            let is_clap_name = entry
                .path()
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(".clap"));
            if is_clap_name && (entry.file_type().is_file() || entry.file_type().is_dir()) {
                plugins.push(entry.path().to_path_buf());
            }
        }
    }

    plugins
}
