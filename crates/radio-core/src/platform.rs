use std::path::{Path, PathBuf};

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/radio/ (XDG standard)
    // instead of macOS Application Support for consistency
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join("radio")
    }
    #[cfg(windows)]
    {
        if let Some(portable) = beside_exe("data") {
            return portable;
        }
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("radio")
    }
}

pub fn config_dir() -> PathBuf {
    // Portable installs keep config.toml next to the executable
    #[cfg(windows)]
    {
        if let Some(config) = beside_exe("config.toml") {
            if let Some(dir) = config.parent() {
                return dir.to_path_buf();
            }
        }
    }

    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("radio")
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("radio")
    }
}

#[cfg(unix)]
fn mpv_binary_names() -> &'static [&'static str] {
    &["mpv"]
}

#[cfg(windows)]
fn mpv_binary_names() -> &'static [&'static str] {
    &["mpv.exe", "mpv"]
}

fn beside_exe(name: &str) -> Option<PathBuf> {
    let current_exe = std::env::current_exe().ok()?;
    let dir = current_exe.parent()?;
    [dir.join(name), dir.join("external").join(name)]
        .into_iter()
        .find(|p| p.exists())
}

pub(crate) fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(windows)]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Find the mpv binary for playback.
///
/// Searches beside the current executable (and its `external/` folder)
/// first unless `use_system_deps` is set, then `PATH`.
pub fn find_mpv_binary(use_system_deps: bool) -> Option<PathBuf> {
    if !use_system_deps {
        if let Some(p) = mpv_binary_names().iter().find_map(|n| beside_exe(n)) {
            return Some(p);
        }
    }
    find_on_path(mpv_binary_names())
}
