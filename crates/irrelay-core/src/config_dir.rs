//! Platform-appropriate configuration directory.
//!
//! - Windows:  `%APPDATA%\irrelay`
//! - Linux:    `$XDG_CONFIG_HOME/irrelay` or `~/.config/irrelay`
//! - macOS:    `~/Library/Application Support/irrelay`

use std::path::PathBuf;

/// Directory name shared by the server and subscriber config files.
pub const APP_DIR: &str = "irrelay";

/// Resolves the platform config directory for the relay, or `None` when the
/// relevant environment variables are not set.
pub fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join(APP_DIR))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join(APP_DIR))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join(APP_DIR)
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}
