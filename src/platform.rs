//! Host classification and per-family install defaults.

use std::path::PathBuf;

/// Operating system families the engine ships installers for.
///
/// Everything that looks like a Unix lands on `Linux`, macOS application
/// bundles on `Mac`; `Unknown` carries no install defaults and leaves the
/// engine unavailable unless overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Linux,
    Mac,
    Windows,
    Unknown,
}

impl OsFamily {
    /// Classify an OS name as reported by the platform.
    ///
    /// Case-insensitive substring match, checked in order: Unix markers
    /// first, then mac, then win.
    pub fn from_os_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("nix") || name.contains("nux") || name.contains("aix") {
            OsFamily::Linux
        } else if name.contains("mac") {
            OsFamily::Mac
        } else if name.contains("win") {
            OsFamily::Windows
        } else {
            OsFamily::Unknown
        }
    }

    /// Family of the running host.
    pub fn detect() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Launcher path of a stock engine install for this family.
    pub fn default_executable(&self) -> Option<PathBuf> {
        match self {
            OsFamily::Linux => Some(PathBuf::from("/usr/local/bin/grass70")),
            OsFamily::Mac => Some(PathBuf::from(
                "/Applications/GRASS-7.0.app/Contents/MacOS/grass70",
            )),
            OsFamily::Windows => Some(windows_install_root().join("grass70.bat")),
            OsFamily::Unknown => None,
        }
    }

    /// Directory holding the engine's module binaries in a stock install.
    pub fn default_modules_dir(&self) -> Option<PathBuf> {
        match self {
            OsFamily::Linux => Some(PathBuf::from("/usr/lib/grass70/bin")),
            OsFamily::Mac => Some(PathBuf::from(
                "/Applications/GRASS-7.0.app/Contents/MacOS/bin",
            )),
            OsFamily::Windows => Some(windows_install_root().join("bin")),
            OsFamily::Unknown => None,
        }
    }

    /// Separator for entries appended to search-path variables.
    pub fn path_separator(&self) -> char {
        match self {
            OsFamily::Windows => ';',
            _ => ':',
        }
    }

    /// Environment variable consulted by this family's dynamic linker, when
    /// there is one that needs extending.
    pub fn shared_library_var(&self) -> Option<&'static str> {
        match self {
            OsFamily::Linux => Some("LD_LIBRARY_PATH"),
            OsFamily::Mac => Some("DYLD_LIBRARY_PATH"),
            OsFamily::Windows | OsFamily::Unknown => None,
        }
    }
}

/// 32-bit Program Files is preferred when present; the 7.0 installer
/// registers itself there on 64-bit hosts.
fn windows_install_root() -> PathBuf {
    let x86 = PathBuf::from("C:\\Program Files (x86)");
    let root = if x86.exists() {
        x86
    } else {
        PathBuf::from("C:\\Program Files")
    };
    root.join("GRASS GIS 7.0.0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_names_classify_as_linux() {
        for name in ["linux", "Linux", "unix", "GNU/Linux", "AIX"] {
            assert_eq!(OsFamily::from_os_name(name), OsFamily::Linux, "{name}");
        }
    }

    #[test]
    fn mac_names_classify_as_mac() {
        for name in ["macos", "Mac OS X", "MACOS"] {
            assert_eq!(OsFamily::from_os_name(name), OsFamily::Mac, "{name}");
        }
    }

    #[test]
    fn windows_names_classify_as_windows() {
        for name in ["windows", "Windows 10", "WINDOWS"] {
            assert_eq!(OsFamily::from_os_name(name), OsFamily::Windows, "{name}");
        }
    }

    #[test]
    fn unmatched_names_classify_as_unknown() {
        for name in ["freebsd", "solaris", "haiku", ""] {
            assert_eq!(OsFamily::from_os_name(name), OsFamily::Unknown, "{name}");
        }
    }

    #[test]
    fn unix_markers_win_over_later_matches() {
        // "nix" is checked before "win"; a name containing both is a Unix.
        assert_eq!(OsFamily::from_os_name("winnix"), OsFamily::Linux);
    }

    #[test]
    fn unknown_family_has_no_defaults() {
        assert_eq!(OsFamily::Unknown.default_executable(), None);
        assert_eq!(OsFamily::Unknown.default_modules_dir(), None);
        assert_eq!(OsFamily::Unknown.shared_library_var(), None);
    }

    #[test]
    fn family_defaults_point_at_stock_installs() {
        assert_eq!(
            OsFamily::Linux.default_executable(),
            Some(PathBuf::from("/usr/local/bin/grass70"))
        );
        assert_eq!(
            OsFamily::Linux.default_modules_dir(),
            Some(PathBuf::from("/usr/lib/grass70/bin"))
        );
        assert_eq!(
            OsFamily::Mac.default_executable(),
            Some(PathBuf::from(
                "/Applications/GRASS-7.0.app/Contents/MacOS/grass70"
            ))
        );

        let exec = OsFamily::Windows.default_executable().unwrap();
        assert!(exec.ends_with("grass70.bat"));
        let modules = OsFamily::Windows.default_modules_dir().unwrap();
        assert!(modules.ends_with("bin"));
    }

    #[test]
    fn path_separator_per_family() {
        assert_eq!(OsFamily::Windows.path_separator(), ';');
        assert_eq!(OsFamily::Linux.path_separator(), ':');
        assert_eq!(OsFamily::Mac.path_separator(), ':');
    }

    #[test]
    fn shared_library_var_per_family() {
        assert_eq!(OsFamily::Linux.shared_library_var(), Some("LD_LIBRARY_PATH"));
        assert_eq!(
            OsFamily::Mac.shared_library_var(),
            Some("DYLD_LIBRARY_PATH")
        );
        assert_eq!(OsFamily::Windows.shared_library_var(), None);
    }
}
