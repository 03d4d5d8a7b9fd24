//! Engine installation resolution.
//!
//! Resolution runs once at startup and never fails: a missing or unusable
//! install leaves the corresponding path `None`, the engine reports itself
//! unavailable, and every consumer degrades from there. Overrides beat
//! family defaults, and both are validated against the filesystem before
//! they are trusted.

use std::path::{Path, PathBuf};

use crate::platform::OsFamily;

/// Environment variable naming the engine launcher, overriding detection.
pub const EXECUTABLE_VAR: &str = "GRASS";

/// Environment variable naming the module directory, overriding detection.
pub const MODULES_VAR: &str = "GRASS_MODULES";

/// Inputs to configuration resolution, split out so tests can inject them.
#[derive(Debug, Clone)]
pub struct ResolveSources {
    pub os_name: String,
    pub executable_override: Option<PathBuf>,
    pub modules_override: Option<PathBuf>,
}

impl ResolveSources {
    /// Sources for the running host: the real OS name plus `GRASS` and
    /// `GRASS_MODULES` from the environment.
    pub fn from_env() -> Self {
        Self {
            os_name: std::env::consts::OS.to_string(),
            executable_override: std::env::var_os(EXECUTABLE_VAR).map(PathBuf::from),
            modules_override: std::env::var_os(MODULES_VAR).map(PathBuf::from),
        }
    }
}

/// Resolved engine installation, fixed for the lifetime of the process and
/// shared by reference everywhere.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    executable: Option<PathBuf>,
    modules_dir: Option<PathBuf>,
    family: OsFamily,
}

impl EngineConfig {
    /// Resolve from the running host's OS name and environment.
    pub fn resolve() -> Self {
        Self::resolve_from(&ResolveSources::from_env())
    }

    /// Resolve from explicit sources.
    pub fn resolve_from(sources: &ResolveSources) -> Self {
        let family = OsFamily::from_os_name(&sources.os_name);

        let executable = match &sources.executable_override {
            Some(path) => {
                tracing::info!("defined {}={}", EXECUTABLE_VAR, path.display());
                Some(path.clone())
            }
            None => {
                let default = family.default_executable();
                match &default {
                    Some(path) => {
                        tracing::info!("default {}={}", EXECUTABLE_VAR, path.display());
                    }
                    None => tracing::warn!(
                        "no default engine executable for '{}'; set {} to enable analysis",
                        sources.os_name,
                        EXECUTABLE_VAR
                    ),
                }
                default
            }
        };

        let modules_dir = match &sources.modules_override {
            Some(path) => {
                tracing::info!("defined {}={}", MODULES_VAR, path.display());
                Some(path.clone())
            }
            None => {
                let default = family.default_modules_dir();
                match &default {
                    Some(path) => {
                        tracing::info!("default {}={}", MODULES_VAR, path.display());
                    }
                    None => tracing::warn!(
                        "no default module directory for '{}'; set {} to enable analysis",
                        sources.os_name,
                        MODULES_VAR
                    ),
                }
                default
            }
        };

        Self {
            executable: executable.and_then(validate_executable),
            modules_dir: modules_dir.and_then(validate_modules_dir),
            family,
        }
    }

    /// Build from paths already known to be good, bypassing filesystem
    /// validation. [`EngineConfig::resolve`] is the usual entry point.
    pub fn new(
        family: OsFamily,
        executable: Option<PathBuf>,
        modules_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            executable,
            modules_dir,
            family,
        }
    }

    /// Whether viewshed analysis can run on this host.
    pub fn is_available(&self) -> bool {
        self.executable.is_some()
    }

    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    pub fn modules_dir(&self) -> Option<&Path> {
        self.modules_dir.as_deref()
    }

    pub fn family(&self) -> OsFamily {
        self.family
    }

    /// Absolute path of a module binary, or `None` when the module (or the
    /// whole module directory) is unusable on this host. Windows installs
    /// ship modules as either batch wrappers or plain executables, probed in
    /// that order.
    pub fn module_command(&self, name: &str) -> Option<PathBuf> {
        let dir = self.modules_dir.as_ref()?;

        let candidate = if self.family == OsFamily::Windows {
            let bat = dir.join(format!("{name}.bat"));
            if bat.exists() {
                bat
            } else {
                dir.join(format!("{name}.exe"))
            }
        } else {
            dir.join(name)
        };

        if !candidate.exists() {
            tracing::warn!("module {} not found: {}", name, candidate.display());
            return None;
        }
        if !is_executable(&candidate) {
            tracing::warn!("module {} not executable: {}", name, candidate.display());
            return None;
        }
        Some(candidate)
    }
}

fn validate_executable(path: PathBuf) -> Option<PathBuf> {
    if !path.exists() {
        tracing::warn!("{} does not exist", path.display());
        return None;
    }
    if !is_executable(&path) {
        tracing::warn!("{} not executable", path.display());
        return None;
    }
    Some(path)
}

fn validate_modules_dir(path: PathBuf) -> Option<PathBuf> {
    if !path.is_dir() {
        tracing::warn!("{} does not exist", path.display());
        return None;
    }
    Some(path)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[cfg(unix)]
    fn touch_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn sources(os_name: &str) -> ResolveSources {
        ResolveSources {
            os_name: os_name.to_string(),
            executable_override: None,
            modules_override: None,
        }
    }

    #[test]
    fn unknown_os_resolves_unavailable() {
        let config = EngineConfig::resolve_from(&sources("beos"));
        assert!(!config.is_available());
        assert_eq!(config.executable(), None);
        assert_eq!(config.modules_dir(), None);
        assert_eq!(config.family(), OsFamily::Unknown);
    }

    #[test]
    fn missing_default_install_degrades_to_unavailable() {
        // The stock linux paths do not exist on build hosts.
        let config = EngineConfig::resolve_from(&sources("linux"));
        assert_eq!(config.family(), OsFamily::Linux);
        assert!(!config.is_available());
    }

    #[cfg(unix)]
    #[test]
    fn override_pointing_at_real_executable_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let exec = dir.path().join("grass70");
        touch_executable(&exec);
        let modules = dir.path().join("bin");
        fs::create_dir(&modules).unwrap();

        let config = EngineConfig::resolve_from(&ResolveSources {
            os_name: "linux".to_string(),
            executable_override: Some(exec.clone()),
            modules_override: Some(modules.clone()),
        });

        assert!(config.is_available());
        assert_eq!(config.executable(), Some(exec.as_path()));
        assert_eq!(config.modules_dir(), Some(modules.as_path()));
    }

    #[cfg(unix)]
    #[test]
    fn override_without_exec_bit_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let exec = dir.path().join("grass70");
        fs::write(&exec, "not executable").unwrap();

        let config = EngineConfig::resolve_from(&ResolveSources {
            os_name: "linux".to_string(),
            executable_override: Some(exec),
            modules_override: None,
        });

        assert!(!config.is_available());
    }

    #[test]
    fn override_pointing_nowhere_is_dropped() {
        let config = EngineConfig::resolve_from(&ResolveSources {
            os_name: "linux".to_string(),
            executable_override: Some(PathBuf::from("/does/not/exist/grass70")),
            modules_override: Some(PathBuf::from("/does/not/exist/bin")),
        });

        assert!(!config.is_available());
        assert_eq!(config.modules_dir(), None);
    }

    #[cfg(unix)]
    #[test]
    fn module_command_resolves_existing_module() {
        let dir = tempfile::tempdir().unwrap();
        let modules = dir.path().join("bin");
        fs::create_dir(&modules).unwrap();
        touch_executable(&modules.join("r.viewshed"));

        let config = EngineConfig::new(OsFamily::Linux, None, Some(modules.clone()));
        assert_eq!(
            config.module_command("r.viewshed"),
            Some(modules.join("r.viewshed"))
        );
        assert_eq!(config.module_command("r.in.gdal"), None);
    }

    #[test]
    fn module_command_without_modules_dir_is_none() {
        let config = EngineConfig::new(OsFamily::Linux, None, None);
        assert_eq!(config.module_command("r.viewshed"), None);
    }
}
