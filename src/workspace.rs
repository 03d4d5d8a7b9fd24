//! Ephemeral engine workspaces: one geodatabase location per request.
//!
//! The geodatabase root is long-lived and shared; every request gets its
//! own uniquely named location under it, plus a private staging path and
//! resource file derived from the same name. Creation shells out to the
//! engine launcher; destruction is plain directory removal and must never
//! fail a request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::environment::GRASS_VERSION;
use crate::raster::{CrsLabeler, Raster, RasterError};
use crate::subprocess::{
    ExitStatus, ProcessCommandBuilder, ProcessError, SubprocessManager, DEFAULT_TIMEOUT,
};

/// Name of the mapset the engine creates inside every new location.
pub const PERMANENT_MAPSET: &str = "PERMANENT";

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("engine executable is not configured")]
    Unavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Spawn(#[from] ProcessError),

    #[error("location initialization failed with exit code {code}: {message}")]
    InitFailed { code: i32, message: String },

    #[error("location initialization timed out after {0:?}")]
    InitTimeout(Duration),

    #[error("engine did not create mapset {0}")]
    MapsetMissing(PathBuf),

    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// Paths of one request's private slice of the geodatabase.
///
/// Purely derived at construction; nothing exists on disk until the manager
/// creates it, and the paths remain valid inputs for cleanup whether or not
/// creation ever happened.
#[derive(Debug, Clone)]
pub struct Workspace {
    geodb: PathBuf,
    name: String,
    location: PathBuf,
    mapset: PathBuf,
    staged_raster: PathBuf,
    rc_file: PathBuf,
}

impl Workspace {
    pub fn new(geodb: &Path, name: &str) -> Self {
        let location = geodb.join(name);
        let mapset = location.join(PERMANENT_MAPSET);
        let staged_raster = geodb.join(format!("{name}.dem.tif"));
        let rc_file = geodb.join(format!(".grassrc.{GRASS_VERSION}.{name}"));
        Self {
            geodb: geodb.to_path_buf(),
            name: name.to_string(),
            location,
            mapset,
            staged_raster,
            rc_file,
        }
    }

    pub fn geodb(&self) -> &Path {
        &self.geodb
    }

    pub fn location_name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn mapset(&self) -> &Path {
        &self.mapset
    }

    /// Where the request's input raster is staged before import. Named
    /// after the location so concurrent requests never share it.
    pub fn staged_raster(&self) -> &Path {
        &self.staged_raster
    }

    /// The session resource file handed to the engine via `GISRC`.
    pub fn rc_file(&self) -> &Path {
        &self.rc_file
    }
}

pub struct WorkspaceManager {
    geodb: PathBuf,
    config: Arc<EngineConfig>,
    subprocess: SubprocessManager,
    command_timeout: Duration,
}

impl WorkspaceManager {
    pub fn new(geodb: PathBuf, config: Arc<EngineConfig>, subprocess: SubprocessManager) -> Self {
        Self {
            geodb,
            config,
            subprocess,
            command_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-command watchdog, mainly for tests.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn geodb(&self) -> &Path {
        &self.geodb
    }

    /// Reserve a workspace: unique name, derived paths, nothing on disk yet.
    pub fn allocate(&self) -> Workspace {
        let name = format!("viewshed-{}", Uuid::new_v4().simple());
        Workspace::new(&self.geodb, &name)
    }

    /// Initialize the location from the staged raster. The engine reads the
    /// raster's CRS and bounds and builds `location/PERMANENT` from them.
    pub async fn create(&self, workspace: &Workspace) -> Result<(), WorkspaceError> {
        let key = workspace.staged_raster().display().to_string();
        self.create_keyed(workspace, &key).await
    }

    /// Initialize the location from a spatial reference code instead of a
    /// staged raster, for callers that know the CRS but have no file to key
    /// the location on.
    pub async fn create_for_crs(
        &self,
        workspace: &Workspace,
        raster: &Raster,
        labeler: &dyn CrsLabeler,
    ) -> Result<(), WorkspaceError> {
        let code = labeler.spatial_reference_code(raster)?;
        self.create_keyed(workspace, &format!("epsg:{code}")).await
    }

    async fn create_keyed(&self, workspace: &Workspace, key: &str) -> Result<(), WorkspaceError> {
        let exec = self.config.executable().ok_or(WorkspaceError::Unavailable)?;

        tokio::fs::create_dir_all(&self.geodb).await?;

        let location = workspace.location().display().to_string();
        let command = ProcessCommandBuilder::new(exec)
            .arg("-c")
            .arg(key)
            .arg("-e")
            .arg(&location)
            .timeout(self.command_timeout)
            .inherit_output()
            .build();

        let output = self.subprocess.runner().run(command).await?;
        match output.status {
            ExitStatus::Success => {}
            ExitStatus::Timeout => {
                return Err(WorkspaceError::InitTimeout(self.command_timeout));
            }
            ExitStatus::Error(code) => {
                return Err(WorkspaceError::InitFailed {
                    code,
                    message: output.stderr,
                });
            }
            ExitStatus::Signal(signal) => {
                // Shell convention for signal deaths.
                return Err(WorkspaceError::InitFailed {
                    code: 128 + signal,
                    message: output.stderr,
                });
            }
        }

        let mapset = workspace.mapset();
        if !mapset.is_dir() {
            return Err(WorkspaceError::MapsetMissing(mapset.to_path_buf()));
        }

        tracing::debug!("created location {}", workspace.location().display());
        Ok(())
    }

    /// Remove everything a request left on disk: the location tree, the
    /// staged raster, and the session resource file.
    ///
    /// Best-effort and idempotent. Failures are logged and swallowed so
    /// cleanup can never mask the request's own outcome.
    pub async fn destroy(&self, workspace: &Workspace) {
        remove_dir_best_effort(workspace.location()).await;
        remove_file_best_effort(workspace.staged_raster()).await;
        remove_file_best_effort(workspace.rc_file()).await;
        tracing::debug!("destroyed workspace {}", workspace.location_name());
    }
}

async fn remove_dir_best_effort(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("failed to remove {}: {}", path.display(), e),
    }
}

async fn remove_file_best_effort(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("failed to remove {}: {}", path.display(), e),
    }
}
