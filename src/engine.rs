//! The [`GrassEngine`] facade: configuration, subprocess execution,
//! workspaces, and the pipeline wired together the way most callers want
//! them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::raster::{GeoTiffCodec, Raster, RasterCodec};
use crate::registry::{catalog, OperationDescriptor};
use crate::subprocess::{ExitStatus, ProcessCommandBuilder, SubprocessManager, DEFAULT_TIMEOUT};
use crate::viewshed::{ViewshedError, ViewshedPipeline};
use crate::workspace::WorkspaceManager;

/// Directory under the user's home that holds the shared geodatabase root.
const GEODB_DIR_NAME: &str = "grassdata";

pub struct GrassEngine {
    config: Arc<EngineConfig>,
    subprocess: SubprocessManager,
    geodb: PathBuf,
    codec: Arc<dyn RasterCodec>,
    command_timeout: Duration,
}

impl GrassEngine {
    /// Engine for the host's real install: configuration resolved from the
    /// OS and environment, geodatabase at `~/grassdata`, GeoTIFF
    /// passthrough codec.
    pub fn from_env() -> Self {
        Self::new(
            Arc::new(EngineConfig::resolve()),
            SubprocessManager::production(),
            default_geodb(),
            Arc::new(GeoTiffCodec),
        )
    }

    pub fn new(
        config: Arc<EngineConfig>,
        subprocess: SubprocessManager,
        geodb: PathBuf,
        codec: Arc<dyn RasterCodec>,
    ) -> Self {
        Self {
            config,
            subprocess,
            geodb,
            codec,
            command_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-command watchdog, mainly for tests.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn geodb(&self) -> &Path {
        &self.geodb
    }

    /// Whether viewshed analysis can run on this host.
    pub fn is_available(&self) -> bool {
        self.config.is_available()
    }

    /// Operations this engine can currently back.
    pub fn operations(&self) -> Vec<OperationDescriptor> {
        catalog(self.is_available())
    }

    /// Version string of the engine install.
    ///
    /// Never fails: a missing install, a dirty exit, a watchdog expiry, and
    /// a spawn failure all degrade to a diagnostic string.
    pub async fn version(&self) -> String {
        let Some(exec) = self.config.executable() else {
            return "unavailable".to_string();
        };

        let command = ProcessCommandBuilder::new(exec)
            .arg("-v")
            .timeout(self.command_timeout)
            .build();

        match self.subprocess.runner().run(command).await {
            Ok(output) => match output.status {
                ExitStatus::Success => output.stdout,
                ExitStatus::Error(code) => {
                    format!("exit code: {} ({})", code, output.stderr.trim())
                }
                ExitStatus::Timeout => {
                    format!("unavailable: timed out after {:?}", output.duration)
                }
                ExitStatus::Signal(signal) => {
                    format!("unavailable: killed by signal {signal}")
                }
            },
            Err(e) => format!("unavailable: {e}"),
        }
    }

    /// Compute the viewshed of `(x, y)` on the elevation raster. See
    /// [`ViewshedPipeline::run`] for the step-by-step contract.
    pub async fn viewshed(&self, dem: &Raster, x: f64, y: f64) -> Result<Raster, ViewshedError> {
        self.pipeline().run(dem, x, y).await
    }

    /// Manager for this engine's geodatabase, for callers that drive
    /// locations directly (for example to key one on a bare EPSG code).
    pub fn workspace_manager(&self) -> WorkspaceManager {
        WorkspaceManager::new(
            self.geodb.clone(),
            Arc::clone(&self.config),
            self.subprocess.clone(),
        )
        .with_command_timeout(self.command_timeout)
    }

    fn pipeline(&self) -> ViewshedPipeline {
        ViewshedPipeline::new(
            Arc::clone(&self.config),
            self.subprocess.clone(),
            self.workspace_manager(),
            Arc::clone(&self.codec),
        )
        .with_command_timeout(self.command_timeout)
    }
}

/// The geodatabase root used when the caller names none: `~/grassdata`.
pub fn default_geodb() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(GEODB_DIR_NAME)
}
