//! The viewshed pipeline: stage, create location, import, analyze, export,
//! read back.
//!
//! One request is one sequential async flow against one ephemeral
//! workspace. Whatever happens after allocation, the workspace is destroyed
//! exactly once before the outcome is returned, and cleanup can never
//! rewrite that outcome.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::environment;
use crate::raster::{Raster, RasterCodec, RasterError};
use crate::subprocess::{
    ExitStatus, ProcessCommandBuilder, ProcessError, SubprocessManager, DEFAULT_TIMEOUT,
};
use crate::workspace::{Workspace, WorkspaceError, WorkspaceManager};

/// Name of the elevation raster inside the mapset.
const RASTER_NAME: &str = "dem";
/// Name of the computed viewshed raster inside the mapset.
const RESULT_NAME: &str = "viewshed";
/// File the export step leaves in the location directory.
const RESULT_FILE: &str = "viewshed.tif";
const EXPORT_FORMAT: &str = "GTiff";

const IMPORT_MODULE: &str = "r.in.gdal";
const VIEWSHED_MODULE: &str = "r.viewshed";
const EXPORT_MODULE: &str = "r.out.gdal";

/// Stages of the pipeline in execution order. Failures carry the step they
/// occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Stage,
    CreateLocation,
    Import,
    Analyze,
    Export,
    ReadResult,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStep::Stage => "stage",
            PipelineStep::CreateLocation => "create-location",
            PipelineStep::Import => "import",
            PipelineStep::Analyze => "analyze",
            PipelineStep::Export => "export",
            PipelineStep::ReadResult => "read-result",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ViewshedError {
    /// The engine install is missing or incomplete. Distinct from execution
    /// failure: nothing was attempted.
    #[error("viewshed unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("{step} failed with exit code {code}: {message}")]
    Execution {
        step: PipelineStep,
        code: i32,
        message: String,
    },

    #[error("{step} timed out after {timeout:?}")]
    Timeout {
        step: PipelineStep,
        timeout: Duration,
    },

    #[error("failed to spawn {step} command: {source}")]
    Spawn {
        step: PipelineStep,
        #[source]
        source: ProcessError,
    },

    /// The export command exited cleanly but left no file behind.
    #[error("engine reported success but produced no result at {0}")]
    ResultMissing(PathBuf),

    #[error("{step} IO failure: {source}")]
    Io {
        step: PipelineStep,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} raster failure: {source}")]
    Raster {
        step: PipelineStep,
        #[source]
        source: RasterError,
    },
}

pub struct ViewshedPipeline {
    config: Arc<EngineConfig>,
    subprocess: SubprocessManager,
    manager: WorkspaceManager,
    codec: Arc<dyn RasterCodec>,
    command_timeout: Duration,
}

impl ViewshedPipeline {
    pub fn new(
        config: Arc<EngineConfig>,
        subprocess: SubprocessManager,
        manager: WorkspaceManager,
        codec: Arc<dyn RasterCodec>,
    ) -> Self {
        Self {
            config,
            subprocess,
            manager,
            codec,
            command_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-command watchdog, mainly for tests.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Compute the viewshed of the point `(x, y)` (map units) on the given
    /// elevation raster, returning the encoded result raster.
    pub async fn run(&self, dem: &Raster, x: f64, y: f64) -> Result<Raster, ViewshedError> {
        if !self.config.is_available() {
            return Err(ViewshedError::Unavailable(
                "engine executable is not configured".to_string(),
            ));
        }

        let workspace = self.manager.allocate();
        tracing::info!(
            "viewshed of ({}, {}) in location {}",
            x,
            y,
            workspace.location_name()
        );

        let result = self.execute(&workspace, dem, x, y).await;
        self.manager.destroy(&workspace).await;
        result
    }

    async fn execute(
        &self,
        workspace: &Workspace,
        dem: &Raster,
        x: f64,
        y: f64,
    ) -> Result<Raster, ViewshedError> {
        tracing::debug!("step {}", PipelineStep::Stage);
        tokio::fs::create_dir_all(workspace.geodb())
            .await
            .map_err(|source| ViewshedError::Io {
                step: PipelineStep::Stage,
                source,
            })?;
        self.codec
            .write(workspace.staged_raster(), dem)
            .map_err(|source| ViewshedError::Raster {
                step: PipelineStep::Stage,
                source,
            })?;
        tracing::debug!("staged raster at {}", workspace.staged_raster().display());

        tracing::debug!("step {}", PipelineStep::CreateLocation);
        self.manager.create(workspace).await?;

        let exec = self.config.executable().ok_or_else(|| {
            ViewshedError::Unavailable("engine executable is not configured".to_string())
        })?;
        // Built once per request, shared by every module command.
        let env = environment::build(exec, self.config.family(), workspace).map_err(|source| {
            ViewshedError::Io {
                step: PipelineStep::Import,
                source,
            }
        })?;

        tracing::debug!("step {}", PipelineStep::Import);
        let staged = workspace.staged_raster().display().to_string();
        self.run_module(PipelineStep::Import, IMPORT_MODULE, workspace, &env, |cmd| {
            cmd.kv("input", &staged)
                .kv("output", RASTER_NAME)
                .arg("--overwrite")
        })
        .await?;

        tracing::debug!("step {}", PipelineStep::Analyze);
        self.run_module(
            PipelineStep::Analyze,
            VIEWSHED_MODULE,
            workspace,
            &env,
            |cmd| {
                cmd.kv("input", RASTER_NAME)
                    .kv("output", RESULT_NAME)
                    .kv("coordinates", format!("{x},{y}"))
                    .arg("--overwrite")
            },
        )
        .await?;

        tracing::debug!("step {}", PipelineStep::Export);
        let result_file = workspace.location().join(RESULT_FILE);
        let result_path = result_file.display().to_string();
        self.run_module(
            PipelineStep::Export,
            EXPORT_MODULE,
            workspace,
            &env,
            |cmd| {
                cmd.kv("input", RESULT_NAME)
                    .kv("output", &result_path)
                    .arg("--overwrite")
                    .kv("format", EXPORT_FORMAT)
            },
        )
        .await?;

        tracing::debug!("step {}", PipelineStep::ReadResult);
        if !result_file.is_file() {
            return Err(ViewshedError::ResultMissing(result_file));
        }
        let raster = self
            .codec
            .read(&result_file)
            .map_err(|source| ViewshedError::Raster {
                step: PipelineStep::ReadResult,
                source,
            })?;

        tracing::info!("viewshed computed: {} bytes", raster.len());
        Ok(raster)
    }

    /// Run one engine module in the request's mapset with the session
    /// environment. Non-zero exits and watchdog expiries become structured
    /// errors carrying the step; they are never retried.
    async fn run_module(
        &self,
        step: PipelineStep,
        name: &str,
        workspace: &Workspace,
        env: &HashMap<String, String>,
        configure: impl FnOnce(ProcessCommandBuilder) -> ProcessCommandBuilder,
    ) -> Result<(), ViewshedError> {
        let program = self
            .config
            .module_command(name)
            .ok_or_else(|| ViewshedError::Unavailable(format!("module {name} is not available")))?;

        let builder = ProcessCommandBuilder::new(&program)
            .env_map(env.clone())
            .current_dir(workspace.mapset())
            .timeout(self.command_timeout)
            .inherit_output();
        let command = configure(builder).build();

        let output = self
            .subprocess
            .runner()
            .run(command)
            .await
            .map_err(|source| ViewshedError::Spawn { step, source })?;

        match output.status {
            ExitStatus::Success => Ok(()),
            ExitStatus::Timeout => Err(ViewshedError::Timeout {
                step,
                timeout: self.command_timeout,
            }),
            ExitStatus::Error(code) => {
                tracing::warn!("{}: {} exited with code {}", step, name, code);
                Err(ViewshedError::Execution {
                    step,
                    code,
                    message: output.stderr,
                })
            }
            ExitStatus::Signal(signal) => {
                tracing::warn!("{}: {} killed by signal {}", step, name, signal);
                Err(ViewshedError::Execution {
                    step,
                    // Shell convention for signal deaths.
                    code: 128 + signal,
                    message: output.stderr,
                })
            }
        }
    }
}
