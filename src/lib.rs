//! # Sightline
//!
//! Viewshed computation by orchestrating GRASS GIS as a sequence of external
//! subprocess invocations against its directory-based data model
//! (geodatabase → location → PERMANENT mapset). The numerically heavy raster
//! analysis stays in GRASS; this crate owns the orchestration: resolving the
//! install, deriving the session environment, creating and tearing down
//! ephemeral per-request locations, and sequencing the import → analyze →
//! export pipeline with watchdog timeouts and structured failure reporting.
//!
//! ## Modules
//!
//! - `platform` - OS-family classification and per-family install defaults
//! - `config` - engine install resolution with warn-and-degrade validation
//! - `environment` - session environment derivation and the GISRC file
//! - `workspace` - ephemeral geodatabase locations, one per request
//! - `subprocess` - async command execution with watchdog timeouts
//! - `viewshed` - the staged pipeline behind the viewshed operation
//! - `engine` - facade wiring configuration, workspaces, and the pipeline
//! - `raster` - opaque raster values and the codec/CRS collaborator seams
//! - `registry` - operation descriptors advertised to embedding hosts
pub mod config;
pub mod engine;
pub mod environment;
pub mod platform;
pub mod raster;
pub mod registry;
pub mod subprocess;
pub mod viewshed;
pub mod workspace;

pub use config::EngineConfig;
pub use engine::GrassEngine;
pub use raster::Raster;
pub use viewshed::{ViewshedError, ViewshedPipeline};
pub use workspace::{Workspace, WorkspaceManager};
