//! Async execution of external commands with watchdog timeouts.
//!
//! Every engine invocation in this crate goes through the
//! [`ProcessRunner`] trait so pipelines can be exercised against a
//! [`MockProcessRunner`] without a GIS install.

pub mod builder;
pub mod error;
pub mod mock;
pub mod runner;

#[cfg(test)]
mod tests;

pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use mock::{MockCommandConfig, MockProcessRunner};
pub use runner::{
    ExitStatus, OutputMode, ProcessCommand, ProcessOutput, ProcessRunner, TokioProcessRunner,
    DEFAULT_TIMEOUT,
};

use std::sync::Arc;

/// Shared handle to the process runner, injected into everything that runs
/// commands.
#[derive(Clone)]
pub struct SubprocessManager {
    runner: Arc<dyn ProcessRunner>,
}

impl SubprocessManager {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    pub fn production() -> Self {
        Self::new(Arc::new(runner::TokioProcessRunner))
    }

    #[cfg(test)]
    pub fn mock() -> (Self, MockProcessRunner) {
        let mock = MockProcessRunner::new();
        let runner = Arc::new(mock.clone()) as Arc<dyn ProcessRunner>;
        (Self::new(runner), mock)
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::clone(&self.runner)
    }
}
