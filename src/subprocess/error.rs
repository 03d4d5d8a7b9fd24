/// Failures to get a command running at all.
///
/// Outcomes of a command that did run (non-zero exit, watchdog expiry,
/// death by signal) are not errors at this layer; they come back as
/// [`ExitStatus`](super::runner::ExitStatus) values for callers to
/// interpret.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}
