use thiserror::Error;

use crate::Value;

/// Result of anything that runs program code or touches the heap on behalf
/// of the program.
pub type Outcome = Result<Value, Failure>;

/// A failure value flowing out of message dispatch or program entry.
///
/// Failures are resolved through the escalation chain before the dispatch
/// loop moves on; they never unwind across the isolate boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Failure {
    /// A thrown program exception that nothing caught.
    #[error("unhandled exception: {exception} (stacktrace {stacktrace})")]
    UnhandledException { exception: Value, stacktrace: Value },
    /// Resolution/compilation style failure reported by the program layer.
    #[error("language error: {0}")]
    Language(String),
    /// Misuse of the embedding API or a malformed payload.
    #[error("api error: {0}")]
    Api(String),
    /// The host asked the isolate to stop running program code.
    #[error("unwind: {0}")]
    Unwind(String),
}

impl Failure {
    pub fn is_unhandled_exception(&self) -> bool {
        matches!(self, Failure::UnhandledException { .. })
    }

    /// Reference slots held by this failure, for the root walk.
    pub(crate) fn slots_mut(&mut self) -> Option<[&mut Value; 2]> {
        match self {
            Failure::UnhandledException {
                exception,
                stacktrace,
            } => Some([exception, stacktrace]),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("heap exhausted: {used} of {capacity} objects in use")]
    OutOfMemory { used: usize, capacity: usize },
}
