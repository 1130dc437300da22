use thiserror::Error;

/// Resolution failure carrying the exhausted strategy list.
#[derive(Debug, Clone, Error)]
#[error("resolution failed for target '{target}': {reason}")]
pub struct ResolutionError {
    pub target: String,
    pub reason: String,
    /// Names of the strategies that were tried, in order.
    pub attempted: Vec<String>,
}

impl ResolutionError {
    pub fn new(target: impl Into<String>, reason: impl Into<String>, attempted: Vec<String>) -> Self {
        Self {
            target: target.into(),
            reason: reason.into(),
            attempted,
        }
    }
}
