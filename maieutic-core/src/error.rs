//! Error types for maieutic operations

/// Result type for maieutic operations
pub type Result<T> = std::result::Result<T, MaieuticError>;

/// Error types for the trace recorder, agent and evaluation engine
#[derive(Debug, thiserror::Error)]
pub enum MaieuticError {
    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A session was used outside its lifecycle (e.g. record after finalize)
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    /// The recorded event order broke a structural rule of the state model
    #[error("Structural trace violation in session {session_id}: {message}")]
    StructuralViolation {
        /// Session whose trace can no longer be trusted
        session_id: String,
        /// Which rule was broken
        message: String,
    },

    /// Agent-level failure
    #[error("Agent error: {0}")]
    Agent(String),

    /// Model call failed
    #[error("LLM error: {0}")]
    Llm(String),

    /// Tool boundary failure that could not be recorded as a tool response
    #[error("Tool error: {0}")]
    Tool(String),

    /// Operation exceeded its deadline
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl MaieuticError {
    /// Build a structural violation for a session.
    pub fn structural(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        MaieuticError::StructuralViolation {
            session_id: session_id.into(),
            message: message.into(),
        }
    }

    /// True for contract violations that mean the trace cannot be trusted.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            MaieuticError::StructuralViolation { .. } | MaieuticError::InvalidSessionState(_)
        )
    }

    /// Failures worth retrying at the model boundary
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MaieuticError::Llm(_) | MaieuticError::Timeout(_) | MaieuticError::Io(_)
        )
    }
}

impl From<String> for MaieuticError {
    fn from(s: String) -> Self {
        MaieuticError::Other(s)
    }
}

impl From<&str> for MaieuticError {
    fn from(s: &str) -> Self {
        MaieuticError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for MaieuticError {
    fn from(err: anyhow::Error) -> Self {
        MaieuticError::Other(err.to_string())
    }
}

impl From<serde_yaml::Error> for MaieuticError {
    fn from(err: serde_yaml::Error) -> Self {
        MaieuticError::Configuration(format!("YAML parse error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let violation = MaieuticError::structural("s1", "response before routing");
        assert!(violation.is_structural());
        assert!(!violation.is_transient());
        assert!(violation.to_string().contains("s1"));

        assert!(MaieuticError::Llm("reset".into()).is_transient());
        assert!(!MaieuticError::Configuration("bad".into()).is_transient());
        assert!(MaieuticError::InvalidSessionState("finalized".into()).is_structural());
    }
}
