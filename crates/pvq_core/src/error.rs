use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Malformed or out-of-range setup parameters. Raised before any session
    /// state is created.
    Validation(String),
    /// A step transition that the lifecycle does not allow (e.g. starting a
    /// step that is not Pending, or whose phase has not started).
    InvalidTransition { step_id: String, reason: String },
    /// A terminal transition was requested on a step that is not InProgress.
    NotInProgress { step_id: String, status: String },
    /// A second session was started while one is already active.
    AlreadyActive { session_id: String },
    /// `complete_session` was called while phases remain unfinished.
    IncompleteProtocol { pending_phases: Vec<String> },
    /// An unknown protocol, phase, or step id.
    NotFound(String),
    /// No session is active for the requested operation.
    NoActiveSession,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "Validation error: {}", msg),
            EngineError::InvalidTransition { step_id, reason } => {
                write!(f, "Invalid transition for step '{}': {}", step_id, reason)
            }
            EngineError::NotInProgress { step_id, status } => {
                write!(f, "Step '{}' is not in progress (status: {})", step_id, status)
            }
            EngineError::AlreadyActive { session_id } => {
                write!(f, "Session '{}' is already active", session_id)
            }
            EngineError::IncompleteProtocol { pending_phases } => {
                write!(f, "Protocol incomplete, unfinished phases: {}", pending_phases.join(", "))
            }
            EngineError::NotFound(msg) => write!(f, "Not found: {}", msg),
            EngineError::NoActiveSession => write!(f, "No active session"),
        }
    }
}

impl std::error::Error for EngineError {}

pub type Result<T> = std::result::Result<T, EngineError>;
