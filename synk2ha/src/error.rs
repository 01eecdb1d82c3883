use thiserror::Error;

/// Everything that can go wrong in one bridge cycle.
///
/// None of these is fatal to the process: the orchestrator maps each of them
/// to "skip the remaining effects of this cycle, wait, try again".
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration incomplete, missing: {}", .0.join(", "))]
    ConfigMissing(Vec<&'static str>),

    #[error("public key fetch failed: {0}")]
    KeyFetch(String),

    #[error("password encryption failed: {0}")]
    Encryption(String),

    #[error("authentication failed after {attempts} attempts over every variant")]
    AuthExhausted { attempts: usize },

    #[error("{failed} of {total} telemetry fetches failed")]
    FetchPartialFailure { failed: usize, total: usize },

    #[error("state write for {entity} failed: {reason}")]
    DispatchWrite { entity: String, reason: String },

    #[error("settings pushback failed: {0}")]
    PushbackForward(String),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
