//! Domain errors raised by the simulation core.

/// Errors that the game state reports to its caller.
///
/// None of these are fatal: spawn exhaustion defers the affected join,
/// respawn or food refill to a later tick, and configuration errors are
/// only produced before the server starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("no free cell found after {attempts} sampling attempts and a full scan")]
    SpawnExhausted { attempts: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
