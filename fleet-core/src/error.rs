use thiserror::Error;

/// The error kinds the core can surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A referenced agent or session id does not exist.
    #[error("{table} {id} not found")]
    NotFound { table: &'static str, id: String },

    /// `assign_session` lost a race: the agent no longer has room.
    #[error("agent {agent_id} no longer has capacity for this session")]
    CapacityExhausted { agent_id: String },

    /// An underlying store failure, or a detected invariant violation. Not
    /// expected in steady state; the transaction that produced it was
    /// aborted before this was returned.
    #[error("store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;
