//! The entity model: `Agent` and `Session` records plus the invariants
//! linking them. The invariants themselves are enforced by the operations
//! in [`crate::ops`], not by these types.

mod agent;
mod session;

pub use agent::{Agent, AgentState, GpuDescriptor};
pub use session::{GpuSelection, Session, SessionRequirements, SessionState};
