//! Placement and lifecycle operations, plus the driver loop built on top
//! of them.

mod controller;
mod placement;

pub use controller::{AgentTemplate, AgentUpdate, Controller};
pub use placement::{run_forever, run_once};
