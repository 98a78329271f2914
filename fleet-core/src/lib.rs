//! Control plane for a fleet of GPU agents: a transactional in-memory
//! store, the agent/session entity model, placement and lifecycle
//! operations, and a liveness reaper.
//!
//! ## Getting started
//!
//! ```rust
//! use std::sync::Arc;
//! use fleet_core::clock::SystemClock;
//! use fleet_core::ops::{AgentTemplate, Controller};
//! use fleet_core::model::GpuDescriptor;
//!
//! let controller = Controller::new(Arc::new(SystemClock));
//! let agent_id = controller
//!     .register_agent(AgentTemplate {
//!         address: "10.0.0.1:9000".into(),
//!         tags: Default::default(),
//!         taints: Default::default(),
//!         gpus: vec![GpuDescriptor { id: "gpu0".into(), total_vram_mb: 8192 }],
//!         max_sessions: 4,
//!     })
//!     .unwrap();
//! assert!(controller.get_agent_by_id(&agent_id).is_ok());
//! ```

pub mod clock;
pub mod error;
pub mod model;
pub mod ops;
pub mod reaper;
pub mod store;

pub use error::{Error, Result};
pub use ops::Controller;
