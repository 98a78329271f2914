use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::store::Record;

/// A concrete GPU carved out for one session, set on assignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuSelection {
    pub gpu_id: String,
    pub vram_mb: u64,
}

/// Structured constraints a queued session places on its candidate agent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionRequirements {
    pub version: String,
    /// Per-GPU VRAM requests; `vram_required` is the sum over this list.
    pub gpu_requests: Vec<u64>,
    pub required_tags: BTreeMap<String, String>,
    pub tolerated_taints: BTreeMap<String, String>,
}

impl SessionRequirements {
    pub fn total_vram_mb(&self) -> u64 {
        self.gpu_requests.iter().sum()
    }
}

/// Lifecycle position of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Queued,
    Assigned,
    Active,
    Closed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn code(self) -> u8 {
        match self {
            SessionState::Queued => 0,
            SessionState::Assigned => 1,
            SessionState::Active => 2,
            SessionState::Closed => 3,
            SessionState::Cancelled => 4,
            SessionState::Failed => 5,
        }
    }
}

/// A client's virtual claim on agent resources.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub state: SessionState,
    pub version: String,
    pub requirements: SessionRequirements,
    pub vram_required: u64,
    /// Empty while `Queued`; set on assignment.
    pub agent_id: String,
    pub address: String,
    pub gpus: Vec<GpuSelection>,
    pub last_updated: i64,
}

impl Session {
    /// Builds a freshly requested session: `Queued`, unassigned.
    pub fn new(id: String, requirements: SessionRequirements, now: i64) -> Self {
        let vram_required = requirements.total_vram_mb();
        let version = requirements.version.clone();
        Session {
            id,
            state: SessionState::Queued,
            version,
            requirements,
            vram_required,
            agent_id: String::new(),
            address: String::new(),
            gpus: Vec::new(),
            last_updated: now,
        }
    }
}

impl Record for Session {
    fn id(&self) -> &str {
        &self.id
    }

    fn state_code(&self) -> u8 {
        self.state.code()
    }

    fn last_updated(&self) -> i64 {
        self.last_updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_queued_and_unassigned() {
        let reqs = SessionRequirements {
            version: "1.2.3".into(),
            gpu_requests: vec![2048, 2048],
            required_tags: BTreeMap::new(),
            tolerated_taints: BTreeMap::new(),
        };
        let s = Session::new("s1".into(), reqs, 100);
        assert!(matches!(s.state, SessionState::Queued));
        assert_eq!(s.vram_required, 4096);
        assert_eq!(s.version, "1.2.3");
        assert!(s.agent_id.is_empty());
        assert!(s.gpus.is_empty());
    }
}
