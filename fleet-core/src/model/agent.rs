use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::session::SessionState;
use crate::store::Record;

/// A single GPU device exposed by an agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuDescriptor {
    pub id: String,
    pub total_vram_mb: u64,
}

/// Liveness classification of an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Active,
    Missing,
}

impl AgentState {
    pub fn code(self) -> u8 {
        match self {
            AgentState::Active => 0,
            AgentState::Missing => 1,
        }
    }
}

/// A worker node managing one or more GPUs, as reported to the controller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub state: AgentState,
    pub address: String,
    pub tags: BTreeMap<String, String>,
    pub taints: BTreeMap<String, String>,
    pub gpus: Vec<GpuDescriptor>,
    pub max_sessions: u32,
    /// Denormalized view of sessions currently placed on this agent.
    pub sessions: Vec<(String, SessionState)>,
    pub vram_available: u64,
    pub sessions_available: i64,
    pub last_updated: i64,
}

impl Agent {
    /// Builds a freshly registered agent: full capacity, no placed
    /// sessions, `Active`.
    pub fn new(
        id: String,
        address: String,
        tags: BTreeMap<String, String>,
        taints: BTreeMap<String, String>,
        gpus: Vec<GpuDescriptor>,
        max_sessions: u32,
        now: i64,
    ) -> Self {
        let vram_available = gpus.iter().map(|g| g.total_vram_mb).sum();
        Agent {
            id,
            state: AgentState::Active,
            address,
            tags,
            taints,
            gpus,
            max_sessions,
            sessions: Vec::new(),
            vram_available,
            sessions_available: max_sessions as i64,
            last_updated: now,
        }
    }

    /// Whether this agent satisfies a candidate-matching filter, assuming
    /// it is already known to be `Active`.
    pub fn matches(
        &self,
        min_vram: u64,
        required_tags: &BTreeMap<String, String>,
        tolerated_taints: &BTreeMap<String, String>,
    ) -> bool {
        if self.sessions_available <= 0 {
            return false;
        }
        if self.vram_available < min_vram {
            return false;
        }
        if !required_tags.iter().all(|(k, v)| self.tags.get(k) == Some(v)) {
            return false;
        }
        if !self.taints.iter().all(|(k, v)| tolerated_taints.get(k) == Some(v)) {
            return false;
        }
        true
    }
}

impl Record for Agent {
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
