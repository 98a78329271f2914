use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::{Agent, AgentState, GpuDescriptor, GpuSelection, Session, SessionRequirements, SessionState};
use crate::store::Database;

/// Input to `register_agent`: everything the agent declares about itself
/// at registration time.
#[derive(Clone, Debug)]
pub struct AgentTemplate {
    pub address: String,
    pub tags: BTreeMap<String, String>,
    pub taints: BTreeMap<String, String>,
    pub gpus: Vec<GpuDescriptor>,
    pub max_sessions: u32,
}

/// A heartbeat payload for `update_agent`.
#[derive(Clone, Debug)]
pub struct AgentUpdate {
    pub agent_id: String,
    /// Carried for interface completeness; the operation always treats
    /// receipt of a heartbeat itself as evidence of liveness and sets the
    /// agent's state to `Active` regardless of this value.
    pub agent_state: AgentState,
    pub sessions: Vec<(String, SessionState)>,
}

/// The placement/lifecycle operations and the reaper primitives, layered
/// over the transactional store.
pub struct Controller {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl Controller {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { db: Database::new(), clock }
    }

    fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn register_agent(&self, template: AgentTemplate) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let agent = Agent::new(
            id.clone(),
            template.address,
            template.tags,
            template.taints,
            template.gpus,
            template.max_sessions,
            self.now(),
        );
        let mut wtx = self.db.begin_write();
        wtx.agents_mut().insert(agent);
        wtx.commit();
        info!("registered agent {id}");
        Ok(id)
    }

    pub fn get_agent_by_id(&self, id: &str) -> Result<Arc<Agent>> {
        let rtx = self.db.begin_read();
        rtx.agents().first_by_id(id).ok_or_else(|| Error::NotFound { table: "agents", id: id.to_string() })
    }

    pub fn request_session(&self, requirements: SessionRequirements) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let session = Session::new(id.clone(), requirements, self.now());
        let mut wtx = self.db.begin_write();
        wtx.sessions_mut().insert(session);
        wtx.commit();
        info!("queued session {id}");
        Ok(id)
    }

    pub fn get_session_by_id(&self, id: &str) -> Result<Arc<Session>> {
        let rtx = self.db.begin_read();
        rtx.sessions().first_by_id(id).ok_or_else(|| Error::NotFound { table: "sessions", id: id.to_string() })
    }

    /// Like `get_session_by_id`, but only returns sessions still `Queued`
    /// (e.g. a session that has since been assigned is not "the queued
    /// session" anymore, from the caller's point of view).
    pub fn get_queued_session_by_id(&self, id: &str) -> Result<Arc<Session>> {
        let session = self.get_session_by_id(id)?;
        if matches!(session.state, SessionState::Queued) {
            Ok(session)
        } else {
            Err(Error::NotFound { table: "sessions", id: id.to_string() })
        }
    }

    /// A materialized list of every queued session.
    pub fn get_queued_sessions(&self) -> Vec<Arc<Session>> {
        let rtx = self.db.begin_read();
        rtx.sessions().get_by_state(SessionState::Queued.code()).collect()
    }

    pub fn get_available_agents_matching(
        &self,
        min_vram: u64,
        required_tags: &BTreeMap<String, String>,
        tolerated_taints: &BTreeMap<String, String>,
    ) -> Vec<Arc<Agent>> {
        let rtx = self.db.begin_read();
        rtx.agents()
            .get_by_state(AgentState::Active.code())
            .filter(|agent| agent.matches(min_vram, required_tags, tolerated_taints))
            .collect()
    }

    /// Re-checks capacity inside the write transaction to defend against
    /// a filter-then-assign race: a candidate fetched by
    /// `get_available_agents_matching` may have been claimed by a
    /// concurrent assignment by the time this call takes the writer lock.
    pub fn assign_session(&self, session_id: &str, agent_id: &str, gpu_selections: Vec<GpuSelection>) -> Result<()> {
        let now = self.now();
        let mut wtx = self.db.begin_write();

        let agent = wtx
            .agents()
            .first_by_id(agent_id)
            .ok_or_else(|| Error::NotFound { table: "agents", id: agent_id.to_string() })?;
        let session = wtx
            .sessions()
            .first_by_id(session_id)
            .ok_or_else(|| Error::NotFound { table: "sessions", id: session_id.to_string() })?;

        if !matches!(session.state, SessionState::Queued) || !session.agent_id.is_empty() {
            return Err(Error::Store(format!(
                "session {session_id} is not queued (state {:?}, agent_id {:?}) and cannot be assigned",
                session.state, session.agent_id
            )));
        }

        if agent.sessions_available <= 0 || agent.vram_available < session.vram_required {
            return Err(Error::CapacityExhausted { agent_id: agent_id.to_string() });
        }

        let mut session = (*session).clone();
        session.state = SessionState::Assigned;
        session.agent_id = agent_id.to_string();
        session.address = agent.address.clone();
        session.gpus = gpu_selections;
        session.last_updated = now;

        let mut agent = (*agent).clone();
        agent.sessions.push((session.id.clone(), session.state));
        agent.vram_available -= session.vram_required;
        agent.sessions_available -= 1;
        agent.last_updated = now;

        debug!("assigning session {session_id} to agent {agent_id}");
        wtx.sessions_mut().insert(session);
        wtx.agents_mut().insert(agent);
        wtx.commit();
        Ok(())
    }

    /// The heartbeat. Idempotent under replay of the same payload (state
    /// assignments are absolute, not deltas).
    pub fn update_agent(&self, update: AgentUpdate) -> Result<()> {
        let now = self.now();
        let mut wtx = self.db.begin_write();

        let agent = wtx
            .agents()
            .first_by_id(&update.agent_id)
            .ok_or_else(|| Error::NotFound { table: "agents", id: update.agent_id.clone() })?;
        let mut agent = (*agent).clone();

        let existing_sessions = agent.sessions.clone();

        // Mirror consistency: every session this agent lists must still
        // exist in the session table. A dangling reference here means the
        // two tables have already diverged; abort rather than propagate it.
        for (session_id, _) in &existing_sessions {
            if wtx.sessions().first_by_id(session_id).is_none() {
                return Err(Error::Store(format!(
                    "agent {} lists session {session_id} but it is absent from the session table",
                    update.agent_id
                )));
            }
        }

        let mut rebuilt = Vec::with_capacity(existing_sessions.len());

        for (session_id, _previous_state) in existing_sessions {
            let incoming = update.sessions.iter().find(|(id, _)| *id == session_id).map(|(_, s)| *s);
            match incoming {
                None => {
                    // Not mentioned in this heartbeat: still placed, unchanged.
                    let session = wtx.sessions().first_by_id(&session_id).expect("checked above");
                    rebuilt.push((session_id, session.state));
                }
                Some(SessionState::Closed) => {
                    let session = wtx.sessions().first_by_id(&session_id).expect("checked above");
                    agent.vram_available += session.vram_required;
                    agent.sessions_available += 1;
                    wtx.sessions_mut().delete_all(std::slice::from_ref(&session_id));
                }
                Some(new_state) => {
                    let session = wtx.sessions().first_by_id(&session_id).expect("checked above");
                    let mut session = (*session).clone();
                    session.state = new_state;
                    session.last_updated = now;
                    wtx.sessions_mut().insert(session);
                    rebuilt.push((session_id, new_state));
                }
            }
        }

        agent.sessions = rebuilt;
        agent.state = AgentState::Active;
        agent.last_updated = now;
        wtx.agents_mut().insert(agent);
        wtx.commit();
        Ok(())
    }

    /// An `Active` agent silent past `duration_secs` becomes `Missing`.
    pub fn mark_missing(&self, duration_secs: i64) -> Result<()> {
        let now = self.now();
        let threshold = now - duration_secs;
        let mut wtx = self.db.begin_write();

        let stale: Vec<Arc<Agent>> = wtx
            .agents()
            .reverse_lower_bound_by_last_updated(threshold)
            .filter(|agent| matches!(agent.state, AgentState::Active))
            .collect();

        if stale.is_empty() {
            wtx.abort();
            return Ok(());
        }

        for agent in stale {
            warn!("agent {} missed its heartbeat window, marking Missing", agent.id);
            let mut agent = (*agent).clone();
            agent.state = AgentState::Missing;
            agent.last_updated = now;
            wtx.agents_mut().insert(agent);
        }
        wtx.commit();
        Ok(())
    }

    /// A `Missing` agent silent past `duration_secs` is deleted. Sessions
    /// still hosted by it transition to `Failed` in the same transaction
    /// rather than being silently dropped or left dangling.
    pub fn remove_stale(&self, duration_secs: i64) -> Result<()> {
        let now = self.now();
        let threshold = now - duration_secs;
        let mut wtx = self.db.begin_write();

        let stale_missing: Vec<Arc<Agent>> = wtx
            .agents()
            .reverse_lower_bound_by_last_updated(threshold)
            .filter(|agent| matches!(agent.state, AgentState::Missing))
            .collect();

        if stale_missing.is_empty() {
            wtx.abort();
            return Ok(());
        }

        for agent in &stale_missing {
            for (session_id, _) in &agent.sessions {
                if let Some(session) = wtx.sessions().first_by_id(session_id) {
                    warn!("failing orphaned session {session_id} (agent {} removed)", agent.id);
                    let mut session = (*session).clone();
                    session.state = SessionState::Failed;
                    session.agent_id.clear();
                    session.last_updated = now;
                    wtx.sessions_mut().insert(session);
                }
            }
        }

        let ids: Vec<String> = stale_missing.iter().map(|agent| agent.id.clone()).collect();
        for id in &ids {
            info!("removing stale agent {id}");
        }
        wtx.agents_mut().delete_all(&ids);
        wtx.commit();
        Ok(())
    }

    /// No persistent resources are held outside the in-memory store, so
    /// this exists for interface parity and is a no-op.
    pub fn close(&self) {}
}
